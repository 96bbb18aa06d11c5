pub mod group;
pub mod mesh;
pub mod modifier;
pub mod node;
pub mod scene;
pub mod scene_node;
pub mod transform;

// Re-export main types for convenience
pub use group::{Group, GroupId};
pub use mesh::{Mesh, Primitive, Vertex};
pub use modifier::{MirrorAxis, Modifier, ModifierError, ModifierKind};
pub use node::{Node, NodeId};
pub use scene::{Scene, Selection};
pub use scene_node::{NodeRef, SceneNode};
pub use transform::Transform;
