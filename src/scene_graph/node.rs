use std::sync::Arc;

use id_arena::Id;

use crate::scene_graph::mesh::Mesh;
use crate::scene_graph::modifier::Modifier;
use crate::scene_graph::transform::Transform;

pub type NodeId = Id<Node>;

/// An object in the scene. Nodes without a mesh are empties; an empty whose
/// children carry meshes acts as an export anchor.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub modifiers: Vec<Modifier>,
    pub(super) mesh: Option<Arc<Mesh>>,
    pub(super) parent_id: Option<NodeId>,
    pub(super) child_ids: Vec<NodeId>,
    pub(super) removed: bool,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_mesh(name: impl Into<String>, mesh: Mesh) -> Self {
        Self::new(name).with_shared_mesh(Arc::new(mesh))
    }

    /// Links existing geometry instead of copying it.
    pub fn with_shared_mesh(mut self, mesh: Arc<Mesh>) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn parent_id(&self) -> Option<NodeId> {
        self.parent_id
    }

    pub fn child_ids(&self) -> &[NodeId] {
        &self.child_ids
    }

    pub fn has_mesh(&self) -> bool {
        self.mesh.is_some()
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_deref()
    }

    pub fn shared_mesh(&self) -> Option<&Arc<Mesh>> {
        self.mesh.as_ref()
    }

    /// Mutable geometry. Shared geometry is copied first, so other nodes
    /// linking the same mesh never observe the edit.
    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        self.mesh.as_mut().map(Arc::make_mut)
    }

    pub fn face_count(&self) -> usize {
        self.mesh().map_or(0, Mesh::face_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn mesh_mut_detaches_shared_geometry() {
        let shared = Arc::new(Mesh::cuboid("Box", Vec3::ONE));
        let original = Node::new("A").with_shared_mesh(shared.clone());
        let mut copy = Node::new("B").with_shared_mesh(shared.clone());

        copy.mesh_mut().unwrap().primitives.clear();

        assert_eq!(original.face_count(), 12);
        assert_eq!(copy.face_count(), 0);
        assert!(Arc::ptr_eq(original.shared_mesh().unwrap(), &shared));
    }

    #[test]
    fn empty_has_no_mesh() {
        let node = Node::new("Empty");
        assert!(!node.has_mesh());
        assert_eq!(node.face_count(), 0);
        assert!(node.parent_id().is_none());
        assert!(node.child_ids().is_empty());
    }
}
