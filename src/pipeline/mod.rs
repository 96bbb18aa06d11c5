pub mod batch;
pub mod duplicate;
pub mod error;
pub mod merge;
pub mod naming;
pub mod reparent;
pub mod report;
pub mod resolver;
pub mod session;
pub mod snapshot;

pub use batch::{export_all, plan_units, ExportUnit, SessionOptions};
pub use duplicate::{duplicate, DuplicateOptions, Duplication, MaterialOptions};
pub use error::{PipelineError, PipelineResult, SessionError};
pub use merge::{merge, relocate_origin};
pub use naming::{sanitize_file_stem, OutputNamer};
pub use reparent::detach_preserving_world;
pub use report::{ExportReport, ExportSubject, ExportedFile, Failure};
pub use resolver::{anchor_meshes, direct_mesh_members, find_anchors, mesh_nodes, Anchor};
pub use session::{CancelFlag, ExportSession};
pub use snapshot::TransformSnapshot;
