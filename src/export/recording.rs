use std::cell::RefCell;
use std::path::{Path, PathBuf};

use glam::DVec3;

use crate::export::{collect_items, ExportFormat, ExportOptions, ExportResult, Exporter};
use crate::math::AABB;
use crate::scene_graph::{NodeId, Scene};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedNode {
    pub name: String,
    pub world_translation: DVec3,
    pub face_count: usize,
    pub world_bounds: Option<AABB>,
    /// Bounds of the geometry as it would be written.
    pub file_bounds: Option<AABB>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub nodes: Vec<RecordedNode>,
}

impl RecordedWrite {
    pub fn face_count(&self) -> usize {
        self.nodes.iter().map(|node| node.face_count).sum()
    }
}

/// Writer that remembers what it was asked to write instead of touching the
/// disk. Backs `--dry-run`.
#[derive(Debug, Default)]
pub struct RecordingExporter {
    writes: RefCell<Vec<RecordedWrite>>,
}

impl RecordingExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.writes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.borrow().is_empty()
    }
}

impl Exporter for RecordingExporter {
    fn write(
        &self,
        scene: &Scene,
        selection: &[NodeId],
        format: ExportFormat,
        path: &Path,
        options: &ExportOptions,
    ) -> ExportResult<()> {
        let nodes = collect_items(scene, selection, options)?
            .into_iter()
            .map(|item| RecordedNode {
                name: item.name.to_string(),
                world_translation: scene.world_translation(item.id).unwrap_or_default(),
                face_count: item.mesh.face_count(),
                world_bounds: scene.world_bounds(item.id),
                file_bounds: item.mesh.bounds(&item.matrix),
            })
            .collect();

        log::info!("Would write {}", path.display());
        self.writes.borrow_mut().push(RecordedWrite {
            path: path.to_path_buf(),
            format,
            nodes,
        });
        Ok(())
    }
}
