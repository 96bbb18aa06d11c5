//! Writers turning a selection of scene nodes into mesh files.
//!
//! Writers only ever see `&Scene`. Axis and scale conversion are explicit
//! [`ExportOptions`]; nothing about the target convention is implied.

pub mod glb;
pub mod obj;
pub mod recording;
pub mod stl;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use glam::{DMat4, DVec4};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::AxisConversion;
use crate::scene_graph::{Mesh, NodeId, Scene};

pub use recording::{RecordedNode, RecordedWrite, RecordingExporter};

pub type ExportResult<T> = Result<T, ExportError>;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing selected to export")]
    EmptySelection,

    #[error("selected node {0:?} does not exist")]
    MissingNode(NodeId),

    #[error("{0} is too large for the output format")]
    TooLarge(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("glTF error: {0}")]
    Gltf(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Obj,
    Stl,
    #[default]
    Glb,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Obj => "obj",
            ExportFormat::Stl => "stl",
            ExportFormat::Glb => "glb",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "obj" => Some(ExportFormat::Obj),
            "stl" => Some(ExportFormat::Stl),
            "glb" => Some(ExportFormat::Glb),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportOptions {
    /// From the scene's axis convention to the file's.
    pub axis: AxisConversion,
    pub global_scale: f64,
    /// Write each node in its own frame with the origin at the file origin,
    /// instead of at its world placement.
    pub center_on_origin: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            axis: AxisConversion::IDENTITY,
            global_scale: 1.0,
            center_on_origin: false,
        }
    }
}

impl ExportOptions {
    /// Scene space to file space.
    pub fn root_matrix(&self) -> DMat4 {
        DMat4::from_scale(glam::DVec3::splat(self.global_scale)) * self.axis.to_mat4()
    }

    /// Where the node's local geometry ends up before conversion to file space.
    pub fn placement(&self, scene: &Scene, id: NodeId) -> Option<DMat4> {
        let mut world = scene.world_matrix(id)?;
        if self.center_on_origin {
            world.w_axis = DVec4::W;
        }
        Some(world)
    }
}

/// Writes the given nodes of `scene` to `path`. Implementations must not
/// touch anything but the file system.
pub trait Exporter {
    fn write(
        &self,
        scene: &Scene,
        selection: &[NodeId],
        format: ExportFormat,
        path: &Path,
        options: &ExportOptions,
    ) -> ExportResult<()>;
}

/// Built-in writer for every [`ExportFormat`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshWriter;

impl Exporter for MeshWriter {
    fn write(
        &self,
        scene: &Scene,
        selection: &[NodeId],
        format: ExportFormat,
        path: &Path,
        options: &ExportOptions,
    ) -> ExportResult<()> {
        let items = collect_items(scene, selection, options)?;
        let writer = create_output(path)?;

        match format {
            ExportFormat::Obj => obj::write_obj(&items, writer)?,
            ExportFormat::Stl => stl::write_stl(&items, writer)?,
            ExportFormat::Glb => glb::write_glb(&items, writer)?,
        }

        log::info!("Wrote {}", path.display());
        Ok(())
    }
}

/// One selected mesh node, with the matrix taking its local geometry to file space.
#[derive(Debug, Clone, Copy)]
pub struct ExportItem<'a> {
    pub id: NodeId,
    pub name: &'a str,
    pub mesh: &'a Mesh,
    pub matrix: DMat4,
}

impl ExportItem<'_> {
    /// Geometry with `matrix` applied.
    pub fn baked_mesh(&self) -> Mesh {
        let mut mesh = self.mesh.clone();
        mesh.transform(&self.matrix);
        mesh
    }
}

/// Resolves a selection into writable items. Empties are skipped; an
/// unknown id or a selection without any geometry is an error.
pub fn collect_items<'a>(
    scene: &'a Scene,
    selection: &[NodeId],
    options: &ExportOptions,
) -> ExportResult<Vec<ExportItem<'a>>> {
    let root = options.root_matrix();
    let mut items = Vec::with_capacity(selection.len());

    for &id in selection {
        let node = scene.get_object(id).ok_or(ExportError::MissingNode(id))?;
        let Some(mesh) = node.mesh() else {
            log::debug!("Skipping `{}` without geometry", node.name);
            continue;
        };
        let placement = options
            .placement(scene, id)
            .ok_or(ExportError::MissingNode(id))?;

        items.push(ExportItem {
            id,
            name: &node.name,
            mesh,
            matrix: root * placement,
        });
    }

    if items.is_empty() {
        return Err(ExportError::EmptySelection);
    }

    Ok(items)
}

/// Opens `path` for writing, creating missing directories.
pub fn create_output(path: &Path) -> ExportResult<BufWriter<File>> {
    if let Some(directory) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(directory)?;
    }
    if path.exists() {
        log::warn!("Overwriting existing file {}", path.display());
    }

    Ok(BufWriter::new(File::create(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Axis, AxisFrame};
    use crate::scene_graph::{Node, Transform};
    use approx::assert_relative_eq;
    use glam::{DVec3, Vec3};

    fn scene_with_box() -> (Scene, NodeId, NodeId) {
        let mut scene = Scene::new();
        let anchor = scene.add_object(
            Node::new("Anchor").with_transform(Transform::from_translation(DVec3::new(5.0, 3.0, 2.0))),
        );
        let mesh = scene.add_child(
            anchor,
            Node::with_mesh("Box", Mesh::cuboid("Box", Vec3::ONE)),
        );
        (scene, anchor, mesh)
    }

    #[test]
    fn formats_know_their_extensions() {
        for format in [ExportFormat::Obj, ExportFormat::Stl, ExportFormat::Glb] {
            let path = Path::new("out").join(format!("x.{}", format.extension()));
            assert_eq!(ExportFormat::from_path(&path), Some(format));
        }
        assert_eq!(ExportFormat::from_path(Path::new("x.fbx")), None);
        assert_eq!(serde_json::from_str::<ExportFormat>("\"stl\"").unwrap(), ExportFormat::Stl);
    }

    #[test]
    fn centering_drops_world_translation() {
        let (scene, _, mesh) = scene_with_box();
        let options = ExportOptions {
            center_on_origin: true,
            ..Default::default()
        };

        let items = collect_items(&scene, &[mesh], &options).unwrap();
        assert_eq!(items[0].matrix.w_axis.truncate(), DVec3::ZERO);

        let items = collect_items(&scene, &[mesh], &ExportOptions::default()).unwrap();
        assert_eq!(items[0].matrix.w_axis.truncate(), DVec3::new(5.0, 3.0, 2.0));
    }

    #[test]
    fn root_matrix_converts_axes_then_scales() {
        let scene_axes = AxisFrame::default();
        let target = AxisFrame::new(Axis::NegY, Axis::PosZ).unwrap();
        let options = ExportOptions {
            axis: AxisConversion::new(scene_axes, target).unwrap(),
            global_scale: 100.0,
            center_on_origin: false,
        };

        // Scene up (+Y) becomes file up (+Z).
        let up = options.root_matrix().transform_vector3(DVec3::Y);
        assert_relative_eq!(up.z, 100.0, epsilon = 1e-9);
        assert_relative_eq!(up.x, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn selection_errors() {
        let (mut scene, anchor, mesh) = scene_with_box();
        let options = ExportOptions::default();

        assert!(matches!(
            collect_items(&scene, &[anchor], &options),
            Err(ExportError::EmptySelection)
        ));

        scene.remove_object(mesh);
        assert!(matches!(
            collect_items(&scene, &[mesh], &options),
            Err(ExportError::MissingNode(id)) if id == mesh
        ));
    }
}
