use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::mem;

use glam::{DMat4, Vec3};
use gltf::json;
use json::validation::{Checked::Valid, USize64};

use crate::export::{ExportError, ExportItem, ExportResult};
use crate::scene_graph::{Primitive, Vertex};

/// Binary glTF 2.0. Each item becomes a node with its own mesh; geometry
/// stays in the node's frame and the placement goes into the node matrix.
pub fn write_glb<W: Write>(items: &[ExportItem], writer: W) -> ExportResult<()> {
    let mut builder = GlbBuilder::default();
    let mut nodes = Vec::with_capacity(items.len());

    for item in items {
        let mesh = builder.push_mesh(item)?;
        let matrix = (!item.matrix.abs_diff_eq(DMat4::IDENTITY, 1e-12))
            .then(|| item.matrix.as_mat4().to_cols_array());

        nodes.push(builder.root.push(json::Node {
            mesh,
            matrix,
            name: Some(item.name.to_string()),
            ..Default::default()
        }));
    }

    let scene = builder.root.push(json::Scene {
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        nodes,
    });
    builder.root.scene = Some(scene);

    builder.finish(writer)
}

#[derive(Default)]
struct GlbBuilder {
    root: json::Root,
    bin: Vec<u8>,
    materials: HashMap<String, json::Index<json::Material>>,
}

impl GlbBuilder {
    fn push_mesh(&mut self, item: &ExportItem) -> ExportResult<Option<json::Index<json::Mesh>>> {
        let mut primitives = Vec::new();
        for primitive in &item.mesh.primitives {
            if primitive.indices.is_empty() || primitive.vertices.is_empty() {
                continue;
            }
            primitives.push(self.push_primitive(primitive)?);
        }

        if primitives.is_empty() {
            log::debug!("`{}` has no triangles, writing an empty node", item.name);
            return Ok(None);
        }

        Ok(Some(self.root.push(json::Mesh {
            extensions: Default::default(),
            extras: Default::default(),
            name: Some(item.mesh.name.clone()),
            primitives,
            weights: None,
        })))
    }

    fn push_primitive(&mut self, primitive: &Primitive) -> ExportResult<json::mesh::Primitive> {
        let vertex_count = primitive.vertices.len();
        let (min, max) = primitive.vertices.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(min, max), vertex| (min.min(vertex.position), max.max(vertex.position)),
        );

        let vertex_view = self.push_view(
            bytemuck::cast_slice(&primitive.vertices),
            Some(mem::size_of::<Vertex>()),
            json::buffer::Target::ArrayBuffer,
        )?;
        let index_view = self.push_view(
            bytemuck::cast_slice(&primitive.indices),
            None,
            json::buffer::Target::ElementArrayBuffer,
        )?;

        let positions = self.push_accessor(
            vertex_view,
            mem::offset_of!(Vertex, position),
            vertex_count,
            json::accessor::ComponentType::F32,
            json::accessor::Type::Vec3,
            Some((min.to_array().to_vec(), max.to_array().to_vec())),
        );
        let normals = self.push_accessor(
            vertex_view,
            mem::offset_of!(Vertex, normal),
            vertex_count,
            json::accessor::ComponentType::F32,
            json::accessor::Type::Vec3,
            None,
        );
        let tex_coords = self.push_accessor(
            vertex_view,
            mem::offset_of!(Vertex, tex_coords),
            vertex_count,
            json::accessor::ComponentType::F32,
            json::accessor::Type::Vec2,
            None,
        );
        let indices = self.push_accessor(
            index_view,
            0,
            primitive.indices.len(),
            json::accessor::ComponentType::U32,
            json::accessor::Type::Scalar,
            None,
        );

        let mut attributes = BTreeMap::new();
        attributes.insert(Valid(json::mesh::Semantic::Positions), positions);
        attributes.insert(Valid(json::mesh::Semantic::Normals), normals);
        attributes.insert(Valid(json::mesh::Semantic::TexCoords(0)), tex_coords);

        Ok(json::mesh::Primitive {
            attributes,
            extensions: Default::default(),
            extras: Default::default(),
            indices: Some(indices),
            material: primitive
                .material
                .as_deref()
                .map(|name| self.material(name)),
            mode: Valid(json::mesh::Mode::Triangles),
            targets: None,
        })
    }

    fn push_view(
        &mut self,
        bytes: &[u8],
        stride: Option<usize>,
        target: json::buffer::Target,
    ) -> ExportResult<json::Index<json::buffer::View>> {
        let offset = self.bin.len();
        self.bin.extend_from_slice(bytes);
        // Keep every view 4-byte aligned.
        self.bin.resize(self.bin.len().next_multiple_of(4), 0);

        if u32::try_from(self.bin.len()).is_err() {
            return Err(ExportError::TooLarge("binary chunk".to_string()));
        }

        Ok(self.root.push(json::buffer::View {
            buffer: json::Index::new(0),
            byte_length: USize64::from(bytes.len()),
            byte_offset: Some(USize64::from(offset)),
            byte_stride: stride.map(json::buffer::Stride),
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            target: Some(Valid(target)),
        }))
    }

    fn push_accessor(
        &mut self,
        view: json::Index<json::buffer::View>,
        offset: usize,
        count: usize,
        component_type: json::accessor::ComponentType,
        type_: json::accessor::Type,
        bounds: Option<(Vec<f32>, Vec<f32>)>,
    ) -> json::Index<json::Accessor> {
        let (min, max) = match bounds {
            Some((min, max)) => (Some(json::Value::from(min)), Some(json::Value::from(max))),
            None => (None, None),
        };

        self.root.push(json::Accessor {
            buffer_view: Some(view),
            byte_offset: Some(USize64::from(offset)),
            count: USize64::from(count),
            component_type: Valid(json::accessor::GenericComponentType(component_type)),
            extensions: Default::default(),
            extras: Default::default(),
            type_: Valid(type_),
            min,
            max,
            name: None,
            normalized: false,
            sparse: None,
        })
    }

    fn material(&mut self, name: &str) -> json::Index<json::Material> {
        if let Some(index) = self.materials.get(name) {
            return *index;
        }

        let index = self.root.push(json::Material {
            name: Some(name.to_string()),
            ..Default::default()
        });
        self.materials.insert(name.to_string(), index);
        index
    }

    fn finish<W: Write>(mut self, mut writer: W) -> ExportResult<()> {
        if !self.bin.is_empty() {
            self.root.push(json::Buffer {
                byte_length: USize64::from(self.bin.len()),
                extensions: Default::default(),
                extras: Default::default(),
                name: None,
                uri: None,
            });
        }

        let mut json = json::serialize::to_string(&self.root)
            .map_err(|err| ExportError::Gltf(err.to_string()))?
            .into_bytes();
        json.resize(json.len().next_multiple_of(4), b' ');

        // Header, JSON chunk header and payload, then the optional BIN chunk.
        let mut length = 12 + 8 + json.len();
        if !self.bin.is_empty() {
            length += 8 + self.bin.len();
        }
        let length = u32::try_from(length)
            .map_err(|_| ExportError::TooLarge(format!("{} byte GLB", length)))?;

        let glb = gltf::binary::Glb {
            header: gltf::binary::Header {
                magic: *b"glTF",
                version: 2,
                length,
            },
            json: Cow::Owned(json),
            bin: (!self.bin.is_empty()).then_some(Cow::Owned(self.bin)),
        };

        glb.to_writer(&mut writer)
            .map_err(|err| ExportError::Gltf(err.to_string()))?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::{Mesh, Node};
    use glam::DVec3;
    use id_arena::Arena;

    #[test]
    fn output_parses_back() {
        let mut ids = Arena::<Node>::new();
        let mut painted = Mesh::cuboid("Painted", Vec3::ONE);
        painted.primitives[0].material = Some("M_Paint".to_string());
        let plain = Mesh::cuboid("Plain", Vec3::splat(0.5));

        let items = [
            ExportItem {
                id: ids.alloc(Node::default()),
                name: "Centred",
                mesh: &painted,
                matrix: DMat4::IDENTITY,
            },
            ExportItem {
                id: ids.alloc(Node::default()),
                name: "Placed",
                mesh: &plain,
                matrix: DMat4::from_translation(DVec3::new(5.0, 3.0, 2.0)),
            },
        ];

        let mut out = Vec::new();
        write_glb(&items, &mut out).unwrap();
        assert_eq!(&out[0..4], b"glTF");
        assert_eq!(u32::from_le_bytes(out[8..12].try_into().unwrap()) as usize, out.len());

        let document = gltf::Gltf::from_slice(&out).unwrap();
        let nodes = document.nodes().collect::<Vec<_>>();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].name(), Some("Centred"));
        assert_eq!(nodes[0].transform().matrix(), glam::Mat4::IDENTITY.to_cols_array_2d());

        let (translation, _, _) = nodes[1].transform().decomposed();
        assert_eq!(translation, [5.0, 3.0, 2.0]);

        let primitive = nodes[0].mesh().unwrap().primitives().next().unwrap();
        assert_eq!(primitive.material().name(), Some("M_Paint"));
        assert_eq!(primitive.indices().unwrap().count(), 36);
        assert_eq!(primitive.get(&gltf::Semantic::Positions).unwrap().count(), 24);
        assert_eq!(document.materials().count(), 1);
    }
}
