use anyhow::Context;
use bytemuck::{Pod, Zeroable};
use glam::{DMat3, DMat4, Vec2, Vec3};
use gltf::buffer;
use itertools::izip;

use crate::math::AABB;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coords: Vec2,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, tex_coords: Vec2) -> Self {
        Self {
            position,
            normal,
            tex_coords,
        }
    }
}

/// Triangle list drawn with a single material.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Primitive {
    pub material: Option<String>,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Primitive {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vertex; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|triangle| {
            Some([
                *self.vertices.get(triangle[0] as usize)?,
                *self.vertices.get(triangle[1] as usize)?,
                *self.vertices.get(triangle[2] as usize)?,
            ])
        })
    }

    fn flip_winding(&mut self) {
        for triangle in self.indices.chunks_exact_mut(3) {
            triangle.swap(1, 2);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
}

pub type Buffers<'a> = &'a [buffer::Data];

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primitives: Vec::new(),
        }
    }

    pub fn from_gltf(
        name: impl Into<String>,
        mesh: gltf::Mesh,
        buffers: Buffers,
    ) -> anyhow::Result<Mesh> {
        let mut model = Mesh::new(name);

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                return Err(anyhow::anyhow!(
                    "Unsupported primitive mode: {:?}",
                    primitive.mode()
                ));
            }

            let reader =
                primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

            let positions = reader
                .read_positions()
                .context("Primitive without positions")?
                .map(Vec3::from)
                .collect::<Vec<_>>();
            let vertex_count = positions.len();

            let normals = reader
                .read_normals()
                .map(|normals| normals.map(Vec3::from).collect::<Vec<_>>())
                .filter(|normals| normals.len() == vertex_count)
                .unwrap_or_else(|| vec![Vec3::ZERO; vertex_count]);

            let tex_coords = reader
                .read_tex_coords(0)
                .map(|tex_coords| tex_coords.into_f32().map(Vec2::from).collect::<Vec<_>>())
                .filter(|tex_coords| tex_coords.len() == vertex_count)
                .unwrap_or_else(|| vec![Vec2::ZERO; vertex_count]);

            let vertices = izip!(positions, normals, tex_coords)
                .map(|(position, normal, tex_coords)| Vertex::new(position, normal, tex_coords))
                .collect::<Vec<Vertex>>();

            let indices = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect::<Vec<u32>>(),
                None => (0..u32::try_from(vertex_count)?).collect(),
            };

            model.primitives.push(Primitive {
                material: primitive.material().name().map(String::from),
                vertices,
                indices,
            });
        }

        if model.primitives.is_empty() {
            return Err(anyhow::anyhow!("Mesh without primitives: {}", model.name));
        }

        Ok(model)
    }

    /// Axis-aligned box centred on the local origin, 24 vertices and 12 triangles.
    pub fn cuboid(name: impl Into<String>, half_extents: Vec3) -> Mesh {
        let faces = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (Vec3::NEG_X, Vec3::Y, Vec3::NEG_Z),
            (Vec3::Y, Vec3::Z, Vec3::X),
            (Vec3::NEG_Y, Vec3::Z, Vec3::NEG_X),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::X, Vec3::NEG_Y),
        ];

        let mut primitive = Primitive::default();
        for (normal, u, v) in faces {
            let base = primitive.vertices.len() as u32;
            for (s, t) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let position = (normal + u * s + v * t) * half_extents;
                let tex_coords = Vec2::new((s + 1.0) * 0.5, (t + 1.0) * 0.5);
                primitive
                    .vertices
                    .push(Vertex::new(position, normal, tex_coords));
            }
            primitive
                .indices
                .extend([base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Mesh {
            name: name.into(),
            primitives: vec![primitive],
        }
    }

    pub fn face_count(&self) -> usize {
        self.primitives.iter().map(Primitive::triangle_count).sum()
    }

    pub fn vertex_count(&self) -> usize {
        self.primitives.iter().map(|p| p.vertices.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.face_count() == 0
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.primitives
            .iter()
            .flat_map(|p| p.vertices.iter().map(|v| v.position))
    }

    /// Bounds of the vertices after applying `matrix`.
    pub fn bounds(&self, matrix: &DMat4) -> Option<AABB> {
        AABB::from_points(
            self.positions()
                .map(|position| matrix.transform_point3(position.as_dvec3())),
        )
    }

    /// Bakes `matrix` into the vertex data. Normals go through the
    /// inverse-transpose and winding is flipped for mirroring matrices.
    pub fn transform(&mut self, matrix: &DMat4) {
        let linear = DMat3::from_mat4(*matrix);
        let determinant = linear.determinant();
        let normal_matrix = (determinant.abs() > f64::EPSILON).then(|| linear.inverse().transpose());

        for primitive in &mut self.primitives {
            for vertex in &mut primitive.vertices {
                vertex.position = matrix
                    .transform_point3(vertex.position.as_dvec3())
                    .as_vec3();

                if let Some(normal_matrix) = normal_matrix {
                    vertex.normal = (normal_matrix * vertex.normal.as_dvec3())
                        .normalize_or_zero()
                        .as_vec3();
                }
            }

            if determinant < 0.0 {
                primitive.flip_winding();
            }
        }
    }
}
