use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scene_graph::mesh::{Mesh, Primitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MirrorAxis {
    X,
    Y,
    Z,
}

impl MirrorAxis {
    fn flip(self, mut v: Vec3) -> Vec3 {
        match self {
            MirrorAxis::X => v.x = -v.x,
            MirrorAxis::Y => v.y = -v.y,
            MirrorAxis::Z => v.z = -v.z,
        }
        v
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    /// Adds a copy of the geometry reflected across the local plane normal to `axis`.
    Mirror { axis: MirrorAxis },
    /// Pushes every vertex along its normal.
    Displace { strength: f32 },
}

/// A non-destructive geometry operation attached to a node.
///
/// Writers never evaluate modifiers. They reach exported geometry only when a
/// duplicate has its stack baked before merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub name: String,
    #[serde(default = "default_visible")]
    pub show_in_viewport: bool,
    pub kind: ModifierKind,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModifierError {
    #[error("modifier `{name}` has a non-finite strength")]
    NonFinite { name: String },
    #[error("modifier `{name}` would exceed the 32-bit index range")]
    TooLarge { name: String },
}

impl Modifier {
    pub fn mirror(name: impl Into<String>, axis: MirrorAxis) -> Self {
        Self {
            name: name.into(),
            show_in_viewport: true,
            kind: ModifierKind::Mirror { axis },
        }
    }

    pub fn displace(name: impl Into<String>, strength: f32) -> Self {
        Self {
            name: name.into(),
            show_in_viewport: true,
            kind: ModifierKind::Displace { strength },
        }
    }

    pub fn hidden(mut self) -> Self {
        self.show_in_viewport = false;
        self
    }

    /// Bakes the modifier into `mesh`. The mesh is untouched on error.
    pub fn apply(&self, mesh: &mut Mesh) -> Result<(), ModifierError> {
        match self.kind {
            ModifierKind::Mirror { axis } => {
                let fits = mesh
                    .primitives
                    .iter()
                    .all(|p| p.vertices.len() * 2 <= u32::MAX as usize);
                if !fits {
                    return Err(ModifierError::TooLarge {
                        name: self.name.clone(),
                    });
                }

                for primitive in &mut mesh.primitives {
                    mirror_primitive(primitive, axis);
                }
            }
            ModifierKind::Displace { strength } => {
                if !strength.is_finite() {
                    return Err(ModifierError::NonFinite {
                        name: self.name.clone(),
                    });
                }

                for vertex in mesh.primitives.iter_mut().flat_map(|p| &mut p.vertices) {
                    vertex.position += vertex.normal * strength;
                }
            }
        }

        Ok(())
    }
}

fn mirror_primitive(primitive: &mut Primitive, axis: MirrorAxis) {
    let offset = primitive.vertices.len() as u32;

    let mirrored = primitive
        .vertices
        .iter()
        .map(|vertex| {
            let mut vertex = *vertex;
            vertex.position = axis.flip(vertex.position);
            vertex.normal = axis.flip(vertex.normal);
            vertex
        })
        .collect::<Vec<_>>();

    // Reflection reverses orientation, so each mirrored triangle is wound backwards.
    let indices = primitive
        .indices
        .chunks_exact(3)
        .flat_map(|t| [t[0] + offset, t[2] + offset, t[1] + offset])
        .collect::<Vec<_>>();

    primitive.vertices.extend(mirrored);
    primitive.indices.extend(indices);
}
