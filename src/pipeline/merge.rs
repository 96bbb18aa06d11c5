use std::sync::Arc;

use glam::{DMat3, DMat4, DVec3};

use crate::math::EPSILON;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::scene_graph::{Mesh, Node, NodeId, Primitive, Scene};

/// Joins parentless mesh nodes into one node with an identity transform.
///
/// Each input's transform is baked into its vertices and primitives sharing a
/// material are consolidated in first-seen order. The inputs are destroyed on
/// success and untouched on error. A single input is returned as is.
pub fn merge(scene: &mut Scene, ids: &[NodeId]) -> PipelineResult<NodeId> {
    let Some(&first) = ids.first() else {
        return Err(PipelineError::Merge("no inputs".to_string()));
    };

    let mut inputs = Vec::with_capacity(ids.len());
    for &id in ids {
        let node = scene
            .get_object(id)
            .ok_or_else(|| PipelineError::Merge(format!("input {:?} does not exist", id)))?;
        if node.parent_id().is_some() {
            return Err(PipelineError::Merge(format!("`{}` still has a parent", node.name)));
        }
        let mesh = node
            .shared_mesh()
            .ok_or_else(|| PipelineError::Merge(format!("`{}` has no mesh", node.name)))?;

        inputs.push((node.transform.local_matrix(), mesh.clone()));
    }

    if ids.len() == 1 {
        return Ok(first);
    }

    let name = scene
        .get_object(first)
        .map(|node| node.name.clone())
        .unwrap_or_default();
    let merged = bake_meshes(&name, &inputs)?;
    let face_count = merged.face_count();

    let merged_id = scene.add_object(Node::with_mesh(name.clone(), merged));
    for &id in ids {
        scene.remove_object(id);
    }

    log::debug!("Merged {} node(s) into `{}` ({} faces)", ids.len(), name, face_count);
    Ok(merged_id)
}

fn bake_meshes(name: &str, inputs: &[(DMat4, Arc<Mesh>)]) -> PipelineResult<Mesh> {
    let mut merged = Mesh::new(name);

    for (matrix, mesh) in inputs {
        if let Some(primitive) = mesh.primitives.iter().find(|primitive| {
            primitive
                .indices
                .iter()
                .any(|&index| index as usize >= primitive.vertices.len())
        }) {
            return Err(PipelineError::Merge(format!(
                "`{}` has indices past its {} vertices",
                mesh.name,
                primitive.vertices.len()
            )));
        }

        let mut baked = Mesh::clone(mesh);
        baked.transform(matrix);

        for source in baked.primitives {
            let target = match merged
                .primitives
                .iter()
                .position(|p| p.material == source.material)
            {
                Some(index) => &mut merged.primitives[index],
                None => {
                    merged.primitives.push(Primitive {
                        material: source.material.clone(),
                        ..Default::default()
                    });
                    let last = merged.primitives.len() - 1;
                    &mut merged.primitives[last]
                }
            };

            let vertex_offset = u32::try_from(target.vertices.len())
                .ok()
                .filter(|offset| {
                    u32::try_from(source.vertices.len())
                        .is_ok_and(|count| offset.checked_add(count).is_some())
                })
                .ok_or_else(|| {
                    PipelineError::Merge(format!("`{}` exceeds the 32-bit index range", name))
                })?;

            // Every index is below the source's vertex count, so this cannot overflow.
            target.vertices.extend(source.vertices);
            target
                .indices
                .extend(source.indices.iter().map(|index| index + vertex_offset));
        }
    }

    Ok(merged)
}

/// Moves the origin of `id` to `target` (a world-space point) while every
/// vertex keeps its world position.
///
/// The offset is worked out in the node's own space and baked into its
/// geometry, so it holds with or without a parent. Only meant for nodes
/// without children; children would follow the new origin.
pub fn relocate_origin(scene: &mut Scene, id: NodeId, target: DVec3) -> PipelineResult<()> {
    let name = match scene.get_object(id) {
        Some(node) => node.name.clone(),
        None => return Err(PipelineError::relocation(format!("{:?}", id), "node does not exist")),
    };
    let world = scene
        .world_matrix(id)
        .ok_or_else(|| PipelineError::relocation(&name, "broken parent chain"))?;

    if !world.is_finite() || !target.is_finite() {
        return Err(PipelineError::relocation(&name, "non-finite transform"));
    }
    if DMat3::from_mat4(world).determinant().abs() < 1e-12 {
        return Err(PipelineError::relocation(&name, "world transform is singular"));
    }

    let delta = world.inverse().transform_point3(target);

    if let Some(node) = scene.get_object_mut(id) {
        let translation = node.transform.local_matrix().transform_point3(delta);
        node.transform.set_translation(translation);
        if let Some(mesh) = node.mesh_mut() {
            mesh.transform(&DMat4::from_translation(-delta));
        }
    }

    let origin = scene.world_translation(id).unwrap_or(DVec3::NAN);
    let tolerance = EPSILON * target.abs().max_element().max(1.0);
    if !origin.abs_diff_eq(target, tolerance) {
        return Err(PipelineError::relocation(
            &name,
            format!("origin landed at {} instead of {}", origin, target),
        ));
    }

    Ok(())
}
