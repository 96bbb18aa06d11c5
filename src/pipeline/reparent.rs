use glam::DMat4;

use crate::scene_graph::{NodeId, Scene, Transform};

/// Clears the parent link of `id` without moving it in world space.
///
/// World matrices that have no T·R·S form (shear inherited from a rotated,
/// non-uniformly scaled parent, or a collapsed axis) keep their best-fitting
/// T·R·S as the local transform and push the remainder into the node's own
/// geometry. Returns `false` when the node does not exist.
pub fn detach_preserving_world(scene: &mut Scene, id: NodeId) -> bool {
    let Some(world) = scene.world_matrix(id) else {
        return false;
    };
    let has_parent = scene
        .get_object(id)
        .is_some_and(|node| node.parent_id().is_some());
    if !has_parent {
        return true;
    }

    scene.set_object_parent(id, None);

    let (local, residual) = match Transform::from_matrix(world) {
        Some(local) => {
            let residual = local.local_matrix().inverse() * world;
            (local, residual)
        }
        None => (Transform::IDENTITY, world),
    };

    if !residual.abs_diff_eq(DMat4::IDENTITY, 1e-9) {
        if let Some(node) = scene.get_object_mut(id) {
            log::debug!("Baking non-TRS remainder into `{}`", node.name);
            if let Some(mesh) = node.mesh_mut() {
                mesh.transform(&residual);
            }
        }
    }

    scene.set_object_transform(id, local);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::{Mesh, Node};
    use approx::assert_relative_eq;
    use glam::{DQuat, DVec3, Vec3};
    use std::f64::consts::FRAC_PI_4;

    fn world_positions(scene: &Scene, id: NodeId) -> Vec<DVec3> {
        let matrix = scene.world_matrix(id).unwrap();
        scene
            .get_object(id)
            .unwrap()
            .mesh()
            .unwrap()
            .positions()
            .map(|p| matrix.transform_point3(p.as_dvec3()))
            .collect()
    }

    #[test]
    fn keeps_world_transform() {
        let mut scene = Scene::new();
        let parent = scene.add_object(Node::new("Parent").with_transform(Transform::from_trs(
            DVec3::new(5.0, 3.0, 2.0),
            DQuat::from_rotation_y(0.7),
            DVec3::splat(2.0),
        )));
        let child = scene.add_child(
            parent,
            Node::new("Child").with_transform(Transform::from_translation(DVec3::X)),
        );
        let before = scene.world_matrix(child).unwrap();

        assert!(detach_preserving_world(&mut scene, child));

        assert_eq!(scene.get_object(child).unwrap().parent_id(), None);
        assert!(scene.get_object(parent).unwrap().child_ids().is_empty());
        assert!(scene.world_matrix(child).unwrap().abs_diff_eq(before, 1e-9));
    }

    #[test]
    fn sheared_world_is_baked_into_geometry() {
        let mut scene = Scene::new();
        let parent = scene.add_object(Node::new("Stretched").with_transform(Transform::from_trs(
            DVec3::ZERO,
            DQuat::IDENTITY,
            DVec3::new(3.0, 1.0, 1.0),
        )));
        let child = scene.add_child(
            parent,
            Node::with_mesh("Box", Mesh::cuboid("Box", Vec3::ONE)).with_transform(
                Transform::from_trs(DVec3::Y, DQuat::from_rotation_z(FRAC_PI_4), DVec3::ONE),
            ),
        );
        let before = world_positions(&scene, child);

        assert!(detach_preserving_world(&mut scene, child));

        let after = world_positions(&scene, child);
        for (a, b) in before.iter().zip(&after) {
            assert_relative_eq!(a.x, b.x, epsilon = 1e-4);
            assert_relative_eq!(a.y, b.y, epsilon = 1e-4);
            assert_relative_eq!(a.z, b.z, epsilon = 1e-4);
        }
    }

    #[test]
    fn parentless_nodes_are_untouched() {
        let mut scene = Scene::new();
        let transform = Transform::from_translation(DVec3::new(1.0, 2.0, 3.0));
        let node = scene.add_object(Node::new("Root").with_transform(transform));

        assert!(detach_preserving_world(&mut scene, node));
        assert_eq!(*scene.get_object_transform(node).unwrap(), transform);
    }
}
