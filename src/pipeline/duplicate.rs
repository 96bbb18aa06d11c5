use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::scene_graph::{Mesh, Node, NodeId, Scene};

/// Material edits applied to duplicates, never to the originals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialOptions {
    pub override_material: Option<String>,
    /// Limits the override to primitives that have no material.
    pub assign_if_no_material: bool,
    pub prefix: Option<String>,
}

impl MaterialOptions {
    pub fn is_noop(&self) -> bool {
        self.override_material.is_none() && self.prefix.as_deref().map_or(true, str::is_empty)
    }

    pub fn apply(&self, mesh: &mut Mesh) {
        for primitive in &mut mesh.primitives {
            if let Some(material) = &self.override_material {
                if !self.assign_if_no_material || primitive.material.is_none() {
                    primitive.material = Some(material.clone());
                }
            }

            if let (Some(prefix), Some(material)) = (&self.prefix, &mut primitive.material) {
                if !prefix.is_empty() && !material.starts_with(prefix.as_str()) {
                    material.insert_str(0, prefix);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DuplicateOptions {
    /// Bake the modifier stack into the copy's geometry.
    pub apply_modifiers: bool,
    pub visible_modifiers_only: bool,
    pub materials: MaterialOptions,
}

#[derive(Debug, Default)]
pub struct Duplication {
    pub nodes: Vec<NodeId>,
    /// Modifiers that could not be baked and were skipped.
    pub warnings: Vec<String>,
}

/// Copies `sources` next to themselves: same parent, same local transform,
/// copy-on-write geometry. Either every source is copied or nothing is left
/// behind.
pub fn duplicate(
    scene: &mut Scene,
    sources: &[NodeId],
    options: &DuplicateOptions,
) -> PipelineResult<Duplication> {
    let mut duplication = Duplication::default();

    for &source in sources {
        match duplicate_one(scene, source, options, &mut duplication.warnings) {
            Ok(id) => duplication.nodes.push(id),
            Err(err) => {
                for id in duplication.nodes.drain(..) {
                    scene.remove_object(id);
                }
                return Err(err);
            }
        }
    }

    log::debug!("Duplicated {} node(s)", duplication.nodes.len());
    Ok(duplication)
}

fn duplicate_one(
    scene: &mut Scene,
    source: NodeId,
    options: &DuplicateOptions,
    warnings: &mut Vec<String>,
) -> PipelineResult<NodeId> {
    let original = scene
        .get_object(source)
        .ok_or_else(|| PipelineError::duplication(format!("{:?}", source), "node does not exist"))?;
    let mesh = original
        .shared_mesh()
        .cloned()
        .ok_or_else(|| PipelineError::duplication(&original.name, "node has no mesh"))?;

    let mut copy = Node::new(original.name.clone())
        .with_transform(original.transform)
        .with_shared_mesh(mesh);
    copy.modifiers = original.modifiers.clone();
    let parent = original.parent_id();

    if options.apply_modifiers {
        bake_modifiers(&mut copy, options.visible_modifiers_only, warnings);
    }
    if !options.materials.is_noop() {
        if let Some(mesh) = copy.mesh_mut() {
            options.materials.apply(mesh);
        }
    }

    let id = scene.add_object(copy);
    if parent.is_some() && !scene.set_object_parent(id, parent) {
        scene.remove_object(id);
        return Err(PipelineError::duplication(
            format!("{:?}", source),
            "could not attach copy to the original parent",
        ));
    }

    Ok(id)
}

fn bake_modifiers(node: &mut Node, visible_only: bool, warnings: &mut Vec<String>) {
    let modifiers = std::mem::take(&mut node.modifiers);
    if modifiers.is_empty() {
        return;
    }

    let node_name = node.name.clone();
    let Some(mesh) = node.mesh_mut() else {
        return;
    };

    for modifier in modifiers
        .iter()
        .filter(|modifier| !visible_only || modifier.show_in_viewport)
    {
        if let Err(err) = modifier.apply(mesh) {
            let message = format!("{}: skipped {}", node_name, err);
            log::warn!("{}", message);
            warnings.push(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::{Modifier, MirrorAxis, Transform};
    use glam::{DVec3, Vec3};
    use std::sync::Arc;

    fn cube(name: &str) -> Node {
        Node::with_mesh(name, Mesh::cuboid(name, Vec3::splat(0.5)))
    }

    #[test]
    fn copies_keep_parent_and_world_transform() {
        let mut scene = Scene::new();
        let anchor = scene.add_object(
            Node::new("Anchor").with_transform(Transform::from_translation(DVec3::new(5.0, 3.0, 2.0))),
        );
        let mesh = scene.add_child(
            anchor,
            cube("Mesh").with_transform(Transform::from_translation(DVec3::ONE)),
        );

        let duplication = duplicate(&mut scene, &[mesh], &DuplicateOptions::default()).unwrap();
        let copy = duplication.nodes[0];

        assert_ne!(copy, mesh);
        assert_eq!(scene.get_object(copy).unwrap().parent_id(), Some(anchor));
        assert_eq!(scene.world_matrix(copy), scene.world_matrix(mesh));
        assert!(Arc::ptr_eq(
            scene.get_object(copy).unwrap().shared_mesh().unwrap(),
            scene.get_object(mesh).unwrap().shared_mesh().unwrap(),
        ));
    }

    #[test]
    fn failure_leaves_no_partial_copies() {
        let mut scene = Scene::new();
        let mesh = scene.add_object(cube("Mesh"));
        let empty = scene.add_object(Node::new("Empty"));
        let before = scene.object_count();

        let result = duplicate(&mut scene, &[mesh, empty], &DuplicateOptions::default());

        assert!(matches!(result, Err(PipelineError::DuplicationFailed { .. })));
        assert_eq!(scene.object_count(), before);
    }

    #[test]
    fn baking_modifiers_leaves_the_original_alone() {
        let mut scene = Scene::new();
        let mesh = scene.add_object(
            cube("Mesh")
                .with_modifier(Modifier::mirror("Mirror", MirrorAxis::X))
                .with_modifier(Modifier::displace("Hidden", 1.0).hidden())
                .with_modifier(Modifier::displace("Broken", f32::NAN)),
        );
        let options = DuplicateOptions {
            apply_modifiers: true,
            visible_modifiers_only: true,
            ..Default::default()
        };

        let duplication = duplicate(&mut scene, &[mesh], &options).unwrap();
        let copy = scene.get_object(duplication.nodes[0]).unwrap();

        assert_eq!(copy.face_count(), 24);
        assert!(copy.modifiers.is_empty());
        assert_eq!(duplication.warnings.len(), 1);

        let original = scene.get_object(mesh).unwrap();
        assert_eq!(original.face_count(), 12);
        assert_eq!(original.modifiers.len(), 3);
    }

    #[test]
    fn material_options_only_touch_the_copy() {
        let mut scene = Scene::new();
        let mesh = scene.add_object(cube("Mesh"));
        let options = DuplicateOptions {
            materials: MaterialOptions {
                override_material: Some("Paint".to_string()),
                assign_if_no_material: true,
                prefix: Some("M_".to_string()),
            },
            ..Default::default()
        };

        let duplication = duplicate(&mut scene, &[mesh], &options).unwrap();

        let copy = scene.get_object(duplication.nodes[0]).unwrap();
        assert_eq!(copy.mesh().unwrap().primitives[0].material.as_deref(), Some("M_Paint"));
        assert_eq!(scene.get_object(mesh).unwrap().mesh().unwrap().primitives[0].material, None);
    }

    #[test]
    fn assign_if_no_material_keeps_existing_materials() {
        let mut mesh = Mesh::cuboid("Box", Vec3::ONE);
        mesh.primitives[0].material = Some("M_Wood".to_string());
        let options = MaterialOptions {
            override_material: Some("Paint".to_string()),
            assign_if_no_material: true,
            prefix: Some("M_".to_string()),
        };

        options.apply(&mut mesh);
        assert_eq!(mesh.primitives[0].material.as_deref(), Some("M_Wood"));
    }
}
