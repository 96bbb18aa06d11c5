use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use glam::{DMat4, DVec3, Quat, Vec3};
use id_arena::Arena;
use serde::Deserialize;

use crate::math::AABB;
use crate::scene_graph::group::{Group, GroupId};
use crate::scene_graph::mesh::{Buffers, Mesh};
use crate::scene_graph::modifier::Modifier;
use crate::scene_graph::node::{Node, NodeId};
use crate::scene_graph::transform::Transform;

/// Transient UI selection: what the host would hand to a writer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub selected: Vec<NodeId>,
    pub active: Option<NodeId>,
}

pub struct Scene {
    objects: Arena<Node>,
    /// Number of tombstoned slots in `objects`.
    removed: usize,
    groups: Arena<Group>,
    selection: Selection,
    session_active: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Arena::new(),
            removed: 0,
            groups: Arena::new(),
            selection: Selection::default(),
            session_active: false,
        }
    }

    pub fn load_gltf(path: impl AsRef<Path>) -> anyhow::Result<Scene> {
        let path = path.as_ref();
        let (document, buffers, _images) = gltf::import(path)
            .with_context(|| format!("Failed to import {}", path.display()))?;

        let gltf_scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .context("No scenes in gltf")?;

        let mut scene = Scene::new();
        scene.spawn_gltf_scene(&buffers, &gltf_scene)?;

        Ok(scene)
    }

    pub fn add_object(&mut self, object: Node) -> NodeId {
        self.objects.alloc(object)
    }

    /// Adds `object` as a child of `parent`, keeping its transform local to the parent.
    pub fn add_child(&mut self, parent: NodeId, object: Node) -> NodeId {
        let object_id = self.add_object(object);
        self.set_object_parent(object_id, Some(parent));
        object_id
    }

    pub fn contains(&self, object_id: NodeId) -> bool {
        self.get_object(object_id).is_some()
    }

    pub fn get_object(&self, object_id: NodeId) -> Option<&Node> {
        self.objects.get(object_id).filter(|object| !object.removed)
    }

    pub fn get_object_mut(&mut self, object_id: NodeId) -> Option<&mut Node> {
        self.objects.get_mut(object_id).filter(|object| !object.removed)
    }

    /// First node carrying `name`. Names are not unique; prefer ids.
    pub fn get_object_by_name(&self, name: &str) -> Option<NodeId> {
        self.objects()
            .find(|(_, object)| object.name == name)
            .map(|(id, _)| id)
    }

    pub fn objects_by_name(&self, name: &str) -> Vec<NodeId> {
        self.objects()
            .filter(|(_, object)| object.name == name)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn objects(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.objects
            .iter()
            .filter(|(_, object)| !object.removed)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len() - self.removed
    }

    /// Destroys a node together with its whole subtree.
    ///
    /// Arena slots are never reused, so a stale id can never alias a newer
    /// node. A removed slot keeps only its fixed-size shell: name, mesh,
    /// modifiers and child list are released here.
    pub fn remove_object(&mut self, object_id: NodeId) -> bool {
        if !self.contains(object_id) {
            return false;
        }

        self.set_object_parent(object_id, None);

        let mut removed = HashSet::new();
        let mut pending = vec![object_id];
        while let Some(id) = pending.pop() {
            let Some(object) = self.objects.get_mut(id) else {
                continue;
            };
            if object.removed {
                continue;
            }

            pending.append(&mut object.child_ids);
            *object = Node {
                removed: true,
                ..Node::default()
            };
            removed.insert(id);
        }
        self.removed += removed.len();

        self.selection.selected.retain(|id| !removed.contains(id));
        if self.selection.active.is_some_and(|id| removed.contains(&id)) {
            self.selection.active = None;
        }
        for (_, group) in self.groups.iter_mut() {
            group.members.retain(|id| !removed.contains(id));
        }

        true
    }

    /// Sets the parent of an object and updates child relationships.
    ///
    /// Refuses (returning `false`) links that would create a cycle or point at
    /// a missing node. The local transform is kept as is.
    pub fn set_object_parent(&mut self, child_id: NodeId, new_parent_id: Option<NodeId>) -> bool {
        if !self.contains(child_id) {
            return false;
        }

        if let Some(new_parent_id) = new_parent_id {
            if !self.contains(new_parent_id) || self.is_ancestor_or_self(child_id, new_parent_id) {
                log::warn!("Refusing to parent {:?} under {:?}", child_id, new_parent_id);
                return false;
            }
        }

        // Remove from old parent's children list
        let old_parent_id = self.get_object(child_id).and_then(|child| child.parent_id);
        if let Some(old_parent_id) = old_parent_id {
            if let Some(old_parent) = self.get_object_mut(old_parent_id) {
                old_parent.child_ids.retain(|&id| id != child_id);
            }
        }

        // Set new parent and add to new parent's children list
        if let Some(child) = self.get_object_mut(child_id) {
            child.parent_id = new_parent_id;
        }
        if let Some(new_parent_id) = new_parent_id {
            if let Some(new_parent) = self.get_object_mut(new_parent_id) {
                new_parent.child_ids.push(child_id);
            }
        }

        true
    }

    /// Whether `ancestor` is `object_id` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, object_id: NodeId) -> bool {
        let mut current = Some(object_id);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get_object(id).and_then(|object| object.parent_id);
        }
        false
    }

    /// Composition of local transforms from the root down to `object_id`.
    pub fn world_matrix(&self, object_id: NodeId) -> Option<DMat4> {
        let object = self.get_object(object_id)?;
        let mut matrix = object.transform.local_matrix();
        let mut parent_id = object.parent_id;

        while let Some(id) = parent_id {
            let parent = self.get_object(id)?;
            matrix = parent.transform.local_matrix() * matrix;
            parent_id = parent.parent_id;
        }

        Some(matrix)
    }

    pub fn world_translation(&self, object_id: NodeId) -> Option<DVec3> {
        self.world_matrix(object_id)
            .map(|matrix| matrix.w_axis.truncate())
    }

    /// World-space bounds of the node's own geometry.
    pub fn world_bounds(&self, object_id: NodeId) -> Option<AABB> {
        let matrix = self.world_matrix(object_id)?;
        self.get_object(object_id)?.mesh()?.bounds(&matrix)
    }

    pub fn set_object_transform(&mut self, object_id: NodeId, transform: Transform) -> bool {
        match self.get_object_mut(object_id) {
            Some(object) => {
                object.transform = transform;
                true
            }
            None => false,
        }
    }

    pub fn set_object_translation(&mut self, object_id: NodeId, translation: DVec3) -> bool {
        match self.get_object_mut(object_id) {
            Some(object) => {
                object.transform.set_translation(translation);
                true
            }
            None => false,
        }
    }

    pub fn get_object_transform(&self, object_id: NodeId) -> Option<&Transform> {
        self.get_object(object_id).map(|object| &object.transform)
    }

    pub fn add_group(&mut self, group: Group) -> GroupId {
        self.groups.alloc(group)
    }

    pub fn get_group(&self, group_id: GroupId) -> Option<&Group> {
        self.groups.get(group_id)
    }

    pub fn get_group_by_name(&self, name: &str) -> Option<GroupId> {
        self.groups
            .iter()
            .find(|(_, group)| group.name == name)
            .map(|(id, _)| id)
    }

    /// Existing group called `name`, or a new empty one.
    pub fn ensure_group(&mut self, name: &str) -> GroupId {
        match self.get_group_by_name(name) {
            Some(id) => id,
            None => self.add_group(Group::new(name)),
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &Group)> + '_ {
        self.groups.iter()
    }

    pub fn add_to_group(&mut self, group_id: GroupId, object_id: NodeId) -> bool {
        if !self.contains(object_id) {
            return false;
        }
        self.groups
            .get_mut(group_id)
            .is_some_and(|group| group.add_member(object_id))
    }

    pub fn add_subgroup(&mut self, parent: GroupId, child: GroupId) -> bool {
        if parent == child || self.groups.get(child).is_none() {
            return false;
        }
        self.groups
            .get_mut(parent)
            .is_some_and(|group| group.add_subgroup(child))
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Replaces the selection, dropping ids that no longer exist.
    pub fn set_selection(&mut self, mut selection: Selection) {
        selection.selected.retain(|id| self.contains(*id));
        if selection.active.is_some_and(|id| !self.contains(id)) {
            selection.active = None;
        }
        self.selection = selection;
    }

    pub fn select_only(&mut self, object_ids: &[NodeId]) {
        self.set_selection(Selection {
            selected: object_ids.to_vec(),
            active: object_ids.first().copied(),
        });
    }

    pub fn is_session_active(&self) -> bool {
        self.session_active
    }

    pub(crate) fn try_begin_session(&mut self) -> bool {
        if self.session_active {
            return false;
        }
        self.session_active = true;
        true
    }

    pub(crate) fn end_session(&mut self) {
        self.session_active = false;
    }

    pub fn spawn_gltf_scene(
        &mut self,
        buffers: Buffers,
        scene: &gltf::Scene,
    ) -> anyhow::Result<Vec<NodeId>> {
        let mut meshes = HashMap::new();
        let mut roots = Vec::new();

        for node in scene.nodes() {
            roots.push(self.spawn_gltf_node(buffers, &node, None, &mut meshes)?);
        }

        Ok(roots)
    }

    fn spawn_gltf_node(
        &mut self,
        buffers: Buffers,
        node: &gltf::Node,
        parent: Option<NodeId>,
        meshes: &mut HashMap<usize, Arc<Mesh>>,
    ) -> anyhow::Result<NodeId> {
        let node_name = node.name().unwrap_or("Unnamed").to_string();
        let (translation, rotation, scale) = node.transform().decomposed();

        let transform = Transform::from_trs(
            Vec3::from(translation).as_dvec3(),
            Quat::from_array(rotation).as_dquat(),
            Vec3::from(scale).as_dvec3(),
        );
        let mut object = Node::new(node_name.clone()).with_transform(transform);

        if let Some(mesh) = node.mesh() {
            let mesh_index = mesh.index();

            let shared = match meshes.get(&mesh_index) {
                Some(shared) => shared.clone(),
                None => {
                    let mesh_name = mesh
                        .name()
                        .map(String::from)
                        .unwrap_or_else(|| format!("{} (Mesh)", node_name));

                    let model = Mesh::from_gltf(mesh_name, mesh, buffers)
                        .with_context(|| format!("Failed to read mesh of node {node_name}"))?;
                    let model = Arc::new(model);
                    meshes.insert(mesh_index, model.clone());

                    model
                }
            };

            object = object.with_shared_mesh(shared);
        }

        let extras = NodeExtras::parse(&node_name, node.extras());
        object.modifiers = extras.modifiers;

        let object_id = self.add_object(object);

        if let Some(parent_id) = parent {
            self.set_object_parent(object_id, Some(parent_id));
        }

        for group_name in &extras.groups {
            let group_id = self.ensure_group(group_name);
            self.add_to_group(group_id, object_id);
        }

        for child in node.children() {
            self.spawn_gltf_node(buffers, &child, Some(object_id), meshes)?;
        }

        Ok(object_id)
    }
}

/// Custom properties understood on glTF nodes.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NodeExtras {
    groups: Vec<String>,
    modifiers: Vec<Modifier>,
}

impl NodeExtras {
    fn parse(node_name: &str, extras: &gltf::json::Extras) -> Self {
        let Some(raw) = extras.as_ref() else {
            return Self::default();
        };

        serde_json::from_str(raw.get()).unwrap_or_else(|err| {
            log::debug!("Ignoring extras of node {}: {}", node_name, err);
            Self::default()
        })
    }
}
