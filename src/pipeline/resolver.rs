//! Anchor discovery over the group hierarchy.
//!
//! An anchor is a member node without geometry that has at least one direct
//! child with geometry. Its export unit is every mesh node reachable from it
//! through mesh nodes only; a nested empty stops the walk, since it is either
//! an anchor of its own or plain structure.

use std::collections::HashSet;

use crate::scene_graph::{GroupId, NodeId, Scene, SceneNode};

#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub id: NodeId,
    pub name: String,
    pub meshes: Vec<NodeId>,
}

/// Anchors of `group` and all of its subgroups, de-duplicated by node id, in
/// depth-first order (members before subgroups). Empty when there are none.
pub fn find_anchors(scene: &Scene, group: GroupId) -> Vec<Anchor> {
    let mut anchors = Vec::new();
    let mut seen = HashSet::new();

    for member in group_members(scene, group) {
        let Some(node) = scene.node_ref(member) else {
            continue;
        };

        if let Some(meshes) = anchor_meshes(&node) {
            if seen.insert(member) {
                anchors.push(Anchor {
                    id: member,
                    name: node.display_name().to_string(),
                    meshes,
                });
            }
        }
    }

    anchors
}

/// Mesh-bearing members of `group` and its subgroups, de-duplicated by id.
pub fn mesh_nodes(scene: &Scene, group: GroupId) -> Vec<NodeId> {
    group_members(scene, group)
        .into_iter()
        .filter(|id| scene.node_ref(*id).is_some_and(|node| node.has_mesh()))
        .collect()
}

/// Mesh-bearing members of `group` itself, ignoring its subgroups.
pub fn direct_mesh_members(scene: &Scene, group: GroupId) -> Vec<NodeId> {
    scene
        .get_group(group)
        .map(|group| {
            group
                .members
                .iter()
                .copied()
                .filter(|id| scene.node_ref(*id).is_some_and(|node| node.has_mesh()))
                .collect()
        })
        .unwrap_or_default()
}

/// The mesh nodes an anchor exports, or `None` when `node` is not an anchor.
pub fn anchor_meshes<N: SceneNode>(node: &N) -> Option<Vec<NodeId>> {
    if node.has_mesh() {
        return None;
    }

    let mut pending = node
        .get_children()
        .into_iter()
        .filter(|child| child.has_mesh())
        .collect::<Vec<_>>();
    if pending.is_empty() {
        return None;
    }

    // Depth-first, keeping child order.
    pending.reverse();
    let mut meshes = Vec::new();
    while let Some(current) = pending.pop() {
        meshes.push(current.node_id());
        let mut children = current
            .get_children()
            .into_iter()
            .filter(|child| child.has_mesh())
            .collect::<Vec<_>>();
        children.reverse();
        pending.extend(children);
    }

    Some(meshes)
}

/// Members of the group tree in visiting order, each id once. Subgroup
/// cycles are cut at the first repeated group.
fn group_members(scene: &Scene, root: GroupId) -> Vec<NodeId> {
    let mut members = Vec::new();
    let mut seen_members = HashSet::new();
    let mut seen_groups = HashSet::new();
    let mut pending = vec![root];

    while let Some(group_id) = pending.pop() {
        if !seen_groups.insert(group_id) {
            continue;
        }
        let Some(group) = scene.get_group(group_id) else {
            continue;
        };

        members.extend(
            group
                .members
                .iter()
                .copied()
                .filter(|id| seen_members.insert(*id)),
        );
        pending.extend(group.subgroups.iter().rev());
    }

    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::{Group, Mesh, Node};
    use glam::Vec3;

    fn cube(name: &str) -> Node {
        Node::with_mesh(name, Mesh::cuboid(name, Vec3::splat(0.5)))
    }

    #[test]
    fn finds_anchors_in_nested_groups() {
        let mut scene = Scene::new();
        let outer_anchor = scene.add_object(Node::new("Outer"));
        let outer_mesh = scene.add_child(outer_anchor, cube("OuterMesh"));
        let inner_anchor = scene.add_object(Node::new("Inner"));
        let inner_mesh = scene.add_child(inner_anchor, cube("InnerMesh"));

        let inner = scene.add_group(Group::new("Inner").with_members([inner_anchor]));
        let outer = scene.add_group(Group::new("Outer").with_members([outer_anchor]));
        scene.add_subgroup(outer, inner);

        let anchors = find_anchors(&scene, outer);
        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[0].id, outer_anchor);
        assert_eq!(anchors[0].meshes, vec![outer_mesh]);
        assert_eq!(anchors[1].id, inner_anchor);
        assert_eq!(anchors[1].meshes, vec![inner_mesh]);
    }

    #[test]
    fn deduplicates_by_identity_not_name() {
        let mut scene = Scene::new();
        let first = scene.add_object(Node::new("Empty"));
        scene.add_child(first, cube("A"));
        let second = scene.add_object(Node::new("Empty"));
        scene.add_child(second, cube("B"));

        let shared = scene.add_group(Group::new("Shared").with_members([first]));
        let root = scene.add_group(Group::new("Root").with_members([first, second]));
        scene.add_subgroup(root, shared);

        let anchors = find_anchors(&scene, root);
        let ids = anchors.iter().map(|a| a.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn empty_without_mesh_children_is_not_an_anchor() {
        let mut scene = Scene::new();
        let lonely = scene.add_object(Node::new("Lonely"));
        scene.add_child(lonely, Node::new("AlsoEmpty"));
        let loose_mesh = scene.add_object(cube("Loose"));
        let group = scene.add_group(Group::new("G").with_members([lonely, loose_mesh]));

        assert!(find_anchors(&scene, group).is_empty());
        assert_eq!(mesh_nodes(&scene, group), vec![loose_mesh]);
    }

    #[test]
    fn direct_members_skip_subgroups() {
        let mut scene = Scene::new();
        let own = scene.add_object(cube("Own"));
        let nested = scene.add_object(cube("Nested"));
        let empty = scene.add_object(Node::new("Empty"));

        let outer = scene.add_group(Group::new("Outer").with_members([empty, own]));
        let inner = scene.add_group(Group::new("Inner").with_members([nested]));
        scene.add_subgroup(outer, inner);

        assert_eq!(direct_mesh_members(&scene, outer), vec![own]);
        assert_eq!(mesh_nodes(&scene, outer), vec![own, nested]);
    }

    #[test]
    fn mesh_walk_stops_at_nested_empties() {
        let mut scene = Scene::new();
        let anchor = scene.add_object(Node::new("Anchor"));
        let body = scene.add_child(anchor, cube("Body"));
        let wheel = scene.add_child(body, cube("Wheel"));
        let socket = scene.add_child(anchor, Node::new("Socket"));
        scene.add_child(socket, cube("Attachment"));

        let meshes = anchor_meshes(&scene.node_ref(anchor).unwrap()).unwrap();
        assert_eq!(meshes, vec![body, wheel]);
    }

    #[test]
    fn subgroup_cycles_terminate() {
        let mut scene = Scene::new();
        let anchor = scene.add_object(Node::new("Anchor"));
        scene.add_child(anchor, cube("Mesh"));

        let a = scene.add_group(Group::new("A").with_members([anchor]));
        let b = scene.add_group(Group::new("B"));
        scene.add_subgroup(a, b);
        scene.add_subgroup(b, a);

        assert_eq!(find_anchors(&scene, a).len(), 1);
        assert_eq!(find_anchors(&scene, b).len(), 1);
    }
}
