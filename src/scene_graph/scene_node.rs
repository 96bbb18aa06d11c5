use glam::DMat4;

use crate::scene_graph::node::{Node, NodeId};
use crate::scene_graph::scene::Scene;

/// The narrow view of a host object that traversal code needs.
pub trait SceneNode: Sized {
    fn node_id(&self) -> NodeId;

    fn display_name(&self) -> &str;

    fn get_parent(&self) -> Option<Self>;

    fn get_children(&self) -> Vec<Self>;

    fn get_world_transform(&self) -> DMat4;

    fn has_mesh(&self) -> bool;
}

/// Borrowing adapter exposing a [`Scene`] node through [`SceneNode`].
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    scene: &'a Scene,
    id: NodeId,
    node: &'a Node,
}

impl Scene {
    pub fn node_ref(&self, id: NodeId) -> Option<NodeRef<'_>> {
        let node = self.get_object(id)?;
        Some(NodeRef {
            scene: self,
            id,
            node,
        })
    }
}

impl<'a> SceneNode for NodeRef<'a> {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn display_name(&self) -> &str {
        &self.node.name
    }

    fn get_parent(&self) -> Option<Self> {
        self.scene.node_ref(self.node.parent_id()?)
    }

    fn get_children(&self) -> Vec<Self> {
        self.node
            .child_ids()
            .iter()
            .filter_map(|id| self.scene.node_ref(*id))
            .collect()
    }

    fn get_world_transform(&self) -> DMat4 {
        // The node exists for as long as this borrow does, so the chain resolves.
        self.scene.world_matrix(self.id).unwrap_or(DMat4::IDENTITY)
    }

    fn has_mesh(&self) -> bool {
        self.node.has_mesh()
    }
}
