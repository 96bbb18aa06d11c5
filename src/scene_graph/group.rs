use id_arena::Id;

use crate::scene_graph::node::NodeId;

pub type GroupId = Id<Group>;

/// Named membership container. Membership is unrelated to parenting: a node
/// may belong to several groups, and its group says nothing about who moves it.
#[derive(Debug, Clone, Default)]
pub struct Group {
    pub name: String,
    pub members: Vec<NodeId>,
    pub subgroups: Vec<GroupId>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_members(mut self, members: impl IntoIterator<Item = NodeId>) -> Self {
        for member in members {
            self.add_member(member);
        }
        self
    }

    pub fn add_member(&mut self, node: NodeId) -> bool {
        if self.members.contains(&node) {
            return false;
        }
        self.members.push(node);
        true
    }

    pub fn add_subgroup(&mut self, group: GroupId) -> bool {
        if self.subgroups.contains(&group) {
            return false;
        }
        self.subgroups.push(group);
        true
    }
}
