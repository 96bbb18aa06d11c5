use crate::pipeline::error::PipelineError;
use crate::scene_graph::{NodeId, Scene, Transform};

#[derive(Debug, Clone, Copy, PartialEq)]
struct CapturedNode {
    transform: Transform,
    parent: Option<NodeId>,
}

/// Exact copies of local transforms and parent links, taken before a session
/// touches the scene. Lives in memory only.
#[derive(Debug, Clone, Default)]
pub struct TransformSnapshot {
    entries: Vec<(NodeId, CapturedNode)>,
}

impl TransformSnapshot {
    /// Captures each existing node once. Missing ids are skipped.
    pub fn capture(scene: &Scene, ids: impl IntoIterator<Item = NodeId>) -> Self {
        let mut snapshot = Self::default();
        snapshot.extend(scene, ids);
        snapshot
    }

    pub fn extend(&mut self, scene: &Scene, ids: impl IntoIterator<Item = NodeId>) {
        for id in ids {
            if self.contains(id) {
                continue;
            }
            let Some(node) = scene.get_object(id) else {
                log::debug!("Not capturing missing node {:?}", id);
                continue;
            };

            self.entries.push((
                id,
                CapturedNode {
                    transform: node.transform,
                    parent: node.parent_id(),
                },
            ));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entries.iter().any(|(captured, _)| *captured == id)
    }

    /// Puts every captured node back. Never fails: nodes that vanished and
    /// parent links that had to be repaired come back as warnings. Running it
    /// twice leaves the scene as running it once.
    pub fn restore(&self, scene: &mut Scene) -> Vec<PipelineError> {
        let mut warnings = Vec::new();

        // Parents first, so a repaired link sees its final hierarchy.
        for (id, entry) in &self.entries {
            let Some(node) = scene.get_object(*id) else {
                warnings.push(PipelineError::InvariantViolation(format!(
                    "captured node {:?} no longer exists",
                    id
                )));
                continue;
            };

            if node.parent_id() != entry.parent {
                let name = node.name.clone();
                if scene.set_object_parent(*id, entry.parent) {
                    warnings.push(PipelineError::InvariantViolation(format!(
                        "`{}` was reparented during export; link restored",
                        name
                    )));
                } else {
                    warnings.push(PipelineError::InvariantViolation(format!(
                        "`{}` could not be re-linked to its original parent",
                        name
                    )));
                }
            }
        }

        for (id, entry) in &self.entries {
            scene.set_object_transform(*id, entry.transform);
        }

        for warning in &warnings {
            log::warn!("{}", warning);
        }

        warnings
    }
}
