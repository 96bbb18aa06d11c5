use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::pipeline::error::{PipelineError, SessionError};
use crate::pipeline::snapshot::TransformSnapshot;
use crate::scene_graph::{NodeId, Scene, Selection};

/// User abort request, settable from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Exclusive access to a scene for the duration of one export batch.
///
/// Whatever the session changes is undone when it ends: ephemeral nodes are
/// destroyed, captured transforms restored and the selection put back. The
/// same cleanup runs from `Drop`, so an early return or a panicking writer
/// cannot leave the scene half-edited.
pub struct ExportSession<'s> {
    scene: &'s mut Scene,
    snapshot: TransformSnapshot,
    selection: Selection,
    ephemeral: Vec<NodeId>,
    closed: bool,
}

impl<'s> ExportSession<'s> {
    pub fn begin(scene: &'s mut Scene) -> Result<Self, SessionError> {
        if !scene.try_begin_session() {
            return Err(SessionError::AlreadyActive);
        }

        log::debug!("Export session started");
        let selection = scene.selection().clone();
        Ok(Self {
            scene,
            snapshot: TransformSnapshot::default(),
            selection,
            ephemeral: Vec::new(),
            closed: false,
        })
    }

    pub fn scene(&self) -> &Scene {
        &*self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut *self.scene
    }

    pub fn snapshot(&self) -> &TransformSnapshot {
        &self.snapshot
    }

    pub fn capture(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.snapshot.extend(&*self.scene, ids);
    }

    /// Registers nodes created during the session so they never outlive it.
    pub fn track(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.ephemeral.extend(ids);
    }

    /// Destroys every tracked node that still exists.
    pub fn destroy_ephemeral(&mut self) {
        for id in self.ephemeral.drain(..) {
            self.scene.remove_object(id);
        }
    }

    /// Ends the session, returning what restoring had to repair.
    pub fn finish(mut self) -> Vec<PipelineError> {
        self.rollback()
    }

    fn rollback(&mut self) -> Vec<PipelineError> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;

        self.destroy_ephemeral();
        let warnings = self.snapshot.restore(&mut *self.scene);
        self.scene.set_selection(self.selection.clone());
        self.scene.end_session();

        log::debug!(
            "Export session restored {} node(s), {} warning(s)",
            self.snapshot.len(),
            warnings.len()
        );
        warnings
    }
}

impl Drop for ExportSession<'_> {
    fn drop(&mut self) {
        self.rollback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::{Node, Transform};
    use glam::DVec3;

    #[test]
    fn nested_sessions_fail_fast() {
        let mut scene = Scene::new();
        let session = ExportSession::begin(&mut scene).unwrap();
        assert!(session.scene().is_session_active());
        drop(session);

        assert!(!scene.is_session_active());
        scene.try_begin_session();
        assert!(matches!(
            ExportSession::begin(&mut scene),
            Err(SessionError::AlreadyActive)
        ));
    }

    #[test]
    fn drop_restores_everything() {
        let mut scene = Scene::new();
        let original = Transform::from_translation(DVec3::new(5.0, 3.0, 2.0));
        let anchor = scene.add_object(Node::new("Anchor").with_transform(original));
        scene.select_only(&[anchor]);
        let count = scene.object_count();

        {
            let mut session = ExportSession::begin(&mut scene).unwrap();
            session.capture([anchor]);
            let temp = session.scene_mut().add_object(Node::new("Temp"));
            session.track([temp]);
            session.scene_mut().select_only(&[temp]);
            session.scene_mut().set_object_translation(anchor, DVec3::ZERO);
        }

        assert_eq!(scene.object_count(), count);
        assert_eq!(*scene.get_object_transform(anchor).unwrap(), original);
        assert_eq!(scene.selection().selected, vec![anchor]);
        assert!(!scene.is_session_active());
    }

    #[test]
    fn cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_cancelled());
        handle.cancel();
        assert!(flag.is_cancelled());
    }
}
