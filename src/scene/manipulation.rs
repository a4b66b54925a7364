//! Input ownership between the orbit camera and the translate gizmo.
//!
//! Exactly one controller owns pointer drags at a time. Ownership moves to
//! the gizmo on its drag start and back to the orbit camera on drag end or
//! cancel; it is never inferred from raw pointer motion.

use crate::render::gizmo::GizmoHandle;
use crate::scene::{ModelStore, SettingChange, StoreError};
use glam::Vec3;

#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub model_id: String,
    pub handle: GizmoHandle,
    /// Model position when the drag started.
    pub start: [f32; 3],
    /// Constrained world point under the pointer when the drag started.
    pub grab: Vec3,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum InputOwner {
    #[default]
    Orbit,
    Gizmo(DragSession),
}

#[derive(Debug, Default)]
pub struct GizmoBridge {
    owner: InputOwner,
}

impl GizmoBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self) -> &InputOwner {
        &self.owner
    }

    pub fn orbit_enabled(&self) -> bool {
        matches!(self.owner, InputOwner::Orbit)
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.owner {
            InputOwner::Gizmo(session) => Some(session),
            InputOwner::Orbit => None,
        }
    }

    /// The gizmo operates only on an unlocked selection whose group exists.
    pub fn is_active(store: &ModelStore, group_available: bool) -> bool {
        group_available && !store.selected().is_locked
    }

    pub fn begin_drag(
        &mut self,
        store: &ModelStore,
        group_available: bool,
        handle: GizmoHandle,
        grab: Vec3,
    ) -> bool {
        if !self.orbit_enabled() || !Self::is_active(store, group_available) {
            return false;
        }
        let model_id = store.selected_id().to_string();
        let start = store.get(&model_id).position;
        log::debug!("gizmo drag start on `{}` ({:?})", model_id, handle);
        self.owner = InputOwner::Gizmo(DragSession {
            model_id,
            handle,
            start,
            grab,
        });
        true
    }

    /// Writes `start + (point - grab)` for the dragged model.
    pub fn drag_to(&mut self, store: &mut ModelStore, point: Vec3) -> bool {
        let Some(session) = self.session() else {
            return false;
        };
        if store.get(&session.model_id).is_locked {
            return false;
        }
        let position = (Vec3::from_array(session.start) + (point - session.grab)).to_array();
        store.update(&session.model_id, SettingChange::Position(position));
        true
    }

    /// Hands input back to the orbit camera, keeping the last position.
    pub fn end_drag(&mut self) -> bool {
        match std::mem::take(&mut self.owner) {
            InputOwner::Gizmo(session) => {
                log::debug!("gizmo drag end on `{}`", session.model_id);
                true
            }
            InputOwner::Orbit => false,
        }
    }

    /// Aborts the drag and writes the start position back once.
    pub fn cancel(&mut self, store: &mut ModelStore) -> bool {
        match std::mem::take(&mut self.owner) {
            InputOwner::Gizmo(session) => {
                if store.get(&session.model_id).position != session.start {
                    store.update(&session.model_id, SettingChange::Position(session.start));
                }
                log::debug!("gizmo drag on `{}` cancelled", session.model_id);
                true
            }
            InputOwner::Orbit => false,
        }
    }

    /// Selection change; a drag on another model is cancelled first.
    pub fn select(&mut self, store: &mut ModelStore, id: &str) -> Result<(), StoreError> {
        if !store.ids().any(|known| known == id) {
            return Err(StoreError::UnknownModel(id.to_string()));
        }
        if self.session().is_some_and(|session| session.model_id != id) {
            self.cancel(store);
        }
        store.select(id)
    }

    /// Lock change; locking the dragged model ends its drag where it is.
    pub fn set_locked(&mut self, store: &mut ModelStore, id: &str, locked: bool) {
        if locked && self.session().is_some_and(|session| session.model_id == id) {
            self.end_drag();
        }
        store.update(id, SettingChange::Locked(locked));
    }
}
