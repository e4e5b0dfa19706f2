// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use parking_lot::Mutex;
use refguard_app::{FieldCommand, FieldEvent, FieldId, FieldState, SessionId, ViewId};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

use crate::Anchor;

/// Predicate consulted by the transition sweep; `true` leaves the field alone.
pub type DoNotDisturb = Arc<dyn Fn() -> bool + Send + Sync>;

struct FieldSlot {
    id: FieldId,
    view: ViewId,
    state: Mutex<FieldState>,
    do_not_disturb: Mutex<Option<DoNotDisturb>>,
}

/// Shared handle to one field's state. Clones refer to the same field.
#[derive(Clone)]
pub struct FieldHandle {
    slot: Arc<FieldSlot>,
}

impl FieldHandle {
    pub fn new(view: ViewId, name: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(FieldSlot {
                id: FieldId::next(),
                view,
                state: Mutex::new(FieldState::new(name)),
                do_not_disturb: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> FieldId {
        self.slot.id
    }

    pub fn view(&self) -> ViewId {
        self.slot.view
    }

    pub fn name(&self) -> String {
        self.slot.state.lock().name.clone()
    }

    pub fn anchor(&self) -> Anchor {
        Anchor {
            field: self.id(),
            name: self.name(),
        }
    }

    pub fn snapshot(&self) -> FieldState {
        self.slot.state.lock().clone()
    }

    pub fn text(&self) -> String {
        self.slot.state.lock().text.clone()
    }

    pub fn is_valid(&self) -> bool {
        self.slot.state.lock().valid
    }

    pub fn error(&self) -> Option<String> {
        self.slot.state.lock().error.clone()
    }

    pub fn is_suggestion_active(&self) -> bool {
        self.slot.state.lock().is_suggestion_active()
    }

    pub fn dispatch(&self, command: FieldCommand) -> Vec<FieldEvent> {
        let mut state = self.slot.state.lock();
        let events = state.dispatch(command);
        if !events.is_empty() {
            trace!(field = %state.name, ?events, "field state changed");
        }
        events
    }

    /// Text change from the user.
    pub fn edit(&self, text: impl Into<String>) -> Vec<FieldEvent> {
        self.dispatch(FieldCommand::Edit(text.into()))
    }

    /// Marks `session` as the field's active suggestion session unless one is
    /// already active. The check and the update happen under one lock.
    pub(crate) fn try_begin_session(&self, session: SessionId) -> bool {
        let mut state = self.slot.state.lock();
        if state.is_suggestion_active() {
            return false;
        }
        state.dispatch(FieldCommand::BeginSession(session));
        true
    }

    pub fn set_do_not_disturb(&self, predicate: DoNotDisturb) {
        *self.slot.do_not_disturb.lock() = Some(predicate);
    }

    pub fn clear_do_not_disturb(&self) {
        *self.slot.do_not_disturb.lock() = None;
    }

    pub fn is_do_not_disturb(&self) -> bool {
        let predicate = self.slot.do_not_disturb.lock().clone();
        predicate.is_some_and(|predicate| predicate())
    }
}

impl fmt::Debug for FieldHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldHandle")
            .field("id", &self.slot.id)
            .field("view", &self.slot.view)
            .field("state", &*self.slot.state.lock())
            .finish()
    }
}

impl PartialEq for FieldHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl Eq for FieldHandle {}

/// Open/closed flag for a modal edit flow, e.g. an edit-in-place dialog.
/// Fields tied to it with [`ModalFlag::predicate`] survive transition sweeps
/// while the flag is open.
#[derive(Debug, Clone, Default)]
pub struct ModalFlag(Arc<AtomicBool>);

impl ModalFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn close(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn predicate(&self) -> DoNotDisturb {
        let flag = Arc::clone(&self.0);
        Arc::new(move || flag.load(Ordering::SeqCst))
    }
}
