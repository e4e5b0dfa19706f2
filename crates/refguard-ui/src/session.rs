// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use parking_lot::Mutex;
use refguard_app::{ErrorKind, FieldId, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{Anchor, OverlayPresenter, TransitionGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Picked(String),
    /// The presenter closed without a selection.
    Declined,
    /// A sweep or view teardown ended the session before the user answered.
    Cancelled,
}

impl SessionOutcome {
    /// The selected value, or an empty string when nothing was picked.
    pub fn selection(&self) -> String {
        match self {
            Self::Picked(value) => value.clone(),
            Self::Declined | Self::Cancelled => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("a suggestion overlay is already open for {anchor} (session {existing})")]
pub struct SessionConflict {
    pub anchor: String,
    pub existing: SessionId,
}

impl SessionConflict {
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::SessionConflict
    }
}

type OpenSessions = HashMap<FieldId, (SessionId, CancellationToken)>;

/// The in-flight suggestion overlays of one view, at most one per anchor.
#[derive(Clone)]
pub struct OverlaySessions {
    presenter: Arc<dyn OverlayPresenter>,
    guard: TransitionGuard,
    open: Arc<Mutex<OpenSessions>>,
}

/// Removes the session entry when the open future finishes or is dropped.
struct OpenEntry {
    open: Arc<Mutex<OpenSessions>>,
    field: FieldId,
    session: SessionId,
}

impl Drop for OpenEntry {
    fn drop(&mut self) {
        let mut open = self.open.lock();
        if open
            .get(&self.field)
            .is_some_and(|(session, _)| *session == self.session)
        {
            open.remove(&self.field);
        }
    }
}

impl OverlaySessions {
    pub fn new(presenter: Arc<dyn OverlayPresenter>, guard: TransitionGuard) -> Self {
        Self {
            presenter,
            guard,
            open: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn open(
        &self,
        anchor: &Anchor,
        candidates: &[String],
        seed: &str,
    ) -> Result<SessionOutcome, SessionConflict> {
        self.open_as(SessionId::next(), anchor, candidates, seed)
            .await
    }

    /// Opens a session under a caller-chosen id.
    pub async fn open_as(
        &self,
        session: SessionId,
        anchor: &Anchor,
        candidates: &[String],
        seed: &str,
    ) -> Result<SessionOutcome, SessionConflict> {
        let token = CancellationToken::new();
        {
            let mut open = self.open.lock();
            if let Some((existing, _)) = open.get(&anchor.field) {
                return Err(SessionConflict {
                    anchor: anchor.name.clone(),
                    existing: *existing,
                });
            }
            if self.guard.is_active() {
                debug!(anchor = %anchor.name, %session, "transition active, overlay not shown");
                return Ok(SessionOutcome::Cancelled);
            }
            open.insert(anchor.field, (session, token.clone()));
        }
        let _entry = OpenEntry {
            open: Arc::clone(&self.open),
            field: anchor.field,
            session,
        };

        debug!(
            anchor = %anchor.name,
            %session,
            candidates = candidates.len(),
            "showing suggestions"
        );
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => SessionOutcome::Cancelled,
            selection = self.presenter.show_suggestions(anchor, candidates, seed) => {
                if selection.is_empty() {
                    SessionOutcome::Declined
                } else {
                    SessionOutcome::Picked(selection)
                }
            }
        };
        debug!(anchor = %anchor.name, %session, ?outcome, "suggestion session closed");
        Ok(outcome)
    }

    pub fn is_open(&self, field: FieldId) -> bool {
        self.open.lock().contains_key(&field)
    }

    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }

    /// Cancels the session open for `field`, if any.
    pub fn cancel(&self, field: FieldId) -> bool {
        let token = self.open.lock().get(&field).map(|(_, token)| token.clone());
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) -> usize {
        let tokens: Vec<CancellationToken> = self
            .open
            .lock()
            .values()
            .map(|(_, token)| token.clone())
            .collect();
        for token in &tokens {
            token.cancel();
        }
        tokens.len()
    }
}
