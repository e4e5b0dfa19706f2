// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Focus-loss validation, suggestion overlays, and tab-switch coordination for
//! reference-data entry fields.
//!
//! Views own their fields through a [`ViewScope`]. Each field gets a
//! [`FieldCoordinator`] that runs on focus loss, and every scope registers
//! with one shared [`TransitionGuard`] so a tab switch can sweep all fields
//! before the focus events it causes are dispatched.

pub mod coordinator;
pub mod field;
pub mod guard;
pub mod sequencer;
pub mod session;
pub mod view;

pub use coordinator::{CoordinatorOptions, FieldCoordinator, Phase, Resolution, SkipReason};
pub use field::{DoNotDisturb, FieldHandle, ModalFlag};
pub use guard::{GuardSettings, Sweepable, TransitionGuard};
pub use sequencer::{
    Element, FocusHost, FocusSequencer, SequenceReport, SequencerSettings, VisualNode,
};
pub use session::{OverlaySessions, SessionConflict, SessionOutcome};
pub use view::ViewScope;

use anyhow::Result;
use async_trait::async_trait;
use refguard_app::{ErrorKind, FieldError, FieldId};
use std::collections::BTreeMap;
use std::sync::Arc;
use time::OffsetDateTime;

/// Screen element a suggestion overlay is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Anchor {
    pub field: FieldId,
    pub name: String,
}

#[async_trait]
pub trait ReferenceDataProvider: Send + Sync {
    /// Current valid values for `field`. An empty list means the data is
    /// unavailable, as does an error.
    async fn reference_values(&self, field: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait OverlayPresenter: Send + Sync {
    /// Shows `candidates` next to `anchor` and waits for the user. An empty
    /// string means nothing was picked.
    async fn show_suggestions(&self, anchor: &Anchor, candidates: &[String], seed: &str)
    -> String;
}

pub trait ErrorReporter: Send + Sync {
    fn report(&self, report: ErrorReport);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub context: BTreeMap<String, String>,
    pub reported_at: OffsetDateTime,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: BTreeMap::new(),
            reported_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl From<&FieldError> for ErrorReport {
    fn from(error: &FieldError) -> Self {
        Self::new(error.kind(), error.to_string())
            .with_context("field", error.field())
            .with_context("value", error.value())
    }
}

/// The collaborators every coordinator in a view talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub provider: Arc<dyn ReferenceDataProvider>,
    pub presenter: Arc<dyn OverlayPresenter>,
    pub reporter: Arc<dyn ErrorReporter>,
}
