// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use parking_lot::Mutex;
use refguard_app::{
    ErrorKind, FieldCommand, FieldError, MatchResult, ReferenceSet, SessionId, classify,
    is_blank,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    Collaborators, ErrorReport, ErrorReporter, FieldHandle, OverlaySessions,
    ReferenceDataProvider, SessionOutcome, TransitionGuard,
};

pub const DEFAULT_MAX_SUGGESTIONS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// Longest candidate list shown in an overlay, applied after sorting.
    pub max_suggestions: usize,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Validating,
    Accepted,
    Prompting,
    Cleared,
}

impl Phase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Accepted => "accepted",
            Self::Prompting => "prompting",
            Self::Cleared => "cleared",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Blank,
    TransitionInProgress,
    SessionActive,
    /// The text changed while reference data was loading.
    Superseded,
}

impl SkipReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blank => "blank",
            Self::TransitionInProgress => "transition_in_progress",
            Self::SessionActive => "session_active",
            Self::Superseded => "superseded",
        }
    }
}

/// How one focus-loss pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Skipped(SkipReason),
    Accepted(String),
    Picked(String),
    Declined,
    Cleared(ErrorKind),
    Cancelled,
}

impl Resolution {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Skipped(_) => "skipped",
            Self::Accepted(_) => "accepted",
            Self::Picked(_) => "picked",
            Self::Declined => "declined",
            Self::Cleared(_) => "cleared",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

#[derive(Debug, Default)]
struct PhaseSlot {
    passes: u64,
    owner: u64,
    phase: Phase,
}

/// The phase claimed by one pass. Dropping it returns the field to `Idle`
/// unless a later pass has claimed the phase since.
struct PassPhase {
    slot: Arc<Mutex<PhaseSlot>>,
    pass: u64,
}

impl PassPhase {
    fn begin(slot: &Arc<Mutex<PhaseSlot>>) -> Self {
        let mut state = slot.lock();
        state.passes += 1;
        let pass = state.passes;
        if state.phase == Phase::Idle {
            state.owner = pass;
            state.phase = Phase::Validating;
        }
        drop(state);
        Self {
            slot: Arc::clone(slot),
            pass,
        }
    }

    fn enter(&self, phase: Phase) {
        let mut state = self.slot.lock();
        state.owner = self.pass;
        state.phase = phase;
    }
}

impl Drop for PassPhase {
    fn drop(&mut self) {
        let mut state = self.slot.lock();
        if state.owner == self.pass {
            state.phase = Phase::Idle;
        }
    }
}

/// Releases the field's suggestion flag however the overlay await ends.
struct SessionFlag {
    field: FieldHandle,
    session: SessionId,
}

impl Drop for SessionFlag {
    fn drop(&mut self) {
        self.field.dispatch(FieldCommand::EndSession(self.session));
    }
}

/// Validates one field against its reference list when it loses focus.
#[derive(Clone)]
pub struct FieldCoordinator {
    field: FieldHandle,
    provider: Arc<dyn ReferenceDataProvider>,
    reporter: Arc<dyn ErrorReporter>,
    sessions: OverlaySessions,
    guard: TransitionGuard,
    options: CoordinatorOptions,
    phase: Arc<Mutex<PhaseSlot>>,
}

impl FieldCoordinator {
    pub fn new(
        field: FieldHandle,
        collaborators: &Collaborators,
        sessions: OverlaySessions,
        guard: TransitionGuard,
        options: CoordinatorOptions,
    ) -> Self {
        Self {
            field,
            provider: Arc::clone(&collaborators.provider),
            reporter: Arc::clone(&collaborators.reporter),
            sessions,
            guard,
            options,
            phase: Arc::new(Mutex::new(PhaseSlot::default())),
        }
    }

    pub fn field(&self) -> &FieldHandle {
        &self.field
    }

    pub fn options(&self) -> CoordinatorOptions {
        self.options
    }

    pub fn phase(&self) -> Phase {
        self.phase.lock().phase
    }

    /// Runs one validation pass for the field's current text. Never fails:
    /// every problem ends up in the returned resolution.
    pub async fn on_focus_lost(&self) -> Resolution {
        let name = self.field.name();
        if self.guard.is_active() {
            debug!(
                field = %name,
                kind = ErrorKind::TransitionInProgress.as_str(),
                "focus loss ignored during view transition"
            );
            return Resolution::Skipped(SkipReason::TransitionInProgress);
        }

        let typed = self.field.text();
        if is_blank(&typed) {
            return Resolution::Skipped(SkipReason::Blank);
        }
        let input = typed.trim().to_owned();

        let phase = PassPhase::begin(&self.phase);
        let reference = self.fetch(&name).await;

        if self.guard.is_active() {
            debug!(
                field = %name,
                kind = ErrorKind::TransitionInProgress.as_str(),
                "view transition started while loading reference data"
            );
            return Resolution::Skipped(SkipReason::TransitionInProgress);
        }
        let current = self.field.text();
        if current.trim() != input {
            debug!(field = %name, "text changed while loading reference data");
            return Resolution::Skipped(SkipReason::Superseded);
        }

        let resolution = match classify(&input, &reference) {
            MatchResult::NoReferenceData => {
                phase.enter(Phase::Cleared);
                warn!(field = %name, "no reference data available, clearing input");
                self.reject(FieldError::DataUnavailable {
                    field: name.clone(),
                    value: input,
                })
            }
            MatchResult::Exact(_) => {
                phase.enter(Phase::Accepted);
                if current != input {
                    self.field.dispatch(FieldCommand::Edit(input.clone()));
                }
                self.field.dispatch(FieldCommand::Accept);
                Resolution::Accepted(input)
            }
            MatchResult::NoMatch => {
                phase.enter(Phase::Cleared);
                self.reject(FieldError::InvalidValue {
                    field: name.clone(),
                    value: input,
                })
            }
            MatchResult::Partial(mut candidates) => {
                candidates.truncate(self.options.max_suggestions);
                self.prompt(&phase, &input, &candidates).await
            }
        };

        if resolution.is_skipped() {
            debug!(field = %name, ?resolution, "focus loss skipped");
        } else {
            info!(field = %name, resolution = resolution.label(), "focus loss resolved");
        }
        resolution
    }

    async fn fetch(&self, field: &str) -> ReferenceSet {
        match self.provider.reference_values(field).await {
            Ok(values) => ReferenceSet::new(field, values),
            Err(error) => {
                let detail = format!("{error:#}");
                warn!(field, error = %detail, "reference data fetch failed");
                ReferenceSet::unavailable(field)
            }
        }
    }

    async fn prompt(&self, phase: &PassPhase, input: &str, candidates: &[String]) -> Resolution {
        let session = SessionId::next();
        if !self.field.try_begin_session(session) {
            debug!(
                field = %self.field.name(),
                kind = ErrorKind::SessionConflict.as_str(),
                "suggestion overlay already open for field"
            );
            return Resolution::Skipped(SkipReason::SessionActive);
        }
        let _flag = SessionFlag {
            field: self.field.clone(),
            session,
        };
        phase.enter(Phase::Prompting);
        self.field.dispatch(FieldCommand::ClearError);

        let anchor = self.field.anchor();
        match self
            .sessions
            .open_as(session, &anchor, candidates, input)
            .await
        {
            Ok(SessionOutcome::Picked(value)) => {
                self.field.dispatch(FieldCommand::Pick(value.clone()));
                Resolution::Picked(value)
            }
            Ok(SessionOutcome::Declined) => Resolution::Declined,
            Ok(SessionOutcome::Cancelled) => Resolution::Cancelled,
            Err(conflict) => {
                debug!(
                    kind = conflict.kind().as_str(),
                    error = %conflict,
                    "suggestion overlay refused"
                );
                Resolution::Skipped(SkipReason::SessionActive)
            }
        }
    }

    fn reject(&self, error: FieldError) -> Resolution {
        let kind = error.kind();
        self.field.dispatch(FieldCommand::Reject(error.to_string()));
        if kind.is_user_visible() {
            self.reporter.report(ErrorReport::from(&error));
        }
        Resolution::Cleared(kind)
    }
}
