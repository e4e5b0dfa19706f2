// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    DataUnavailable,
    InvalidValue,
    SessionConflict,
    FocusTargetMissing,
    TransitionInProgress,
}

impl ErrorKind {
    pub const ALL: [Self; 5] = [
        Self::DataUnavailable,
        Self::InvalidValue,
        Self::SessionConflict,
        Self::FocusTargetMissing,
        Self::TransitionInProgress,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DataUnavailable => "data_unavailable",
            Self::InvalidValue => "invalid_value",
            Self::SessionConflict => "session_conflict",
            Self::FocusTargetMissing => "focus_target_missing",
            Self::TransitionInProgress => "transition_in_progress",
        }
    }

    /// Kinds that change a field's displayed value and must reach the user.
    pub const fn is_user_visible(self) -> bool {
        matches!(self, Self::DataUnavailable | Self::InvalidValue)
    }
}

/// Validation failures that clear a field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error(
        "{field} cannot be validated right now: no reference data is available; input {value:?} was cleared -- check the server connection and retry"
    )]
    DataUnavailable { field: String, value: String },
    #[error("{value:?} is not a known {field}; input was cleared -- enter a listed value")]
    InvalidValue { field: String, value: String },
}

impl FieldError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::DataUnavailable { .. } => ErrorKind::DataUnavailable,
            Self::InvalidValue { .. } => ErrorKind::InvalidValue,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::DataUnavailable { field, .. } | Self::InvalidValue { field, .. } => field,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::DataUnavailable { value, .. } | Self::InvalidValue { value, .. } => value,
        }
    }
}
