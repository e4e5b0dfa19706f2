// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

/// Authoritative list of valid values for one field, fetched fresh for each
/// validation pass. An empty set means the data could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSet {
    field: String,
    values: Vec<String>,
}

impl ReferenceSet {
    pub fn new(field: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            field: field.into(),
            values,
        }
    }

    pub fn unavailable(field: impl Into<String>) -> Self {
        Self::new(field, Vec::new())
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchResult {
    /// Input equals this reference entry, ignoring case.
    Exact(String),
    /// Input appears inside each candidate. Never empty, sorted alphabetically.
    Partial(Vec<String>),
    NoMatch,
    NoReferenceData,
}

impl MatchResult {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Exact(_) => "exact",
            Self::Partial(_) => "partial",
            Self::NoMatch => "no_match",
            Self::NoReferenceData => "no_reference_data",
        }
    }

    pub fn candidates(&self) -> &[String] {
        match self {
            Self::Partial(candidates) => candidates,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionTrigger {
    HeaderPointerDown,
    SelectionChanged { from: usize, to: usize },
    Navigation,
}

impl TransitionTrigger {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HeaderPointerDown => "header_pointer_down",
            Self::SelectionChanged { .. } => "selection_changed",
            Self::Navigation => "navigation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusMode {
    FocusOnly,
    TriggerLostFocus,
}

impl FocusMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FocusOnly => "focus_only",
            Self::TriggerLostFocus => "trigger_lost_focus",
        }
    }
}
