// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::SessionId;

/// Observable state of one validated free-text field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldState {
    pub name: String,
    pub text: String,
    pub valid: bool,
    pub error: Option<String>,
    pub suggestion_session: Option<SessionId>,
}

impl FieldState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: String::new(),
            valid: false,
            error: None,
            suggestion_session: None,
        }
    }

    pub const fn is_suggestion_active(&self) -> bool {
        self.suggestion_session.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldCommand {
    /// Text typed by the user; any previous verdict no longer applies.
    Edit(String),
    /// The current text matched a reference entry.
    Accept,
    /// The user picked a suggestion, which replaces the typed text.
    Pick(String),
    /// The text was rejected; it is cleared and the message displayed.
    Reject(String),
    ClearError,
    BeginSession(SessionId),
    EndSession(SessionId),
    /// Back to a blank, unvalidated field. Used by transition sweeps and form resets.
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEvent {
    TextChanged(String),
    ValidityChanged(bool),
    ErrorSet(String),
    ErrorCleared,
    SessionStarted(SessionId),
    SessionEnded(SessionId),
}

impl FieldState {
    pub fn dispatch(&mut self, command: FieldCommand) -> Vec<FieldEvent> {
        let mut events = Vec::new();
        match command {
            FieldCommand::Edit(text) => {
                self.set_text(text, &mut events);
                self.set_valid(false, &mut events);
            }
            FieldCommand::Accept => {
                self.set_valid(true, &mut events);
                self.clear_error(&mut events);
            }
            FieldCommand::Pick(value) => {
                self.set_text(value, &mut events);
                self.set_valid(true, &mut events);
                self.clear_error(&mut events);
            }
            FieldCommand::Reject(message) => {
                self.set_text(String::new(), &mut events);
                self.set_valid(false, &mut events);
                if self.error.as_deref() != Some(message.as_str()) {
                    self.error = Some(message.clone());
                    events.push(FieldEvent::ErrorSet(message));
                }
            }
            FieldCommand::ClearError => self.clear_error(&mut events),
            FieldCommand::BeginSession(session) => {
                self.suggestion_session = Some(session);
                events.push(FieldEvent::SessionStarted(session));
            }
            FieldCommand::EndSession(session) => {
                if self.suggestion_session == Some(session) {
                    self.suggestion_session = None;
                    events.push(FieldEvent::SessionEnded(session));
                }
            }
            FieldCommand::Reset => {
                self.set_text(String::new(), &mut events);
                self.set_valid(false, &mut events);
                self.clear_error(&mut events);
                if let Some(session) = self.suggestion_session.take() {
                    events.push(FieldEvent::SessionEnded(session));
                }
            }
        }
        events
    }

    fn set_text(&mut self, text: String, events: &mut Vec<FieldEvent>) {
        if self.text != text {
            self.text = text.clone();
            events.push(FieldEvent::TextChanged(text));
        }
    }

    fn set_valid(&mut self, valid: bool, events: &mut Vec<FieldEvent>) {
        if self.valid != valid {
            self.valid = valid;
            events.push(FieldEvent::ValidityChanged(valid));
        }
    }

    fn clear_error(&mut self, events: &mut Vec<FieldEvent>) {
        if self.error.take().is_some() {
            events.push(FieldEvent::ErrorCleared);
        }
    }
}
