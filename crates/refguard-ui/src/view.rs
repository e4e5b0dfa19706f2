// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use parking_lot::Mutex;
use refguard_app::{FieldCommand, ViewId, fold};
use std::sync::Arc;
use tracing::debug;

use crate::{
    Collaborators, CoordinatorOptions, FieldCoordinator, FieldHandle, OverlaySessions, Sweepable,
    TransitionGuard,
};

struct ViewInner {
    id: ViewId,
    name: String,
    tab_index: Option<usize>,
    fields: Mutex<Vec<FieldHandle>>,
    sessions: OverlaySessions,
}

impl ViewInner {
    fn reset_field(&self, field: &FieldHandle) -> bool {
        self.sessions.cancel(field.id());
        !field.dispatch(FieldCommand::Reset).is_empty()
    }
}

impl Sweepable for ViewInner {
    fn sweep(&self) -> usize {
        let fields = self.fields.lock().clone();
        let mut swept = 0;
        for field in &fields {
            if field.is_do_not_disturb() {
                let cancelled = self.sessions.cancel(field.id());
                debug!(
                    view = %self.name,
                    field = %field.name(),
                    cancelled,
                    "field exempt from sweep, value kept"
                );
                continue;
            }
            self.reset_field(field);
            swept += 1;
        }
        swept
    }
}

impl Drop for ViewInner {
    fn drop(&mut self) {
        let cancelled = self.sessions.cancel_all();
        if cancelled > 0 {
            debug!(view = %self.name, cancelled, "view dropped with open suggestion overlays");
        }
    }
}

/// Owns the fields, coordinators and overlay sessions of one view.
///
/// Creating a scope registers it with the transition guard; dropping it
/// cancels its open overlays and removes its fields from later sweeps. A sweep
/// keeps the value of a do-not-disturb field but still closes its overlay.
pub struct ViewScope {
    inner: Arc<ViewInner>,
    guard: TransitionGuard,
    collaborators: Collaborators,
    options: CoordinatorOptions,
}

impl ViewScope {
    pub fn new(
        name: impl Into<String>,
        tab_index: Option<usize>,
        guard: &TransitionGuard,
        collaborators: Collaborators,
        options: CoordinatorOptions,
    ) -> Self {
        let inner = Arc::new(ViewInner {
            id: ViewId::next(),
            name: name.into(),
            tab_index,
            fields: Mutex::new(Vec::new()),
            sessions: OverlaySessions::new(Arc::clone(&collaborators.presenter), guard.clone()),
        });
        let target: Arc<dyn Sweepable> = inner.clone();
        guard.register(Arc::downgrade(&target));
        Self {
            inner,
            guard: guard.clone(),
            collaborators,
            options,
        }
    }

    pub fn id(&self) -> ViewId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The tab hosting this view, if it lives in a tab control.
    pub fn tab_index(&self) -> Option<usize> {
        self.inner.tab_index
    }

    pub fn guard(&self) -> &TransitionGuard {
        &self.guard
    }

    pub fn sessions(&self) -> &OverlaySessions {
        &self.inner.sessions
    }

    /// Adds a validated field and returns its coordinator.
    pub fn add_field(&self, name: impl Into<String>) -> FieldCoordinator {
        let field = FieldHandle::new(self.inner.id, name);
        self.inner.fields.lock().push(field.clone());
        FieldCoordinator::new(
            field,
            &self.collaborators,
            self.inner.sessions.clone(),
            self.guard.clone(),
            self.options,
        )
    }

    pub fn fields(&self) -> Vec<FieldHandle> {
        self.inner.fields.lock().clone()
    }

    pub fn field(&self, name: &str) -> Option<FieldHandle> {
        let wanted = fold(name);
        self.inner
            .fields
            .lock()
            .iter()
            .find(|field| fold(&field.name()) == wanted)
            .cloned()
    }

    /// Form reset: clears every field of this view, exempt or not.
    pub fn reset(&self) -> usize {
        let fields = self.fields();
        let changed = fields
            .iter()
            .filter(|field| self.inner.reset_field(field))
            .count();
        debug!(view = %self.inner.name, changed, "view reset");
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::ViewScope;
    use crate::{
        Anchor, Collaborators, CoordinatorOptions, ErrorReport, ErrorReporter, GuardSettings,
        ModalFlag, OverlayPresenter, ReferenceDataProvider, TransitionGuard,
    };
    use anyhow::Result;
    use async_trait::async_trait;
    use refguard_app::TransitionTrigger;
    use std::sync::Arc;

    struct Nothing;

    #[async_trait]
    impl ReferenceDataProvider for Nothing {
        async fn reference_values(&self, _: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl OverlayPresenter for Nothing {
        async fn show_suggestions(&self, _: &Anchor, _: &[String], _: &str) -> String {
            String::new()
        }
    }

    impl ErrorReporter for Nothing {
        fn report(&self, _: ErrorReport) {}
    }

    fn collaborators() -> Collaborators {
        Collaborators {
            provider: Arc::new(Nothing),
            presenter: Arc::new(Nothing),
            reporter: Arc::new(Nothing),
        }
    }

    fn scope(guard: &TransitionGuard, name: &str) -> ViewScope {
        ViewScope::new(name, Some(0), guard, collaborators(), CoordinatorOptions::default())
    }

    #[test]
    fn sweep_reaches_fields_of_every_view() {
        let guard = TransitionGuard::new(GuardSettings::default());
        let inventory = scope(&guard, "inventory");
        let remove = scope(&guard, "remove");
        inventory.add_field("part").field().edit("PN-100");
        remove.add_field("location").field().edit("A-01");

        assert_eq!(guard.begin(TransitionTrigger::Navigation), 2);
        assert!(inventory.fields().iter().all(|field| field.text().is_empty()));
        assert!(remove.fields().iter().all(|field| field.text().is_empty()));
    }

    #[test]
    fn exempt_fields_survive_sweep_but_not_reset() {
        let guard = TransitionGuard::new(GuardSettings::default());
        let remove = scope(&guard, "remove");
        let modal = ModalFlag::new();
        let field = remove.add_field("part").field().clone();
        field.set_do_not_disturb(modal.predicate());
        field.edit("PN-100");

        modal.open();
        assert_eq!(guard.begin(TransitionTrigger::SelectionChanged { from: 1, to: 0 }), 0);
        assert_eq!(field.text(), "PN-100");

        assert_eq!(remove.reset(), 1);
        assert_eq!(field.text(), "");
    }

    #[test]
    fn field_lookup_folds_non_ascii_names() {
        let guard = TransitionGuard::new(GuardSettings::default());
        let view = scope(&guard, "lager");
        let added = view.add_field("Ölstand");
        assert_eq!(
            view.field("ÖLSTAND").map(|field| field.id()),
            Some(added.field().id())
        );
        assert!(view.field("menge").is_none());
    }

    #[test]
    fn dropped_scope_leaves_the_sweep() {
        let guard = TransitionGuard::new(GuardSettings::default());
        let view = scope(&guard, "inventory");
        let lookup = view.add_field("Part");
        assert_eq!(view.field("part").map(|field| field.id()), Some(lookup.field().id()));
        assert_eq!(guard.registered(), 1);

        drop(view);
        assert_eq!(guard.registered(), 0);
        assert_eq!(guard.begin(TransitionTrigger::Navigation), 0);
    }
}
