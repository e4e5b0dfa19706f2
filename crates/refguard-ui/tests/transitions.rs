// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use refguard_app::TransitionTrigger;
use refguard_testkit::{Harness, ScriptedPresenter, demo_reference_data};
use refguard_ui::{GuardSettings, ModalFlag, Resolution, TransitionGuard};
use std::time::Duration;

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

fn harness() -> Harness {
    Harness::new(demo_reference_data(), ScriptedPresenter::new())
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn sweep_clears_every_view_and_cancels_open_overlays() -> Result<()> {
    let harness = harness();
    let inventory = harness.view("inventory", 0);
    let remove = harness.view("remove", 1);
    let part = inventory.add_field("part");
    let operation = inventory.add_field("operation");
    let location = remove.add_field("location");

    part.field().edit("PN-10");
    operation.field().edit("90");
    location.field().edit("A-0");

    let prompting = tokio::spawn({
        let location = location.clone();
        async move { location.on_focus_lost().await }
    });
    settle().await;
    assert!(location.field().is_suggestion_active());
    assert!(remove.sessions().is_open(location.field().id()));

    assert_eq!(
        harness
            .guard
            .begin(TransitionTrigger::SelectionChanged { from: 1, to: 0 }),
        3
    );
    for field in inventory.fields().iter().chain(remove.fields().iter()) {
        let state = field.snapshot();
        assert_eq!(state.text, "", "{} was not cleared", state.name);
        assert!(!state.valid);
        assert!(state.error.is_none());
        assert!(!state.is_suggestion_active());
    }

    assert_eq!(prompting.await?, Resolution::Cancelled);
    assert_eq!(location.field().text(), "");
    assert_eq!(harness.presenter.pending_count(), 0);
    assert_eq!(remove.sessions().open_count(), 0);
    Ok(())
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn edit_dialog_fields_are_exempt_from_sweep() -> Result<()> {
    let harness = harness();
    let remove = harness.view("remove", 1);
    let dialog = ModalFlag::new();
    let part = remove.add_field("part");
    let location = remove.add_field("location");
    part.field().set_do_not_disturb(dialog.predicate());
    part.field().edit("PN-100");
    location.field().edit("A-01");

    dialog.open();
    assert_eq!(harness.guard.begin(TransitionTrigger::Navigation), 1);
    assert_eq!(part.field().text(), "PN-100");
    assert_eq!(location.field().text(), "");

    dialog.close();
    harness.guard.complete();
    assert_eq!(harness.guard.begin(TransitionTrigger::Navigation), 2);
    assert_eq!(part.field().text(), "");
    Ok(())
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn sweep_closes_overlay_of_exempt_field_but_keeps_its_value() -> Result<()> {
    let harness = harness();
    let remove = harness.view("remove", 1);
    let dialog = ModalFlag::new();
    let part = remove.add_field("part");
    part.field().set_do_not_disturb(dialog.predicate());
    part.field().edit("PN-1");

    let prompting = tokio::spawn({
        let part = part.clone();
        async move { part.on_focus_lost().await }
    });
    settle().await;
    assert!(remove.sessions().is_open(part.field().id()));

    dialog.open();
    assert_eq!(harness.guard.begin(TransitionTrigger::Navigation), 0);
    assert_eq!(prompting.await?, Resolution::Cancelled);
    assert_eq!(part.field().text(), "PN-1");
    assert!(!part.field().is_suggestion_active());
    assert_eq!(remove.sessions().open_count(), 0);
    assert_eq!(harness.presenter.pending_count(), 0);
    Ok(())
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn dropping_a_view_cancels_its_overlay() -> Result<()> {
    let harness = harness();
    let view = harness.view("inventory", 0);
    let part = view.add_field("part");
    part.field().edit("PN-1");

    let prompting = tokio::spawn({
        let part = part.clone();
        async move { part.on_focus_lost().await }
    });
    settle().await;
    assert_eq!(harness.presenter.pending_count(), 1);

    drop(view);
    assert_eq!(prompting.await?, Resolution::Cancelled);
    assert_eq!(part.field().text(), "PN-1");
    assert!(!part.field().is_suggestion_active());
    assert_eq!(harness.guard.registered(), 0);
    Ok(())
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn validation_resumes_after_settle_delay() -> Result<()> {
    let guard = TransitionGuard::new(GuardSettings {
        settle_delay: Duration::from_millis(300),
        ..GuardSettings::default()
    });
    let harness = harness().with_guard(guard);
    let view = harness.view("inventory", 0);
    let part = view.add_field("part");

    assert!(harness.guard.on_pointer_down(12.0));
    settle().await;
    part.field().edit("PN-100");
    assert!(matches!(part.on_focus_lost().await, Resolution::Skipped(_)));

    tokio::time::advance(Duration::from_millis(301)).await;
    settle().await;
    assert!(!harness.guard.is_active());
    assert_eq!(
        part.on_focus_lost().await,
        Resolution::Accepted("PN-100".to_owned())
    );
    Ok(())
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn transition_during_fetch_suppresses_the_pass() -> Result<()> {
    let harness = harness();
    let view = harness.view("inventory", 0);
    let part = view.add_field("part");
    part.field().edit("XYZ");

    harness.reference.hold_fetches();
    let pass = tokio::spawn({
        let part = part.clone();
        async move { part.on_focus_lost().await }
    });
    settle().await;
    harness.guard.on_navigation();
    harness.reference.release_fetches();

    assert!(matches!(pass.await?, Resolution::Skipped(_)));
    assert!(harness.reporter.reports().is_empty());
    assert!(part.field().error().is_none());
    Ok(())
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn pointer_below_header_band_is_ignored() -> Result<()> {
    let harness = harness();
    let view = harness.view("inventory", 0);
    let part = view.add_field("part");
    part.field().edit("PN-100");

    assert!(!harness.guard.on_pointer_down(120.0));
    assert_eq!(part.field().text(), "PN-100");
    assert!(harness.guard.on_pointer_down(45.0));
    assert_eq!(part.field().text(), "");
    Ok(())
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn form_reset_clears_only_its_own_view() -> Result<()> {
    let harness = harness();
    let inventory = harness.view("inventory", 0);
    let remove = harness.view("remove", 1);
    let part = inventory.add_field("part");
    let location = remove.add_field("location");
    part.field().edit("PN-100");
    location.field().edit("A-01");

    assert_eq!(inventory.reset(), 1);
    assert_eq!(part.field().text(), "");
    assert_eq!(location.field().text(), "A-01");
    assert!(!harness.guard.is_active());
    Ok(())
}
