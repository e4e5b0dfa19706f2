// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use parking_lot::Mutex;
use refguard_app::TransitionTrigger;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_HEADER_HEIGHT: f64 = 45.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardSettings {
    /// How long a transition stays active after its most recent trigger.
    pub settle_delay: Duration,
    /// Pointer presses at or above this y coordinate land on the tab header band.
    pub header_height: f64,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            header_height: DEFAULT_HEADER_HEIGHT,
        }
    }
}

/// Something holding field values that a transition has to wipe.
pub trait Sweepable: Send + Sync {
    /// Resets every non-exempt field and returns how many were reset.
    fn sweep(&self) -> usize;
}

struct GuardInner {
    settings: GuardSettings,
    active: watch::Sender<bool>,
    generation: Mutex<u64>,
    targets: Mutex<Vec<Weak<dyn Sweepable>>>,
}

impl GuardInner {
    fn end_generation(&self, generation: u64) {
        if *self.generation.lock() != generation {
            return;
        }
        if self.active.send_replace(false) {
            debug!(generation, "view transition settled");
        }
    }
}

/// Suppresses focus-loss validation while a tab or view switch is under way.
///
/// One guard is shared by every view of a window. Clones share state.
#[derive(Clone)]
pub struct TransitionGuard {
    inner: Arc<GuardInner>,
}

impl Default for TransitionGuard {
    fn default() -> Self {
        Self::new(GuardSettings::default())
    }
}

impl TransitionGuard {
    pub fn new(settings: GuardSettings) -> Self {
        let (active, _) = watch::channel(false);
        Self {
            inner: Arc::new(GuardInner {
                settings,
                active,
                generation: Mutex::new(0),
                targets: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn settings(&self) -> GuardSettings {
        self.inner.settings
    }

    pub fn is_active(&self) -> bool {
        *self.inner.active.borrow()
    }

    /// Starts (or extends) a transition: raises the flag, sweeps every
    /// registered target, and schedules the end. Returns the number of fields
    /// reset by the sweep.
    pub fn begin(&self, trigger: TransitionTrigger) -> usize {
        let generation = {
            let mut generation = self.inner.generation.lock();
            *generation += 1;
            *generation
        };
        self.inner.active.send_replace(true);

        let targets: Vec<Arc<dyn Sweepable>> = {
            let mut targets = self.inner.targets.lock();
            targets.retain(|target| target.strong_count() > 0);
            targets.iter().filter_map(Weak::upgrade).collect()
        };
        let swept: usize = targets.iter().map(|target| target.sweep()).sum();
        debug!(
            trigger = trigger.as_str(),
            generation, swept, "view transition started"
        );

        self.schedule_end(generation);
        swept
    }

    /// Pointer press at `y` in tab control coordinates. Only presses inside
    /// the header band start a transition.
    pub fn on_pointer_down(&self, y: f64) -> bool {
        if y > self.inner.settings.header_height {
            return false;
        }
        self.begin(TransitionTrigger::HeaderPointerDown);
        true
    }

    pub fn on_selection_changed(&self, from: usize, to: usize) -> bool {
        if from == to {
            return false;
        }
        self.begin(TransitionTrigger::SelectionChanged { from, to });
        true
    }

    pub fn on_navigation(&self) {
        self.begin(TransitionTrigger::Navigation);
    }

    /// Ends the current transition now. Pending timers become stale.
    pub fn complete(&self) {
        let generation = {
            let mut generation = self.inner.generation.lock();
            *generation += 1;
            *generation
        };
        self.inner.end_generation(generation);
    }

    /// Alias for [`TransitionGuard::complete`].
    pub fn end(&self) {
        self.complete();
    }

    /// Resolves once no transition is active.
    pub async fn settled(&self) {
        let mut active = self.inner.active.subscribe();
        let _ = active.wait_for(|active| !*active).await;
    }

    pub fn register(&self, target: Weak<dyn Sweepable>) {
        let mut targets = self.inner.targets.lock();
        targets.retain(|target| target.strong_count() > 0);
        targets.push(target);
    }

    pub fn registered(&self) -> usize {
        self.inner
            .targets
            .lock()
            .iter()
            .filter(|target| target.strong_count() > 0)
            .count()
    }

    fn schedule_end(&self, generation: u64) {
        let inner = Arc::downgrade(&self.inner);
        let delay = self.inner.settings.settle_delay;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(inner) = inner.upgrade() {
                        inner.end_generation(generation);
                    }
                });
            }
            Err(_) => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    if let Some(inner) = inner.upgrade() {
                        inner.end_generation(generation);
                    }
                });
            }
        }
    }
}
