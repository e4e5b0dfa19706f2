// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use async_trait::async_trait;
use parking_lot::Mutex;
use refguard_app::{ErrorKind, fold};
use refguard_ui::{
    Anchor, Collaborators, CoordinatorOptions, Element, ErrorReport, ErrorReporter,
    FieldCoordinator, FocusHost, OverlayPresenter, ReferenceDataProvider, Resolution,
    TransitionGuard, ViewScope, VisualNode,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

pub const PART_NUMBERS: [&str; 6] = ["PN-100", "PN-101", "PN-999", "PN-1001", "AB-200", "MT-310"];

pub const OPERATIONS: [&str; 8] = ["10", "20", "90", "100", "110", "120", "880", "900"];

pub const LOCATIONS: [&str; 9] = [
    "A-01", "A-02", "A-10", "B-01", "B-02", "FLOOR", "QC-HOLD", "RECEIVING", "SHIPPING",
];

const PART_PREFIXES: [&str; 6] = ["PN", "MT", "AB", "HX", "RC", "ZK"];

/// Reference data for the demo fields `part`, `operation` and `location`.
pub fn demo_reference_data() -> StaticReferenceData {
    StaticReferenceData::new()
        .with_field("part", PART_NUMBERS)
        .with_field("operation", OPERATIONS)
        .with_field("location", LOCATIONS)
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator for large reference lists.
#[derive(Debug, Clone)]
pub struct PartFaker {
    rng: DeterministicRng,
}

impl PartFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn part_number(&mut self) -> String {
        let prefix = PART_PREFIXES[self.rng.int_n(PART_PREFIXES.len())];
        format!("{prefix}-{:05}", self.rng.int_n(100_000))
    }

    /// `count` distinct part numbers that all start with `prefix`, in
    /// generation order.
    pub fn part_numbers_with_prefix(&mut self, prefix: &str, count: usize) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut parts = Vec::with_capacity(count);
        while parts.len() < count {
            let part = format!("{prefix}-{:05}", self.rng.int_n(100_000));
            if seen.insert(part.clone()) {
                parts.push(part);
            }
        }
        parts
    }
}

/// In-memory [`ReferenceDataProvider`] keyed by field name.
pub struct StaticReferenceData {
    values: Mutex<HashMap<String, Vec<String>>>,
    failing: Mutex<HashSet<String>>,
    fetches: Mutex<HashMap<String, usize>>,
    gate: watch::Sender<bool>,
}

impl Default for StaticReferenceData {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticReferenceData {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            values: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            fetches: Mutex::new(HashMap::new()),
            gate,
        }
    }

    #[must_use]
    pub fn with_field<I, S>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_values(field, values);
        self
    }

    pub fn set_values<I, S>(&self, field: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values
            .lock()
            .insert(fold(field), values.into_iter().map(Into::into).collect());
    }

    /// Makes every fetch for `field` fail until [`StaticReferenceData::recover`].
    pub fn fail(&self, field: &str) {
        self.failing.lock().insert(fold(field));
    }

    pub fn recover(&self, field: &str) {
        self.failing.lock().remove(&fold(field));
    }

    /// Parks every fetch until [`StaticReferenceData::release_fetches`].
    pub fn hold_fetches(&self) {
        self.gate.send_replace(false);
    }

    pub fn release_fetches(&self) {
        self.gate.send_replace(true);
    }

    pub fn fetch_count(&self, field: &str) -> usize {
        self.fetches.lock().get(&fold(field)).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ReferenceDataProvider for StaticReferenceData {
    async fn reference_values(&self, field: &str) -> Result<Vec<String>> {
        let key = fold(field);
        *self.fetches.lock().entry(key.clone()).or_default() += 1;

        let mut gate = self.gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            bail!("reference data for {field} went away while held");
        }

        if self.failing.lock().contains(&key) {
            bail!("reference data server unreachable for {field}");
        }
        Ok(self.values.lock().get(&key).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Pick(String),
    /// Picks the first candidate shown.
    First,
    Decline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenterCall {
    pub anchor: String,
    pub candidates: Vec<String>,
    pub seed: String,
}

/// [`OverlayPresenter`] that answers from a script. With an empty script the
/// overlay stays open until a test calls [`ScriptedPresenter::answer`].
#[derive(Default)]
pub struct ScriptedPresenter {
    script: Mutex<VecDeque<Answer>>,
    pending: Mutex<VecDeque<oneshot::Sender<String>>>,
    calls: Mutex<Vec<PresenterCall>>,
}

impl ScriptedPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(answers: impl IntoIterator<Item = Answer>) -> Self {
        let presenter = Self::new();
        presenter.script.lock().extend(answers);
        presenter
    }

    pub fn push(&self, answer: Answer) {
        self.script.lock().push_back(answer);
    }

    /// Answers the oldest open overlay. Returns `false` if none is open.
    pub fn answer(&self, selection: impl Into<String>) -> bool {
        let selection = selection.into();
        let mut pending = self.pending.lock();
        while let Some(sender) = pending.pop_front() {
            if sender.send(selection.clone()).is_ok() {
                return true;
            }
        }
        false
    }

    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .iter()
            .filter(|sender| !sender.is_closed())
            .count()
    }

    pub fn calls(&self) -> Vec<PresenterCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl OverlayPresenter for ScriptedPresenter {
    async fn show_suggestions(&self, anchor: &Anchor, candidates: &[String], seed: &str) -> String {
        self.calls.lock().push(PresenterCall {
            anchor: anchor.name.clone(),
            candidates: candidates.to_vec(),
            seed: seed.to_owned(),
        });

        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(Answer::Pick(value)) => value,
            Some(Answer::First) => candidates.first().cloned().unwrap_or_default(),
            Some(Answer::Decline) => String::new(),
            None => {
                let (sender, receiver) = oneshot::channel();
                self.pending.lock().push_back(sender);
                receiver.await.unwrap_or_default()
            }
        }
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<ErrorReport>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<ErrorReport> {
        self.reports.lock().clone()
    }

    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.reports.lock().iter().map(|report| report.kind).collect()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, report: ErrorReport) {
        self.reports.lock().push(report);
    }
}

/// Guard plus in-memory collaborators shared by every view of a test window.
pub struct Harness {
    pub guard: TransitionGuard,
    pub reference: Arc<StaticReferenceData>,
    pub presenter: Arc<ScriptedPresenter>,
    pub reporter: Arc<RecordingReporter>,
}

impl Harness {
    pub fn new(reference: StaticReferenceData, presenter: ScriptedPresenter) -> Self {
        Self {
            guard: TransitionGuard::default(),
            reference: Arc::new(reference),
            presenter: Arc::new(presenter),
            reporter: Arc::new(RecordingReporter::new()),
        }
    }

    #[must_use]
    pub fn with_guard(mut self, guard: TransitionGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            provider: self.reference.clone(),
            presenter: self.presenter.clone(),
            reporter: self.reporter.clone(),
        }
    }

    pub fn view(&self, name: &str, tab_index: usize) -> ViewScope {
        self.view_with(name, tab_index, CoordinatorOptions::default())
    }

    pub fn view_with(
        &self,
        name: &str,
        tab_index: usize,
        options: CoordinatorOptions,
    ) -> ViewScope {
        ViewScope::new(
            name,
            Some(tab_index),
            &self.guard,
            self.collaborators(),
            options,
        )
    }
}

/// Node of a hand-built element tree.
pub struct TreeNode {
    name: Option<String>,
    children: Vec<Element>,
}

impl TreeNode {
    pub fn named(name: &str) -> Element {
        Arc::new(Self {
            name: Some(name.to_owned()),
            children: Vec::new(),
        })
    }

    pub fn container(children: Vec<Element>) -> Element {
        Arc::new(Self {
            name: None,
            children,
        })
    }

    pub fn named_container(name: &str, children: Vec<Element>) -> Element {
        Arc::new(Self {
            name: Some(name.to_owned()),
            children,
        })
    }
}

impl VisualNode for TreeNode {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn children(&self) -> Vec<Element> {
        self.children.clone()
    }
}

struct FakeTab {
    root: Element,
    realized: bool,
}

/// Tab control double. A tab's tree only becomes visible once the tab has
/// been selected, and selection changes are reported to the guard the way a
/// real tab control's selection handler would.
pub struct FakeFocusHost {
    tabs: Mutex<Vec<FakeTab>>,
    selected: Mutex<usize>,
    guard: Option<TransitionGuard>,
    bindings: Mutex<HashMap<String, FieldCoordinator>>,
    focus_log: Mutex<Vec<String>>,
    lost_focus: Mutex<Vec<JoinHandle<Resolution>>>,
}

impl FakeFocusHost {
    pub fn new(guard: Option<TransitionGuard>) -> Self {
        Self {
            tabs: Mutex::new(Vec::new()),
            selected: Mutex::new(0),
            guard,
            bindings: Mutex::new(HashMap::new()),
            focus_log: Mutex::new(Vec::new()),
            lost_focus: Mutex::new(Vec::new()),
        }
    }

    /// Adds a tab; the first tab added starts out selected and realized.
    pub fn add_tab(&self, root: Element) -> usize {
        let mut tabs = self.tabs.lock();
        let realized = tabs.is_empty();
        tabs.push(FakeTab { root, realized });
        tabs.len() - 1
    }

    /// Runs `coordinator` when the element named `element` loses focus.
    pub fn bind(&self, element: &str, coordinator: FieldCoordinator) {
        self.bindings.lock().insert(fold(element), coordinator);
    }

    pub fn focus_log(&self) -> Vec<String> {
        self.focus_log.lock().clone()
    }

    /// Waits for every focus-loss pass started so far.
    pub async fn lost_focus_resolutions(&self) -> Result<Vec<Resolution>> {
        let handles: Vec<_> = self.lost_focus.lock().drain(..).collect();
        let mut resolutions = Vec::with_capacity(handles.len());
        for handle in handles {
            resolutions.push(handle.await?);
        }
        Ok(resolutions)
    }
}

impl FocusHost for FakeFocusHost {
    fn selected_tab(&self) -> usize {
        *self.selected.lock()
    }

    fn select_tab(&self, index: usize) {
        let from = {
            let mut tabs = self.tabs.lock();
            let Some(tab) = tabs.get_mut(index) else {
                return;
            };
            tab.realized = true;
            let mut selected = self.selected.lock();
            std::mem::replace(&mut *selected, index)
        };
        if let Some(guard) = &self.guard {
            guard.on_selection_changed(from, index);
        }
    }

    fn active_root(&self) -> Option<Element> {
        let selected = *self.selected.lock();
        self.tabs
            .lock()
            .get(selected)
            .filter(|tab| tab.realized)
            .map(|tab| tab.root.clone())
    }

    fn focus(&self, element: &Element) -> bool {
        let Some(name) = element.name() else {
            return false;
        };
        self.focus_log.lock().push(format!("focus {name}"));
        true
    }

    fn focus_neighbor(&self, element: &Element) -> bool {
        let Some(name) = element.name() else {
            return false;
        };
        self.focus_log.lock().push(format!("blur {name}"));
        let coordinator = self.bindings.lock().get(&fold(name)).cloned();
        if let Some(coordinator) = coordinator {
            let pass = tokio::spawn(async move { coordinator.on_focus_lost().await });
            self.lost_focus.lock().push(pass);
        }
        true
    }
}
