// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use refguard_app::fold;
use refguard_ui::{
    Anchor, Element, ErrorReport, ErrorReporter, FieldCoordinator, FocusHost, OverlayPresenter,
    ReferenceDataProvider, Resolution, VisualNode,
};
use std::collections::{BTreeMap, HashMap};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::Config;

/// Reference values taken from the `[reference.<field>]` config sections.
pub struct ConfigReferenceData {
    values: HashMap<String, Vec<String>>,
}

impl ConfigReferenceData {
    pub fn from_config(config: &Config) -> Self {
        let values = config
            .reference_fields()
            .filter_map(|field| {
                config
                    .reference_values(field)
                    .map(|values| (fold(field), values.to_vec()))
            })
            .collect();
        Self { values }
    }
}

#[async_trait]
impl ReferenceDataProvider for ConfigReferenceData {
    async fn reference_values(&self, field: &str) -> Result<Vec<String>> {
        Ok(self.values.get(&fold(field)).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Pick(String),
    Decline,
    Invalid,
}

/// Interprets one answer line: a 1-based candidate number, a candidate typed
/// out in any case, or an empty line to keep the typed value.
pub fn parse_choice(line: &str, candidates: &[String]) -> Choice {
    let line = line.trim();
    if line.is_empty() {
        return Choice::Decline;
    }
    if let Ok(number) = line.parse::<usize>() {
        return number
            .checked_sub(1)
            .and_then(|index| candidates.get(index))
            .map_or(Choice::Invalid, |candidate| Choice::Pick(candidate.clone()));
    }
    let wanted = fold(line);
    candidates
        .iter()
        .find(|candidate| fold(candidate) == wanted)
        .map_or(Choice::Invalid, |candidate| Choice::Pick(candidate.clone()))
}

type SharedReader = Arc<Mutex<Box<dyn BufRead + Send>>>;
type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Shows candidates as a numbered list and reads the choice from a line
/// reader. Prompts are serialized so concurrent passes never interleave.
pub struct ConsolePresenter {
    reader: SharedReader,
    writer: SharedWriter,
    prompt: tokio::sync::Mutex<()>,
}

impl ConsolePresenter {
    pub fn new(reader: Box<dyn BufRead + Send>, writer: Box<dyn Write + Send>) -> Self {
        Self {
            reader: Arc::new(Mutex::new(reader)),
            writer: Arc::new(Mutex::new(writer)),
            prompt: tokio::sync::Mutex::new(()),
        }
    }

    pub fn stdio() -> Self {
        Self::new(Box::new(io::BufReader::new(io::stdin())), Box::new(io::stdout()))
    }

    fn ask(
        reader: &SharedReader,
        writer: &SharedWriter,
        field: &str,
        candidates: &[String],
        seed: &str,
    ) -> Result<String> {
        let mut out = writer.lock();
        writeln!(out, "{seed:?} is not a known {field}. Did you mean:")?;
        for (index, candidate) in candidates.iter().enumerate() {
            writeln!(out, "  {}. {candidate}", index + 1)?;
        }
        loop {
            write!(out, "choice (number or value, empty keeps {seed:?}): ")?;
            out.flush()?;

            let mut line = String::new();
            if reader.lock().read_line(&mut line)? == 0 {
                writeln!(out)?;
                return Ok(String::new());
            }
            match parse_choice(&line, candidates) {
                Choice::Pick(value) => return Ok(value),
                Choice::Decline => return Ok(String::new()),
                Choice::Invalid => {
                    writeln!(out, "{:?} is not one of the listed choices", line.trim())?;
                }
            }
        }
    }
}

#[async_trait]
impl OverlayPresenter for ConsolePresenter {
    async fn show_suggestions(&self, anchor: &Anchor, candidates: &[String], seed: &str) -> String {
        let _turn = self.prompt.lock().await;
        let reader = Arc::clone(&self.reader);
        let writer = Arc::clone(&self.writer);
        let field = anchor.name.clone();
        let candidates = candidates.to_vec();
        let seed = seed.to_owned();

        let answer = tokio::task::spawn_blocking(move || {
            Self::ask(&reader, &writer, &field, &candidates, &seed)
        })
        .await;
        match answer {
            Ok(Ok(selection)) => selection,
            Ok(Err(error)) => {
                warn!(error = %format!("{error:#}"), "console prompt failed; keeping typed value");
                String::new()
            }
            Err(error) => {
                warn!(%error, "console prompt task failed; keeping typed value");
                String::new()
            }
        }
    }
}

/// Renders one report as a single JSON object line.
pub fn report_line(report: &ErrorReport) -> Result<String> {
    let reported_at = report
        .reported_at
        .format(&Rfc3339)
        .context("format report timestamp")?;
    let context: BTreeMap<&str, &str> = report
        .context
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();
    let line = serde_json::json!({
        "kind": report.kind.as_str(),
        "message": report.message,
        "context": context,
        "reported_at": reported_at,
    });
    serde_json::to_string(&line).context("encode error report")
}

/// Writes each report as a JSON line.
pub struct JsonLineReporter<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLineReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl JsonLineReporter<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> ErrorReporter for JsonLineReporter<W> {
    fn report(&self, report: ErrorReport) {
        let written = report_line(&report).and_then(|line| {
            let mut writer = self.writer.lock();
            writeln!(writer, "{line}")?;
            writer.flush()?;
            Ok(())
        });
        if let Err(error) = written {
            warn!(
                error = %format!("{error:#}"),
                kind = report.kind.as_str(),
                "could not write error report"
            );
        }
    }
}

struct FieldElement {
    name: String,
}

impl VisualNode for FieldElement {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn children(&self) -> Vec<Element> {
        Vec::new()
    }
}

struct FormElement {
    children: Vec<Element>,
}

impl VisualNode for FormElement {
    fn name(&self) -> Option<&str> {
        None
    }

    fn children(&self) -> Vec<Element> {
        self.children.clone()
    }
}

/// Single-tab form whose fields are the coordinators given to it. Moving
/// focus off a field starts that field's focus-loss pass.
pub struct ConsoleForm {
    root: Element,
    coordinators: HashMap<String, FieldCoordinator>,
    passes: Mutex<Vec<(String, JoinHandle<Resolution>)>>,
}

impl ConsoleForm {
    pub fn new(coordinators: impl IntoIterator<Item = FieldCoordinator>) -> Self {
        let coordinators: HashMap<String, FieldCoordinator> = coordinators
            .into_iter()
            .map(|coordinator| (fold(&coordinator.field().name()), coordinator))
            .collect();
        let mut names: Vec<String> = coordinators
            .values()
            .map(|coordinator| coordinator.field().name())
            .collect();
        names.sort();
        let children = names
            .into_iter()
            .map(|name| Arc::new(FieldElement { name }) as Element)
            .collect();
        Self {
            root: Arc::new(FormElement { children }),
            coordinators,
            passes: Mutex::new(Vec::new()),
        }
    }

    /// Waits for every pass started so far, in the order they started.
    pub async fn resolutions(&self) -> Result<Vec<(String, Resolution)>> {
        let passes: Vec<_> = self.passes.lock().drain(..).collect();
        let mut resolutions = Vec::with_capacity(passes.len());
        for (field, pass) in passes {
            let resolution = pass
                .await
                .with_context(|| format!("focus-loss pass for {field} panicked"))?;
            resolutions.push((field, resolution));
        }
        Ok(resolutions)
    }
}

impl FocusHost for ConsoleForm {
    fn selected_tab(&self) -> usize {
        0
    }

    fn select_tab(&self, index: usize) {
        debug!(tab = index, "console form has a single tab");
    }

    fn active_root(&self) -> Option<Element> {
        Some(self.root.clone())
    }

    fn focus(&self, element: &Element) -> bool {
        element.name().is_some()
    }

    fn focus_neighbor(&self, element: &Element) -> bool {
        let Some(name) = element.name() else {
            return false;
        };
        let Some(coordinator) = self.coordinators.get(&fold(name)).cloned() else {
            return false;
        };
        let pass = tokio::spawn(async move { coordinator.on_focus_lost().await });
        self.passes.lock().push((name.to_owned(), pass));
        true
    }
}
