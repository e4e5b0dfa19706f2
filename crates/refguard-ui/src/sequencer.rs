// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use refguard_app::{ErrorKind, FocusMode, fold};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::TransitionGuard;

pub const DEFAULT_TAB_SETTLE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// One realized element in a view's visual tree.
pub trait VisualNode: Send + Sync {
    fn name(&self) -> Option<&str>;
    fn children(&self) -> Vec<Element>;
}

pub type Element = Arc<dyn VisualNode>;

/// The tab control and focus primitives of the hosting window.
pub trait FocusHost: Send + Sync {
    fn selected_tab(&self) -> usize;
    fn select_tab(&self, index: usize);
    /// Realized element tree of the selected tab, or `None` before it is built.
    fn active_root(&self) -> Option<Element>;
    fn focus(&self, element: &Element) -> bool;
    /// Moves focus to the next focusable element after `element`.
    fn focus_neighbor(&self, element: &Element) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerSettings {
    pub tab_settle_delay: Duration,
    pub max_depth: usize,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            tab_settle_delay: DEFAULT_TAB_SETTLE_DELAY,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceReport {
    pub focused: Vec<String>,
    pub missing: Vec<String>,
    pub switched_tab: bool,
}

/// Runs ordered focus operations against a tab's fields, switching to the
/// tab first when needed.
pub struct FocusSequencer {
    host: Arc<dyn FocusHost>,
    guard: Option<TransitionGuard>,
    settings: SequencerSettings,
    aliases: HashMap<String, String>,
}

impl FocusSequencer {
    pub fn new(host: Arc<dyn FocusHost>, settings: SequencerSettings) -> Self {
        Self {
            host,
            guard: None,
            settings,
            aliases: HashMap::new(),
        }
    }

    /// Waits for this guard to settle after a tab switch in
    /// [`FocusMode::TriggerLostFocus`] runs.
    #[must_use]
    pub fn with_guard(mut self, guard: TransitionGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Maps a short identifier, e.g. `part`, onto an element name.
    #[must_use]
    pub fn with_alias(mut self, alias: &str, element: impl Into<String>) -> Self {
        self.aliases.insert(fold(alias), element.into());
        self
    }

    pub fn settings(&self) -> SequencerSettings {
        self.settings
    }

    pub fn resolve_alias<'a>(&'a self, target: &'a str) -> &'a str {
        self.aliases
            .get(&fold(target))
            .map_or(target, String::as_str)
    }

    pub async fn run<T: AsRef<str>>(
        &self,
        targets: &[T],
        tab_index: usize,
        inter_field_delay: Duration,
        mode: FocusMode,
    ) -> SequenceReport {
        let mut report = SequenceReport::default();

        if self.host.selected_tab() != tab_index {
            debug!(tab = tab_index, "switching tab before focus sequence");
            self.host.select_tab(tab_index);
            report.switched_tab = true;
            tokio::time::sleep(self.settings.tab_settle_delay).await;
            if mode == FocusMode::TriggerLostFocus {
                if let Some(guard) = &self.guard {
                    guard.settled().await;
                }
            }
        }

        for (index, target) in targets.iter().enumerate() {
            if index > 0 && !inter_field_delay.is_zero() {
                tokio::time::sleep(inter_field_delay).await;
            }
            let target = target.as_ref();
            let Some(element) = self.find_element(self.resolve_alias(target)) else {
                warn!(
                    element = target,
                    tab = tab_index,
                    kind = ErrorKind::FocusTargetMissing.as_str(),
                    "focus target not found"
                );
                report.missing.push(target.to_owned());
                continue;
            };

            let focused = match mode {
                FocusMode::FocusOnly => self.host.focus(&element),
                FocusMode::TriggerLostFocus => {
                    self.host.focus(&element) && self.host.focus_neighbor(&element)
                }
            };
            if focused {
                debug!(element = target, mode = mode.as_str(), "focus target handled");
                report.focused.push(target.to_owned());
            } else {
                warn!(
                    element = target,
                    kind = ErrorKind::FocusTargetMissing.as_str(),
                    "focus target refused focus"
                );
                report.missing.push(target.to_owned());
            }
        }
        report
    }

    /// Breadth-first search of the active tab's realized tree, bounded by
    /// `max_depth`. Names compare case-insensitively.
    pub fn find_element(&self, name: &str) -> Option<Element> {
        let wanted = fold(name);
        let root = self.host.active_root()?;
        let mut queue = VecDeque::from([(root, 0usize)]);
        while let Some((node, depth)) = queue.pop_front() {
            if node.name().is_some_and(|candidate| fold(candidate) == wanted) {
                return Some(node);
            }
            if depth < self.settings.max_depth {
                queue.extend(node.children().into_iter().map(|child| (child, depth + 1)));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{Element, FocusHost, FocusSequencer, SequencerSettings, VisualNode};
    use parking_lot::Mutex;
    use refguard_app::FocusMode;
    use std::sync::Arc;
    use std::time::Duration;

    struct Node {
        name: Option<String>,
        children: Vec<Element>,
    }

    impl VisualNode for Node {
        fn name(&self) -> Option<&str> {
            self.name.as_deref()
        }

        fn children(&self) -> Vec<Element> {
            self.children.clone()
        }
    }

    fn node(name: Option<&str>, children: Vec<Element>) -> Element {
        Arc::new(Node {
            name: name.map(str::to_owned),
            children,
        })
    }

    /// A chain of anonymous containers `depth` levels deep ending in `leaf`.
    fn nested(depth: usize, leaf: &str) -> Element {
        (0..depth).fold(node(Some(leaf), Vec::new()), |child, _| {
            node(None, vec![child])
        })
    }

    struct OneTab {
        root: Element,
        log: Mutex<Vec<String>>,
    }

    impl FocusHost for OneTab {
        fn selected_tab(&self) -> usize {
            0
        }

        fn select_tab(&self, _: usize) {}

        fn active_root(&self) -> Option<Element> {
            Some(self.root.clone())
        }

        fn focus(&self, element: &Element) -> bool {
            let name = element.name().unwrap_or_default().to_owned();
            self.log.lock().push(format!("focus {name}"));
            true
        }

        fn focus_neighbor(&self, element: &Element) -> bool {
            let name = element.name().unwrap_or_default().to_owned();
            self.log.lock().push(format!("leave {name}"));
            true
        }
    }

    fn host(root: Element) -> Arc<OneTab> {
        Arc::new(OneTab {
            root,
            log: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn search_stops_at_max_depth() {
        let settings = SequencerSettings {
            max_depth: 3,
            ..SequencerSettings::default()
        };
        let shallow = FocusSequencer::new(host(nested(3, "PartTextBox")), settings);
        assert!(shallow.find_element("parttextbox").is_some());

        let deep = FocusSequencer::new(host(nested(4, "PartTextBox")), settings);
        assert!(deep.find_element("PartTextBox").is_none());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn aliases_and_missing_targets() {
        let root = node(
            None,
            vec![
                node(Some("PartTextBox"), Vec::new()),
                node(Some("OperationTextBox"), Vec::new()),
            ],
        );
        let host = host(root);
        let sequencer = FocusSequencer::new(host.clone(), SequencerSettings::default())
            .with_alias("part", "PartTextBox")
            .with_alias("partid", "PartTextBox");

        let report = sequencer
            .run(
                &["PartID", "Quantity", "OperationTextBox"],
                0,
                Duration::ZERO,
                FocusMode::TriggerLostFocus,
            )
            .await;
        assert_eq!(report.focused, ["PartID", "OperationTextBox"]);
        assert_eq!(report.missing, ["Quantity"]);
        assert!(!report.switched_tab);
        assert_eq!(
            *host.log.lock(),
            [
                "focus PartTextBox",
                "leave PartTextBox",
                "focus OperationTextBox",
                "leave OperationTextBox",
            ]
        );
    }
}
