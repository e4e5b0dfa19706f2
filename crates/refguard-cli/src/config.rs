// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use refguard_app::fold;
use refguard_ui::{CoordinatorOptions, GuardSettings, SequencerSettings};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "refguard";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_SETTLE_DELAY: &str = "500ms";
const DEFAULT_TAB_SETTLE_DELAY: &str = "100ms";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub guard: Guard,
    #[serde(default)]
    pub focus: Focus,
    #[serde(default)]
    pub suggestions: Suggestions,
    #[serde(default)]
    pub reference: BTreeMap<String, Reference>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            guard: Guard::default(),
            focus: Focus::default(),
            suggestions: Suggestions::default(),
            reference: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Guard {
    pub settle_delay: Option<String>,
    pub header_height: Option<f64>,
}

impl Default for Guard {
    fn default() -> Self {
        Self {
            settle_delay: Some(DEFAULT_SETTLE_DELAY.to_owned()),
            header_height: Some(refguard_ui::guard::DEFAULT_HEADER_HEIGHT),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Focus {
    pub tab_settle_delay: Option<String>,
    pub max_depth: Option<i64>,
}

impl Default for Focus {
    fn default() -> Self {
        Self {
            tab_settle_delay: Some(DEFAULT_TAB_SETTLE_DELAY.to_owned()),
            max_depth: Some(refguard_ui::sequencer::DEFAULT_MAX_DEPTH as i64),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Suggestions {
    pub max_suggestions: Option<i64>,
}

impl Default for Suggestions {
    fn default() -> Self {
        Self {
            max_suggestions: Some(refguard_ui::coordinator::DEFAULT_MAX_SUGGESTIONS as i64),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Reference {
    #[serde(default)]
    pub values: Vec<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("REFGUARD_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set REFGUARD_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put settings under [guard], [focus], [suggestions], and [reference.<field>]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1. Run `refguard --print-example-config` for the current schema",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        for (key, raw) in [
            ("guard.settle_delay", &self.guard.settle_delay),
            ("focus.tab_settle_delay", &self.focus.tab_settle_delay),
        ] {
            if let Some(raw) = raw {
                let parsed = parse_duration(raw)?;
                if parsed <= Duration::ZERO {
                    bail!("{key} in {} must be positive, got {raw}", path.display());
                }
            }
        }

        if let Some(height) = self.guard.header_height
            && !(height > 0.0 && height.is_finite())
        {
            bail!(
                "guard.header_height in {} must be a positive number of pixels, got {}",
                path.display(),
                height
            );
        }

        if let Some(depth) = self.focus.max_depth
            && depth <= 0
        {
            bail!(
                "focus.max_depth in {} must be positive, got {}",
                path.display(),
                depth
            );
        }

        if let Some(max) = self.suggestions.max_suggestions
            && max <= 0
        {
            bail!(
                "suggestions.max_suggestions in {} must be positive, got {}",
                path.display(),
                max
            );
        }

        for (field, reference) in &self.reference {
            if let Some(blank) = reference.values.iter().position(|value| value.trim().is_empty())
            {
                bail!(
                    "reference.{field}.values[{blank}] in {} is blank; remove it or fill in a value",
                    path.display()
                );
            }
        }

        Ok(())
    }

    pub fn guard_settings(&self) -> Result<GuardSettings> {
        Ok(GuardSettings {
            settle_delay: parse_duration(
                self.guard
                    .settle_delay
                    .as_deref()
                    .unwrap_or(DEFAULT_SETTLE_DELAY),
            )?,
            header_height: self
                .guard
                .header_height
                .unwrap_or(refguard_ui::guard::DEFAULT_HEADER_HEIGHT),
        })
    }

    pub fn sequencer_settings(&self) -> Result<SequencerSettings> {
        let max_depth = match self.focus.max_depth {
            Some(depth) => usize::try_from(depth)
                .with_context(|| format!("focus.max_depth {depth} is out of range"))?,
            None => refguard_ui::sequencer::DEFAULT_MAX_DEPTH,
        };
        Ok(SequencerSettings {
            tab_settle_delay: parse_duration(
                self.focus
                    .tab_settle_delay
                    .as_deref()
                    .unwrap_or(DEFAULT_TAB_SETTLE_DELAY),
            )?,
            max_depth,
        })
    }

    pub fn coordinator_options(&self) -> CoordinatorOptions {
        let max_suggestions = self
            .suggestions
            .max_suggestions
            .and_then(|max| usize::try_from(max).ok())
            .unwrap_or(refguard_ui::coordinator::DEFAULT_MAX_SUGGESTIONS);
        CoordinatorOptions { max_suggestions }
    }

    /// Reference values for `field`, matching the section name case-insensitively.
    pub fn reference_values(&self, field: &str) -> Option<&[String]> {
        let wanted = fold(field);
        self.reference
            .iter()
            .find(|(name, _)| fold(name) == wanted)
            .map(|(_, reference)| reference.values.as_slice())
    }

    pub fn reference_fields(&self) -> impl Iterator<Item = &str> {
        self.reference.keys().map(String::as_str)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# refguard config\n# Place this file at: {}\n\nversion = 1\n\n[guard]\n# How long a tab switch suppresses focus-loss validation.\nsettle_delay = \"{}\"\n# Pointer presses at or above this y coordinate hit the tab headers.\nheader_height = {:.1}\n\n[focus]\ntab_settle_delay = \"{}\"\nmax_depth = {}\n\n[suggestions]\nmax_suggestions = {}\n\n[reference.part]\nvalues = [\"PN-100\", \"PN-101\", \"PN-999\"]\n\n[reference.location]\nvalues = [\"A-01\", \"A-02\", \"RECEIVING\"]\n",
            path.display(),
            DEFAULT_SETTLE_DELAY,
            refguard_ui::guard::DEFAULT_HEADER_HEIGHT,
            DEFAULT_TAB_SETTLE_DELAY,
            refguard_ui::sequencer::DEFAULT_MAX_DEPTH,
            refguard_ui::coordinator::DEFAULT_MAX_SUGGESTIONS,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        let secs = mins
            .checked_mul(60)
            .ok_or_else(|| anyhow!("duration {raw:?} is too large; use a smaller value"))?;
        return Ok(Duration::from_secs(secs));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 1s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        let guard = config.guard_settings()?;
        assert_eq!(guard.settle_delay, Duration::from_millis(500));
        assert_eq!(guard.header_height, 45.0);
        let focus = config.sequencer_settings()?;
        assert_eq!(focus.tab_settle_delay, Duration::from_millis(100));
        assert_eq!(focus.max_depth, 32);
        assert_eq!(config.coordinator_options().max_suggestions, 50);
        assert!(config.reference_values("part").is_none());
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[guard]\nsettle_delay = \"1s\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[reference.<field>]"));
        Ok(())
    }

    #[test]
    fn v1_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[guard]\nsettle_delay = \"750ms\"\nheader_height = 30.0\n[focus]\ntab_settle_delay = \"1s\"\nmax_depth = 8\n[suggestions]\nmax_suggestions = 20\n[reference.Part]\nvalues = [\"PN-100\", \"PN-101\"]\n",
        )?;

        let config = Config::load(&path)?;
        let guard = config.guard_settings()?;
        assert_eq!(guard.settle_delay, Duration::from_millis(750));
        assert_eq!(guard.header_height, 30.0);
        let focus = config.sequencer_settings()?;
        assert_eq!(focus.tab_settle_delay, Duration::from_secs(1));
        assert_eq!(focus.max_depth, 8);
        assert_eq!(config.coordinator_options().max_suggestions, 20);
        assert_eq!(
            config.reference_values("part"),
            Some(&["PN-100".to_owned(), "PN-101".to_owned()][..])
        );
        assert_eq!(config.reference_fields().collect::<Vec<_>>(), ["Part"]);
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("REFGUARD_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("REFGUARD_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn default_path_uses_config_toml_suffix_when_no_env_override() -> Result<()> {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("REFGUARD_CONFIG_PATH");
        }
        let path = Config::default_path()?;
        assert!(path.ends_with("config.toml"));
        Ok(())
    }

    #[test]
    fn durations_parse_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        Ok(())
    }

    #[test]
    fn oversized_minutes_are_rejected_instead_of_overflowing() -> Result<()> {
        let error = parse_duration(&format!("{}m", u64::MAX)).expect_err("overflow should fail");
        assert!(error.to_string().contains("too large"));

        let (_temp, path) = write_config(&format!(
            "version = 1\n[guard]\nsettle_delay = \"{}m\"\n",
            u64::MAX / 2
        ))?;
        let error = Config::load(&path).expect_err("oversized delay should fail");
        assert!(error.to_string().contains("too large"));
        Ok(())
    }

    #[test]
    fn invalid_duration_is_rejected() {
        let error = parse_duration("soon").expect_err("invalid duration should fail");
        assert!(error.to_string().contains("invalid duration"));
    }

    #[test]
    fn zero_settle_delay_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[guard]\nsettle_delay = \"0ms\"\n")?;
        let error = Config::load(&path).expect_err("zero delay should fail");
        let message = error.to_string();
        assert!(message.contains("guard.settle_delay"));
        assert!(message.contains("must be positive"));
        Ok(())
    }

    #[test]
    fn limits_are_validated() -> Result<()> {
        for content in [
            "version = 1\n[guard]\nheader_height = -1.0\n",
            "version = 1\n[focus]\nmax_depth = 0\n",
            "version = 1\n[suggestions]\nmax_suggestions = 0\n",
        ] {
            let (_temp, path) = write_config(content)?;
            let error = Config::load(&path).expect_err("invalid limit should fail");
            assert!(
                error.to_string().contains("must be"),
                "unexpected message: {error}"
            );
        }
        Ok(())
    }

    #[test]
    fn blank_reference_values_are_rejected() -> Result<()> {
        let (_temp, path) =
            write_config("version = 1\n[reference.location]\nvalues = [\"A-01\", \"  \"]\n")?;
        let error = Config::load(&path).expect_err("blank value should fail");
        assert!(error.to_string().contains("reference.location.values[1]"));
        Ok(())
    }

    #[test]
    fn example_config_round_trips_through_load() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        assert!(example.contains("[guard]"));
        assert!(example.contains("[reference.part]"));
        std::fs::write(&path, &example)?;
        let config = Config::load(&path)?;
        assert_eq!(config.reference_values("location").map(<[String]>::len), Some(3));
        Ok(())
    }
}
