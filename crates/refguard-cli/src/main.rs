// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use refguard_app::{FocusMode, fold};
use refguard_testkit::demo_reference_data;
use refguard_ui::{
    Collaborators, FocusSequencer, ReferenceDataProvider, Resolution, TransitionGuard, ViewScope,
};
use runtime::{ConfigReferenceData, ConsoleForm, ConsolePresenter, JsonLineReporter};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    logging::init_logging(options.verbose)?;

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `refguard --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;
    let guard_settings = config.guard_settings()?;
    let sequencer_settings = config.sequencer_settings()?;
    debug!(?guard_settings, ?sequencer_settings, "config loaded");

    if options.check_only {
        println!(
            "config {} is valid ({} reference fields)",
            options.config_path.display(),
            config.reference_fields().count()
        );
        return Ok(());
    }

    if options.entries.is_empty() {
        bail!(
            "nothing to validate; pass --field <name> --input <text> (run with --help for usage)"
        );
    }
    if !options.demo {
        for entry in &options.entries {
            if config.reference_values(&entry.field).is_none() {
                bail!(
                    "no [reference.{}] section in {}; add one with `values = [...]` or use --demo",
                    entry.field,
                    options.config_path.display()
                );
            }
        }
    }

    let provider: Arc<dyn ReferenceDataProvider> = if options.demo {
        Arc::new(demo_reference_data())
    } else {
        Arc::new(ConfigReferenceData::from_config(&config))
    };
    let collaborators = Collaborators {
        provider,
        presenter: Arc::new(ConsolePresenter::stdio()),
        reporter: Arc::new(JsonLineReporter::stderr()),
    };

    let executor = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("start async runtime")?;
    executor.block_on(async {
        let guard = TransitionGuard::new(guard_settings);
        let view = ViewScope::new(
            "console",
            Some(0),
            &guard,
            collaborators,
            config.coordinator_options(),
        );
        let coordinators: Vec<_> = options
            .entries
            .iter()
            .map(|entry| {
                let coordinator = view.add_field(entry.field.as_str());
                coordinator.field().edit(entry.input.as_str());
                coordinator
            })
            .collect();

        let form = Arc::new(ConsoleForm::new(coordinators));
        let sequencer =
            FocusSequencer::new(form.clone(), sequencer_settings).with_guard(guard.clone());
        let targets: Vec<&str> = options
            .entries
            .iter()
            .map(|entry| entry.field.as_str())
            .collect();
        sequencer
            .run(&targets, 0, Duration::ZERO, FocusMode::TriggerLostFocus)
            .await;

        let resolutions = form.resolutions().await?;
        info!(fields = resolutions.len(), "validation finished");
        for (field, resolution) in resolutions {
            let state = view
                .field(&field)
                .ok_or_else(|| anyhow!("field {field} vanished from the form"))?
                .snapshot();
            println!(
                "{field}: {} -> {:?} (valid: {})",
                describe(&resolution),
                state.text,
                state.valid
            );
            if let Some(error) = state.error {
                println!("  {error}");
            }
        }
        Ok::<_, anyhow::Error>(())
    })
}

fn describe(resolution: &Resolution) -> String {
    match resolution {
        Resolution::Skipped(reason) => format!("skipped ({})", reason.as_str()),
        Resolution::Accepted(_) => "accepted".to_owned(),
        Resolution::Picked(value) => format!("picked {value:?}"),
        Resolution::Declined => "declined, kept as typed".to_owned(),
        Resolution::Cleared(kind) => format!("cleared ({})", kind.as_str()),
        Resolution::Cancelled => "cancelled".to_owned(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldEntry {
    field: String,
    input: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    demo: bool,
    verbose: bool,
    show_help: bool,
    entries: Vec<FieldEntry>,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        check_only: false,
        demo: false,
        verbose: false,
        show_help: false,
        entries: Vec::new(),
    };
    let mut pending_field: Option<String> = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--field" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--field requires a field name"))?;
                if let Some(previous) = pending_field.take() {
                    bail!("--field {previous} has no --input; give each field its own --input");
                }
                let field = value.as_ref().trim().to_owned();
                if field.is_empty() {
                    bail!("--field requires a non-empty field name");
                }
                if options
                    .entries
                    .iter()
                    .any(|entry| fold(&entry.field) == fold(&field))
                {
                    bail!("--field {field} was given twice; validate each field once");
                }
                pending_field = Some(field);
            }
            "--input" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--input requires a value (use \"\" for blank)"))?;
                let field = pending_field
                    .take()
                    .ok_or_else(|| anyhow!("--input must follow --field <name>"))?;
                options.entries.push(FieldEntry {
                    field,
                    input: value.as_ref().to_owned(),
                });
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--verbose" | "-v" => {
                options.verbose = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    if let Some(field) = pending_field {
        bail!("--field {field} has no --input; give each field its own --input");
    }

    Ok(options)
}

fn print_help() {
    println!("refguard: validate reference-data fields the way the entry form does");
    println!("  --field <name> --input <text>  Field to validate and its typed value (repeatable)");
    println!("  --config <path>                Use a specific config path");
    println!("  --print-config-path            Print resolved config path");
    println!("  --print-example-config         Print a v1 config template");
    println!("  --demo                         Use built-in part/operation/location data");
    println!("  --check                        Validate config and exit");
    println!("  --verbose                      Debug logging on stderr (RUST_LOG overrides)");
    println!("  --help                         Show this help");
}
