// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ignis Stamp — certified PDF packages from the command line.
//
// Entry point. Initialises logging, merges the configuration file with the
// command-line flags, runs one assembly job and prints where the archive went.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use ignis_assembly::{AssemblyPipeline, write_starter_templates};
use ignis_core::config::{RendererKind, StampConfig};
use ignis_core::error::{IgnisError, Result};
use ignis_core::human_errors::humanize_error;
use ignis_core::types::{AssemblyJob, HashTarget, JobOutcome};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "ignis-stamp",
    version,
    about = "Certify a document: watermark it, pin every PDF's SHA-256 to a uid prefix, and zip the results"
)]
struct Cli {
    /// Document to certify (.pdf or .docx). The archive is written next to it.
    #[arg(required_unless_present = "init_templates")]
    input: Option<PathBuf>,

    /// Certificate uid (lowercase hex). A random one is drawn when omitted.
    #[arg(long, env = "IGNIS_UID")]
    uid: Option<String>,

    /// Produce a draft package regardless of the file name.
    #[arg(long)]
    draft: bool,

    /// JSON configuration file.
    #[arg(long, env = "IGNIS_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding Watermark.docx, DRAFT.docx and FileReport.docx.
    #[arg(long, env = "IGNIS_TEMPLATE_DIR")]
    template_dir: Option<PathBuf>,

    /// Conversion cache directory.
    #[arg(long, env = "IGNIS_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// How .docx files are turned into PDF.
    #[arg(long, value_enum)]
    renderer: Option<RendererArg>,

    /// LibreOffice binary used by the office renderer.
    #[arg(long, env = "IGNIS_SOFFICE")]
    soffice: Option<PathBuf>,

    /// Mining threads (0 = all cores).
    #[arg(long)]
    threads: Option<usize>,

    /// Print a JSON summary instead of the archive path.
    #[arg(long)]
    json: bool,

    /// Write plain starter templates into DIR and exit.
    #[arg(long, value_name = "DIR", conflicts_with = "input")]
    init_templates: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RendererArg {
    Office,
    Text,
}

impl From<RendererArg> for RendererKind {
    fn from(arg: RendererArg) -> Self {
        match arg {
            RendererArg::Office => RendererKind::Office,
            RendererArg::Text => RendererKind::Text,
        }
    }
}

#[derive(Serialize)]
struct Success<'a> {
    status: &'static str,
    #[serde(flatten)]
    outcome: &'a JobOutcome,
}

#[derive(Serialize)]
struct Failure<'a> {
    status: &'static str,
    stage: Option<&'static str>,
    message: &'a str,
    suggestion: &'a str,
    retriable: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            report_error(&err, cli.json);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<String> {
    if let Some(dir) = &cli.init_templates {
        let written = write_starter_templates(dir)?;
        let lines: Vec<String> = written.iter().map(|p| p.display().to_string()).collect();
        return Ok(lines.join("\n"));
    }

    let config = load_config(cli)?;
    let input = cli
        .input
        .as_ref()
        .ok_or_else(|| IgnisError::Input("no input file given".into()))?;
    let uid = match &cli.uid {
        Some(raw) => HashTarget::parse(raw)?,
        None => HashTarget::random(config.uid_length),
    };

    let mut job = AssemblyJob::for_input(input, uid)?;
    if cli.draft {
        job = job.with_draft(true);
    }
    info!(
        input = %job.input.display(),
        uid = %job.target,
        draft = job.is_draft,
        "Ignis Stamp starting"
    );

    let outcome = AssemblyPipeline::new(config).run(&job)?;

    if cli.json {
        Ok(serde_json::to_string_pretty(&Success {
            status: "ok",
            outcome: &outcome,
        })?)
    } else {
        Ok(outcome.archive.display().to_string())
    }
}

/// Configuration file (or defaults) with command-line flags applied on top.
fn load_config(cli: &Cli) -> Result<StampConfig> {
    let mut config = StampConfig::load(cli.config.as_deref())?;

    if let Some(dir) = &cli.template_dir {
        config.template_dir = dir.clone();
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache.dir = dir.clone();
    }
    if let Some(renderer) = cli.renderer {
        config.renderer.kind = renderer.into();
    }
    if let Some(binary) = &cli.soffice {
        config.renderer.office_binary = binary.clone();
    }
    if let Some(threads) = cli.threads {
        config.miner.threads = threads;
    }

    config.validate()?;
    Ok(config)
}

fn report_error(err: &IgnisError, json: bool) {
    let human = humanize_error(err);
    if json {
        let failure = Failure {
            status: "error",
            stage: human.stage.map(|s| s.name()),
            message: &human.message,
            suggestion: &human.suggestion,
            retriable: human.retriable(),
        };
        match serde_json::to_string_pretty(&failure) {
            Ok(text) => println!("{text}"),
            Err(_) => eprintln!("{}", human.message),
        }
        return;
    }

    match human.stage {
        Some(stage) => eprintln!("ignis-stamp: {} (stage: {stage})", human.message),
        None => eprintln!("ignis-stamp: {}", human.message),
    }
    if !human.suggestion.is_empty() {
        eprintln!("  {}", human.suggestion);
    }
}
