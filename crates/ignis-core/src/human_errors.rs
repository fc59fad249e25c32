// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the command line.
//
// Every technical error is mapped to a plain sentence plus a concrete next
// step. The stage wrapper is unwrapped so the message speaks about the cause,
// while the stage itself is reported separately.

use crate::error::IgnisError;
use crate::types::{ErrorClass, JobStage};

/// A human-readable error with a plain message and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// One-line summary.
    pub message: String,
    /// What the user should try next.
    pub suggestion: String,
    /// Stage that failed, when the error came out of the pipeline.
    pub stage: Option<JobStage>,
    pub class: ErrorClass,
}

impl HumanError {
    pub fn retriable(&self) -> bool {
        self.class == ErrorClass::Transient
    }
}

/// Classify an error for retry decisions.
pub fn classify(err: &IgnisError) -> ErrorClass {
    match err.root() {
        IgnisError::RenderTimeout { .. } => ErrorClass::Transient,
        IgnisError::Render(_) => ErrorClass::Transient,
        IgnisError::Io(io) => match io.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ErrorClass::UserAction
            }
            std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::WouldBlock => ErrorClass::Transient,
            _ => ErrorClass::Permanent,
        },
        IgnisError::Input(_)
        | IgnisError::Template(_)
        | IgnisError::Config(_)
        | IgnisError::InvalidTarget(_) => ErrorClass::UserAction,
        IgnisError::Stamp(_)
        | IgnisError::Packaging(_)
        | IgnisError::MiningExhausted { .. }
        | IgnisError::IntegrityMismatch { .. }
        | IgnisError::Serialization(_) => ErrorClass::Permanent,
        // root() never returns a Stage wrapper.
        IgnisError::Stage { .. } => ErrorClass::Permanent,
    }
}

/// Convert an `IgnisError` into a `HumanError`.
pub fn humanize_error(err: &IgnisError) -> HumanError {
    let (message, suggestion) = match err.root() {
        IgnisError::Input(detail) => (
            format!("The input can't be used: {detail}."),
            "Pass a readable .pdf or .docx file.".to_string(),
        ),
        IgnisError::Template(detail) => (
            format!("A template is missing or broken: {detail}."),
            "Check --template-dir points at the folder with Watermark.docx, DRAFT.docx and FileReport.docx.".to_string(),
        ),
        IgnisError::Config(detail) => (
            format!("The configuration is invalid: {detail}."),
            "Fix the JSON file passed with --config or the matching command-line flag.".to_string(),
        ),
        IgnisError::Render(detail) => (
            format!("The document could not be converted to PDF: {detail}."),
            "Make sure LibreOffice is installed (or pass --soffice), or try --renderer text.".to_string(),
        ),
        IgnisError::RenderTimeout { seconds } => (
            format!("Converting the document took longer than {seconds} seconds."),
            "Close other office instances and try again, or raise renderer.timeout_secs.".to_string(),
        ),
        IgnisError::Stamp(detail) => (
            format!("The PDF could not be stamped: {detail}."),
            "The PDF may be damaged or have fewer pages than the certificate needs.".to_string(),
        ),
        IgnisError::Packaging(detail) => (
            format!("The output archive could not be written: {detail}."),
            "Check free disk space and write access next to the input file.".to_string(),
        ),
        IgnisError::InvalidTarget(detail) => (
            format!("The certificate id is not usable: {detail}."),
            "Use a shorter lowercase hex uid.".to_string(),
        ),
        IgnisError::MiningExhausted { target, attempts } => (
            format!("No stamp matching {target} was found in {attempts} attempts."),
            "Use a shorter uid or raise miner.max_attempts.".to_string(),
        ),
        IgnisError::IntegrityMismatch { expected, actual } => (
            format!("A finished file has digest {actual}, which does not start with {expected}."),
            "This is a bug; please report it with the input file.".to_string(),
        ),
        IgnisError::Io(io) => (
            format!("A file operation failed: {io}."),
            "Check that the paths exist and are writable.".to_string(),
        ),
        IgnisError::Serialization(e) => (
            format!("Could not read or write JSON: {e}."),
            "Check the configuration file syntax.".to_string(),
        ),
        IgnisError::Stage { source, .. } => (source.to_string(), String::new()),
    };

    HumanError {
        message,
        suggestion,
        stage: err.stage(),
        class: classify(err),
    }
}
