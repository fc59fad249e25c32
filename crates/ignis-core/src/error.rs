// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Ignis Stamp.

use thiserror::Error;

use crate::types::JobStage;

/// Top-level error type for all Ignis operations.
#[derive(Debug, Error)]
pub enum IgnisError {
    // -- Input errors --
    #[error("invalid input: {0}")]
    Input(String),

    #[error("template problem: {0}")]
    Template(String),

    #[error("configuration error: {0}")]
    Config(String),

    // -- Collaborator errors --
    #[error("rendering failed: {0}")]
    Render(String),

    #[error("renderer did not finish within {seconds}s")]
    RenderTimeout { seconds: u64 },

    #[error("PDF stamping failed: {0}")]
    Stamp(String),

    #[error("packaging failed: {0}")]
    Packaging(String),

    // -- Integrity errors --
    #[error("hash target rejected: {0}")]
    InvalidTarget(String),

    #[error("no trailer produced a digest starting with {target:?} after {attempts} attempts")]
    MiningExhausted { target: String, attempts: u64 },

    #[error("integrity check failed: expected prefix {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    // -- Ambient --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Pipeline --
    #[error("stage `{stage}` failed: {source}")]
    Stage {
        stage: JobStage,
        #[source]
        source: Box<IgnisError>,
    },
}

impl IgnisError {
    /// Attach the pipeline stage in which this error surfaced.
    ///
    /// Errors that already carry a stage are returned unchanged so the
    /// innermost stage wins.
    pub fn at(self, stage: JobStage) -> Self {
        match self {
            Self::Stage { .. } => self,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error was attributed to, if any.
    pub fn stage(&self) -> Option<JobStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The underlying error with any stage wrapper removed.
    pub fn root(&self) -> &IgnisError {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, IgnisError>;
