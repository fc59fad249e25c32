// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Ignis Stamp.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{IgnisError, Result};

/// Unique identifier for an assembly job (used for log correlation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// -- Hash target --------------------------------------------------------------

/// The hex prefix every artifact digest must start with. Doubles as the
/// human-facing certificate identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashTarget(String);

impl HashTarget {
    /// Accept a caller-supplied uid. Must be non-empty lowercase hex.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(IgnisError::Input("uid must not be empty".into()));
        }
        if !raw.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(IgnisError::Input(format!(
                "uid {raw:?} must be lowercase hexadecimal"
            )));
        }
        Ok(Self(raw.to_owned()))
    }

    /// Draw a fresh random uid of `len` hex characters (1..=32).
    pub fn random(len: usize) -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        let len = len.clamp(1, simple.len());
        Self(simple[..len].to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for HashTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HashTarget {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// -- Documents ----------------------------------------------------------------

/// Supported input document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    /// Word-processor document; rendered to PDF before stamping.
    Docx,
}

impl DocumentType {
    /// Infer document type from file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }
}

/// Inclusive, 1-indexed page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn single(page: u32) -> Self {
        Self {
            start: page,
            end: page,
        }
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

// -- Artifacts ----------------------------------------------------------------

/// The named PDFs a job can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Watermarked page subset.
    Certificate,
    /// Full watermarked document.
    Report,
    /// Digest listing of the other two (final runs only).
    Verification,
}

impl ArtifactKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Certificate => "Certificate",
            Self::Report => "Report",
            Self::Verification => "Verification",
        }
    }

    /// Output file name for an input named `stem`.
    pub fn file_name(&self, stem: &str) -> String {
        format!("{stem} {}.pdf", self.label())
    }
}

/// A stamped output PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub file_name: String,
    /// Lowercase hex SHA-256 of the file bytes.
    pub sha256: String,
    pub size: u64,
}

// -- Jobs ---------------------------------------------------------------------

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Init,
    Converted,
    WatermarkApplied,
    PagesExtracted,
    DraftStamped,
    HashStamped,
    ReportGenerated,
    Packaged,
    Done,
    Failed,
}

impl JobStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Converted => "convert",
            Self::WatermarkApplied => "watermark",
            Self::PagesExtracted => "extract",
            Self::DraftStamped => "draft",
            Self::HashStamped => "hash",
            Self::ReportGenerated => "report",
            Self::Packaged => "package",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The unit of work: one input document stamped against one target.
#[derive(Debug, Clone)]
pub struct AssemblyJob {
    pub id: JobId,
    /// Absolute path of the caller's input file.
    pub input: PathBuf,
    pub document_type: DocumentType,
    pub target: HashTarget,
    pub is_draft: bool,
    pub created_at: DateTime<Local>,
}

impl AssemblyJob {
    /// Build a job for `input`, deriving the document type from the
    /// extension and the draft flag from the file stem.
    pub fn for_input(input: impl AsRef<Path>, target: HashTarget) -> Result<Self> {
        let input = input.as_ref();
        let ext = input
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| IgnisError::Input(format!("{} has no extension", input.display())))?;
        let document_type = DocumentType::from_extension(ext).ok_or_else(|| {
            IgnisError::Input(format!(
                "unsupported extension .{ext} (expected .pdf or .docx)"
            ))
        })?;

        let input = std::path::absolute(input)?;
        let is_draft = stem_of(&input)?.to_ascii_lowercase().ends_with("draft");

        Ok(Self {
            id: JobId::new(),
            input,
            document_type,
            target,
            is_draft,
            created_at: Local::now(),
        })
    }

    /// Force the draft branch on or off.
    pub fn with_draft(mut self, is_draft: bool) -> Self {
        self.is_draft = is_draft;
        self
    }

    pub fn is_final(&self) -> bool {
        !self.is_draft
    }

    /// Input file name without its extension; names every output.
    pub fn stem(&self) -> Result<&str> {
        stem_of(&self.input)
    }
}

fn stem_of(path: &Path) -> Result<&str> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| IgnisError::Input(format!("{} has no usable file name", path.display())))
}

/// What a successful job hands back to its caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub archive: PathBuf,
    pub uid: HashTarget,
    pub draft: bool,
    pub artifacts: Vec<Artifact>,
    pub stages: Vec<JobStage>,
}

/// Classification of errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Tool crash, timeout, interrupted I/O — safe to retry automatically.
    Transient,
    /// The caller must fix something (input file, templates, configuration).
    UserAction,
    /// Retrying cannot help.
    Permanent,
}
