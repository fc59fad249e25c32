// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-job scratch storage.
//
// Layout of the temporary directory:
//
//   Watermark.docx, DRAFT.docx, FileReport.docx   copied templates
//   live_document.<ext>                           copy of the input
//   live_document.pdf                             working PDF
//   out/                                          finished artifacts
//
// The directory is removed when the workspace is dropped, whether the job
// succeeded or not.

use std::fs;
use std::path::{Path, PathBuf};

use ignis_core::error::{IgnisError, Result};
use ignis_core::types::DocumentType;
use ignis_document::build_docx;
use tempfile::TempDir;
use tracing::{debug, info};

pub const WATERMARK_TEMPLATE: &str = "Watermark.docx";
pub const DRAFT_TEMPLATE: &str = "DRAFT.docx";
pub const REPORT_TEMPLATE: &str = "FileReport.docx";

/// Every template a job needs.
pub const TEMPLATES: [&str; 3] = [WATERMARK_TEMPLATE, DRAFT_TEMPLATE, REPORT_TEMPLATE];

const LIVE_STEM: &str = "live_document";
const OUT_DIR: &str = "out";

#[derive(Debug)]
pub struct JobWorkspace {
    dir: TempDir,
    input_copy: PathBuf,
}

impl JobWorkspace {
    /// Create the workspace and copy the templates and the input into it.
    pub fn create(template_dir: &Path, input: &Path, document_type: DocumentType) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("ignis-job-").tempdir()?;

        for name in TEMPLATES {
            let source = template_dir.join(name);
            fs::copy(&source, dir.path().join(name)).map_err(|err| {
                IgnisError::Template(format!("cannot copy {}: {err}", source.display()))
            })?;
        }

        let input_copy = dir
            .path()
            .join(format!("{LIVE_STEM}.{}", document_type.extension()));
        fs::copy(input, &input_copy).map_err(|err| {
            IgnisError::Input(format!("cannot read {}: {err}", input.display()))
        })?;

        fs::create_dir(dir.path().join(OUT_DIR))?;

        debug!(workspace = %dir.path().display(), "Job workspace ready");
        Ok(Self { dir, input_copy })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory whose top-level files become the archive.
    pub fn out_dir(&self) -> PathBuf {
        self.dir.path().join(OUT_DIR)
    }

    pub fn read_input(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.input_copy)?)
    }

    pub fn template(&self, name: &str) -> Result<Vec<u8>> {
        fs::read(self.dir.path().join(name))
            .map_err(|err| IgnisError::Template(format!("{name}: {err}")))
    }

    /// Replace the working PDF.
    pub fn write_live_pdf(&self, pdf: &[u8]) -> Result<()> {
        fs::write(self.dir.path().join(format!("{LIVE_STEM}.pdf")), pdf)?;
        Ok(())
    }

    /// Write a finished artifact into `out/` and return its path.
    pub fn write_artifact(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.out_dir().join(file_name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

// -- Starter templates ---------------------------------------------------------

/// Paragraphs of the plain templates written by [`write_starter_templates`].
fn starter_body(name: &str) -> &'static [&'static str] {
    match name {
        WATERMARK_TEMPLATE => &["__id__"],
        DRAFT_TEMPLATE => &["DRAFT", "Valid until __date__"],
        _ => &[
            "Ignis Verification Report",
            "",
            "__filename_1__",
            "SHA-256: __sha256_1__",
            "",
            "__filename_2__",
            "SHA-256: __sha256_2__",
        ],
    }
}

/// Write a plain version of every template into `dir`. Existing files are
/// never overwritten.
pub fn write_starter_templates(dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(TEMPLATES.len());
    for name in TEMPLATES {
        let path = dir.join(name);
        if path.exists() {
            return Err(IgnisError::Input(format!(
                "{} already exists",
                path.display()
            )));
        }
        written.push((path, build_docx(starter_body(name))?));
    }
    let mut paths = Vec::with_capacity(written.len());
    for (path, docx) in written {
        fs::write(&path, docx)?;
        paths.push(path);
    }
    info!(dir = %dir.display(), "Starter templates written");
    Ok(paths)
}
