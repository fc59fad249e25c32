// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Assembly pipeline — turns one input document into a zip of certified PDFs.
//
// Stages run strictly in order:
//
//   Init → Converted (docx only) → WatermarkApplied → PagesExtracted
//        → DraftStamped (draft only) → HashStamped → ReportGenerated (final only)
//        → Packaged → Done
//
// Any error aborts the job tagged with the stage it surfaced in. The job
// workspace is dropped on every exit path, and the archive only appears next
// to the input after a complete write and rename.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Duration as ChronoDuration;
use ignis_core::config::StampConfig;
use ignis_core::error::{IgnisError, Result};
use ignis_core::types::{
    Artifact, ArtifactKind, AssemblyJob, DocumentType, JobOutcome, JobStage,
};
use ignis_document::{
    ConversionCache, DocumentRenderer, LopdfStamper, PdfStamper, renderer_from_config,
    replace_placeholders,
};
use ignis_integrity::{HashTargetMiner, Stamped, verify_prefix};
use tracing::{debug, error, info, instrument};

use crate::archive::{ArchivePackager, ZipPackager};
use crate::retry::{RetryConfig, with_retry};
use crate::workspace::{DRAFT_TEMPLATE, JobWorkspace, REPORT_TEMPLATE, WATERMARK_TEMPLATE};

/// Runs assembly jobs against a fixed set of collaborators.
pub struct AssemblyPipeline {
    config: StampConfig,
    renderer: Box<dyn DocumentRenderer>,
    stamper: Box<dyn PdfStamper>,
    packager: Box<dyn ArchivePackager>,
    cache: ConversionCache,
    miner: HashTargetMiner,
    retry: RetryConfig,
}

impl AssemblyPipeline {
    /// Build a pipeline with the collaborators the configuration selects.
    pub fn new(config: StampConfig) -> Self {
        Self {
            renderer: renderer_from_config(&config.renderer),
            stamper: Box::new(LopdfStamper::new()),
            packager: Box::new(ZipPackager),
            cache: ConversionCache::from_config(&config.cache),
            miner: HashTargetMiner::new(config.miner.clone()),
            retry: RetryConfig::from(&config.retry),
            config,
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn DocumentRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_stamper(mut self, stamper: Box<dyn PdfStamper>) -> Self {
        self.stamper = stamper;
        self
    }

    pub fn with_packager(mut self, packager: Box<dyn ArchivePackager>) -> Self {
        self.packager = packager;
        self
    }

    pub fn config(&self) -> &StampConfig {
        &self.config
    }

    pub fn cache(&self) -> &ConversionCache {
        &self.cache
    }

    /// Run `job` to completion and return where the archive went.
    #[instrument(skip(self, job), fields(job_id = %job.id, input = %job.input.display(), uid = %job.target, draft = job.is_draft))]
    pub fn run(&self, job: &AssemblyJob) -> Result<JobOutcome> {
        let mut run = Run {
            pipeline: self,
            job,
            stages: Vec::new(),
        };
        match run.execute() {
            Ok(outcome) => {
                info!(archive = %outcome.archive.display(), "Job done");
                Ok(outcome)
            }
            Err(err) => {
                error!(
                    stage = err.stage().map(|s| s.name()).unwrap_or("unknown"),
                    error = %err,
                    "Job failed"
                );
                Err(err)
            }
        }
    }

    // -- Collaborator calls ---------------------------------------------------

    /// Render `docx` through the conversion cache, retrying transient failures.
    fn render(&self, docx: &[u8]) -> Result<Vec<u8>> {
        self.cache.render_through(docx, |bytes| {
            with_retry(&self.retry, self.renderer.name(), || self.renderer.render(bytes))
        })
    }

    /// Fill a template's placeholders and render it.
    fn render_template(
        &self,
        workspace: &JobWorkspace,
        name: &str,
        replacements: &[(&str, &str)],
    ) -> Result<Vec<u8>> {
        let template = workspace.template(name)?;
        let filled = replace_placeholders(&template, replacements)?;
        self.render(&filled)
    }

    fn overlay(&self, base: &[u8], stamp: &[u8]) -> Result<Vec<u8>> {
        with_retry(&self.retry, "overlay", || self.stamper.overlay(base, stamp))
    }

    fn extract_certificate(&self, pdf: &[u8]) -> Result<Vec<u8>> {
        with_retry(&self.retry, "extract", || {
            self.stamper.extract_pages(pdf, &self.config.certificate_pages)
        })
    }
}

// -- Job execution --------------------------------------------------------------

/// State of one job while it runs.
struct Run<'a> {
    pipeline: &'a AssemblyPipeline,
    job: &'a AssemblyJob,
    stages: Vec<JobStage>,
}

impl Run<'_> {
    /// Run `f` as `stage`, tagging its error and recording completion.
    fn stage<T>(&mut self, stage: JobStage, f: impl FnOnce() -> Result<T>) -> Result<T> {
        debug!(stage = stage.name(), "Stage started");
        let value = f().map_err(|err| err.at(stage))?;
        self.stages.push(stage);
        info!(stage = stage.name(), "Stage complete");
        Ok(value)
    }

    fn execute(&mut self) -> Result<JobOutcome> {
        let p = self.pipeline;
        let job = self.job;
        let uid = job.target.as_str();
        let stem = job.stem().map_err(|err| err.at(JobStage::Init))?.to_owned();

        let workspace = self.stage(JobStage::Init, || {
            let workspace =
                JobWorkspace::create(&p.config.template_dir, &job.input, job.document_type)?;
            p.cache.maintain()?;
            Ok(workspace)
        })?;

        let mut working = workspace
            .read_input()
            .map_err(|err| err.at(JobStage::Init))?;
        if job.document_type == DocumentType::Docx {
            working = self.stage(JobStage::Converted, || p.render(&working))?;
        }
        workspace
            .write_live_pdf(&working)
            .map_err(|err| err.at(JobStage::Converted))?;

        let stamp_text = format!(
            "Ignis Certificate ID {uid} {}",
            job.created_at.format("%Y-%m-%d %H:%M")
        );
        let watermark = self.stage(JobStage::WatermarkApplied, || {
            let watermark = p.render_template(
                &workspace,
                WATERMARK_TEMPLATE,
                &[("__id__", stamp_text.as_str())],
            )?;
            working = p.overlay(&working, &watermark)?;
            workspace.write_live_pdf(&working)?;
            Ok(watermark)
        })?;

        let mut certificate =
            self.stage(JobStage::PagesExtracted, || p.extract_certificate(&working))?;

        if job.is_draft {
            let expiry = (job.created_at + ChronoDuration::days(p.config.draft_validity_days))
                .format("%Y-%m-%d")
                .to_string();
            self.stage(JobStage::DraftStamped, || {
                let draft = p.render_template(
                    &workspace,
                    DRAFT_TEMPLATE,
                    &[("__date__", expiry.as_str())],
                )?;
                certificate = p.overlay(&certificate, &draft)?;
                working = p.overlay(&working, &draft)?;
                workspace.write_live_pdf(&working)
            })?;
        }

        let mut artifacts = self.stage(JobStage::HashStamped, || {
            let stamped = p.miner.stamp(&certificate, uid)?;
            let certificate =
                save_artifact(&workspace, &stem, ArtifactKind::Certificate, stamped)?;
            let stamped = p.miner.stamp(&working, uid)?;
            let report = save_artifact(&workspace, &stem, ArtifactKind::Report, stamped)?;
            Ok(vec![certificate, report])
        })?;

        if job.is_final() {
            let verification = self.stage(JobStage::ReportGenerated, || {
                let (first, second) = (&artifacts[0], &artifacts[1]);
                let rendered = p.render_template(
                    &workspace,
                    REPORT_TEMPLATE,
                    &[
                        ("__filename_1__", first.file_name.as_str()),
                        ("__sha256_1__", first.sha256.as_str()),
                        ("__filename_2__", second.file_name.as_str()),
                        ("__sha256_2__", second.sha256.as_str()),
                    ],
                )?;
                let marked = p.overlay(&rendered, &watermark)?;
                let stamped = p.miner.stamp(&marked, uid)?;
                save_artifact(&workspace, &stem, ArtifactKind::Verification, stamped)
            })?;
            artifacts.push(verification);
        }

        let archive = self.stage(JobStage::Packaged, || {
            let out_dir = workspace.out_dir();
            for artifact in &artifacts {
                let bytes = fs::read(out_dir.join(&artifact.file_name))?;
                let digest = verify_prefix(&bytes, uid)?;
                if digest != artifact.sha256 {
                    return Err(IgnisError::IntegrityMismatch {
                        expected: artifact.sha256.clone(),
                        actual: digest,
                    });
                }
            }
            let zip = p.packager.pack(&out_dir)?;
            publish(&job.input, &stem, &zip)
        })?;

        self.stages.push(JobStage::Done);
        Ok(JobOutcome {
            archive,
            uid: job.target.clone(),
            draft: job.is_draft,
            artifacts,
            stages: std::mem::take(&mut self.stages),
        })
    }
}

fn save_artifact(
    workspace: &JobWorkspace,
    stem: &str,
    kind: ArtifactKind,
    stamped: Stamped,
) -> Result<Artifact> {
    let file_name = kind.file_name(stem);
    workspace.write_artifact(&file_name, &stamped.bytes)?;
    info!(
        artifact = %file_name,
        sha256 = %stamped.sha256,
        counter = stamped.counter,
        "Artifact stamped"
    );
    Ok(Artifact {
        kind,
        file_name,
        sha256: stamped.sha256,
        size: stamped.bytes.len() as u64,
    })
}

/// Write `{stem}.zip` next to `input` via a temporary sibling and rename.
fn publish(input: &Path, stem: &str, zip: &[u8]) -> Result<PathBuf> {
    let parent = input
        .parent()
        .ok_or_else(|| IgnisError::Packaging(format!("{} has no parent", input.display())))?;
    let destination = parent.join(format!("{stem}.zip"));

    let mut partial = tempfile::Builder::new()
        .prefix(&format!(".{stem}.zip."))
        .suffix(".partial")
        .tempfile_in(parent)
        .map_err(|err| IgnisError::Packaging(format!("cannot write in {}: {err}", parent.display())))?;
    partial.write_all(zip)?;
    partial.as_file().sync_all()?;
    partial
        .persist(&destination)
        .map_err(|err| IgnisError::Packaging(format!("{}: {}", destination.display(), err.error)))?;

    Ok(destination)
}
