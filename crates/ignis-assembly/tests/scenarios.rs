// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end stamping scenarios.
//
// Templates are built in-process and rendered by the text renderer, so no
// office suite is needed.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use ignis_assembly::{AssemblyPipeline, TEMPLATES};
use ignis_core::config::{RendererKind, StampConfig};
use ignis_core::types::{ArtifactKind, AssemblyJob, HashTarget, JobStage};
use ignis_core::IgnisError;
use ignis_document::docx::PAGE_BREAK;
use ignis_document::{PdfWriter, build_docx};
use ignis_integrity::hash_bytes;
use tempfile::TempDir;
use zip::ZipArchive;

struct Env {
    /// Holds the templates, the cache and the input files.
    root: TempDir,
    config: StampConfig,
}

impl Env {
    fn new() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let templates = root.path().join("documents");
        fs::create_dir(&templates).expect("mkdir templates");

        let bodies: [&[&str]; 3] = [
            &["__id__"],
            &["DRAFT - valid until __date__"],
            &[
                "Verification",
                "__filename_1__",
                "SHA-256 __sha256_1__",
                "__filename_2__",
                "SHA-256 __sha256_2__",
            ],
        ];
        for (name, body) in TEMPLATES.iter().zip(bodies) {
            let docx = build_docx(body).expect("build template");
            fs::write(templates.join(name), docx).expect("write template");
        }

        let mut config = StampConfig::default();
        config.template_dir = templates;
        config.cache.dir = root.path().join("cache");
        config.renderer.kind = RendererKind::Text;
        config.retry.base_delay_ms = 1;
        config.retry.max_delay_ms = 2;

        Self { root, config }
    }

    /// A directory that contains nothing but the input file.
    fn input_dir(&self) -> PathBuf {
        let dir = self.root.path().join("inbox");
        fs::create_dir_all(&dir).expect("mkdir inbox");
        dir
    }

    fn write_pdf(&self, name: &str, pages: usize) -> PathBuf {
        let pages: Vec<String> = (1..=pages)
            .map(|i| format!("Survey results, page {i}"))
            .collect();
        let path = self.input_dir().join(name);
        let pdf = PdfWriter::a4().create_from_pages(&pages).expect("input pdf");
        fs::write(&path, pdf).expect("write input");
        path
    }

    fn pipeline(&self) -> AssemblyPipeline {
        AssemblyPipeline::new(self.config.clone())
    }
}

fn job(input: &Path, uid: &str) -> AssemblyJob {
    AssemblyJob::for_input(input, HashTarget::parse(uid).expect("uid")).expect("job")
}

/// Archive entries as (name, bytes), in archive order.
fn unpack(path: &Path) -> Vec<(String, Vec<u8>)> {
    let bytes = fs::read(path).expect("read archive");
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("open archive");
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).expect("entry");
            let mut content = Vec::new();
            entry.read_to_end(&mut content).expect("read entry");
            (entry.name().to_owned(), content)
        })
        .collect()
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("list")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn stamp_draws(pdf: &[u8], page: u32) -> usize {
    let doc = lopdf::Document::load_mem(pdf).expect("parse artifact");
    let id = doc.get_pages()[&page];
    let content = doc.get_page_content(id).expect("page content");
    String::from_utf8_lossy(&content).matches(" Do Q").count()
}

fn page_count(pdf: &[u8]) -> usize {
    lopdf::Document::load_mem(pdf).expect("parse artifact").get_pages().len()
}

fn has_single_trailer(pdf: &[u8]) -> bool {
    let text = String::from_utf8_lossy(pdf);
    text.ends_with("<<<\n") && text.matches("%>>>IGNIS ").count() == 1
}

#[test]
fn final_run_emits_three_certified_artifacts() {
    let env = Env::new();
    let input = env.write_pdf("report.pdf", 4);

    let outcome = env.pipeline().run(&job(&input, "abcde")).expect("final run");

    assert_eq!(outcome.archive, env.input_dir().join("report.zip"));
    assert!(!outcome.draft);
    assert_eq!(listing(&env.input_dir()), vec!["report.pdf", "report.zip"]);

    let entries = unpack(&outcome.archive);
    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "report Certificate.pdf",
            "report Report.pdf",
            "report Verification.pdf"
        ]
    );
    for (name, bytes) in &entries {
        assert!(hash_bytes(bytes).starts_with("abcde"), "{name} digest");
        assert!(has_single_trailer(bytes), "{name} trailer");
    }

    let (_, certificate) = &entries[0];
    let (_, report) = &entries[1];
    assert_eq!(page_count(certificate), 2);
    assert_eq!(page_count(report), 4);
    assert_eq!(stamp_draws(report, 4), 1, "watermark only");
    assert_eq!(
        outcome.stages.last().copied(),
        Some(JobStage::Done),
        "stages: {:?}",
        outcome.stages
    );
    assert!(outcome.stages.contains(&JobStage::ReportGenerated));
    assert!(!outcome.stages.contains(&JobStage::DraftStamped));
}

#[test]
fn draft_run_stamps_twice_and_skips_verification() {
    let env = Env::new();
    let input = env.write_pdf("reportDraft.pdf", 3);

    let outcome = env.pipeline().run(&job(&input, "fffff")).expect("draft run");

    assert!(outcome.draft);
    let entries = unpack(&outcome.archive);
    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        vec!["reportDraft Certificate.pdf", "reportDraft Report.pdf"]
    );
    for (name, bytes) in &entries {
        assert!(hash_bytes(bytes).starts_with("fffff"), "{name} digest");
        // Watermark and draft marking.
        assert_eq!(stamp_draws(bytes, 1), 2, "{name} stamps");
    }
    assert!(
        outcome
            .artifacts
            .iter()
            .all(|a| a.kind != ArtifactKind::Verification)
    );
    assert!(outcome.stages.contains(&JobStage::DraftStamped));
    assert!(!outcome.stages.contains(&JobStage::ReportGenerated));
}

#[test]
fn archive_round_trips_reported_artifacts() {
    let env = Env::new();
    let input = env.write_pdf("minutes.pdf", 2);

    let outcome = env.pipeline().run(&job(&input, "7")).expect("run");
    let entries = unpack(&outcome.archive);

    assert_eq!(entries.len(), outcome.artifacts.len());
    for ((name, bytes), artifact) in entries.iter().zip(&outcome.artifacts) {
        assert_eq!(name, &artifact.file_name);
        assert_eq!(hash_bytes(bytes), artifact.sha256);
        assert_eq!(bytes.len() as u64, artifact.size);
    }
}

#[test]
fn docx_input_is_rendered_first() {
    let env = Env::new();
    let docx = build_docx(&["Chapter one", PAGE_BREAK, "Chapter two", PAGE_BREAK, "Appendix"])
        .expect("build input");
    let input = env.input_dir().join("thesis.docx");
    fs::write(&input, docx).expect("write input");

    let outcome = env.pipeline().run(&job(&input, "42")).expect("docx run");

    assert_eq!(outcome.archive, env.input_dir().join("thesis.zip"));
    assert_eq!(outcome.stages[1], JobStage::Converted);
    let entries = unpack(&outcome.archive);
    assert_eq!(page_count(&entries[1].1), 3);
    assert_eq!(listing(&env.input_dir()), vec!["thesis.docx", "thesis.zip"]);
}

#[test]
fn forced_draft_overrides_file_name() {
    let env = Env::new();
    let input = env.write_pdf("contract.pdf", 2);

    let outcome = env
        .pipeline()
        .run(&job(&input, "3").with_draft(true))
        .expect("run");
    assert!(outcome.draft);
    assert_eq!(outcome.artifacts.len(), 2);
}

#[test]
fn failure_leaves_input_directory_untouched() {
    let env = Env::new();
    let input = env.write_pdf("short.pdf", 1);

    let err = env.pipeline().run(&job(&input, "abc")).unwrap_err();

    assert_eq!(err.stage(), Some(JobStage::PagesExtracted));
    assert_eq!(listing(&env.input_dir()), vec!["short.pdf"]);
}

#[test]
fn oversized_uid_is_refused_before_mining() {
    let env = Env::new();
    let input = env.write_pdf("big.pdf", 2);

    let err = env
        .pipeline()
        .run(&job(&input, "0123456789abcdef"))
        .unwrap_err();

    assert_eq!(err.stage(), Some(JobStage::HashStamped));
    assert!(matches!(err.root(), IgnisError::InvalidTarget(_)));
    assert_eq!(listing(&env.input_dir()), vec!["big.pdf"]);
}

#[test]
fn unsupported_extension_is_rejected() {
    let err = AssemblyJob::for_input("notes.txt", HashTarget::parse("a").expect("uid"))
        .unwrap_err();
    assert!(matches!(err, IgnisError::Input(_)));
}
