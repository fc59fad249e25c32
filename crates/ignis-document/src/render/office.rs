// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// LibreOffice renderer.
//
// Each call gets its own scratch directory holding the input, the output and a
// throwaway user profile, so concurrent conversions never share office state.
// The child runs with an explicit working directory and is killed when it
// exceeds the configured timeout.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use ignis_core::config::RendererConfig;
use ignis_core::error::IgnisError;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use wait_timeout::ChildExt;

use super::DocumentRenderer;

/// Bytes of the converter's stderr quoted in error messages.
const STDERR_TAIL: usize = 512;

/// Renders through `soffice --headless --convert-to pdf`.
#[derive(Debug, Clone)]
pub struct OfficeRenderer {
    binary: PathBuf,
    timeout: Duration,
}

impl OfficeRenderer {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn from_config(config: &RendererConfig) -> Self {
        Self::new(
            config.office_binary.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl DocumentRenderer for OfficeRenderer {
    fn name(&self) -> &'static str {
        "office"
    }

    #[instrument(skip(self, docx), fields(binary = %self.binary.display(), docx_len = docx.len()))]
    fn render(&self, docx: &[u8]) -> Result<Vec<u8>, IgnisError> {
        let scratch = tempfile::Builder::new().prefix("ignis-render-").tempdir()?;
        let stem = format!("document-{}", Uuid::new_v4().simple());
        let input = scratch.path().join(format!("{stem}.docx"));
        let output = scratch.path().join(format!("{stem}.pdf"));
        let stderr_path = scratch.path().join("stderr.log");
        fs::write(&input, docx)?;

        let started = Instant::now();
        let mut child = Command::new(&self.binary)
            .arg(format!(
                "-env:UserInstallation={}",
                file_url(&scratch.path().join("profile"))
            ))
            .args(["--headless", "--norestore", "--convert-to", "pdf", "--outdir"])
            .arg(scratch.path())
            .arg(&input)
            .current_dir(scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(File::create(&stderr_path)?)
            .spawn()
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => IgnisError::Config(format!(
                    "renderer binary {} not found",
                    self.binary.display()
                )),
                _ => IgnisError::Render(format!(
                    "cannot start {}: {err}",
                    self.binary.display()
                )),
            })?;

        let status = match child.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                warn!(timeout_secs = self.timeout.as_secs(), "Renderer timed out, killing it");
                if let Err(err) = child.kill() {
                    debug!(%err, "Renderer already exited");
                }
                let _ = child.wait();
                return Err(IgnisError::RenderTimeout {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        if !status.success() {
            return Err(IgnisError::Render(format!(
                "{} exited with {status}: {}",
                self.binary.display(),
                stderr_tail(&stderr_path)
            )));
        }

        let pdf = fs::read(&output).map_err(|_| {
            IgnisError::Render(format!(
                "no PDF produced: {}",
                stderr_tail(&stderr_path)
            ))
        })?;
        if pdf.is_empty() {
            return Err(IgnisError::Render("renderer produced an empty PDF".into()));
        }

        info!(
            pdf_len = pdf.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Office conversion finished"
        );
        Ok(pdf)
    }
}

/// `file://` URL form LibreOffice expects for `-env:UserInstallation`.
fn file_url(path: &Path) -> String {
    let path = path.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        format!("file://{path}")
    } else {
        format!("file:///{path}")
    }
}

fn stderr_tail(path: &Path) -> String {
    let text = fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_owned())
        .unwrap_or_default();
    if text.is_empty() {
        return "no diagnostics".into();
    }
    let mut start = text.len().saturating_sub(STDERR_TAIL);
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_a_config_error() {
        let renderer = OfficeRenderer::new("/nonexistent/ignis/soffice", Duration::from_secs(5));
        let err = renderer.render(b"docx").unwrap_err();
        assert!(matches!(err, IgnisError::Config(_)), "got {err:?}");
    }

    #[test]
    fn profile_urls() {
        assert_eq!(file_url(Path::new("/tmp/p")), "file:///tmp/p");
        assert_eq!(file_url(Path::new("C:\\tmp\\p")), "file:///C:/tmp/p");
    }

    /// Fake converters as shell scripts. Kept in one test so no other test
    /// forks while a script is still open for writing.
    #[cfg(unix)]
    #[test]
    fn drives_external_converter() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let script = |name: &str, body: &str| {
            let path = dir.path().join(name);
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
            path
        };

        // Copies the input to `<stem>.pdf` in the output dir (last two args).
        let copy = script(
            "copy.sh",
            r#"for last; do :; done; cp "$last" "${last%.docx}.pdf""#,
        );
        let failing = script("fail.sh", "echo 'source file could not be loaded' >&2; exit 3");
        let silent = script("silent.sh", "exit 0");
        let slow = script("slow.sh", "sleep 10");

        let ok = OfficeRenderer::new(&copy, Duration::from_secs(10))
            .render(b"pretend pdf")
            .expect("render");
        assert_eq!(ok, b"pretend pdf");

        let err = OfficeRenderer::new(&failing, Duration::from_secs(10))
            .render(b"x")
            .unwrap_err();
        assert!(
            matches!(&err, IgnisError::Render(msg) if msg.contains("could not be loaded")),
            "got {err:?}"
        );

        let err = OfficeRenderer::new(&silent, Duration::from_secs(10))
            .render(b"x")
            .unwrap_err();
        assert!(matches!(err, IgnisError::Render(_)), "got {err:?}");

        let started = Instant::now();
        let err = OfficeRenderer::new(&slow, Duration::from_millis(200))
            .render(b"x")
            .unwrap_err();
        assert!(matches!(err, IgnisError::RenderTimeout { .. }), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
