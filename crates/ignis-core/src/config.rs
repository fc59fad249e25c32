// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stamping configuration. Every field has a default so a partial JSON file
// (or none at all) yields a usable configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IgnisError, Result};
use crate::types::PageRange;

/// Top-level settings for one `ignis-stamp` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StampConfig {
    /// Directory holding `Watermark.docx`, `DRAFT.docx` and `FileReport.docx`.
    pub template_dir: PathBuf,
    pub cache: CacheConfig,
    pub renderer: RendererConfig,
    pub miner: MinerConfig,
    pub retry: RetrySettings,
    /// Length of generated uids.
    pub uid_length: usize,
    /// Days a draft marking stays valid.
    pub draft_validity_days: i64,
    /// Pages copied into the certificate.
    pub certificate_pages: Vec<PageRange>,
}

impl Default for StampConfig {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("documents"),
            cache: CacheConfig::default(),
            renderer: RendererConfig::default(),
            miner: MinerConfig::default(),
            retry: RetrySettings::default(),
            uid_length: 5,
            draft_validity_days: 14,
            certificate_pages: vec![PageRange::single(1), PageRange::single(2)],
        }
    }
}

impl StampConfig {
    /// Load from a JSON file, or return defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let data = std::fs::read_to_string(path).map_err(|e| {
                    IgnisError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                serde_json::from_str::<Self>(&data)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make a job meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(IgnisError::Config("cache.capacity must be at least 1".into()));
        }
        if self.uid_length == 0 || self.uid_length > self.miner.max_target_len {
            return Err(IgnisError::Config(format!(
                "uid_length {} must be between 1 and miner.max_target_len ({})",
                self.uid_length, self.miner.max_target_len
            )));
        }
        if self.certificate_pages.is_empty() {
            return Err(IgnisError::Config("certificate_pages must not be empty".into()));
        }
        if let Some(bad) = self
            .certificate_pages
            .iter()
            .find(|r| r.start == 0 || r.end < r.start)
        {
            return Err(IgnisError::Config(format!(
                "invalid certificate page range {}-{}",
                bad.start, bad.end
            )));
        }
        if self.miner.max_attempts == 0 {
            return Err(IgnisError::Config("miner.max_attempts must be positive".into()));
        }
        Ok(())
    }
}

/// Conversion cache location and bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    /// Renders kept after a maintenance pass.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("ignis-pdf-cache"),
            capacity: 500,
        }
    }
}

/// Which renderer turns `.docx` into PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// External office suite (LibreOffice `soffice`).
    Office,
    /// Built-in plain-text layout.
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub kind: RendererKind,
    /// Resolved path (or bare name) of the office binary.
    pub office_binary: PathBuf,
    pub timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            kind: RendererKind::Office,
            office_binary: PathBuf::from("soffice"),
            timeout_secs: 300,
        }
    }
}

/// Trailer search limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Worker threads; 0 means "use available parallelism".
    pub threads: usize,
    /// Largest counter tried before giving up.
    pub max_attempts: u64,
    /// Targets longer than this are logged as expensive.
    pub warn_target_len: usize,
    /// Targets longer than this are refused outright.
    pub max_target_len: usize,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            max_attempts: 1_000_000_000_000,
            warn_target_len: 6,
            max_target_len: 12,
        }
    }
}

impl MinerConfig {
    /// Worker count after resolving the `0 = auto` convention.
    pub fn effective_threads(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

/// Retry policy for external collaborator calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 5_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = StampConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.cache.capacity, 500);
        assert_eq!(config.uid_length, 5);
        assert_eq!(config.certificate_pages.len(), 2);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ignis.json");
        std::fs::write(&path, r#"{"cache": {"capacity": 10}, "renderer": {"kind": "text"}}"#)
            .expect("write config");

        let config = StampConfig::load(Some(&path)).expect("load");
        assert_eq!(config.cache.capacity, 10);
        assert_eq!(config.renderer.kind, RendererKind::Text);
        assert_eq!(config.renderer.timeout_secs, 300);
        assert_eq!(config.draft_validity_days, 14);
    }

    #[test]
    fn zero_capacity_rejected() {
        let mut config = StampConfig::default();
        config.cache.capacity = 0;
        assert!(matches!(config.validate(), Err(IgnisError::Config(_))));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = StampConfig::load(Some(Path::new("/nonexistent/ignis.json"))).unwrap_err();
        assert!(matches!(err, IgnisError::Config(_)));
    }
}
