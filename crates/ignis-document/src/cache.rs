// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-addressed conversion cache.
//
// Rendered PDFs are stored as `<sha256 of source>.pdf` in a persistent
// directory. There is no index: the file system is the cache, and a file's
// modification time is its last-access time. Writes go through a temporary
// file in the same directory followed by an atomic rename, so concurrent jobs
// sharing the directory only ever see complete entries.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use ignis_core::config::CacheConfig;
use ignis_core::error::IgnisError;
use ignis_integrity::{hash_bytes, is_sha256_hex};
use tracing::{debug, info, instrument, warn};

const ENTRY_EXTENSION: &str = ".pdf";

/// Result of a [`ConversionCache::maintain`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceSummary {
    pub kept: usize,
    pub evicted: usize,
}

/// Bounded on-disk store from source digest to rendered PDF.
#[derive(Debug, Clone)]
pub struct ConversionCache {
    dir: PathBuf,
    capacity: usize,
}

impl ConversionCache {
    pub fn new(dir: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            dir: dir.into(),
            capacity,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.dir.clone(), config.capacity)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cached PDF for `digest`, if any. A hit refreshes the entry's
    /// modification time.
    pub fn get(&self, digest: &str) -> Result<Option<Vec<u8>>, IgnisError> {
        let path = self.entry_path(digest)?;
        match fs::read(&path) {
            Ok(bytes) => {
                touch(&path);
                debug!(digest, len = bytes.len(), "Cache hit");
                Ok(Some(bytes))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Store `pdf` under `digest`, replacing any previous entry.
    pub fn put(&self, digest: &str, pdf: &[u8]) -> Result<(), IgnisError> {
        let path = self.entry_path(digest)?;
        fs::create_dir_all(&self.dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".ignis-put-")
            .tempfile_in(&self.dir)?;
        tmp.write_all(pdf)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|err| IgnisError::Io(err.error))?;

        debug!(digest, len = pdf.len(), "Cache entry stored");
        Ok(())
    }

    /// Evict all but the `capacity` most recently touched entries.
    ///
    /// Entries are ordered by modification time, oldest first, with ties
    /// broken by file name. Files that vanish mid-pass (another job evicting
    /// concurrently) are skipped. Anything that is not a cache entry is left
    /// alone.
    #[instrument(skip(self), fields(dir = %self.dir.display(), capacity = self.capacity))]
    pub fn maintain(&self) -> Result<MaintenanceSummary, IgnisError> {
        fs::create_dir_all(&self.dir)?;

        let mut entries: Vec<(SystemTime, String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_entry_name(&name) {
                continue;
            }
            let modified = match entry.metadata().and_then(|meta| {
                if meta.is_file() {
                    meta.modified().map(Some)
                } else {
                    Ok(None)
                }
            }) {
                Ok(Some(modified)) => modified,
                Ok(None) => continue,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            entries.push((modified, name, entry.path()));
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        let excess = entries.len().saturating_sub(self.capacity);

        let mut evicted = 0;
        for (_, name, path) in &entries[..excess] {
            match fs::remove_file(path) {
                Ok(()) => evicted += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(entry = %name, %err, "Failed to evict cache entry");
                }
            }
        }

        let summary = MaintenanceSummary {
            kept: entries.len() - excess,
            evicted,
        };
        if evicted > 0 {
            info!(kept = summary.kept, evicted, "Cache maintenance evicted entries");
        } else {
            debug!(kept = summary.kept, "Cache within capacity");
        }
        Ok(summary)
    }

    /// Return the cached render of `source`, rendering and storing it on a
    /// miss. The key is the digest of exactly these bytes.
    pub fn render_through<F>(&self, source: &[u8], render: F) -> Result<Vec<u8>, IgnisError>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>, IgnisError>,
    {
        let digest = hash_bytes(source);
        if let Some(hit) = self.get(&digest)? {
            info!(digest = %digest, "Conversion cache hit");
            return Ok(hit);
        }

        info!(digest = %digest, "Conversion cache miss, rendering");
        let pdf = render(source)?;
        self.put(&digest, &pdf)?;
        Ok(pdf)
    }

    fn entry_path(&self, digest: &str) -> Result<PathBuf, IgnisError> {
        if !is_sha256_hex(digest) {
            return Err(IgnisError::Input(format!(
                "cache key {digest:?} is not a SHA-256 hex digest"
            )));
        }
        Ok(self.dir.join(format!("{digest}{ENTRY_EXTENSION}")))
    }
}

fn is_entry_name(name: &str) -> bool {
    name.strip_suffix(ENTRY_EXTENSION)
        .is_some_and(is_sha256_hex)
}

/// Best effort: a failed touch only makes the entry look older.
fn touch(path: &Path) {
    let result = File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(SystemTime::now()));
    if let Err(err) = result {
        debug!(path = %path.display(), %err, "Could not refresh cache entry time");
    }
}
