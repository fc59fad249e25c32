// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Archive packaging — zip the finished artifacts.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use ignis_core::error::{IgnisError, Result};
use tracing::{debug, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Packs a directory into archive bytes.
pub trait ArchivePackager: Send + Sync {
    /// Archive the regular files directly inside `dir` (no recursion), named
    /// by bare file name in lexical order.
    fn pack(&self, dir: &Path) -> Result<Vec<u8>>;
}

/// Deflate-compressed zip with fixed entry timestamps.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipPackager;

impl ArchivePackager for ZipPackager {
    #[instrument(skip(self), fields(dir = %dir.display()))]
    fn pack(&self, dir: &Path) -> Result<Vec<u8>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().into_string().map_err(|raw| {
                IgnisError::Packaging(format!("file name {raw:?} is not valid UTF-8"))
            })?;
            names.push(name);
        }
        names.sort();

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for name in &names {
            let bytes = fs::read(dir.join(name))?;
            writer
                .start_file(name.as_str(), options)
                .map_err(|err| IgnisError::Packaging(format!("{name}: {err}")))?;
            writer.write_all(&bytes)?;
        }
        let cursor = writer
            .finish()
            .map_err(|err| IgnisError::Packaging(err.to_string()))?;

        debug!(entries = names.len(), "Archive built");
        Ok(cursor.into_inner())
    }
}
