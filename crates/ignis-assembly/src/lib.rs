// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ignis-assembly — Runs a stamping job end to end.
//
// Sequences rendering, watermarking, page extraction, hash-target mining and
// packaging for one input document, inside a per-job workspace, with bounded
// retries around the external collaborators.

pub mod archive;
pub mod pipeline;
pub mod retry;
pub mod workspace;

pub use archive::{ArchivePackager, ZipPackager};
pub use pipeline::AssemblyPipeline;
pub use retry::{RetryConfig, with_retry};
pub use workspace::{JobWorkspace, TEMPLATES, write_starter_templates};
