// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — stamping, page extraction and plain-text PDF creation.

pub mod stamper;
pub mod writer;

pub use stamper::LopdfStamper;
pub use writer::PdfWriter;

use ignis_core::error::IgnisError;
use ignis_core::types::PageRange;

/// Low-level PDF operations the assembly pipeline needs.
///
/// All inputs and outputs are complete PDF files held in memory.
pub trait PdfStamper: Send + Sync {
    /// Draw the first page of `stamp` over every page of `base`, scaled to fit.
    fn overlay(&self, base: &[u8], stamp: &[u8]) -> Result<Vec<u8>, IgnisError>;

    /// Like [`overlay`](Self::overlay), but beneath the existing page content.
    fn background(&self, base: &[u8], stamp: &[u8]) -> Result<Vec<u8>, IgnisError>;

    /// Build a new PDF from the given 1-indexed inclusive page ranges, in
    /// order. A page outside the document is an error.
    fn extract_pages(&self, pdf: &[u8], ranges: &[PageRange]) -> Result<Vec<u8>, IgnisError>;
}
