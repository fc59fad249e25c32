// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ignis-document — Document handling for Ignis Stamp.
//
// Provides the collaborators the assembly pipeline drives: renderers that turn
// .docx into PDF (LibreOffice or a built-in text layout), lopdf-based stamping
// and page extraction, .docx placeholder substitution, and the
// content-addressed conversion cache in front of the renderers.

pub mod cache;
pub mod docx;
pub mod pdf;
pub mod render;

// Re-export the primary types so callers can use `ignis_document::LopdfStamper` etc.
pub use cache::{ConversionCache, MaintenanceSummary};
pub use docx::{build_docx, replace_placeholders};
pub use pdf::{LopdfStamper, PdfStamper, PdfWriter};
pub use render::{DocumentRenderer, OfficeRenderer, TextRenderer, renderer_from_config};
