// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Built-in renderer: paragraph text from the .docx, laid out by `PdfWriter`.
// Formatting, images and tables are not reproduced.

use ignis_core::error::IgnisError;
use tracing::{debug, instrument};

use super::DocumentRenderer;
use crate::docx;
use crate::pdf::PdfWriter;

pub struct TextRenderer {
    writer: PdfWriter,
}

impl TextRenderer {
    pub fn new() -> Self {
        let mut writer = PdfWriter::a4();
        writer.set_title("Ignis Stamp");
        Self { writer }
    }
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentRenderer for TextRenderer {
    fn name(&self) -> &'static str {
        "text"
    }

    #[instrument(skip_all, fields(docx_len = docx.len()))]
    fn render(&self, docx: &[u8]) -> Result<Vec<u8>, IgnisError> {
        let pages = docx::extract_text(docx)?;
        let pdf = self.writer.create_from_pages(&pages)?;
        debug!(pages = pages.len(), pdf_len = pdf.len(), "Rendered docx as text");
        Ok(pdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::{PAGE_BREAK, build_docx};

    #[test]
    fn renders_one_pdf_page_per_docx_page() {
        let docx = build_docx(&["first", PAGE_BREAK, "second", PAGE_BREAK, "third"])
            .expect("build");
        let pdf = TextRenderer::new().render(&docx).expect("render");
        let doc = lopdf::Document::load_mem(&pdf).expect("parse");
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn rejects_non_docx_input() {
        let err = TextRenderer::new().render(b"%PDF-1.7").unwrap_err();
        assert!(matches!(err, IgnisError::Render(_)));
    }
}
