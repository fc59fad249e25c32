// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-text page layout on top of `printpdf` 0.8.
//
// Each output page is a `PdfPage` holding one text section per wrapped line in
// the builtin Helvetica face. No fonts are embedded.

use ignis_core::error::IgnisError;
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};
use tracing::{debug, instrument};

/// A4 portrait, in millimetres.
const A4_MM: (f32, f32) = (210.0, 297.0);

/// Creates PDF documents from plain text.
///
/// Used by the built-in text renderer, which turns the paragraphs of a
/// `.docx` template into a simple typeset page.
pub struct PdfWriter {
    /// Page width and height in millimetres.
    page_mm: (f32, f32),
    title: Option<String>,
    font_size_pt: f32,
    line_height_pt: f32,
    margin_mm: f32,
}

impl PdfWriter {
    /// Create a writer for A4 pages.
    pub fn a4() -> Self {
        Self {
            page_mm: A4_MM,
            title: None,
            font_size_pt: 11.0,
            line_height_pt: 14.0,
            margin_mm: 20.0,
        }
    }

    /// Title written into the document info.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Create a PDF where every entry of `pages` starts on a fresh page.
    ///
    /// Text that does not fit continues onto extra pages; an empty entry
    /// still yields one blank page.
    #[instrument(skip(self, pages), fields(page_count = pages.len()))]
    pub fn create_from_pages(&self, pages: &[String]) -> Result<Vec<u8>, IgnisError> {
        let (page_w, page_h) = (Mm(self.page_mm.0), Mm(self.page_mm.1));
        let title = self.title.as_deref().unwrap_or("Ignis Document");

        let margin_pt: f32 = Mm(self.margin_mm).into_pt().0;
        let usable_width_mm = page_w.0 - 2.0 * self.margin_mm;

        // Helvetica averages about half an em per glyph; 1 pt = 0.3528 mm.
        let avg_char_width_mm: f32 = 0.50 * self.font_size_pt * 0.3528;
        let max_chars_per_line = ((usable_width_mm / avg_char_width_mm) as usize).max(1);

        let page_h_pt = page_h.into_pt().0;
        let usable_height_pt = page_h_pt - 2.0 * margin_pt;
        let lines_per_page = ((usable_height_pt / self.line_height_pt) as usize).max(1);

        let mut doc = PdfDocument::new(title);
        let mut pdf_pages: Vec<PdfPage> = Vec::new();

        for text in pages {
            let wrapped = wrap_text(text, max_chars_per_line);
            if wrapped.is_empty() {
                pdf_pages.push(PdfPage::new(page_w, page_h, Vec::new()));
                continue;
            }

            for chunk in wrapped.chunks(lines_per_page) {
                let mut ops: Vec<Op> = Vec::new();
                for (line_idx, line) in chunk.iter().enumerate() {
                    // Position: top-left of the page, moving downward.
                    let y_pt = page_h_pt - margin_pt - (line_idx as f32 * self.line_height_pt);

                    ops.push(Op::StartTextSection);
                    ops.push(Op::SetTextCursor {
                        pos: Point {
                            x: Pt(margin_pt),
                            y: Pt(y_pt),
                        },
                    });
                    ops.push(Op::SetFontSizeBuiltinFont {
                        size: Pt(self.font_size_pt),
                        font: BuiltinFont::Helvetica,
                    });
                    ops.push(Op::WriteTextBuiltinFont {
                        items: vec![TextItem::Text(line.clone())],
                        font: BuiltinFont::Helvetica,
                    });
                    ops.push(Op::EndTextSection);
                }
                pdf_pages.push(PdfPage::new(page_w, page_h, ops));
            }
        }

        if pdf_pages.is_empty() {
            pdf_pages.push(PdfPage::new(page_w, page_h, Vec::new()));
        }

        doc.with_pages(pdf_pages);

        debug!(pages = doc.pages.len(), "Text layout complete");

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);

        Ok(output)
    }
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::a4()
    }
}

// -- Wrapping ------------------------------------------------------------------

/// Greedy word wrap at `max_width` characters per line, paragraph by
/// paragraph. Oversized words are split; trailing blank lines are dropped.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();

    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            result.push(String::new());
            continue;
        }

        let mut current_line = String::with_capacity(max_width);

        for word in words {
            let word_len = word.chars().count();
            if word_len > max_width {
                if !current_line.is_empty() {
                    result.push(std::mem::take(&mut current_line));
                }
                let chars: Vec<char> = word.chars().collect();
                let mut pieces = chars.chunks(max_width).peekable();
                while let Some(piece) = pieces.next() {
                    let piece: String = piece.iter().collect();
                    if pieces.peek().is_some() {
                        result.push(piece);
                    } else {
                        current_line = piece;
                    }
                }
            } else if current_line.is_empty() {
                current_line.push_str(word);
            } else if current_line.chars().count() + 1 + word_len <= max_width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                result.push(std::mem::take(&mut current_line));
                current_line.push_str(word);
            }
        }

        if !current_line.is_empty() {
            result.push(current_line);
        }
    }

    while result.last().is_some_and(|line| line.is_empty()) {
        result.pop();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_long_paragraphs() {
        let lines = wrap_text("one two three four five", 9);
        assert_eq!(lines, vec!["one two", "three", "four five"]);
    }

    #[test]
    fn force_breaks_oversized_words() {
        let lines = wrap_text("abcdefghij xy", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij", "xy"]);
    }

    #[test]
    fn keeps_interior_blank_lines_only() {
        let lines = wrap_text("a\n\nb\n\n", 10);
        assert_eq!(lines, vec!["a", "", "b"]);
    }

    #[test]
    fn one_pdf_page_per_entry() {
        let writer = PdfWriter::a4();
        let bytes = writer
            .create_from_pages(&["first".into(), String::new(), "third".into()])
            .expect("layout");
        let doc = lopdf::Document::load_mem(&bytes).expect("parse");
        assert_eq!(doc.get_pages().len(), 3);
    }
}
