// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// WordprocessingML packages (.docx) — placeholder substitution and plain-text
// extraction.
//
// A .docx is a zip archive; only `word/document.xml` is ever rewritten. Every
// other entry is copied raw, and rewritten entries carry a fixed timestamp, so
// the same substitution always produces the same bytes and therefore the same
// conversion-cache key.

use std::io::{Cursor, Read, Write};

use ignis_core::error::IgnisError;
use tracing::{debug, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// The main document part inside the package.
pub const DOCUMENT_PART: &str = "word/document.xml";

/// Paragraph text that `build_docx` turns into a page break.
pub const PAGE_BREAK: &str = "\u{c}";

// -- Placeholders ------------------------------------------------------------

/// Replace every literal occurrence of each placeholder in `word/document.xml`.
///
/// Matching is byte-exact and case-sensitive; replacement values are inserted
/// without XML escaping. Replacements apply in order.
#[instrument(skip_all, fields(docx_len = docx.len(), placeholders = replacements.len()))]
pub fn replace_placeholders(
    docx: &[u8],
    replacements: &[(&str, &str)],
) -> Result<Vec<u8>, IgnisError> {
    let mut archive = open(docx, IgnisError::Template)?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut found = false;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| IgnisError::Template(format!("unreadable entry #{index}: {err}")))?;

        if entry.name() == DOCUMENT_PART {
            found = true;
            let mut xml = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut xml)?;
            for (needle, value) in replacements {
                xml = replace_all(&xml, needle.as_bytes(), value.as_bytes());
            }
            writer
                .start_file(DOCUMENT_PART, entry_options())
                .map_err(|err| IgnisError::Template(err.to_string()))?;
            writer.write_all(&xml)?;
        } else {
            writer
                .raw_copy_file(entry)
                .map_err(|err| IgnisError::Template(err.to_string()))?;
        }
    }

    if !found {
        return Err(IgnisError::Template(format!("no {DOCUMENT_PART} in package")));
    }

    let cursor = writer
        .finish()
        .map_err(|err| IgnisError::Template(err.to_string()))?;
    Ok(cursor.into_inner())
}

/// Byte-level find/replace of every non-overlapping occurrence.
fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(pos) = rest.windows(needle.len()).position(|w| w == needle) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(replacement);
        rest = &rest[pos + needle.len()..];
    }
    out.extend_from_slice(rest);
    out
}

// -- Text extraction -----------------------------------------------------------

/// Extract the document text, one string per page.
///
/// Paragraphs end with a newline and tabs become spaces. Pages are split only
/// at explicit `<w:br w:type="page"/>` breaks. Errors are render errors since
/// this runs on behalf of the text renderer.
pub fn extract_text(docx: &[u8]) -> Result<Vec<String>, IgnisError> {
    let mut archive = open(docx, IgnisError::Render)?;
    let mut entry = archive
        .by_name(DOCUMENT_PART)
        .map_err(|err| IgnisError::Render(format!("no {DOCUMENT_PART}: {err}")))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|err| IgnisError::Render(format!("{DOCUMENT_PART} is not UTF-8: {err}")))?;

    let mut pages = Vec::new();
    let mut page = String::new();
    let mut in_text = false;
    let mut rest = xml.as_str();

    while let Some(open) = rest.find('<') {
        if in_text {
            page.push_str(&unescape(&rest[..open]));
        }
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        let tag = &rest[open + 1..open + close];
        rest = &rest[open + close + 1..];

        let self_closing = tag.ends_with('/');
        let body = tag.trim_end_matches('/');
        let name = body.split_whitespace().next().unwrap_or("");
        match name {
            "w:t" if !self_closing => in_text = true,
            "/w:t" => in_text = false,
            "w:tab" => page.push(' '),
            "/w:p" => page.push('\n'),
            "w:br" if body.contains("w:type=\"page\"") => {
                pages.push(finish_page(std::mem::take(&mut page)));
            }
            "w:br" | "w:cr" => page.push('\n'),
            _ => {}
        }
    }
    pages.push(finish_page(page));

    debug!(pages = pages.len(), "Extracted docx text");
    Ok(pages)
}

/// Drop the blank lines a page break paragraph leaves at either end.
fn finish_page(page: String) -> String {
    page.trim_matches('\n').to_owned()
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// -- Package construction ----------------------------------------------------

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Build a minimal single-section .docx with one paragraph per entry.
///
/// An entry equal to [`PAGE_BREAK`] becomes a page break. Used to produce
/// starter templates and test fixtures.
pub fn build_docx(paragraphs: &[&str]) -> Result<Vec<u8>, IgnisError> {
    let mut body = String::new();
    for paragraph in paragraphs {
        if *paragraph == PAGE_BREAK {
            body.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
        } else {
            body.push_str(r#"<w:p><w:r><w:t xml:space="preserve">"#);
            body.push_str(&escape(paragraph));
            body.push_str("</w:t></w:r></w:p>");
        }
    }
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        (DOCUMENT_PART, document.as_str()),
    ] {
        writer
            .start_file(name, entry_options())
            .map_err(|err| IgnisError::Template(err.to_string()))?;
        writer.write_all(content.as_bytes())?;
    }
    let cursor = writer
        .finish()
        .map_err(|err| IgnisError::Template(err.to_string()))?;
    Ok(cursor.into_inner())
}

// -- Helpers -------------------------------------------------------------------

fn open(
    docx: &[u8],
    wrap: fn(String) -> IgnisError,
) -> Result<ZipArchive<Cursor<&[u8]>>, IgnisError> {
    ZipArchive::new(Cursor::new(docx)).map_err(|err| wrap(format!("not a .docx package: {err}")))
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
}
