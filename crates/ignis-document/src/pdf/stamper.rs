// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// lopdf-backed stamping — watermark overlay, background merge and page
// extraction.
//
// The stamp's first page is imported once as a Form XObject. Every base page
// gets the form in its resources plus a small content stream that scales the
// form to the page's MediaBox and centres it. Overlays append the stream after
// the page content; backgrounds prepend it.

use std::collections::BTreeMap;

use ignis_core::error::IgnisError;
use ignis_core::types::PageRange;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, instrument, warn};

use super::PdfStamper;

/// US Letter, used when a page has no MediaBox anywhere in its page tree.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Page attributes that may be inherited from ancestor /Pages nodes.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Where the stamp goes relative to the existing page content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Over,
    Under,
}

/// [`PdfStamper`] implemented on top of `lopdf`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfStamper;

impl LopdfStamper {
    pub fn new() -> Self {
        Self
    }
}

impl PdfStamper for LopdfStamper {
    #[instrument(skip_all, fields(base_len = base.len(), stamp_len = stamp.len()))]
    fn overlay(&self, base: &[u8], stamp: &[u8]) -> Result<Vec<u8>, IgnisError> {
        merge(base, stamp, Placement::Over)
    }

    #[instrument(skip_all, fields(base_len = base.len(), stamp_len = stamp.len()))]
    fn background(&self, base: &[u8], stamp: &[u8]) -> Result<Vec<u8>, IgnisError> {
        merge(base, stamp, Placement::Under)
    }

    #[instrument(skip(self, pdf), fields(pdf_len = pdf.len()))]
    fn extract_pages(&self, pdf: &[u8], ranges: &[PageRange]) -> Result<Vec<u8>, IgnisError> {
        let source = load(pdf, "source")?;
        let pages = source.get_pages();

        let mut wanted = Vec::new();
        for range in ranges {
            if range.start == 0 || range.start > range.end {
                return Err(IgnisError::Stamp(format!(
                    "invalid page range {}-{}",
                    range.start, range.end
                )));
            }
            for number in range.pages() {
                let page_id = pages.get(&number).ok_or_else(|| {
                    IgnisError::Stamp(format!(
                        "page {number} out of range (document has {} pages)",
                        pages.len()
                    ))
                })?;
                wanted.push(*page_id);
            }
        }
        if wanted.is_empty() {
            return Err(IgnisError::Stamp("no pages requested".into()));
        }

        let (mut target, pages_id) = empty_document();
        let mut memo = BTreeMap::new();
        for page_id in &wanted {
            clone_page_into(&source, &mut target, pages_id, *page_id, &mut memo)?;
        }

        debug!(pages = wanted.len(), "Pages extracted");
        save(&mut target)
    }
}

// -- Overlay / background ----------------------------------------------------

fn merge(base: &[u8], stamp: &[u8], placement: Placement) -> Result<Vec<u8>, IgnisError> {
    let mut doc = load(base, "base")?;
    let stamp_doc = load(stamp, "stamp")?;

    let stamp_page = stamp_doc
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| IgnisError::Stamp("stamp PDF has no pages".into()))?;

    let (form_id, stamp_box) = import_form(&stamp_doc, stamp_page, &mut doc)?;
    let name = format!("IgnisStamp{}", form_id.0);

    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(IgnisError::Stamp("base PDF has no pages".into()));
    }

    for page_id in pages.values() {
        let page_box = media_box(&doc, *page_id);
        let ops = placement_ops(&name, stamp_box, page_box);
        add_xobject(&mut doc, *page_id, &name, form_id)?;
        wrap_contents(&mut doc, *page_id, placement, ops)?;
    }

    debug!(pages = pages.len(), ?placement, "Stamp applied");
    save(&mut doc)
}

/// Copy the stamp page into `target` as a Form XObject. Returns its id and
/// bounding box.
fn import_form(
    stamp: &Document,
    page_id: ObjectId,
    target: &mut Document,
) -> Result<(ObjectId, [f32; 4]), IgnisError> {
    let content = stamp
        .get_page_content(page_id)
        .map_err(|err| IgnisError::Stamp(format!("cannot read stamp content: {err}")))?;

    let bbox = media_box(stamp, page_id);
    let mut memo = BTreeMap::new();

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Form".to_vec()));
    dict.set("BBox", Object::Array(bbox.iter().map(|v| number(*v)).collect()));
    if let Some(resources) = inherited(stamp, page_id, b"Resources") {
        let cloned = deep_clone_object(stamp, target, &resources, &mut memo);
        dict.set("Resources", cloned);
    }

    let form_id = target.add_object(Object::Stream(Stream::new(dict, content)));
    Ok((form_id, bbox))
}

/// Register the form under `name` in the page's resources.
///
/// The effective (possibly inherited or shared) resource dictionary is copied
/// onto the page before it is extended, so other pages are left untouched.
fn add_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    form_id: ObjectId,
) -> Result<(), IgnisError> {
    let mut resources = inherited(doc, page_id, b"Resources")
        .and_then(|obj| resolve(doc, &obj).as_dict().ok().cloned())
        .unwrap_or_default();

    let mut xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| resolve(doc, obj).as_dict().ok().cloned())
        .unwrap_or_default();
    xobjects.set(name.as_bytes().to_vec(), Object::Reference(form_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Rebuild the page's /Contents as an array with the stamp stream placed
/// before or after the existing streams.
fn wrap_contents(
    doc: &mut Document,
    page_id: ObjectId,
    placement: Placement,
    ops: String,
) -> Result<(), IgnisError> {
    let existing = match doc.get_dictionary(page_id).ok().and_then(|d| d.get(b"Contents").ok()) {
        Some(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Some(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    match placement {
        Placement::Over => {
            // Isolate the page's graphics state so the stamp starts from the
            // default coordinate system.
            let open = doc.add_object(content_stream(b"q\n".to_vec()));
            let close = doc.add_object(content_stream(format!("Q\n{ops}").into_bytes()));
            contents.push(Object::Reference(open));
            contents.extend(existing);
            contents.push(Object::Reference(close));
        }
        Placement::Under => {
            let under = doc.add_object(content_stream(ops.into_bytes()));
            contents.push(Object::Reference(under));
            contents.extend(existing);
        }
    }

    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

/// `q sx 0 0 sy tx ty cm /Name Do Q` scaling the stamp box to fit the page
/// box, centred.
fn placement_ops(name: &str, stamp: [f32; 4], page: [f32; 4]) -> String {
    let (sw, sh) = (stamp[2] - stamp[0], stamp[3] - stamp[1]);
    let (pw, ph) = (page[2] - page[0], page[3] - page[1]);

    let scale = if sw > 0.0 && sh > 0.0 {
        (pw / sw).min(ph / sh)
    } else {
        1.0
    };
    let tx = page[0] + (pw - sw * scale) / 2.0 - stamp[0] * scale;
    let ty = page[1] + (ph - sh * scale) / 2.0 - stamp[1] * scale;

    format!("q {scale:.4} 0 0 {scale:.4} {tx:.4} {ty:.4} cm /{name} Do Q\n")
}

fn content_stream(bytes: Vec<u8>) -> Object {
    Object::Stream(Stream::new(Dictionary::new(), bytes))
}

// -- Page extraction ------------------------------------------------------------

/// A document with a catalog and an empty page tree. Returns the document and
/// the id of its /Pages node.
fn empty_document() -> (Document, ObjectId) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Kids", Object::Array(Vec::new()));
    pages.set("Count", Object::Integer(0));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    (doc, pages_id)
}

/// Clone a single page object (and everything it references) from `source`
/// into `target`, appending it as the last page.
///
/// Inherited attributes are copied onto the page itself because the source
/// page tree is not carried over.
fn clone_page_into(
    source: &Document,
    target: &mut Document,
    pages_id: ObjectId,
    page_id: ObjectId,
    memo: &mut BTreeMap<ObjectId, ObjectId>,
) -> Result<(), IgnisError> {
    let page = source
        .get_dictionary(page_id)
        .map_err(|err| IgnisError::Stamp(format!("cannot read page object {page_id:?}: {err}")))?;

    let mut page = page.clone();
    for key in INHERITABLE {
        if !page.has(key) {
            if let Some(value) = inherited(source, page_id, key) {
                page.set(key.to_vec(), value);
            }
        }
    }

    let cloned = deep_clone_object(source, target, &Object::Dictionary(page), memo);
    let cloned_id = target.add_object(cloned);

    if let Ok(Object::Dictionary(page_dict)) = target.get_object_mut(cloned_id) {
        page_dict.set("Parent", Object::Reference(pages_id));
    }

    if let Ok(Object::Dictionary(pages_dict)) = target.get_object_mut(pages_id) {
        if let Ok(Object::Array(kids)) = pages_dict.get_mut(b"Kids") {
            kids.push(Object::Reference(cloned_id));
        }
        if let Ok(Object::Integer(count)) = pages_dict.get_mut(b"Count") {
            *count += 1;
        }
    }

    Ok(())
}

/// Deep-clone a lopdf object into `target`, following references.
///
/// /Parent is skipped (the caller patches it). `memo` maps source ids to
/// target ids so shared objects are copied once and cycles terminate.
fn deep_clone_object(
    source: &Document,
    target: &mut Document,
    object: &Object,
    memo: &mut BTreeMap<ObjectId, ObjectId>,
) -> Object {
    match object {
        Object::Dictionary(dict) => Object::Dictionary(clone_dict(source, target, dict, memo)),
        Object::Array(items) => Object::Array(
            items
                .iter()
                .map(|item| deep_clone_object(source, target, item, memo))
                .collect(),
        ),
        Object::Stream(stream) => {
            let dict = clone_dict(source, target, &stream.dict, memo);
            Object::Stream(Stream::new(dict, stream.content.clone()))
        }
        Object::Reference(ref_id) => {
            if let Some(mapped) = memo.get(ref_id) {
                return Object::Reference(*mapped);
            }
            match source.get_object(*ref_id) {
                Ok(referenced) => {
                    let new_id = target.new_object_id();
                    memo.insert(*ref_id, new_id);
                    let cloned = deep_clone_object(source, target, referenced, memo);
                    target.objects.insert(new_id, cloned);
                    Object::Reference(new_id)
                }
                Err(err) => {
                    warn!(?ref_id, %err, "Cannot resolve reference, using Null");
                    Object::Null
                }
            }
        }
        other => other.clone(),
    }
}

fn clone_dict(
    source: &Document,
    target: &mut Document,
    dict: &Dictionary,
    memo: &mut BTreeMap<ObjectId, ObjectId>,
) -> Dictionary {
    let mut out = Dictionary::new();
    for (key, value) in dict.iter() {
        if key.as_slice() == b"Parent" {
            continue;
        }
        out.set(key.clone(), deep_clone_object(source, target, value, memo));
    }
    out
}

// -- Helpers -------------------------------------------------------------------

fn load(bytes: &[u8], what: &str) -> Result<Document, IgnisError> {
    Document::load_mem(bytes)
        .map_err(|err| IgnisError::Stamp(format!("failed to load {what} PDF: {err}")))
}

fn save(doc: &mut Document) -> Result<Vec<u8>, IgnisError> {
    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|err| IgnisError::Stamp(format!("failed to serialise PDF: {err}")))?;
    Ok(output)
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, IgnisError> {
    match doc.get_object_mut(page_id) {
        Ok(Object::Dictionary(dict)) => Ok(dict),
        _ => Err(IgnisError::Stamp(format!("page {page_id:?} is not a dictionary"))),
    }
}

/// Look `key` up on the page, then on its /Parent chain.
fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = Some(page_id);
    // Bounded walk; malformed files can contain /Parent cycles.
    for _ in 0..64 {
        let dict = doc.get_dictionary(current?).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").ok().and_then(|p| p.as_reference().ok());
    }
    None
}

/// Follow a single indirect reference.
fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let Some(obj) = inherited(doc, page_id, b"MediaBox") else {
        return DEFAULT_MEDIA_BOX;
    };
    let Ok(items) = resolve(doc, &obj).as_array() else {
        return DEFAULT_MEDIA_BOX;
    };
    let values: Vec<f32> = items.iter().filter_map(|v| as_f32(resolve(doc, v))).collect();
    match values.as_slice() {
        [x0, y0, x1, y1] => [x0.min(*x1), y0.min(*y1), x0.max(*x1), y0.max(*y1)],
        _ => DEFAULT_MEDIA_BOX,
    }
}

fn as_f32(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Box coordinate rounded to whole points.
fn number(value: f32) -> Object {
    Object::Integer(value.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::PdfWriter;

    fn text_pdf(pages: &[&str]) -> Vec<u8> {
        let pages: Vec<String> = pages.iter().map(|p| p.to_string()).collect();
        PdfWriter::a4().create_from_pages(&pages).expect("fixture PDF")
    }

    fn page_count(pdf: &[u8]) -> usize {
        Document::load_mem(pdf).expect("parse").get_pages().len()
    }

    fn text_sections(pdf: &[u8], page: u32) -> usize {
        page_text(pdf, page).matches("BT").count()
    }

    fn page_text(pdf: &[u8], page: u32) -> String {
        let doc = Document::load_mem(pdf).expect("parse");
        let id = doc.get_pages()[&page];
        String::from_utf8_lossy(&doc.get_page_content(id).expect("content")).into_owned()
    }

    #[test]
    fn overlay_keeps_page_count_and_draws_last() {
        let base = text_pdf(&["one", "two", "three"]);
        let stamp = text_pdf(&["WATERMARK"]);
        let out = LopdfStamper.overlay(&base, &stamp).expect("overlay");

        assert_eq!(page_count(&out), 3);
        for page in 1..=3 {
            let content = page_text(&out, page);
            let draw = content.find(" Do Q").expect("stamp drawn");
            assert!(content.trim_start().starts_with('q'));
            assert!(draw > content.find("BT").expect("page text present"));
        }
    }

    #[test]
    fn background_draws_first() {
        let base = text_pdf(&["body"]);
        let stamp = text_pdf(&["BACK"]);
        let out = LopdfStamper.background(&base, &stamp).expect("background");

        let content = page_text(&out, 1);
        assert!(content.find(" Do Q").unwrap() < content.find("BT").unwrap());
    }

    #[test]
    fn stamp_is_registered_as_form_xobject() {
        let base = text_pdf(&["body"]);
        let stamp = text_pdf(&["mark"]);
        let out = LopdfStamper.overlay(&base, &stamp).expect("overlay");

        let doc = Document::load_mem(&out).expect("parse");
        let page = doc.get_pages()[&1];
        let resources = inherited(&doc, page, b"Resources").expect("resources");
        let resources = resolve(&doc, &resources).as_dict().expect("dict").clone();
        let xobjects = resources.get(b"XObject").expect("xobject dict");
        let xobjects = resolve(&doc, xobjects).as_dict().expect("dict");
        let (_, form_ref) = xobjects.iter().next().expect("one form");
        let form = doc
            .get_object(form_ref.as_reference().expect("reference"))
            .expect("form object");
        let Object::Stream(form) = form else {
            panic!("form is not a stream");
        };
        assert_eq!(
            form.dict.get(b"Subtype").and_then(|s| s.as_name()).expect("subtype"),
            b"Form"
        );
    }

    #[test]
    fn extract_selects_requested_pages_in_order() {
        // Pages are told apart by their number of text lines.
        let base = text_pdf(&["a", "b\nb", "c\nc\nc"]);
        let out = LopdfStamper
            .extract_pages(&base, &[PageRange::single(3), PageRange::single(1)])
            .expect("extract");

        assert_eq!(page_count(&out), 2);
        assert_eq!(text_sections(&out, 1), 3);
        assert_eq!(text_sections(&out, 2), 1);
    }

    #[test]
    fn extract_keeps_media_box() {
        let base = text_pdf(&["alpha", "bravo"]);
        let out = LopdfStamper
            .extract_pages(&base, &[PageRange { start: 1, end: 2 }])
            .expect("extract");
        let doc = Document::load_mem(&out).expect("parse");
        for id in doc.get_pages().values() {
            let mb = media_box(&doc, *id);
            assert!((mb[2] - 595.0).abs() < 2.0, "A4 width, got {mb:?}");
        }
    }

    #[test]
    fn extract_out_of_range_is_an_error() {
        let base = text_pdf(&["only page"]);
        let err = LopdfStamper
            .extract_pages(&base, &[PageRange::single(1), PageRange::single(2)])
            .unwrap_err();
        assert!(matches!(err, IgnisError::Stamp(msg) if msg.contains("page 2")));
    }

    #[test]
    fn garbage_input_is_a_stamp_error() {
        let stamp = text_pdf(&["mark"]);
        let err = LopdfStamper.overlay(b"not a pdf", &stamp).unwrap_err();
        assert!(matches!(err, IgnisError::Stamp(_)));
    }

    #[test]
    fn placement_centres_and_scales() {
        let ops = placement_ops("S", [0.0, 0.0, 100.0, 200.0], [0.0, 0.0, 200.0, 200.0]);
        assert_eq!(ops, "q 1.0000 0 0 1.0000 50.0000 0.0000 cm /S Do Q\n");
    }
}
