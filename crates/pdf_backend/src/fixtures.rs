//! In-memory PDFs for tests. Every page draws a single text label, so the
//! order of pages in a merged output can be read back with [`page_labels`].

use anyhow::{Context, Result};
use lopdf::{
    content::{Content, Operation},
    Dictionary, Document, Object, Stream,
};

/// Builds a PDF with one page per label. `Resources` and `MediaBox` live on
/// the page tree node, so pages only have them by inheritance.
pub fn build_pdf(labels: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let page_tree_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));
    let resources_id = doc.add_object(Dictionary::from_iter([(
        "Font",
        Object::Dictionary(Dictionary::from_iter([("F1", Object::Reference(font_id))])),
    )]));

    let mut kids = Vec::with_capacity(labels.len());
    for label in labels {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*label)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_bytes = content.encode().unwrap_or_default();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content_bytes));
        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(page_tree_id)),
            ("Contents", Object::Reference(content_id)),
        ]));
        kids.push(Object::Reference(page_id));
    }

    let page_tree = Dictionary::from_iter([
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(kids.len() as i64)),
        ("Kids", Object::Array(kids)),
        ("Resources", Object::Reference(resources_id)),
        (
            "MediaBox",
            Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
        ),
    ]);
    doc.objects
        .insert(page_tree_id, Object::Dictionary(page_tree));

    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(page_tree_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut output = Vec::new();
    doc.save_to(&mut output).unwrap_or_default();
    output
}

/// A payload that passes the header sniff but is not a loadable PDF.
pub fn truncated_pdf() -> Vec<u8> {
    b"%PDF-1.5\n1 0 obj\n<< /Type /Catalog".to_vec()
}

/// Labels drawn on each page of `payload`, in page order.
pub fn page_labels(payload: &[u8]) -> Result<Vec<String>> {
    let doc = Document::load_mem(payload).context("load merged output")?;
    let mut labels = Vec::new();
    for (number, page_id) in doc.get_pages() {
        let raw = doc
            .get_page_content(page_id)
            .with_context(|| format!("content of page {number}"))?;
        let content = Content::decode(&raw).with_context(|| format!("decode page {number}"))?;
        let label = content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");
        labels.push(label);
    }
    Ok(labels)
}

/// Whether every page of `payload` resolves a `MediaBox` and `Resources`
/// without consulting its ancestors.
pub fn pages_are_self_contained(payload: &[u8]) -> Result<bool> {
    let doc = Document::load_mem(payload).context("load merged output")?;
    for page_id in doc.get_pages().into_values() {
        let page = doc.get_dictionary(page_id)?;
        if !page.has(b"MediaBox") || !page.has(b"Resources") {
            return Ok(false);
        }
    }
    Ok(true)
}
