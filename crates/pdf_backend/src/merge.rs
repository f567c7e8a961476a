use std::collections::HashSet;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use lopdf::{Dictionary, Document, Object, ObjectId};
use ports::{MergeCollaborator, PageNumber};
use tracing::debug;

const OUTPUT_PDF_VERSION: &str = "1.5";
/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_PAGE_TREE_DEPTH: usize = 64;

pub struct LoadedDocument {
    document: Document,
}

impl LoadedDocument {
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }
}

/// Output under construction: copied objects plus the page order decided by
/// `append`. The page tree and catalog are only written on serialize.
pub struct MergeDocument {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl MergeDocument {
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }
}

#[derive(Debug)]
pub struct CopiedPage(ObjectId);

#[derive(Debug, Clone, Copy)]
pub struct LopdfMergeCollaborator {
    compress: bool,
}

impl Default for LopdfMergeCollaborator {
    fn default() -> Self {
        Self { compress: true }
    }
}

impl LopdfMergeCollaborator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

#[async_trait]
impl MergeCollaborator for LopdfMergeCollaborator {
    type Output = MergeDocument;
    type Source = LoadedDocument;
    type Page = CopiedPage;

    async fn create_empty(&self) -> Result<MergeDocument> {
        let mut document = Document::with_version(OUTPUT_PDF_VERSION);
        let pages_id = document.new_object_id();
        Ok(MergeDocument {
            document,
            pages_id,
            kids: Vec::new(),
        })
    }

    async fn load(&self, payload: &[u8]) -> Result<LoadedDocument> {
        let document = Document::load_mem(payload).context("invalid PDF structure")?;
        document.catalog().context("document has no catalog")?;
        Ok(LoadedDocument { document })
    }

    fn page_indices(&self, source: &LoadedDocument) -> Vec<PageNumber> {
        source.document.get_pages().keys().copied().collect()
    }

    async fn copy_pages(
        &self,
        output: &mut MergeDocument,
        source: LoadedDocument,
        pages: &[PageNumber],
    ) -> Result<Vec<CopiedPage>> {
        let mut source = source.document;
        source.renumber_objects_with(output.document.max_id + 1);

        let page_ids = source.get_pages();
        let mut copied_pages = Vec::with_capacity(pages.len());
        for number in pages {
            let page_id = *page_ids
                .get(number)
                .ok_or_else(|| anyhow!("page {number} does not exist"))?;
            let mut page = source
                .get_dictionary(page_id)
                .with_context(|| format!("page {number} is not a dictionary"))?
                .clone();
            inherit_page_attributes(&source, &mut page)
                .with_context(|| format!("page {number} has a broken page tree"))?;
            page.remove(b"Parent");
            copied_pages.push((page_id, page));
        }

        let all_pages: HashSet<ObjectId> = page_ids.values().copied().collect();
        output.document.max_id = output.document.max_id.max(source.max_id);
        let mut carried = 0usize;
        for (object_id, object) in source.objects {
            if all_pages.contains(&object_id) {
                continue;
            }
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Outlines" | b"Outline" => {}
                _ => {
                    output.document.objects.insert(object_id, object);
                    carried += 1;
                }
            }
        }

        let mut handles = Vec::with_capacity(copied_pages.len());
        for (page_id, page) in copied_pages {
            output
                .document
                .objects
                .insert(page_id, Object::Dictionary(page));
            handles.push(CopiedPage(page_id));
        }
        debug!(
            pages = handles.len(),
            objects = carried,
            "pdf: copied pages into output"
        );
        Ok(handles)
    }

    async fn append(&self, output: &mut MergeDocument, page: CopiedPage) -> Result<()> {
        let CopiedPage(page_id) = page;
        let pages_id = output.pages_id;
        output
            .document
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .context("copied page is missing from the output")?
            .set("Parent", Object::Reference(pages_id));
        output.kids.push(page_id);
        Ok(())
    }

    async fn serialize(&self, output: MergeDocument) -> Result<Vec<u8>> {
        let MergeDocument {
            mut document,
            pages_id,
            kids,
        } = output;

        let count = kids.len() as i64;
        let page_tree = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            (
                "Kids",
                Object::Array(kids.into_iter().map(Object::Reference).collect()),
            ),
            ("Count", Object::Integer(count)),
        ]);
        document
            .objects
            .insert(pages_id, Object::Dictionary(page_tree));

        let catalog_id = document.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        document.trailer.set("Root", Object::Reference(catalog_id));

        document.prune_objects();
        document.renumber_objects();
        if self.compress {
            document.compress();
        }

        let mut bytes = Vec::new();
        document
            .save_to(&mut bytes)
            .context("failed to write merged PDF")?;
        Ok(bytes)
    }
}

/// Counts the pages of a PDF payload without keeping it loaded.
pub fn page_count(payload: &[u8]) -> Result<usize> {
    let document = Document::load_mem(payload).context("invalid PDF structure")?;
    Ok(document.get_pages().len())
}

fn inherit_page_attributes(document: &Document, page: &mut Dictionary) -> Result<()> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(parent_id) = parent {
        depth += 1;
        if depth > MAX_PAGE_TREE_DEPTH {
            bail!("page tree deeper than {MAX_PAGE_TREE_DEPTH} levels");
        }
        let node = document
            .get_dictionary(parent_id)
            .context("page tree node is missing")?;
        for key in INHERITABLE_PAGE_KEYS {
            if page.has(key) {
                continue;
            }
            if let Ok(value) = node.get(key) {
                page.set(key.to_vec(), value.clone());
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/merge_tests.rs"]
mod tests;
