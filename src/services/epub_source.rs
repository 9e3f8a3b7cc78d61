//! Read-only view of an EPUB container: book metadata, the table of contents
//! as a `TocNode` tree, and the raw item bodies in reading order.

use crate::error::ScraperError;
use crate::models::{DocumentItem, ItemKind, TocNode};
use epub::doc::{EpubDoc, NavPoint};
use std::collections::HashSet;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};

const DOCUMENT_MIME_TYPES: &[&str] = &["application/xhtml+xml", "text/html"];

#[derive(Debug, Clone)]
pub struct BookSource {
    pub title: String,
    pub language: Option<String>,
    pub toc: Vec<TocNode>,
    /// Spine items first, then any remaining documents by path.
    pub documents: Vec<DocumentItem>,
}

impl BookSource {
    pub fn open(path: &Path) -> Result<Self, ScraperError> {
        info!(path = %path.display(), "Loading EPUB content");
        let doc = EpubDoc::new(path)
            .map_err(|e| ScraperError::Load(format!("{}: {e}", path.display())))?;
        Self::from_doc(doc)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ScraperError> {
        info!(bytes = bytes.len(), "Loading uploaded EPUB content");
        let doc = EpubDoc::from_reader(Cursor::new(bytes))
            .map_err(|e| ScraperError::Load(e.to_string()))?;
        Self::from_doc(doc)
    }

    fn from_doc<R: Read + Seek>(mut doc: EpubDoc<R>) -> Result<Self, ScraperError> {
        let title = doc
            .mdata("title")
            .map(|m| m.value.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        let language = doc.mdata("language").map(|m| m.value.clone());
        let toc = doc.toc.iter().map(toc_node).collect::<Vec<_>>();

        let mut order: Vec<String> = doc.spine.iter().map(|item| item.idref.clone()).collect();
        let in_spine: HashSet<String> = order.iter().cloned().collect();
        let mut extra: Vec<(String, String)> = doc
            .resources
            .iter()
            .filter(|(id, res)| !in_spine.contains(*id) && is_document_mime(&res.mime))
            .map(|(id, res)| (path_key(&res.path), id.clone()))
            .collect();
        extra.sort();
        order.extend(extra.into_iter().map(|(_, id)| id));

        let mut documents = Vec::with_capacity(order.len());
        for resource_id in order {
            let Some(resource) = doc.resources.get(&resource_id) else {
                warn!(%resource_id, "Spine references a missing resource");
                continue;
            };
            let id = path_key(&resource.path);
            let kind = if is_document_mime(&resource.mime) {
                ItemKind::Document
            } else {
                ItemKind::Other
            };

            match doc.get_resource_str(&resource_id) {
                Some((body, _mime)) => documents.push(DocumentItem { id, kind, body }),
                None => warn!(%resource_id, "Could not read EPUB item"),
            }
        }

        if toc.is_empty() && documents.is_empty() {
            return Err(ScraperError::Load(
                "EPUB has neither a table of contents nor readable documents".to_string(),
            ));
        }

        debug!(
            toc_entries = toc.len(),
            documents = documents.len(),
            "Read EPUB structure"
        );
        info!(%title, language = ?language, "Loaded EPUB");

        Ok(BookSource {
            title,
            language,
            toc,
            documents,
        })
    }
}

fn toc_node(nav: &NavPoint) -> TocNode {
    let title = nav.label.trim().to_string();
    if nav.children.is_empty() {
        TocNode::link(title, path_key(&nav.content))
    } else {
        TocNode::section(title, nav.children.iter().map(toc_node).collect())
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn is_document_mime(mime: &str) -> bool {
    DOCUMENT_MIME_TYPES.contains(&mime)
}
