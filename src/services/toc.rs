use crate::models::{ChapterIndex, TocNode};
use crate::services::classifier::is_chapter;
use tracing::debug;

/// Flattens a table-of-contents tree into document id -> chapter title.
///
/// Walks depth-first in sibling order. Only `Link` entries classified as
/// chapters are kept; sections contribute their children but never their own
/// title. When two links resolve to the same document the later title wins.
pub fn flatten(root: &[TocNode]) -> ChapterIndex {
    let mut chapters = ChapterIndex::new();
    walk(root, &mut chapters);
    chapters
}

fn walk(nodes: &[TocNode], chapters: &mut ChapterIndex) {
    for node in nodes {
        match node {
            TocNode::Link { title, href, .. } => {
                if is_chapter(title) {
                    let doc_id = normalize_href(href);
                    if let Some(previous) = chapters.insert(doc_id, title.clone()) {
                        debug!(%href, %previous, %title, "TOC entry replaced earlier title");
                    }
                } else {
                    debug!(%title, "Skipping non-chapter TOC entry");
                }
            }
            TocNode::Section { children, .. } => walk(children, chapters),
        }
    }
}

/// Strips the in-document anchor from an href: `text/ch1.xhtml#p3` -> `text/ch1.xhtml`.
pub fn normalize_href(href: &str) -> &str {
    match href.split_once('#') {
        Some((doc, _fragment)) => doc,
        None => href,
    }
}
