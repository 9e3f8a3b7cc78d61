use crate::models::{ChapterIndex, ChapterText, DocumentItem, ItemKind};
use tracing::{debug, info, warn};

// Wide enough that html2text never inserts hard line breaks into paragraphs.
const TEXT_WIDTH: usize = 10_000;

/// Extracts the plain text of every indexed chapter.
///
/// `documents` is walked in order, so the result follows reading order rather
/// than TOC order. A chapter is kept only when its text is longer than
/// `min_length` characters; shorter ones are logged and dropped.
pub fn extract(documents: &[DocumentItem], index: &ChapterIndex, min_length: usize) -> ChapterText {
    let mut chapters = ChapterText::new();

    for item in documents {
        if item.kind != ItemKind::Document {
            continue;
        }
        let Some(title) = index.get(&item.id) else {
            continue;
        };

        let text = html_to_text(&item.body);
        let length = text.chars().count();
        if length > min_length {
            debug!(%title, length, "Extracted chapter text");
            chapters.insert(title.clone(), text);
        } else {
            warn!(%title, length, min_length, "Chapter is too short and will be skipped");
        }
    }

    info!(
        indexed = index.len(),
        extracted = chapters.len(),
        "Finished extracting chapter text"
    );
    chapters
}

/// Converts an XHTML body to plain text, falling back to the raw markup when
/// the converter rejects it.
pub fn html_to_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), TEXT_WIDTH) {
        Ok(text) => text,
        Err(err) => {
            warn!("html2text failed: {err}");
            html.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_with_text(len: usize) -> String {
        format!(
            "<html><body><p>{}</p></body></html>",
            "a".repeat(len)
        )
    }

    fn index() -> ChapterIndex {
        let mut index = ChapterIndex::new();
        index.insert("ch01.xhtml", "Chapter 1".to_string());
        index.insert("ch02.xhtml", "Chapter 2".to_string());
        index
    }

    #[test]
    fn test_min_length_threshold() {
        let documents = vec![
            DocumentItem::document("ch01.xhtml", body_with_text(80)),
            DocumentItem::document("ch02.xhtml", body_with_text(200)),
        ];

        let chapters = extract(&documents, &index(), 105);
        assert_eq!(chapters.len(), 1);
        assert!(!chapters.contains_key("Chapter 1"));
        assert!(chapters.get("Chapter 2").unwrap().contains(&"a".repeat(200)));
    }

    #[test]
    fn test_text_exactly_at_threshold_is_skipped() {
        let body = body_with_text(150);
        let length = html_to_text(&body).chars().count();
        let documents = vec![DocumentItem::document("ch01.xhtml", body)];

        assert!(extract(&documents, &index(), length).is_empty());
        assert_eq!(extract(&documents, &index(), length - 1).len(), 1);
    }

    #[test]
    fn test_skips_unindexed_and_non_documents() {
        let documents = vec![
            DocumentItem::document("cover.xhtml", body_with_text(500)),
            DocumentItem {
                id: "ch01.xhtml".to_string(),
                kind: ItemKind::Other,
                body: body_with_text(500),
            },
        ];

        assert!(extract(&documents, &index(), 105).is_empty());
    }

    #[test]
    fn test_result_follows_document_order() {
        let documents = vec![
            DocumentItem::document("ch02.xhtml", body_with_text(300)),
            DocumentItem::document("ch01.xhtml", body_with_text(300)),
        ];

        let chapters = extract(&documents, &index(), 105);
        assert_eq!(chapters.keys().collect::<Vec<_>>(), vec!["Chapter 2", "Chapter 1"]);
    }

    #[test]
    fn test_markup_is_stripped() {
        let text = html_to_text("<html><body><h1>Title</h1><p>Some <b>bold</b> words.</p></body></html>");
        assert!(text.contains("Some"));
        assert!(text.contains("words."));
        assert!(!text.contains("<p>"));
    }
}
