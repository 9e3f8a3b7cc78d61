use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// Visible summary text for a chapter whose summarization failed.
pub const SUMMARY_ERROR_PLACEHOLDER: &str = "Error summarizing chapter";

/// One entry of an EPUB table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TocNode {
    Link {
        title: String,
        href: String,
        id: String,
    },
    /// A pure container: its own title is never a chapter.
    Section {
        title: String,
        children: Vec<TocNode>,
    },
}

impl TocNode {
    pub fn link(title: impl Into<String>, href: impl Into<String>) -> Self {
        let href = href.into();
        TocNode::Link {
            title: title.into(),
            id: href.clone(),
            href,
        }
    }

    pub fn section(title: impl Into<String>, children: Vec<TocNode>) -> Self {
        TocNode::Section {
            title: title.into(),
            children,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            TocNode::Link { title, .. } | TocNode::Section { title, .. } => title,
        }
    }
}

/// Insertion-ordered string-keyed map.
///
/// Re-inserting an existing key replaces its value but keeps the position of the
/// first insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
    positions: HashMap<String, usize>,
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Inserts `value` under `key`, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.positions.get(&key) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.positions.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    pub fn get_index(&self, index: usize) -> Option<(&str, &V)> {
        self.entries.get(index).map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> IntoIterator for OrderedMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Normalized document id -> display title, in reading order.
pub type ChapterIndex = OrderedMap<String>;

/// Display title -> extracted plain text.
pub type ChapterText = OrderedMap<String>;

/// Display title -> outcome of summarizing that chapter.
pub type ChapterResult = OrderedMap<ChapterOutcome>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryStatus {
    Ok(String),
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BionicStatus {
    Converted(String),
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterOutcome {
    pub summary: SummaryStatus,
    pub bionic: BionicStatus,
}

impl ChapterOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            summary: SummaryStatus::Failed {
                reason: reason.into(),
            },
            bionic: BionicStatus::Skipped,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.summary, SummaryStatus::Failed { .. })
    }

    /// The summary as shown to readers; failed chapters show the placeholder.
    pub fn summary_text(&self) -> &str {
        match &self.summary {
            SummaryStatus::Ok(text) => text,
            SummaryStatus::Failed { .. } => SUMMARY_ERROR_PLACEHOLDER,
        }
    }

    /// Bionic text when converted, otherwise the plain summary text.
    pub fn display_text(&self) -> &str {
        match &self.bionic {
            BionicStatus::Converted(text) => text,
            BionicStatus::Skipped => self.summary_text(),
        }
    }
}

impl Serialize for ChapterOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("summary", self.summary_text())?;
        match &self.summary {
            SummaryStatus::Ok(_) => map.serialize_entry("status", "ok")?,
            SummaryStatus::Failed { reason } => {
                map.serialize_entry("status", "failed")?;
                map.serialize_entry("error", reason)?;
            }
        }
        if let BionicStatus::Converted(text) = &self.bionic {
            map.serialize_entry("bionic", text)?;
        }
        map.end()
    }
}

impl OrderedMap<ChapterOutcome> {
    /// Title -> plain summary text, failures shown as the placeholder.
    pub fn plain_texts(&self) -> OrderedMap<String> {
        self.iter()
            .map(|(title, outcome)| (title, outcome.summary_text().to_string()))
            .collect()
    }

    /// Title -> bionic text where converted, plain summary otherwise.
    pub fn bionic_texts(&self) -> OrderedMap<String> {
        self.iter()
            .map(|(title, outcome)| (title, outcome.display_text().to_string()))
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.values().filter(|outcome| outcome.is_failed()).count()
    }
}

/// Kind tag of an item inside the EPUB container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Document,
    Other,
}

/// A raw item body taken from the EPUB container.
#[derive(Debug, Clone)]
pub struct DocumentItem {
    pub id: String,
    pub kind: ItemKind,
    pub body: String,
}

impl DocumentItem {
    pub fn document(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ItemKind::Document,
            body: body.into(),
        }
    }
}
