use once_cell::sync::Lazy;
use regex::Regex;

/// Front- and back-matter phrases. A title containing any of these, ignoring
/// case, is not a chapter.
pub const NON_CHAPTER_WORDS: &[&str] = &[
    "Acknowledgments",
    "Acknowledgements",
    "Index",
    "Notes",
    "About the",
    "Dedication",
    "Title Page",
    "Copyright",
    "Contents",
    "Cover",
    "Index",
    "Contents",
    "Notes",
    "List of",
    "Annex",
    "Also by",
    "Foreword",
    "Preface",
    "Appendix",
    "Glossary",
    "Bibliography",
    "Introduction",
    "Prologue",
    "Epilogue",
    "Afterword",
    "Appendix",
    "Endnotes",
    "Footnotes",
    "References",
    "Further Reading",
    "Permissions",
    "Colophon",
    "Errata",
    "Erratum",
    "Errata Corrige",
    "Errata Sheet",
    "Erratum Sheet",
    "Errata Slip",
    "Erratum Slip",
    "Copyright",
    "About the Author",
    "About the Translator",
    "About the Editor",
    "Note to the Reader",
    "Credits",
    "List of Illustrations",
    "List of Tables",
    "List of Figures",
    "List of Maps",
    "Epigraph",
    "Table of Cases",
    "Table of Statutes",
    "Table of Authorities",
    "Table of Abbreviations",
    "Note",
    "Translator's Note",
    "Editor's Note",
    "Editorial Note",
    "Publisher's Note",
    "Buy the book",
    "Recommended Reading",
    "About the Series",
    "About the Publisher",
    "About the Cover",
];

static LOWERCASE_DENY_LIST: Lazy<Vec<String>> = Lazy::new(|| {
    NON_CHAPTER_WORDS
        .iter()
        .map(|word| word.to_lowercase())
        .collect()
});

// "Chapter 3", "12. Title", "4: Title"
static CHAPTER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(chapter|[0-9]+(\.|:))").expect("chapter pattern is valid"));

/// Decides whether a table-of-contents title denotes a chapter.
///
/// The deny-list is checked first and always wins. Titles matching the chapter
/// pattern are chapters; titles with no signal either way are also treated as
/// chapters, so unlabeled content sections are kept.
pub fn is_chapter(title: &str) -> bool {
    let lowered = title.to_lowercase();
    if LOWERCASE_DENY_LIST
        .iter()
        .any(|word| lowered.contains(word.as_str()))
    {
        return false;
    }

    if CHAPTER_PATTERN.is_match(title) {
        return true;
    }

    true
}
