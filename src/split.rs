//! Page splitting and per-page metadata derivation.
//!
//! Translated text arrives as one blob per part, with the extractor's page
//! markers still embedded:
//!
//! ```text
//! -- 1 of 3 --
//! # 表紙
//! ...
//! -- 2 of 3 --
//! ## 目次
//! ...
//! -- 3 of 3 --
//! ## ワークフロー
//! ```
//!
//! [`split_pages`] cuts the blob at each marker. Content for marker `N` runs up
//! to the next marker (or the end of the text). Anything before the first
//! marker is a preamble and is dropped. A blob with no markers at all is a
//! single page numbered 1.
//!
//! The title, section and tag helpers are keyword heuristics over the page's
//! first markdown heading. They are expected to need manual correction for
//! some pages.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PAGE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"--\s*(\d+)\s+of\s+(\d+)\s*--").expect("page marker regex is valid")
});

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,3}\s+(.+)$").expect("heading regex is valid"));

/// Section assigned to the cover and table-of-contents pages.
pub const SECTION_COVER: &str = "表紙・目次";
pub const SECTION_WORKFLOW: &str = "ワークフロー";
pub const SECTION_SEQUENCER: &str = "シーケンサーの基礎";

/// Content found for one page marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPage {
    /// Page number as written in the marker.
    pub page_num: u32,
    /// Marker-stripped, trimmed content.
    pub content: String,
}

/// A `-- k of N --` marker located in a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMarker {
    pub page_num: u32,
    pub total: u32,
    /// Byte offset of the marker start.
    pub start: usize,
    /// Byte offset just past the marker.
    pub end: usize,
}

/// Every page marker in `text`, in order of appearance.
///
/// Markers whose numbers overflow `u32` are skipped.
pub fn find_markers(text: &str) -> Vec<PageMarker> {
    PAGE_MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(PageMarker {
                page_num: caps[1].parse().ok()?,
                total: caps[2].parse().ok()?,
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Remove every page marker from `text` and trim the result.
pub fn strip_markers(text: &str) -> String {
    PAGE_MARKER.replace_all(text, "").trim().to_string()
}

/// Split a translated blob into per-page records, in marker order.
///
/// One record per marker, even when its content is empty. Without markers
/// the whole trimmed text becomes page 1.
pub fn split_pages(text: &str) -> Vec<SplitPage> {
    let markers = find_markers(text);

    let Some(first) = markers.first() else {
        return vec![SplitPage {
            page_num: 1,
            content: text.trim().to_string(),
        }];
    };

    let preamble = text[..first.start].trim();
    if !preamble.is_empty() {
        tracing::debug!(
            chars = preamble.chars().count(),
            "dropping text before the first page marker"
        );
    }

    markers
        .iter()
        .enumerate()
        .map(|(i, marker)| {
            let end = markers.get(i + 1).map_or(text.len(), |next| next.start);
            SplitPage {
                page_num: marker.page_num,
                content: strip_markers(&text[marker.end..end]),
            }
        })
        .collect()
}

/// Map split records by page number.
///
/// A repeated page number keeps the later record's content; the overwrite is
/// logged rather than treated as an error.
pub fn index_pages(records: Vec<SplitPage>) -> BTreeMap<u32, String> {
    let mut by_page = BTreeMap::new();
    for record in records {
        if by_page.insert(record.page_num, record.content).is_some() {
            tracing::warn!(
                page = record.page_num,
                "duplicate page marker; later content replaces earlier"
            );
        }
    }
    by_page
}

/// Title from the first `#`, `##` or `###` heading of a page, if any.
pub fn extract_title(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        HEADING
            .captures(line.trim())
            .map(|caps| caps[1].trim().to_string())
    })
}

/// Classify a page into a section from its title. First matching rule wins.
pub fn detect_section(title: Option<&str>, page_num: u32) -> Option<&'static str> {
    let title = title?;

    if page_num <= 2 || title.contains("表紙") || title.contains("目次") {
        return Some(SECTION_COVER);
    }
    if title.contains("ワークフロー") || title.contains("Workflow") {
        return Some(SECTION_WORKFLOW);
    }
    if title.contains("シーケンサー") || title.contains("Sequencer") {
        return Some(SECTION_SEQUENCER);
    }
    None
}

/// Tags derived from the section and title. Checks are independent, so a
/// page may get several tags or none.
pub fn generate_tags(title: Option<&str>, section: Option<&str>) -> Vec<String> {
    let Some(title) = title else {
        return Vec::new();
    };
    let section = section.unwrap_or_default();

    let section_rules: [(&str, &str); 4] = [
        ("表紙", "cover"),
        ("目次", "table-of-contents"),
        ("ワークフロー", "workflow"),
        ("シーケンサー", "sequencer"),
    ];
    let title_rules: [(&[&str], &str); 4] = [
        (&["Mono"], "mono-sequencer"),
        (&["Chord", "コード"], "chords"),
        (&["Drum", "ドラム"], "drums"),
        (&["Mod", "モジュレーション"], "modulation"),
    ];

    let from_section = section_rules
        .iter()
        .filter(|(needle, _)| section.contains(needle))
        .map(|(_, tag)| *tag);
    let from_title = title_rules
        .iter()
        .filter(|(needles, _)| needles.iter().any(|n| title.contains(n)))
        .map(|(_, tag)| *tag);

    from_section.chain(from_title).map(String::from).collect()
}
