//! Shared types used across all pipeline stages and the viewer.
//!
//! These types are the on-disk JSON contract between the build pipeline and
//! the viewer. Field names are camelCase on disk; changing any of them breaks
//! every previously published manual.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Current UTC time as an RFC 3339 string with millisecond precision,
/// e.g. `2024-05-01T12:00:00.000Z`.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Inclusive global page range `[start, end]`, serialized as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Range of `len` pages starting at `start`. `len` must be at least 1.
    pub fn starting_at(start: u32, len: u32) -> Self {
        Self {
            start,
            end: start + len.saturating_sub(1),
        }
    }

    /// Number of pages covered; 0 for an inverted range.
    pub fn len(&self) -> u32 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, page: u32) -> bool {
        (self.start..=self.end).contains(&page)
    }

    pub fn pages(&self) -> std::ops::RangeInclusive<u32> {
        self.start..=self.end
    }
}

impl From<[u32; 2]> for PageRange {
    fn from([start, end]: [u32; 2]) -> Self {
        Self { start, end }
    }
}

impl From<PageRange> for [u32; 2] {
    fn from(r: PageRange) -> Self {
        [r.start, r.end]
    }
}

impl std::fmt::Display for PageRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// One part's translated text, as written by the `translate` stage.
///
/// `translation` still carries the `-- k of N --` page markers of the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationDraft {
    pub part: String,
    pub page_range: PageRange,
    #[serde(default)]
    pub original_text: String,
    pub translation: String,
    #[serde(default)]
    pub metadata: DraftMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DraftMetadata {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub translated_at: String,
    /// SHA-256 of the extracted source text, for incremental runs.
    pub source_hash: String,
}

/// A single manual page as the viewer renders it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page_num: u32,
    pub image: String,
    pub title: String,
    pub section_name: Option<String>,
    pub translation: String,
    pub has_content: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One `part-NN.json` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartFile {
    pub part: String,
    pub page_range: PageRange,
    pub total_pages: u32,
    #[serde(default)]
    pub metadata: PartMetadata,
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartMetadata {
    pub title: String,
    /// Distinct section names in page order.
    pub sections: Vec<String>,
    pub processed_at: String,
    pub translation_method: String,
    pub image_format: String,
    #[serde(rename = "imageDPI")]
    pub image_dpi: u32,
}

/// The top-level `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    pub title: String,
    pub total_pages: u32,
    pub total_parts: u32,
    pub parts: Vec<ManifestPart>,
    #[serde(default)]
    pub metadata: ManifestMetadata,
}

impl Manifest {
    /// Linear scan for the part covering a global page number.
    pub fn part_for_page(&self, page: u32) -> Option<&ManifestPart> {
        self.parts.iter().find(|p| p.page_range.contains(page))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestPart {
    pub part: String,
    pub title: String,
    pub file: String,
    pub total_pages: u32,
    pub page_range: PageRange,
    #[serde(default)]
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestMetadata {
    pub created_at: String,
    pub image_format: String,
    #[serde(rename = "imageDPI")]
    pub image_dpi: u32,
    pub translation_model: String,
}
