//! Part assembly: translation drafts → `part-NN.json`.
//!
//! The `build` stage reads every `part-*.json` draft, splits its translation
//! at the page markers, and writes a gap-free [`PartFile`]: one [`Page`] for
//! every global page number in the draft's range, whether or not the
//! translation had content for it.
//!
//! ## Marker numbering
//!
//! Extracted text numbers its markers per part (`-- 1 of 10 --` is the first
//! page of *this* part), but hand-edited drafts sometimes carry global page
//! numbers instead. [`detect_numbering`] decides per draft:
//!
//! - **Global** when every marker number lies inside the draft's global range
//!   and at least one lies outside `1..=total`
//! - **Local** otherwise, including the ambiguous case where both readings fit
//!
//! ## Failure handling
//!
//! A draft that cannot be read, parsed, or has no translation is reported and
//! counted; the remaining drafts are still built. A missing or empty drafts
//! directory stops the stage before anything is written.

use crate::config::PipelineConfig;
use crate::naming;
use crate::split::{self, SplitPage};
use crate::types::{self, Page, PageRange, PartFile, PartMetadata, TranslationDraft};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Translation method recorded when a draft does not name one.
pub const DEFAULT_METHOD: &str = "api";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Drafts directory not found: {0} (run `manual-pipeline translate` first)")]
    MissingDrafts(PathBuf),
    #[error("No draft files found in {0} (run `manual-pipeline translate` first)")]
    NoDrafts(PathBuf),
}

/// Why a single draft could not be built.
#[derive(Error, Debug)]
pub enum DraftError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid draft filename: {0}")]
    InvalidFileName(String),
    #[error("No translation found")]
    EmptyTranslation,
    #[error("Invalid page range {0}")]
    InvalidRange(PageRange),
}

/// How a draft's page markers map onto its global range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Numbering {
    /// Markers count from 1 within the part.
    Local,
    /// Markers carry global page numbers.
    Global,
}

/// Values stamped onto every page and part, independent of the draft.
#[derive(Debug, Clone)]
pub struct PartSettings {
    pub manual_title: String,
    pub image_url_prefix: String,
    pub image_format: String,
    pub image_dpi: u32,
}

impl PartSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            manual_title: config.title.clone(),
            image_url_prefix: config.paths.image_url_prefix.clone(),
            image_format: config.images.format.clone(),
            image_dpi: config.images.dpi,
        }
    }
}

impl Default for PartSettings {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Decide whether marker numbers are part-local or global.
pub fn detect_numbering(records: &[SplitPage], range: PageRange) -> Numbering {
    let total = range.len();
    let all_in_range = records.iter().all(|r| range.contains(r.page_num));
    let any_outside_local = records.iter().any(|r| r.page_num == 0 || r.page_num > total);
    if !records.is_empty() && all_in_range && any_outside_local {
        Numbering::Global
    } else {
        Numbering::Local
    }
}

/// Build a gap-free part from its range and split records.
///
/// Every page in `range` gets exactly one [`Page`]; pages without content
/// get an empty translation and a synthesized `Page N` title.
pub fn assemble_part(
    part: &str,
    range: PageRange,
    records: Vec<SplitPage>,
    method: &str,
    settings: &PartSettings,
) -> PartFile {
    let numbering = detect_numbering(&records, range);
    let by_page = split::index_pages(records);

    let pages: Vec<Page> = range
        .pages()
        .enumerate()
        .map(|(i, global)| {
            let key = match numbering {
                Numbering::Local => i as u32 + 1,
                Numbering::Global => global,
            };
            build_page(global, by_page.get(&key).map(String::as_str), settings)
        })
        .collect();

    let mut sections: Vec<String> = Vec::new();
    for name in pages.iter().filter_map(|p| p.section_name.as_ref()) {
        if !sections.contains(name) {
            sections.push(name.clone());
        }
    }

    PartFile {
        part: part.to_string(),
        page_range: range,
        total_pages: range.len(),
        metadata: PartMetadata {
            title: format!("{} - Part {}", settings.manual_title, part),
            sections,
            processed_at: types::timestamp_now(),
            translation_method: method.to_string(),
            image_format: settings.image_format.clone(),
            image_dpi: settings.image_dpi,
        },
        pages,
    }
}

fn build_page(page_num: u32, content: Option<&str>, settings: &PartSettings) -> Page {
    let content = content.unwrap_or_default();
    let title = split::extract_title(content);
    let section = split::detect_section(title.as_deref(), page_num);
    let tags = split::generate_tags(title.as_deref(), section);

    Page {
        page_num,
        image: naming::page_image_url(&settings.image_url_prefix, page_num),
        title: title.unwrap_or_else(|| format!("Page {page_num}")),
        section_name: section.map(String::from),
        translation: content.to_string(),
        has_content: !content.trim().is_empty(),
        tags,
    }
}

/// Turn one draft into a part file.
pub fn build_part(
    draft: &TranslationDraft,
    settings: &PartSettings,
) -> Result<PartFile, DraftError> {
    if draft.translation.trim().is_empty() {
        return Err(DraftError::EmptyTranslation);
    }
    if draft.page_range.is_empty() || draft.page_range.start == 0 {
        return Err(DraftError::InvalidRange(draft.page_range));
    }
    let records = split::split_pages(&draft.translation);
    let method = draft.metadata.method.as_deref().unwrap_or(DEFAULT_METHOD);
    Ok(assemble_part(
        &draft.part,
        draft.page_range,
        records,
        method,
        settings,
    ))
}

/// A part file written by the build stage.
#[derive(Debug, Clone)]
pub struct BuiltPart {
    pub part: String,
    pub output: PathBuf,
    pub page_range: PageRange,
    /// Records the splitter found, duplicates included.
    pub split_count: usize,
    pub total_pages: u32,
    pub content_pages: usize,
}

/// Outcome of a build run.
#[derive(Debug, Default)]
pub struct BuildSummary {
    pub built: Vec<BuiltPart>,
    pub failed: Vec<(String, DraftError)>,
}

impl BuildSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run the build stage: every draft in `drafts_dir` → `output_dir`.
pub fn build(
    drafts_dir: &Path,
    output_dir: &Path,
    settings: &PartSettings,
) -> Result<BuildSummary, BuildError> {
    if !drafts_dir.is_dir() {
        return Err(BuildError::MissingDrafts(drafts_dir.to_path_buf()));
    }

    let mut drafts: Vec<String> = fs::read_dir(drafts_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| naming::is_part_candidate(name, "json"))
        .collect();
    drafts.sort();

    if drafts.is_empty() {
        return Err(BuildError::NoDrafts(drafts_dir.to_path_buf()));
    }

    fs::create_dir_all(output_dir)?;

    let mut summary = BuildSummary::default();
    for name in drafts {
        match build_one(&drafts_dir.join(&name), &name, output_dir, settings) {
            Ok(built) => {
                tracing::info!(
                    part = %built.part,
                    pages = built.total_pages,
                    content_pages = built.content_pages,
                    "built part"
                );
                summary.built.push(built);
            }
            Err(e) => {
                tracing::error!(file = %name, error = %e, "failed to build draft");
                summary.failed.push((name, e));
            }
        }
    }
    Ok(summary)
}

fn build_one(
    draft_path: &Path,
    name: &str,
    output_dir: &Path,
    settings: &PartSettings,
) -> Result<BuiltPart, DraftError> {
    let part_id = naming::parse_part_file_name(name, "json")
        .ok_or_else(|| DraftError::InvalidFileName(name.to_string()))?;

    let content = fs::read_to_string(draft_path)?;
    let draft: TranslationDraft = serde_json::from_str(&content)?;
    let split_count = split::split_pages(&draft.translation).len();
    let part_file = build_part(&draft, settings)?;

    let output = output_dir.join(naming::part_file_name(&part_id, "json"));
    let json = serde_json::to_string_pretty(&part_file)?;
    fs::write(&output, json)?;

    Ok(BuiltPart {
        part: part_file.part.clone(),
        output,
        page_range: part_file.page_range,
        split_count,
        total_pages: part_file.total_pages,
        content_pages: part_file.pages.iter().filter(|p| p.has_content).count(),
    })
}
