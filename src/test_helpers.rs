//! Shared test utilities for the manual-pipeline test suite.
//!
//! Builds realistic fixtures on disk: extracted text, translation drafts,
//! part files, manifests and page images. Everything goes through the same
//! stage functions the CLI uses, so a fixture is consistent by construction
//! and tests break it deliberately.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let fixture = write_manual(tmp.path(), &[3, 2]);   // 2 parts, 5 pages
//! let report = verify(&fixture.verify_settings());
//! assert!(report.is_ok());
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::assemble::{self, PartSettings};
use crate::config::PipelineConfig;
use crate::extract;
use crate::manifest::{self, ManifestSettings};
use crate::naming;
use crate::registry::DATA_DIR;
use crate::types::{DraftMetadata, PageRange, PartFile, TranslationDraft};
use crate::verify::VerifySettings;

/// DPI used by fixtures so page images stay tiny.
const FIXTURE_DPI: u32 = 10;

// =========================================================================
// Text fixtures
// =========================================================================

/// Marked-up translation with local markers `1..=pages`, one heading per page.
fn marked_translation(part: &str, pages: u32) -> String {
    (1..=pages)
        .map(|k| {
            format!(
                "-- {k} of {pages} --\n## Part {part} page {k}\n\
                 Translated body for part {part} page {k}.\n"
            )
        })
        .collect()
}

/// Write `part-NN.txt` with an extractor header and `pages` marked pages.
pub fn write_extracted(dir: &Path, part: &str, pages: u32) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let body: String = (1..=pages)
        .map(|k| {
            format!(
                "-- {k} of {pages} --\n## Section {k}\n\
                 English text for part {part} page {k}.\n"
            )
        })
        .collect();
    let text = format!(
        "Source: manual.pdf\nPart: {part}\n{}\n{body}",
        extract::TEXT_SEPARATOR
    );
    let path = dir.join(naming::part_file_name(part, "txt"));
    fs::write(&path, text).unwrap();
    path
}

// =========================================================================
// Drafts and part files
// =========================================================================

/// A draft for `range` whose translation has `pages` locally numbered pages.
pub fn sample_draft(part: &str, range: PageRange, pages: u32) -> TranslationDraft {
    TranslationDraft {
        part: part.to_string(),
        page_range: range,
        original_text: String::new(),
        translation: marked_translation(part, pages),
        metadata: DraftMetadata {
            model: "mock-model".into(),
            ..Default::default()
        },
    }
}

pub fn write_draft(dir: &Path, draft: &TranslationDraft) {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(naming::part_file_name(&draft.part, "json"));
    fs::write(path, serde_json::to_string_pretty(draft).unwrap()).unwrap();
}

/// A fully populated part file covering `range`.
pub fn sample_part(part: &str, range: PageRange) -> PartFile {
    sample_part_with(part, range, &PartSettings::default())
}

fn sample_part_with(part: &str, range: PageRange, settings: &PartSettings) -> PartFile {
    let draft = sample_draft(part, range, range.len());
    assemble::build_part(&draft, settings).unwrap()
}

pub fn write_part(dir: &Path, part: &PartFile) {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(naming::part_file_name(&part.part, "json"));
    fs::write(path, serde_json::to_string_pretty(part).unwrap()).unwrap();
}

// =========================================================================
// Page images
// =========================================================================

/// Write blank `page_NNN.png` files for pages `1..=total`.
fn write_page_images(dir: &Path, total: u32, (width, height): (u32, u32)) {
    fs::create_dir_all(dir).unwrap();
    for n in 1..=total {
        image::RgbImage::new(width, height)
            .save(dir.join(naming::page_image_name(n)))
            .unwrap();
    }
}

// =========================================================================
// Whole manuals
// =========================================================================

/// Pipeline config rooted at `root`, with fixture-sized images.
fn fixture_config(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default().rooted_at(root);
    config.images.dpi = FIXTURE_DPI;
    config
}

/// A built manual on disk.
pub struct ManualFixture {
    pub config: PipelineConfig,
}

impl ManualFixture {
    pub fn translations_dir(&self) -> &Path {
        &self.config.paths.translations
    }

    pub fn images_dir(&self) -> &Path {
        &self.config.paths.images
    }

    pub fn verify_settings(&self) -> VerifySettings {
        VerifySettings::new(
            self.translations_dir(),
            self.images_dir(),
            &self.config.images,
        )
    }
}

/// Build parts and manifest for parts of the given page counts into
/// `translations_dir`. Returns the total page count.
fn write_parts_and_manifest(
    translations_dir: &Path,
    config: &PipelineConfig,
    counts: &[u32],
) -> u32 {
    let settings = PartSettings::from_config(config);
    for (i, range) in extract::cumulative_ranges(counts).into_iter().enumerate() {
        let part = sample_part_with(&format!("{:02}", i + 1), range, &settings);
        write_part(translations_dir, &part);
    }
    manifest::create_manifest(translations_dir, &ManifestSettings::from_config(config))
        .unwrap()
        .total_pages
}

/// A consistent manual: one part per entry of `counts` plus matching images.
pub fn write_manual(root: &Path, counts: &[u32]) -> ManualFixture {
    let config = fixture_config(root);
    let total = write_parts_and_manifest(&config.paths.translations, &config, counts);
    write_page_images(&config.paths.images, total, config.images.expected_dimensions());
    ManualFixture { config }
}

/// Publish a manual's data under `<root>/<id>/data/` for the registry.
pub fn publish_manual(root: &Path, id: &str, counts: &[u32]) -> PathBuf {
    let data_dir = root.join(id).join(DATA_DIR);
    let config = fixture_config(root);
    write_parts_and_manifest(&data_dir, &config, counts);
    data_dir
}
