//! Manifest creation: `part-NN.json` files → `manifest.json`.
//!
//! The manifest is the single index the viewer loads first. It fixes the
//! global page numbering: parts are taken in filename order and their ranges
//! laid end to end starting at page 1, so `sum(totalPages) == totalPages`
//! always holds for a freshly built manifest.
//!
//! Unlike the build stage, a part file that cannot be read is a hard error
//! here. Skipping it would leave a gap in the page numbering.

use crate::config::PipelineConfig;
use crate::naming::{self, MANIFEST_FILE};
use crate::types::{self, Manifest, ManifestMetadata, ManifestPart, PageRange, PartFile};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Translations directory not found: {0} (run `manual-pipeline build` first)")]
    MissingParts(PathBuf),
    #[error("No part files found in {0} (run `manual-pipeline build` first)")]
    NoParts(PathBuf),
    #[error("Part file has no pages: {0} (rerun `manual-pipeline build`)")]
    EmptyPart(PathBuf),
}

/// Manual-level values the manifest records alongside its parts.
#[derive(Debug, Clone)]
pub struct ManifestSettings {
    pub title: String,
    pub version: String,
    pub part_url_prefix: String,
    pub image_format: String,
    pub image_dpi: u32,
    pub translation_model: String,
}

impl ManifestSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            title: config.title.clone(),
            version: config.version.clone(),
            part_url_prefix: config.paths.part_url_prefix.clone(),
            image_format: config.images.format.clone(),
            image_dpi: config.images.dpi,
            translation_model: config.translation.model.clone(),
        }
    }
}

/// Build a manifest from parts in the given order.
///
/// Ranges are recomputed cumulatively from each part's page count; the
/// ranges stored inside the part files are not trusted here. Every part must
/// have at least one page ([`load_parts`] rejects empty ones).
pub fn build_manifest(parts: &[PartFile], settings: &ManifestSettings) -> Manifest {
    let mut next = 1;
    let entries: Vec<ManifestPart> = parts
        .iter()
        .map(|part| {
            let count = part.pages.len() as u32;
            let page_range = PageRange::starting_at(next, count);
            next += count;
            ManifestPart {
                part: part.part.clone(),
                title: part_title(part),
                file: naming::part_file_url(&settings.part_url_prefix, &part.part),
                total_pages: count,
                page_range,
                sections: part.metadata.sections.clone(),
            }
        })
        .collect();

    Manifest {
        version: settings.version.clone(),
        title: settings.title.clone(),
        total_pages: entries.iter().map(|p| p.total_pages).sum(),
        total_parts: entries.len() as u32,
        parts: entries,
        metadata: ManifestMetadata {
            created_at: types::timestamp_now(),
            image_format: settings.image_format.clone(),
            image_dpi: settings.image_dpi,
            translation_model: settings.translation_model.clone(),
        },
    }
}

fn part_title(part: &PartFile) -> String {
    if part.metadata.title.is_empty() {
        format!("Part {}", part.part)
    } else {
        part.metadata.title.clone()
    }
}

/// Read every `part-*.json` in `dir` in filename order.
///
/// A part with an empty `pages` array is an error: it would get a range that
/// overlaps the next part.
pub fn load_parts(dir: &Path) -> Result<Vec<PartFile>, ManifestError> {
    if !dir.is_dir() {
        return Err(ManifestError::MissingParts(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .map(|n| naming::is_part_candidate(&n.to_string_lossy(), "json"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(ManifestError::NoParts(dir.to_path_buf()));
    }

    files
        .into_iter()
        .map(|path| {
            let content = fs::read_to_string(&path)?;
            let part: PartFile = match serde_json::from_str(&content) {
                Ok(part) => part,
                Err(source) => return Err(ManifestError::Parse { path, source }),
            };
            if part.pages.is_empty() {
                return Err(ManifestError::EmptyPart(path));
            }
            Ok(part)
        })
        .collect()
}

/// Run the manifest stage: write `manifest.json` next to the part files.
pub fn create_manifest(
    translations_dir: &Path,
    settings: &ManifestSettings,
) -> Result<Manifest, ManifestError> {
    let parts = load_parts(translations_dir)?;
    let manifest = build_manifest(&parts, settings);

    let json = serde_json::to_string_pretty(&manifest)?;
    fs::write(translations_dir.join(MANIFEST_FILE), json)?;
    tracing::info!(
        parts = manifest.total_parts,
        pages = manifest.total_pages,
        "wrote manifest"
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use tempfile::TempDir;

    fn settings() -> ManifestSettings {
        ManifestSettings::from_config(&PipelineConfig::default())
    }

    #[test]
    fn ranges_are_contiguous_from_one() {
        let parts = vec![
            sample_part("01", PageRange::new(1, 30)),
            sample_part("02", PageRange::new(31, 40)),
            sample_part("03", PageRange::new(41, 41)),
        ];
        let manifest = build_manifest(&parts, &settings());

        let ranges: Vec<PageRange> = manifest.parts.iter().map(|p| p.page_range).collect();
        assert_eq!(
            ranges,
            vec![
                PageRange::new(1, 30),
                PageRange::new(31, 40),
                PageRange::new(41, 41)
            ]
        );
        assert_eq!(manifest.total_pages, 41);
        assert_eq!(manifest.total_parts, 3);
        let sum: u32 = manifest.parts.iter().map(|p| p.total_pages).sum();
        assert_eq!(sum, manifest.total_pages);
    }

    #[test]
    fn ranges_ignore_stored_part_ranges() {
        // Stored range starts at 7, but this is the first part.
        let parts = vec![sample_part("01", PageRange::new(7, 9))];
        let manifest = build_manifest(&parts, &settings());
        assert_eq!(manifest.parts[0].page_range, PageRange::new(1, 3));
    }

    #[test]
    fn part_entry_fields() {
        let parts = [sample_part("02", PageRange::new(1, 2))];
        let manifest = build_manifest(&parts, &settings());
        let entry = &manifest.parts[0];
        assert_eq!(entry.file, "/data/translations/part-02.json");
        assert_eq!(entry.title, "OXI ONE MKII Manual - Part 02");
        assert_eq!(manifest.version, "1.0.0");
        assert_eq!(manifest.metadata.image_dpi, 300);
        assert_eq!(manifest.metadata.image_format, "png");
    }

    #[test]
    fn untitled_part_gets_fallback_title() {
        let mut part = sample_part("04", PageRange::new(1, 1));
        part.metadata.title.clear();
        let manifest = build_manifest(&[part], &settings());
        assert_eq!(manifest.parts[0].title, "Part 04");
    }

    #[test]
    fn empty_parts_list_is_empty_manifest() {
        let manifest = build_manifest(&[], &settings());
        assert_eq!(manifest.total_pages, 0);
        assert!(manifest.parts.is_empty());
    }

    // =========================================================================
    // Stage tests
    // =========================================================================

    #[test]
    fn missing_directory_names_build() {
        let tmp = TempDir::new().unwrap();
        let err = create_manifest(&tmp.path().join("missing"), &settings()).unwrap_err();
        assert!(matches!(err, ManifestError::MissingParts(_)));
        assert!(err.to_string().contains("manual-pipeline build"));
    }

    #[test]
    fn directory_with_only_manifest_has_no_parts() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(MANIFEST_FILE), "{}").unwrap();
        let err = create_manifest(tmp.path(), &settings()).unwrap_err();
        assert!(matches!(err, ManifestError::NoParts(_)));
    }

    #[test]
    fn writes_manifest_in_filename_order() {
        let tmp = TempDir::new().unwrap();
        write_part(tmp.path(), &sample_part("02", PageRange::new(4, 5)));
        write_part(tmp.path(), &sample_part("01", PageRange::new(1, 3)));

        let manifest = create_manifest(tmp.path(), &settings()).unwrap();
        let ids: Vec<&str> = manifest.parts.iter().map(|p| p.part.as_str()).collect();
        assert_eq!(ids, vec!["01", "02"]);

        let on_disk: Manifest =
            serde_json::from_str(&fs::read_to_string(tmp.path().join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(on_disk.total_pages, 5);
        assert_eq!(on_disk.parts[1].page_range, PageRange::new(4, 5));
    }

    #[test]
    fn rerun_ignores_previous_manifest() {
        let tmp = TempDir::new().unwrap();
        write_part(tmp.path(), &sample_part("01", PageRange::new(1, 2)));
        create_manifest(tmp.path(), &settings()).unwrap();
        let manifest = create_manifest(tmp.path(), &settings()).unwrap();
        assert_eq!(manifest.total_parts, 1);
    }

    #[test]
    fn unparseable_part_is_fatal() {
        let tmp = TempDir::new().unwrap();
        write_part(tmp.path(), &sample_part("01", PageRange::new(1, 2)));
        fs::write(tmp.path().join("part-02.json"), "not json").unwrap();

        let err = create_manifest(tmp.path(), &settings()).unwrap_err();
        match err {
            ManifestError::Parse { path, .. } => assert!(path.ends_with("part-02.json")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!tmp.path().join(MANIFEST_FILE).exists());
    }

    #[test]
    fn part_without_pages_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut empty = sample_part("01", PageRange::new(1, 2));
        empty.pages.clear();
        write_part(tmp.path(), &empty);
        write_part(tmp.path(), &sample_part("02", PageRange::new(3, 4)));

        let err = create_manifest(tmp.path(), &settings()).unwrap_err();
        match &err {
            ManifestError::EmptyPart(path) => assert!(path.ends_with("part-01.json")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("manual-pipeline build"));
        assert!(!tmp.path().join(MANIFEST_FILE).exists());
    }
}
