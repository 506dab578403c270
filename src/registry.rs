//! Viewer-side manual registry and page resolution.
//!
//! Published manuals live under a common root, one directory per manual id:
//!
//! ```text
//! <root>/
//! ├── oxi-one-mk2/data/
//! │   ├── manifest.json
//! │   ├── part-01.json
//! │   └── part-02.json
//! └── oxi-coral/data/
//!     ├── manifest.json
//!     └── part-01.json
//! ```
//!
//! [`Registry::discover`] loads every manual it finds into an ordered map.
//! Route handling then goes through [`Registry::resolve`], which turns a raw
//! `(manual id, page string)` pair into a [`Page`] or a [`NotFound`] reason.
//! A part file named by a manifest but absent on disk is logged and left out;
//! pages it would have covered resolve to [`NotFound::MissingPart`].

use crate::naming::{self, MANIFEST_FILE};
use crate::types::{Manifest, Page, PartFile};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Directory inside each manual that holds its JSON data.
pub const DATA_DIR: &str = "data";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Manuals directory not found: {0} (run `manual-pipeline manifest` and publish the data first)")]
    MissingRoot(PathBuf),
}

/// Why a route did not resolve to a page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    #[error("Manual not found: {0}")]
    UnknownManual(String),
    #[error("Invalid page number: {0:?}")]
    InvalidPage(String),
    #[error("Page {page} out of range (1-{total})")]
    OutOfRange { page: u32, total: u32 },
    #[error("Part {part} for page {page} is not available")]
    MissingPart { part: String, page: u32 },
    #[error("Page {0} not found in its part")]
    MissingPage(u32),
}

/// One discovered manual.
#[derive(Debug, Clone)]
pub struct ManualEntry {
    pub id: String,
    pub manifest: Manifest,
    /// Part files keyed by part id.
    pub parts: BTreeMap<String, PartFile>,
}

impl ManualEntry {
    /// Load a manual from its `data` directory.
    pub fn load(id: &str, data_dir: &Path) -> Result<Self, RegistryError> {
        let manifest: Manifest = read_json(&data_dir.join(MANIFEST_FILE))?;

        let mut parts = BTreeMap::new();
        for info in &manifest.parts {
            let path = data_dir.join(naming::part_file_name(&info.part, "json"));
            if !path.exists() {
                tracing::warn!(
                    manual = id,
                    part = %info.part,
                    "part file missing; its pages will not resolve"
                );
                continue;
            }
            let part: PartFile = read_json(&path)?;
            parts.insert(info.part.clone(), part);
        }

        Ok(Self {
            id: id.to_string(),
            manifest,
            parts,
        })
    }

    pub fn total_pages(&self) -> u32 {
        self.manifest.total_pages
    }

    /// Look up a page by global number.
    pub fn page(&self, page_num: u32) -> Result<&Page, NotFound> {
        let total = self.total_pages();
        if page_num < 1 || page_num > total {
            return Err(NotFound::OutOfRange {
                page: page_num,
                total,
            });
        }

        let info = self
            .manifest
            .part_for_page(page_num)
            .ok_or(NotFound::MissingPage(page_num))?;
        let part = self
            .parts
            .get(&info.part)
            .ok_or_else(|| NotFound::MissingPart {
                part: info.part.clone(),
                page: page_num,
            })?;

        let index = (page_num - info.page_range.start) as usize;
        part.pages
            .get(index)
            .filter(|p| p.page_num == page_num)
            .ok_or(NotFound::MissingPage(page_num))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, RegistryError> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| RegistryError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Every discovered manual, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    manuals: BTreeMap<String, ManualEntry>,
}

impl Registry {
    /// Find every `<root>/<id>/data/manifest.json` and load it.
    pub fn discover(root: &Path) -> Result<Self, RegistryError> {
        if !root.is_dir() {
            return Err(RegistryError::MissingRoot(root.to_path_buf()));
        }

        let mut manuals = BTreeMap::new();
        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let data_dir = entry.path().join(DATA_DIR);
            if !data_dir.join(MANIFEST_FILE).is_file() {
                tracing::debug!(dir = %entry.path().display(), "no manifest; skipping");
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            let manual = ManualEntry::load(&id, &data_dir)?;
            tracing::debug!(manual = %id, pages = manual.total_pages(), "registered manual");
            manuals.insert(id, manual);
        }

        Ok(Self { manuals })
    }

    pub fn manual_ids(&self) -> impl Iterator<Item = &str> {
        self.manuals.keys().map(String::as_str)
    }

    pub fn manuals(&self) -> impl Iterator<Item = &ManualEntry> {
        self.manuals.values()
    }

    pub fn get(&self, manual_id: &str) -> Option<&ManualEntry> {
        self.manuals.get(manual_id)
    }

    /// True when `manual_id` names a discovered manual.
    pub fn is_valid_manual(&self, manual_id: &str) -> bool {
        self.manuals.contains_key(manual_id)
    }

    pub fn is_empty(&self) -> bool {
        self.manuals.is_empty()
    }

    /// Resolve a raw route to a page.
    ///
    /// `page` must be a plain decimal integer of at least 1; signs, decimals,
    /// and surrounding whitespace are rejected.
    pub fn resolve(&self, manual_id: &str, page: &str) -> Result<&Page, NotFound> {
        let manual = self
            .get(manual_id)
            .ok_or_else(|| NotFound::UnknownManual(manual_id.to_string()))?;
        let page_num = parse_page_number(page)?;
        manual.page(page_num)
    }

    /// Every `(manual id, page number)` route the manifests declare.
    pub fn static_params(&self) -> Vec<(String, u32)> {
        self.manuals
            .values()
            .flat_map(|manual| {
                manual.manifest.parts.iter().flat_map(move |part| {
                    part.page_range.pages().map(move |n| (manual.id.clone(), n))
                })
            })
            .collect()
    }
}

/// Parse a route's page segment.
pub fn parse_page_number(raw: &str) -> Result<u32, NotFound> {
    let invalid = || NotFound::InvalidPage(raw.to_string());
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    match raw.parse::<u32>() {
        Ok(0) | Err(_) => Err(invalid()),
        Ok(n) => Ok(n),
    }
}
