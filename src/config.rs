//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `pipeline.toml`. Every stage of the
//! build pipeline derives its input and output directories from this one file,
//! so stages can be run independently and still agree on where things live.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! title = "OXI ONE MKII Manual"   # Manual title written to the manifest
//! version = "1.0.0"               # Manifest schema/content version
//!
//! [paths]
//! extracted = "data/extracted"            # part-NN.txt from the text extractor
//! drafts = "data/translations-draft"      # part-NN.json translation drafts
//! translations = "data/translations"      # part-NN.json + manifest.json
//! images = "public/manual/pages"          # page_NNN.png from the rasterizer
//! inbox = "__inbox"                       # translation error reports
//! image_url_prefix = "/manual/pages"      # Page.image URL prefix
//! part_url_prefix = "/data/translations"  # Manifest part `file` URL prefix
//!
//! [images]
//! format = "png"
//! dpi = 300
//! page_width_mm = 210.0     # A4
//! page_height_mm = 297.0
//! tolerance_px = 2          # Allowed dimension drift before a warning
//!
//! [translation]
//! model = "claude-3-5-sonnet-latest"
//! api_url = "https://api.anthropic.com/v1/messages"
//! api_key_env = "ANTHROPIC_API_KEY"
//! max_tokens = 16000
//! max_retries = 3
//! base_delay_ms = 1000      # Wait before retry n is base_delay_ms * 2^n
//! max_workers = 1           # Parts translated concurrently
//! request_timeout_secs = 600
//!
//! [site]
//! manuals_root = "public/manuals"   # <id>/data/manifest.json per manual
//! output = "dist"
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; override just the values you want:
//!
//! ```toml
//! [images]
//! dpi = 150
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `pipeline.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Manual title written to the manifest and part metadata.
    pub title: String,
    /// Manifest version string.
    pub version: String,
    /// Stage input/output directories and URL prefixes.
    pub paths: PathsConfig,
    /// Rendered page image settings.
    pub images: ImagesConfig,
    /// Translation API settings.
    pub translation: TranslationConfig,
    /// Static viewer settings.
    pub site: SiteConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            title: "OXI ONE MKII Manual".to_string(),
            version: "1.0.0".to_string(),
            paths: PathsConfig::default(),
            images: ImagesConfig::default(),
            translation: TranslationConfig::default(),
            site: SiteConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.title.trim().is_empty() {
            return Err(ConfigError::Validation("title must not be empty".into()));
        }
        if self.images.dpi == 0 {
            return Err(ConfigError::Validation(
                "images.dpi must be greater than 0".into(),
            ));
        }
        if self.images.page_width_mm <= 0.0 || self.images.page_height_mm <= 0.0 {
            return Err(ConfigError::Validation(
                "images.page_width_mm and images.page_height_mm must be positive".into(),
            ));
        }
        if self.translation.max_retries == 0 {
            return Err(ConfigError::Validation(
                "translation.max_retries must be at least 1".into(),
            ));
        }
        if self.translation.max_workers == 0 {
            return Err(ConfigError::Validation(
                "translation.max_workers must be at least 1".into(),
            ));
        }
        if self.translation.model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "translation.model must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Resolve every configured directory against `root`.
    ///
    /// Absolute paths in the config are kept as-is.
    pub fn rooted_at(mut self, root: &Path) -> Self {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        };
        join(&mut self.paths.extracted);
        join(&mut self.paths.drafts);
        join(&mut self.paths.translations);
        join(&mut self.paths.images);
        join(&mut self.paths.inbox);
        join(&mut self.site.manuals_root);
        join(&mut self.site.output);
        self
    }
}

/// Directory layout shared by all stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub extracted: PathBuf,
    pub drafts: PathBuf,
    pub translations: PathBuf,
    pub images: PathBuf,
    pub inbox: PathBuf,
    /// URL prefix for `Page.image` (`<prefix>/page_001.png`).
    pub image_url_prefix: String,
    /// URL prefix for manifest part entries (`<prefix>/part-01.json`).
    pub part_url_prefix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            extracted: PathBuf::from("data/extracted"),
            drafts: PathBuf::from("data/translations-draft"),
            translations: PathBuf::from("data/translations"),
            images: PathBuf::from("public/manual/pages"),
            inbox: PathBuf::from("__inbox"),
            image_url_prefix: "/manual/pages".to_string(),
            part_url_prefix: "/data/translations".to_string(),
        }
    }
}

/// Rendered page image settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Image format label recorded in part and manifest metadata.
    pub format: String,
    /// Rasterization resolution.
    pub dpi: u32,
    /// Physical page width in millimetres.
    pub page_width_mm: f64,
    /// Physical page height in millimetres.
    pub page_height_mm: f64,
    /// Allowed pixel drift per axis before the verifier warns.
    pub tolerance_px: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            format: "png".to_string(),
            dpi: 300,
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            tolerance_px: 2,
        }
    }
}

impl ImagesConfig {
    /// Expected pixel dimensions `(width, height)` of a rendered page.
    pub fn expected_dimensions(&self) -> (u32, u32) {
        let px = |mm: f64| (mm / 25.4 * f64::from(self.dpi)).round() as u32;
        (px(self.page_width_mm), px(self.page_height_mm))
    }
}

/// Translation API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslationConfig {
    pub model: String,
    pub api_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: u32,
    /// Total attempts per part, including the first.
    pub max_retries: u32,
    /// Base backoff delay; retry `n` waits `base_delay_ms * 2^n`.
    pub base_delay_ms: u64,
    /// Upper bound on parts translated concurrently.
    pub max_workers: usize,
    pub request_timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-latest".to_string(),
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            max_tokens: 16000,
            max_retries: 3,
            base_delay_ms: 1000,
            max_workers: 1,
            request_timeout_secs: 600,
        }
    }
}

/// Resolve the effective worker count from config.
///
/// Caps at the number of available CPU cores. Users can constrain down, not up.
pub fn effective_workers(config: &TranslationConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_workers.clamp(1, cores)
}

/// Static viewer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Directory holding one `<manual-id>/data/` tree per manual.
    pub manuals_root: PathBuf,
    /// Output directory of the generated site.
    pub output: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            manuals_root: PathBuf::from("public/manuals"),
            output: PathBuf::from("dist"),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(PipelineConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, with relative directories resolved against the
/// directory containing the file.
///
/// A missing file yields the stock defaults.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let overlay = load_raw_config(path)?;
    let config = resolve_config(overlay)?;
    let root = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok(config.rooted_at(root))
}

/// Returns a fully-commented stock `pipeline.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Manual Pipeline Configuration
# =============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Relative paths are resolved against
# the directory containing this file. Unknown keys will cause an error.

# Manual title written to manifest.json and each part's metadata.
title = "OXI ONE MKII Manual"

# Manifest version string.
version = "1.0.0"

# ---------------------------------------------------------------------------
# Directories
# ---------------------------------------------------------------------------
[paths]
# part-NN.txt files produced by the PDF text extractor.
extracted = "data/extracted"

# part-NN.json translation drafts written by `translate`.
drafts = "data/translations-draft"

# part-NN.json and manifest.json written by `build` and `manifest`.
translations = "data/translations"

# page_NNN.png files produced by the PDF rasterizer.
images = "public/manual/pages"

# Error reports from failed translation runs.
inbox = "__inbox"

# URL prefixes recorded in the JSON the viewer reads.
image_url_prefix = "/manual/pages"
part_url_prefix = "/data/translations"

# ---------------------------------------------------------------------------
# Page images
# ---------------------------------------------------------------------------
[images]
format = "png"
dpi = 300

# Physical page size used to compute expected pixel dimensions (A4).
page_width_mm = 210.0
page_height_mm = 297.0

# Pixel drift per axis tolerated by `verify` before warning.
tolerance_px = 2

# ---------------------------------------------------------------------------
# Translation
# ---------------------------------------------------------------------------
[translation]
model = "claude-3-5-sonnet-latest"
api_url = "https://api.anthropic.com/v1/messages"

# Environment variable holding the API key.
api_key_env = "ANTHROPIC_API_KEY"

max_tokens = 16000

# Attempts per part (including the first). Retry n waits base_delay_ms * 2^n.
max_retries = 3
base_delay_ms = 1000

# Parts translated concurrently. Clamped to the number of CPU cores.
max_workers = 1

request_timeout_secs = 600

# ---------------------------------------------------------------------------
# Static viewer
# ---------------------------------------------------------------------------
[site]
# One <manual-id>/data/ directory (manifest.json + part-NN.json) per manual.
manuals_root = "public/manuals"
output = "dist"
"##
}
