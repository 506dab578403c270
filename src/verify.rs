//! Read-only consistency checks over a built manual.
//!
//! Verification inspects the manifest, every part file it references, and
//! the page images, and collects [`Finding`]s instead of stopping at the
//! first problem. The manifest and part files are read as untyped JSON so a
//! missing field is reported by name rather than as a single parse failure.
//!
//! | Check | Severity |
//! |-------|----------|
//! | manifest exists, parses, has `title`/`version`/`totalPages`/`parts` | error |
//! | part file exists, parses, has `part`/`pageRange`/`pages` | error |
//! | page count equals declared range length | error |
//! | `pages[i].pageNum == start + i` | error, per index |
//! | page title / translation present | warning |
//! | `page_NNN.png` exists and is readable | error |
//! | image dimensions within tolerance of the physical page size | warning |
//! | part ranges contiguous from 1, last end equals `totalPages` | error |
//!
//! [`verify_drafts`] runs a separate pass over translation drafts, comparing
//! each page of `originalText` with the same page of `translation`:
//!
//! | Check | Severity |
//! |-------|----------|
//! | every source page marker appears in the translation, and no others | error |
//! | `N.N` section numbers in the page headers agree | error |
//! | no two pages share the same leading translation text | error |
//! | translation at least [`SHORT_TRANSLATION_CHARS`] characters | warning |

use crate::config::ImagesConfig;
use crate::extract;
use crate::naming::{self, MANIFEST_FILE};
use crate::split;
use crate::types::{PageRange, TranslationDraft};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

/// Page translations shorter than this are flagged as likely incomplete.
pub const SHORT_TRANSLATION_CHARS: usize = 100;

/// Leading characters compared when looking for duplicated page translations.
const FINGERPRINT_CHARS: usize = 200;

const PREVIEW_CHARS: usize = 100;

static SECTION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+\.[0-9]+").expect("section number regex is valid"));

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

/// Outcome of a verification run.
#[derive(Debug, Default)]
pub struct Report {
    pub findings: Vec<Finding>,
    /// Checks that passed, in the order they ran.
    pub passed: Vec<String>,
}

impl Report {
    fn error(&mut self, message: impl Into<String>) {
        self.findings.push(Finding {
            severity: Severity::Error,
            message: message.into(),
        });
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.findings.push(Finding {
            severity: Severity::Warning,
            message: message.into(),
        });
    }

    fn pass(&mut self, message: impl Into<String>) {
        self.passed.push(message.into());
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// True when there are no errors. Warnings do not fail verification.
    pub fn is_ok(&self) -> bool {
        self.error_count() == 0
    }
}

/// Where to look and what to expect.
#[derive(Debug, Clone)]
pub struct VerifySettings {
    pub translations_dir: PathBuf,
    pub images_dir: PathBuf,
    pub expected_dimensions: (u32, u32),
    pub tolerance_px: u32,
}

impl VerifySettings {
    pub fn new(translations_dir: &Path, images_dir: &Path, images: &ImagesConfig) -> Self {
        Self {
            translations_dir: translations_dir.to_path_buf(),
            images_dir: images_dir.to_path_buf(),
            expected_dimensions: images.expected_dimensions(),
            tolerance_px: images.tolerance_px,
        }
    }
}

/// A manifest part entry, as far as it could be read.
struct PartEntry {
    part: String,
    range: Option<PageRange>,
}

/// Run every check and collect the findings.
pub fn verify(settings: &VerifySettings) -> Report {
    let mut report = Report::default();

    let Some(manifest) = check_manifest(&settings.translations_dir, &mut report) else {
        report.error("Cannot verify part files without valid manifest");
        report.error("Cannot verify images without valid manifest");
        report.error("Cannot verify page continuity without valid manifest");
        return report;
    };

    let total_pages = manifest
        .get("totalPages")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0);
    let entries = part_entries(&manifest, &mut report);

    check_part_files(&settings.translations_dir, &entries, &mut report);
    check_images(settings, total_pages, &mut report);
    check_continuity(&entries, total_pages, &mut report);

    tracing::debug!(
        errors = report.error_count(),
        warnings = report.warning_count(),
        "verification finished"
    );
    report
}

fn read_json(path: &Path) -> Result<Value, VerifyError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn page_range(value: Option<&Value>) -> Option<PageRange> {
    let arr = value?.as_array()?;
    if arr.len() != 2 {
        return None;
    }
    let start = u32::try_from(arr[0].as_u64()?).ok()?;
    let end = u32::try_from(arr[1].as_u64()?).ok()?;
    Some(PageRange::new(start, end))
}

fn is_truthy_str(value: Option<&Value>) -> bool {
    value.and_then(Value::as_str).is_some_and(|s| !s.is_empty())
}

fn check_manifest(dir: &Path, report: &mut Report) -> Option<Value> {
    let path = dir.join(MANIFEST_FILE);
    if !path.exists() {
        report.error(format!("Manifest file not found: {}", path.display()));
        return None;
    }

    let manifest = match read_json(&path) {
        Ok(v) => v,
        Err(e) => {
            report.error(format!("Manifest {e}"));
            return None;
        }
    };

    if !is_truthy_str(manifest.get("title")) {
        report.error("Manifest missing title");
    }
    if !is_truthy_str(manifest.get("version")) {
        report.error("Manifest missing version");
    }
    if !manifest
        .get("totalPages")
        .and_then(Value::as_u64)
        .is_some_and(|n| n > 0)
    {
        report.error("Manifest missing totalPages");
    }
    match manifest.get("parts").and_then(Value::as_array) {
        Some(parts) => report.pass(format!(
            "Manifest valid ({} total pages, {} parts)",
            manifest.get("totalPages").and_then(Value::as_u64).unwrap_or(0),
            parts.len()
        )),
        None => report.error("Manifest missing or invalid parts array"),
    }

    Some(manifest)
}

fn part_entries(manifest: &Value, report: &mut Report) -> Vec<PartEntry> {
    let Some(parts) = manifest.get("parts").and_then(Value::as_array) else {
        return Vec::new();
    };

    parts
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            let Some(part) = entry.get("part").and_then(Value::as_str) else {
                report.error(format!("Manifest part entry {i} missing 'part'"));
                return None;
            };
            let range = page_range(entry.get("pageRange"));
            if range.is_none() {
                report.error(format!("Manifest part {part}: missing or invalid 'pageRange'"));
            }
            Some(PartEntry {
                part: part.to_string(),
                range,
            })
        })
        .collect()
}

fn check_part_files(dir: &Path, entries: &[PartEntry], report: &mut Report) {
    for entry in entries {
        let id = &entry.part;
        let name = naming::part_file_name(id, "json");
        let path = dir.join(&name);

        if !path.exists() {
            report.error(format!("Part file not found: {name}"));
            continue;
        }

        let data = match read_json(&path) {
            Ok(v) => v,
            Err(e) => {
                report.error(format!("Part {id}: {e}"));
                continue;
            }
        };

        if !is_truthy_str(data.get("part")) {
            report.error(format!("Part {id}: missing 'part' field"));
        }
        if page_range(data.get("pageRange")).is_none() {
            report.error(format!("Part {id}: missing or invalid 'pageRange'"));
        }
        let Some(pages) = data.get("pages").and_then(Value::as_array) else {
            report.error(format!("Part {id}: missing or invalid 'pages'"));
            continue;
        };

        let Some(range) = entry.range else {
            continue;
        };

        if pages.len() != range.len() as usize {
            report.error(format!(
                "Part {id}: Expected {} pages, found {}",
                range.len(),
                pages.len()
            ));
        }

        for (i, page) in pages.iter().enumerate() {
            let expected = u64::from(range.start) + i as u64;
            let actual = page.get("pageNum").and_then(Value::as_u64);
            if actual != Some(expected) {
                let got = actual.map_or_else(|| "none".to_string(), |n| n.to_string());
                report.error(format!(
                    "Part {id}: Page {i} has incorrect pageNum (expected {expected}, got {got})"
                ));
            }

            let label = actual.unwrap_or(expected);
            if !is_truthy_str(page.get("title")) {
                report.warning(format!("Part {id}: Page {label} missing title"));
            }
            let has_translation = page
                .get("translation")
                .and_then(Value::as_str)
                .is_some_and(|t| !t.trim().is_empty());
            if !has_translation {
                report.warning(format!("Part {id}: Page {label} missing translation"));
            }
        }

        report.pass(format!("Part {id} valid ({} pages)", pages.len()));
    }
}

fn check_images(settings: &VerifySettings, total_pages: u32, report: &mut Report) {
    let (want_w, want_h) = settings.expected_dimensions;
    let tolerance = settings.tolerance_px;
    let mut count = 0u32;
    let mut total_bytes = 0u64;

    for page_num in 1..=total_pages {
        let name = naming::page_image_name(page_num);
        let path = settings.images_dir.join(&name);

        if !path.exists() {
            report.error(format!("Image not found: {name}"));
            continue;
        }

        match read_image(&path) {
            Ok((w, h, bytes)) => {
                if w.abs_diff(want_w) > tolerance || h.abs_diff(want_h) > tolerance {
                    report.warning(format!(
                        "{name}: Unexpected dimensions ({w}x{h}, expected {want_w}x{want_h})"
                    ));
                }
                count += 1;
                total_bytes += bytes;
            }
            Err(e) => report.error(format!("{name}: Error reading image - {e}")),
        }
    }

    report.pass(format!(
        "{count} images verified ({:.2} MB total, {want_w}x{want_h} pixels)",
        total_bytes as f64 / (1024.0 * 1024.0)
    ));
}

fn read_image(path: &Path) -> Result<(u32, u32, u64), VerifyError> {
    let (w, h) = image::image_dimensions(path)?;
    let bytes = fs::metadata(path)?.len();
    Ok((w, h, bytes))
}

fn check_continuity(entries: &[PartEntry], total_pages: u32, report: &mut Report) {
    let mut ranged: Vec<(&str, PageRange)> = entries
        .iter()
        .filter_map(|e| e.range.map(|r| (e.part.as_str(), r)))
        .collect();
    ranged.sort_by_key(|(part, _)| naming::part_number(part));

    let Some(&(_, last)) = ranged.last() else {
        report.error("Manifest lists no parts");
        return;
    };

    let mut expected = 1;
    for (part, range) in &ranged {
        if range.start != expected {
            report.error(format!(
                "Part {part}: Page range starts at {}, expected {expected}",
                range.start
            ));
        }
        expected = range.end + 1;
    }

    if last.end != total_pages {
        report.error(format!(
            "Total pages mismatch: manifest says {total_pages}, last page is {}",
            last.end
        ));
    } else {
        report.pass(format!("Page numbering continuous (1-{total_pages})"));
    }
}

// ============================================================================
// Drafts
// ============================================================================

/// Check every `part-NN.json` draft in `drafts_dir` against its source text.
pub fn verify_drafts(drafts_dir: &Path) -> Report {
    let mut report = Report::default();
    if !drafts_dir.is_dir() {
        report.error(format!(
            "Drafts directory not found: {}",
            drafts_dir.display()
        ));
        return report;
    }

    let drafts = match extract::list_part_files(drafts_dir, "json") {
        Ok(drafts) => drafts,
        Err(e) => {
            report.error(format!("Cannot list drafts: {e}"));
            return report;
        }
    };
    if drafts.is_empty() {
        report.error(format!("No draft files found in {}", drafts_dir.display()));
    }

    for (id, path) in &drafts {
        match read_draft(path) {
            Ok(draft) => check_draft(id, &draft, &mut report),
            Err(e) => report.error(format!("Part {id}: {e}")),
        }
    }

    tracing::debug!(
        drafts = drafts.len(),
        errors = report.error_count(),
        warnings = report.warning_count(),
        "draft verification finished"
    );
    report
}

fn read_draft(path: &Path) -> Result<TranslationDraft, VerifyError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn check_draft(id: &str, draft: &TranslationDraft, report: &mut Report) {
    if draft.original_text.trim().is_empty() {
        report.warning(format!("Part {id}: No original text; draft checks skipped"));
        return;
    }

    let errors_before = report.error_count();
    let source = split::index_pages(split::split_pages(&draft.original_text));
    let translated = split::index_pages(split::split_pages(&draft.translation));

    for (&page, english) in &source {
        let Some(japanese) = translated.get(&page) else {
            report.error(format!(
                "Part {id}: Page {page} missing page marker in translation"
            ));
            continue;
        };

        let en_header = page_header(english);
        let ja_header = page_header(japanese);
        match (section_number(&en_header), section_number(&ja_header)) {
            (Some(en), Some(ja)) if en != ja => {
                report.error(format!(
                    "Part {id}: Page {page} section number mismatch (English \"{en}\", Japanese \"{ja}\")"
                ));
                report.warning(format!(
                    "Part {id}: Page {page} English preview: {}",
                    preview(&en_header)
                ));
                report.warning(format!(
                    "Part {id}: Page {page} Japanese preview: {}",
                    preview(&ja_header)
                ));
            }
            _ => {}
        }

        let chars = japanese.chars().count();
        if chars < SHORT_TRANSLATION_CHARS {
            report.warning(format!(
                "Part {id}: Page {page} translation seems very short ({chars} chars)"
            ));
        }
    }

    for page in translated.keys().filter(|&p| !source.contains_key(p)) {
        report.error(format!(
            "Part {id}: Page {page} in translation has no matching page in source"
        ));
    }

    let mut seen: BTreeMap<String, u32> = BTreeMap::new();
    for (&page, japanese) in translated.iter().filter(|(_, t)| !t.is_empty()) {
        let fingerprint: String = japanese.chars().take(FINGERPRINT_CHARS).collect();
        match seen.entry(fingerprint) {
            Entry::Occupied(first) => report.error(format!(
                "Part {id}: Page {page} duplicate translation (same as page {})",
                first.get()
            )),
            Entry::Vacant(slot) => {
                slot.insert(page);
            }
        }
    }

    if report.error_count() == errors_before {
        report.pass(format!(
            "Part {id} draft matches source ({} pages)",
            source.len()
        ));
    }
}

/// First three non-blank lines of a page, joined with spaces.
fn page_header(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
}

/// First standalone `N.N` number in `text`. Digits or ASCII letters directly
/// before or after disqualify a match (`v2.0a`), other scripts do not
/// (`3.5シーケンサー` yields `3.5`).
fn section_number(text: &str) -> Option<&str> {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    SECTION_NUMBER
        .find_iter(text)
        .find(|m| {
            let before = text[..m.start()].chars().next_back();
            let after = text[m.end()..].chars().next();
            !before.is_some_and(is_word) && !after.is_some_and(is_word)
        })
        .map(|m| m.as_str())
}

fn preview(header: &str) -> String {
    header.chars().take(PREVIEW_CHARS).collect()
}
