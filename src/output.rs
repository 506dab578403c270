//! CLI output formatting for all pipeline stages.
//!
//! Output leads with what was produced (parts, pages, findings) and shows
//! filesystem paths as indented context lines.
//!
//! # Output Format
//!
//! ## Translate
//!
//! ```text
//! 01 translated (41,230 chars, 1 attempt)
//!     Output: data/translations-draft/part-01.json
//! 02 up to date
//!
//! Translated 1 part, skipped 1
//! Tokens: 12,345 in / 23,456 out
//! Estimated cost: $0.39 (approximate)
//! ```
//!
//! ## Build
//!
//! ```text
//! 01 pages 1-30 (30 pages, 28 with content)
//!     Output: data/translations/part-01.json
//! part-02.json FAILED: No translation found
//!
//! Built 1 part, 1 failed
//! ```
//!
//! ## Verify
//!
//! ```text
//! ok   Manifest valid (41 total pages, 3 parts)
//! ERR  Part 01: Page 2 has incorrect pageNum (expected 3, got 4)
//! WARN Part 02: Page 33 missing translation
//!
//! Errors: 1
//! Warnings: 1
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::assemble::BuildSummary;
use crate::registry::NotFound;
use crate::site::SiteSummary;
use crate::translate::TranslateSummary;
use crate::types::{Manifest, Page};
use crate::verify::{Report, Severity};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1` → `"1 part"`, `2` → `"2 parts"`.
fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Group digits in threes: `1234567` → `"1,234,567"`.
fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Translate
// ============================================================================

pub fn format_translate_summary(summary: &TranslateSummary) -> Vec<String> {
    let mut lines = Vec::new();

    for part in &summary.translated {
        lines.push(format!(
            "{} translated ({} chars, {})",
            part.part,
            thousands(part.chars as u64),
            plural(part.attempts as usize, "attempt")
        ));
        lines.push(format!("{}Output: {}", indent(1), part.output.display()));
    }
    for part in &summary.skipped {
        lines.push(format!("{part} up to date"));
    }

    lines.push(String::new());
    lines.push(format!(
        "Translated {}, skipped {} ({})",
        plural(summary.translated.len(), "part"),
        summary.skipped.len(),
        summary.model
    ));
    lines.push(format!(
        "Tokens: {} in / {} out",
        thousands(summary.total_input_tokens()),
        thousands(summary.total_output_tokens())
    ));
    lines.push(format!(
        "Estimated cost: ${:.2} (approximate)",
        summary.estimated_cost()
    ));
    lines
}

pub fn print_translate_summary(summary: &TranslateSummary) {
    print_lines(format_translate_summary(summary));
}

// ============================================================================
// Build
// ============================================================================

pub fn format_build_summary(summary: &BuildSummary) -> Vec<String> {
    let mut lines = Vec::new();

    for part in &summary.built {
        lines.push(format!(
            "{} pages {}-{} ({}, {} with content)",
            part.part,
            part.page_range.start,
            part.page_range.end,
            plural(part.total_pages as usize, "page"),
            part.content_pages
        ));
        if part.split_count != part.total_pages as usize {
            lines.push(format!(
                "{}Markers: {} found for {} pages",
                indent(1),
                part.split_count,
                part.total_pages
            ));
        }
        lines.push(format!("{}Output: {}", indent(1), part.output.display()));
    }
    for (file, err) in &summary.failed {
        lines.push(format!("{file} FAILED: {err}"));
    }

    lines.push(String::new());
    if summary.failed.is_empty() {
        lines.push(format!("Built {}", plural(summary.built.len(), "part")));
    } else {
        lines.push(format!(
            "Built {}, {} failed",
            plural(summary.built.len(), "part"),
            summary.failed.len()
        ));
    }
    lines
}

pub fn print_build_summary(summary: &BuildSummary) {
    print_lines(format_build_summary(summary));
}

// ============================================================================
// Manifest
// ============================================================================

pub fn format_manifest(manifest: &Manifest, path: &Path) -> Vec<String> {
    let mut lines = vec![format!("{} v{}", manifest.title, manifest.version)];
    for part in &manifest.parts {
        lines.push(format!(
            "{}{} pages {} ({})",
            indent(1),
            part.part,
            part.page_range,
            plural(part.total_pages as usize, "page")
        ));
    }
    lines.push(String::new());
    lines.push(format!(
        "{}, {} → {}",
        plural(manifest.total_parts as usize, "part"),
        plural(manifest.total_pages as usize, "page"),
        path.display()
    ));
    lines
}

pub fn print_manifest(manifest: &Manifest, path: &Path) {
    print_lines(format_manifest(manifest, path));
}

// ============================================================================
// Verify
// ============================================================================

pub fn format_verify_report(report: &Report) -> Vec<String> {
    let mut lines: Vec<String> = report.passed.iter().map(|m| format!("ok   {m}")).collect();
    for finding in &report.findings {
        let tag = match finding.severity {
            Severity::Error => "ERR ",
            Severity::Warning => "WARN",
        };
        lines.push(format!("{tag} {}", finding.message));
    }

    lines.push(String::new());
    let errors = report.error_count();
    let warnings = report.warning_count();
    if errors == 0 && warnings == 0 {
        lines.push("All checks passed".to_string());
    } else {
        if errors > 0 {
            lines.push(format!("Errors: {errors}"));
        }
        if warnings > 0 {
            lines.push(format!("Warnings: {warnings}"));
        }
    }
    lines
}

pub fn print_verify_report(report: &Report) {
    print_lines(format_verify_report(report));
}

// ============================================================================
// Resolve
// ============================================================================

pub fn format_resolved(manual_id: &str, page: &Page) -> Vec<String> {
    let mut lines = vec![format!("{manual_id} page {}: {}", page.page_num, page.title)];
    lines.push(format!("{}Image: {}", indent(1), page.image));
    if let Some(section) = &page.section_name {
        lines.push(format!("{}Section: {}", indent(1), section));
    }
    if !page.tags.is_empty() {
        lines.push(format!("{}Tags: {}", indent(1), page.tags.join(", ")));
    }
    lines.push(format!(
        "{}Translation: {}",
        indent(1),
        if page.has_content {
            format!("{} chars", thousands(page.translation.chars().count() as u64))
        } else {
            "none".to_string()
        }
    ));
    lines
}

pub fn print_resolved(manual_id: &str, page: &Page) {
    print_lines(format_resolved(manual_id, page));
}

pub fn format_not_found(reason: &NotFound) -> Vec<String> {
    vec![format!("Not found: {reason}")]
}

pub fn print_not_found(reason: &NotFound) {
    print_lines(format_not_found(reason));
}

// ============================================================================
// Site
// ============================================================================

pub fn format_site_summary(summary: &SiteSummary, output_dir: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "Generated {}, {} → {}",
        plural(summary.manuals, "manual"),
        plural(summary.pages, "page"),
        output_dir.display()
    )];
    if summary.unresolved > 0 {
        lines.push(format!(
            "{}{} routes left to 404.html",
            indent(1),
            summary.unresolved
        ));
    }
    lines
}

pub fn print_site_summary(summary: &SiteSummary, output_dir: &Path) {
    print_lines(format_site_summary(summary, output_dir));
}

// ============================================================================
// Tests
// ============================================================================
