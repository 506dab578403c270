//! Reading the text extractor's output.
//!
//! The PDF text extractor writes one `part-NN.txt` per physical document
//! segment. A file may start with a metadata header that ends at the line
//! `=== EXTRACTED TEXT ===`; only what follows is the part's text. Page
//! boundaries inside the text are `-- k of N --` markers, numbered locally
//! within the part.

use crate::naming;
use crate::split;
use crate::types::PageRange;
use std::fs;
use std::path::{Path, PathBuf};

/// Separator between the extractor's metadata header and the text.
pub const TEXT_SEPARATOR: &str = "=== EXTRACTED TEXT ===";

/// Raw text for one document segment.
#[derive(Debug, Clone)]
pub struct ExtractedPart {
    pub part: String,
    pub path: PathBuf,
    /// Text after the extractor header, trimmed.
    pub text: String,
    /// Pages in this part, from its markers.
    pub page_count: u32,
}

/// Drop the extractor header, if present.
pub fn strip_header(raw: &str) -> &str {
    match raw.find(TEXT_SEPARATOR) {
        Some(idx) => raw[idx + TEXT_SEPARATOR.len()..].trim(),
        None => raw,
    }
}

/// Page count implied by a text's markers: the largest declared total or
/// page number, or 1 when there are no markers.
pub fn count_pages(text: &str) -> u32 {
    split::find_markers(text)
        .iter()
        .map(|m| m.total.max(m.page_num))
        .max()
        .unwrap_or(1)
        .max(1)
}

/// Sorted `part-*.txt` files in `dir` with their part ids.
///
/// Files whose id is not numeric are skipped with a warning.
pub fn list_parts(dir: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    list_part_files(dir, "txt")
}

/// [`list_parts`] for any extension.
pub fn list_part_files(dir: &Path, ext: &str) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    let mut parts = Vec::new();
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !naming::is_part_candidate(&name, ext) {
            continue;
        }
        match naming::parse_part_file_name(&name, ext) {
            Some(part) => parts.push((part, path)),
            None => tracing::warn!(file = %name, "skipping part file with invalid part id"),
        }
    }
    Ok(parts)
}

/// Read one extracted part.
pub fn read_part(part: &str, path: &Path) -> std::io::Result<ExtractedPart> {
    let raw = fs::read_to_string(path)?;
    let text = strip_header(&raw).trim().to_string();
    let page_count = count_pages(&text);
    Ok(ExtractedPart {
        part: part.to_string(),
        path: path.to_path_buf(),
        text,
        page_count,
    })
}

/// Global page ranges for parts taken in order, starting at page 1.
pub fn cumulative_ranges(page_counts: &[u32]) -> Vec<PageRange> {
    let mut next = 1;
    page_counts
        .iter()
        .map(|&count| {
            let range = PageRange::starting_at(next, count.max(1));
            next = range.end + 1;
            range
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn header_is_stripped() {
        let raw = "Source: manual.pdf\nPages: 1-3\n=== EXTRACTED TEXT ===\n\n-- 1 of 3 --\nHello";
        assert_eq!(strip_header(raw), "-- 1 of 3 --\nHello");
    }

    #[test]
    fn text_without_header_is_unchanged() {
        assert_eq!(strip_header("-- 1 of 1 --\nx"), "-- 1 of 1 --\nx");
    }

    #[test]
    fn page_count_from_marker_total() {
        assert_eq!(count_pages("-- 1 of 30 --\na\n-- 2 of 30 --\nb"), 30);
    }

    #[test]
    fn page_count_without_markers_is_one() {
        assert_eq!(count_pages("just text"), 1);
    }

    #[test]
    fn ranges_accumulate_across_parts() {
        let ranges = cumulative_ranges(&[30, 10, 1]);
        assert_eq!(
            ranges,
            vec![
                PageRange::new(1, 30),
                PageRange::new(31, 40),
                PageRange::new(41, 41)
            ]
        );
    }

    #[test]
    fn list_parts_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("part-02.txt"), "b").unwrap();
        fs::write(tmp.path().join("part-01.txt"), "a").unwrap();
        fs::write(tmp.path().join("part-xx.txt"), "bad").unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();
        fs::write(tmp.path().join("part-03.pdf"), "ignored").unwrap();

        let parts = list_parts(tmp.path()).unwrap();
        let ids: Vec<&str> = parts.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["01", "02"]);
    }

    #[test]
    fn read_part_strips_header_and_counts() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("part-01.txt");
        fs::write(
            &path,
            "meta\n=== EXTRACTED TEXT ===\n-- 1 of 2 --\nOne\n-- 2 of 2 --\nTwo\n",
        )
        .unwrap();

        let part = read_part("01", &path).unwrap();
        assert_eq!(part.page_count, 2);
        assert!(part.text.starts_with("-- 1 of 2 --"));
        assert!(!part.text.contains("meta"));
    }
}
