//! Centralized filename conventions.
//!
//! Every stage names its files the same way:
//! - parts are `part-NN.<ext>` (`part-01.txt`, `part-01.json`); the `NN`
//!   string is the part id and is kept verbatim, zero padding included
//! - page images are `page_NNN.png`, one per global page number

/// Name of the manifest file inside the translations directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Extract the part id from a `part-NN.<ext>` filename.
///
/// - `"part-01.json"`, ext `"json"` → `Some("01")`
/// - `"part-7.txt"`, ext `"txt"` → `Some("7")`
/// - `"part-.json"` → `None` (empty id)
/// - `"part-a1.json"` → `None` (non-numeric id)
/// - `"manifest.json"` → `None`
pub fn parse_part_file_name(name: &str, ext: &str) -> Option<String> {
    let id = name
        .strip_prefix("part-")?
        .strip_suffix(ext)?
        .strip_suffix('.')?;
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(id.to_string())
}

/// True for any `part-*.<ext>` filename, valid id or not.
///
/// Used to pick batch candidates; the id itself is validated per item so a
/// malformed name is reported instead of silently skipped.
pub fn is_part_candidate(name: &str, ext: &str) -> bool {
    name.starts_with("part-") && name.ends_with(&format!(".{ext}")) && name != MANIFEST_FILE
}

/// `part-NN.<ext>` for a part id.
pub fn part_file_name(part: &str, ext: &str) -> String {
    format!("part-{part}.{ext}")
}

/// `page_NNN.png` for a global page number.
pub fn page_image_name(page_num: u32) -> String {
    format!("page_{page_num:03}.png")
}

/// Viewer URL of a page image under `prefix`.
pub fn page_image_url(prefix: &str, page_num: u32) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), page_image_name(page_num))
}

/// Viewer URL of a part file under `prefix`.
pub fn part_file_url(prefix: &str, part: &str) -> String {
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        part_file_name(part, "json")
    )
}

/// Numeric sort key for a part id (`"01"` → 1). Non-numeric ids sort last.
pub fn part_number(part: &str) -> u32 {
    part.parse().unwrap_or(u32::MAX)
}
