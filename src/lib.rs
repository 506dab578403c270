//! # Manual Pipeline
//!
//! Build tooling and a static viewer for paginated bilingual product manuals:
//! each page of an English PDF manual is shown as a scanned image next to its
//! Japanese translation.
//!
//! # Architecture: Directory-to-Directory Stages
//!
//! Every stage reads one directory and writes another, so each can be rerun
//! on its own and every intermediate result is plain JSON you can inspect:
//!
//! ```text
//! 1. Translate  extracted/part-NN.txt      →  drafts/part-NN.json       (one API call per part)
//! 2. Build      drafts/part-NN.json        →  translations/part-NN.json (split into pages)
//! 3. Manifest   translations/part-NN.json  →  translations/manifest.json
//! 4. Verify     manifest + parts + images  →  report
//! ```
//!
//! PDF text extraction and page rasterization happen before stage 1 and are
//! done by external tools; this crate only consumes their output
//! (`part-NN.txt` and `page_NNN.png`).
//!
//! The viewer side loads published manuals from
//! `<manuals_root>/<id>/data/` into a [`registry::Registry`], resolves routes
//! against it, and renders every route to static HTML.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`translate`] | Stage 1: extracted text → drafts via the Anthropic API, with retries and an optional worker pool |
//! | [`assemble`] | Stage 2: drafts → gap-free per-page part files |
//! | [`manifest`] | Stage 3: part files → `manifest.json` with global page numbering |
//! | [`verify`] | Stage 4: read-only consistency reports over manifest, parts and images, and over drafts against their source text |
//! | [`split`] | Page-marker splitting plus title, section and tag heuristics |
//! | [`extract`] | Reading the text extractor's `part-NN.txt` output |
//! | [`registry`] | Manual discovery and route → page resolution for the viewer |
//! | [`site`] | Static viewer HTML using Maud |
//! | [`config`] | `pipeline.toml` loading, merging over stock defaults, validation |
//! | [`types`] | The on-disk JSON contract shared by every stage and the viewer |
//! | [`naming`] | `part-NN` / `page_NNN` filename conventions |
//! | [`output`] | CLI output formatting for every stage |
//!
//! # Design Decisions
//!
//! ## The JSON Is the Product
//!
//! Part files and the manifest are the long-lived artifact; the viewer is
//! regenerated from them at will. They are always rewritten wholesale, never
//! patched, and their camelCase field names are fixed (see [`types`]).
//!
//! ## Gap-Free Parts
//!
//! A part file lists exactly one page for every page number in its range, in
//! order, even when the translation lost a page marker. The viewer can then
//! find any page by offset without searching, and a missing translation shows
//! up as an explicit "no translation" page instead of a broken route.
//!
//! ## Fail Per Item, Except Where a Gap Would Result
//!
//! The build stage reports a bad draft and carries on with the others. The
//! manifest stage does not: skipping a part there would shift the page
//! numbering of every later part. Translation stops at the first part that
//! exhausts its retries and leaves an error report in the inbox directory.

pub mod assemble;
pub mod config;
pub mod extract;
pub mod manifest;
pub mod naming;
pub mod output;
pub mod registry;
pub mod site;
pub mod split;
pub mod translate;
pub mod types;
pub mod verify;

#[cfg(test)]
pub(crate) mod test_helpers;
