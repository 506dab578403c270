//! Static viewer site generation.
//!
//! Renders every route the registry declares into a plain HTML file, so the
//! viewer can be served from any static file host.
//!
//! ## Output Structure
//!
//! ```text
//! dist/
//! ├── index.html                          # Manual list
//! ├── 404.html                            # Served for any unresolvable route
//! └── manuals/
//!     └── oxi-one-mk2/
//!         └── page/
//!             ├── 1/index.html            # Scan + translation for page 1
//!             ├── 2/index.html
//!             └── ...
//! ```
//!
//! Each page shows the scanned image next to the rendered markdown
//! translation, or a notice when the page has no translation. Previous/next
//! links and the `n / total` counter sit above the translation; `←`/`→`
//! move one page and `Home`/`End` jump to the first/last page.
//!
//! Image URLs are emitted exactly as recorded in the part files; the page
//! images themselves are published separately.
//!
//! CSS and JavaScript are embedded at compile time from `static/`.

use crate::registry::{ManualEntry, Registry};
use crate::types::Page;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Options, Parser, html as md_html};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No manuals to render (run `manual-pipeline manifest` and publish the data first)")]
    NoManuals,
}

const CSS: &str = include_str!("../static/viewer.css");
const JS: &str = include_str!("../static/keys.js");

/// Notice shown in place of a missing translation.
pub const NO_TRANSLATION: &str = "このページには翻訳がありません";

/// What a site run wrote.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SiteSummary {
    pub manuals: usize,
    pub pages: usize,
    /// Declared routes that did not resolve and were left to the 404 page.
    pub unresolved: usize,
}

/// Write the whole site for `registry` into `output_dir`.
pub fn generate(registry: &Registry, output_dir: &Path) -> Result<SiteSummary, SiteError> {
    if registry.is_empty() {
        return Err(SiteError::NoManuals);
    }

    fs::create_dir_all(output_dir)?;
    fs::write(
        output_dir.join("index.html"),
        render_index(registry).into_string(),
    )?;
    fs::write(output_dir.join("404.html"), render_not_found().into_string())?;

    let mut summary = SiteSummary {
        manuals: registry.manuals().count(),
        ..Default::default()
    };

    for (manual_id, page_num) in registry.static_params() {
        let Some(manual) = registry.get(&manual_id) else {
            continue;
        };
        match manual.page(page_num) {
            Ok(page) => {
                let dir = output_dir
                    .join("manuals")
                    .join(&manual_id)
                    .join("page")
                    .join(page_num.to_string());
                fs::create_dir_all(&dir)?;
                fs::write(
                    dir.join("index.html"),
                    render_page(manual, page).into_string(),
                )?;
                summary.pages += 1;
            }
            Err(reason) => {
                tracing::warn!(manual = %manual_id, page = page_num, %reason, "route left to 404");
                summary.unresolved += 1;
            }
        }
    }

    tracing::info!(
        manuals = summary.manuals,
        pages = summary.pages,
        "site generated at {}",
        output_dir.display()
    );
    Ok(summary)
}

/// Render markdown to HTML with table support.
pub fn render_markdown(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(source, options);
    let mut out = String::new();
    md_html::push_html(&mut out, parser);
    out
}

// ============================================================================
// HTML Components
// ============================================================================

fn base_document(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="ja" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(CSS)) }
            }
            body {
                (content)
            }
        }
    }
}

fn site_header(breadcrumb: Markup) -> Markup {
    html! {
        header.site-header {
            nav.breadcrumb { (breadcrumb) }
        }
    }
}

/// Relative link from one page directory to a sibling page.
fn page_href(page_num: u32) -> String {
    format!("../{page_num}/")
}

fn page_nav(current: u32, total: u32) -> Markup {
    let prev = (current > 1).then(|| page_href(current - 1));
    let next = (current < total).then(|| page_href(current + 1));

    html! {
        nav.page-nav
            data-page-nav
            data-prev=[prev.as_deref()]
            data-next=[next.as_deref()]
            data-first=(page_href(1))
            data-last=(page_href(total)) {
            @if let Some(href) = &prev {
                a.prev href=(href) rel="prev" { "← 前へ" }
            } @else {
                span.prev.disabled { "← 前へ" }
            }
            span.counter { (current) " / " (total) }
            @if let Some(href) = &next {
                a.next href=(href) rel="next" { "次へ →" }
            } @else {
                span.next.disabled { "次へ →" }
            }
        }
    }
}

// ============================================================================
// Page Renderers
// ============================================================================

fn render_page(manual: &ManualEntry, page: &Page) -> Markup {
    let total = manual.total_pages();
    let title = format!(
        "{} (Page {}) - {}",
        page.title, page.page_num, manual.manifest.title
    );
    let alt = format!("Page {}: {}", page.page_num, page.title);

    let breadcrumb = html! {
        a href="../../../../" { "Manuals" }
        " › "
        a href=(page_href(1)) { (manual.manifest.title) }
    };

    let content = html! {
        (site_header(breadcrumb))
        main.viewer {
            div.column.scan {
                img src=(page.image) alt=(alt) loading=(if page.page_num == 1 { "eager" } else { "lazy" });
            }
            div.column.translation {
                (page_nav(page.page_num, total))
                @if page.has_content {
                    article.markdown {
                        (PreEscaped(render_markdown(&page.translation)))
                    }
                } @else {
                    p.no-translation { (NO_TRANSLATION) }
                }
            }
        }
        script { (PreEscaped(JS)) }
    };

    base_document(&title, content)
}

fn render_index(registry: &Registry) -> Markup {
    let content = html! {
        (site_header(html! { a href="./" { "Manuals" } }))
        main.manual-list {
            ul {
                @for manual in registry.manuals() {
                    li {
                        a href={ "manuals/" (manual.id) "/page/1/" } { (manual.manifest.title) }
                        " "
                        span.counter { "(" (manual.total_pages()) " pages)" }
                    }
                }
            }
        }
    };
    base_document("Manuals", content)
}

fn render_not_found() -> Markup {
    let content = html! {
        (site_header(html! { a href="/" { "Manuals" } }))
        main.not-found {
            h1 { "Page Not Found" }
            p { "お探しのページは見つかりませんでした。" }
            p { a href="/" { "Back to manuals" } }
        }
    };
    base_document("Page Not Found", content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use tempfile::TempDir;

    fn registry_with(manuals: &[(&str, &[u32])]) -> (TempDir, Registry) {
        let tmp = TempDir::new().unwrap();
        for (id, counts) in manuals {
            publish_manual(tmp.path(), id, counts);
        }
        let registry = Registry::discover(tmp.path()).unwrap();
        (tmp, registry)
    }

    #[test]
    fn markdown_tables_are_rendered() {
        let html = render_markdown("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>2</td>"));
    }

    #[test]
    fn page_nav_first_page_has_no_prev() {
        let html = page_nav(1, 3).into_string();
        assert!(!html.contains("data-prev"));
        assert!(html.contains(r#"data-next="../2/""#));
        assert!(html.contains(r#"data-last="../3/""#));
        assert!(html.contains("1 / 3"));
    }

    #[test]
    fn page_nav_last_page_has_no_next() {
        let html = page_nav(3, 3).into_string();
        assert!(html.contains(r#"data-prev="../2/""#));
        assert!(!html.contains("data-next"));
    }

    #[test]
    fn page_renders_translation_and_image() {
        let (_tmp, registry) = registry_with(&[("oxi-coral", &[2])]);
        let manual = registry.get("oxi-coral").unwrap();
        let page = manual.page(2).unwrap();
        let html = render_page(manual, page).into_string();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("/manual/pages/page_002.png"));
        assert!(html.contains(&format!("(Page 2) - {}", manual.manifest.title)));
        assert!(!html.contains(NO_TRANSLATION));
        assert!(html.contains("<h2>"));
    }

    #[test]
    fn empty_page_shows_notice() {
        let (_tmp, registry) = registry_with(&[("oxi-coral", &[1])]);
        let mut manual = registry.get("oxi-coral").unwrap().clone();
        let part = manual.parts.get_mut("01").unwrap();
        part.pages[0].translation.clear();
        part.pages[0].has_content = false;

        let page = manual.page(1).unwrap();
        let html = render_page(&manual, page).into_string();
        assert!(html.contains(NO_TRANSLATION));
    }

    #[test]
    fn translation_html_is_not_escaped_but_title_is() {
        let (_tmp, registry) = registry_with(&[("oxi-coral", &[1])]);
        let mut manual = registry.get("oxi-coral").unwrap().clone();
        let part = manual.parts.get_mut("01").unwrap();
        part.pages[0].title = "<b>x</b>".into();
        part.pages[0].translation = "**bold**".into();

        let page = manual.page(1).unwrap();
        let html = render_page(&manual, page).into_string();
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("&lt;b&gt;x&lt;/b&gt;"));
    }

    #[test]
    fn generate_writes_every_route() {
        let (_tmp, registry) = registry_with(&[("a", &[2, 1]), ("b", &[1])]);
        let out = TempDir::new().unwrap();

        let summary = generate(&registry, out.path()).unwrap();
        assert_eq!(
            summary,
            SiteSummary {
                manuals: 2,
                pages: 4,
                unresolved: 0
            }
        );
        for route in ["a/page/1", "a/page/2", "a/page/3", "b/page/1"] {
            assert!(
                out.path().join("manuals").join(route).join("index.html").exists(),
                "{route} missing"
            );
        }
        assert!(out.path().join("404.html").exists());

        let index = fs::read_to_string(out.path().join("index.html")).unwrap();
        assert!(index.contains(r#"href="manuals/a/page/1/""#));
        assert!(index.contains(r#"href="manuals/b/page/1/""#));
    }

    #[test]
    fn unresolvable_routes_are_counted() {
        let (tmp, _) = registry_with(&[("a", &[2, 1])]);
        fs::remove_file(tmp.path().join("a/data/part-02.json")).unwrap();
        let registry = Registry::discover(tmp.path()).unwrap();
        let out = TempDir::new().unwrap();

        let summary = generate(&registry, out.path()).unwrap();
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.unresolved, 1);
        assert!(!out.path().join("manuals/a/page/3").exists());
    }

    #[test]
    fn empty_registry_is_error() {
        let out = TempDir::new().unwrap();
        let result = generate(&Registry::default(), out.path());
        assert!(matches!(result, Err(SiteError::NoManuals)));
    }
}
