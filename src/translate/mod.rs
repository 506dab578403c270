//! Translation stage: `part-NN.txt` → `part-NN.json` drafts.
//!
//! Each extracted part is sent to a [`Translator`] as one request. Page ranges
//! are assigned cumulatively from the marker totals of the parts in filename
//! order, so drafts carry global page numbers from the start.
//!
//! ## Retries
//!
//! A failed request is retried up to `max_retries` attempts in total. After
//! failed attempt `n` the stage sleeps `base_delay * 2^n`. Errors that cannot
//! succeed on retry (see [`TranslateError::is_recoverable`]) stop at once.
//! When a part exhausts its attempts an error report is written to the inbox
//! and the whole run stops; no further parts are started.
//!
//! ## Parallelism
//!
//! With `max_workers` above 1, parts are translated on a dedicated rayon pool
//! of that many threads; otherwise strictly one after another. Results are
//! collected in part order either way.
//!
//! ## Incremental runs
//!
//! Each draft records a SHA-256 of the text it was translated from. A part
//! whose existing draft has the same source hash and model is skipped unless
//! the cache is disabled. A skipped draft whose page range no longer matches
//! (an earlier part grew or shrank) is rewritten with the new range.

pub mod anthropic;
pub mod backend;

pub use anthropic::AnthropicClient;
pub use backend::{TranslateError, Translation, Translator};

use crate::config::{self, PipelineConfig};
use crate::extract::{self, ExtractedPart};
use crate::naming;
use crate::types::{self, DraftMetadata, PageRange, TranslationDraft};
use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Approximate USD price per 1K input tokens, for the run summary.
pub const INPUT_COST_PER_1K: f64 = 0.003;
/// Approximate USD price per 1K output tokens, for the run summary.
pub const OUTPUT_COST_PER_1K: f64 = 0.015;

/// Method recorded in drafts produced by this stage.
pub const METHOD_API: &str = "api";

/// Retry schedule for one part.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): `base_delay * 2^attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Everything the stage needs besides the translator.
#[derive(Debug, Clone)]
pub struct TranslateSettings {
    pub extracted_dir: PathBuf,
    pub drafts_dir: PathBuf,
    pub inbox_dir: PathBuf,
    pub retry: RetryPolicy,
    pub workers: usize,
    pub use_cache: bool,
}

impl TranslateSettings {
    pub fn from_config(config: &PipelineConfig, use_cache: bool) -> Self {
        Self {
            extracted_dir: config.paths.extracted.clone(),
            drafts_dir: config.paths.drafts.clone(),
            inbox_dir: config.paths.inbox.clone(),
            retry: RetryPolicy {
                max_attempts: config.translation.max_retries,
                base_delay: Duration::from_millis(config.translation.base_delay_ms),
            },
            workers: config::effective_workers(&config.translation),
            use_cache,
        }
    }
}

/// A part translated during this run.
#[derive(Debug, Clone)]
pub struct TranslatedPart {
    pub part: String,
    pub output: PathBuf,
    pub chars: usize,
    pub attempts: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Outcome of a translation run.
#[derive(Debug, Default)]
pub struct TranslateSummary {
    pub model: String,
    pub translated: Vec<TranslatedPart>,
    /// Parts whose existing draft was up to date.
    pub skipped: Vec<String>,
}

impl TranslateSummary {
    pub fn total_input_tokens(&self) -> u64 {
        self.translated.iter().map(|p| p.input_tokens).sum()
    }

    pub fn total_output_tokens(&self) -> u64 {
        self.translated.iter().map(|p| p.output_tokens).sum()
    }

    /// Rough USD cost of the tokens used in this run.
    pub fn estimated_cost(&self) -> f64 {
        (self.total_input_tokens() as f64 * INPUT_COST_PER_1K
            + self.total_output_tokens() as f64 * OUTPUT_COST_PER_1K)
            / 1000.0
    }
}

/// Error report left in the inbox when a part cannot be translated.
#[derive(Debug, Serialize)]
struct ErrorReport<'a> {
    part: &'a str,
    error: String,
    timestamp: String,
}

/// Hex SHA-256 of a part's extracted text.
pub fn source_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Run the translate stage against the configured Anthropic API.
pub fn translate(
    config: &PipelineConfig,
    use_cache: bool,
) -> Result<TranslateSummary, TranslateError> {
    let client = AnthropicClient::from_config(&config.translation)?;
    let settings = TranslateSettings::from_config(config, use_cache);
    translate_with_translator(&settings, &client)
}

/// Run the translate stage with any translator.
pub fn translate_with_translator(
    settings: &TranslateSettings,
    translator: &dyn Translator,
) -> Result<TranslateSummary, TranslateError> {
    let parts = load_extracted(&settings.extracted_dir)?;
    fs::create_dir_all(&settings.drafts_dir)?;

    let counts: Vec<u32> = parts.iter().map(|p| p.page_count).collect();
    let ranges = extract::cumulative_ranges(&counts);

    let mut summary = TranslateSummary {
        model: translator.model().to_string(),
        ..Default::default()
    };
    let mut jobs = Vec::new();
    for (part, range) in parts.into_iter().zip(ranges) {
        let hash = source_hash(&part.text);
        let cached = settings
            .use_cache
            .then(|| cached_draft(settings, &part.part, &hash, translator.model()))
            .flatten();
        match cached {
            Some(draft) => {
                tracing::info!(part = %part.part, "draft up to date; skipping");
                if draft.page_range != range {
                    renumber_draft(settings, draft, range)?;
                }
                summary.skipped.push(part.part);
            }
            None => jobs.push((part, range, hash)),
        }
    }

    let run = |(part, range, hash): &(ExtractedPart, PageRange, String)| {
        translate_part(settings, translator, part, *range, hash)
    };

    summary.translated = if settings.workers <= 1 {
        jobs.iter().map(run).collect::<Result<Vec<_>, _>>()?
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.workers)
            .build()?;
        pool.install(|| jobs.par_iter().map(run).collect::<Result<Vec<_>, _>>())?
    };
    Ok(summary)
}

fn load_extracted(dir: &Path) -> Result<Vec<ExtractedPart>, TranslateError> {
    if !dir.is_dir() {
        return Err(TranslateError::MissingExtracted(dir.to_path_buf()));
    }
    let listed = extract::list_parts(dir)?;
    if listed.is_empty() {
        return Err(TranslateError::NoExtracted(dir.to_path_buf()));
    }
    listed
        .iter()
        .map(|(part, path)| extract::read_part(part, path).map_err(TranslateError::from))
        .collect()
}

fn draft_path(settings: &TranslateSettings, part: &str) -> PathBuf {
    settings
        .drafts_dir
        .join(naming::part_file_name(part, "json"))
}

/// The existing draft for `part`, if it was translated from the same source
/// text by the same model.
fn cached_draft(
    settings: &TranslateSettings,
    part: &str,
    hash: &str,
    model: &str,
) -> Option<TranslationDraft> {
    let content = fs::read_to_string(draft_path(settings, part)).ok()?;
    match serde_json::from_str::<TranslationDraft>(&content) {
        Ok(draft) if draft.metadata.source_hash == hash && draft.metadata.model == model => {
            Some(draft)
        }
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(part, error = %e, "existing draft unreadable; retranslating");
            None
        }
    }
}

/// Rewrite a cached draft with its current global page range.
fn renumber_draft(
    settings: &TranslateSettings,
    mut draft: TranslationDraft,
    range: PageRange,
) -> Result<(), TranslateError> {
    tracing::info!(
        part = %draft.part,
        from = %draft.page_range,
        to = %range,
        "page range moved; updating draft"
    );
    draft.page_range = range;
    let path = draft_path(settings, &draft.part);
    fs::write(path, serde_json::to_string_pretty(&draft)?)?;
    Ok(())
}

/// Translate one part with retries and write its draft.
fn translate_part(
    settings: &TranslateSettings,
    translator: &dyn Translator,
    part: &ExtractedPart,
    range: PageRange,
    hash: &str,
) -> Result<TranslatedPart, TranslateError> {
    tracing::info!(
        part = %part.part,
        chars = part.text.chars().count(),
        pages = %range,
        "translating"
    );

    let (translation, attempts) = match with_retries(translator, &part.text, &settings.retry) {
        Ok(ok) => ok,
        Err((attempts, source)) => {
            let err = TranslateError::PartFailed {
                part: part.part.clone(),
                attempts,
                source: Box::new(source),
            };
            write_error_report(&settings.inbox_dir, &part.part, &err)?;
            return Err(err);
        }
    };

    let draft = TranslationDraft {
        part: part.part.clone(),
        page_range: range,
        original_text: part.text.clone(),
        translation: translation.text,
        metadata: DraftMetadata {
            model: translator.model().to_string(),
            method: Some(METHOD_API.to_string()),
            input_tokens: translation.input_tokens,
            output_tokens: translation.output_tokens,
            translated_at: types::timestamp_now(),
            source_hash: hash.to_string(),
        },
    };

    let output = draft_path(settings, &part.part);
    fs::write(&output, serde_json::to_string_pretty(&draft)?)?;

    Ok(TranslatedPart {
        part: part.part.clone(),
        output,
        chars: part.text.chars().count(),
        attempts,
        input_tokens: draft.metadata.input_tokens,
        output_tokens: draft.metadata.output_tokens,
    })
}

/// Call the translator until it succeeds or the policy is exhausted.
///
/// Returns the translation and the attempt it succeeded on, or the number of
/// attempts made and the last error.
fn with_retries(
    translator: &dyn Translator,
    text: &str,
    policy: &RetryPolicy,
) -> Result<(Translation, u32), (u32, TranslateError)> {
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match translator.translate(text) {
            Ok(t) => return Ok((t, attempt)),
            Err(e) if attempt < max && e.is_recoverable() => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    max,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "translation attempt failed; retrying"
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err((attempt, e)),
        }
    }
}

fn write_error_report(
    inbox: &Path,
    part: &str,
    err: &TranslateError,
) -> Result<(), TranslateError> {
    fs::create_dir_all(inbox)?;
    let report = ErrorReport {
        part,
        error: err.to_string(),
        timestamp: types::timestamp_now(),
    };
    let path = inbox.join(format!("translation-error-part-{part}.json"));
    fs::write(&path, serde_json::to_string_pretty(&report)?)?;
    tracing::error!(part, report = %path.display(), "translation failed; error report saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::backend::tests::MockTranslator;
    use super::*;
    use crate::test_helpers::*;
    use tempfile::TempDir;

    fn settings(root: &Path) -> TranslateSettings {
        TranslateSettings {
            extracted_dir: root.join("extracted"),
            drafts_dir: root.join("drafts"),
            inbox_dir: root.join("inbox"),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::ZERO,
            },
            workers: 1,
            use_cache: true,
        }
    }

    fn read_draft(settings: &TranslateSettings, part: &str) -> TranslationDraft {
        let content = fs::read_to_string(draft_path(settings, part)).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_after(40), Duration::from_millis(1000 * u32::MAX as u64));
    }

    #[test]
    fn missing_extracted_dir_is_precondition_error() {
        let tmp = TempDir::new().unwrap();
        let result = translate_with_translator(&settings(tmp.path()), &MockTranslator::new());
        assert!(matches!(result, Err(TranslateError::MissingExtracted(_))));
    }

    #[test]
    fn empty_extracted_dir_is_precondition_error() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("extracted")).unwrap();
        let result = translate_with_translator(&settings(tmp.path()), &MockTranslator::new());
        assert!(matches!(result, Err(TranslateError::NoExtracted(_))));
    }

    #[test]
    fn drafts_get_cumulative_ranges() {
        let tmp = TempDir::new().unwrap();
        let s = settings(tmp.path());
        write_extracted(&s.extracted_dir, "01", 3);
        write_extracted(&s.extracted_dir, "02", 2);

        let summary = translate_with_translator(&s, &MockTranslator::new()).unwrap();
        assert_eq!(summary.translated.len(), 2);
        assert!(summary.skipped.is_empty());

        let first = read_draft(&s, "01");
        let second = read_draft(&s, "02");
        assert_eq!(first.page_range, PageRange::new(1, 3));
        assert_eq!(second.page_range, PageRange::new(4, 5));
        assert!(!second.original_text.contains(extract::TEXT_SEPARATOR));
        assert!(second.translation.starts_with("[ja]"));
        assert_eq!(second.metadata.model, "mock-model");
        assert_eq!(second.metadata.method.as_deref(), Some(METHOD_API));
        assert_eq!(second.metadata.source_hash, source_hash(&second.original_text));
    }

    #[test]
    fn token_totals_and_cost() {
        let summary = TranslateSummary {
            model: "m".into(),
            translated: vec![TranslatedPart {
                part: "01".into(),
                output: PathBuf::new(),
                chars: 0,
                attempts: 1,
                input_tokens: 1000,
                output_tokens: 2000,
            }],
            skipped: vec![],
        };
        assert_eq!(summary.total_input_tokens(), 1000);
        assert_eq!(summary.total_output_tokens(), 2000);
        assert!((summary.estimated_cost() - 0.033).abs() < 1e-9);
    }

    #[test]
    fn transient_failure_is_retried() {
        let tmp = TempDir::new().unwrap();
        let s = settings(tmp.path());
        write_extracted(&s.extracted_dir, "01", 1);

        let mock = MockTranslator::failing("part 01", 2, 503);
        let summary = translate_with_translator(&s, &mock).unwrap();
        assert_eq!(summary.translated[0].attempts, 3);
        assert_eq!(mock.call_count(), 3);
    }

    #[test]
    fn exhausted_retries_abort_and_write_report() {
        let tmp = TempDir::new().unwrap();
        let s = settings(tmp.path());
        write_extracted(&s.extracted_dir, "01", 1);
        write_extracted(&s.extracted_dir, "02", 1);
        write_extracted(&s.extracted_dir, "03", 1);

        let mock = MockTranslator::failing("part 02", 10, 500);
        let err = translate_with_translator(&s, &mock).unwrap_err();
        match &err {
            TranslateError::PartFailed { part, attempts, .. } => {
                assert_eq!(part, "02");
                assert_eq!(*attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }

        let report: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(s.inbox_dir.join("translation-error-part-02.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(report["part"], "02");
        assert!(report["error"].as_str().unwrap().contains("after 3 attempts"));
        assert!(report["timestamp"].is_string());

        // Single worker: part 03 is never attempted.
        assert!(!draft_path(&s, "03").exists());
        assert!(draft_path(&s, "01").exists());
    }

    #[test]
    fn unrecoverable_failure_is_not_retried() {
        let tmp = TempDir::new().unwrap();
        let s = settings(tmp.path());
        write_extracted(&s.extracted_dir, "01", 1);

        let mock = MockTranslator::failing("part 01", 10, 401);
        let err = translate_with_translator(&s, &mock).unwrap_err();
        assert!(matches!(err, TranslateError::PartFailed { attempts: 1, .. }));
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn unchanged_parts_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let s = settings(tmp.path());
        write_extracted(&s.extracted_dir, "01", 2);
        write_extracted(&s.extracted_dir, "02", 2);
        translate_with_translator(&s, &MockTranslator::new()).unwrap();

        write_extracted(&s.extracted_dir, "02", 3);
        let mock = MockTranslator::new();
        let summary = translate_with_translator(&s, &mock).unwrap();
        assert_eq!(summary.skipped, vec!["01"]);
        assert_eq!(summary.translated.len(), 1);
        assert_eq!(summary.translated[0].part, "02");
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn skipped_draft_follows_earlier_part_growth() {
        let tmp = TempDir::new().unwrap();
        let s = settings(tmp.path());
        write_extracted(&s.extracted_dir, "01", 2);
        write_extracted(&s.extracted_dir, "02", 2);
        translate_with_translator(&s, &MockTranslator::new()).unwrap();
        assert_eq!(read_draft(&s, "02").page_range, PageRange::new(3, 4));
        let before = read_draft(&s, "02");

        write_extracted(&s.extracted_dir, "01", 3);
        let mock = MockTranslator::new();
        let summary = translate_with_translator(&s, &mock).unwrap();
        assert_eq!(summary.skipped, vec!["02"]);
        assert_eq!(mock.call_count(), 1);

        let after = read_draft(&s, "02");
        assert_eq!(read_draft(&s, "01").page_range, PageRange::new(1, 3));
        assert_eq!(after.page_range, PageRange::new(4, 5));
        assert_eq!(after.translation, before.translation);
        assert_eq!(after.metadata.translated_at, before.metadata.translated_at);
    }

    #[test]
    fn no_cache_retranslates_everything() {
        let tmp = TempDir::new().unwrap();
        let mut s = settings(tmp.path());
        write_extracted(&s.extracted_dir, "01", 1);
        translate_with_translator(&s, &MockTranslator::new()).unwrap();

        s.use_cache = false;
        let mock = MockTranslator::new();
        let summary = translate_with_translator(&s, &mock).unwrap();
        assert!(summary.skipped.is_empty());
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn pool_keeps_part_order() {
        let tmp = TempDir::new().unwrap();
        let mut s = settings(tmp.path());
        s.workers = 4;
        for i in 1..=8 {
            write_extracted(&s.extracted_dir, &format!("{i:02}"), 1);
        }

        let summary = translate_with_translator(&s, &MockTranslator::new()).unwrap();
        let ids: Vec<&str> = summary.translated.iter().map(|p| p.part.as_str()).collect();
        assert_eq!(ids, vec!["01", "02", "03", "04", "05", "06", "07", "08"]);
        assert_eq!(read_draft(&s, "08").page_range, PageRange::new(8, 8));
    }
}
