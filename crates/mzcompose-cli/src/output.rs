//! Formatted output helpers for CLI commands.
//!
//! Provides aligned two-column listings, test summaries, and error
//! rendering with remediation hints.

use std::fmt::Write as _;

use mzcompose_common::constants::BIN_NAME;
use mzcompose_common::error::ComposeError;
use mzcompose_runtime::TestSummary;

/// Renders a top-level error, its causes, and the hint of the first
/// [`ComposeError`] in the chain.
#[must_use]
pub fn render_error(err: &anyhow::Error) -> String {
    let mut out = format!("{BIN_NAME}: error: {err:#}");
    let hint = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<ComposeError>())
        .and_then(ComposeError::hint);
    if let Some(hint) = hint {
        let _ = write!(out, "\n{BIN_NAME}: hint: {hint}");
    }
    out
}

/// Formats `(name, description)` rows with the descriptions aligned.
#[must_use]
pub fn format_listing<'a>(rows: impl IntoIterator<Item = (&'a str, Option<&'a str>)>) -> String {
    let rows: Vec<_> = rows.into_iter().collect();
    let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (name, description) in rows {
        match description {
            Some(text) if !text.is_empty() => {
                let first_line = text.lines().next().unwrap_or_default();
                let _ = writeln!(out, "{name:<width$}  {first_line}");
            }
            _ => {
                let _ = writeln!(out, "{name}");
            }
        }
    }
    out
}

/// Formats one line per test case followed by a tally.
#[must_use]
pub fn format_summary(summary: &TestSummary) -> String {
    let mut out = String::new();
    let width = summary
        .cases
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(0);
    for case in &summary.cases {
        let status = case
            .error
            .as_deref()
            .map_or_else(|| "ok".to_string(), |e| format!("FAILED: {e}"));
        let _ = writeln!(
            out,
            "{:<width$}  {:>8.2}s  {status}",
            case.name, case.duration_secs
        );
    }
    let _ = write!(
        out,
        "{}: {} passed, {} failed",
        summary.composition, summary.passed, summary.failed
    );
    out
}

#[cfg(test)]
mod tests {
    use mzcompose_runtime::composition::TestCaseReport;

    use super::*;

    #[test]
    fn render_error_appends_hint() {
        let err = anyhow::Error::new(ComposeError::UnknownComposition {
            name: "kafka".into(),
        });
        let text = render_error(&err);
        assert!(text.starts_with("mzcompose: error: unknown composition \"kafka\""));
        assert!(text.contains("\nmzcompose: hint: "));
    }

    #[test]
    fn render_error_finds_hint_through_context() {
        let err = anyhow::Error::new(ComposeError::PortNotExposed {
            service: "postgres".into(),
            port: "5432".into(),
        })
        .context("resolving port");
        let text = render_error(&err);
        assert!(text.contains("resolving port: service \"postgres\""), "got: {text}");
        assert!(text.ends_with("hint: is the service running?"));
    }

    #[test]
    fn render_error_without_hint() {
        let text = render_error(&anyhow::anyhow!("plain failure"));
        assert_eq!(text, "mzcompose: error: plain failure");
    }

    #[test]
    fn listing_aligns_descriptions() {
        let text = format_listing([
            ("default", Some("Run everything.\nMore detail.")),
            ("upgrade-matrix", Some("Test upgrades.")),
            ("bare", None),
        ]);
        assert_eq!(
            text,
            "default         Run everything.\nupgrade-matrix  Test upgrades.\nbare\n"
        );
    }

    #[test]
    fn summary_lists_failures() {
        let summary = TestSummary {
            composition: "kafka".into(),
            passed: 1,
            failed: 1,
            cases: vec![
                TestCaseReport {
                    name: "ingest".into(),
                    duration_secs: 1.5,
                    error: None,
                },
                TestCaseReport {
                    name: "upsert".into(),
                    duration_secs: 0.25,
                    error: Some("panicked: boom".into()),
                },
            ],
        };
        let text = format_summary(&summary);
        assert!(text.contains("ingest      1.50s  ok"), "got: {text}");
        assert!(text.contains("upsert      0.25s  FAILED: panicked: boom"), "got: {text}");
        assert!(text.ends_with("kafka: 1 passed, 1 failed"));
    }
}
