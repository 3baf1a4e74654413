use crate::engine::CheckResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;
use std::str::FromStr;

/// How a cycle's results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `<owner> | <message>` per line, with ` (<value>)` appended when present.
    #[default]
    Text,
    /// `{"checked_at": ..., "results": [...]}` per cycle.
    Json,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown output format '{0}' (expected text or json)")]
pub struct ParseFormatError(String);

impl FromStr for OutputFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ParseFormatError(s.to_string())),
        }
    }
}

#[derive(Serialize)]
struct CycleReport<'a> {
    checked_at: DateTime<Utc>,
    results: &'a [CheckResult],
}

/// Renders one cycle. Text output for an empty result list is empty.
pub fn render(
    format: OutputFormat,
    results: &[CheckResult],
    checked_at: DateTime<Utc>,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(render_text(results)),
        OutputFormat::Json => {
            let mut out = serde_json::to_string(&CycleReport {
                checked_at,
                results,
            })?;
            out.push('\n');
            Ok(out)
        }
    }
}

fn render_text(results: &[CheckResult]) -> String {
    let mut out = String::new();
    for result in results {
        let _ = write!(out, "{} | {}", result.owner, result.message);
        if let Some(value) = result.value {
            let _ = write!(out, " ({value})");
        }
        out.push('\n');
    }
    out
}
