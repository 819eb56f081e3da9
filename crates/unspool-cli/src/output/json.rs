//! JSON output formatter for machine-readable results.
//!
//! Every record is written as a single line so a long-running watcher
//! produces a JSON-lines stream.

use std::io::Write;
use std::io::{self};
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use unspool_core::DispatchOutcome;
use unspool_core::DispatchResult;
use unspool_core::Disposal;

use super::formatter::JsonOutput;
use super::formatter::OutputFormatter;
use super::formatter::disposal_label;
use super::formatter::outcome_label;

pub struct JsonFormatter;

#[derive(Debug, Serialize)]
struct FailureData {
    path: String,
    reason: String,
}

#[derive(Debug, Default, Serialize)]
struct ReportData {
    files_extracted: usize,
    directories_created: usize,
    nested_archives: usize,
    bytes_written: u64,
    entries_skipped: usize,
    duration_ms: u128,
    failures: Vec<FailureData>,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct DispatchData {
    source: String,
    format: &'static str,
    outcome: &'static str,
    disposal: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    moved_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quarantined_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<ReportData>,
}

#[derive(Debug, Serialize)]
struct WatchData {
    inbox: String,
    output: String,
}

#[derive(Debug, Serialize)]
struct PathData {
    path: String,
}

#[derive(Debug, Serialize)]
struct MessageData {
    message: String,
}

impl JsonFormatter {
    fn output<T: Serialize>(value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        writeln!(io::stdout(), "{json}")?;
        Ok(())
    }

    fn dispatch_record(result: &DispatchResult) -> JsonOutput<DispatchData> {
        let report = match &result.outcome {
            DispatchOutcome::Extracted(report) => Some(ReportData {
                files_extracted: report.files_extracted,
                directories_created: report.directories_created,
                nested_archives: report.nested_archives,
                bytes_written: report.bytes_written,
                entries_skipped: report.entries_skipped,
                duration_ms: report.duration.as_millis(),
                failures: report
                    .failures
                    .iter()
                    .map(|f| FailureData {
                        path: f.path.display().to_string(),
                        reason: f.reason.clone(),
                    })
                    .collect(),
                warnings: report.warnings.clone(),
            }),
            _ => None,
        };
        let moved_to = match &result.outcome {
            DispatchOutcome::Moved(to) => Some(to.display().to_string()),
            _ => None,
        };
        let quarantined_at = match &result.disposal {
            Disposal::Quarantined(to) => Some(to.display().to_string()),
            _ => None,
        };

        let data = DispatchData {
            source: result.source.display().to_string(),
            format: result.format.name(),
            outcome: outcome_label(&result.outcome),
            disposal: disposal_label(&result.disposal),
            moved_to,
            quarantined_at,
            report,
        };

        match &result.outcome {
            DispatchOutcome::Failed(err) => JsonOutput::failure("dispatch", data, err.to_string()),
            DispatchOutcome::Rejected => {
                JsonOutput::failure("dispatch", data, "unsupported format")
            }
            DispatchOutcome::Extracted(_) | DispatchOutcome::Moved(_) => {
                JsonOutput::success("dispatch", data)
            }
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_processing(&self, path: &Path) {
        let output = JsonOutput::success(
            "processing",
            PathData {
                path: path.display().to_string(),
            },
        );
        let _ = Self::output(&output);
    }

    fn format_dispatch_result(&self, result: &DispatchResult) -> Result<()> {
        Self::output(&Self::dispatch_record(result))
    }

    fn format_watching(&self, inbox: &Path, output: &Path) {
        let output = JsonOutput::success(
            "watch",
            WatchData {
                inbox: inbox.display().to_string(),
                output: output.display().to_string(),
            },
        );
        let _ = Self::output(&output);
    }

    fn format_error(&self, error: &anyhow::Error) {
        let output = JsonOutput::<()>::error("unknown", format!("{error:?}"));
        let _ = Self::output(&output);
    }

    fn format_warning(&self, message: &str) {
        let output = JsonOutput::success(
            "warning",
            MessageData {
                message: message.to_string(),
            },
        );
        let _ = Self::output(&output);
    }
}
