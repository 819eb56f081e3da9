//! Output formatter trait for CLI results.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use unspool_core::DispatchOutcome;
use unspool_core::DispatchResult;
use unspool_core::Disposal;

/// Common output formatter trait
pub trait OutputFormatter {
    /// Announce that a file is about to be dispatched
    fn format_processing(&self, path: &Path);

    /// Format the result of one dispatch
    fn format_dispatch_result(&self, result: &DispatchResult) -> Result<()>;

    /// Announce that the watcher is running
    fn format_watching(&self, inbox: &Path, output: &Path);

    /// Format error message
    fn format_error(&self, error: &anyhow::Error);

    /// Format warning message
    fn format_warning(&self, message: &str);
}

/// Generic JSON output structure
#[derive(Debug, Serialize)]
pub struct JsonOutput<T> {
    pub operation: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn success(operation: impl Into<String>, data: T) -> Self {
        Self {
            operation: operation.into(),
            status: Status::Success,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(operation: impl Into<String>, data: T, error: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            status: Status::Error,
            data: Some(data),
            error: Some(error.into()),
        }
    }
}

impl JsonOutput<()> {
    pub fn error(operation: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            status: Status::Error,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Short label for an outcome, shared by both formatters.
pub fn outcome_label(outcome: &DispatchOutcome) -> &'static str {
    match outcome {
        DispatchOutcome::Extracted(_) => "extracted",
        DispatchOutcome::Moved(_) => "moved",
        DispatchOutcome::Rejected => "rejected",
        DispatchOutcome::Failed(_) => "failed",
    }
}

/// Short label for a disposal, shared by both formatters.
pub fn disposal_label(disposal: &Disposal) -> &'static str {
    match disposal {
        Disposal::Removed => "removed",
        Disposal::Quarantined(_) => "quarantined",
        Disposal::Consumed => "moved",
        Disposal::Vanished => "vanished",
        Disposal::Kept(_) => "kept",
    }
}
