//! Human-readable output formatter with colors and styling.

use std::path::Path;

use anyhow::Result;
use console::Term;
use console::style;
use unspool_core::DispatchOutcome;
use unspool_core::DispatchResult;
use unspool_core::Disposal;
use unspool_core::ExtractionReport;

use super::formatter::OutputFormatter;

pub struct HumanFormatter {
    verbose: bool,
    quiet: bool,
    term: Term,
    err_term: Term,
}

impl HumanFormatter {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            term: Term::stdout(),
            err_term: Term::stderr(),
        }
    }

    fn line(&self, text: &str) {
        let _ = self.term.write_line(text);
    }

    #[allow(clippy::cast_precision_loss)]
    fn format_size(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.1} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.1} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.1} KB", bytes as f64 / KB as f64)
        } else {
            format!("{bytes} B")
        }
    }

    fn format_number(n: usize) -> String {
        let s = n.to_string();
        let mut result = String::new();
        let mut count = 0;

        for c in s.chars().rev() {
            if count == 3 {
                result.push(',');
                count = 0;
            }
            result.push(c);
            count += 1;
        }

        result.chars().rev().collect()
    }

    fn report_summary(report: &ExtractionReport) -> String {
        let mut summary = format!(
            "{} files, {} directories, {}",
            Self::format_number(report.files_extracted),
            Self::format_number(report.directories_created),
            Self::format_size(report.bytes_written)
        );
        if report.nested_archives > 0 {
            summary.push_str(&format!(", {} nested", report.nested_archives));
        }
        summary
    }

    fn report_details(&self, report: &ExtractionReport) {
        for failure in &report.failures {
            self.line(&format!(
                "    {} {}: {}",
                style("!").red(),
                failure.path.display(),
                failure.reason
            ));
        }
        if self.verbose {
            for warning in &report.warnings {
                self.line(&format!("    {} {warning}", style("~").yellow()));
            }
            self.line(&format!("    Duration: {:?}", report.duration));
        }
    }

    fn disposal_note(disposal: &Disposal) -> Option<String> {
        match disposal {
            Disposal::Quarantined(to) => Some(format!("input quarantined at {}", to.display())),
            Disposal::Kept(reason) => Some(format!("input left in place: {reason}")),
            Disposal::Removed | Disposal::Consumed | Disposal::Vanished => None,
        }
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_processing(&self, path: &Path) {
        if self.quiet {
            return;
        }
        self.line(&format!(
            "{} Processing: {}",
            style("[+]").green().bold(),
            path.display()
        ));
    }

    fn format_dispatch_result(&self, result: &DispatchResult) -> Result<()> {
        let failed = !result.outcome.is_success();
        if self.quiet && !failed {
            return Ok(());
        }

        match &result.outcome {
            DispatchOutcome::Extracted(report) => {
                let marker = if report.has_failures() {
                    style("[-]").yellow()
                } else {
                    style("[-]").blue()
                };
                self.line(&format!(
                    "{marker} Extracted successfully ({}; {})",
                    result.format,
                    Self::report_summary(report)
                ));
                self.report_details(report);
            }
            DispatchOutcome::Moved(to) => {
                self.line(&format!(
                    "{} Moved successfully -> {}",
                    style("[-]").blue(),
                    to.display()
                ));
            }
            DispatchOutcome::Rejected => {
                self.line(&format!(
                    "{} Invalid format: {}",
                    style("[-]").red(),
                    result.source.display()
                ));
            }
            DispatchOutcome::Failed(err) => {
                self.line(&format!(
                    "{} Failed ({}): {err}",
                    style("[-]").red().bold(),
                    result.format
                ));
            }
        }

        if let Some(note) = Self::disposal_note(&result.disposal) {
            self.line(&format!("    {note}"));
        }
        Ok(())
    }

    fn format_watching(&self, inbox: &Path, output: &Path) {
        if self.quiet {
            return;
        }
        self.line(&format!(
            "{} Watching {} -> {}",
            style("[+]").yellow().bold(),
            inbox.display(),
            output.display()
        ));
    }

    fn format_error(&self, error: &anyhow::Error) {
        let _ = self
            .err_term
            .write_line(&format!("{} {error:?}", style("Error:").red().bold()));
    }

    fn format_warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let _ = self
            .err_term
            .write_line(&format!("{} {message}", style("Warning:").yellow().bold()));
    }
}
