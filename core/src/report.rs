//! Best-effort invocation of the external report builder.
//!
//! Runs `allure generate <results> --clean -o <report>` once the run's
//! attachments are final. The builder is an optional collaborator: every way
//! it can fail is logged and reported as `false`, never raised.

use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone)]
pub struct ReportBuilder {
    program: String,
    results_dir: PathBuf,
    report_dir: PathBuf,
}

impl ReportBuilder {
    pub fn new(results_dir: impl Into<PathBuf>, report_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: "allure".to_string(),
            results_dir: results_dir.into(),
            report_dir: report_dir.into(),
        }
    }

    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("generate")
            .arg(&self.results_dir)
            .arg("--clean")
            .arg("-o")
            .arg(&self.report_dir);
        command
    }

    /// Build the report. Returns whether a report was produced.
    pub fn build(&self) -> bool {
        let has_results = std::fs::read_dir(&self.results_dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        if !has_results {
            tracing::info!(results = %self.results_dir.display(), "no results to build a report from");
            return false;
        }

        match self.command().output() {
            Ok(output) if output.status.success() => {
                tracing::info!(report = %self.report_dir.display(), "report generated");
                true
            }
            Ok(output) => {
                tracing::error!(
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr),
                    "report generation failed"
                );
                false
            }
            Err(e) => {
                tracing::error!(
                    program = %self.program,
                    error = %e,
                    "report builder could not be started; is the allure CLI installed?"
                );
                false
            }
        }
    }
}
