//! Orchestration of the fetch and publish paths
//!
//! Items are processed strictly one after another. By default the first
//! failing item ends the run; in keep-going mode failures are collected into
//! the [`RunSummary`] and the run continues with the next item.

use std::time::{Duration, Instant};

use crate::errors::{AppError, Result};

pub mod fetch;
pub mod publish;

pub use fetch::{FetchPipeline, FetchSettings};
pub use publish::{PublishPipeline, PublishSettings};

/// How a run reacts to a failed item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureMode {
    /// Stop at the first failed item
    #[default]
    FailFast,
    /// Record the failure and continue with the next item
    KeepGoing,
}

impl FailureMode {
    pub fn from_keep_going(keep_going: bool) -> Self {
        if keep_going {
            FailureMode::KeepGoing
        } else {
            FailureMode::FailFast
        }
    }
}

/// An item that failed during a keep-going run
#[derive(Debug)]
pub struct ItemFailure {
    pub dataset: String,
    pub item: String,
    pub error: AppError,
}

/// Outcome of a fetch or publish run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Items the run was asked to process
    pub total: usize,
    /// `dataset/item` labels that completed
    pub completed: Vec<String>,
    pub failures: Vec<ItemFailure>,
    pub bytes_transferred: u64,
    pub duration: Duration,
    /// Nothing was transferred; `completed` lists what would have been
    pub dry_run: bool,
}

impl RunSummary {
    pub(crate) fn new(total: usize, dry_run: bool) -> Self {
        Self {
            total,
            dry_run,
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    /// `Ok(self)` when every item succeeded, `RunFailed` otherwise
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(AppError::RunFailed {
                failed: self.failures.len(),
                total: self.total,
            })
        }
    }

    /// One-line report for the end of a run
    pub fn summary(&self) -> String {
        let verb = if self.dry_run { "planned" } else { "completed" };
        format!(
            "{}/{} items {}, {} failed, {:.1} MB in {:.1}s",
            self.completed.len(),
            self.total,
            verb,
            self.failures.len(),
            self.bytes_transferred as f64 / 1_000_000.0,
            self.duration.as_secs_f64()
        )
    }

    /// Record an item result, returning the error when the run must stop
    pub(crate) fn record(
        &mut self,
        mode: FailureMode,
        dataset: &str,
        item: &str,
        result: Result<u64>,
    ) -> Result<()> {
        match result {
            Ok(bytes) => {
                self.bytes_transferred += bytes;
                self.completed.push(format!("{}/{}", dataset, item));
                Ok(())
            }
            Err(error) => {
                let error = AppError::for_item(dataset, item, error);
                match mode {
                    FailureMode::FailFast => Err(error),
                    FailureMode::KeepGoing => {
                        tracing::error!(category = error.category(), "{}", error);
                        self.failures.push(ItemFailure {
                            dataset: dataset.to_string(),
                            item: item.to_string(),
                            error,
                        });
                        Ok(())
                    }
                }
            }
        }
    }

    pub(crate) fn finish(mut self, started: Instant) -> Self {
        self.duration = started.elapsed();
        tracing::info!("{}", self.summary());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ArchiveError;
    use std::path::PathBuf;

    fn failure() -> Result<u64> {
        Err(ArchiveError::Corrupt {
            path: PathBuf::from("seg1.zip"),
            reason: "bad header".to_string(),
        }
        .into())
    }

    #[test]
    fn test_fail_fast_returns_item_error() {
        let mut summary = RunSummary::new(2, false);
        summary
            .record(FailureMode::FailFast, "orex_bennu", "seg0", Ok(10))
            .unwrap();

        let err = summary
            .record(FailureMode::FailFast, "orex_bennu", "seg1", failure())
            .unwrap_err();
        assert!(err.to_string().starts_with("orex_bennu/seg1"));
        assert_eq!(summary.completed, vec!["orex_bennu/seg0"]);
        assert!(summary.failures.is_empty());
    }

    #[test]
    fn test_keep_going_collects_failures() {
        let mut summary = RunSummary::new(3, false);
        summary
            .record(FailureMode::KeepGoing, "orex_bennu", "seg1", failure())
            .unwrap();
        summary
            .record(FailureMode::KeepGoing, "orex_bennu", "seg2", Ok(5))
            .unwrap();

        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.bytes_transferred, 5);
        assert_eq!(summary.failures[0].item, "seg1");
        assert_eq!(summary.failures[0].error.category(), "archive");

        match summary.into_result() {
            Err(AppError::RunFailed { failed, total }) => {
                assert_eq!(failed, 1);
                assert_eq!(total, 3);
            }
            other => panic!("Expected RunFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_summary_line() {
        let mut summary = RunSummary::new(1, true);
        summary
            .record(FailureMode::FailFast, "dawn_vesta", "00000007", Ok(0))
            .unwrap();
        assert!(summary.summary().starts_with("1/1 items planned, 0 failed"));
        assert!(summary.into_result().is_ok());
    }
}
