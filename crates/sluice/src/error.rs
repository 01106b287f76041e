//! Error types for the pipeline.
//!
//! Two layers of errors exist:
//!
//! - [`StageError`]: the error *event* a stage emits on its private error
//!   stream. It travels through the fan-in and is what the orchestrator
//!   reports.
//! - [`Error`]: the crate-level error returned from constructors and from
//!   [`Outcome::into_result`](crate::Outcome::into_result).
//!
//! [`PersistError`] is what a [`Store`](crate::Store) hands back to the sink
//! when it cannot persist an item.

use crate::Item;
use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for building and running a pipeline.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The pipeline configuration was rejected before any task was spawned.
    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// A stage failed and the pipeline was cancelled because of it.
    #[error("Pipeline failed: {0}")]
    Stage(#[from] StageError),

    /// The upstream cancellation token fired before the pipeline finished.
    #[error("Pipeline interrupted")]
    Interrupted,
}

/// Identifies the stage an error event originated from.
///
/// The source is infallible and has no error stream, so it has no variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    Transform,
    Sink,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transform => write!(f, "transform"),
            Self::Sink => write!(f, "sink"),
        }
    }
}

/// A single fatal failure reported by a stage.
///
/// A stage emits at most one of these and then stops producing output.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[error("{stage} error: {cause}")]
pub struct StageError {
    pub stage: StageKind,
    /// The item that caused the failure, when there is one.
    pub item: Option<Item>,
    pub cause: String,
}

impl StageError {
    pub fn new(stage: StageKind, item: Option<Item>, cause: impl Into<String>) -> Self {
        Self {
            stage,
            item,
            cause: cause.into(),
        }
    }
}

/// Failure returned by a [`Store`](crate::Store).
#[derive(thiserror::Error, Debug)]
pub enum PersistError {
    /// The store refused the item.
    #[error("store rejected {item}: {reason}")]
    Rejected { item: Item, reason: String },

    /// Writing the record failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_error_names_stage_and_cause() {
        let err = StageError::new(StageKind::Transform, Some(6), "number 6 is invalid");
        assert_eq!(err.to_string(), "transform error: number 6 is invalid");
        assert_eq!(err.item, Some(6));
    }

    #[test]
    fn only_fallible_stages_have_a_kind() {
        let names: Vec<_> = [StageKind::Transform, StageKind::Sink]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, ["transform", "sink"]);
    }

    #[test]
    fn stage_error_converts_into_crate_error() {
        let err: Error = StageError::new(StageKind::Sink, None, "disk full").into();
        assert_eq!(err.to_string(), "Pipeline failed: sink error: disk full");
    }

    #[test]
    fn persist_error_display() {
        let err = PersistError::Rejected {
            item: 4,
            reason: "read-only".to_string(),
        };
        assert_eq!(err.to_string(), "store rejected 4: read-only");
    }
}
