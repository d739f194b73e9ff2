// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Error types for the pass pipeline.
//!
//! Only genuinely abnormal conditions are errors. A recognizer that does
//! not match, or whose legality check disproves safety, simply declines;
//! that is a normal return, not an error. Malformed input aborts a single
//! rewrite and is reported as a [`crate::diagnostics::Diagnostic`], leaving
//! the subtree unchanged.

use thiserror::Error;

/// Fatal conditions for one pipeline run.
#[derive(Debug, Error)]
pub enum PassError {
    /// The caller's cancellation token was observed. The run is abandoned;
    /// the caller owns the decision to discard the tree or retry from a
    /// checkpoint, since no rollback is provided.
    #[error("run cancelled")]
    Cancelled,

    /// `run` was called on a pipeline that is already running. The pipeline
    /// is reentrant per instance only across separate trees.
    #[error("pipeline is already running")]
    PipelineBusy,
}

/// Result type for pipeline operations.
pub type PassResult<T> = Result<T, PassError>;
