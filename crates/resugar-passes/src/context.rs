// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Per-run mutable state passed into every recognizer call.
//!
//! The pipeline is single-threaded and synchronous; a [`PassContext`] lives
//! for one `run` over one tree. Everything a recognizer might be tempted to
//! keep in ambient state (used-name tracking, diagnostics, the record of
//! synthesized variables) is an explicit field here instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use resugar_tree::Arena;

use crate::diagnostics::Diagnostic;
use crate::env::Environment;
use crate::error::{PassError, PassResult};
use crate::names::NameTracker;

/// Cooperative, advisory cancellation signal.
///
/// Long-running work (the dataflow analysis, the driver's traversal) polls
/// the token and unwinds with [`PassError::Cancelled`]. A cancellation is
/// fatal for the run; the caller discards the tree or retries from a
/// checkpoint.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    /// Request cancellation. Observed at the next poll point.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Poll point: error out if cancellation was requested.
    pub fn checkpoint(&self) -> PassResult<()> {
        if self.is_cancelled() {
            Err(PassError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Mutable state for one pipeline run over one tree.
pub struct PassContext<'a> {
    pub arena: &'a mut Arena,
    pub env: &'a dyn Environment,
    pub cancel: CancellationToken,
    pub names: NameTracker,
    /// Malformed-input reports accumulated during the run.
    pub diagnostics: Vec<Diagnostic>,
    /// Variable names synthesized by recognizers (for caller diagnostics).
    pub synthesized: Vec<String>,
}

impl<'a> PassContext<'a> {
    pub fn new(
        arena: &'a mut Arena,
        env: &'a dyn Environment,
        cancel: CancellationToken,
    ) -> Self {
        PassContext {
            arena,
            env,
            cancel,
            names: NameTracker::new(),
            diagnostics: Vec::new(),
            synthesized: Vec::new(),
        }
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn record_synthesized(&mut self, name: &str) {
        self.synthesized.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_clear_and_latches() {
        let token = CancellationToken::new();
        assert!(token.checkpoint().is_ok());
        token.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.checkpoint(), Err(PassError::Cancelled)));
    }

    #[test]
    fn clones_share_the_flag() {
        let token = CancellationToken::new();
        let observer = token.clone();
        token.cancel();
        assert!(observer.is_cancelled());
    }
}
