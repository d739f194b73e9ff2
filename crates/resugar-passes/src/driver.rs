// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The fixpoint pipeline driver.
//!
//! A [`Pipeline`] holds the recognizer catalogue for one configuration and
//! walks a tree in pre-order. At each node it offers the node to every
//! enabled node-scope recognizer (cheapest discriminant check first) and,
//! on a successful rewrite, re-offers the replacement at the same position
//! before advancing. The per-node fixpoint is bounded: recognizers make
//! monotonic progress, so exceeding the cap means a recognizer is cycling
//! and is reported as a driver diagnostic rather than looping forever.
//!
//! Block-scope recognizers (capture-holder elimination) are offered once
//! per block, after the block's statements have settled, so they see
//! delegate constructions already folded into lambdas.
//!
//! # Sections
//!
//! 1. [`PassConfig`]: per-recognizer enables
//! 2. [`RunReport`]: what a run did
//! 3. [`Pipeline`]: the `Idle -> Running -> Idle` state machine

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use resugar_tree::{Arena, NodeId, NodeKind};

use crate::context::{CancellationToken, PassContext};
use crate::diagnostics::Diagnostic;
use crate::env::Environment;
use crate::error::{PassError, PassResult};
use crate::recognizers::{catalogue, Recognizer, Rewrite, Scope};

// ======================================================================
// Configuration
// ======================================================================

/// Per-recognizer enable switches plus the per-node fixpoint bound.
///
/// Every recognizer can be toggled individually; whether to run at all is
/// the caller's decision, never inferred from the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PassConfig {
    pub delegates: bool,
    pub closures: bool,
    pub using: bool,
    pub lock: bool,
    pub foreach: bool,
    pub switch_on_string: bool,
    pub members: bool,
    pub cleanup: bool,
    /// Upper bound on rewrites at a single position before the driver
    /// reports non-convergence and moves on.
    pub fixpoint_cap: u32,
}

impl Default for PassConfig {
    fn default() -> Self {
        PassConfig {
            delegates: true,
            closures: true,
            using: true,
            lock: true,
            foreach: true,
            switch_on_string: true,
            members: true,
            cleanup: true,
            fixpoint_cap: 64,
        }
    }
}

// ======================================================================
// Run report
// ======================================================================

/// One successful rewrite, in application order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedRewrite {
    pub recognizer: String,
    /// The replacement node the rewrite produced.
    pub node: NodeId,
}

/// What one `run` did to one tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub applied: Vec<AppliedRewrite>,
    /// Variable names invented by recognizers (closure elimination).
    pub synthesized_names: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    /// True when the run left the tree exactly as it found it.
    pub fn unchanged(&self) -> bool {
        self.applied.is_empty()
    }
}

// ======================================================================
// Pipeline
// ======================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Running,
}

/// A reusable pipeline instance: `reset` installs a configuration, `run`
/// processes one tree to completion on the calling thread.
///
/// A pipeline may be reused across trees but never shared across
/// simultaneous runs; a nested or concurrent `run` on the same instance
/// fails with [`PassError::PipelineBusy`].
pub struct Pipeline {
    config: PassConfig,
    recognizers: Vec<Box<dyn Recognizer>>,
    state: State,
}

impl Pipeline {
    pub fn new(config: PassConfig) -> Self {
        let recognizers = catalogue(&config);
        Pipeline {
            config,
            recognizers,
            state: State::Idle,
        }
    }

    /// Install a new configuration and drop per-run caches.
    pub fn reset(&mut self, config: PassConfig) {
        self.recognizers = catalogue(&config);
        self.config = config;
        self.state = State::Idle;
    }

    pub fn config(&self) -> &PassConfig {
        &self.config
    }

    /// Process the subtree under `root` to a fixpoint.
    ///
    /// On cancellation the tree may hold any prefix of the rewrites already
    /// applied (each of which is individually complete); the caller discards
    /// it or retries from a checkpoint.
    pub fn run(
        &mut self,
        arena: &mut Arena,
        env: &dyn Environment,
        root: NodeId,
        cancel: CancellationToken,
    ) -> PassResult<RunReport> {
        if self.state == State::Running {
            return Err(PassError::PipelineBusy);
        }
        self.state = State::Running;
        let mut cx = PassContext::new(arena, env, cancel);
        let mut applied = Vec::new();
        let outcome = self.visit(&mut cx, root, &mut applied);
        self.state = State::Idle;
        outcome?;
        info!(
            rewrites = applied.len(),
            diagnostics = cx.diagnostics.len(),
            "pipeline run complete"
        );
        Ok(RunReport {
            applied,
            synthesized_names: cx.synthesized,
            diagnostics: cx.diagnostics,
        })
    }

    /// Stabilize `node`, then its children, then offer block-scope
    /// recognizers. Returns the node occupying the original position.
    fn visit(
        &self,
        cx: &mut PassContext<'_>,
        node: NodeId,
        applied: &mut Vec<AppliedRewrite>,
    ) -> PassResult<NodeId> {
        cx.cancel.checkpoint()?;

        let mut current = node;
        let mut spins = 0u32;
        'fixpoint: loop {
            for rec in &self.recognizers {
                if rec.scope() != Scope::Node || !rec.applies_to(cx.arena.kind(current)) {
                    continue;
                }
                if let Rewrite::Applied(next) = rec.try_rewrite(cx, current)? {
                    debug!(recognizer = rec.name(), node = %next, "rewrite applied");
                    applied.push(AppliedRewrite {
                        recognizer: rec.name().to_string(),
                        node: next,
                    });
                    current = next;
                    spins += 1;
                    if spins >= self.config.fixpoint_cap {
                        cx.diagnostics.push(Diagnostic::warning(
                            "driver",
                            format!("fixpoint cap of {} reached", self.config.fixpoint_cap),
                            Some(current),
                        ));
                        break 'fixpoint;
                    }
                    continue 'fixpoint;
                }
            }
            break;
        }

        // Children next. Statement-consuming rewrites (acquisition before a
        // try, a lock's flag declaration) shift earlier siblings out, so the
        // child list is re-read and re-positioned every step instead of
        // iterated.
        let mut index = 0;
        loop {
            let Some(child) = cx.arena.children(current).get(index).map(|c| c.id) else {
                break;
            };
            let settled = self.visit(cx, child, applied)?;
            index = cx
                .arena
                .children(current)
                .iter()
                .position(|c| c.id == settled)
                .map_or(index + 1, |pos| pos + 1);
        }

        // Whole-scope recognizers see the settled block. Re-offer while they
        // keep applying; a block with several capture holders takes one
        // application each.
        if matches!(cx.arena.kind(current), NodeKind::Block) {
            for rec in &self.recognizers {
                if rec.scope() != Scope::Block {
                    continue;
                }
                let mut spins = 0u32;
                while let Rewrite::Applied(next) = rec.try_rewrite(cx, current)? {
                    debug!(recognizer = rec.name(), node = %next, "block rewrite applied");
                    applied.push(AppliedRewrite {
                        recognizer: rec.name().to_string(),
                        node: next,
                    });
                    spins += 1;
                    if spins >= self.config.fixpoint_cap {
                        cx.diagnostics.push(Diagnostic::warning(
                            "driver",
                            format!("fixpoint cap of {} reached", self.config.fixpoint_cap),
                            Some(current),
                        ));
                        break;
                    }
                }
            }
        }

        Ok(current)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::new(PassConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::DefaultEnvironment;
    use resugar_tree::{build, BinaryOperator};

    fn lowered_using(arena: &mut Arena) -> (NodeId, NodeId) {
        // r = acquire(); try { r.Use(); } finally { if (r != null) r.Dispose(); }
        let acquire = build::ident(arena, "acquire");
        let call = build::invoke(arena, acquire, vec![]);
        let acq = build::var_decl(arena, "r", None, Some(call));
        let r = build::ident(arena, "r");
        let use_call = build::call_method(arena, r, "Use", vec![]);
        let use_stmt = build::expr_stmt(arena, use_call);
        let body = build::block(arena, vec![use_stmt]);
        let r = build::ident(arena, "r");
        let null = build::lit_null(arena);
        let cond = build::binop(arena, BinaryOperator::Ne, r, null);
        let r = build::ident(arena, "r");
        let dispose = build::call_method(arena, r, "Dispose", vec![]);
        let dispose_stmt = build::expr_stmt(arena, dispose);
        let guard = build::if_stmt(arena, cond, dispose_stmt, None);
        let fin = build::block(arena, vec![guard]);
        let try_stmt = build::try_finally(arena, body, fin);
        let root = build::block(arena, vec![acq, try_stmt]);
        (root, try_stmt)
    }

    #[test]
    fn run_rewrites_and_reports() {
        let mut arena = Arena::new();
        let (root, _) = lowered_using(&mut arena);
        let mut pipeline = Pipeline::default();
        let env = DefaultEnvironment;
        let report = pipeline
            .run(&mut arena, &env, root, CancellationToken::new())
            .unwrap();
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.applied[0].recognizer, "using");
        assert!(matches!(
            arena.kind(report.applied[0].node),
            NodeKind::Using
        ));
    }

    #[test]
    fn second_run_is_a_no_op() {
        let mut arena = Arena::new();
        let (root, _) = lowered_using(&mut arena);
        let mut pipeline = Pipeline::default();
        let env = DefaultEnvironment;
        pipeline
            .run(&mut arena, &env, root, CancellationToken::new())
            .unwrap();
        let report = pipeline
            .run(&mut arena, &env, root, CancellationToken::new())
            .unwrap();
        assert!(report.unchanged());
    }

    #[test]
    fn disabled_recognizer_is_skipped() {
        let mut arena = Arena::new();
        let (root, try_stmt) = lowered_using(&mut arena);
        let mut pipeline = Pipeline::new(PassConfig {
            using: false,
            ..PassConfig::default()
        });
        let env = DefaultEnvironment;
        let report = pipeline
            .run(&mut arena, &env, root, CancellationToken::new())
            .unwrap();
        assert!(report.unchanged());
        assert!(matches!(arena.kind(try_stmt), NodeKind::Try));
    }

    #[test]
    fn cancelled_run_unwinds_and_pipeline_recovers() {
        let mut arena = Arena::new();
        let (root, _) = lowered_using(&mut arena);
        let mut pipeline = Pipeline::default();
        let env = DefaultEnvironment;
        let token = CancellationToken::new();
        token.cancel();
        let err = pipeline.run(&mut arena, &env, root, token).unwrap_err();
        assert!(matches!(err, PassError::Cancelled));
        // The instance is reusable afterwards.
        let report = pipeline
            .run(&mut arena, &env, root, CancellationToken::new())
            .unwrap();
        assert_eq!(report.applied.len(), 1);
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = PassConfig {
            foreach: false,
            fixpoint_cap: 8,
            ..PassConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: PassConfig = serde_json::from_str(&json).unwrap();
        assert!(!back.foreach);
        assert!(back.using);
        assert_eq!(back.fixpoint_cap, 8);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let back: PassConfig = serde_json::from_str(r#"{"lock": false}"#).unwrap();
        assert!(!back.lock);
        assert!(back.closures);
        assert_eq!(back.fixpoint_cap, 64);
    }
}
