// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Idiom recovery for statement-granular syntax trees.
//!
//! `resugar` takes a tree that mirrors a program's intermediate
//! representation one statement at a time and rewrites it, pass by pass,
//! into the constructs the programmer originally wrote: `foreach` loops
//! from explicit enumerators, `using` and `lock` from try/finally
//! skeletons, string switches from dictionary dispatch, lambdas from
//! delegate constructions, locals from capture-holder fields, and
//! auto-properties from trivial accessor bodies. Every rewrite conserves
//! the instruction-range provenance side-table, so surviving source
//! structure still maps back to the ranges it came from.
//!
//! The workspace splits into three layers, re-exported here:
//!
//! - [`tree`]: the arena-backed syntax tree, role-tagged child slots, and
//!   the provenance side-table
//! - [`pattern`]: the structural matcher (wildcards, captures, choice,
//!   repetition, backreferences)
//! - [`passes`]: liveness analysis, the recognizer catalogue, and the
//!   fixpoint pipeline driver
//!
//! # Example
//!
//! ```
//! use resugar::{CancellationToken, DefaultEnvironment, Pipeline};
//! use resugar::tree::{build, Arena};
//!
//! let mut arena = Arena::new();
//! let stmts = vec![];
//! let root = build::block(&mut arena, stmts);
//!
//! let mut pipeline = Pipeline::default();
//! let env = DefaultEnvironment;
//! let report = pipeline
//!     .run(&mut arena, &env, root, CancellationToken::new())
//!     .unwrap();
//! assert!(report.unchanged());
//! ```

pub use resugar_match as pattern;
pub use resugar_passes as passes;
pub use resugar_tree as tree;

pub use resugar_passes::{
    AppliedRewrite, CancellationToken, DefaultEnvironment, Diagnostic, Environment, PassConfig,
    PassError, PassResult, Pipeline, RunReport, Severity, StaticType,
};
pub use resugar_tree::{Arena, NodeId, NodeKind, Role};
