// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Idiom-recovery passes over lowered syntax trees.
//!
//! Given a tree that mirrors bytecode one statement at a time (explicit
//! enumerators, explicit try/finally resource handling, dictionary-based
//! string switches, capture-holder classes), the pipeline rewrites it into
//! the constructs a programmer would have written, while conserving the
//! instruction-range provenance side-table:
//!
//! - [`analysis`]: the liveness analysis legality checks rest on
//! - [`recognizers`]: one rewrite rule per recovered construct
//! - [`Pipeline`] / [`PassConfig`]: the fixpoint driver and its
//!   per-recognizer switches
//! - [`Environment`]: caller-supplied semantic answers (value types,
//!   compiler-generated names, static types, field records)
//!
//! A run is single-threaded and synchronous; cancellation is cooperative
//! through [`CancellationToken`].

pub mod analysis;
mod context;
mod diagnostics;
mod driver;
mod env;
mod error;
mod names;
pub mod recognizers;

pub use context::{CancellationToken, PassContext};
pub use diagnostics::{Diagnostic, Severity};
pub use driver::{AppliedRewrite, PassConfig, Pipeline, RunReport};
pub use env::{DefaultEnvironment, Environment, StaticType};
pub use error::{PassError, PassResult};
pub use names::{rename_identifiers, NameTracker};
