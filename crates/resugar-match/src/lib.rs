// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Structural pattern matching over `resugar-tree` syntax trees.
//!
//! The engine is deliberately small: a [`Pattern`] template is walked
//! against a concrete node, and the only outputs are success-with-captures
//! or failure. Templates support wildcards ([`Pattern::Any`]), named
//! captures, ordered alternation ([`Pattern::Choice`]), bounded greedy
//! repetition ([`Pattern::Repeat`]), and structural backreferences
//! ([`Pattern::Backref`]). The matcher never mutates the tree and commits
//! greedily — see the crate tests for the pinned no-backtracking behavior.

mod matcher;
pub mod pat;
mod pattern;

pub use matcher::{match_absent, match_node};
pub use pattern::{Captures, Pattern, Shape};
