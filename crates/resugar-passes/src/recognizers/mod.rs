// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The recognizer catalogue.
//!
//! Each recognizer is one structural rewrite rule: a pattern (or small
//! cascade of patterns), a legality check, and a tree-surgery procedure
//! that builds the replacement construct with provenance carried over.
//! A recognizer either fully applies or declines without touching the
//! tree; declining is silent and expected.
//!
//! # Sections
//!
//! 1. [`Recognizer`] trait and the [`Rewrite`] outcome
//! 2. Catalogue construction in pipeline order

use resugar_tree::{NodeId, NodeKind};

use crate::context::PassContext;
use crate::driver::PassConfig;
use crate::error::PassResult;

mod cleanup;
mod closures;
mod delegates;
mod foreach;
mod lock;
mod members;
mod switch_string;
mod using;

// ======================================================================
// Recognizer trait
// ======================================================================

/// Where the driver offers a recognizer its candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Offered every node whose discriminant passes `applies_to`.
    Node,
    /// Offered once per block; the recognizer scans the block's statements
    /// itself (needed when the rewrite spans sibling statements with
    /// whole-scope context, like capture-holder elimination).
    Block,
}

/// Outcome of one rewrite offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rewrite {
    /// The tree changed; the id is the replacement node to re-offer.
    Applied(NodeId),
    /// No match, or the legality check failed. The tree is untouched.
    Declined,
}

pub trait Recognizer {
    fn name(&self) -> &'static str;

    fn scope(&self) -> Scope {
        Scope::Node
    }

    /// Cheap discriminant check run before the full pattern match.
    fn applies_to(&self, kind: &NodeKind) -> bool;

    /// Attempt the rewrite at `node`. Either fully applies or declines;
    /// never leaves the tree in an intermediate state. Errors only on
    /// cancellation.
    fn try_rewrite(&self, cx: &mut PassContext<'_>, node: NodeId) -> PassResult<Rewrite>;
}

// ======================================================================
// Catalogue
// ======================================================================

/// The enabled recognizers in pipeline order.
///
/// Order is load-bearing: delegate folding must precede capture-holder
/// elimination (inlined bodies are scanned for holder uses), lock recovery
/// must precede try/finally flattening, and using recovery must precede the
/// generic foreach shape, which matches over a recovered `using`.
pub fn catalogue(config: &PassConfig) -> Vec<Box<dyn Recognizer>> {
    let mut set: Vec<Box<dyn Recognizer>> = Vec::new();
    if config.delegates {
        set.push(Box::new(delegates::DelegateConstruction));
    }
    if config.closures {
        set.push(Box::new(closures::CaptureHolderElimination));
    }
    if config.using {
        set.push(Box::new(using::UsingRecovery));
    }
    if config.lock {
        set.push(Box::new(lock::LockRecovery));
    }
    if config.foreach {
        set.push(Box::new(foreach::ForeachRecovery));
    }
    if config.switch_on_string {
        set.push(Box::new(switch_string::SwitchOnStringRecovery));
    }
    if config.members {
        set.push(Box::new(members::AutoProperty));
        set.push(Box::new(members::AutoEvent));
        set.push(Box::new(members::Destructor));
        set.push(Box::new(members::DecimalConstant));
    }
    if config.cleanup {
        set.push(Box::new(cleanup::FlattenNestedTry));
        set.push(Box::new(cleanup::FlattenElseIf));
    }
    set
}
