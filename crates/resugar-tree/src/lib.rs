// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Mutable syntax tree for idiom-recovery passes.
//!
//! This crate owns the tree representation the rewrite engine operates on:
//!
//! - [`Arena`] / [`NodeId`]: arena-backed nodes with stable indices,
//!   parent/child/sibling navigation, and detach/replace/insert surgery
//! - [`NodeKind`] / [`Role`]: the closed statement/expression/declaration
//!   vocabulary and role-tagged child slots
//! - [`ProvenanceSet`] / [`IlRange`]: the instruction-range side-table that
//!   every rewrite must conserve
//! - [`build`]: construction helpers used by the upstream builder and tests
//!
//! The crate performs no parsing, no rendering, and no resolution; trees
//! arrive pre-built and pre-annotated and leave restructured in place.

mod arena;
pub mod build;
mod kind;
mod provenance;

pub use arena::{Arena, Child, NodeId};
pub use kind::{
    AccessorKind, Annotation, BinaryOperator, Literal, MemberRef, NodeKind, Role, UnaryOperator,
};
pub use provenance::{IlRange, ProvenanceSet};
