// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Pluggable environment facts.
//!
//! Recognizers sometimes need facts the tree alone cannot answer: is this
//! type a value type, is that method compiler-synthesized, is this
//! expression statically an array. Resolution itself is out of scope here;
//! the facts arrive through the [`Environment`] trait, supplied by the
//! caller alongside the tree.
//!
//! [`DefaultEnvironment`] answers from compiler name-mangling conventions
//! alone, which is what real compiler output warrants; embedders with a
//! symbol table plug in their own implementation.

use resugar_tree::{Annotation, Arena, MemberRef, NodeId, NodeKind};

/// Static type classification needed by the indexed iteration shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticType {
    Array,
    String,
    Other,
}

/// Caller-supplied lookup for facts outside the tree.
pub trait Environment {
    /// Is the named type a value type? Drives the unconditional-dispose
    /// flavor of resource recovery.
    fn is_value_type(&self, ty: &str) -> bool;

    /// Was the named type synthesized by the compiler (capture holders,
    /// display classes, switch dictionaries)?
    fn is_compiler_generated_type(&self, ty: &str) -> bool;

    /// Was the method synthesized by the compiler (lambda bodies)?
    fn is_compiler_generated_method(&self, method: &MemberRef) -> bool;

    /// Static type of an expression, as far as the embedder knows.
    fn static_type(&self, arena: &Arena, expr: NodeId) -> StaticType;

    /// Does the named type declare the named field? Closure elimination
    /// refuses holders whose field records are missing.
    fn declares_field(&self, ty: &str, field: &str) -> bool;
}

/// Name-mangling-based environment, sufficient for real compiler output.
///
/// Compiler-synthesized identifiers carry characters no source identifier
/// may contain (`<`, `>`, `$`) or the legacy `CS$` prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEnvironment;

pub(crate) fn is_mangled(name: &str) -> bool {
    name.contains('<') || name.contains('$') || name.starts_with("__")
}

impl Environment for DefaultEnvironment {
    fn is_value_type(&self, _ty: &str) -> bool {
        false
    }

    fn is_compiler_generated_type(&self, ty: &str) -> bool {
        is_mangled(ty)
    }

    fn is_compiler_generated_method(&self, method: &MemberRef) -> bool {
        is_mangled(&method.name) || is_mangled(&method.declaring_type)
    }

    fn static_type(&self, arena: &Arena, expr: NodeId) -> StaticType {
        // Without a symbol table, fall back to type annotations put on the
        // expression by the upstream builder.
        for annotation in arena.annotations(expr) {
            if let Annotation::Type(ty) = annotation {
                if ty.ends_with("[]") {
                    return StaticType::Array;
                }
                if ty == "string" || ty == "String" {
                    return StaticType::String;
                }
            }
        }
        if let NodeKind::Literal {
            value: resugar_tree::Literal::Str(_),
        } = arena.kind(expr)
        {
            return StaticType::String;
        }
        StaticType::Other
    }

    fn declares_field(&self, _ty: &str, _field: &str) -> bool {
        true
    }
}
