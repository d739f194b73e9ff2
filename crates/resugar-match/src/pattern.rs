// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The pattern vocabulary.
//!
//! A [`Pattern`] tree mirrors the syntax-node shapes ([`Shape`] covers the
//! variants recognizers match against, with every payload field optional as
//! a per-field wildcard) and adds the matcher-only kinds: [`Pattern::Any`],
//! [`Pattern::Choice`], [`Pattern::Repeat`], and [`Pattern::Backref`].
//!
//! Patterns are built once as immutable templates (typically in `LazyLock`
//! statics) and shared freely; the matcher never mutates them.

use resugar_tree::{
    AccessorKind, BinaryOperator, Literal, NodeId, NodeKind, Role, UnaryOperator,
};
use std::collections::HashMap;

/// A literal-shape constraint on one node.
///
/// Each variant corresponds to a [`NodeKind`] variant; payload fields are
/// `Option`s where `None` matches any payload value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Block,
    ExpressionStatement,
    VariableDeclaration {
        name: Option<String>,
        ty: Option<String>,
    },
    If,
    While,
    DoWhile,
    Using,
    Lock,
    Try,
    CatchClause,
    Switch,
    SwitchSection,
    Break,
    Continue,
    Return,
    Throw,
    Identifier {
        name: Option<String>,
    },
    Literal {
        value: Option<Literal>,
    },
    MemberAccess {
        member: Option<String>,
    },
    Invocation,
    Assignment,
    ObjectCreation {
        ty: Option<String>,
    },
    Cast {
        ty: Option<String>,
    },
    BinaryOp {
        op: Option<BinaryOperator>,
    },
    UnaryOp {
        op: Option<UnaryOperator>,
    },
    IndexAccess,
    Lambda,
    AnonymousMethod,
    ThisRef,
    BaseRef,
    TypeRef {
        ty: Option<String>,
    },
    Accessor {
        kind: Option<AccessorKind>,
    },
    FieldDeclaration {
        name: Option<String>,
    },
}

impl Shape {
    /// Does this shape accept the given concrete variant and payload?
    pub fn accepts(&self, kind: &NodeKind) -> bool {
        fn opt_eq<T: PartialEq>(want: &Option<T>, got: &T) -> bool {
            want.as_ref().is_none_or(|w| w == got)
        }
        match (self, kind) {
            (Shape::Block, NodeKind::Block) => true,
            (Shape::ExpressionStatement, NodeKind::ExpressionStatement) => true,
            (
                Shape::VariableDeclaration { name, ty },
                NodeKind::VariableDeclaration {
                    name: n,
                    ty: t,
                },
            ) => opt_eq(name, n) && ty.as_ref().is_none_or(|w| Some(w) == t.as_ref()),
            (Shape::If, NodeKind::If) => true,
            (Shape::While, NodeKind::While) => true,
            (Shape::DoWhile, NodeKind::DoWhile) => true,
            (Shape::Using, NodeKind::Using) => true,
            (Shape::Lock, NodeKind::Lock) => true,
            (Shape::Try, NodeKind::Try) => true,
            (Shape::CatchClause, NodeKind::CatchClause { .. }) => true,
            (Shape::Switch, NodeKind::Switch) => true,
            (Shape::SwitchSection, NodeKind::SwitchSection) => true,
            (Shape::Break, NodeKind::Break) => true,
            (Shape::Continue, NodeKind::Continue) => true,
            (Shape::Return, NodeKind::Return) => true,
            (Shape::Throw, NodeKind::Throw) => true,
            (Shape::Identifier { name }, NodeKind::Identifier { name: n }) => opt_eq(name, n),
            (Shape::Literal { value }, NodeKind::Literal { value: v }) => opt_eq(value, v),
            (Shape::MemberAccess { member }, NodeKind::MemberAccess { member: m }) => {
                opt_eq(member, m)
            }
            (Shape::Invocation, NodeKind::Invocation) => true,
            (Shape::Assignment, NodeKind::Assignment) => true,
            (Shape::ObjectCreation { ty }, NodeKind::ObjectCreation { ty: t }) => opt_eq(ty, t),
            (Shape::Cast { ty }, NodeKind::Cast { ty: t }) => opt_eq(ty, t),
            (Shape::BinaryOp { op }, NodeKind::BinaryOp { op: o }) => opt_eq(op, o),
            (Shape::UnaryOp { op }, NodeKind::UnaryOp { op: o }) => opt_eq(op, o),
            (Shape::IndexAccess, NodeKind::IndexAccess) => true,
            (Shape::Lambda, NodeKind::Lambda) => true,
            (Shape::AnonymousMethod, NodeKind::AnonymousMethod) => true,
            (Shape::ThisRef, NodeKind::ThisRef) => true,
            (Shape::BaseRef, NodeKind::BaseRef) => true,
            (Shape::TypeRef { ty }, NodeKind::TypeRef { ty: t }) => opt_eq(ty, t),
            (Shape::Accessor { kind }, NodeKind::Accessor { kind: k }) => opt_eq(kind, k),
            (Shape::FieldDeclaration { name }, NodeKind::FieldDeclaration { name: n, .. }) => {
                opt_eq(name, n)
            }
            _ => false,
        }
    }
}

/// One pattern node.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Matches a concrete node whose variant and payload satisfy `shape` and
    /// whose children match `children` positionally with role agreement.
    /// Extra concrete children fail the match unless soaked up by a trailing
    /// [`Pattern::Repeat`].
    Shape {
        shape: Shape,
        children: Vec<(Role, Pattern)>,
    },
    /// Matches any one node, or an absent slot. Optionally captures.
    Any { name: Option<&'static str> },
    /// Captures whatever `pattern` matches under `name`.
    Capture {
        name: &'static str,
        pattern: Box<Pattern>,
    },
    /// First successful alternative wins; no backtracking once committed.
    Choice(Vec<Pattern>),
    /// Greedy repetition of `pattern`, between `min` and `max` occurrences,
    /// all captured under `name` as an ordered list. `min == 0` also matches
    /// an absent slot.
    Repeat {
        name: Option<&'static str>,
        min: u32,
        max: u32,
        pattern: Box<Pattern>,
    },
    /// Matches only a node structurally identical to the node already
    /// captured under `name` earlier in the same attempt.
    Backref(&'static str),
}

impl Pattern {
    pub fn any() -> Pattern {
        Pattern::Any { name: None }
    }

    pub fn any_named(name: &'static str) -> Pattern {
        Pattern::Any { name: Some(name) }
    }

    pub fn capture(name: &'static str, pattern: Pattern) -> Pattern {
        Pattern::Capture {
            name,
            pattern: Box::new(pattern),
        }
    }

    pub fn choice(alternatives: Vec<Pattern>) -> Pattern {
        Pattern::Choice(alternatives)
    }

    /// Zero-or-more repetitions.
    pub fn repeat(name: &'static str, pattern: Pattern) -> Pattern {
        Pattern::Repeat {
            name: Some(name),
            min: 0,
            max: u32::MAX,
            pattern: Box::new(pattern),
        }
    }

    /// Zero-or-one occurrence.
    pub fn optional(name: &'static str, pattern: Pattern) -> Pattern {
        Pattern::Repeat {
            name: Some(name),
            min: 0,
            max: 1,
            pattern: Box::new(pattern),
        }
    }

    pub fn backref(name: &'static str) -> Pattern {
        Pattern::Backref(name)
    }

    pub fn shape(shape: Shape, children: Vec<(Role, Pattern)>) -> Pattern {
        Pattern::Shape { shape, children }
    }
}

/// Capture table produced by a successful match.
///
/// Every capture is an ordered list of node ids; a singular capture is a
/// list of length one. Looking a name up with the right arity is the
/// caller's contract, not enforced here.
#[derive(Debug, Clone, Default)]
pub struct Captures {
    map: HashMap<&'static str, Vec<NodeId>>,
}

impl Captures {
    pub fn new() -> Self {
        Captures::default()
    }

    pub(crate) fn push(&mut self, name: &'static str, id: NodeId) {
        self.map.entry(name).or_default().push(id);
    }

    /// First node captured under `name`.
    pub fn get_one(&self, name: &str) -> Option<NodeId> {
        self.map.get(name).and_then(|v| v.first()).copied()
    }

    /// All nodes captured under `name`, in match order. Empty for names
    /// that captured nothing.
    pub fn get_all(&self, name: &str) -> &[NodeId] {
        self.map.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
