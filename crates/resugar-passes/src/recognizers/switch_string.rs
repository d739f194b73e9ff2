// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Switch-on-string recovery.
//!
//! The legacy compiler lowers a string switch into a null guard around a
//! lazily-built `string -> int` dictionary and a `TryGetValue` dispatch
//! into an integer switch:
//!
//! ```text
//! if (s != null) {
//!     if (map == null) { map = ...; }          // one-time lazy build
//!     if (map.TryGetValue(s, out num)) {
//!         switch (num) { case 0: ... case 1: ... }
//!     } else { ...default... }
//! } else { ...null case... }
//! ```
//!
//! The dictionary's key/value pairs are read from a collection-initializer
//! construction or from an explicit `Add`-call sequence; each integer case
//! label is rewritten back to its string literal(s) by reverse lookup.
//! Merged buckets keep their keys in original insertion order. The null
//! guard's false branch becomes a synthesized `null` case and the dispatch
//! else branch becomes the default section.

use resugar_tree::{
    Arena, BinaryOperator, Literal, NodeId, NodeKind, Role, UnaryOperator,
};
use tracing::debug;

use crate::analysis::value_is_dead_after;
use crate::context::PassContext;
use crate::diagnostics::Diagnostic;
use crate::error::PassResult;
use crate::recognizers::{Recognizer, Rewrite};

pub struct SwitchOnStringRecovery;

// ----------------------------------------------------------------------
// Shape parsing
// ----------------------------------------------------------------------

fn ident_name(arena: &Arena, id: NodeId) -> Option<&str> {
    match arena.kind(id) {
        NodeKind::Identifier { name } => Some(name),
        _ => None,
    }
}

/// `expr != null` / `null != expr` (Ne) or the Eq forms, returning the
/// non-null operand.
fn null_comparison(arena: &Arena, cond: NodeId, op: BinaryOperator) -> Option<NodeId> {
    if arena.kind(cond) != &(NodeKind::BinaryOp { op }) {
        return None;
    }
    let left = arena.child(cond, Role::Left)?;
    let right = arena.child(cond, Role::Right)?;
    let is_null = |id: NodeId| {
        matches!(
            arena.kind(id),
            NodeKind::Literal {
                value: Literal::Null
            }
        )
    };
    match (is_null(left), is_null(right)) {
        (false, true) => Some(left),
        (true, false) => Some(right),
        _ => None,
    }
}

/// One `("key", value)` pair from an `Add("key", value)` invocation.
fn literal_pair(arena: &Arena, call: NodeId) -> Option<(String, i64)> {
    if !matches!(arena.kind(call), NodeKind::Invocation) {
        return None;
    }
    let args: Vec<NodeId> = arena.children_with_role(call, Role::Argument).collect();
    let [key, value] = args[..] else {
        return None;
    };
    let NodeKind::Literal {
        value: Literal::Str(key),
    } = arena.kind(key)
    else {
        return None;
    };
    let NodeKind::Literal {
        value: Literal::Int(bucket),
    } = arena.kind(value)
    else {
        return None;
    };
    Some((key.clone(), *bucket))
}

/// Is `call` an invocation of `<target>.Add(...)` or `Add(...)`?
fn is_add_call(arena: &Arena, call: NodeId, receiver: Option<&str>) -> bool {
    let Some(callee) = arena.child(call, Role::Callee) else {
        return false;
    };
    match arena.kind(callee) {
        NodeKind::MemberAccess { member } if member == "Add" => match receiver {
            Some(var) => {
                arena
                    .child(callee, Role::Target)
                    .and_then(|t| ident_name(arena, t))
                    == Some(var)
            }
            None => true,
        },
        NodeKind::Identifier { name } if name == "Add" => receiver.is_none(),
        _ => false,
    }
}

struct LazyInit {
    dict: NodeId,
    pairs: Vec<(String, i64)>,
}

/// The one-time build: `if (map == null) { <construction> }`. Construction
/// is either a collection-initializer creation assigned to the field, or a
/// temp creation plus an `Add`-call sequence.
fn parse_lazy_init(arena: &Arena, stmt: NodeId) -> Option<LazyInit> {
    if !matches!(arena.kind(stmt), NodeKind::If) {
        return None;
    }
    if arena.child(stmt, Role::Else).is_some() {
        return None;
    }
    let cond = arena.child(stmt, Role::Condition)?;
    let dict = null_comparison(arena, cond, BinaryOperator::Eq)?;
    let then = arena.child(stmt, Role::Then)?;
    let stmts: Vec<NodeId> = arena.children_with_role(then, Role::Body).collect();

    // Collection-initializer form: map = new Dictionary { {"a",0}, ... };
    if let [only] = stmts[..] {
        let assign = assignment_of(arena, only)?;
        let target = arena.child(assign, Role::Target)?;
        if !arena.structurally_equal(target, dict) {
            return None;
        }
        let creation = arena.child(assign, Role::Value)?;
        if !matches!(arena.kind(creation), NodeKind::ObjectCreation { .. }) {
            return None;
        }
        let mut pairs = Vec::new();
        for entry in arena.children_with_role(creation, Role::Member) {
            if !is_add_call(arena, entry, None) {
                return None;
            }
            pairs.push(literal_pair(arena, entry)?);
        }
        if pairs.is_empty() {
            return None;
        }
        return Some(LazyInit { dict, pairs });
    }

    // Add-call form: tmp = new Dictionary(n); tmp.Add(...); ...; map = tmp;
    let (first, rest) = stmts.split_first()?;
    let (last, adds) = rest.split_last()?;
    let (tmp, creation) = match arena.kind(*first) {
        NodeKind::VariableDeclaration { name, .. } => {
            (name.clone(), arena.child(*first, Role::Initializer)?)
        }
        _ => {
            let assign = assignment_of(arena, *first)?;
            let target = arena.child(assign, Role::Target)?;
            (
                ident_name(arena, target)?.to_string(),
                arena.child(assign, Role::Value)?,
            )
        }
    };
    if !matches!(arena.kind(creation), NodeKind::ObjectCreation { .. }) {
        return None;
    }
    let mut pairs = Vec::new();
    for &stmt in adds {
        let call = match arena.kind(stmt) {
            NodeKind::ExpressionStatement => arena.child(stmt, Role::Value)?,
            _ => return None,
        };
        if !is_add_call(arena, call, Some(&tmp)) {
            return None;
        }
        pairs.push(literal_pair(arena, call)?);
    }
    if pairs.is_empty() {
        return None;
    }
    // The publish: map = tmp;
    let publish = assignment_of(arena, *last)?;
    let target = arena.child(publish, Role::Target)?;
    if !arena.structurally_equal(target, dict) {
        return None;
    }
    if arena
        .child(publish, Role::Value)
        .and_then(|v| ident_name(arena, v))
        != Some(tmp.as_str())
    {
        return None;
    }
    Some(LazyInit { dict, pairs })
}

fn assignment_of(arena: &Arena, stmt: NodeId) -> Option<NodeId> {
    if !matches!(arena.kind(stmt), NodeKind::ExpressionStatement) {
        return None;
    }
    let expr = arena.child(stmt, Role::Value)?;
    matches!(arena.kind(expr), NodeKind::Assignment).then_some(expr)
}

struct Dispatch {
    num: String,
    old_switch: NodeId,
    default_branch: Option<NodeId>,
}

/// `if (map.TryGetValue(s, out num)) { switch (num) ... } else { ... }`
fn parse_dispatch(arena: &Arena, stmt: NodeId, scrutinee: NodeId, dict: NodeId) -> Option<Dispatch> {
    if !matches!(arena.kind(stmt), NodeKind::If) {
        return None;
    }
    let cond = arena.child(stmt, Role::Condition)?;
    if !matches!(arena.kind(cond), NodeKind::Invocation) {
        return None;
    }
    let callee = arena.child(cond, Role::Callee)?;
    let NodeKind::MemberAccess { member } = arena.kind(callee) else {
        return None;
    };
    if member != "TryGetValue" {
        return None;
    }
    let receiver = arena.child(callee, Role::Target)?;
    if !arena.structurally_equal(receiver, dict) {
        return None;
    }
    let args: Vec<NodeId> = arena.children_with_role(cond, Role::Argument).collect();
    let [key, out] = args[..] else {
        return None;
    };
    // The key must be the same expression the null guard tested.
    if !arena.structurally_equal(key, scrutinee) {
        return None;
    }
    if !matches!(
        arena.kind(out),
        NodeKind::UnaryOp {
            op: UnaryOperator::Out
        }
    ) {
        return None;
    }
    let num = ident_name(arena, arena.child(out, Role::Operand)?)?.to_string();

    let then = arena.child(stmt, Role::Then)?;
    let old_switch = match arena.kind(then) {
        NodeKind::Switch => then,
        NodeKind::Block => {
            let stmts: Vec<NodeId> = arena.children_with_role(then, Role::Body).collect();
            let [only] = stmts[..] else {
                return None;
            };
            if !matches!(arena.kind(only), NodeKind::Switch) {
                return None;
            }
            only
        }
        _ => return None,
    };
    if arena
        .child(old_switch, Role::Scrutinee)
        .and_then(|s| ident_name(arena, s))
        != Some(num.as_str())
    {
        return None;
    }
    Some(Dispatch {
        num,
        old_switch,
        default_branch: arena.child(stmt, Role::Else),
    })
}

/// Does the section already end on a jump (break/return/throw/continue)?
fn ends_with_jump(arena: &Arena, section: NodeId) -> bool {
    arena
        .children_with_role(section, Role::Body)
        .last()
        .is_some_and(|last| {
            matches!(
                arena.kind(last),
                NodeKind::Break | NodeKind::Continue | NodeKind::Return | NodeKind::Throw
            )
        })
}

/// Move every statement out of `branch` (a block or single statement) into
/// a fresh section carrying `label`, ending on a break.
fn section_from_branch(arena: &mut Arena, label: Option<Literal>, branch: NodeId) -> NodeId {
    let section = arena.alloc(NodeKind::SwitchSection);
    let lbl = arena.alloc(NodeKind::CaseLabel { value: label });
    arena.append_child(section, Role::Label, lbl);
    if matches!(arena.kind(branch), NodeKind::Block) {
        let stmts: Vec<NodeId> = arena.children_with_role(branch, Role::Body).collect();
        for stmt in stmts {
            arena.detach(stmt);
            arena.append_child(section, Role::Body, stmt);
        }
    } else {
        arena.detach(branch);
        arena.append_child(section, Role::Body, branch);
    }
    if !ends_with_jump(arena, section) {
        let brk = arena.alloc(NodeKind::Break);
        arena.append_child(section, Role::Body, brk);
    }
    section
}

// ----------------------------------------------------------------------
// Recognizer
// ----------------------------------------------------------------------

impl Recognizer for SwitchOnStringRecovery {
    fn name(&self) -> &'static str {
        "switch_on_string"
    }

    fn applies_to(&self, kind: &NodeKind) -> bool {
        matches!(kind, NodeKind::If)
    }

    fn try_rewrite(&self, cx: &mut PassContext<'_>, node: NodeId) -> PassResult<Rewrite> {
        let arena = &mut *cx.arena;
        // Outer null guard: if (s != null) { ... } else { null case }
        if !matches!(arena.kind(node), NodeKind::If) {
            return Ok(Rewrite::Declined);
        }
        let Some(cond) = arena.child(node, Role::Condition) else {
            return Ok(Rewrite::Declined);
        };
        let Some(scrutinee) = null_comparison(arena, cond, BinaryOperator::Ne) else {
            return Ok(Rewrite::Declined);
        };
        let Some(then) = arena.child(node, Role::Then) else {
            return Ok(Rewrite::Declined);
        };
        let null_branch = arena.child(node, Role::Else);

        let stmts: Vec<NodeId> = arena.children_with_role(then, Role::Body).collect();
        let (init, dispatch_stmt) = match stmts[..] {
            [init, dispatch] => (init, dispatch),
            _ => return Ok(Rewrite::Declined),
        };
        let Some(lazy) = parse_lazy_init(arena, init) else {
            return Ok(Rewrite::Declined);
        };
        let Some(dispatch) = parse_dispatch(arena, dispatch_stmt, scrutinee, lazy.dict) else {
            return Ok(Rewrite::Declined);
        };

        // Reverse lookup: every integer label must name a dictionary
        // bucket, or the upstream tree is malformed and the rewrite aborts.
        let sections: Vec<NodeId> = arena
            .children_with_role(dispatch.old_switch, Role::Section)
            .collect();
        let mut recovered: Vec<(NodeId, Vec<String>)> = Vec::new();
        for &section in &sections {
            let mut keys = Vec::new();
            for label in arena.children_with_role(section, Role::Label) {
                let NodeKind::CaseLabel {
                    value: Some(Literal::Int(bucket)),
                } = arena.kind(label)
                else {
                    return Ok(Rewrite::Declined);
                };
                let mut matched = false;
                for (key, value) in &lazy.pairs {
                    if value == bucket {
                        keys.push(key.clone());
                        matched = true;
                    }
                }
                if !matched {
                    cx.diagnostics.push(Diagnostic::warning(
                        "switch_on_string",
                        format!("case label {bucket} has no dictionary bucket"),
                        Some(section),
                    ));
                    return Ok(Rewrite::Declined);
                }
            }
            recovered.push((section, keys));
        }

        // The out-variable dies with the construct.
        let Some(parent) = arena.parent(node) else {
            return Ok(Rewrite::Declined);
        };
        if !value_is_dead_after(arena, &dispatch.num, node, parent, &cx.cancel)? {
            return Ok(Rewrite::Declined);
        }

        debug!(sections = recovered.len(), "recovering switch on string");

        // Surgery: rebuild each section's labels as string literals, then
        // swap the whole guard for the new switch.
        let new_switch = arena.alloc(NodeKind::Switch);
        arena.detach(scrutinee);
        for (section, keys) in recovered {
            arena.detach(section);
            let labels: Vec<NodeId> = arena.children_with_role(section, Role::Label).collect();
            for label in labels {
                arena.detach(label);
                arena.absorb_subtree_provenance(label, section);
            }
            for key in keys {
                let lbl = arena.alloc(NodeKind::CaseLabel {
                    value: Some(Literal::Str(key)),
                });
                arena.append_child(section, Role::Label, lbl);
            }
            arena.append_child(new_switch, Role::Section, section);
        }
        if let Some(branch) = null_branch {
            let section = section_from_branch(arena, Some(Literal::Null), branch);
            arena.append_child(new_switch, Role::Section, section);
        }
        if let Some(branch) = dispatch.default_branch {
            let section = section_from_branch(arena, None, branch);
            arena.append_child(new_switch, Role::Section, section);
        }
        arena.replace(node, new_switch);
        // Consume a dangling bare declaration of the out-variable.
        if let Some(prev) = arena.prev_sibling(new_switch) {
            let is_num_decl = matches!(
                arena.kind(prev),
                NodeKind::VariableDeclaration { name, .. } if *name == dispatch.num
            ) && arena.child(prev, Role::Initializer).is_none();
            if is_num_decl {
                arena.detach(prev);
                arena.absorb_subtree_provenance(prev, new_switch);
            }
        }
        arena.absorb_subtree_provenance(node, new_switch);
        arena.prepend_child(new_switch, Role::Scrutinee, scrutinee);

        Ok(Rewrite::Applied(new_switch))
    }
}
