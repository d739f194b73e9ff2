// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Iteration (`foreach`) recovery, three independent shapes.
//!
//! 1. Generic enumerator: a recovered `using` whose resource is a
//!    `GetEnumerator()` call and whose body is a `while (e.MoveNext())`
//!    loop binding `e.Current` at loop entry. Runs after the using
//!    recognizer, which is what makes this shape a single node.
//! 2. Non-generic enumerator without a dispose: the `GetEnumerator()`
//!    assignment directly precedes the bare `while` loop (sealed
//!    non-disposable enumerators have no try/finally to recover).
//! 3. Indexed array/string: `i = 0; while (i < arr.Length) { item = arr[i];
//!    ... i = i + 1; }` where the environment confirms `arr` is statically
//!    an array or string.
//!
//! All three absorb the enumerator/index variable and, for the
//! assigned-item form, the item's prior declaration, each elimination
//! guarded by the movability analysis. The recognizer declines whenever the
//! hoist cannot be proven sound.

use resugar_tree::{Arena, BinaryOperator, NodeId, NodeKind, Role};
use tracing::debug;

use crate::analysis::{declaration_is_movable_into_loop, mentions, value_is_dead_after};
use crate::context::{CancellationToken, PassContext};
use crate::env::StaticType;
use crate::error::PassResult;
use crate::recognizers::using::reassigned_in;
use crate::recognizers::{Recognizer, Rewrite};

pub struct ForeachRecovery;

// ----------------------------------------------------------------------
// Shape parsing
// ----------------------------------------------------------------------

fn ident_name(arena: &Arena, id: NodeId) -> Option<&str> {
    match arena.kind(id) {
        NodeKind::Identifier { name } => Some(name),
        _ => None,
    }
}

/// The item-binding statement at loop entry: `T item = <fetch>;` or
/// `item = <fetch>;`, where `<fetch>` is supplied by the caller's check.
struct ItemBinding {
    name: String,
    ty: Option<String>,
    stmt: NodeId,
    /// The fetch expression (inside any cast).
    fetch: NodeId,
    declared_inline: bool,
}

fn parse_item_stmt(arena: &Arena, stmt: NodeId) -> Option<ItemBinding> {
    let (name, ty, value, declared_inline) = match arena.kind(stmt) {
        NodeKind::VariableDeclaration { name, ty } => {
            let init = arena.child(stmt, Role::Initializer)?;
            (name.clone(), ty.clone(), init, true)
        }
        NodeKind::ExpressionStatement => {
            let assign = arena.child(stmt, Role::Value)?;
            if !matches!(arena.kind(assign), NodeKind::Assignment) {
                return None;
            }
            let target = arena.child(assign, Role::Target)?;
            let name = ident_name(arena, target)?.to_string();
            let value = arena.child(assign, Role::Value)?;
            (name, None, value, false)
        }
        _ => return None,
    };
    // The fetch may sit behind a cast; the cast type becomes the item type
    // when the declaration did not carry one.
    let (fetch, cast_ty) = match arena.kind(value) {
        NodeKind::Cast { ty } => (arena.child(value, Role::Operand)?, Some(ty.clone())),
        _ => (value, None),
    };
    Some(ItemBinding {
        name,
        ty: ty.or(cast_ty),
        stmt,
        fetch,
        declared_inline,
    })
}

/// `e.Current`
fn is_current_access(arena: &Arena, expr: NodeId, enum_var: &str) -> bool {
    let NodeKind::MemberAccess { member } = arena.kind(expr) else {
        return false;
    };
    member == "Current"
        && arena
            .child(expr, Role::Target)
            .and_then(|t| ident_name(arena, t))
            == Some(enum_var)
}

/// `while (e.MoveNext()) { item = e.Current; rest... }` — returns the item
/// binding; the caller checks what `rest` may mention.
fn parse_enumerator_loop(arena: &Arena, while_node: NodeId, enum_var: &str) -> Option<ItemBinding> {
    if !matches!(arena.kind(while_node), NodeKind::While) {
        return None;
    }
    let cond = arena.child(while_node, Role::Condition)?;
    if !matches!(arena.kind(cond), NodeKind::Invocation) {
        return None;
    }
    let callee = arena.child(cond, Role::Callee)?;
    let NodeKind::MemberAccess { member } = arena.kind(callee) else {
        return None;
    };
    if member != "MoveNext"
        || arena.children_with_role(cond, Role::Argument).next().is_some()
        || arena
            .child(callee, Role::Target)
            .and_then(|t| ident_name(arena, t))
            != Some(enum_var)
    {
        return None;
    }
    let body = arena.child(while_node, Role::Body)?;
    let first = arena.children_with_role(body, Role::Body).next()?;
    let item = parse_item_stmt(arena, first)?;
    if !is_current_access(arena, item.fetch, enum_var) {
        return None;
    }
    Some(item)
}

/// `x.GetEnumerator()` — returns the collection expression `x`.
fn parse_get_enumerator(arena: &Arena, init: NodeId) -> Option<NodeId> {
    if !matches!(arena.kind(init), NodeKind::Invocation) {
        return None;
    }
    if arena.children_with_role(init, Role::Argument).next().is_some() {
        return None;
    }
    let callee = arena.child(init, Role::Callee)?;
    let NodeKind::MemberAccess { member } = arena.kind(callee) else {
        return None;
    };
    if member != "GetEnumerator" {
        return None;
    }
    arena.child(callee, Role::Target)
}

/// Statement form `v = <init>;` or `T v = <init>;`.
fn parse_init_stmt(arena: &Arena, stmt: NodeId) -> Option<(String, NodeId)> {
    match arena.kind(stmt) {
        NodeKind::VariableDeclaration { name, .. } => {
            Some((name.clone(), arena.child(stmt, Role::Initializer)?))
        }
        NodeKind::ExpressionStatement => {
            let assign = arena.child(stmt, Role::Value)?;
            if !matches!(arena.kind(assign), NodeKind::Assignment) {
                return None;
            }
            let target = arena.child(assign, Role::Target)?;
            let name = ident_name(arena, target)?.to_string();
            Some((name, arena.child(assign, Role::Value)?))
        }
        _ => None,
    }
}

// ----------------------------------------------------------------------
// Item-declaration hoisting
// ----------------------------------------------------------------------

/// For the assigned-item form, locate the item's bare declaration in an
/// enclosing block and prove it can move into the loop header. `None`
/// means decline; `Some(decl)` is the declaration statement to consume.
fn resolve_outer_decl(
    arena: &Arena,
    var: &str,
    construct: NodeId,
    cancel: &CancellationToken,
) -> PassResult<Option<NodeId>> {
    let mut cursor = construct;
    while let Some(block) = arena.parent(cursor) {
        if matches!(arena.kind(block), NodeKind::Block) {
            let decl = arena.children(block).iter().find(|c| {
                matches!(
                    arena.kind(c.id),
                    NodeKind::VariableDeclaration { name, .. } if name == var
                ) && arena.child(c.id, Role::Initializer).is_none()
            });
            if let Some(decl) = decl {
                let decl = decl.id;
                if declaration_is_movable_into_loop(arena, var, decl, construct, cancel)? {
                    return Ok(Some(decl));
                }
                return Ok(None);
            }
        }
        cursor = block;
    }
    Ok(None)
}

// ----------------------------------------------------------------------
// Rewrites
// ----------------------------------------------------------------------

struct LoopPieces {
    item: ItemBinding,
    collection: NodeId,
    while_node: NodeId,
    /// Consumed alongside the loop: acquisition statement, outer item
    /// declaration, index increment.
    consumed: Vec<NodeId>,
}

/// Common surgery once a shape has fully matched: build the foreach,
/// splice the surviving body, absorb the consumed statements' provenance.
fn rewrite_to_foreach(arena: &mut Arena, replaced: NodeId, pieces: LoopPieces) -> NodeId {
    let foreach = arena.alloc(NodeKind::Foreach {
        item: pieces.item.name.clone(),
        item_ty: pieces.item.ty.clone(),
    });
    let body = arena
        .child(pieces.while_node, Role::Body)
        .unwrap_or(pieces.while_node);
    arena.detach(pieces.item.stmt);
    arena.absorb_subtree_provenance(pieces.item.stmt, foreach);
    arena.detach(pieces.collection);
    arena.detach(body);
    arena.replace(replaced, foreach);
    for stmt in pieces.consumed {
        arena.detach(stmt);
        arena.absorb_subtree_provenance(stmt, foreach);
    }
    arena.absorb_subtree_provenance(replaced, foreach);
    arena.append_child(foreach, Role::Collection, pieces.collection);
    arena.append_child(foreach, Role::Body, body);
    foreach
}

/// Everything past the item binding must leave the enumerator and the item
/// alone (the item may be read, never written).
fn loop_remainder_is_clean(arena: &Arena, body: NodeId, item: &ItemBinding, var: &str) -> bool {
    let mut first = true;
    for stmt in arena.children_with_role(body, Role::Body) {
        if first && stmt == item.stmt {
            first = false;
            continue;
        }
        first = false;
        if mentions(arena, var, stmt) || reassigned_in(arena, &item.name, stmt) {
            return false;
        }
    }
    true
}

impl ForeachRecovery {
    /// Shape 1: recovered `using` over a `GetEnumerator()` resource.
    fn try_using_shape(
        &self,
        cx: &mut PassContext<'_>,
        node: NodeId,
    ) -> PassResult<Rewrite> {
        let arena = &mut *cx.arena;
        let Some(resource) = arena.child(node, Role::Resource) else {
            return Ok(Rewrite::Declined);
        };
        let NodeKind::VariableDeclaration { name: enum_var, .. } = arena.kind(resource) else {
            return Ok(Rewrite::Declined);
        };
        let enum_var = enum_var.clone();
        let Some(init) = arena.child(resource, Role::Initializer) else {
            return Ok(Rewrite::Declined);
        };
        let Some(collection) = parse_get_enumerator(arena, init) else {
            return Ok(Rewrite::Declined);
        };
        let Some(using_body) = arena.child(node, Role::Body) else {
            return Ok(Rewrite::Declined);
        };
        // The using body is the loop, possibly preceded by bare declarations
        // that were hoisted out of it; they move back inside.
        let stmts: Vec<NodeId> = arena.children_with_role(using_body, Role::Body).collect();
        let Some((&while_node, hoisted)) = stmts.split_last() else {
            return Ok(Rewrite::Declined);
        };
        if hoisted.iter().any(|&s| {
            !matches!(arena.kind(s), NodeKind::VariableDeclaration { .. })
                || arena.child(s, Role::Initializer).is_some()
                || mentions(arena, &enum_var, s)
        }) {
            return Ok(Rewrite::Declined);
        }
        let hoisted = hoisted.to_vec();
        let Some(item) = parse_enumerator_loop(arena, while_node, &enum_var) else {
            return Ok(Rewrite::Declined);
        };
        let loop_body = arena.child(while_node, Role::Body).unwrap_or(while_node);
        if !loop_remainder_is_clean(arena, loop_body, &item, &enum_var) {
            return Ok(Rewrite::Declined);
        }
        let mut consumed = Vec::new();
        if !item.declared_inline {
            match resolve_outer_decl(arena, &item.name, node, &cx.cancel)? {
                Some(decl) => consumed.push(decl),
                None => return Ok(Rewrite::Declined),
            }
        }
        debug!(item = %item.name, shape = "enumerator-using", "recovering foreach");
        // Declarations hoisted out of the loop survive; pull them aside
        // before the surgery consumes the using subtree.
        for &decl in &hoisted {
            arena.detach(decl);
        }
        let foreach = rewrite_to_foreach(
            arena,
            node,
            LoopPieces {
                item,
                collection,
                while_node,
                consumed,
            },
        );
        // They return to the front of the loop body.
        let body = arena.child(foreach, Role::Body).unwrap_or(foreach);
        for &decl in hoisted.iter().rev() {
            arena.prepend_child(body, Role::Body, decl);
        }
        Ok(Rewrite::Applied(foreach))
    }

    /// Shape 2: non-disposing enumerator, acquisition directly before the
    /// bare while loop.
    fn try_enumerator_shape(
        &self,
        cx: &mut PassContext<'_>,
        node: NodeId,
    ) -> PassResult<Rewrite> {
        let arena = &mut *cx.arena;
        let Some(parent) = arena.parent(node) else {
            return Ok(Rewrite::Declined);
        };
        if !matches!(arena.kind(parent), NodeKind::Block) {
            return Ok(Rewrite::Declined);
        }
        let Some(acq) = arena.prev_sibling(node) else {
            return Ok(Rewrite::Declined);
        };
        let Some((enum_var, init)) = parse_init_stmt(arena, acq) else {
            return Ok(Rewrite::Declined);
        };
        let Some(collection) = parse_get_enumerator(arena, init) else {
            return Ok(Rewrite::Declined);
        };
        let Some(item) = parse_enumerator_loop(arena, node, &enum_var) else {
            return Ok(Rewrite::Declined);
        };
        let body = arena.child(node, Role::Body).unwrap_or(node);
        if !loop_remainder_is_clean(arena, body, &item, &enum_var) {
            return Ok(Rewrite::Declined);
        }
        // The enumerator variable dies with the loop.
        if !value_is_dead_after(arena, &enum_var, node, parent, &cx.cancel)? {
            return Ok(Rewrite::Declined);
        }
        let mut consumed = vec![acq];
        if !item.declared_inline {
            match resolve_outer_decl(arena, &item.name, node, &cx.cancel)? {
                Some(decl) => consumed.push(decl),
                None => return Ok(Rewrite::Declined),
            }
        }
        debug!(item = %item.name, shape = "enumerator", "recovering foreach");
        Ok(Rewrite::Applied(rewrite_to_foreach(
            arena,
            node,
            LoopPieces {
                item,
                collection,
                while_node: node,
                consumed,
            },
        )))
    }

    /// Shape 3: indexed iteration over an array or string.
    fn try_indexed_shape(&self, cx: &mut PassContext<'_>, node: NodeId) -> PassResult<Rewrite> {
        let arena = &mut *cx.arena;
        let Some(parent) = arena.parent(node) else {
            return Ok(Rewrite::Declined);
        };
        if !matches!(arena.kind(parent), NodeKind::Block) {
            return Ok(Rewrite::Declined);
        }
        // i = 0; directly before the loop.
        let Some(acq) = arena.prev_sibling(node) else {
            return Ok(Rewrite::Declined);
        };
        let Some((index_var, zero)) = parse_init_stmt(arena, acq) else {
            return Ok(Rewrite::Declined);
        };
        if !matches!(
            arena.kind(zero),
            NodeKind::Literal {
                value: resugar_tree::Literal::Int(0)
            }
        ) {
            return Ok(Rewrite::Declined);
        }
        // while (i < arr.Length)
        let Some(cond) = arena.child(node, Role::Condition) else {
            return Ok(Rewrite::Declined);
        };
        if !matches!(
            arena.kind(cond),
            NodeKind::BinaryOp {
                op: BinaryOperator::Lt
            }
        ) {
            return Ok(Rewrite::Declined);
        }
        let (Some(left), Some(right)) =
            (arena.child(cond, Role::Left), arena.child(cond, Role::Right))
        else {
            return Ok(Rewrite::Declined);
        };
        if ident_name(arena, left) != Some(index_var.as_str()) {
            return Ok(Rewrite::Declined);
        }
        let NodeKind::MemberAccess { member } = arena.kind(right) else {
            return Ok(Rewrite::Declined);
        };
        if member != "Length" {
            return Ok(Rewrite::Declined);
        }
        let Some(collection) = arena.child(right, Role::Target) else {
            return Ok(Rewrite::Declined);
        };
        if !matches!(
            cx.env.static_type(arena, collection),
            StaticType::Array | StaticType::String
        ) {
            return Ok(Rewrite::Declined);
        }
        // Body: item = arr[i]; ... i = i + 1;
        let Some(body) = arena.child(node, Role::Body) else {
            return Ok(Rewrite::Declined);
        };
        let stmts: Vec<NodeId> = arena.children_with_role(body, Role::Body).collect();
        if stmts.len() < 2 {
            return Ok(Rewrite::Declined);
        }
        let Some(item) = parse_item_stmt(arena, stmts[0]) else {
            return Ok(Rewrite::Declined);
        };
        // arr[i], with the same arr expression as the loop condition
        if !matches!(arena.kind(item.fetch), NodeKind::IndexAccess) {
            return Ok(Rewrite::Declined);
        }
        let (Some(fetch_target), Some(fetch_index)) = (
            arena.child(item.fetch, Role::Target),
            arena.child(item.fetch, Role::Index),
        ) else {
            return Ok(Rewrite::Declined);
        };
        if !arena.structurally_equal(fetch_target, collection)
            || ident_name(arena, fetch_index) != Some(index_var.as_str())
        {
            return Ok(Rewrite::Declined);
        }
        // i = i + 1; as the last statement.
        let increment = *stmts.last().unwrap_or(&stmts[0]);
        if !is_increment_of(arena, increment, &index_var) {
            return Ok(Rewrite::Declined);
        }
        // Nothing in between may touch the index; the collection must not
        // be reassigned; both eliminated variables die with the loop.
        for &stmt in &stmts[1..stmts.len() - 1] {
            if mentions(arena, &index_var, stmt) || reassigned_in(arena, &item.name, stmt) {
                return Ok(Rewrite::Declined);
            }
        }
        if let Some(coll_name) = ident_name(arena, collection).map(str::to_string) {
            if reassigned_in(arena, &coll_name, body) {
                return Ok(Rewrite::Declined);
            }
        }
        if !value_is_dead_after(arena, &index_var, node, parent, &cx.cancel)? {
            return Ok(Rewrite::Declined);
        }
        let mut consumed = vec![acq, increment];
        if !item.declared_inline {
            match resolve_outer_decl(arena, &item.name, node, &cx.cancel)? {
                Some(decl) => consumed.push(decl),
                None => return Ok(Rewrite::Declined),
            }
        }
        debug!(item = %item.name, shape = "indexed", "recovering foreach");
        Ok(Rewrite::Applied(rewrite_to_foreach(
            arena,
            node,
            LoopPieces {
                item,
                collection,
                while_node: node,
                consumed,
            },
        )))
    }
}

/// `i = i + 1;`
fn is_increment_of(arena: &Arena, stmt: NodeId, var: &str) -> bool {
    let Some(assign) = (match arena.kind(stmt) {
        NodeKind::ExpressionStatement => arena.child(stmt, Role::Value),
        _ => None,
    }) else {
        return false;
    };
    if !matches!(arena.kind(assign), NodeKind::Assignment) {
        return false;
    }
    let target_ok = arena
        .child(assign, Role::Target)
        .and_then(|t| ident_name(arena, t))
        == Some(var);
    let Some(value) = arena.child(assign, Role::Value) else {
        return false;
    };
    let sum_ok = matches!(
        arena.kind(value),
        NodeKind::BinaryOp {
            op: BinaryOperator::Add
        }
    ) && arena
        .child(value, Role::Left)
        .and_then(|l| ident_name(arena, l))
        == Some(var)
        && matches!(
            arena.child(value, Role::Right).map(|r| arena.kind(r)),
            Some(NodeKind::Literal {
                value: resugar_tree::Literal::Int(1)
            })
        );
    target_ok && sum_ok
}

impl Recognizer for ForeachRecovery {
    fn name(&self) -> &'static str {
        "foreach"
    }

    fn applies_to(&self, kind: &NodeKind) -> bool {
        matches!(kind, NodeKind::Using | NodeKind::While)
    }

    fn try_rewrite(&self, cx: &mut PassContext<'_>, node: NodeId) -> PassResult<Rewrite> {
        match cx.arena.kind(node) {
            NodeKind::Using => self.try_using_shape(cx, node),
            NodeKind::While => {
                if let Rewrite::Applied(id) = self.try_enumerator_shape(cx, node)? {
                    return Ok(Rewrite::Applied(id));
                }
                self.try_indexed_shape(cx, node)
            }
            _ => Ok(Rewrite::Declined),
        }
    }
}
