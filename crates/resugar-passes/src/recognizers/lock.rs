// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Lock-statement recovery.
//!
//! Two historical compiler shapes normalize to one lock node:
//!
//! - v2: `Monitor.Enter(x); try { body } finally { Monitor.Exit(x); }`
//! - v4: `bool f = false; try { Monitor.Enter(x, ref f); body } finally {
//!   if (f) Monitor.Exit(x); }`
//!
//! The enter and exit arguments must refer to the same locked object,
//! either directly or through an inner assignment (`Monitor.Enter(obj = x)`)
//! whose left side matches the exit target; the temporary and the v4 flag
//! are eliminated and must pass the deadness check.

use std::sync::LazyLock;

use resugar_tree::{Arena, NodeId, NodeKind, Role, UnaryOperator};
use resugar_match::{match_node, pat, Captures, Pattern};
use tracing::debug;

use crate::analysis::value_is_dead_after;
use crate::context::PassContext;
use crate::error::PassResult;
use crate::recognizers::using::reassigned_in;
use crate::recognizers::{Recognizer, Rewrite};

pub struct LockRecovery;

// ----------------------------------------------------------------------
// Patterns
// ----------------------------------------------------------------------

fn exit_call() -> Pattern {
    pat::expr_stmt(pat::invoke(
        pat::static_member("Monitor", "Exit"),
        vec![Pattern::any_named("exit")],
    ))
}

fn stmt_or_block(stmt: Pattern) -> Pattern {
    Pattern::choice(vec![pat::block(vec![stmt.clone()]), stmt])
}

/// v2 finally: `Monitor.Exit(x);`
static EXIT_FINALLY: LazyLock<Pattern> = LazyLock::new(|| pat::block(vec![exit_call()]));

/// v4 finally: `if (f) Monitor.Exit(x);`
static FLAG_EXIT_FINALLY: LazyLock<Pattern> = LazyLock::new(|| {
    pat::block(vec![pat::if_no_else(
        Pattern::capture("flag", pat::ident_any()),
        stmt_or_block(exit_call()),
    )])
});

/// v2 acquisition: `Monitor.Enter(x);`
static ENTER_STMT: LazyLock<Pattern> = LazyLock::new(|| {
    pat::expr_stmt(pat::invoke(
        pat::static_member("Monitor", "Enter"),
        vec![Pattern::any_named("enter")],
    ))
});

/// v4 acquisition: `Monitor.Enter(x, ref f);` as the first body statement.
static ENTER_REF_STMT: LazyLock<Pattern> = LazyLock::new(|| {
    pat::expr_stmt(pat::invoke(
        pat::static_member("Monitor", "Enter"),
        vec![
            Pattern::any_named("enter"),
            pat::unop(
                UnaryOperator::Ref,
                Pattern::capture("flag_ref", pat::ident_any()),
            ),
        ],
    ))
});

/// v4 flag reset: `bool f = false;` or `f = false;`
static FLAG_CLEAR: LazyLock<Pattern> = LazyLock::new(|| {
    Pattern::choice(vec![
        Pattern::capture("flag_decl", pat::var_decl(pat::lit_bool(false))),
        pat::assign_stmt(Pattern::capture("flag_set", pat::ident_any()), pat::lit_bool(false)),
    ])
});

// ----------------------------------------------------------------------
// Target unification
// ----------------------------------------------------------------------

/// The locked object from the enter argument, unified with the exit
/// target. Returns the expression node to become the lock target, plus
/// the temporary assigned by an inner `obj = x` form (which must then be
/// dead).
fn unify_targets(arena: &Arena, enter: NodeId, exit: NodeId) -> Option<(NodeId, Option<String>)> {
    if arena.structurally_equal(enter, exit) {
        // The shared expression survives as the lock target; nothing is
        // eliminated here.
        return Some((enter, None));
    }
    if let NodeKind::Assignment = arena.kind(enter) {
        let target = arena.child(enter, Role::Target)?;
        let value = arena.child(enter, Role::Value)?;
        if arena.structurally_equal(target, exit) {
            let NodeKind::Identifier { name } = arena.kind(target) else {
                return None;
            };
            return Some((value, Some(name.clone())));
        }
    }
    None
}

fn ident_name(arena: &Arena, id: NodeId) -> Option<&str> {
    match arena.kind(id) {
        NodeKind::Identifier { name } => Some(name),
        _ => None,
    }
}

struct V4Shape {
    flag: String,
    enter_stmt: NodeId,
    enter_arg: NodeId,
    exit_arg: NodeId,
}

fn parse_v4(arena: &Arena, prev: NodeId, body: NodeId, finally: NodeId) -> Option<V4Shape> {
    let clear = match_node(arena, &FLAG_CLEAR, prev)?;
    let flag = flag_name(arena, &clear)?;

    let fin = match_node(arena, &FLAG_EXIT_FINALLY, finally)?;
    if fin.get_one("flag").and_then(|f| ident_name(arena, f)) != Some(flag.as_str()) {
        return None;
    }
    let exit_arg = fin.get_one("exit")?;

    let enter_stmt = arena.children_with_role(body, Role::Body).next()?;
    let enter = match_node(arena, &ENTER_REF_STMT, enter_stmt)?;
    if enter
        .get_one("flag_ref")
        .and_then(|f| ident_name(arena, f))
        != Some(flag.as_str())
    {
        return None;
    }
    Some(V4Shape {
        flag,
        enter_stmt,
        enter_arg: enter.get_one("enter")?,
        exit_arg,
    })
}

fn flag_name(arena: &Arena, clear: &Captures) -> Option<String> {
    if let Some(decl) = clear.get_one("flag_decl") {
        if let NodeKind::VariableDeclaration { name, .. } = arena.kind(decl) {
            return Some(name.clone());
        }
    }
    clear
        .get_one("flag_set")
        .and_then(|f| ident_name(arena, f))
        .map(str::to_string)
}

/// Mentions of `var` under `node`, excluding the `skip` subtree.
fn mentions_outside(arena: &Arena, var: &str, node: NodeId, skip: NodeId) -> bool {
    let mut stack = vec![node];
    while let Some(id) = stack.pop() {
        if id == skip {
            continue;
        }
        if matches!(arena.kind(id), NodeKind::Identifier { name } if name == var) {
            return true;
        }
        for child in arena.children(id) {
            stack.push(child.id);
        }
    }
    false
}

// ----------------------------------------------------------------------
// Recognizer
// ----------------------------------------------------------------------

impl Recognizer for LockRecovery {
    fn name(&self) -> &'static str {
        "lock"
    }

    fn applies_to(&self, kind: &NodeKind) -> bool {
        matches!(kind, NodeKind::Try)
    }

    fn try_rewrite(&self, cx: &mut PassContext<'_>, node: NodeId) -> PassResult<Rewrite> {
        let arena = &mut *cx.arena;
        if !matches!(arena.kind(node), NodeKind::Try)
            || arena.children_with_role(node, Role::Catch).next().is_some()
        {
            return Ok(Rewrite::Declined);
        }
        let (Some(body), Some(finally)) =
            (arena.child(node, Role::Body), arena.child(node, Role::Finally))
        else {
            return Ok(Rewrite::Declined);
        };
        let Some(parent) = arena.parent(node) else {
            return Ok(Rewrite::Declined);
        };
        if !matches!(arena.kind(parent), NodeKind::Block) {
            return Ok(Rewrite::Declined);
        }
        let Some(prev) = arena.prev_sibling(node) else {
            return Ok(Rewrite::Declined);
        };

        // v2: enter statement directly before the try.
        if let Some(enter) = match_node(arena, &ENTER_STMT, prev) {
            if let Some(fin) = match_node(arena, &EXIT_FINALLY, finally) {
                let (Some(enter_arg), Some(exit_arg)) =
                    (enter.get_one("enter"), fin.get_one("exit"))
                else {
                    return Ok(Rewrite::Declined);
                };
                let Some((target, temp)) = unify_targets(arena, enter_arg, exit_arg) else {
                    return Ok(Rewrite::Declined);
                };
                // Reassigning the locked variable in the body would make
                // the exit unlock a different object.
                if let Some(name) = ident_name(arena, target).map(str::to_string) {
                    if reassigned_in(arena, &name, body) {
                        return Ok(Rewrite::Declined);
                    }
                }
                if let Some(temp) = &temp {
                    if reassigned_in(arena, temp, body)
                        || !value_is_dead_after(arena, temp, node, parent, &cx.cancel)?
                    {
                        return Ok(Rewrite::Declined);
                    }
                }
                debug!(shape = "v2", "recovering lock statement");

                let lock = arena.alloc(NodeKind::Lock);
                arena.detach(target);
                arena.detach(body);
                arena.replace(node, lock);
                arena.detach(prev);
                arena.absorb_subtree_provenance(prev, lock);
                arena.absorb_subtree_provenance(node, lock);
                arena.append_child(lock, Role::Target, target);
                arena.append_child(lock, Role::Body, body);
                return Ok(Rewrite::Applied(lock));
            }
        }

        // v4: flag cleared before the try, enter-by-ref as the first body
        // statement, conditional exit.
        let Some(shape) = parse_v4(arena, prev, body, finally) else {
            return Ok(Rewrite::Declined);
        };
        let Some((target, temp)) = unify_targets(arena, shape.enter_arg, shape.exit_arg) else {
            return Ok(Rewrite::Declined);
        };
        // The flag must have no other use and must die with the construct.
        if mentions_outside(arena, &shape.flag, body, shape.enter_stmt)
            || !value_is_dead_after(arena, &shape.flag, node, parent, &cx.cancel)?
        {
            return Ok(Rewrite::Declined);
        }
        if let Some(name) = ident_name(arena, target).map(str::to_string) {
            if reassigned_in(arena, &name, body) {
                return Ok(Rewrite::Declined);
            }
        }
        if let Some(temp) = &temp {
            if reassigned_in(arena, temp, body)
                || !value_is_dead_after(arena, temp, node, parent, &cx.cancel)?
            {
                return Ok(Rewrite::Declined);
            }
        }
        debug!(shape = "v4", flag = %shape.flag, "recovering lock statement");

        let lock = arena.alloc(NodeKind::Lock);
        arena.detach(target);
        arena.detach(shape.enter_stmt);
        arena.absorb_subtree_provenance(shape.enter_stmt, lock);
        arena.detach(body);
        arena.replace(node, lock);
        arena.detach(prev);
        arena.absorb_subtree_provenance(prev, lock);
        arena.absorb_subtree_provenance(node, lock);
        arena.append_child(lock, Role::Target, target);
        arena.append_child(lock, Role::Body, body);
        Ok(Rewrite::Applied(lock))
    }
}
