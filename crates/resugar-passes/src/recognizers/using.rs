// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Resource-acquisition (`using`) recovery.
//!
//! Matches an acquisition statement immediately followed by a try/finally
//! whose finally body disposes the acquired variable, in one of three
//! compiler shapes:
//!
//! - unconditional dispose (`v.Dispose();`), the value-type flavor;
//! - null-guarded dispose (`if (v != null) v.Dispose();`);
//! - cast-to-disposable (`IDisposable d = (IDisposable)v; if (d != null)
//!   d.Dispose();`), where the handle variable is separate from the
//!   acquired one and both must pass the legality check.
//!
//! Legality: the variable is never reassigned inside the protected body,
//! and its value is dead past the construct. When the body never reads the
//! variable at all it is elided and the initializer becomes the resource
//! expression directly.

use std::sync::LazyLock;

use resugar_tree::{Arena, BinaryOperator, NodeId, NodeKind, Role};
use resugar_match::{match_node, pat, Pattern};
use tracing::debug;

use crate::analysis::{mentions, value_is_dead_after};
use crate::context::PassContext;
use crate::error::PassResult;
use crate::recognizers::{Recognizer, Rewrite};

pub struct UsingRecovery;

// ----------------------------------------------------------------------
// Finally-body patterns
// ----------------------------------------------------------------------

fn dispose_call(target: Pattern) -> Pattern {
    pat::expr_stmt(pat::call_method(target, "Dispose", vec![]))
}

fn null_check(name: &'static str) -> Pattern {
    let target = || Pattern::capture(name, pat::ident_any());
    Pattern::choice(vec![
        pat::binop(BinaryOperator::Ne, target(), pat::lit_null()),
        pat::binop(BinaryOperator::Ne, pat::lit_null(), target()),
    ])
}

fn stmt_or_block(stmt: Pattern) -> Pattern {
    Pattern::choice(vec![pat::block(vec![stmt.clone()]), stmt])
}

/// `v.Dispose();` — possibly through an interface cast.
static DIRECT_DISPOSE: LazyLock<Pattern> = LazyLock::new(|| {
    pat::block(vec![dispose_call(Pattern::choice(vec![
        Pattern::capture("disposed", pat::ident_any()),
        pat::cast_any(Pattern::capture("disposed", pat::ident_any())),
    ]))])
});

/// `if (v != null) v.Dispose();`
static GUARDED_DISPOSE: LazyLock<Pattern> = LazyLock::new(|| {
    pat::block(vec![pat::if_no_else(
        null_check("checked"),
        stmt_or_block(dispose_call(Pattern::capture("disposed", pat::ident_any()))),
    )])
});

/// `IDisposable d = (IDisposable)v; if (d != null) d.Dispose();`
static CAST_HANDLE_DISPOSE: LazyLock<Pattern> = LazyLock::new(|| {
    pat::block(vec![
        Pattern::capture(
            "handle_decl",
            pat::var_decl(pat::cast_any(Pattern::capture("disposed", pat::ident_any()))),
        ),
        pat::if_no_else(
            null_check("checked"),
            stmt_or_block(dispose_call(Pattern::capture("handle_use", pat::ident_any()))),
        ),
    ])
});

// ----------------------------------------------------------------------
// Shape parsing
// ----------------------------------------------------------------------

struct Acquisition {
    var: String,
    ty: Option<String>,
    init: NodeId,
}

/// `v = init;` or `T v = init;` as the statement before the try.
fn parse_acquisition(arena: &Arena, stmt: NodeId) -> Option<Acquisition> {
    match arena.kind(stmt) {
        NodeKind::VariableDeclaration { name, ty } => {
            let init = arena.child(stmt, Role::Initializer)?;
            Some(Acquisition {
                var: name.clone(),
                ty: ty.clone(),
                init,
            })
        }
        NodeKind::ExpressionStatement => {
            let assign = arena.child(stmt, Role::Value)?;
            if !matches!(arena.kind(assign), NodeKind::Assignment) {
                return None;
            }
            let target = arena.child(assign, Role::Target)?;
            let NodeKind::Identifier { name } = arena.kind(target) else {
                return None;
            };
            let init = arena.child(assign, Role::Value)?;
            Some(Acquisition {
                var: name.clone(),
                ty: None,
                init,
            })
        }
        _ => None,
    }
}

fn ident_name(arena: &Arena, id: NodeId) -> Option<&str> {
    match arena.kind(id) {
        NodeKind::Identifier { name } => Some(name),
        _ => None,
    }
}

/// Which variable the finally body disposes, or None when the finally is
/// not a recognized dispose shape.
fn parse_dispose(arena: &Arena, finally: NodeId, var: &str) -> bool {
    if let Some(caps) = match_node(arena, &DIRECT_DISPOSE, finally) {
        let disposed = caps.get_one("disposed");
        return disposed.and_then(|d| ident_name(arena, d)) == Some(var);
    }
    if let Some(caps) = match_node(arena, &GUARDED_DISPOSE, finally) {
        let checked = caps.get_one("checked").and_then(|c| ident_name(arena, c));
        let disposed = caps.get_one("disposed").and_then(|d| ident_name(arena, d));
        return checked == Some(var) && disposed == Some(var);
    }
    if let Some(caps) = match_node(arena, &CAST_HANDLE_DISPOSE, finally) {
        let Some(decl) = caps.get_one("handle_decl") else {
            return false;
        };
        let NodeKind::VariableDeclaration { name: handle, .. } = arena.kind(decl) else {
            return false;
        };
        let handle = handle.clone();
        let cast_of = caps.get_one("disposed").and_then(|d| ident_name(arena, d));
        let checked = caps.get_one("checked").and_then(|c| ident_name(arena, c));
        let used = caps.get_one("handle_use").and_then(|u| ident_name(arena, u));
        // The handle must be the variable checked and disposed, and the
        // cast operand must be the acquired variable.
        return cast_of == Some(var)
            && checked == Some(handle.as_str())
            && used == Some(handle.as_str());
    }
    false
}

/// Any write to `var` under `node` (assignment target, redeclaration, or
/// `out` argument)?
pub(crate) fn reassigned_in(arena: &Arena, var: &str, node: NodeId) -> bool {
    arena.descendants(node).iter().any(|&id| match arena.kind(id) {
        NodeKind::Assignment => arena
            .child(id, Role::Target)
            .and_then(|t| ident_name(arena, t))
            == Some(var),
        NodeKind::VariableDeclaration { name, .. } => name == var,
        NodeKind::UnaryOp {
            op: resugar_tree::UnaryOperator::Out,
        } => arena
            .child(id, Role::Operand)
            .and_then(|o| ident_name(arena, o))
            == Some(var),
        _ => false,
    })
}

// ----------------------------------------------------------------------
// Recognizer
// ----------------------------------------------------------------------

impl Recognizer for UsingRecovery {
    fn name(&self) -> &'static str {
        "using"
    }

    fn applies_to(&self, kind: &NodeKind) -> bool {
        matches!(kind, NodeKind::Try)
    }

    fn try_rewrite(&self, cx: &mut PassContext<'_>, node: NodeId) -> PassResult<Rewrite> {
        let arena = &mut *cx.arena;
        if !matches!(arena.kind(node), NodeKind::Try) {
            return Ok(Rewrite::Declined);
        }
        // try/finally only: a catch clause means this is not a using form.
        if arena.children_with_role(node, Role::Catch).next().is_some() {
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
        let Some(acq_stmt) = arena.prev_sibling(node) else {
            return Ok(Rewrite::Declined);
        };
        let Some(acq) = parse_acquisition(arena, acq_stmt) else {
            return Ok(Rewrite::Declined);
        };
        if !parse_dispose(arena, finally, &acq.var) {
            return Ok(Rewrite::Declined);
        }

        // Legality: no reassignment inside the protected body, and the
        // value must be unobservable past the construct.
        if reassigned_in(arena, &acq.var, body) {
            return Ok(Rewrite::Declined);
        }
        if !value_is_dead_after(arena, &acq.var, node, parent, &cx.cancel)? {
            return Ok(Rewrite::Declined);
        }

        let elide = !mentions(arena, &acq.var, body);
        debug!(var = %acq.var, elide, "recovering using statement");

        // Surgery. The initializer and the protected body survive; the
        // acquisition statement, the try node, and the finally are consumed
        // and their provenance lands on the new using node.
        let using = arena.alloc(NodeKind::Using);
        arena.detach(acq.init);
        arena.detach(body);
        arena.replace(node, using);
        arena.detach(acq_stmt);
        arena.absorb_subtree_provenance(acq_stmt, using);
        arena.absorb_subtree_provenance(node, using);

        let resource = if elide {
            acq.init
        } else {
            resugar_tree::build::var_decl(arena, &acq.var, acq.ty.as_deref(), Some(acq.init))
        };
        arena.append_child(using, Role::Resource, resource);
        arena.append_child(using, Role::Body, body);

        Ok(Rewrite::Applied(using))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancellationToken;
    use crate::env::DefaultEnvironment;
    use resugar_tree::build;
    use resugar_tree::IlRange;

    fn apply(arena: &mut Arena, node: NodeId) -> Rewrite {
        let env = DefaultEnvironment;
        let mut cx = PassContext::new(arena, &env, CancellationToken::new());
        UsingRecovery.try_rewrite(&mut cx, node).unwrap()
    }

    /// `v = File.Open(...); try { <body> } finally { <finally> }`
    fn acquire_try(
        arena: &mut Arena,
        var: &str,
        body_stmts: Vec<NodeId>,
        finally_stmts: Vec<NodeId>,
    ) -> (NodeId, NodeId, NodeId) {
        let target = build::ident(arena, var);
        let callee = build::static_member(arena, "File", "Open");
        let path = build::lit_str(arena, "log.txt");
        let init = build::invoke(arena, callee, vec![path]);
        let acq = build::assign_stmt(arena, target, init);
        let body = build::block(arena, body_stmts);
        let fin = build::block(arena, finally_stmts);
        let t = build::try_finally(arena, body, fin);
        let blk = build::block(arena, vec![acq, t]);
        (blk, acq, t)
    }

    fn direct_dispose(arena: &mut Arena, var: &str) -> NodeId {
        let v = build::ident(arena, var);
        let call = build::call_method(arena, v, "Dispose", vec![]);
        build::expr_stmt(arena, call)
    }

    fn guarded_dispose(arena: &mut Arena, var: &str) -> NodeId {
        let v = build::ident(arena, var);
        let null = build::lit_null(arena);
        let cond = build::binop(arena, BinaryOperator::Ne, v, null);
        let call = direct_dispose(arena, var);
        let then = build::block(arena, vec![call]);
        build::if_stmt(arena, cond, then, None)
    }

    fn read_of(arena: &mut Arena, var: &str) -> NodeId {
        let v = build::ident(arena, var);
        let call = build::call_method(arena, v, "Read", vec![]);
        build::expr_stmt(arena, call)
    }

    #[test]
    fn unconditional_dispose_recovers_with_declaration() {
        let mut arena = Arena::new();
        let use_stmt = read_of(&mut arena, "stream");
        let dispose = direct_dispose(&mut arena, "stream");
        let (blk, _, t) = acquire_try(&mut arena, "stream", vec![use_stmt], vec![dispose]);

        let Rewrite::Applied(using) = apply(&mut arena, t) else {
            panic!("expected the rewrite to apply");
        };
        assert!(matches!(arena.kind(using), NodeKind::Using));
        // Acquisition statement is gone; using holds a declaration resource.
        assert_eq!(arena.children(blk).len(), 1);
        let resource = arena.child(using, Role::Resource).unwrap();
        assert!(matches!(
            arena.kind(resource),
            NodeKind::VariableDeclaration { name, .. } if name == "stream"
        ));
    }

    #[test]
    fn null_guarded_dispose_recovers() {
        let mut arena = Arena::new();
        let use_stmt = read_of(&mut arena, "stream");
        let dispose = guarded_dispose(&mut arena, "stream");
        let (_, _, t) = acquire_try(&mut arena, "stream", vec![use_stmt], vec![dispose]);
        assert!(matches!(apply(&mut arena, t), Rewrite::Applied(_)));
    }

    #[test]
    fn cast_handle_dispose_recovers() {
        let mut arena = Arena::new();
        let use_stmt = read_of(&mut arena, "stream");
        // IDisposable d = (IDisposable)stream; if (d != null) d.Dispose();
        let v = build::ident(&mut arena, "stream");
        let cast = build::cast(&mut arena, "IDisposable", v);
        let decl = build::var_decl(&mut arena, "d", Some("IDisposable"), Some(cast));
        let guard = guarded_dispose(&mut arena, "d");
        let (_, _, t) = acquire_try(&mut arena, "stream", vec![use_stmt], vec![decl, guard]);
        assert!(matches!(apply(&mut arena, t), Rewrite::Applied(_)));
    }

    #[test]
    fn unreferenced_variable_is_elided() {
        let mut arena = Arena::new();
        let other = read_of(&mut arena, "other");
        let dispose = direct_dispose(&mut arena, "stream");
        let (_, _, t) = acquire_try(&mut arena, "stream", vec![other], vec![dispose]);

        let Rewrite::Applied(using) = apply(&mut arena, t) else {
            panic!("expected the rewrite to apply");
        };
        // Resource is the initializer expression, not a declaration.
        let resource = arena.child(using, Role::Resource).unwrap();
        assert!(matches!(arena.kind(resource), NodeKind::Invocation));
        assert!(!mentions(&arena, "stream", using));
    }

    #[test]
    fn reassignment_in_body_declines() {
        let mut arena = Arena::new();
        let target = build::ident(&mut arena, "stream");
        let null = build::lit_null(&mut arena);
        let clobber = build::assign_stmt(&mut arena, target, null);
        let dispose = direct_dispose(&mut arena, "stream");
        let (_, _, t) = acquire_try(&mut arena, "stream", vec![clobber], vec![dispose]);
        assert_eq!(apply(&mut arena, t), Rewrite::Declined);
    }

    #[test]
    fn read_after_the_construct_declines() {
        let mut arena = Arena::new();
        let use_stmt = read_of(&mut arena, "stream");
        let dispose = direct_dispose(&mut arena, "stream");
        let (blk, _, t) = acquire_try(&mut arena, "stream", vec![use_stmt], vec![dispose]);
        let after = read_of(&mut arena, "stream");
        arena.append_child(blk, Role::Body, after);
        assert_eq!(apply(&mut arena, t), Rewrite::Declined);
    }

    #[test]
    fn disposing_a_different_variable_declines() {
        let mut arena = Arena::new();
        let use_stmt = read_of(&mut arena, "stream");
        let dispose = direct_dispose(&mut arena, "other");
        let (_, _, t) = acquire_try(&mut arena, "stream", vec![use_stmt], vec![dispose]);
        assert_eq!(apply(&mut arena, t), Rewrite::Declined);
    }

    #[test]
    fn provenance_is_conserved() {
        let mut arena = Arena::new();
        let use_stmt = read_of(&mut arena, "stream");
        let dispose = direct_dispose(&mut arena, "stream");
        let (blk, acq, t) = acquire_try(&mut arena, "stream", vec![use_stmt], vec![dispose]);
        arena.provenance_mut(acq).add(IlRange::new(0, 8));
        arena.provenance_mut(t).add(IlRange::new(8, 40));
        arena.provenance_mut(dispose).add(IlRange::new(32, 40));
        let before = arena.collect_provenance(blk);

        assert!(matches!(apply(&mut arena, t), Rewrite::Applied(_)));
        let after = arena.collect_provenance(blk);
        assert_eq!(before, after);
    }
}
