// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Degenerate-shape cleanup.
//!
//! Earlier passes apply independently and can leave behind vestigial
//! nesting: a try/finally whose protected body is exactly one try/catch
//! (the two merge into a single statement when their clauses are
//! disjoint), and an `else` block holding a single `if` (which reads as
//! an else-if chain). These run last in the catalogue.

use resugar_tree::{NodeId, NodeKind, Role};
use tracing::debug;

use crate::context::PassContext;
use crate::error::PassResult;
use crate::recognizers::{Recognizer, Rewrite};

/// `try { try { A } catch { B } } finally { C }` merges into one
/// try/catch/finally. Only fires when the clauses are disjoint: the outer
/// try carries no catches and the inner one no finally.
pub struct FlattenNestedTry;

impl Recognizer for FlattenNestedTry {
    fn name(&self) -> &'static str {
        "flatten-nested-try"
    }

    fn applies_to(&self, kind: &NodeKind) -> bool {
        matches!(kind, NodeKind::Try)
    }

    fn try_rewrite(&self, cx: &mut PassContext<'_>, node: NodeId) -> PassResult<Rewrite> {
        let arena = &mut *cx.arena;
        if !matches!(arena.kind(node), NodeKind::Try) {
            return Ok(Rewrite::Declined);
        }
        let Some(finally) = arena.child(node, Role::Finally) else {
            return Ok(Rewrite::Declined);
        };
        if arena.children_with_role(node, Role::Catch).next().is_some() {
            return Ok(Rewrite::Declined);
        }
        let Some(body) = arena.child(node, Role::Body) else {
            return Ok(Rewrite::Declined);
        };
        let stmts: Vec<NodeId> = arena.children_with_role(body, Role::Body).collect();
        let [inner] = stmts[..] else {
            return Ok(Rewrite::Declined);
        };
        if !matches!(arena.kind(inner), NodeKind::Try) {
            return Ok(Rewrite::Declined);
        }
        if arena.child(inner, Role::Finally).is_some()
            || arena.children_with_role(inner, Role::Catch).next().is_none()
        {
            return Ok(Rewrite::Declined);
        }

        debug!("flattening nested try");
        arena.detach(inner);
        arena.detach(finally);
        arena.replace(node, inner);
        arena.absorb_subtree_provenance(node, inner);
        arena.append_child(inner, Role::Finally, finally);
        Ok(Rewrite::Applied(inner))
    }
}

/// `else { if (..) .. }` becomes `else if (..) ..`.
pub struct FlattenElseIf;

impl Recognizer for FlattenElseIf {
    fn name(&self) -> &'static str {
        "flatten-else-if"
    }

    fn applies_to(&self, kind: &NodeKind) -> bool {
        matches!(kind, NodeKind::If)
    }

    fn try_rewrite(&self, cx: &mut PassContext<'_>, node: NodeId) -> PassResult<Rewrite> {
        let arena = &mut *cx.arena;
        if !matches!(arena.kind(node), NodeKind::If) {
            return Ok(Rewrite::Declined);
        }
        let Some(els) = arena.child(node, Role::Else) else {
            return Ok(Rewrite::Declined);
        };
        if !matches!(arena.kind(els), NodeKind::Block) {
            return Ok(Rewrite::Declined);
        }
        let stmts: Vec<NodeId> = arena.children_with_role(els, Role::Body).collect();
        let [inner] = stmts[..] else {
            return Ok(Rewrite::Declined);
        };
        if !matches!(arena.kind(inner), NodeKind::If) {
            return Ok(Rewrite::Declined);
        }

        debug!("flattening else-if");
        arena.detach(inner);
        arena.replace(els, inner);
        arena.absorb_subtree_provenance(els, inner);
        Ok(Rewrite::Applied(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CancellationToken, PassContext};
    use crate::env::DefaultEnvironment;
    use resugar_tree::{build, Arena, IlRange};

    fn apply(arena: &mut Arena, rec: &dyn Recognizer, node: NodeId) -> Rewrite {
        let env = DefaultEnvironment;
        let mut cx = PassContext::new(arena, &env, CancellationToken::new());
        rec.try_rewrite(&mut cx, node).unwrap()
    }

    fn call_stmt(arena: &mut Arena, name: &str) -> NodeId {
        let callee = build::ident(arena, name);
        let call = build::invoke(arena, callee, vec![]);
        build::expr_stmt(arena, call)
    }

    #[test]
    fn disjoint_nested_try_merges() {
        let mut arena = Arena::new();
        let a = call_stmt(&mut arena, "a");
        let inner_body = build::block(&mut arena, vec![a]);
        let b = call_stmt(&mut arena, "b");
        let handler = build::block(&mut arena, vec![b]);
        let catch = build::catch_clause(&mut arena, Some("Exception"), Some("ex"), handler);
        let inner = build::try_stmt(&mut arena, inner_body, vec![catch], None);
        let outer_body = build::block(&mut arena, vec![inner]);
        let c = call_stmt(&mut arena, "c");
        let fin = build::block(&mut arena, vec![c]);
        let outer = build::try_finally(&mut arena, outer_body, fin);
        let root = build::block(&mut arena, vec![outer]);
        arena.provenance_mut(outer).add(IlRange::new(0, 4));
        arena.provenance_mut(inner).add(IlRange::new(4, 20));
        let before = arena.collect_provenance(root);

        assert_eq!(
            apply(&mut arena, &FlattenNestedTry, outer),
            Rewrite::Applied(inner)
        );
        // One try with body, catch and finally all attached.
        assert_eq!(arena.children(root).len(), 1);
        assert!(arena.child(inner, Role::Finally).is_some());
        assert!(arena.children_with_role(inner, Role::Catch).next().is_some());
        assert_eq!(arena.collect_provenance(root), before);
    }

    #[test]
    fn outer_try_with_catch_declines() {
        let mut arena = Arena::new();
        let a = call_stmt(&mut arena, "a");
        let inner_body = build::block(&mut arena, vec![a]);
        let b = call_stmt(&mut arena, "b");
        let handler = build::block(&mut arena, vec![b]);
        let catch = build::catch_clause(&mut arena, None, None, handler);
        let inner = build::try_stmt(&mut arena, inner_body, vec![catch], None);
        let outer_body = build::block(&mut arena, vec![inner]);
        let c = call_stmt(&mut arena, "c");
        let handler2 = build::block(&mut arena, vec![c]);
        let catch2 = build::catch_clause(&mut arena, None, None, handler2);
        let d = call_stmt(&mut arena, "d");
        let fin = build::block(&mut arena, vec![d]);
        let outer = build::try_stmt(&mut arena, outer_body, vec![catch2], Some(fin));
        assert_eq!(apply(&mut arena, &FlattenNestedTry, outer), Rewrite::Declined);
    }

    #[test]
    fn extra_statement_beside_inner_try_declines() {
        let mut arena = Arena::new();
        let a = call_stmt(&mut arena, "a");
        let inner_body = build::block(&mut arena, vec![a]);
        let b = call_stmt(&mut arena, "b");
        let handler = build::block(&mut arena, vec![b]);
        let catch = build::catch_clause(&mut arena, None, None, handler);
        let inner = build::try_stmt(&mut arena, inner_body, vec![catch], None);
        let extra = call_stmt(&mut arena, "x");
        let outer_body = build::block(&mut arena, vec![inner, extra]);
        let c = call_stmt(&mut arena, "c");
        let fin = build::block(&mut arena, vec![c]);
        let outer = build::try_finally(&mut arena, outer_body, fin);
        assert_eq!(apply(&mut arena, &FlattenNestedTry, outer), Rewrite::Declined);
    }

    #[test]
    fn single_if_else_block_flattens() {
        let mut arena = Arena::new();
        let c2 = build::ident(&mut arena, "c2");
        let t2 = call_stmt(&mut arena, "b");
        let then2 = build::block(&mut arena, vec![t2]);
        let inner = build::if_stmt(&mut arena, c2, then2, None);
        let els = build::block(&mut arena, vec![inner]);
        arena.provenance_mut(els).add(IlRange::new(8, 10));
        let c1 = build::ident(&mut arena, "c1");
        let t1 = call_stmt(&mut arena, "a");
        let then1 = build::block(&mut arena, vec![t1]);
        let outer = build::if_stmt(&mut arena, c1, then1, Some(els));
        let before = arena.collect_provenance(outer);

        assert_eq!(
            apply(&mut arena, &FlattenElseIf, outer),
            Rewrite::Applied(outer)
        );
        assert_eq!(arena.child(outer, Role::Else), Some(inner));
        assert_eq!(arena.collect_provenance(outer), before);
        // Nothing more to do on a second offer.
        assert_eq!(apply(&mut arena, &FlattenElseIf, outer), Rewrite::Declined);
    }

    #[test]
    fn else_block_with_two_statements_declines() {
        let mut arena = Arena::new();
        let c2 = build::ident(&mut arena, "c2");
        let t2 = call_stmt(&mut arena, "b");
        let then2 = build::block(&mut arena, vec![t2]);
        let inner = build::if_stmt(&mut arena, c2, then2, None);
        let extra = call_stmt(&mut arena, "x");
        let els = build::block(&mut arena, vec![inner, extra]);
        let c1 = build::ident(&mut arena, "c1");
        let t1 = call_stmt(&mut arena, "a");
        let then1 = build::block(&mut arena, vec![t1]);
        let outer = build::if_stmt(&mut arena, c1, then1, Some(els));
        assert_eq!(apply(&mut arena, &FlattenElseIf, outer), Rewrite::Declined);
    }
}
