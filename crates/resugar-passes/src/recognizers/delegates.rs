// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Delegate-construction recovery.
//!
//! An object construction carrying a method-pointer annotation is either:
//!
//! - folded into a direct member access when the pointed-to method is real
//!   source code (method group conversion), or
//! - inlined when the method is compiler-synthesized: its body becomes an
//!   anonymous method, or a lambda when it is a single return. `this`
//!   references in the inlined body are substituted with the delegate's
//!   bound target expression.
//!
//! The synthesized method is looked up by its member reference in the
//! enclosing type declarations; a missing declaration is a malformed-input
//! diagnostic, not a panic.

use resugar_tree::{Annotation, Arena, Literal, MemberRef, NodeId, NodeKind, Role};
use tracing::debug;

use crate::context::PassContext;
use crate::diagnostics::Diagnostic;
use crate::error::PassResult;
use crate::recognizers::{Recognizer, Rewrite};

pub struct DelegateConstruction;

// ----------------------------------------------------------------------
// Lookup and substitution
// ----------------------------------------------------------------------

fn method_pointer(arena: &Arena, node: NodeId) -> Option<MemberRef> {
    arena.annotations(node).iter().find_map(|a| match a {
        Annotation::MethodPointer(member) => Some(member.clone()),
        _ => None,
    })
}

/// Find `member`'s declaration by climbing to the tree root and searching
/// the type declarations there.
fn find_method_decl(arena: &Arena, from: NodeId, member: &MemberRef) -> Option<NodeId> {
    let mut root = from;
    while let Some(parent) = arena.parent(root) {
        root = parent;
    }
    for id in arena.descendants(root) {
        let NodeKind::TypeDeclaration { name } = arena.kind(id) else {
            continue;
        };
        if *name != member.declaring_type {
            continue;
        }
        for child in arena.children(id) {
            if matches!(
                arena.kind(child.id),
                NodeKind::MethodDeclaration { name } if *name == member.name
            ) {
                return Some(child.id);
            }
        }
    }
    None
}

/// Replace every `this` in `subtree` with a copy of `target`.
fn substitute_this(arena: &mut Arena, subtree: NodeId, target: NodeId) {
    if matches!(arena.kind(target), NodeKind::ThisRef) {
        return;
    }
    let this_refs: Vec<NodeId> = arena
        .descendants(subtree)
        .into_iter()
        .filter(|&id| matches!(arena.kind(id), NodeKind::ThisRef))
        .collect();
    for this_ref in this_refs {
        let replacement = arena.clone_subtree(target);
        arena.replace(this_ref, replacement);
    }
}

fn is_null_literal(arena: &Arena, id: NodeId) -> bool {
    matches!(
        arena.kind(id),
        NodeKind::Literal {
            value: Literal::Null
        }
    )
}

/// A body of exactly `return <expr>;` qualifies for the lambda form.
fn single_return_value(arena: &Arena, body: NodeId) -> Option<NodeId> {
    let stmts: Vec<NodeId> = arena.children_with_role(body, Role::Body).collect();
    let [only] = stmts[..] else {
        return None;
    };
    if !matches!(arena.kind(only), NodeKind::Return) {
        return None;
    }
    arena.child(only, Role::Value)
}

// ----------------------------------------------------------------------
// Recognizer
// ----------------------------------------------------------------------

impl Recognizer for DelegateConstruction {
    fn name(&self) -> &'static str {
        "delegates"
    }

    fn applies_to(&self, kind: &NodeKind) -> bool {
        matches!(kind, NodeKind::ObjectCreation { .. })
    }

    fn try_rewrite(&self, cx: &mut PassContext<'_>, node: NodeId) -> PassResult<Rewrite> {
        let arena = &mut *cx.arena;
        let Some(member) = method_pointer(arena, node) else {
            return Ok(Rewrite::Declined);
        };
        let Some(target) = arena.children_with_role(node, Role::Argument).next() else {
            return Ok(Rewrite::Declined);
        };

        // Method group conversion: the method is real source code.
        if !cx.env.is_compiler_generated_method(&member) {
            debug!(method = %member.name, "folding delegate construction to member access");
            let access = arena.alloc(NodeKind::MemberAccess {
                member: member.name.clone(),
            });
            arena.add_annotation(access, Annotation::Method(member.clone()));
            let receiver = if is_null_literal(arena, target) {
                resugar_tree::build::type_ref(arena, &member.declaring_type)
            } else {
                arena.detach(target);
                target
            };
            arena.replace(node, access);
            arena.absorb_subtree_provenance(node, access);
            arena.append_child(access, Role::Target, receiver);
            return Ok(Rewrite::Applied(access));
        }

        // Synthesized method: inline its (already processed) body.
        let Some(decl) = find_method_decl(arena, node, &member) else {
            cx.diagnostics.push(Diagnostic::error(
                "delegates",
                format!(
                    "method pointer {}::{} has no declaration",
                    member.declaring_type, member.name
                ),
                Some(node),
            ));
            return Ok(Rewrite::Declined);
        };
        let Some(method_body) = arena.child(decl, Role::Body) else {
            cx.diagnostics.push(Diagnostic::error(
                "delegates",
                format!("synthesized method {} has no body", member.name),
                Some(node),
            ));
            return Ok(Rewrite::Declined);
        };
        let params: Vec<NodeId> = arena.children_with_role(decl, Role::Parameter).collect();

        let lambda_value = single_return_value(arena, method_body);
        let replacement = match lambda_value {
            Some(value) => {
                debug!(method = %member.name, "inlining delegate body as lambda");
                let lambda = arena.alloc(NodeKind::Lambda);
                for &param in &params {
                    let p = arena.clone_subtree(param);
                    arena.append_child(lambda, Role::Parameter, p);
                }
                let body = arena.clone_subtree(value);
                arena.append_child(lambda, Role::Body, body);
                lambda
            }
            None => {
                debug!(method = %member.name, "inlining delegate body as anonymous method");
                let anon = arena.alloc(NodeKind::AnonymousMethod);
                for &param in &params {
                    let p = arena.clone_subtree(param);
                    arena.append_child(anon, Role::Parameter, p);
                }
                let body = arena.clone_subtree(method_body);
                arena.append_child(anon, Role::Body, body);
                anon
            }
        };
        if !is_null_literal(arena, target) {
            substitute_this(arena, replacement, target);
        }
        arena.replace(node, replacement);
        arena.absorb_subtree_provenance(node, replacement);
        Ok(Rewrite::Applied(replacement))
    }
}
