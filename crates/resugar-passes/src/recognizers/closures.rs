// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Capture-holder (closure) elimination.
//!
//! The compiler lowers captured variables into fields of a synthesized
//! holder type:
//!
//! ```text
//! holder = new <>c__DisplayClass0();
//! holder.limit = limit;          // captured parameter alias
//! holder.$this = this;           // enclosing-instance alias
//! holder.total = 0;              // captured local (no alias form)
//! ... holder.total ... holder.limit ...   (incl. inside inlined lambdas)
//! ```
//!
//! This recognizer runs once per block. It verifies every use of the
//! holder variable is a field access, absorbs the immediately-following
//! alias assignments, synthesizes one collision-free local per remaining
//! field, rewrites every field access accordingly, and deletes the holder.
//! Alias substitution is what collapses the `$this` double indirection and
//! what threads nested holder-to-holder parent pointers: the inner holder
//! is eliminated first, its parent-field accesses become uses of the outer
//! holder, and the re-offered block then eliminates the outer one.

use std::collections::HashMap;

use resugar_tree::{Arena, NodeId, NodeKind, Role};
use tracing::debug;

use crate::context::PassContext;
use crate::diagnostics::Diagnostic;
use crate::error::PassResult;
use crate::recognizers::{Recognizer, Rewrite, Scope};

pub struct CaptureHolderElimination;

// ----------------------------------------------------------------------
// Shape parsing
// ----------------------------------------------------------------------

fn ident_name(arena: &Arena, id: NodeId) -> Option<&str> {
    match arena.kind(id) {
        NodeKind::Identifier { name } => Some(name),
        _ => None,
    }
}

struct HolderSite {
    stmt: NodeId,
    var: String,
    ty: String,
}

/// `holder = new <>c__DisplayClass();` or the declaration form.
fn parse_construction(
    arena: &Arena,
    env: &dyn crate::env::Environment,
    stmt: NodeId,
) -> Option<HolderSite> {
    let (var, init) = match arena.kind(stmt) {
        NodeKind::VariableDeclaration { name, .. } => {
            (name.clone(), arena.child(stmt, Role::Initializer)?)
        }
        NodeKind::ExpressionStatement => {
            let assign = arena.child(stmt, Role::Value)?;
            if !matches!(arena.kind(assign), NodeKind::Assignment) {
                return None;
            }
            let target = arena.child(assign, Role::Target)?;
            (
                ident_name(arena, target)?.to_string(),
                arena.child(assign, Role::Value)?,
            )
        }
        _ => return None,
    };
    let NodeKind::ObjectCreation { ty } = arena.kind(init) else {
        return None;
    };
    if !env.is_compiler_generated_type(ty) {
        return None;
    }
    Some(HolderSite {
        stmt,
        var,
        ty: ty.clone(),
    })
}

struct Alias {
    stmt: NodeId,
    rhs: NodeId,
}

/// `holder.field = <ident|this>;`
fn parse_alias(arena: &Arena, stmt: NodeId, holder: &str) -> Option<(String, Alias)> {
    if !matches!(arena.kind(stmt), NodeKind::ExpressionStatement) {
        return None;
    }
    let assign = arena.child(stmt, Role::Value)?;
    if !matches!(arena.kind(assign), NodeKind::Assignment) {
        return None;
    }
    let target = arena.child(assign, Role::Target)?;
    let NodeKind::MemberAccess { member } = arena.kind(target) else {
        return None;
    };
    if arena
        .child(target, Role::Target)
        .and_then(|t| ident_name(arena, t))
        != Some(holder)
    {
        return None;
    }
    let rhs = arena.child(assign, Role::Value)?;
    if !matches!(
        arena.kind(rhs),
        NodeKind::Identifier { .. } | NodeKind::ThisRef
    ) {
        return None;
    }
    Some((member.clone(), Alias { stmt, rhs }))
}

/// Strip the compiler's `$` marker for local-name synthesis.
fn local_base(field: &str) -> &str {
    field.trim_start_matches('$')
}

// ----------------------------------------------------------------------
// Recognizer
// ----------------------------------------------------------------------

impl CaptureHolderElimination {
    fn eliminate(
        &self,
        cx: &mut PassContext<'_>,
        block: NodeId,
        site: &HolderSite,
    ) -> PassResult<Rewrite> {
        let arena = &mut *cx.arena;

        // Alias assignments directly after the construction.
        let mut aliases: HashMap<String, Alias> = HashMap::new();
        let mut alias_stmts: Vec<NodeId> = Vec::new();
        let mut cursor = arena.next_sibling(site.stmt);
        while let Some(stmt) = cursor {
            let Some((field, alias)) = parse_alias(arena, stmt, &site.var) else {
                break;
            };
            cursor = arena.next_sibling(stmt);
            alias_stmts.push(alias.stmt);
            aliases.insert(field, alias);
        }

        // Every other use of the holder must be a field access. Collect
        // the accesses to rewrite, skipping those inside the construction
        // and alias statements themselves.
        let mut accesses: Vec<(NodeId, String)> = Vec::new();
        let mut bare_decl: Option<NodeId> = None;
        for id in arena.descendants(block) {
            if matches!(
                arena.kind(id),
                NodeKind::VariableDeclaration { name, .. } if *name == site.var
            ) && id != site.stmt
            {
                if arena.child(id, Role::Initializer).is_some() {
                    return Ok(Rewrite::Declined);
                }
                bare_decl = Some(id);
                continue;
            }
            if ident_name(arena, id) != Some(site.var.as_str()) {
                continue;
            }
            if arena.is_ancestor_of(site.stmt, id)
                || alias_stmts.iter().any(|&s| arena.is_ancestor_of(s, id))
            {
                continue;
            }
            let Some(parent) = arena.parent(id) else {
                return Ok(Rewrite::Declined);
            };
            let is_field_access = matches!(arena.kind(parent), NodeKind::MemberAccess { .. })
                && arena.role_of(id) == Some(Role::Target);
            if !is_field_access {
                // Passed around as a first-class value; fail closed.
                return Ok(Rewrite::Declined);
            }
            let NodeKind::MemberAccess { member } = arena.kind(parent) else {
                return Ok(Rewrite::Declined);
            };
            accesses.push((parent, member.clone()));
        }

        // Field records must exist for everything accessed or aliased.
        for field in accesses
            .iter()
            .map(|(_, f)| f.as_str())
            .chain(aliases.keys().map(String::as_str))
        {
            if !cx.env.declares_field(&site.ty, field) {
                cx.diagnostics.push(Diagnostic::error(
                    "closures",
                    format!("capture holder {} has no field record for {field}", site.ty),
                    Some(site.stmt),
                ));
                return Ok(Rewrite::Declined);
            }
        }

        // One local per remaining field, in first-use order, renamed away
        // from anything live in this scope.
        cx.names.collect_scope(arena, block);
        let mut locals: Vec<(String, String)> = Vec::new();
        for (_, field) in &accesses {
            if aliases.contains_key(field) || locals.iter().any(|(f, _)| f == field) {
                continue;
            }
            let local = cx.names.fresh(local_base(field));
            cx.synthesized.push(local.clone());
            locals.push((field.clone(), local));
        }
        debug!(
            holder = %site.var,
            aliases = aliases.len(),
            locals = locals.len(),
            "eliminating capture holder"
        );

        // Rewrite the accesses.
        for (access, field) in accesses {
            let replacement = if let Some(alias) = aliases.get(&field) {
                arena.clone_subtree(alias.rhs)
            } else {
                let local = locals
                    .iter()
                    .find(|(f, _)| f == &field)
                    .map(|(_, l)| l.clone())
                    .unwrap_or(field);
                arena.alloc(NodeKind::Identifier { name: local })
            };
            arena.replace(access, replacement);
            arena.absorb_subtree_provenance(access, replacement);
        }

        // Synthesized declarations take the construction's place; the
        // enclosing block is the provenance carrier of last resort.
        let mut carrier = block;
        for (_, local) in locals.iter().rev() {
            let decl = resugar_tree::build::var_decl(arena, local, None, None);
            arena.insert_after(site.stmt, Role::Body, decl);
            carrier = decl;
        }
        arena.detach(site.stmt);
        arena.absorb_subtree_provenance(site.stmt, carrier);
        for stmt in alias_stmts {
            arena.detach(stmt);
            arena.absorb_subtree_provenance(stmt, carrier);
        }
        if let Some(decl) = bare_decl {
            arena.detach(decl);
            arena.absorb_subtree_provenance(decl, carrier);
        }

        Ok(Rewrite::Applied(block))
    }
}

impl Recognizer for CaptureHolderElimination {
    fn name(&self) -> &'static str {
        "closures"
    }

    fn scope(&self) -> Scope {
        Scope::Block
    }

    fn applies_to(&self, kind: &NodeKind) -> bool {
        matches!(kind, NodeKind::Block)
    }

    fn try_rewrite(&self, cx: &mut PassContext<'_>, node: NodeId) -> PassResult<Rewrite> {
        if !matches!(cx.arena.kind(node), NodeKind::Block) {
            return Ok(Rewrite::Declined);
        }
        let stmts: Vec<NodeId> = cx.arena.children(node).iter().map(|c| c.id).collect();
        for stmt in stmts {
            cx.cancel.checkpoint()?;
            let Some(site) = parse_construction(cx.arena, cx.env, stmt) else {
                continue;
            };
            if let Rewrite::Applied(id) = self.eliminate(cx, node, &site)? {
                return Ok(Rewrite::Applied(id));
            }
        }
        Ok(Rewrite::Declined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancellationToken;
    use crate::env::{DefaultEnvironment, Environment, StaticType};
    use resugar_tree::{build, IlRange, MemberRef};

    fn apply(arena: &mut Arena, block: NodeId) -> (Rewrite, Vec<String>, Vec<Diagnostic>) {
        let env = DefaultEnvironment;
        let mut cx = PassContext::new(arena, &env, CancellationToken::new());
        let out = CaptureHolderElimination.try_rewrite(&mut cx, block).unwrap();
        (out, cx.synthesized, cx.diagnostics)
    }

    fn holder_new(arena: &mut Arena, var: &str) -> NodeId {
        let target = build::ident(arena, var);
        let creation = build::object_creation(arena, "<>c__DisplayClass0", vec![]);
        build::assign_stmt(arena, target, creation)
    }

    /// `holder.field = <rhs>;`
    fn field_assign(arena: &mut Arena, var: &str, field: &str, rhs: NodeId) -> NodeId {
        let holder = build::ident(arena, var);
        let access = build::member(arena, holder, field);
        build::assign_stmt(arena, access, rhs)
    }

    /// `use(holder.field);`
    fn field_use(arena: &mut Arena, var: &str, field: &str) -> NodeId {
        let holder = build::ident(arena, var);
        let access = build::member(arena, holder, field);
        let callee = build::ident(arena, "use");
        let call = build::invoke(arena, callee, vec![access]);
        build::expr_stmt(arena, call)
    }

    #[test]
    fn aliases_substitute_and_fields_become_locals() {
        let mut arena = Arena::new();
        // holder = new DC(); holder.limit = limit; holder.total = 0;
        // use(holder.total); use(holder.limit);
        let ctor = holder_new(&mut arena, "holder");
        let limit = build::ident(&mut arena, "limit");
        let alias = field_assign(&mut arena, "holder", "limit", limit);
        let zero = build::lit_int(&mut arena, 0);
        let init_total = field_assign(&mut arena, "holder", "total", zero);
        let u1 = field_use(&mut arena, "holder", "total");
        let u2 = field_use(&mut arena, "holder", "limit");
        let blk = build::block(&mut arena, vec![ctor, alias, init_total, u1, u2]);

        let (out, synthesized, diags) = apply(&mut arena, blk);
        assert_eq!(out, Rewrite::Applied(blk));
        assert!(diags.is_empty());
        // One local for the non-aliased field only.
        assert_eq!(synthesized, ["total"]);
        // No holder access survives anywhere.
        assert!(!crate::analysis::mentions(&arena, "holder", blk));
        let dump = arena.dump(blk);
        assert!(dump.contains("(ident total)"));
        assert!(dump.contains("(ident limit)"));
    }

    #[test]
    fn this_alias_collapses_double_indirection() {
        let mut arena = Arena::new();
        // holder = new DC(); holder.$this = this; use(holder.$this.offset);
        let ctor = holder_new(&mut arena, "holder");
        let this = build::this_ref(&mut arena);
        let alias = field_assign(&mut arena, "holder", "$this", this);
        let h = build::ident(&mut arena, "holder");
        let inner = build::member(&mut arena, h, "$this");
        let outer = build::member(&mut arena, inner, "offset");
        let callee = build::ident(&mut arena, "use");
        let call = build::invoke(&mut arena, callee, vec![outer]);
        let use_stmt = build::expr_stmt(&mut arena, call);
        let blk = build::block(&mut arena, vec![ctor, alias, use_stmt]);

        let (out, synthesized, _) = apply(&mut arena, blk);
        assert_eq!(out, Rewrite::Applied(blk));
        assert!(synthesized.is_empty());
        // use(this.offset) — a single member access off `this`.
        let target = arena.child(outer, Role::Target).unwrap();
        assert!(matches!(arena.kind(target), NodeKind::ThisRef));
    }

    #[test]
    fn nested_holder_chain_resolves_over_two_offers() {
        let mut arena = Arena::new();
        // outer = new DC0(); outer.x = x;
        // inner = new DC1(); inner.parent = outer;
        // use(inner.parent.x);
        let outer_ctor = holder_new(&mut arena, "outer");
        let x = build::ident(&mut arena, "x");
        let outer_alias = field_assign(&mut arena, "outer", "x", x);
        let inner_ctor = holder_new(&mut arena, "inner");
        let outer_ref = build::ident(&mut arena, "outer");
        let inner_alias = field_assign(&mut arena, "inner", "parent", outer_ref);
        let i = build::ident(&mut arena, "inner");
        let parent_access = build::member(&mut arena, i, "parent");
        let x_access = build::member(&mut arena, parent_access, "x");
        let callee = build::ident(&mut arena, "use");
        let call = build::invoke(&mut arena, callee, vec![x_access]);
        let use_stmt = build::expr_stmt(&mut arena, call);
        let blk = build::block(
            &mut arena,
            vec![outer_ctor, outer_alias, inner_ctor, inner_alias, use_stmt],
        );

        // First offer: outer is blocked (it flows into inner's field), but
        // inner eliminates and parent accesses become outer accesses.
        let (out, _, _) = apply(&mut arena, blk);
        assert_eq!(out, Rewrite::Applied(blk));
        assert!(!crate::analysis::mentions(&arena, "inner", blk));
        assert!(crate::analysis::mentions(&arena, "outer", blk));

        // Re-offer: now the outer holder goes too.
        let (out, _, _) = apply(&mut arena, blk);
        assert_eq!(out, Rewrite::Applied(blk));
        assert!(!crate::analysis::mentions(&arena, "outer", blk));
        // use(x) survives.
        assert!(crate::analysis::mentions(&arena, "x", blk));
    }

    #[test]
    fn holder_escaping_as_a_value_declines() {
        let mut arena = Arena::new();
        let ctor = holder_new(&mut arena, "holder");
        let h = build::ident(&mut arena, "holder");
        let callee = build::ident(&mut arena, "use");
        let call = build::invoke(&mut arena, callee, vec![h]);
        let escape = build::expr_stmt(&mut arena, call);
        let blk = build::block(&mut arena, vec![ctor, escape]);
        let (out, _, _) = apply(&mut arena, blk);
        assert_eq!(out, Rewrite::Declined);
    }

    #[test]
    fn local_names_avoid_collisions() {
        let mut arena = Arena::new();
        // A live local already named `total`.
        let zero = build::lit_int(&mut arena, 0);
        let existing = build::var_decl(&mut arena, "total", None, Some(zero));
        let ctor = holder_new(&mut arena, "holder");
        let one = build::lit_int(&mut arena, 1);
        let init = field_assign(&mut arena, "holder", "total", one);
        let u = field_use(&mut arena, "holder", "total");
        let blk = build::block(&mut arena, vec![existing, ctor, init, u]);

        let (out, synthesized, _) = apply(&mut arena, blk);
        assert_eq!(out, Rewrite::Applied(blk));
        assert_eq!(synthesized, ["total_2"]);
    }

    #[test]
    fn missing_field_record_reports_and_declines() {
        struct NoFields;
        impl Environment for NoFields {
            fn is_value_type(&self, _: &str) -> bool {
                false
            }
            fn is_compiler_generated_type(&self, ty: &str) -> bool {
                ty.contains('<')
            }
            fn is_compiler_generated_method(&self, _: &MemberRef) -> bool {
                false
            }
            fn static_type(&self, _: &Arena, _: NodeId) -> StaticType {
                StaticType::Other
            }
            fn declares_field(&self, _: &str, _: &str) -> bool {
                false
            }
        }

        let mut arena = Arena::new();
        let ctor = holder_new(&mut arena, "holder");
        let u = field_use(&mut arena, "holder", "total");
        let blk = build::block(&mut arena, vec![ctor, u]);

        let env = NoFields;
        let mut cx = PassContext::new(&mut arena, &env, CancellationToken::new());
        let out = CaptureHolderElimination.try_rewrite(&mut cx, blk).unwrap();
        assert_eq!(out, Rewrite::Declined);
        assert_eq!(cx.diagnostics.len(), 1);
        assert!(cx.diagnostics[0].message.contains("no field record"));
    }

    #[test]
    fn provenance_lands_on_the_synthesized_declaration() {
        let mut arena = Arena::new();
        let ctor = holder_new(&mut arena, "holder");
        let zero = build::lit_int(&mut arena, 0);
        let init = field_assign(&mut arena, "holder", "total", zero);
        let u = field_use(&mut arena, "holder", "total");
        let blk = build::block(&mut arena, vec![ctor, init, u]);
        arena.provenance_mut(ctor).add(IlRange::new(0, 6));
        let before = arena.collect_provenance(blk);

        let (out, _, _) = apply(&mut arena, blk);
        assert_eq!(out, Rewrite::Applied(blk));
        assert_eq!(arena.collect_provenance(blk), before);
    }
}
