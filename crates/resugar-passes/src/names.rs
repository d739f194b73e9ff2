// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Used-name tracking and collision-free name synthesis.
//!
//! Closure elimination turns capture-holder fields into locals; the new
//! local names must not collide with anything live in the enclosing or
//! nested scopes. The tracker is per-run state owned by the pass context,
//! never ambient, and is cleared by the driver's `reset`.

use std::collections::HashSet;

use resugar_tree::{Arena, NodeId, NodeKind, Role};

/// Tracks the identifiers in use within a scope subtree and mints fresh
/// ones on demand.
#[derive(Debug, Default, Clone)]
pub struct NameTracker {
    used: HashSet<String>,
}

impl NameTracker {
    pub fn new() -> Self {
        NameTracker::default()
    }

    /// Forget everything (per-run cache clearing).
    pub fn clear(&mut self) {
        self.used.clear();
    }

    /// Record every identifier, declaration, and parameter name that
    /// appears anywhere under `scope` (nested scopes included).
    pub fn collect_scope(&mut self, arena: &Arena, scope: NodeId) {
        for id in arena.descendants(scope) {
            match arena.kind(id) {
                NodeKind::Identifier { name }
                | NodeKind::VariableDeclaration { name, .. }
                | NodeKind::Parameter { name, .. }
                | NodeKind::Foreach { item: name, .. } => {
                    self.used.insert(name.clone());
                }
                _ => {}
            }
        }
    }

    pub fn mark_used(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Return `base` if free, otherwise `base_2`, `base_3`, ... The chosen
    /// name is recorded as used.
    pub fn fresh(&mut self, base: &str) -> String {
        if !self.is_used(base) {
            self.used.insert(base.to_string());
            return base.to_string();
        }
        for i in 2u32.. {
            let candidate = format!("{base}_{i}");
            if !self.is_used(&candidate) {
                self.used.insert(candidate.clone());
                return candidate;
            }
        }
        unreachable!("exhausted all numeric suffixes")
    }
}

/// Rewrite every `Identifier { old }` under `scope` to `new`, skipping
/// nested declarations that shadow `old`.
///
/// This is the renumber/rename utility closure elimination uses after it
/// has picked collision-free local names.
pub fn rename_identifiers(arena: &mut Arena, scope: NodeId, old: &str, new: &str) -> usize {
    let mut renamed = 0;
    let mut stack = vec![scope];
    while let Some(id) = stack.pop() {
        // A nested lambda or anonymous method redeclaring the name shadows
        // it; do not descend.
        let shadows = matches!(arena.kind(id), NodeKind::Lambda | NodeKind::AnonymousMethod)
            && arena
                .children_with_role(id, Role::Parameter)
                .any(|p| matches!(arena.kind(p), NodeKind::Parameter { name, .. } if name == old));
        if shadows {
            continue;
        }
        if let NodeKind::Identifier { name } = arena.kind_mut(id) {
            if name == old {
                *name = new.to_string();
                renamed += 1;
            }
        }
        for child in arena.children(id).iter().rev() {
            stack.push(child.id);
        }
    }
    renamed
}

#[cfg(test)]
mod tests {
    use super::*;
    use resugar_tree::build;

    mod tracker {
        use super::*;

        #[test]
        fn fresh_returns_base_when_free() {
            let mut tracker = NameTracker::new();
            assert_eq!(tracker.fresh("item"), "item");
            // Second request for the same base gets a suffix.
            assert_eq!(tracker.fresh("item"), "item_2");
            assert_eq!(tracker.fresh("item"), "item_3");
        }

        #[test]
        fn collect_scope_sees_declarations_and_uses() {
            let mut arena = Arena::new();
            let init = build::lit_int(&mut arena, 0);
            let decl = build::var_decl(&mut arena, "count", None, Some(init));
            let use_ = build::ident(&mut arena, "total");
            let stmt = build::expr_stmt(&mut arena, use_);
            let blk = build::block(&mut arena, vec![decl, stmt]);

            let mut tracker = NameTracker::new();
            tracker.collect_scope(&arena, blk);
            assert!(tracker.is_used("count"));
            assert!(tracker.is_used("total"));
            assert!(!tracker.is_used("other"));
        }

        #[test]
        fn clear_resets_state() {
            let mut tracker = NameTracker::new();
            tracker.mark_used("x");
            tracker.clear();
            assert!(!tracker.is_used("x"));
        }
    }

    mod rename {
        use super::*;

        #[test]
        fn renames_all_occurrences() {
            let mut arena = Arena::new();
            let a = build::ident(&mut arena, "x");
            let b = build::ident(&mut arena, "x");
            let sum = build::binop(&mut arena, resugar_tree::BinaryOperator::Add, a, b);
            let stmt = build::expr_stmt(&mut arena, sum);
            let blk = build::block(&mut arena, vec![stmt]);

            assert_eq!(rename_identifiers(&mut arena, blk, "x", "y"), 2);
            assert!(arena.dump(blk).contains("(ident y)"));
            assert!(!arena.dump(blk).contains("(ident x)"));
        }

        #[test]
        fn shadowing_lambda_parameter_blocks_descent() {
            let mut arena = Arena::new();
            let lambda = arena.alloc(NodeKind::Lambda);
            let param = build::parameter(&mut arena, "x", None);
            let body = build::ident(&mut arena, "x");
            arena.append_child(lambda, Role::Parameter, param);
            arena.append_child(lambda, Role::Body, body);
            let stmt = build::expr_stmt(&mut arena, lambda);
            let outer = build::ident(&mut arena, "x");
            let stmt2 = build::expr_stmt(&mut arena, outer);
            let blk = build::block(&mut arena, vec![stmt, stmt2]);

            assert_eq!(rename_identifiers(&mut arena, blk, "x", "y"), 1);
            // The lambda-body use still refers to the parameter.
            assert_eq!(arena.kind(body), &NodeKind::Identifier { name: "x".into() });
            assert_eq!(arena.kind(outer), &NodeKind::Identifier { name: "y".into() });
        }
    }
}
