// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The structural matcher.
//!
//! Matching walks a concrete node against a pattern node, producing a
//! [`Captures`] table on success and `None` on failure. Matching is
//! read-only over the tree, order-preserving over child lists, and greedy:
//! a [`Pattern::Choice`] commits to its first successful alternative and a
//! [`Pattern::Repeat`] consumes as many consecutive matches as it can, with
//! no backtracking across a committed sibling. Failure anywhere aborts the
//! whole attempt; callers never observe a partial capture table.

use resugar_tree::{Arena, NodeId, Role};
use tracing::trace;

use crate::pattern::{Captures, Pattern};

/// Match `pattern` against `node`. Returns the capture table on success.
pub fn match_node(arena: &Arena, pattern: &Pattern, node: NodeId) -> Option<Captures> {
    let mut caps = Captures::new();
    if match_one(arena, pattern, node, &mut caps) {
        Some(caps)
    } else {
        None
    }
}

/// Match `pattern` against an absent slot (e.g. a missing `else` branch).
///
/// `Any` and zero-minimum `Repeat` accept absence ("optional empty");
/// literal shapes and backreferences do not.
pub fn match_absent(pattern: &Pattern, caps: &mut Captures) -> bool {
    match pattern {
        Pattern::Any { .. } => true,
        Pattern::Repeat { min, .. } => *min == 0,
        Pattern::Choice(alts) => alts.iter().any(|alt| match_absent(alt, caps)),
        Pattern::Capture { pattern, .. } => match_absent(pattern, caps),
        Pattern::Shape { .. } | Pattern::Backref(_) => false,
    }
}

fn match_one(arena: &Arena, pattern: &Pattern, node: NodeId, caps: &mut Captures) -> bool {
    match pattern {
        Pattern::Any { name } => {
            if let Some(name) = name {
                caps.push(name, node);
            }
            true
        }
        Pattern::Capture { name, pattern } => {
            // Trial-match so a failed inner pattern leaves no capture behind.
            let mut trial = caps.clone();
            if match_one(arena, pattern, node, &mut trial) {
                trial.push(name, node);
                *caps = trial;
                true
            } else {
                false
            }
        }
        Pattern::Choice(alternatives) => {
            for alt in alternatives {
                let mut trial = caps.clone();
                if match_one(arena, alt, node, &mut trial) {
                    *caps = trial;
                    return true;
                }
            }
            false
        }
        Pattern::Backref(name) => {
            let Some(bound) = caps.get_one(name) else {
                trace!(name, "backreference to unbound capture");
                return false;
            };
            arena.structurally_equal(bound, node)
        }
        Pattern::Repeat { name, min, max, pattern } => {
            // A repeat matched against a single slot behaves like min..=max
            // occurrences of one node.
            if *max == 0 {
                return false;
            }
            let mut trial = caps.clone();
            if match_one(arena, pattern, node, &mut trial) {
                if let Some(name) = name {
                    trial.push(name, node);
                }
                *caps = trial;
                *min <= 1
            } else {
                false
            }
        }
        Pattern::Shape { shape, children } => {
            if !shape.accepts(arena.kind(node)) {
                return false;
            }
            let mut trial = caps.clone();
            if match_children(arena, children, node, &mut trial) {
                *caps = trial;
                true
            } else {
                false
            }
        }
    }
}

/// Match a pattern child list against a concrete child list.
///
/// Children are consumed left to right. A pattern entry whose role does not
/// appear at the current concrete position is treated as an absent slot
/// (the concrete child is left for the next pattern entry). Any concrete
/// children left over after the pattern list is exhausted fail the match.
fn match_children(
    arena: &Arena,
    pattern_children: &[(Role, Pattern)],
    node: NodeId,
    caps: &mut Captures,
) -> bool {
    let concrete = arena.children(node);
    let mut ci = 0;

    for (role, pattern) in pattern_children {
        if let Pattern::Repeat { name, min, max, pattern: inner } = pattern {
            let mut count: u32 = 0;
            while count < *max && ci < concrete.len() && concrete[ci].role == *role {
                let mut trial = caps.clone();
                if !match_one(arena, inner, concrete[ci].id, &mut trial) {
                    break;
                }
                if let Some(name) = name {
                    trial.push(name, concrete[ci].id);
                }
                *caps = trial;
                ci += 1;
                count += 1;
            }
            if count < *min {
                return false;
            }
            continue;
        }

        if ci < concrete.len() && concrete[ci].role == *role {
            if !match_one(arena, pattern, concrete[ci].id, caps) {
                return false;
            }
            ci += 1;
        } else if !match_absent(pattern, caps) {
            return false;
        }
    }

    ci == concrete.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pat;
    use crate::pattern::Shape;
    use resugar_tree::build;

    mod shapes {
        use super::*;

        #[test]
        fn identifier_payload_wildcard_and_literal() {
            let mut arena = Arena::new();
            let x = build::ident(&mut arena, "x");

            assert!(match_node(&arena, &pat::ident_any(), x).is_some());
            assert!(match_node(&arena, &pat::ident("x"), x).is_some());
            assert!(match_node(&arena, &pat::ident("y"), x).is_none());
        }

        #[test]
        fn variant_mismatch_fails() {
            let mut arena = Arena::new();
            let x = build::ident(&mut arena, "x");
            let p = Pattern::shape(Shape::Invocation, vec![]);
            assert!(match_node(&arena, &p, x).is_none());
        }

        #[test]
        fn children_are_matched_recursively() {
            let mut arena = Arena::new();
            let target = build::ident(&mut arena, "e");
            let call = build::call_method(&mut arena, target, "MoveNext", vec![]);

            let p = pat::call_method(pat::ident_any(), "MoveNext", vec![]);
            assert!(match_node(&arena, &p, call).is_some());

            let q = pat::call_method(pat::ident_any(), "Dispose", vec![]);
            assert!(match_node(&arena, &q, call).is_none());
        }

        #[test]
        fn extra_concrete_children_fail() {
            let mut arena = Arena::new();
            let target = build::ident(&mut arena, "e");
            let arg = build::lit_int(&mut arena, 1);
            let call = build::call_method(&mut arena, target, "MoveNext", vec![arg]);

            // Pattern has no argument slot; the extra argument must fail it.
            let p = pat::call_method(pat::ident_any(), "MoveNext", vec![]);
            assert!(match_node(&arena, &p, call).is_none());
        }

        #[test]
        fn trailing_repeat_soaks_remaining_children() {
            let mut arena = Arena::new();
            let target = build::ident(&mut arena, "f");
            let a1 = build::lit_int(&mut arena, 1);
            let a2 = build::lit_int(&mut arena, 2);
            let call = build::call_method(&mut arena, target, "Invoke", vec![a1, a2]);

            let p = pat::call_method_any_args(pat::ident_any(), "Invoke", "args");
            let caps = match_node(&arena, &p, call).expect("should match");
            assert_eq!(caps.get_all("args"), &[a1, a2]);
        }
    }

    mod captures {
        use super::*;

        #[test]
        fn named_any_captures_one_node() {
            let mut arena = Arena::new();
            let target = build::ident(&mut arena, "list");
            let call = build::call_method(&mut arena, target, "GetEnumerator", vec![]);

            let p = pat::call_method(Pattern::any_named("src"), "GetEnumerator", vec![]);
            let caps = match_node(&arena, &p, call).expect("should match");
            assert_eq!(caps.get_one("src"), Some(target));
        }

        #[test]
        fn failed_match_yields_no_captures() {
            let mut arena = Arena::new();
            let target = build::ident(&mut arena, "list");
            let call = build::call_method(&mut arena, target, "GetEnumerator", vec![]);

            let p = pat::call_method(Pattern::any_named("src"), "Dispose", vec![]);
            assert!(match_node(&arena, &p, call).is_none());
        }

        #[test]
        fn capture_wraps_a_shape_match() {
            let mut arena = Arena::new();
            let x = build::ident(&mut arena, "x");
            let p = Pattern::capture("id", pat::ident_any());
            let caps = match_node(&arena, &p, x).expect("should match");
            assert_eq!(caps.get_one("id"), Some(x));
        }
    }

    mod choice {
        use super::*;

        #[test]
        fn first_successful_alternative_wins() {
            let mut arena = Arena::new();
            let x = build::ident(&mut arena, "x");

            let p = Pattern::choice(vec![
                Pattern::capture("as_ident", pat::ident_any()),
                Pattern::any_named("fallback"),
            ]);
            let caps = match_node(&arena, &p, x).expect("should match");
            assert_eq!(caps.get_one("as_ident"), Some(x));
            assert!(caps.get_one("fallback").is_none());
        }

        #[test]
        fn failed_alternative_leaves_no_captures() {
            let mut arena = Arena::new();
            let target = build::ident(&mut arena, "e");
            let call = build::call_method(&mut arena, target, "MoveNext", vec![]);

            let p = Pattern::choice(vec![
                pat::call_method(Pattern::any_named("t"), "Dispose", vec![]),
                pat::call_method(Pattern::any_named("u"), "MoveNext", vec![]),
            ]);
            let caps = match_node(&arena, &p, call).expect("should match");
            assert!(caps.get_one("t").is_none());
            assert_eq!(caps.get_one("u"), Some(target));
        }
    }

    mod backrefs {
        use super::*;

        #[test]
        fn backref_requires_structural_identity() {
            let mut arena = Arena::new();
            let t1 = build::ident(&mut arena, "obj");
            let enter = build::call_method(&mut arena, t1, "Enter", vec![]);
            let stmt1 = build::expr_stmt(&mut arena, enter);
            let t2 = build::ident(&mut arena, "obj");
            let exit = build::call_method(&mut arena, t2, "Exit", vec![]);
            let stmt2 = build::expr_stmt(&mut arena, exit);
            let blk = build::block(&mut arena, vec![stmt1, stmt2]);

            let p = pat::block(vec![
                pat::expr_stmt(pat::call_method(Pattern::any_named("obj"), "Enter", vec![])),
                pat::expr_stmt(pat::call_method(Pattern::backref("obj"), "Exit", vec![])),
            ]);
            assert!(match_node(&arena, &p, blk).is_some());
        }

        #[test]
        fn backref_rejects_different_expression() {
            let mut arena = Arena::new();
            let t1 = build::ident(&mut arena, "obj");
            let enter = build::call_method(&mut arena, t1, "Enter", vec![]);
            let stmt1 = build::expr_stmt(&mut arena, enter);
            let t2 = build::ident(&mut arena, "other");
            let exit = build::call_method(&mut arena, t2, "Exit", vec![]);
            let stmt2 = build::expr_stmt(&mut arena, exit);
            let blk = build::block(&mut arena, vec![stmt1, stmt2]);

            let p = pat::block(vec![
                pat::expr_stmt(pat::call_method(Pattern::any_named("obj"), "Enter", vec![])),
                pat::expr_stmt(pat::call_method(Pattern::backref("obj"), "Exit", vec![])),
            ]);
            assert!(match_node(&arena, &p, blk).is_none());
        }

        #[test]
        fn backref_to_unbound_name_fails() {
            let mut arena = Arena::new();
            let x = build::ident(&mut arena, "x");
            assert!(match_node(&arena, &Pattern::backref("never"), x).is_none());
        }
    }

    mod optional_empty {
        use super::*;

        #[test]
        fn missing_else_branch_matches_optional() {
            let mut arena = Arena::new();
            let cond = build::ident(&mut arena, "flag");
            let then = build::block(&mut arena, vec![]);
            let if_no_else = build::if_stmt(&mut arena, cond, then, None);

            let p = pat::if_stmt(
                pat::ident_any(),
                pat::block(vec![]),
                Pattern::optional("else", Pattern::any()),
            );
            assert!(match_node(&arena, &p, if_no_else).is_some());
        }

        #[test]
        fn missing_else_branch_fails_required_shape() {
            let mut arena = Arena::new();
            let cond = build::ident(&mut arena, "flag");
            let then = build::block(&mut arena, vec![]);
            let if_no_else = build::if_stmt(&mut arena, cond, then, None);

            let p = pat::if_stmt(
                pat::ident_any(),
                pat::block(vec![]),
                pat::block(vec![]),
            );
            assert!(match_node(&arena, &p, if_no_else).is_none());
        }
    }

    mod greediness {
        use super::*;

        /// The matcher is greedy by design: a `Repeat` consumes everything it
        /// can and a committed `Choice` is never revisited. This pins the
        /// known limitation (spelled out in the design notes) instead of
        /// silently "fixing" it into a backtracking matcher.
        #[test]
        fn greedy_repeat_commits_without_backtracking() {
            let mut arena = Arena::new();
            let a = build::ident(&mut arena, "a");
            let s1 = build::expr_stmt(&mut arena, a);
            let b = build::ident(&mut arena, "b");
            let s2 = build::expr_stmt(&mut arena, b);
            let blk = build::block(&mut arena, vec![s1, s2]);

            // "any statements, then one statement" would match with
            // backtracking (repeat takes one, tail takes the other); the
            // greedy repeat swallows both and the tail finds nothing.
            let p = pat::block(vec![
                Pattern::repeat("head", pat::expr_stmt(Pattern::any())),
                pat::expr_stmt(Pattern::any_named("tail")),
            ]);
            assert!(match_node(&arena, &p, blk).is_none());
        }

        #[test]
        fn repeat_respects_min_count() {
            let mut arena = Arena::new();
            let blk = build::block(&mut arena, vec![]);
            let p = Pattern::shape(
                Shape::Block,
                vec![(
                    Role::Body,
                    Pattern::Repeat {
                        name: Some("stmts"),
                        min: 1,
                        max: u32::MAX,
                        pattern: Box::new(Pattern::any()),
                    },
                )],
            );
            assert!(match_node(&arena, &p, blk).is_none());
        }
    }
}
