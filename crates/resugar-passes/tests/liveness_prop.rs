// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Property test: the liveness analysis against brute-force path
//! enumeration on randomly generated statement trees.
//!
//! The generated grammar is the fragment the analysis models exactly
//! (sequencing, two-armed `if`, `while`), so the verdicts must agree
//! outright: a candidate dead write is dead iff no enumerated path reads
//! the variable before writing it.

use proptest::prelude::*;

use resugar_passes::analysis::value_is_dead_after;
use resugar_passes::CancellationToken;
use resugar_tree::{build, Arena, NodeId};

#[derive(Debug, Clone)]
enum Stmt {
    /// `use(x);`
    Read,
    /// `x = 0;`
    Write,
    /// `tick();` with no access at all.
    Other,
    If(Vec<Stmt>, Vec<Stmt>),
    While(Vec<Stmt>),
}

fn stmt_strategy() -> impl Strategy<Value = Stmt> {
    let leaf = prop_oneof![
        Just(Stmt::Read),
        Just(Stmt::Write),
        Just(Stmt::Other),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            (
                prop::collection::vec(inner.clone(), 0..3),
                prop::collection::vec(inner.clone(), 0..3),
            )
                .prop_map(|(then, els)| Stmt::If(then, els)),
            prop::collection::vec(inner, 0..3).prop_map(Stmt::While),
        ]
    })
}

// ----------------------------------------------------------------------
// Tree construction
// ----------------------------------------------------------------------

fn build_stmt(arena: &mut Arena, stmt: &Stmt) -> NodeId {
    match stmt {
        Stmt::Read => {
            let x = build::ident(arena, "x");
            let callee = build::ident(arena, "use");
            let call = build::invoke(arena, callee, vec![x]);
            build::expr_stmt(arena, call)
        }
        Stmt::Write => {
            let x = build::ident(arena, "x");
            let zero = build::lit_int(arena, 0);
            build::assign_stmt(arena, x, zero)
        }
        Stmt::Other => {
            let callee = build::ident(arena, "tick");
            let call = build::invoke(arena, callee, vec![]);
            build::expr_stmt(arena, call)
        }
        Stmt::If(then, els) => {
            let cond = build::ident(arena, "c");
            let then = build_block(arena, then);
            let els = build_block(arena, els);
            build::if_stmt(arena, cond, then, Some(els))
        }
        Stmt::While(body) => {
            let cond = build::ident(arena, "c");
            let body = build_block(arena, body);
            build::while_stmt(arena, cond, body)
        }
    }
}

fn build_block(arena: &mut Arena, stmts: &[Stmt]) -> NodeId {
    let built: Vec<NodeId> = stmts.iter().map(|s| build_stmt(arena, s)).collect();
    build::block(arena, built)
}

// ----------------------------------------------------------------------
// Brute-force path enumeration
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Read,
    Write,
}

/// Every execution path through the sequence, as its access events.
/// Loops run zero, one, or two iterations; two is enough to mix body
/// paths, and the analysis itself is iteration-count agnostic.
fn paths(stmts: &[Stmt]) -> Vec<Vec<Event>> {
    let mut acc: Vec<Vec<Event>> = vec![Vec::new()];
    for stmt in stmts {
        let options = stmt_paths(stmt);
        let mut next = Vec::new();
        for prefix in &acc {
            for option in &options {
                let mut path = prefix.clone();
                path.extend(option.iter().copied());
                next.push(path);
            }
        }
        acc = next;
    }
    acc
}

fn stmt_paths(stmt: &Stmt) -> Vec<Vec<Event>> {
    match stmt {
        Stmt::Read => vec![vec![Event::Read]],
        Stmt::Write => vec![vec![Event::Write]],
        Stmt::Other => vec![vec![]],
        Stmt::If(then, els) => {
            let mut all = paths(then);
            all.extend(paths(els));
            all
        }
        Stmt::While(body) => {
            let once = paths(body);
            let mut all = vec![vec![]];
            all.extend(once.clone());
            for first in &once {
                for second in &once {
                    let mut path = first.clone();
                    path.extend(second.iter().copied());
                    all.push(path);
                }
            }
            all
        }
    }
}

fn some_path_reads_first(stmts: &[Stmt]) -> bool {
    paths(stmts)
        .iter()
        .any(|path| path.first() == Some(&Event::Read))
}

// ----------------------------------------------------------------------
// The property
// ----------------------------------------------------------------------

proptest! {
    #[test]
    fn analysis_agrees_with_path_enumeration(rest in prop::collection::vec(stmt_strategy(), 0..5)) {
        let mut arena = Arena::new();
        // The candidate dead write, then the generated remainder.
        let x = build::ident(&mut arena, "x");
        let one = build::lit_int(&mut arena, 1);
        let boundary = build::assign_stmt(&mut arena, x, one);
        let mut stmts = vec![boundary];
        stmts.extend(rest.iter().map(|s| build_stmt(&mut arena, s)));
        let scope = build::block(&mut arena, stmts);

        let dead = value_is_dead_after(&arena, "x", boundary, scope, &CancellationToken::new())
            .unwrap();
        prop_assert_eq!(dead, !some_path_reads_first(&rest));
    }
}
