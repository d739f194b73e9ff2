// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Definite-assignment / liveness analysis for elimination legality.
//!
//! Recognizers eliminate variables (enumerator temporaries, resource
//! holders, lock flags) only when the variable's old value is provably
//! unobservable past the rewritten construct: every path from the boundary
//! to the end of the declaring scope either reassigns the variable before
//! reading it or never reads it at all.
//!
//! The analysis runs over the statement-level control flow implied by the
//! tree: sequencing, branches, loops, switch dispatch, and
//! try/catch/finally edges. It fails closed: any construct it cannot model
//! precisely (closure captures, `ref` arguments, unknown statement kinds
//! that mention the variable) counts as a read, and the recognizer must
//! then decline.

use resugar_tree::{Arena, NodeId, NodeKind, Role, UnaryOperator};

use crate::context::CancellationToken;
use crate::error::PassResult;

/// What a region of code does to the variable first, over all paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Flow {
    /// Some path reads the variable before any write.
    may_read_first: bool,
    /// Every path writes the variable (or leaves the scope) before any
    /// read could observe the old value.
    must_write: bool,
}

impl Flow {
    const NEUTRAL: Flow = Flow {
        may_read_first: false,
        must_write: false,
    };
    const READ: Flow = Flow {
        may_read_first: true,
        must_write: false,
    };
    const WRITE: Flow = Flow {
        may_read_first: false,
        must_write: true,
    };

    /// `self` executes, then `next`.
    fn seq(self, next: Flow) -> Flow {
        Flow {
            may_read_first: self.may_read_first || (!self.must_write && next.may_read_first),
            must_write: self.must_write || next.must_write,
        }
    }

    /// Either `self` or `other` executes.
    fn branch(self, other: Flow) -> Flow {
        Flow {
            may_read_first: self.may_read_first || other.may_read_first,
            must_write: self.must_write && other.must_write,
        }
    }
}

/// Is the *current* value of `var` dead past `boundary`?
///
/// `boundary` is a statement inside `scope` (the block that declares
/// `var`); the question is whether any execution continuing from just
/// after `boundary` can read the value `var` holds at that point. Returns
/// `Ok(false)`, not dead, whenever the answer cannot be proven.
pub fn value_is_dead_after(
    arena: &Arena,
    var: &str,
    boundary: NodeId,
    scope: NodeId,
    cancel: &CancellationToken,
) -> PassResult<bool> {
    let mut flow = Flow::NEUTRAL;
    let mut cur = boundary;

    while cur != scope {
        cancel.checkpoint()?;
        let Some(parent) = arena.parent(cur) else {
            // Boundary is not under the declared scope; fail closed.
            return Ok(false);
        };

        match arena.kind(parent) {
            NodeKind::Block => {
                let children = arena.children(parent);
                let pos = children.iter().position(|c| c.id == cur).unwrap_or(0);
                for child in &children[pos + 1..] {
                    flow = flow.seq(stmt_flow(arena, var, child.id, cancel)?);
                }
            }
            // A completed branch leaves the `if`; nothing else runs in it.
            NodeKind::If | NodeKind::Switch | NodeKind::SwitchSection => {}
            // The loop may iterate again: approximate the back edge by the
            // whole loop re-executing.
            NodeKind::While | NodeKind::DoWhile | NodeKind::Foreach { .. } => {
                flow = flow.seq(stmt_flow(arena, var, parent, cancel)?);
            }
            NodeKind::Try => {
                let role = arena.role_of(cur);
                // From the protected body, a handler may or may not run;
                // from a handler, only the finally remains.
                if role == Some(Role::Body) {
                    let mut handlers = Flow::NEUTRAL;
                    for catch in arena.children_with_role(parent, Role::Catch) {
                        handlers = handlers.branch(stmt_flow(arena, var, catch, cancel)?);
                    }
                    flow = flow.seq(Flow::NEUTRAL.branch(handlers));
                }
                if role != Some(Role::Finally) {
                    if let Some(finally) = arena.child(parent, Role::Finally) {
                        flow = flow.seq(stmt_flow(arena, var, finally, cancel)?);
                    }
                }
            }
            NodeKind::Using | NodeKind::Lock => {
                // The implicit dispose/exit re-reads the header expression.
                let header = arena
                    .child(parent, Role::Resource)
                    .or_else(|| arena.child(parent, Role::Target));
                if let Some(header) = header {
                    if mentions(arena, var, header) {
                        flow = flow.seq(Flow::READ);
                    }
                }
            }
            // Climbing out of an expression position; nothing to add.
            _ => {}
        }

        if flow.may_read_first {
            return Ok(false);
        }
        cur = parent;
    }

    Ok(!flow.may_read_first)
}

/// Can the declaration of `var` move into the header of `loop_stmt`?
///
/// True when every mention of `var` outside the loop subtree is the
/// declaration itself and the value is dead once the loop completes, so
/// hoisting the variable into the loop header observes nothing different.
pub fn declaration_is_movable_into_loop(
    arena: &Arena,
    var: &str,
    decl_stmt: NodeId,
    loop_stmt: NodeId,
    cancel: &CancellationToken,
) -> PassResult<bool> {
    let Some(scope) = arena.parent(decl_stmt) else {
        return Ok(false);
    };
    if !matches!(arena.kind(scope), NodeKind::Block) || !arena.is_ancestor_of(scope, loop_stmt) {
        return Ok(false);
    }

    // Walk outward from the loop to the declaring block; at each level any
    // sibling mention of the variable means it escapes the loop boundary.
    let mut top = loop_stmt;
    while let Some(parent) = arena.parent(top) {
        if parent == scope {
            break;
        }
        cancel.checkpoint()?;
        for child in arena.children(parent) {
            if child.id != top && mentions(arena, var, child.id) {
                return Ok(false);
            }
        }
        top = parent;
    }

    for child in arena.children(scope) {
        if child.id == decl_stmt || child.id == top {
            continue;
        }
        if mentions(arena, var, child.id) {
            return Ok(false);
        }
    }

    value_is_dead_after(arena, var, top, scope, cancel)
}

/// True if `var` appears as an identifier anywhere under `node`.
pub fn mentions(arena: &Arena, var: &str, node: NodeId) -> bool {
    arena
        .descendants(node)
        .iter()
        .any(|&id| matches!(arena.kind(id), NodeKind::Identifier { name } if name == var))
}

fn stmt_flow(
    arena: &Arena,
    var: &str,
    stmt: NodeId,
    cancel: &CancellationToken,
) -> PassResult<Flow> {
    cancel.checkpoint()?;
    let flow = match arena.kind(stmt) {
        NodeKind::Block => {
            let mut flow = Flow::NEUTRAL;
            for child in arena.children_with_role(stmt, Role::Body) {
                flow = flow.seq(stmt_flow(arena, var, child, cancel)?);
            }
            flow
        }
        NodeKind::ExpressionStatement => match arena.child(stmt, Role::Value) {
            Some(expr) => expr_flow(arena, var, expr),
            None => Flow::NEUTRAL,
        },
        NodeKind::VariableDeclaration { name, .. } => {
            let init = match arena.child(stmt, Role::Initializer) {
                Some(init) => expr_flow(arena, var, init),
                None => Flow::NEUTRAL,
            };
            if name == var {
                // Redeclaration kills the old value after the initializer
                // has been evaluated.
                init.seq(Flow::WRITE)
            } else {
                init
            }
        }
        NodeKind::If => {
            let cond = child_expr_flow(arena, var, stmt, Role::Condition);
            let then = child_stmt_flow(arena, var, stmt, Role::Then, cancel)?;
            let els = match arena.child(stmt, Role::Else) {
                Some(els) => stmt_flow(arena, var, els, cancel)?,
                None => Flow::NEUTRAL,
            };
            cond.seq(then.branch(els))
        }
        NodeKind::While => {
            let cond = child_expr_flow(arena, var, stmt, Role::Condition);
            let body = child_stmt_flow(arena, var, stmt, Role::Body, cancel)?;
            // Condition always runs; the body zero or more times.
            cond.seq(Flow::NEUTRAL.branch(body))
        }
        NodeKind::DoWhile => {
            let body = child_stmt_flow(arena, var, stmt, Role::Body, cancel)?;
            let cond = child_expr_flow(arena, var, stmt, Role::Condition);
            body.seq(cond)
        }
        NodeKind::Foreach { item, .. } => {
            let collection = child_expr_flow(arena, var, stmt, Role::Collection);
            let mut body = child_stmt_flow(arena, var, stmt, Role::Body, cancel)?;
            if item == var {
                body = Flow::WRITE.seq(body);
            }
            collection.seq(Flow::NEUTRAL.branch(body))
        }
        NodeKind::Using => {
            let resource = match arena.child(stmt, Role::Resource) {
                Some(res) => stmt_or_expr_flow(arena, var, res, cancel)?,
                None => Flow::NEUTRAL,
            };
            resource.seq(child_stmt_flow(arena, var, stmt, Role::Body, cancel)?)
        }
        NodeKind::Lock => {
            let target = child_expr_flow(arena, var, stmt, Role::Target);
            target.seq(child_stmt_flow(arena, var, stmt, Role::Body, cancel)?)
        }
        NodeKind::Try => {
            let body = child_stmt_flow(arena, var, stmt, Role::Body, cancel)?;
            let mut may_read = body.may_read_first;
            for catch in arena.children_with_role(stmt, Role::Catch) {
                may_read |= stmt_flow(arena, var, catch, cancel)?.may_read_first;
            }
            let finally = match arena.child(stmt, Role::Finally) {
                Some(f) => stmt_flow(arena, var, f, cancel)?,
                None => Flow::NEUTRAL,
            };
            // An exception can interrupt the body anywhere, so a write in
            // the body guarantees nothing for the handler or finally paths.
            Flow {
                may_read_first: may_read || finally.may_read_first,
                must_write: finally.must_write,
            }
        }
        NodeKind::CatchClause { binding, .. } => {
            let body = child_stmt_flow(arena, var, stmt, Role::Body, cancel)?;
            if binding.as_deref() == Some(var) {
                Flow::WRITE.seq(body)
            } else {
                body
            }
        }
        NodeKind::Switch => {
            let scrutinee = child_expr_flow(arena, var, stmt, Role::Scrutinee);
            let mut sections = Flow::NEUTRAL;
            for section in arena.children_with_role(stmt, Role::Section) {
                sections = sections.branch(stmt_flow(arena, var, section, cancel)?);
            }
            scrutinee.seq(sections)
        }
        NodeKind::SwitchSection => {
            let mut flow = Flow::NEUTRAL;
            for child in arena.children_with_role(stmt, Role::Body) {
                flow = flow.seq(stmt_flow(arena, var, child, cancel)?);
            }
            flow
        }
        NodeKind::Return | NodeKind::Throw => {
            let value = match arena.child(stmt, Role::Value) {
                Some(v) => expr_flow(arena, var, v),
                None => Flow::NEUTRAL,
            };
            // The path leaves the scope; nothing after can read.
            value.seq(Flow::WRITE)
        }
        // The path continues after the enclosing loop; treated as neutral
        // here, the loop's successor statements are still analyzed.
        NodeKind::Break | NodeKind::Continue => Flow::NEUTRAL,
        // Anything unmodeled: fail closed if it mentions the variable.
        _ => {
            if mentions(arena, var, stmt) {
                Flow::READ
            } else {
                Flow::NEUTRAL
            }
        }
    };
    Ok(flow)
}

fn child_stmt_flow(
    arena: &Arena,
    var: &str,
    node: NodeId,
    role: Role,
    cancel: &CancellationToken,
) -> PassResult<Flow> {
    match arena.child(node, role) {
        Some(child) => stmt_flow(arena, var, child, cancel),
        None => Ok(Flow::NEUTRAL),
    }
}

fn child_expr_flow(arena: &Arena, var: &str, node: NodeId, role: Role) -> Flow {
    match arena.child(node, role) {
        Some(child) => expr_flow(arena, var, child),
        None => Flow::NEUTRAL,
    }
}

fn stmt_or_expr_flow(
    arena: &Arena,
    var: &str,
    node: NodeId,
    cancel: &CancellationToken,
) -> PassResult<Flow> {
    if arena.kind(node).is_statement() || matches!(arena.kind(node), NodeKind::VariableDeclaration { .. })
    {
        stmt_flow(arena, var, node, cancel)
    } else {
        Ok(expr_flow(arena, var, node))
    }
}

fn expr_flow(arena: &Arena, var: &str, expr: NodeId) -> Flow {
    match arena.kind(expr) {
        NodeKind::Identifier { name } => {
            if name == var {
                Flow::READ
            } else {
                Flow::NEUTRAL
            }
        }
        NodeKind::Assignment => {
            let value = match arena.child(expr, Role::Value) {
                Some(v) => expr_flow(arena, var, v),
                None => Flow::NEUTRAL,
            };
            let target = match arena.child(expr, Role::Target) {
                Some(t) => match arena.kind(t) {
                    NodeKind::Identifier { name } if name == var => Flow::WRITE,
                    _ => expr_flow(arena, var, t),
                },
                None => Flow::NEUTRAL,
            };
            // Right side evaluates before the store.
            value.seq(target)
        }
        NodeKind::UnaryOp { op: UnaryOperator::Out } => match arena.child(expr, Role::Operand) {
            Some(operand) => match arena.kind(operand) {
                NodeKind::Identifier { name } if name == var => Flow::WRITE,
                _ => expr_flow(arena, var, operand),
            },
            None => Flow::NEUTRAL,
        },
        // `ref` lets the callee both read and write; fail closed.
        NodeKind::UnaryOp { op: UnaryOperator::Ref } => {
            match arena.child(expr, Role::Operand) {
                Some(operand) if mentions(arena, var, operand) => Flow::READ,
                Some(operand) => expr_flow(arena, var, operand),
                None => Flow::NEUTRAL,
            }
        }
        // A nested function capturing the variable can run at any later
        // time; any mention inside is an observation.
        NodeKind::Lambda | NodeKind::AnonymousMethod => {
            if mentions(arena, var, expr) {
                Flow::READ
            } else {
                Flow::NEUTRAL
            }
        }
        _ => {
            let mut flow = Flow::NEUTRAL;
            for child in arena.children(expr) {
                flow = flow.seq(expr_flow(arena, var, child.id));
            }
            flow
        }
    }
}
