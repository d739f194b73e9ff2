// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Construction helpers for building trees node-by-node.
//!
//! The upstream builder produces trees through these helpers; the test
//! suites use them to write lowered-shape fixtures that stay readable.
//! Each helper allocates a node, attaches the given children under their
//! conventional roles, and returns the new node's id.

use crate::arena::{Arena, NodeId};
use crate::kind::{AccessorKind, BinaryOperator, Literal, NodeKind, Role, UnaryOperator};

// ----------------------------------------------------------------------
// Expressions
// ----------------------------------------------------------------------

pub fn ident(arena: &mut Arena, name: &str) -> NodeId {
    arena.alloc(NodeKind::Identifier { name: name.into() })
}

pub fn lit(arena: &mut Arena, value: Literal) -> NodeId {
    arena.alloc(NodeKind::Literal { value })
}

pub fn lit_null(arena: &mut Arena) -> NodeId {
    lit(arena, Literal::Null)
}

pub fn lit_bool(arena: &mut Arena, value: bool) -> NodeId {
    lit(arena, Literal::Bool(value))
}

pub fn lit_int(arena: &mut Arena, value: i64) -> NodeId {
    lit(arena, Literal::Int(value))
}

pub fn lit_str(arena: &mut Arena, value: &str) -> NodeId {
    lit(arena, Literal::Str(value.into()))
}

pub fn this_ref(arena: &mut Arena) -> NodeId {
    arena.alloc(NodeKind::ThisRef)
}

pub fn base_ref(arena: &mut Arena) -> NodeId {
    arena.alloc(NodeKind::BaseRef)
}

pub fn type_ref(arena: &mut Arena, ty: &str) -> NodeId {
    arena.alloc(NodeKind::TypeRef { ty: ty.into() })
}

/// `target.member`
pub fn member(arena: &mut Arena, target: NodeId, name: &str) -> NodeId {
    let node = arena.alloc(NodeKind::MemberAccess {
        member: name.into(),
    });
    arena.append_child(node, Role::Target, target);
    node
}

/// `Type.member` (static access)
pub fn static_member(arena: &mut Arena, ty: &str, name: &str) -> NodeId {
    let target = type_ref(arena, ty);
    member(arena, target, name)
}

/// `callee(args...)`
pub fn invoke(arena: &mut Arena, callee: NodeId, args: Vec<NodeId>) -> NodeId {
    let node = arena.alloc(NodeKind::Invocation);
    arena.append_child(node, Role::Callee, callee);
    for arg in args {
        arena.append_child(node, Role::Argument, arg);
    }
    node
}

/// `target.method(args...)`
pub fn call_method(arena: &mut Arena, target: NodeId, method: &str, args: Vec<NodeId>) -> NodeId {
    let callee = member(arena, target, method);
    invoke(arena, callee, args)
}

/// `target = value`
pub fn assign(arena: &mut Arena, target: NodeId, value: NodeId) -> NodeId {
    let node = arena.alloc(NodeKind::Assignment);
    arena.append_child(node, Role::Target, target);
    arena.append_child(node, Role::Value, value);
    node
}

pub fn object_creation(arena: &mut Arena, ty: &str, args: Vec<NodeId>) -> NodeId {
    let node = arena.alloc(NodeKind::ObjectCreation { ty: ty.into() });
    for arg in args {
        arena.append_child(node, Role::Argument, arg);
    }
    node
}

pub fn cast(arena: &mut Arena, ty: &str, operand: NodeId) -> NodeId {
    let node = arena.alloc(NodeKind::Cast { ty: ty.into() });
    arena.append_child(node, Role::Operand, operand);
    node
}

pub fn binop(arena: &mut Arena, op: BinaryOperator, left: NodeId, right: NodeId) -> NodeId {
    let node = arena.alloc(NodeKind::BinaryOp { op });
    arena.append_child(node, Role::Left, left);
    arena.append_child(node, Role::Right, right);
    node
}

pub fn unop(arena: &mut Arena, op: UnaryOperator, operand: NodeId) -> NodeId {
    let node = arena.alloc(NodeKind::UnaryOp { op });
    arena.append_child(node, Role::Operand, operand);
    node
}

/// `target[index]`
pub fn index_access(arena: &mut Arena, target: NodeId, index: NodeId) -> NodeId {
    let node = arena.alloc(NodeKind::IndexAccess);
    arena.append_child(node, Role::Target, target);
    arena.append_child(node, Role::Index, index);
    node
}

// ----------------------------------------------------------------------
// Statements
// ----------------------------------------------------------------------

pub fn block(arena: &mut Arena, stmts: Vec<NodeId>) -> NodeId {
    let node = arena.alloc(NodeKind::Block);
    for stmt in stmts {
        arena.append_child(node, Role::Body, stmt);
    }
    node
}

pub fn expr_stmt(arena: &mut Arena, expr: NodeId) -> NodeId {
    let node = arena.alloc(NodeKind::ExpressionStatement);
    arena.append_child(node, Role::Value, expr);
    node
}

/// `target = value;`
pub fn assign_stmt(arena: &mut Arena, target: NodeId, value: NodeId) -> NodeId {
    let a = assign(arena, target, value);
    expr_stmt(arena, a)
}

pub fn var_decl(
    arena: &mut Arena,
    name: &str,
    ty: Option<&str>,
    init: Option<NodeId>,
) -> NodeId {
    let node = arena.alloc(NodeKind::VariableDeclaration {
        name: name.into(),
        ty: ty.map(Into::into),
    });
    if let Some(init) = init {
        arena.append_child(node, Role::Initializer, init);
    }
    node
}

pub fn if_stmt(arena: &mut Arena, cond: NodeId, then: NodeId, els: Option<NodeId>) -> NodeId {
    let node = arena.alloc(NodeKind::If);
    arena.append_child(node, Role::Condition, cond);
    arena.append_child(node, Role::Then, then);
    if let Some(els) = els {
        arena.append_child(node, Role::Else, els);
    }
    node
}

pub fn while_stmt(arena: &mut Arena, cond: NodeId, body: NodeId) -> NodeId {
    let node = arena.alloc(NodeKind::While);
    arena.append_child(node, Role::Condition, cond);
    arena.append_child(node, Role::Body, body);
    node
}

pub fn try_stmt(
    arena: &mut Arena,
    body: NodeId,
    catches: Vec<NodeId>,
    finally: Option<NodeId>,
) -> NodeId {
    let node = arena.alloc(NodeKind::Try);
    arena.append_child(node, Role::Body, body);
    for catch in catches {
        arena.append_child(node, Role::Catch, catch);
    }
    if let Some(finally) = finally {
        arena.append_child(node, Role::Finally, finally);
    }
    node
}

pub fn try_finally(arena: &mut Arena, body: NodeId, finally: NodeId) -> NodeId {
    try_stmt(arena, body, Vec::new(), Some(finally))
}

pub fn catch_clause(
    arena: &mut Arena,
    exception_ty: Option<&str>,
    binding: Option<&str>,
    body: NodeId,
) -> NodeId {
    let node = arena.alloc(NodeKind::CatchClause {
        exception_ty: exception_ty.map(Into::into),
        binding: binding.map(Into::into),
    });
    arena.append_child(node, Role::Body, body);
    node
}

pub fn switch(arena: &mut Arena, scrutinee: NodeId, sections: Vec<NodeId>) -> NodeId {
    let node = arena.alloc(NodeKind::Switch);
    arena.append_child(node, Role::Scrutinee, scrutinee);
    for section in sections {
        arena.append_child(node, Role::Section, section);
    }
    node
}

pub fn switch_section(arena: &mut Arena, labels: Vec<NodeId>, stmts: Vec<NodeId>) -> NodeId {
    let node = arena.alloc(NodeKind::SwitchSection);
    for label in labels {
        arena.append_child(node, Role::Label, label);
    }
    for stmt in stmts {
        arena.append_child(node, Role::Body, stmt);
    }
    node
}

pub fn case_label(arena: &mut Arena, value: Option<Literal>) -> NodeId {
    arena.alloc(NodeKind::CaseLabel { value })
}

pub fn break_stmt(arena: &mut Arena) -> NodeId {
    arena.alloc(NodeKind::Break)
}

pub fn return_stmt(arena: &mut Arena, value: Option<NodeId>) -> NodeId {
    let node = arena.alloc(NodeKind::Return);
    if let Some(value) = value {
        arena.append_child(node, Role::Value, value);
    }
    node
}

pub fn throw_stmt(arena: &mut Arena, value: NodeId) -> NodeId {
    let node = arena.alloc(NodeKind::Throw);
    arena.append_child(node, Role::Value, value);
    node
}

// ----------------------------------------------------------------------
// Declarations
// ----------------------------------------------------------------------

pub fn type_decl(arena: &mut Arena, name: &str, members: Vec<NodeId>) -> NodeId {
    let node = arena.alloc(NodeKind::TypeDeclaration { name: name.into() });
    for m in members {
        arena.append_child(node, Role::Member, m);
    }
    node
}

pub fn method_decl(arena: &mut Arena, name: &str, params: Vec<NodeId>, body: NodeId) -> NodeId {
    let node = arena.alloc(NodeKind::MethodDeclaration { name: name.into() });
    for p in params {
        arena.append_child(node, Role::Parameter, p);
    }
    arena.append_child(node, Role::Body, body);
    node
}

pub fn field_decl(arena: &mut Arena, name: &str, ty: Option<&str>, init: Option<NodeId>) -> NodeId {
    let node = arena.alloc(NodeKind::FieldDeclaration {
        name: name.into(),
        ty: ty.map(Into::into),
    });
    if let Some(init) = init {
        arena.append_child(node, Role::Initializer, init);
    }
    node
}

pub fn parameter(arena: &mut Arena, name: &str, ty: Option<&str>) -> NodeId {
    arena.alloc(NodeKind::Parameter {
        name: name.into(),
        ty: ty.map(Into::into),
    })
}

pub fn accessor(arena: &mut Arena, kind: AccessorKind, body: Option<NodeId>) -> NodeId {
    let node = arena.alloc(NodeKind::Accessor { kind });
    if let Some(body) = body {
        arena.append_child(node, Role::Body, body);
    }
    node
}

pub fn property_decl(
    arena: &mut Arena,
    name: &str,
    getter: Option<NodeId>,
    setter: Option<NodeId>,
) -> NodeId {
    let node = arena.alloc(NodeKind::PropertyDeclaration {
        name: name.into(),
        auto: false,
    });
    if let Some(getter) = getter {
        arena.append_child(node, Role::Getter, getter);
    }
    if let Some(setter) = setter {
        arena.append_child(node, Role::Setter, setter);
    }
    node
}

pub fn event_decl(
    arena: &mut Arena,
    name: &str,
    adder: Option<NodeId>,
    remover: Option<NodeId>,
) -> NodeId {
    let node = arena.alloc(NodeKind::EventDeclaration {
        name: name.into(),
        auto: false,
    });
    if let Some(adder) = adder {
        arena.append_child(node, Role::Adder, adder);
    }
    if let Some(remover) = remover {
        arena.append_child(node, Role::Remover, remover);
    }
    node
}
