// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Readable constructors for pattern templates.
//!
//! These mirror `resugar_tree::build` so a recognizer's pattern reads like
//! the shape it matches. Payloads are fixed where a string/operator is
//! given and wildcarded by the `_any` variants; to capture a node's payload,
//! wrap the pattern in [`Pattern::capture`] and read the payload off the
//! captured node.

use resugar_tree::{BinaryOperator, Literal, Role, UnaryOperator};

use crate::pattern::{Pattern, Shape};

// ----------------------------------------------------------------------
// Expressions
// ----------------------------------------------------------------------

pub fn ident(name: &str) -> Pattern {
    Pattern::shape(
        Shape::Identifier {
            name: Some(name.into()),
        },
        vec![],
    )
}

pub fn ident_any() -> Pattern {
    Pattern::shape(Shape::Identifier { name: None }, vec![])
}

pub fn lit(value: Literal) -> Pattern {
    Pattern::shape(Shape::Literal { value: Some(value) }, vec![])
}

pub fn lit_null() -> Pattern {
    lit(Literal::Null)
}

pub fn lit_bool(value: bool) -> Pattern {
    lit(Literal::Bool(value))
}

pub fn lit_int(value: i64) -> Pattern {
    lit(Literal::Int(value))
}

pub fn lit_any() -> Pattern {
    Pattern::shape(Shape::Literal { value: None }, vec![])
}

pub fn this() -> Pattern {
    Pattern::shape(Shape::ThisRef, vec![])
}

pub fn base() -> Pattern {
    Pattern::shape(Shape::BaseRef, vec![])
}

pub fn type_ref(ty: &str) -> Pattern {
    Pattern::shape(Shape::TypeRef { ty: Some(ty.into()) }, vec![])
}

pub fn member(target: Pattern, name: &str) -> Pattern {
    Pattern::shape(
        Shape::MemberAccess {
            member: Some(name.into()),
        },
        vec![(Role::Target, target)],
    )
}

pub fn member_any(target: Pattern) -> Pattern {
    Pattern::shape(
        Shape::MemberAccess { member: None },
        vec![(Role::Target, target)],
    )
}

pub fn static_member(ty: &str, name: &str) -> Pattern {
    member(type_ref(ty), name)
}

pub fn invoke(callee: Pattern, args: Vec<Pattern>) -> Pattern {
    let mut children = vec![(Role::Callee, callee)];
    children.extend(args.into_iter().map(|a| (Role::Argument, a)));
    Pattern::shape(Shape::Invocation, children)
}

/// `target.method(args...)`
pub fn call_method(target: Pattern, method: &str, args: Vec<Pattern>) -> Pattern {
    invoke(member(target, method), args)
}

/// `target.method(...)` with any argument list, captured under `args_name`.
pub fn call_method_any_args(target: Pattern, method: &str, args_name: &'static str) -> Pattern {
    Pattern::shape(
        Shape::Invocation,
        vec![
            (Role::Callee, member(target, method)),
            (Role::Argument, Pattern::repeat(args_name, Pattern::any())),
        ],
    )
}

pub fn assign(target: Pattern, value: Pattern) -> Pattern {
    Pattern::shape(
        Shape::Assignment,
        vec![(Role::Target, target), (Role::Value, value)],
    )
}

pub fn object_creation_any(ty_cap: &'static str, args: Pattern) -> Pattern {
    Pattern::capture(
        ty_cap,
        Pattern::shape(
            Shape::ObjectCreation { ty: None },
            vec![(Role::Argument, args)],
        ),
    )
}

pub fn cast(ty: &str, operand: Pattern) -> Pattern {
    Pattern::shape(
        Shape::Cast { ty: Some(ty.into()) },
        vec![(Role::Operand, operand)],
    )
}

pub fn cast_any(operand: Pattern) -> Pattern {
    Pattern::shape(Shape::Cast { ty: None }, vec![(Role::Operand, operand)])
}

pub fn binop(op: BinaryOperator, left: Pattern, right: Pattern) -> Pattern {
    Pattern::shape(
        Shape::BinaryOp { op: Some(op) },
        vec![(Role::Left, left), (Role::Right, right)],
    )
}

pub fn unop(op: UnaryOperator, operand: Pattern) -> Pattern {
    Pattern::shape(Shape::UnaryOp { op: Some(op) }, vec![(Role::Operand, operand)])
}

pub fn index_access(target: Pattern, index: Pattern) -> Pattern {
    Pattern::shape(
        Shape::IndexAccess,
        vec![(Role::Target, target), (Role::Index, index)],
    )
}

// ----------------------------------------------------------------------
// Statements
// ----------------------------------------------------------------------

/// A block whose statements match `stmts` positionally.
pub fn block(stmts: Vec<Pattern>) -> Pattern {
    Pattern::shape(
        Shape::Block,
        stmts.into_iter().map(|s| (Role::Body, s)).collect(),
    )
}

/// A block with any statements, captured under `name`.
pub fn block_capturing(name: &'static str) -> Pattern {
    Pattern::shape(
        Shape::Block,
        vec![(Role::Body, Pattern::repeat(name, Pattern::any()))],
    )
}

pub fn expr_stmt(expr: Pattern) -> Pattern {
    Pattern::shape(Shape::ExpressionStatement, vec![(Role::Value, expr)])
}

/// `target = value;`
pub fn assign_stmt(target: Pattern, value: Pattern) -> Pattern {
    expr_stmt(assign(target, value))
}

/// A variable declaration (any name/type) with an initializer.
pub fn var_decl(init: Pattern) -> Pattern {
    Pattern::shape(
        Shape::VariableDeclaration { name: None, ty: None },
        vec![(Role::Initializer, init)],
    )
}

/// A variable declaration (any name/type) with no initializer.
pub fn var_decl_bare() -> Pattern {
    Pattern::shape(Shape::VariableDeclaration { name: None, ty: None }, vec![])
}

pub fn if_stmt(cond: Pattern, then: Pattern, els: Pattern) -> Pattern {
    Pattern::shape(
        Shape::If,
        vec![(Role::Condition, cond), (Role::Then, then), (Role::Else, els)],
    )
}

/// `if` with no `else` branch allowed.
pub fn if_no_else(cond: Pattern, then: Pattern) -> Pattern {
    Pattern::shape(Shape::If, vec![(Role::Condition, cond), (Role::Then, then)])
}

pub fn while_stmt(cond: Pattern, body: Pattern) -> Pattern {
    Pattern::shape(Shape::While, vec![(Role::Condition, cond), (Role::Body, body)])
}

pub fn try_finally(body: Pattern, finally: Pattern) -> Pattern {
    Pattern::shape(Shape::Try, vec![(Role::Body, body), (Role::Finally, finally)])
}

pub fn using(resource: Pattern, body: Pattern) -> Pattern {
    Pattern::shape(Shape::Using, vec![(Role::Resource, resource), (Role::Body, body)])
}

pub fn return_stmt(value: Pattern) -> Pattern {
    Pattern::shape(Shape::Return, vec![(Role::Value, value)])
}

pub fn return_void() -> Pattern {
    Pattern::shape(Shape::Return, vec![])
}

pub fn throw_stmt(value: Pattern) -> Pattern {
    Pattern::shape(Shape::Throw, vec![(Role::Value, value)])
}
