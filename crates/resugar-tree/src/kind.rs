// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The closed syntax-node vocabulary.
//!
//! [`NodeKind`] is a tagged union over every statement, expression, and
//! declaration variant the rewrite passes understand. The union is closed on
//! purpose: recognizers dispatch with exhaustive `match`, so adding a variant
//! makes the compiler point at every site that needs a decision.
//!
//! Child nodes are not stored in the payloads. A node's children live in the
//! arena as an ordered, [`Role`]-tagged list; the payload carries only the
//! variant-specific scalar data (names, operators, literal values).

use serde::{Deserialize, Serialize};

/// Which child slot a node occupies in its parent.
///
/// Roles distinguish slots with different meanings (`Condition` vs `Body`);
/// list-valued slots (block statements, arguments, switch sections) repeat
/// the same role in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Condition,
    Then,
    Else,
    Body,
    Target,
    Value,
    Initializer,
    Resource,
    Collection,
    Finally,
    Catch,
    Scrutinee,
    Section,
    Label,
    Callee,
    Argument,
    Operand,
    Index,
    Left,
    Right,
    Getter,
    Setter,
    Adder,
    Remover,
    Member,
    Parameter,
}

impl Role {
    /// Lowercase name used in tree dumps.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Condition => "cond",
            Role::Then => "then",
            Role::Else => "else",
            Role::Body => "body",
            Role::Target => "target",
            Role::Value => "value",
            Role::Initializer => "init",
            Role::Resource => "resource",
            Role::Collection => "collection",
            Role::Finally => "finally",
            Role::Catch => "catch",
            Role::Scrutinee => "scrutinee",
            Role::Section => "section",
            Role::Label => "label",
            Role::Callee => "callee",
            Role::Argument => "arg",
            Role::Operand => "operand",
            Role::Index => "index",
            Role::Left => "left",
            Role::Right => "right",
            Role::Getter => "get",
            Role::Setter => "set",
            Role::Adder => "add",
            Role::Remover => "remove",
            Role::Member => "member",
            Role::Parameter => "param",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A literal constant value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    /// A decimal constant carried as its five constructor components
    /// (low, mid, high words, sign, scale) plus a pre-rendered string.
    Decimal {
        lo: u32,
        mid: u32,
        hi: u32,
        negative: bool,
        scale: u8,
        text: String,
    },
}

/// Reference to a resolved type member (field or method).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberRef {
    /// Name of the declaring type.
    pub declaring_type: String,
    /// Member name within the declaring type.
    pub name: String,
}

impl MemberRef {
    pub fn new(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        MemberRef {
            declaring_type: declaring_type.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for MemberRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.declaring_type, self.name)
    }
}

/// Opaque semantic annotations attached by the upstream builder.
///
/// The rewrite passes treat these as facts, never as structure: they are
/// consulted (which method does this delegate point at? which field does this
/// access resolve to?) but the passes do not perform resolution themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Annotation {
    /// The invocation or callee resolves to this method.
    Method(MemberRef),
    /// The member access resolves to this field.
    Field(MemberRef),
    /// The node resolves to this type.
    Type(String),
    /// A delegate-construction argument loading a pointer to this method.
    MethodPointer(MemberRef),
}

/// Binary operators that appear in lowered trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    LogicalAnd,
    LogicalOr,
}

/// Unary operators that appear in lowered trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Negate,
    /// A `ref` argument (address passed, callee may read and write).
    Ref,
    /// An `out` argument (address passed, callee writes).
    Out,
}

/// Property/event accessor kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessorKind {
    Get,
    Set,
    Add,
    Remove,
}

/// The variant-specific payload of a syntax node.
///
/// Child slots are documented per variant; children themselves live in the
/// arena under the listed [`Role`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------
    /// Statement list. Children: `Body*`.
    Block,
    /// Expression used as a statement. Children: `Value`.
    ExpressionStatement,
    /// Local variable declaration (one variable per node, as the upstream
    /// builder emits). Children: `Initializer?`.
    VariableDeclaration { name: String, ty: Option<String> },
    /// Children: `Condition`, `Then`, `Else?`.
    If,
    /// Children: `Condition`, `Body`.
    While,
    /// Children: `Body`, `Condition`.
    DoWhile,
    /// Recovered iteration construct. Children: `Collection`, `Body`.
    Foreach { item: String, item_ty: Option<String> },
    /// Recovered resource construct. Children: `Resource`, `Body`.
    /// The resource is either a `VariableDeclaration` or a bare expression.
    Using,
    /// Recovered lock construct. Children: `Target`, `Body`.
    Lock,
    /// Children: `Body` (block), `Catch*` (catch clauses), `Finally?` (block).
    Try,
    /// Children: `Body`.
    CatchClause {
        exception_ty: Option<String>,
        binding: Option<String>,
    },
    /// Children: `Scrutinee`, `Section*`.
    Switch,
    /// One switch section. Children: `Label*` (case labels), `Body*`
    /// (statements).
    SwitchSection,
    /// A case label; `None` is the `default` label.
    CaseLabel { value: Option<Literal> },
    Break,
    Continue,
    /// Children: `Value?`.
    Return,
    /// Children: `Value?`.
    Throw,

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------
    Identifier { name: String },
    Literal { value: Literal },
    /// Children: `Target`.
    MemberAccess { member: String },
    /// Children: `Callee`, `Argument*`.
    Invocation,
    /// Children: `Target`, `Value`.
    Assignment,
    /// Children: `Argument*`.
    ObjectCreation { ty: String },
    /// Children: `Operand`.
    Cast { ty: String },
    /// Children: `Left`, `Right`.
    BinaryOp { op: BinaryOperator },
    /// Children: `Operand`.
    UnaryOp { op: UnaryOperator },
    /// Children: `Target`, `Index`.
    IndexAccess,
    /// Children: `Parameter*`, `Body` (expression or block).
    Lambda,
    /// Children: `Parameter*`, `Body` (block).
    AnonymousMethod,
    ThisRef,
    BaseRef,
    /// A type used in expression position (static member access target).
    TypeRef { ty: String },

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------
    /// Children: `Member*`.
    TypeDeclaration { name: String },
    /// Children: `Parameter*`, `Body?`.
    MethodDeclaration { name: String },
    /// Children: `Initializer?`.
    FieldDeclaration { name: String, ty: Option<String> },
    /// Children: `Getter?`, `Setter?`. `auto` marks a recovered automatic
    /// property whose accessor bodies were stripped.
    PropertyDeclaration { name: String, auto: bool },
    /// Children: `Body?`. An accessor with no body belongs to an automatic
    /// property or event.
    Accessor { kind: AccessorKind },
    /// Children: `Adder?`, `Remover?`.
    EventDeclaration { name: String, auto: bool },
    /// Children: `Body`.
    DestructorDeclaration,
    Parameter { name: String, ty: Option<String> },
}

impl NodeKind {
    /// Short lowercase tag used in tree dumps and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Block => "block",
            NodeKind::ExpressionStatement => "expr-stmt",
            NodeKind::VariableDeclaration { .. } => "var-decl",
            NodeKind::If => "if",
            NodeKind::While => "while",
            NodeKind::DoWhile => "do-while",
            NodeKind::Foreach { .. } => "foreach",
            NodeKind::Using => "using",
            NodeKind::Lock => "lock",
            NodeKind::Try => "try",
            NodeKind::CatchClause { .. } => "catch",
            NodeKind::Switch => "switch",
            NodeKind::SwitchSection => "section",
            NodeKind::CaseLabel { .. } => "case",
            NodeKind::Break => "break",
            NodeKind::Continue => "continue",
            NodeKind::Return => "return",
            NodeKind::Throw => "throw",
            NodeKind::Identifier { .. } => "ident",
            NodeKind::Literal { .. } => "lit",
            NodeKind::MemberAccess { .. } => "member",
            NodeKind::Invocation => "invoke",
            NodeKind::Assignment => "assign",
            NodeKind::ObjectCreation { .. } => "new",
            NodeKind::Cast { .. } => "cast",
            NodeKind::BinaryOp { .. } => "binop",
            NodeKind::UnaryOp { .. } => "unop",
            NodeKind::IndexAccess => "index",
            NodeKind::Lambda => "lambda",
            NodeKind::AnonymousMethod => "anon-method",
            NodeKind::ThisRef => "this",
            NodeKind::BaseRef => "base",
            NodeKind::TypeRef { .. } => "type-ref",
            NodeKind::TypeDeclaration { .. } => "type-decl",
            NodeKind::MethodDeclaration { .. } => "method",
            NodeKind::FieldDeclaration { .. } => "field",
            NodeKind::PropertyDeclaration { .. } => "property",
            NodeKind::Accessor { .. } => "accessor",
            NodeKind::EventDeclaration { .. } => "event",
            NodeKind::DestructorDeclaration => "destructor",
            NodeKind::Parameter { .. } => "param",
        }
    }

    /// True if this variant is a statement (can appear in a block body).
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::Block
                | NodeKind::ExpressionStatement
                | NodeKind::VariableDeclaration { .. }
                | NodeKind::If
                | NodeKind::While
                | NodeKind::DoWhile
                | NodeKind::Foreach { .. }
                | NodeKind::Using
                | NodeKind::Lock
                | NodeKind::Try
                | NodeKind::Switch
                | NodeKind::Break
                | NodeKind::Continue
                | NodeKind::Return
                | NodeKind::Throw
        )
    }
}
