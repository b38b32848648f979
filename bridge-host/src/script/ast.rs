//! Syntax tree for dynamic code.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use super::token::Span;

/// A function literal: arrow or `function` form.
#[derive(Debug, Clone)]
pub struct FunctionNode {
    /// Name, for named `function` expressions and declarations.
    pub name: Option<String>,
    /// Parameter names.
    pub params: Vec<String>,
    /// Body.
    pub body: FunctionBody,
    /// Arrow functions take `this` from where they are defined.
    pub is_arrow: bool,
    /// Source span of the function head.
    pub span: Span,
}

/// Function body.
#[derive(Debug, Clone)]
pub enum FunctionBody {
    /// `=> expr`
    Expression(Box<Expression>),
    /// `{ statements }`
    Block(Vec<Statement>),
}

/// Declaration kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Const,
    Let,
    Var,
}

/// Statement node.
#[derive(Debug, Clone)]
pub enum Statement {
    /// Empty statement (;)
    Empty,
    /// Expression statement
    Expression(Expression),
    /// `const`/`let`/`var` declaration
    Variable {
        kind: VariableKind,
        declarations: Vec<(String, Option<Expression>)>,
    },
    /// `function name(...) { ... }`
    Function(Rc<FunctionNode>),
    /// Block statement
    Block(Vec<Statement>),
    /// If statement
    If {
        test: Expression,
        consequent: Box<Statement>,
        alternate: Option<Box<Statement>>,
    },
    /// Return statement
    Return(Option<Expression>),
    /// Throw statement
    Throw(Expression),
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// !
    Not,
    /// -
    Minus,
    /// +
    Plus,
    /// typeof
    Typeof,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// &&
    And,
    /// ||
    Or,
    /// ??
    Nullish,
}

/// Member property.
#[derive(Debug, Clone)]
pub enum MemberProperty {
    /// `obj.name`
    Named(String),
    /// `obj[expr]`
    Computed(Box<Expression>),
}

/// Expression node.
#[derive(Debug, Clone)]
pub enum Expression {
    /// Number literal.
    Number(f64),
    /// String literal.
    String(String),
    /// BigInt literal.
    BigInt(i64),
    /// `true` / `false`.
    Boolean(bool),
    /// `null`.
    Null,
    /// `this`.
    This,
    /// Identifier reference.
    Identifier(String),
    /// `[a, b]`
    Array(Vec<Expression>),
    /// `{ key: value }`
    Object(Vec<(String, Expression)>),
    /// Function literal.
    Function(Rc<FunctionNode>),
    /// Unary operation.
    Unary {
        operator: UnaryOp,
        argument: Box<Expression>,
    },
    /// Binary operation.
    Binary {
        operator: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Short-circuiting operation.
    Logical {
        operator: LogicalOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// `test ? consequent : alternate`
    Conditional {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
    },
    /// Assignment; `operator` is set for compound forms like `+=`.
    Assign {
        operator: Option<BinaryOp>,
        target: Box<Expression>,
        value: Box<Expression>,
    },
    /// Property access.
    Member {
        object: Box<Expression>,
        property: MemberProperty,
    },
    /// Call; `new X(...)` parses to the same node.
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
}

impl Expression {
    /// Whether the expression can appear left of `=`.
    pub fn is_assignment_target(&self) -> bool {
        matches!(self, Expression::Identifier(_) | Expression::Member { .. })
    }
}
