//! Expression AST. Deliberately small: no lambdas, no pipelines, no loops —
//! this evaluator must never be Turing-complete (see module docs in `lib.rs`).

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// A path rooted at the evaluation context, e.g. `input.region` or
    /// `items[0].name`.
    Path(Vec<PathSegment>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// An allow-listed function call; unknown names are a parse-time error.
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Field(String),
    Index(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}
