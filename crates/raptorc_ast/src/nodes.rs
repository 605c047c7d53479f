use crate::span::Span;

/// A syntax tree node paired with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<T> {
    node: T,
    span: Span,
}

impl<T> Node<T> {
    #[inline]
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    #[inline]
    pub fn span(&self) -> Span {
        self.span
    }

    #[inline]
    pub fn into_inner(self) -> T {
        self.node
    }
}

impl<T> AsRef<T> for Node<T> {
    #[inline]
    fn as_ref(&self) -> &T {
        &self.node
    }
}

/// A parsed top-level script.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Node<Statement>>,
    /// Set when the directive prologue contains `"use strict"`.
    pub strict: bool,
}

impl Program {
    pub fn new(statements: Vec<Node<Statement>>, strict: bool) -> Self {
        Self { statements, strict }
    }

    /// Span covering every statement, or an empty span at 0 for an empty program.
    pub fn span(&self) -> Span {
        match (self.statements.first(), self.statements.last()) {
            (Some(first), Some(last)) => first.span().merge(last.span()),
            _ => Span::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// `None` for anonymous function expressions.
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Node<Statement>>,
    pub strict: bool,
}

impl Function {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Var {
        name: String,
        init: Option<Node<Expr>>,
    },
    Function(Node<Function>),
    Return(Option<Node<Expr>>),
    If {
        cond: Node<Expr>,
        then_branch: Box<Node<Statement>>,
        else_branch: Option<Box<Node<Statement>>>,
    },
    While {
        cond: Node<Expr>,
        body: Box<Node<Statement>>,
    },
    Block(Vec<Node<Statement>>),
    Expr(Node<Expr>),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Identifier(String),
    This,
    Assign {
        name: String,
        value: Box<Node<Expr>>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Node<Expr>>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node<Expr>>,
        right: Box<Node<Expr>>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Node<Expr>>,
        right: Box<Node<Expr>>,
    },
    Call {
        callee: Box<Node<Expr>>,
        args: Vec<Node<Expr>>,
    },
    Function(Box<Node<Function>>),
}
