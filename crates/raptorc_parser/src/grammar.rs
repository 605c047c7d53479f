use std::ops::Range;

use chumsky::prelude::*;
use raptorc_ast::{
    BinaryOp, Expr, Function, Literal, LogicalOp, Node, Span, Statement, UnaryOp,
};

use crate::lexer::Token;

const USE_STRICT: &str = "use strict";

/// Returns true when the directive prologue of `body` contains `"use strict"`.
pub fn has_use_strict(body: &[Node<Statement>]) -> bool {
    body.iter()
        .map_while(|stmt| match stmt.as_ref() {
            Statement::Expr(expr) => match expr.as_ref() {
                Expr::Literal(Literal::String(directive)) => Some(directive.as_str()),
                _ => None,
            },
            _ => None,
        })
        .any(|directive| directive == USE_STRICT)
}

fn node<T>(value: T, span: Range<usize>) -> Node<T> {
    Node::new(value, Span::from(span))
}

fn binary(lhs: Node<Expr>, op: BinaryOp, rhs: Node<Expr>) -> Node<Expr> {
    let span = lhs.span().merge(rhs.span());
    Node::new(
        Expr::Binary {
            op,
            left: Box::new(lhs),
            right: Box::new(rhs),
        },
        span,
    )
}

fn logical(lhs: Node<Expr>, op: LogicalOp, rhs: Node<Expr>) -> Node<Expr> {
    let span = lhs.span().merge(rhs.span());
    Node::new(
        Expr::Logical {
            op,
            left: Box::new(lhs),
            right: Box::new(rhs),
        },
        span,
    )
}

fn make_function(
    name: Option<String>,
    params: Vec<String>,
    body: Vec<Node<Statement>>,
) -> Function {
    let strict = has_use_strict(&body);
    Function {
        name,
        params,
        body,
        strict,
    }
}

fn op(symbol: &str) -> impl Parser<Token, Token, Error = Simple<Token>> + Clone {
    just(Token::op(symbol))
}

fn ctrl(c: char) -> impl Parser<Token, Token, Error = Simple<Token>> + Clone {
    just(Token::Ctrl(c))
}

/// Statement-level grammar.
pub fn statement() -> impl Parser<Token, Node<Statement>, Error = Simple<Token>> + Clone {
    recursive(|stmt| {
        let ident = select! { Token::Ident(name) => name };

        let block = stmt
            .clone()
            .repeated()
            .delimited_by(ctrl('{'), ctrl('}'))
            .boxed();

        let params = ident
            .clone()
            .separated_by(ctrl(','))
            .delimited_by(ctrl('('), ctrl(')'));

        let expr = recursive(|expr| {
            let number = select! { Token::Num(n) => n }.try_map(|n: String, span: Range<usize>| {
                n.parse::<f64>()
                    .map(|value| Expr::Literal(Literal::Number(value)))
                    .map_err(|err| {
                        Simple::<Token>::custom(span, format!("invalid number {n}: {err}"))
                    })
            });

            let literal = select! {
                Token::Str(s) => Expr::Literal(Literal::String(s)),
                Token::True => Expr::Literal(Literal::Bool(true)),
                Token::False => Expr::Literal(Literal::Bool(false)),
                Token::Null => Expr::Literal(Literal::Null),
                Token::Undefined => Expr::Literal(Literal::Undefined),
                Token::This => Expr::This,
            };

            let function_expr = just(Token::Function)
                .ignore_then(ident.clone().or_not())
                .then(params.clone())
                .then(block.clone())
                .map_with_span(|((name, params), body), span: Range<usize>| {
                    Expr::Function(Box::new(node(make_function(name, params, body), span)))
                });

            let atom = number
                .or(literal)
                .or(ident.clone().map(Expr::Identifier))
                .or(function_expr)
                .map_with_span(node)
                .or(expr
                    .clone()
                    .delimited_by(ctrl('('), ctrl(')')))
                .boxed();

            let args = expr
                .clone()
                .separated_by(ctrl(','))
                .delimited_by(ctrl('('), ctrl(')'))
                .map_with_span(|args, span: Range<usize>| (args, span));

            let call = atom
                .then(args.repeated())
                .foldl(|callee, (args, span)| {
                    let span = callee.span().merge(Span::from(span));
                    Node::new(
                        Expr::Call {
                            callee: Box::new(callee),
                            args,
                        },
                        span,
                    )
                })
                .boxed();

            let unary_op = op("-").to(UnaryOp::Neg).or(op("!").to(UnaryOp::Not));
            let unary = unary_op
                .map_with_span(|op, span: Range<usize>| (op, span))
                .repeated()
                .then(call)
                .foldr(|(op, span), rhs| {
                    let span = Span::from(span).merge(rhs.span());
                    Node::new(
                        Expr::Unary {
                            op,
                            expr: Box::new(rhs),
                        },
                        span,
                    )
                })
                .boxed();

            let product_op = op("*")
                .to(BinaryOp::Mul)
                .or(op("/").to(BinaryOp::Div))
                .or(op("%").to(BinaryOp::Mod));
            let product = unary
                .clone()
                .then(product_op.then(unary).repeated())
                .foldl(|lhs, (op, rhs)| binary(lhs, op, rhs))
                .boxed();

            let sum_op = op("+").to(BinaryOp::Add).or(op("-").to(BinaryOp::Sub));
            let sum = product
                .clone()
                .then(sum_op.then(product).repeated())
                .foldl(|lhs, (op, rhs)| binary(lhs, op, rhs))
                .boxed();

            let compare_op = op("<=")
                .to(BinaryOp::LtEq)
                .or(op(">=").to(BinaryOp::GtEq))
                .or(op("<").to(BinaryOp::Lt))
                .or(op(">").to(BinaryOp::Gt));
            let comparison = sum
                .clone()
                .then(compare_op.then(sum).repeated())
                .foldl(|lhs, (op, rhs)| binary(lhs, op, rhs))
                .boxed();

            let equality_op = op("==").to(BinaryOp::Eq).or(op("!=").to(BinaryOp::Ne));
            let equality = comparison
                .clone()
                .then(equality_op.then(comparison).repeated())
                .foldl(|lhs, (op, rhs)| binary(lhs, op, rhs))
                .boxed();

            let and = equality
                .clone()
                .then(op("&&").to(LogicalOp::And).then(equality).repeated())
                .foldl(|lhs, (op, rhs)| logical(lhs, op, rhs))
                .boxed();

            let or = and
                .clone()
                .then(op("||").to(LogicalOp::Or).then(and).repeated())
                .foldl(|lhs, (op, rhs)| logical(lhs, op, rhs))
                .boxed();

            let assign = ident
                .clone()
                .then_ignore(op("="))
                .then(expr)
                .map_with_span(|(name, value), span: Range<usize>| {
                    node(
                        Expr::Assign {
                            name,
                            value: Box::new(value),
                        },
                        span,
                    )
                });

            assign.or(or).boxed()
        });

        let semi = ctrl(';');

        let var = just(Token::Var)
            .ignore_then(ident.clone())
            .then(op("=").ignore_then(expr.clone()).or_not())
            .then_ignore(semi.clone())
            .map(|(name, init)| Statement::Var { name, init });

        let function_decl = just(Token::Function)
            .ignore_then(ident)
            .then(params)
            .then(block.clone())
            .map_with_span(|((name, params), body), span: Range<usize>| {
                Statement::Function(node(make_function(Some(name), params, body), span))
            });

        let return_stmt = just(Token::Return)
            .ignore_then(expr.clone().or_not())
            .then_ignore(semi.clone())
            .map(Statement::Return);

        let condition = expr.clone().delimited_by(ctrl('('), ctrl(')'));

        let if_stmt = just(Token::If)
            .ignore_then(condition.clone())
            .then(stmt.clone())
            .then(just(Token::Else).ignore_then(stmt.clone()).or_not())
            .map(|((cond, then_branch), else_branch)| Statement::If {
                cond,
                then_branch: Box::new(then_branch),
                else_branch: else_branch.map(Box::new),
            });

        let while_stmt = just(Token::While)
            .ignore_then(condition)
            .then(stmt.clone())
            .map(|(cond, body)| Statement::While {
                cond,
                body: Box::new(body),
            });

        let block_stmt = block.map(Statement::Block);
        let empty = semi.clone().to(Statement::Empty);
        let expr_stmt = expr.then_ignore(semi).map(Statement::Expr);

        var.or(function_decl)
            .or(return_stmt)
            .or(if_stmt)
            .or(while_stmt)
            .or(block_stmt)
            .or(empty)
            .or(expr_stmt)
            .map_with_span(node)
            .boxed()
    })
}

/// A whole script: statements up to the end of input.
pub fn program() -> impl Parser<Token, Vec<Node<Statement>>, Error = Simple<Token>> {
    statement().repeated().then_ignore(end())
}
