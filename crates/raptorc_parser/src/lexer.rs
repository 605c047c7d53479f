use std::fmt;
use std::ops::Range;

use chumsky::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Num(String),
    Str(String),
    Op(String),
    Ctrl(char),
    Ident(String),
    Var,
    Function,
    Return,
    If,
    Else,
    While,
    True,
    False,
    Null,
    Undefined,
    This,
}

impl Token {
    pub fn op(op: &str) -> Self {
        Token::Op(op.to_string())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{n}"),
            Token::Str(s) => write!(f, "\"{s}\""),
            Token::Op(op) => write!(f, "{op}"),
            Token::Ctrl(c) => write!(f, "{c}"),
            Token::Ident(name) => write!(f, "{name}"),
            Token::Var => write!(f, "var"),
            Token::Function => write!(f, "function"),
            Token::Return => write!(f, "return"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::While => write!(f, "while"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Null => write!(f, "null"),
            Token::Undefined => write!(f, "undefined"),
            Token::This => write!(f, "this"),
        }
    }
}

pub type Spanned<T> = (T, Range<usize>);

/// Character-level lexer producing spanned tokens.
pub fn lexer() -> impl Parser<char, Vec<Spanned<Token>>, Error = Simple<char>> {
    let num = text::int(10)
        .chain::<char, _, _>(just('.').chain(text::digits(10)).or_not().flatten())
        .collect::<String>()
        .map(Token::Num);

    let double_quoted = just('"')
        .ignore_then(filter(|c: &char| *c != '"' && *c != '\n').repeated())
        .then_ignore(just('"'))
        .collect::<String>();
    let single_quoted = just('\'')
        .ignore_then(filter(|c: &char| *c != '\'' && *c != '\n').repeated())
        .then_ignore(just('\''))
        .collect::<String>();
    let string = double_quoted.or(single_quoted).map(Token::Str);

    let long_op = choice((
        just("=="),
        just("!="),
        just("<="),
        just(">="),
        just("&&"),
        just("||"),
    ))
    .map(Token::op);
    let short_op = one_of("+-*/%<>=!").map(|c: char| Token::Op(c.to_string()));

    let ctrl = one_of("(){};,").map(Token::Ctrl);

    let ident = text::ident().map(|ident: String| match ident.as_str() {
        "var" => Token::Var,
        "function" => Token::Function,
        "return" => Token::Return,
        "if" => Token::If,
        "else" => Token::Else,
        "while" => Token::While,
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        "undefined" => Token::Undefined,
        "this" => Token::This,
        _ => Token::Ident(ident),
    });

    let token = num
        .or(string)
        .or(long_op)
        .or(short_op)
        .or(ctrl)
        .or(ident);

    let comment = just("//")
        .then(filter(|c: &char| *c != '\n').repeated())
        .padded();

    token
        .map_with_span(|tok, span| (tok, span))
        .padded_by(comment.repeated())
        .padded()
        .repeated()
        .then_ignore(end())
}
