//! Parser for raptor scripts.
//!
//! Lexing and parsing are both built with chumsky: the lexer turns characters
//! into spanned tokens and the grammar turns the token stream into a
//! [`Program`].

pub mod error;
pub mod grammar;
pub mod lexer;

pub use error::ParserError;
pub use lexer::Token;

use chumsky::Stream;
use chumsky::prelude::*;
use raptorc_ast::Program;

/// Parse a complete script.
pub fn parse(source: &str) -> Result<Program, Vec<ParserError>> {
    let tokens = lexer::lexer()
        .parse(source)
        .map_err(|errors| errors.into_iter().map(ParserError::from).collect::<Vec<_>>())?;

    let len = source.chars().count();
    let stream = Stream::from_iter(len..len + 1, tokens.into_iter());
    let statements = grammar::program()
        .parse(stream)
        .map_err(|errors| errors.into_iter().map(ParserError::from).collect::<Vec<_>>())?;

    let strict = grammar::has_use_strict(&statements);
    Ok(Program::new(statements, strict))
}
