use std::error::Error;
use std::fmt::Display;
use std::hash::Hash;

use ariadne::{Label, Report, ReportKind, Source};
use chumsky::error::{Simple, SimpleReason};
use raptorc_ast::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct ParserError {
    pub message: String,
    pub span: Span,
}

impl ParserError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// Render the error against its source text as an annotated report.
    pub fn report(&self, source_id: &str, source: &str) -> String {
        let mut buffer = Vec::new();
        let result = Report::build(ReportKind::Error, source_id, self.span.start)
            .with_message(&self.message)
            .with_label(
                Label::new((source_id, self.span.start..self.span.end.max(self.span.start + 1)))
                    .with_message(&self.message),
            )
            .finish()
            .write((source_id, Source::from(source)), &mut buffer);

        match result {
            Ok(()) => String::from_utf8_lossy(&buffer).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

impl<T: Display + Hash + Eq> From<Simple<T>> for ParserError {
    fn from(value: Simple<T>) -> Self {
        let span_range = value.span();
        let span = Span::new(span_range.start, span_range.end);
        let message = match value.reason() {
            SimpleReason::Custom(message) => message.clone(),
            SimpleReason::Unclosed { delimiter, .. } => {
                format!("unclosed delimiter {delimiter}")
            }
            SimpleReason::Unexpected => match value.found() {
                Some(found) => format!("unexpected token: {found}"),
                None => "unexpected end of input".to_string(),
            },
        };
        Self { message, span }
    }
}

impl Display for ParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ParserError at {}: {}", self.span, self.message)
    }
}

impl Error for ParserError {}
