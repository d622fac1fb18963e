use crate::language::{span::Span, token::TokenKind};
use miette::SourceSpan;
use thiserror::Error;

/// One problem found while reading source text. `label` annotates the span
/// in rendered diagnostics; `help` is an optional suggestion shown below it.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
    pub label: Option<String>,
    pub help: Option<String>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            label: None,
            help: None,
        }
    }

    /// "Expected X but found Y", labelled with the token that was wanted.
    pub fn expected(expected: &TokenKind, found: Option<&TokenKind>, span: Span) -> Self {
        let wanted = expected.describe();
        let found = found.map_or_else(|| "end of input".to_string(), TokenKind::describe);
        Self::new(format!("Expected {wanted} but found {found}"), span)
            .with_label(format!("expected {wanted}"))
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn label_or_default(&self) -> &str {
        self.label.as_deref().unwrap_or("here")
    }

    pub fn to_source_span(&self) -> SourceSpan {
        self.span.into()
    }
}

/// Every syntax error of one source text, in source order. Nothing runs
/// while any are present.
#[derive(Clone, Debug, Error)]
#[error("{} syntax error(s)", .errors.len())]
pub struct SyntaxErrors {
    pub errors: Vec<SyntaxError>,
}

impl SyntaxErrors {
    pub fn new(errors: Vec<SyntaxError>) -> Self {
        Self { errors }
    }

    pub fn messages(&self) -> Vec<&str> {
        self.errors.iter().map(|err| err.message.as_str()).collect()
    }
}
