use crate::{
    language::errors::{SyntaxError, SyntaxErrors},
    runtime::error::RuntimeError,
};
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
pub struct SyntaxDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl SyntaxDiagnostic {
    pub fn from_error(src: NamedSource<String>, err: SyntaxError) -> Self {
        Self {
            src,
            span: err.to_source_span(),
            label: err.label_or_default().to_string(),
            help: err.help,
            message: err.message,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub fn syntax_diagnostics(name: &str, source: &str, errors: &SyntaxErrors) -> Vec<SyntaxDiagnostic> {
    let src = NamedSource::new(name, source.to_string());
    errors
        .errors
        .iter()
        .map(|err| SyntaxDiagnostic::from_error(src.clone(), err.clone()))
        .collect()
}

pub fn emit_syntax_errors(name: &str, source: &str, errors: &SyntaxErrors) {
    for diagnostic in syntax_diagnostics(name, source, errors) {
        eprintln!("{:?}", Report::new(diagnostic));
    }
}

pub fn report_runtime_error(error: &RuntimeError) {
    eprintln!("Runtime error: {}", error);
}

pub fn report_io_error(path: &Path, error: &std::io::Error) {
    eprintln!("Failed to access {}: {}", path.display(), error);
}
