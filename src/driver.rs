use crate::{
    language::{errors::SyntaxErrors, parser::parse_program},
    runtime::{error::RuntimeError, Interpreter},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Syntax(#[from] SyntaxErrors),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Parses `source` and runs it on `interpreter`. Nothing executes when the
/// source has syntax errors.
pub fn run_source(interpreter: &mut Interpreter, source: &str) -> Result<(), RunError> {
    let statements = parse_program(source)?;
    interpreter.interpret(&statements)?;
    Ok(())
}
