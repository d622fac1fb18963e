use crate::{
    diagnostics,
    driver::RunError,
    language::{ast::Stmt, errors::SyntaxErrors, parser::parse_program},
    runtime::{print::PrintHandler, Interpreter},
};
use rustyline::{error::ReadlineError, DefaultEditor};
use std::io::{self, BufRead, IsTerminal};

const PROMPT: &str = "> ";

/// One interactive session. Globals persist from line to line.
pub struct Repl {
    interpreter: Interpreter,
}

impl Repl {
    pub fn new(interpreter: Interpreter) -> Self {
        Self { interpreter }
    }

    #[cfg(test)]
    fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Runs one line of input. A bare expression without a trailing `;` has
    /// its value printed.
    pub fn eval_line(&mut self, line: &str) -> Result<(), RunError> {
        let statements = match parse_program(line) {
            Ok(statements) => statements,
            Err(errors) => match bare_expression(line) {
                Some(statement) => vec![Stmt::Print(statement)],
                None => return Err(RunError::Syntax(errors)),
            },
        };
        self.interpreter.interpret(&statements)?;
        Ok(())
    }

    fn handle(&mut self, line: &str) {
        match self.eval_line(line) {
            Ok(()) => {}
            Err(RunError::Syntax(errors)) => report_syntax(line, &errors),
            Err(RunError::Runtime(err)) => diagnostics::report_runtime_error(&err),
        }
    }
}

fn bare_expression(line: &str) -> Option<crate::language::ast::Expr> {
    let mut statements = parse_program(&format!("{line};")).ok()?;
    match (statements.len(), statements.pop()) {
        (1, Some(Stmt::Expression(expr))) => Some(expr),
        _ => None,
    }
}

fn report_syntax(line: &str, errors: &SyntaxErrors) {
    diagnostics::emit_syntax_errors("<repl>", line, errors);
}

fn is_quit(line: &str) -> bool {
    matches!(line.trim(), ":quit" | ":q")
}

pub fn run_repl() -> Result<(), ReadlineError> {
    let mut repl = Repl::new(Interpreter::with_print_handler(PrintHandler::Stdout));

    if !io::stdin().is_terminal() {
        for line in io::stdin().lock().lines() {
            let line = line?;
            if is_quit(&line) {
                break;
            }
            if !line.trim().is_empty() {
                repl.handle(&line);
            }
        }
        return Ok(());
    }

    println!("mlox REPL. Type :quit or press Ctrl-D to exit.");
    let mut editor = DefaultEditor::new()?;
    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err),
        };
        if is_quit(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line.as_str());
        repl.handle(&line);
    }
    Ok(())
}
