//! Destination for `print` statements.
//!
//! Scripts and the REPL write to stdout. Tests and embedders use a shared
//! buffer so the output can be inspected after the interpreter ran.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

#[derive(Clone, Debug, Default)]
pub enum PrintHandler {
    #[default]
    Stdout,
    Buffer(Rc<RefCell<String>>),
}

impl PrintHandler {
    pub fn buffer() -> Self {
        PrintHandler::Buffer(Rc::new(RefCell::new(String::new())))
    }

    /// Print a line (with newline).
    pub fn println(&self, msg: &str) {
        match self {
            PrintHandler::Stdout => {
                let mut stdout = io::stdout().lock();
                if let Err(err) = writeln!(stdout, "{msg}") {
                    // A closed reader (`mlox run x.lox | head -1`) is not an error.
                    if err.kind() != io::ErrorKind::BrokenPipe {
                        tracing::warn!(%err, "failed to write program output");
                    }
                }
            }
            PrintHandler::Buffer(buffer) => {
                let mut buf = buffer.borrow_mut();
                buf.push_str(msg);
                buf.push('\n');
            }
        }
    }

    /// Captured output. Always empty for stdout.
    pub fn output(&self) -> String {
        match self {
            PrintHandler::Stdout => String::new(),
            PrintHandler::Buffer(buffer) => buffer.borrow().clone(),
        }
    }

    pub fn clear(&self) {
        if let PrintHandler::Buffer(buffer) = self {
            buffer.borrow_mut().clear();
        }
    }
}
