pub mod diagnostics;
pub mod driver;
pub mod language;
pub mod repl;
pub mod runtime;
