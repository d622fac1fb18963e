pub mod callable;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod natives;
pub mod platform;
pub mod print;
pub mod value;

pub use interpreter::Interpreter;
