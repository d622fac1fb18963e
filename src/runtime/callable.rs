use crate::language::ast::FunctionDecl;
use crate::runtime::{
    environment::Environment,
    error::RuntimeResult,
    interpreter::{Flow, Interpreter},
    value::Value,
};
use std::fmt;
use std::rc::Rc;

/// Anything a call expression can invoke.
pub trait Callable {
    fn name(&self) -> &str;
    fn arity(&self) -> usize;
    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> RuntimeResult<Value>;
}

/// A `fun` declaration closed over the scope it was declared in.
pub struct UserFunction {
    declaration: Rc<FunctionDecl>,
    closure: Environment,
}

impl UserFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: Environment) -> Self {
        Self {
            declaration,
            closure,
        }
    }

    #[cfg(test)]
    pub fn closure(&self) -> &Environment {
        &self.closure
    }
}

impl Callable for UserFunction {
    fn name(&self) -> &str {
        &self.declaration.name.name
    }

    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    #[tracing::instrument(level = "debug", skip_all, fields(function = %self.name()))]
    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> RuntimeResult<Value> {
        // Parent is the captured scope, not the caller's.
        let env = Environment::with_enclosing(&self.closure);
        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            env.define(&param.name, argument);
        }

        match interpreter.execute_block(&self.declaration.body, env)? {
            Flow::Return(value) => {
                tracing::trace!(%value, "function returned");
                Ok(value)
            }
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

pub type NativeFn = dyn Fn(&mut Interpreter, &[Value]) -> RuntimeResult<Value>;

/// A host-provided operation with a fixed arity and no AST body.
pub struct NativeFunction {
    name: String,
    arity: usize,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(name: impl Into<String>, arity: usize, func: F) -> Self
    where
        F: Fn(&mut Interpreter, &[Value]) -> RuntimeResult<Value> + 'static,
    {
        Self {
            name: name.into(),
            arity,
            func: Box::new(func),
        }
    }
}

impl Callable for NativeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> RuntimeResult<Value> {
        tracing::debug!(native = %self.name, "calling native function");
        (self.func)(interpreter, &arguments)
    }
}

/// The callable payload of a [`Value`]. Clones share the function object, so
/// equality is identity.
#[derive(Clone)]
pub enum Function {
    User(Rc<UserFunction>),
    Native(Rc<NativeFunction>),
}

impl Function {
    fn as_callable(&self) -> &dyn Callable {
        match self {
            Function::User(function) => function.as_ref(),
            Function::Native(function) => function.as_ref(),
        }
    }
}

impl Callable for Function {
    fn name(&self) -> &str {
        self.as_callable().name()
    }

    fn arity(&self) -> usize {
        self.as_callable().arity()
    }

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> RuntimeResult<Value> {
        self.as_callable().call(interpreter, arguments)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Function::User(a), Function::User(b)) => Rc::ptr_eq(a, b),
            (Function::Native(a), Function::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::User(function) => write!(f, "<fn {}>", function.name()),
            Function::Native(function) => write!(f, "<native fn {}>", function.name()),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::User(function) => f
                .debug_struct("UserFunction")
                .field("name", &function.name())
                .field("arity", &function.arity())
                .finish(),
            Function::Native(function) => f
                .debug_struct("NativeFunction")
                .field("name", &function.name())
                .field("arity", &function.arity())
                .finish(),
        }
    }
}
