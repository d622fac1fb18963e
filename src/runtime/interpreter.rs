use crate::language::ast::*;
use crate::runtime::{
    callable::{Callable, Function, NativeFunction, UserFunction},
    environment::Environment,
    error::{RuntimeError, RuntimeResult},
    natives,
    platform::StdPlatform,
    print::PrintHandler,
    value::Value,
};
use std::rc::Rc;

/// Outcome of executing a statement.
///
/// `Return` unwinds through enclosing blocks and loops until the function
/// call boundary turns it back into a value. It never travels on the error
/// channel.
#[derive(Debug, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    globals: Environment,
    env: Environment,
    output: PrintHandler,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Stdout output and the standard natives on the host clock.
    pub fn new() -> Self {
        Self::with_print_handler(PrintHandler::Stdout)
    }

    pub fn with_print_handler(output: PrintHandler) -> Self {
        let mut interpreter = Self::bare(output);
        natives::register_std(&mut interpreter, Rc::new(StdPlatform));
        interpreter
    }

    /// No natives registered; the host installs its own via
    /// [`Interpreter::define_native`].
    pub fn bare(output: PrintHandler) -> Self {
        let globals = Environment::new();
        Self {
            env: globals.clone(),
            globals,
            output,
        }
    }

    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    pub fn print_handler(&self) -> &PrintHandler {
        &self.output
    }

    pub fn define_native<F>(&mut self, name: &str, arity: usize, func: F)
    where
        F: Fn(&mut Interpreter, &[Value]) -> RuntimeResult<Value> + 'static,
    {
        tracing::debug!(native = name, arity, "registering native function");
        let native = NativeFunction::new(name, arity, func);
        self.globals
            .define(name, Value::Callable(Function::Native(Rc::new(native))));
    }

    /// Runs top-level statements in order, stopping at the first runtime
    /// error. Effects of the statements before it are kept.
    pub fn interpret(&mut self, statements: &[Stmt]) -> RuntimeResult<()> {
        tracing::debug!(statements = statements.len(), "interpreting program");
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                tracing::warn!(%value, "return outside of a function ended the program");
                break;
            }
        }
        Ok(())
    }

    pub fn execute(&mut self, stmt: &Stmt) -> RuntimeResult<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                self.output.println(&value.to_string());
                Ok(Flow::Normal)
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.env.define(&name.name, value);
                Ok(Flow::Normal)
            }
            Stmt::Block(statements) => {
                let env = Environment::with_enclosing(&self.env);
                self.execute_block(statements, env)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Function(declaration) => {
                let function = UserFunction::new(Rc::clone(declaration), self.env.clone());
                self.env.define(
                    &declaration.name.name,
                    Value::Callable(Function::User(Rc::new(function))),
                );
                Ok(Flow::Normal)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value))
            }
        }
    }

    /// Runs `statements` with `env` as the current scope. The previous scope
    /// is restored on every exit: normal completion, `return`, or error.
    pub fn execute_block(&mut self, statements: &[Stmt], env: Environment) -> RuntimeResult<Flow> {
        let previous = std::mem::replace(&mut self.env, env);
        let result = self.execute_statements(statements);
        self.env = previous;
        result
    }

    fn execute_statements(&mut self, statements: &[Stmt]) -> RuntimeResult<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    pub fn evaluate(&mut self, expr: &Expr) -> RuntimeResult<Value> {
        match expr {
            Expr::Literal(literal, _) => Ok(match literal {
                Literal::Number(value) => Value::Number(*value),
                Literal::String(value) => Value::String(value.clone()),
                Literal::Bool(value) => Value::Bool(*value),
                Literal::Nil => Value::Nil,
            }),
            Expr::Grouping(inner, _) => self.evaluate(inner),
            Expr::Unary { op, expr, .. } => {
                let operand = self.evaluate(expr)?;
                eval_unary(*op, operand)
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let lhs = self.evaluate(left)?;
                let rhs = self.evaluate(right)?;
                eval_binary(*op, lhs, rhs)
            }
            Expr::Logical {
                op, left, right, ..
            } => {
                let lhs = self.evaluate(left)?;
                let short_circuits = match op {
                    LogicalOp::Or => lhs.is_truthy(),
                    LogicalOp::And => !lhs.is_truthy(),
                };
                if short_circuits {
                    Ok(lhs)
                } else {
                    self.evaluate(right)
                }
            }
            Expr::Variable(ident) => self.env.get(&ident.name),
            Expr::Assign { name, value, .. } => {
                let value = self.evaluate(value)?;
                self.env.assign(&name.name, value.clone())?;
                Ok(value)
            }
            Expr::Call { callee, args, .. } => {
                let callee = self.evaluate(callee)?;
                let mut arguments = Vec::with_capacity(args.len());
                for arg in args {
                    arguments.push(self.evaluate(arg)?);
                }
                self.call_value(callee, arguments)
            }
        }
    }

    fn call_value(&mut self, callee: Value, arguments: Vec<Value>) -> RuntimeResult<Value> {
        let function = match callee {
            Value::Callable(function) => function,
            other => {
                return Err(RuntimeError::NotCallable {
                    type_name: other.type_name(),
                })
            }
        };
        if arguments.len() != function.arity() {
            return Err(RuntimeError::ArityMismatch {
                name: function.name().to_string(),
                expected: function.arity(),
                received: arguments.len(),
            });
        }
        function.call(self, arguments)
    }
}

fn eval_unary(op: UnaryOp, operand: Value) -> RuntimeResult<Value> {
    match (op, operand) {
        (UnaryOp::Neg, Value::Number(value)) => Ok(Value::Number(-value)),
        (UnaryOp::Neg, other) => Err(RuntimeError::TypeMismatch {
            operator: op.symbol(),
            expected: "a number",
            found: other.type_name().to_string(),
        }),
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
    }
}

/// Division by zero follows IEEE 754: `inf`, `-inf` or `NaN`, never an error.
fn eval_binary(op: BinaryOp, lhs: Value, rhs: Value) -> RuntimeResult<Value> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(lhs == rhs)),
        BinaryOp::NotEq => return Ok(Value::Bool(lhs != rhs)),
        _ => {}
    }

    match (op, &lhs, &rhs) {
        (BinaryOp::Add, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (BinaryOp::Add, Value::String(a), Value::String(b)) => {
            Ok(Value::String(format!("{a}{b}")))
        }
        (BinaryOp::Sub, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
        (BinaryOp::Mul, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
        (BinaryOp::Div, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
        (BinaryOp::Gt, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),
        (BinaryOp::GtEq, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),
        (BinaryOp::Lt, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),
        (BinaryOp::LtEq, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),
        (BinaryOp::Gt, Value::String(a), Value::String(b)) => Ok(Value::Bool(a > b)),
        (BinaryOp::GtEq, Value::String(a), Value::String(b)) => Ok(Value::Bool(a >= b)),
        (BinaryOp::Lt, Value::String(a), Value::String(b)) => Ok(Value::Bool(a < b)),
        (BinaryOp::LtEq, Value::String(a), Value::String(b)) => Ok(Value::Bool(a <= b)),
        _ => Err(RuntimeError::TypeMismatch {
            operator: op.symbol(),
            expected: expected_operands(op),
            found: format!("{} and {}", lhs.type_name(), rhs.type_name()),
        }),
    }
}

fn expected_operands(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "two numbers or two strings",
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => "two numbers",
        BinaryOp::Gt | BinaryOp::GtEq | BinaryOp::Lt | BinaryOp::LtEq => {
            "two numbers or two strings"
        }
        BinaryOp::Eq | BinaryOp::NotEq => "any operands",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parser::parse_program;
    use pretty_assertions::assert_eq;

    fn eval_source(source: &str) -> RuntimeResult<Value> {
        let statements = parse_program(&format!("{source};")).expect("source should parse");
        let Some(Stmt::Expression(expr)) = statements.first() else {
            panic!("expected a single expression statement");
        };
        Interpreter::with_print_handler(PrintHandler::buffer()).evaluate(expr)
    }

    fn eval(source: &str) -> Value {
        eval_source(source).unwrap_or_else(|err| panic!("`{source}` failed: {err}"))
    }

    #[test]
    fn arithmetic_on_numbers() {
        assert_eq!(eval("1 + 2"), Value::Number(3.0));
        assert_eq!(eval("10 - 4 - 3"), Value::Number(3.0));
        assert_eq!(eval("2 * 3 + 1"), Value::Number(7.0));
        assert_eq!(eval("(1 + 2) * 3"), Value::Number(9.0));
        assert_eq!(eval("7 / 2"), Value::Number(3.5));
        assert_eq!(eval("-(3)"), Value::Number(-3.0));
    }

    #[test]
    fn plus_concatenates_strings() {
        assert_eq!(eval("\"foo\" + \"bar\""), Value::from("foobar"));
        assert_eq!(eval("\"\" + \"\""), Value::from(""));
    }

    #[test]
    fn plus_rejects_mixed_operands() {
        let err = eval_source("1 + \"x\"").unwrap_err();
        assert_eq!(
            err,
            RuntimeError::TypeMismatch {
                operator: "+",
                expected: "two numbers or two strings",
                found: "number and string".to_string(),
            }
        );
        assert_eq!(
            err.to_string(),
            "Operator `+` expects two numbers or two strings, found number and string"
        );
    }

    #[test]
    fn every_mismatched_arithmetic_pair_is_an_error() {
        for source in ["1 - \"a\"", "\"a\" * 2", "nil / 1", "true - false", "\"a\" - \"b\""] {
            assert!(
                matches!(eval_source(source), Err(RuntimeError::TypeMismatch { .. })),
                "`{source}` should be a type mismatch"
            );
        }
    }

    #[test]
    fn division_by_zero_follows_ieee() {
        assert_eq!(eval("1 / 0"), Value::Number(f64::INFINITY));
        assert_eq!(eval("-1 / 0"), Value::Number(f64::NEG_INFINITY));
        let Value::Number(nan) = eval("0 / 0") else {
            panic!("0 / 0 should produce a number");
        };
        assert!(nan.is_nan());
    }

    #[test]
    fn negation_requires_number() {
        let err = eval_source("-\"x\"").unwrap_err();
        assert_eq!(err.to_string(), "Operator `-` expects a number, found string");
    }

    #[test]
    fn not_applies_truthiness() {
        assert_eq!(eval("!nil"), Value::Bool(true));
        assert_eq!(eval("!false"), Value::Bool(true));
        assert_eq!(eval("!0"), Value::Bool(false));
        assert_eq!(eval("!\"\""), Value::Bool(false));
        assert_eq!(eval("!!true"), Value::Bool(true));
    }

    #[test]
    fn comparisons_on_numbers_and_strings() {
        assert_eq!(eval("1 < 2"), Value::Bool(true));
        assert_eq!(eval("2 <= 2"), Value::Bool(true));
        assert_eq!(eval("3 > 4"), Value::Bool(false));
        assert_eq!(eval("4 >= 5"), Value::Bool(false));
        assert_eq!(eval("\"apple\" < \"banana\""), Value::Bool(true));
        assert_eq!(eval("\"b\" >= \"ab\""), Value::Bool(true));
    }

    #[test]
    fn comparison_rejects_mixed_operands() {
        let err = eval_source("1 < \"2\"").unwrap_err();
        assert!(matches!(err, RuntimeError::TypeMismatch { operator: "<", .. }));
        assert!(eval_source("nil > nil").is_err());
    }

    #[test]
    fn equality_never_fails() {
        assert_eq!(eval("nil == nil"), Value::Bool(true));
        assert_eq!(eval("nil == false"), Value::Bool(false));
        assert_eq!(eval("1 == \"1\""), Value::Bool(false));
        assert_eq!(eval("\"a\" == \"a\""), Value::Bool(true));
        assert_eq!(eval("1 != 2"), Value::Bool(true));
        assert_eq!(eval("clock == clock"), Value::Bool(true));
        assert_eq!(eval("clock == date"), Value::Bool(false));
    }

    #[test]
    fn logical_operators_return_operand_values() {
        assert_eq!(eval("nil or \"fallback\""), Value::from("fallback"));
        assert_eq!(eval("0 or 1"), Value::Number(0.0));
        assert_eq!(eval("\"left\" and \"right\""), Value::from("right"));
        assert_eq!(eval("false and undefined_name"), Value::Bool(false));
        assert_eq!(eval("\"hi\" or undefined_name"), Value::from("hi"));
    }

    #[test]
    fn undefined_variable_is_reported() {
        assert_eq!(
            eval_source("missing").unwrap_err(),
            RuntimeError::UndefinedVariable {
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn calling_non_callable_fails() {
        assert_eq!(
            eval_source("\"text\"()").unwrap_err(),
            RuntimeError::NotCallable { type_name: "string" }
        );
    }

    #[test]
    fn native_arity_is_checked() {
        assert_eq!(
            eval_source("clock(1)").unwrap_err(),
            RuntimeError::ArityMismatch {
                name: "clock".to_string(),
                expected: 0,
                received: 1,
            }
        );
    }

    #[test]
    fn arguments_are_evaluated_before_arity_check() {
        assert!(matches!(
            eval_source("clock(missing)"),
            Err(RuntimeError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn block_restores_scope_after_error() {
        let mut interpreter = Interpreter::bare(PrintHandler::buffer());
        let statements = parse_program("var a = 1; { var a = 2; a + nil; }").unwrap();
        assert!(interpreter.interpret(&statements).is_err());
        assert!(interpreter.env.ptr_eq(&interpreter.globals));
        assert_eq!(interpreter.globals.get("a").unwrap(), Value::Number(1.0));
    }

    #[test]
    fn return_flow_is_not_an_error() {
        let mut interpreter = Interpreter::bare(PrintHandler::buffer());
        let statements = parse_program("fun f() { { { return 1; } } }").unwrap();
        interpreter.interpret(&statements).unwrap();
        let Stmt::Function(decl) = &statements[0] else {
            panic!("expected function");
        };
        let env = Environment::with_enclosing(&interpreter.globals);
        let flow = interpreter.execute_block(&decl.body, env).unwrap();
        assert_eq!(flow, Flow::Return(Value::Number(1.0)));
        assert!(interpreter.env.ptr_eq(&interpreter.globals));
    }

    #[test]
    fn top_level_return_from_host_ast_stops_program() {
        let mut interpreter = Interpreter::bare(PrintHandler::buffer());
        let statements = vec![
            Stmt::Print(Expr::Literal(Literal::Number(1.0), Default::default())),
            Stmt::Return {
                value: None,
                span: Default::default(),
            },
            Stmt::Print(Expr::Literal(Literal::Number(2.0), Default::default())),
        ];
        interpreter.interpret(&statements).unwrap();
        assert_eq!(interpreter.print_handler().output(), "1\n");
    }

    #[test]
    fn nested_declaration_keeps_call_scope_alive() {
        let mut interpreter = Interpreter::bare(PrintHandler::buffer());
        let declarations = parse_program(
            "fun flat() { var x = 1; return x; } fun outer() { fun inner() {} return 1; }",
        )
        .unwrap();
        interpreter.interpret(&declarations).unwrap();
        let before = interpreter.globals.handle_count();

        let flat_calls = parse_program("flat(); flat(); flat();").unwrap();
        interpreter.interpret(&flat_calls).unwrap();
        assert_eq!(interpreter.globals.handle_count(), before);

        // `inner` lives in the scope it captured: scope -> inner -> scope.
        // Reference counting never frees that cycle, so each call's scope
        // keeps its handle on the globals.
        let nested_calls = parse_program("outer(); outer(); outer();").unwrap();
        interpreter.interpret(&nested_calls).unwrap();
        assert_eq!(interpreter.globals.handle_count(), before + 3);
    }

    #[test]
    fn define_native_registers_in_globals() {
        let mut interpreter = Interpreter::bare(PrintHandler::buffer());
        interpreter.define_native("twice", 1, |_, args| match &args[0] {
            Value::Number(n) => Ok(Value::Number(n * 2.0)),
            other => Err(RuntimeError::TypeMismatch {
                operator: "twice",
                expected: "a number",
                found: other.type_name().to_string(),
            }),
        });
        let statements = parse_program("print twice(21);").unwrap();
        interpreter.interpret(&statements).unwrap();
        assert_eq!(interpreter.print_handler().output(), "42\n");
    }
}
