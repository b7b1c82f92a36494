use std::fmt;
use std::io::Write;
use std::rc::Rc;

use log::debug;

use crate::ast::FunctionDecl;
use crate::environment::{Environment, SharedEnv};
use crate::error::RuntimeError;
use crate::interpreter::Interpreter;

/// Anything that can appear in call position.
pub trait Callable {
    /// Number of arguments the callable accepts.
    fn arity(&self) -> usize;

    /// Invoke with arguments already checked against [`Callable::arity`].
    fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError>;
}

/// Host function signature for natives.
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, String>;

/// A host‑provided function injected into the global scope.
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(name: &str, arity: usize, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + 'static,
    {
        NativeFunction {
            name: name.to_string(),
            arity,
            func: Box::new(func),
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}/{}>", self.name, self.arity)
    }
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        debug!("Calling native function '{}'", self.name);

        (self.func)(&arguments).map_err(|message| RuntimeError {
            line: interpreter.current_line(),
            message,
        })
    }
}

/// A user function together with the frame it was declared in.
pub struct LoxFunction {
    pub declaration: Rc<FunctionDecl>,
    pub closure: SharedEnv,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: SharedEnv) -> Self {
        LoxFunction {
            declaration,
            closure,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }
}

impl fmt::Debug for LoxFunction {
    // The closure may contain this very function; never print it.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Parameters live in a fresh frame whose parent is the *closure*, not
    /// the caller's frame. That frame is also the body's block scope.
    fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        debug!("Calling user-defined function '{}'", self.name());

        let frame: SharedEnv = Environment::push_scope(&self.closure);

        for (param, value) in self.declaration.params.iter().zip(arguments) {
            debug!("Binding parameter '{}' to {}", param.lexeme, value);
            frame.borrow_mut().define(&param.lexeme, value);
        }

        let signal = interpreter.execute_block(&self.declaration.body, frame)?;

        Ok(signal.into_return_value())
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Function(Rc<LoxFunction>),
    Native(Rc<NativeFunction>),
}

impl Value {
    /// `nil` and `false` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
        }
    }
}

impl PartialEq for Value {
    /// No coercion between types; callables compare by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Number(n) => write!(f, "{}", format_number(*n)),

            Value::String(s) => write!(f, "{}", s),

            Value::Function(func) => write!(f, "<fn {}>", func.name()),

            Value::Native(_) => write!(f, "<native fn>"),
        }
    }
}

/// Shortest text that reads back as `n`. Integral values drop the `.0`;
/// magnitudes below 1e-4 or from 1e16 up switch to `1e+21` style exponents.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return n.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    // `{:e}` yields the shortest round-trip digits, e.g. "1.5e-7".
    let scientific = format!("{:e}", n);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return n.to_string();
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if (-4..16).contains(&exponent) {
        n.to_string()
    } else {
        format!("{}e{:+03}", mantissa, exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
    }

    #[test]
    fn numbers_drop_integral_fraction() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(-0.5).to_string(), "-0.5");
        assert_eq!(Value::Number(2.25).to_string(), "2.25");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "inf");
    }

    #[test]
    fn extreme_magnitudes_use_exponents() {
        assert_eq!(Value::Number(1e21).to_string(), "1e+21");
        assert_eq!(Value::Number(1e15).to_string(), "1000000000000000");
        assert_eq!(Value::Number(1e16).to_string(), "1e+16");
        assert_eq!(Value::Number(-2.5e-7).to_string(), "-2.5e-07");
        assert_eq!(Value::Number(0.0001).to_string(), "0.0001");
        assert_eq!(Value::Number(0.00001).to_string(), "1e-05");
        assert_eq!(Value::Number(1.5e300).to_string(), "1.5e+300");
    }

    #[test]
    fn non_finite_numbers() {
        assert_eq!(Value::Number(f64::NAN).to_string(), "nan");
        assert_eq!(Value::Number(f64::NEG_INFINITY).to_string(), "-inf");
        assert_eq!(Value::Number(-0.0).to_string(), "0");
    }

    #[test]
    fn equality_never_coerces() {
        assert_ne!(Value::Number(1.0), Value::String("1".into()));
        assert_ne!(Value::Nil, Value::Bool(false));
        assert_eq!(Value::String("a".into()), Value::String("a".into()));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn natives_compare_by_identity() {
        let a = Rc::new(NativeFunction::new("a", 0, |_| Ok(Value::Nil)));
        let b = Rc::new(NativeFunction::new("a", 0, |_| Ok(Value::Nil)));

        assert_eq!(Value::Native(Rc::clone(&a)), Value::Native(Rc::clone(&a)));
        assert_ne!(Value::Native(a), Value::Native(b));
    }
}
