use crate::error::RuntimeError;
use crate::token::Token;
use crate::value::Value;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A scope frame shared between the interpreter and every closure that
/// captured it. Writes through one handle are seen through all others.
///
/// Frames are reference counted, not traced. A function declared in a frame
/// is bound in that same frame and holds it as its closure, so such a frame
/// (and its ancestors) is never freed. Frames no function captured are
/// dropped as soon as their block or call exits.
pub type SharedEnv = Rc<RefCell<Environment>>;

/// One level of name → value bindings, linked to its enclosing frame.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<SharedEnv>,
}

impl Environment {
    /// The outermost (global) frame.
    pub fn new() -> SharedEnv {
        Rc::new(RefCell::new(Environment::default()))
    }

    pub fn with_enclosing(enclosing: SharedEnv) -> SharedEnv {
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }))
    }

    /// Open a fresh innermost scope on top of `env`.
    pub fn push_scope(env: &SharedEnv) -> SharedEnv {
        Environment::with_enclosing(Rc::clone(env))
    }

    /// The scope enclosing `env`, or `None` for the global frame.
    pub fn pop_scope(env: &SharedEnv) -> Option<SharedEnv> {
        env.borrow().enclosing.clone()
    }

    /// Bind `name` in this frame, overwriting any earlier binding here.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Look `name` up, walking outward through enclosing frames.
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    /// Rebind an existing `name`, walking outward through enclosing frames.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// The frame `distance` hops out from `env` (0 is `env` itself).
    pub fn ancestor(env: &SharedEnv, distance: usize) -> Option<SharedEnv> {
        let mut frame = Rc::clone(env);

        for _ in 0..distance {
            let next = frame.borrow().enclosing.clone()?;
            frame = next;
        }

        Some(frame)
    }

    /// Read `name` directly from the frame `distance` hops out.
    pub fn get_at(env: &SharedEnv, distance: usize, name: &Token) -> Result<Value, RuntimeError> {
        debug!("get_at '{}' distance {}", name.lexeme, distance);

        let frame = Environment::ancestor(env, distance).ok_or_else(|| undefined(name))?;
        let value = frame.borrow().values.get(&name.lexeme).cloned();

        value.ok_or_else(|| undefined(name))
    }

    /// Write `name` directly in the frame `distance` hops out.
    pub fn assign_at(
        env: &SharedEnv,
        distance: usize,
        name: &Token,
        value: Value,
    ) -> Result<(), RuntimeError> {
        debug!("assign_at '{}' distance {}", name.lexeme, distance);

        let frame = Environment::ancestor(env, distance).ok_or_else(|| undefined(name))?;
        let mut frame = frame.borrow_mut();

        match frame.values.get_mut(&name.lexeme) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined(name)),
        }
    }
}

fn undefined(name: &Token) -> RuntimeError {
    RuntimeError::new(name, format!("Undefined variable '{}'.", name.lexeme))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, name, 0, 1)
    }

    #[test]
    fn get_walks_the_chain() {
        let globals = Environment::new();
        globals.borrow_mut().define("a", Value::Number(1.0));
        let inner = Environment::push_scope(&globals);

        assert_eq!(inner.borrow().get(&ident("a")), Ok(Value::Number(1.0)));
        assert_eq!(
            inner.borrow().get(&ident("b")).unwrap_err().message,
            "Undefined variable 'b'."
        );
    }

    #[test]
    fn assign_updates_the_defining_frame() {
        let globals = Environment::new();
        globals.borrow_mut().define("a", Value::Number(1.0));
        let inner = Environment::push_scope(&globals);

        inner
            .borrow_mut()
            .assign(&ident("a"), Value::Number(2.0))
            .unwrap();

        assert_eq!(globals.borrow().get(&ident("a")), Ok(Value::Number(2.0)));
        assert!(inner
            .borrow_mut()
            .assign(&ident("missing"), Value::Nil)
            .is_err());
    }

    #[test]
    fn distance_skips_shadowing_frames() {
        let outer = Environment::new();
        outer.borrow_mut().define("x", Value::String("outer".into()));
        let inner = Environment::push_scope(&outer);
        inner.borrow_mut().define("x", Value::String("inner".into()));

        assert_eq!(
            Environment::get_at(&inner, 1, &ident("x")),
            Ok(Value::String("outer".into()))
        );

        Environment::assign_at(&inner, 0, &ident("x"), Value::Bool(true)).unwrap();
        assert_eq!(outer.borrow().get(&ident("x")), Ok(Value::String("outer".into())));
        assert_eq!(inner.borrow().get(&ident("x")), Ok(Value::Bool(true)));

        assert!(Environment::get_at(&inner, 5, &ident("x")).is_err());
    }

    #[test]
    fn pop_scope_returns_enclosing() {
        let outer = Environment::new();
        let inner = Environment::push_scope(&outer);

        let popped = Environment::pop_scope(&inner).unwrap();
        assert!(Rc::ptr_eq(&popped, &outer));
        assert!(Environment::pop_scope(&outer).is_none());
    }
}
