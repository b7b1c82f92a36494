use std::collections::HashMap;
use std::io::Write;
use std::mem;
use std::rc::Rc;
use std::time::Instant;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::environment::{Environment, SharedEnv};
use crate::error::RuntimeError;
use crate::native;
use crate::stack::ensure_sufficient_stack;
use crate::token::{Token, TokenType};
use crate::value::{Callable, LoxFunction, NativeFunction, Value};

/// Convenient alias for interpreter results.
pub type IResult<T> = Result<T, RuntimeError>;

/// How a statement finished. `return` is not an error, so it travels on the
/// `Ok` side and is stopped by the enclosing call.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Normal,
    Return(Value),
}

impl Signal {
    /// The value a call yields when its body finished with `self`.
    pub fn into_return_value(self) -> Value {
        match self {
            Signal::Normal => Value::Nil,
            Signal::Return(value) => value,
        }
    }
}

/// Interpreter tunables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Nested calls allowed before `Stack overflow.` is raised.
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_call_depth: 2048,
        }
    }
}

/// Tree‑walking evaluator. `print` output goes to `out`.
pub struct Interpreter<W: Write> {
    globals: SharedEnv,
    environment: SharedEnv,
    locals: HashMap<ExprId, usize>,
    out: W,
    config: Config,
    call_depth: usize,
    call_line: usize,
}

impl<W: Write> Interpreter<W> {
    /// Creates a new Interpreter and defines native functions such as `clock`.
    pub fn new(out: W) -> Self {
        Interpreter::with_config(out, Config::default())
    }

    pub fn with_config(out: W, config: Config) -> Self {
        info!("Initializing Interpreter with {:?}", config);

        let globals: SharedEnv = Environment::new();

        let mut interpreter = Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            out,
            config,
            call_depth: 0,
            call_line: 0,
        };

        for native in native::standard_library(Instant::now()) {
            interpreter.define_native(native);
        }

        interpreter
    }

    /// Install a host function into the global frame.
    pub fn define_native(&mut self, native: NativeFunction) {
        debug!("Defining native function '{}'", native.name);

        let name = native.name.clone();
        self.define_global(&name, Value::Native(Rc::new(native)));
    }

    pub fn define_global(&mut self, name: &str, value: Value) {
        self.globals.borrow_mut().define(name, value);
    }

    /// Record that the variable site `id` refers to a binding `depth` scopes
    /// out. Called by the resolver; sites never recorded are globals.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        debug!("Resolved {:?} at depth {}", id, depth);

        self.locals.insert(id, depth);
    }

    /// Resolved depth of a variable site, if it is a local.
    pub fn resolved_depth(&self, id: ExprId) -> Option<usize> {
        self.locals.get(&id).copied()
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Line of the call expression currently being dispatched.
    pub fn current_line(&self) -> usize {
        self.call_line
    }

    /// Interprets a list of statements (a "program"). The first runtime
    /// error stops the run.
    pub fn interpret(&mut self, statements: &[Stmt]) -> IResult<()> {
        info!("Interpreting {} statements", statements.len());

        for stmt in statements {
            if let Signal::Return(_) = self.execute(stmt)? {
                break;
            }
        }

        info!("Interpretation completed successfully");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    pub fn execute(&mut self, stmt: &Stmt) -> IResult<Signal> {
        ensure_sufficient_stack(|| self.execute_stmt(stmt))
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> IResult<Signal> {
        match stmt {
            Stmt::Expression(expr) => {
                debug!("Evaluating expression statement");
                self.evaluate(expr)?;
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                debug!("Printing value: {}", value);
                writeln!(self.out, "{}", value).map_err(|e| RuntimeError {
                    line: expr.line().unwrap_or(self.call_line),
                    message: format!("Output error: {}", e),
                })?;
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Defining variable '{}' = {}", name.lexeme, value);
                self.environment.borrow_mut().define(&name.lexeme, value);
            }

            Stmt::Block(statements) => {
                let scope = Environment::push_scope(&self.environment);
                return self.execute_block(statements, scope);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.execute(else_branch);
                }
            }

            Stmt::While { condition, body } => {
                debug!("Entering while loop");
                while self.evaluate(condition)?.is_truthy() {
                    if let signal @ Signal::Return(_) = self.execute(body)? {
                        return Ok(signal);
                    }
                }
            }

            Stmt::Function(declaration) => {
                self.declare_function(declaration);
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                return Ok(Signal::Return(value));
            }
        }

        Ok(Signal::Normal)
    }

    /// Bind the function's name to a closure over the current frame.
    fn declare_function(&mut self, declaration: &Rc<FunctionDecl>) {
        let function = LoxFunction::new(Rc::clone(declaration), Rc::clone(&self.environment));

        debug!(
            "Function '{}' defined with {} parameters",
            declaration.name.lexeme,
            declaration.params.len()
        );

        self.environment
            .borrow_mut()
            .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));
    }

    /// Run `statements` with `scope` as the innermost frame. The previous
    /// frame is restored however the block exits.
    pub fn execute_block(&mut self, statements: &[Stmt], scope: SharedEnv) -> IResult<Signal> {
        debug!("Entering block with {} statements", statements.len());

        let previous = mem::replace(&mut self.environment, scope);

        let mut outcome = Ok(Signal::Normal);
        for stmt in statements {
            match self.execute(stmt) {
                Ok(Signal::Normal) => continue,
                other => {
                    outcome = other;
                    break;
                }
            }
        }

        self.environment = previous;
        debug!("Exited block");

        outcome
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> IResult<Value> {
        ensure_sufficient_stack(|| self.evaluate_expr(expr))
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> IResult<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;

                let decided = match operator.token_type {
                    TokenType::OR => left.is_truthy(),
                    _ => !left.is_truthy(),
                };

                if decided {
                    debug!("Short-circuited '{}'", operator.lexeme);
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        Environment::assign_at(&self.environment, distance, name, value.clone())?
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                debug!("Assigned {} to '{}'", value, name.lexeme);
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut values = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                self.call_value(callee, paren, values)
            }
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> IResult<Value> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> IResult<Value> {
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(RuntimeError::new(operator, "Operand must be a number.")),
            },
            TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
            _ => Err(RuntimeError::new(operator, "Invalid unary operator.")),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> IResult<Value> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        debug!(
            "Binary '{}' on {} and {}",
            operator.lexeme, left, right
        );

        match operator.token_type {
            TokenType::PLUS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                _ => Err(RuntimeError::new(
                    operator,
                    "Operands must be two numbers or two strings.",
                )),
            },

            TokenType::MINUS => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Number(a * b))
            }

            TokenType::SLASH => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

            _ => Err(RuntimeError::new(operator, "Invalid binary operator.")),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    fn call_value(&mut self, callee: Value, paren: &Token, arguments: Vec<Value>) -> IResult<Value> {
        match callee {
            Value::Function(function) => self.call_checked(function.as_ref(), paren, arguments),
            Value::Native(native) => self.call_checked(native.as_ref(), paren, arguments),
            other => {
                debug!("Attempted to call a {}", other.type_name());
                Err(RuntimeError::new(
                    paren,
                    "Can only call functions and classes.",
                ))
            }
        }
    }

    /// Arity check, depth accounting, then dispatch.
    fn call_checked<C: Callable>(
        &mut self,
        callee: &C,
        paren: &Token,
        arguments: Vec<Value>,
    ) -> IResult<Value> {
        if arguments.len() != callee.arity() {
            return Err(RuntimeError::new(
                paren,
                format!(
                    "Expected {} arguments but got {}.",
                    callee.arity(),
                    arguments.len()
                ),
            ));
        }

        if self.call_depth >= self.config.max_call_depth {
            return Err(RuntimeError::new(paren, "Stack overflow."));
        }

        self.call_depth += 1;
        let caller_line = mem::replace(&mut self.call_line, paren.line);

        let result = callee.call(self, arguments);

        self.call_line = caller_line;
        self.call_depth -= 1;

        debug!("Call on line {} returned {:?}", paren.line, result);
        result
    }
}

fn number_operands(operator: &Token, left: &Value, right: &Value) -> IResult<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(RuntimeError::new(operator, "Operands must be numbers.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, name, 0, 1)
    }

    #[test]
    fn signal_return_value() {
        assert_eq!(Signal::Normal.into_return_value(), Value::Nil);
        assert_eq!(
            Signal::Return(Value::Number(1.0)).into_return_value(),
            Value::Number(1.0)
        );
    }

    #[test]
    fn unresolved_sites_read_globals() {
        let mut interpreter = Interpreter::new(Vec::new());
        interpreter.define_global("answer", Value::Number(42.0));

        let expr = Expr::Variable {
            id: ExprId(0),
            name: ident("answer"),
        };
        assert_eq!(interpreter.evaluate(&expr), Ok(Value::Number(42.0)));
    }

    #[test]
    fn clock_is_predefined() {
        let mut interpreter = Interpreter::new(Vec::new());
        let expr = Expr::Variable {
            id: ExprId(0),
            name: ident("clock"),
        };
        assert!(matches!(interpreter.evaluate(&expr), Ok(Value::Native(_))));
    }

    fn run(interpreter: &mut Interpreter<Vec<u8>>, source: &str) {
        let (tokens, scan_errors) = crate::scanner::scan_tokens(source);
        assert!(scan_errors.is_empty());
        let statements = crate::parser::Parser::new(tokens).parse().unwrap();
        crate::resolver::Resolver::new(interpreter)
            .resolve(&statements)
            .unwrap();
        interpreter.interpret(&statements).unwrap();
    }

    #[test]
    fn uncaptured_frames_are_released() {
        let mut interpreter = Interpreter::new(Vec::new());
        let baseline = Rc::strong_count(&interpreter.globals);

        run(
            &mut interpreter,
            "{ var a = 1; { var b = a; } } fun id(x) { return x; } id(1); id(2);",
        );
        // `id` captured the globals once; blocks and call frames are gone.
        assert_eq!(Rc::strong_count(&interpreter.globals), baseline + 1);
    }

    #[test]
    fn self_capturing_frames_stay_alive() {
        let mut interpreter = Interpreter::new(Vec::new());
        let baseline = Rc::strong_count(&interpreter.globals);

        run(&mut interpreter, "{ fun inner() {} }");
        // The block frame owns `inner`, which owns the block frame.
        assert_eq!(Rc::strong_count(&interpreter.globals), baseline + 1);
    }

    #[test]
    fn block_restores_environment_after_error() {
        let mut interpreter = Interpreter::new(Vec::new());
        let before = Rc::clone(&interpreter.environment);

        let failing = Stmt::Block(vec![Stmt::Expression(Expr::Variable {
            id: ExprId(0),
            name: ident("missing"),
        })]);

        assert!(interpreter.execute(&failing).is_err());
        assert!(Rc::ptr_eq(&before, &interpreter.environment));
    }
}
