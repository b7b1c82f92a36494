//! Static resolver pass.
//!
//! One walk over the syntax tree before anything runs:
//! 1. Build lexical scopes (stack of `HashMap<String, bool>` tracking declared/defined).
//! 2. Report static errors (reading a local in its own initializer, `return`
//!    outside a function).
//! 3. Tell the interpreter, for *each* variable site, how many scopes out its
//!    binding lives. Sites not found in any scope are globals and get no entry.

use std::collections::HashMap;
use std::io::Write;
use std::mem;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::stack::ensure_sufficient_stack;
use crate::token::Token;

/// Are we inside a user function?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
}

/// Tracks scopes, enforces static rules, and *records* binding distances by
/// calling back into the interpreter.
pub struct Resolver<'i, W: Write> {
    interpreter: &'i mut Interpreter<W>,
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    current_function: FunctionType,
    errors: Vec<LoxError>,
}

impl<'i, W: Write> Resolver<'i, W> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'i mut Interpreter<W>) -> Self {
        info!("Resolver instantiated");

        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            errors: Vec::new(),
        }
    }

    /// Walk all top‑level statements. Every error found is returned; the
    /// walk does not stop at the first one.
    pub fn resolve(&mut self, statements: &[Stmt]) -> Result<(), Vec<LoxError>> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        self.resolve_stmts(statements);

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(mem::take(&mut self.errors))
        }
    }

    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        ensure_sufficient_stack(|| {
            match stmt {
                Stmt::Block(statements) => {
                    self.begin_scope();
                    self.resolve_stmts(statements);
                    self.end_scope();
                }

                Stmt::Var { name, initializer } => {
                    // declare → resolve initializer → define
                    self.declare(name);
                    if let Some(expr) = initializer {
                        self.resolve_expr(expr);
                    }
                    self.define(name);
                }

                Stmt::Function(declaration) => {
                    // The name is visible inside its own body, enabling recursion.
                    self.declare(&declaration.name);
                    self.define(&declaration.name);
                    self.resolve_function(declaration);
                }

                Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expr(expr),

                Stmt::If {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    self.resolve_expr(condition);
                    self.resolve_stmt(then_branch);
                    if let Some(else_branch) = else_branch.as_deref() {
                        self.resolve_stmt(else_branch);
                    }
                }

                Stmt::While { condition, body } => {
                    self.resolve_expr(condition);
                    self.resolve_stmt(body);
                }

                Stmt::Return { keyword, value } => {
                    if self.current_function == FunctionType::None {
                        self.errors.push(LoxError::resolve(
                            keyword,
                            "Can't return from top-level code.",
                        ));
                    }
                    if let Some(expr) = value {
                        self.resolve_expr(expr);
                    }
                }
            }
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        ensure_sufficient_stack(|| {
            match expr {
                Expr::Literal(_) => {}

                Expr::Grouping(inner) => self.resolve_expr(inner),

                Expr::Unary { right, .. } => self.resolve_expr(right),

                Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                    self.resolve_expr(left);
                    self.resolve_expr(right);
                }

                Expr::Variable { id, name } => {
                    let in_own_initializer = self
                        .scopes
                        .last()
                        .is_some_and(|scope| scope.get(&name.lexeme) == Some(&false));

                    if in_own_initializer {
                        self.errors.push(LoxError::resolve(
                            name,
                            "Can't read local variable in its own initializer.",
                        ));
                    }

                    self.resolve_local(*id, name);
                }

                Expr::Assign { id, name, value } => {
                    self.resolve_expr(value);
                    self.resolve_local(*id, name);
                }

                Expr::Call {
                    callee, arguments, ..
                } => {
                    self.resolve_expr(callee);
                    for argument in arguments {
                        self.resolve_expr(argument);
                    }
                }
            }
        })
    }

    /// Parameters and body share one scope, matching the single frame a
    /// call allocates.
    fn resolve_function(&mut self, declaration: &FunctionDecl) {
        let enclosing = self.current_function;
        self.current_function = FunctionType::Function;

        self.begin_scope();
        for param in &declaration.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&declaration.body);
        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Redeclaring in the same scope is allowed and simply resets the entry.
    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    /// Record this variable site as a local at depth `d`, or leave it
    /// unrecorded (global) if no scope declares it.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.interpreter.resolve(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::scan_tokens;

    fn parse(source: &str) -> Vec<Stmt> {
        let (tokens, errors) = scan_tokens(source);
        assert!(errors.is_empty());
        Parser::new(tokens).parse().expect("valid program")
    }

    /// Depth recorded for the `n`th variable site (in id order).
    fn depths(source: &str) -> (Vec<Option<usize>>, Result<(), Vec<LoxError>>) {
        let statements = parse(source);
        let mut interpreter = Interpreter::new(Vec::new());
        let outcome = Resolver::new(&mut interpreter).resolve(&statements);
        let depths = (0..16)
            .map(|i| interpreter.resolved_depth(ExprId(i)))
            .collect();
        (depths, outcome)
    }

    #[test]
    fn globals_are_not_recorded() {
        let (depths, outcome) = depths("var a = 1; print a;");
        assert!(outcome.is_ok());
        assert_eq!(depths[0], None);
    }

    #[test]
    fn nested_blocks_count_outward() {
        // ids: 0 = `a` in the inner block, 1 = `a` in the innermost one.
        let (depths, outcome) = depths("{ var a = 1; { print a; { print a; } } }");
        assert!(outcome.is_ok());
        assert_eq!(depths[0], Some(1));
        assert_eq!(depths[1], Some(2));
    }

    #[test]
    fn parameters_share_the_body_scope() {
        let (depths, outcome) = depths("fun f(x) { print x; { print x; } }");
        assert!(outcome.is_ok());
        assert_eq!(depths[0], Some(0));
        assert_eq!(depths[1], Some(1));
    }

    #[test]
    fn self_reference_in_initializer_is_an_error() {
        let (_, outcome) = depths("{ var a = a; }");
        let errors = outcome.unwrap_err();
        assert_eq!(
            errors[0].to_string(),
            "[line 1] Error at 'a': Can't read local variable in its own initializer."
        );
    }

    #[test]
    fn global_self_reference_is_left_to_runtime() {
        let (_, outcome) = depths("var a = a;");
        assert!(outcome.is_ok());
    }

    #[test]
    fn top_level_return_is_an_error() {
        let (_, outcome) = depths("return 1;");
        assert_eq!(
            outcome.unwrap_err()[0].to_string(),
            "[line 1] Error at 'return': Can't return from top-level code."
        );
    }

    #[test]
    fn redeclaration_in_one_scope_is_allowed() {
        let (_, outcome) = depths("{ var a = 1; var a = 2; }");
        assert!(outcome.is_ok());
    }
}
