//! Drives source text through scanner → parser → resolver → interpreter.
//!
//! One [`Lox`] holds one interpreter, so globals and functions defined by an
//! earlier [`Lox::run`] stay visible to later ones (the REPL relies on this).

use std::io::Write;

use log::{info, warn};

use crate::error::LoxError;
use crate::interpreter::{Config, Interpreter};
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::scan_tokens;

/// Exit status for a program with static errors.
pub const EXIT_STATIC_ERROR: i32 = 65;

/// Exit status for a program that failed at runtime.
pub const EXIT_RUNTIME_ERROR: i32 = 70;

/// How one call to [`Lox::run`] went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Scan, parse or resolve errors; nothing was executed.
    StaticError,
    /// Execution started and stopped at a runtime error.
    RuntimeError,
}

pub struct Lox<W: Write, E: Write> {
    interpreter: Interpreter<W>,
    diagnostics: E,
    next_expr_id: usize,
    had_error: bool,
    had_runtime_error: bool,
}

impl<W: Write, E: Write> Lox<W, E> {
    /// `out` receives `print` output, `diagnostics` receives error reports.
    pub fn new(out: W, diagnostics: E) -> Self {
        Lox::with_config(out, diagnostics, Config::default())
    }

    pub fn with_config(out: W, diagnostics: E, config: Config) -> Self {
        Lox {
            interpreter: Interpreter::with_config(out, config),
            diagnostics,
            next_expr_id: 0,
            had_error: false,
            had_runtime_error: false,
        }
    }

    /// Scan, parse, resolve and execute `source`.
    pub fn run(&mut self, source: &str) -> Outcome {
        info!("Running {} bytes of source", source.len());

        let (tokens, scan_errors) = scan_tokens(source);
        self.report_all(&scan_errors);

        // Parse even after scan errors so syntax errors surface in the same run.
        let mut parser = Parser::new(tokens).with_first_id(self.next_expr_id);
        let parsed = parser.parse();
        self.next_expr_id = parser.next_id();

        let statements = match parsed {
            Ok(statements) if scan_errors.is_empty() => statements,
            Ok(_) => return Outcome::StaticError,
            Err(errors) => {
                self.report_all(&errors);
                return Outcome::StaticError;
            }
        };

        if let Err(errors) = Resolver::new(&mut self.interpreter).resolve(&statements) {
            self.report_all(&errors);
            return Outcome::StaticError;
        }

        match self.interpreter.interpret(&statements) {
            Ok(()) => Outcome::Completed,
            Err(e) => {
                self.had_runtime_error = true;
                self.report(&LoxError::Runtime(e));
                Outcome::RuntimeError
            }
        }
    }

    /// Whether any static error has been reported since the last reset.
    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Forget earlier static errors; the REPL calls this between lines.
    pub fn reset_error(&mut self) {
        self.had_error = false;
    }

    /// Process exit status reflecting everything run so far.
    pub fn exit_code(&self) -> i32 {
        if self.had_error {
            EXIT_STATIC_ERROR
        } else if self.had_runtime_error {
            EXIT_RUNTIME_ERROR
        } else {
            0
        }
    }

    pub fn interpreter(&self) -> &Interpreter<W> {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter<W> {
        &mut self.interpreter
    }

    pub fn diagnostics(&self) -> &E {
        &self.diagnostics
    }

    fn report_all(&mut self, errors: &[LoxError]) {
        for error in errors {
            self.report(error);
        }
    }

    fn report(&mut self, error: &LoxError) {
        if error.is_static() {
            self.had_error = true;
        }

        if let Err(e) = writeln!(self.diagnostics, "{}", error) {
            warn!("Could not write diagnostic '{}': {}", error, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Lox<Vec<u8>, Vec<u8>> {
        Lox::new(Vec::new(), Vec::new())
    }

    fn stdout(lox: &Lox<Vec<u8>, Vec<u8>>) -> String {
        String::from_utf8_lossy(lox.interpreter().output()).into_owned()
    }

    fn stderr(lox: &Lox<Vec<u8>, Vec<u8>>) -> String {
        String::from_utf8_lossy(lox.diagnostics()).into_owned()
    }

    #[test]
    fn scan_and_parse_errors_are_all_reported() {
        let mut lox = session();
        let outcome = lox.run("print 1 @;\nvar = 2;\nprint 3;");

        assert_eq!(outcome, Outcome::StaticError);
        assert_eq!(
            stderr(&lox),
            "[line 1] Error: Unexpected character.\n\
             [line 2] Error at '=': Expect variable name.\n"
        );
        assert_eq!(stdout(&lox), "");
        assert_eq!(lox.exit_code(), EXIT_STATIC_ERROR);
    }

    #[test]
    fn definitions_persist_between_runs() {
        let mut lox = session();
        assert_eq!(lox.run("fun twice(x) { return x * 2; }"), Outcome::Completed);
        assert_eq!(lox.run("print twice(21);"), Outcome::Completed);
        assert_eq!(stdout(&lox), "42\n");
    }

    #[test]
    fn closures_from_earlier_runs_keep_their_resolution() {
        let mut lox = session();
        lox.run("fun make() { var n = 0; fun inc() { n = n + 1; return n; } return inc; }");
        lox.run("var c = make();");
        lox.run("{ var n = 100; print c(); print c(); }");
        assert_eq!(stdout(&lox), "1\n2\n");
    }

    #[test]
    fn reset_error_clears_static_flag_only() {
        let mut lox = session();
        lox.run("print ;");
        assert!(lox.had_error());
        lox.reset_error();
        assert!(!lox.had_error());

        lox.run("print nope;");
        assert!(lox.had_runtime_error());
        assert_eq!(lox.exit_code(), EXIT_RUNTIME_ERROR);
    }
}
