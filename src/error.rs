//! Centralised error hierarchy for the interpreter.
//!
//! Static failures (scanner, parser, resolver) and runtime failures are kept
//! in separate variants because they drive different exit codes: a program
//! with any static error never runs, a runtime error stops the run that raised
//! it.
//!
//! The module **does not** print diagnostics itself.

use thiserror::Error;

use log::debug;

use crate::token::{Token, TokenType};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error. `location` is ` at end` or ` at 'lexeme'`.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        location: String,
        line: usize,
    },

    /// Static‑analysis failure found by the resolver.
    #[error("[line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        location: String,
        line: usize,
    },

    /// Runtime evaluation error.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// A failure raised while executing a program. Carries the line of the
/// token that caused it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[line {line}] {message}")]
pub struct RuntimeError {
    pub line: usize,
    pub message: String,
}

impl RuntimeError {
    pub fn new<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Runtime error at line {}: {}", token.line, message);

        RuntimeError {
            line: token.line,
            message,
        }
    }
}

/// Describes where in the token stream a static error was found.
fn location(token: &Token) -> String {
    if token.token_type == TokenType::EOF {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            location: location(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Resolve error: line={}, msg={}", token.line, message);

        LoxError::Resolve {
            message,
            location: location(token),
            line: token.line,
        }
    }

    /// Scan, parse and resolve errors prevent a program from running.
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            LoxError::Lex { .. } | LoxError::Parse { .. } | LoxError::Resolve { .. }
        )
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_errors_render_location() {
        let ident = Token::new(TokenType::IDENTIFIER, "foo", 4, 2);
        let eof = Token::new(TokenType::EOF, "", 9, 3);

        assert_eq!(
            LoxError::parse(&ident, "Expect ';' after value.").to_string(),
            "[line 2] Error at 'foo': Expect ';' after value."
        );
        assert_eq!(
            LoxError::parse(&eof, "Expect expression.").to_string(),
            "[line 3] Error at end: Expect expression."
        );
        assert_eq!(
            LoxError::lex(7, "Unexpected character.").to_string(),
            "[line 7] Error: Unexpected character."
        );
    }

    #[test]
    fn runtime_errors_render_line_then_message() {
        let op = Token::new(TokenType::MINUS, "-", 0, 5);
        let err: LoxError = RuntimeError::new(&op, "Operands must be numbers.").into();

        assert!(!err.is_static());
        assert_eq!(err.to_string(), "[line 5] Operands must be numbers.");
    }
}
