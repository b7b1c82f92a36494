//! A tree‑walking interpreter for Lox.
//!
//! Source text goes through four stages: [`scanner`] → [`parser`] →
//! [`resolver`] → [`interpreter`]. [`session::Lox`] wires them together.
//!
//! ```
//! use rox::session::{Lox, Outcome};
//!
//! let mut lox = Lox::new(Vec::new(), Vec::new());
//! assert_eq!(lox.run("print 1 + 2;"), Outcome::Completed);
//! assert_eq!(lox.interpreter().output(), b"3\n");
//! ```

pub mod ast;
pub mod ast_printer;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod native;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod session;
pub mod stack;
pub mod token;
pub mod value;
