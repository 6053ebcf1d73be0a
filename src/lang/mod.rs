/*!
# Rust Language Module

This Rust module provides lexical analysis and parsing of the language.
The parser drives code generation one function at a time.

*/

pub type LineNumber = Option<usize>;
pub type Column = std::ops::Range<usize>;

#[macro_use]
mod error;
mod lex;
mod line;
mod parse;
mod scan;
mod token;

pub use error::Error;
pub use error::ErrorCode;
pub use lex::lex;
pub use line::LineSource;
pub use parse::Parser;
pub use scan::Scanner;
pub use token::{Literal, Operator, Token, Word};

pub mod ast;
