//! A low-level crate for lexing and modelling PDF object syntax.
//!
//! The crate covers three layers:
//! - [`token`]: a lexer turning raw bytes into syntax tokens, including the
//!   `NUM NUM R` reference lookahead.
//! - [`object`]: the owned value model (null, booleans, numbers, strings,
//!   names, arrays, dictionaries, streams and indirect references) together
//!   with a token-to-value assembler.
//! - [`document`]: in-memory source documents — an object arena addressed by
//!   `(number, generation)`, the page list derived from the page tree, and
//!   the [`Resolve`](document::Resolve) contract consumed by higher layers.
//!
//! Cross-reference tables, filters, encryption and rendering are out of
//! scope; see the `quire-merge` crate for recombining documents.

pub mod acroform;
pub mod document;
pub mod object;
pub mod reader;
pub mod token;
mod trivia;
pub mod write;

pub use document::{Document, Resolve, SourceError};
pub use token::{Lexer, SyntaxError, SyntaxErrorKind, Token};
