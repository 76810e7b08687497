//! Lexer, parser, and statement model for the Scout query language.
//!
//! The surface is a read-only SQL dialect with three extra statement
//! shapes: `TRACE` (follow an identifier across sources), `SHOW`
//! (catalogue listings), and `CACHE` (cache control). Keywords are
//! case-insensitive; identifiers keep their source case.
//!
//! ```ignore
//! use scout_sql::parse;
//!
//! let stmt = parse("SELECT name, status FROM services WHERE environment = 'production'")?;
//! ```
//!
//! Parsing never touches a data source: the output is an immutable
//! [`ast::Statement`] value consumed by the executor and discarded after
//! the query completes.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::Statement;
pub use parser::parse;
