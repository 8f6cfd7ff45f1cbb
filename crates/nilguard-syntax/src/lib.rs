//! Go front-end syntax for nilguard — tokens, AST, parser and printer.
//!
//! The parser covers the slice of Go the analyzer needs to rewrite and
//! re-load whole programs: declarations, the statement forms that can
//! carry `nil`, and the full type grammar (the rewriter re-parses every
//! type expression it renders).

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod source;
pub mod token;

pub use ast::*;
pub use parser::{parse_file, parse_type_expr, ParseError};
pub use source::{FileId, LineCol, SourceFile, SourceMap, Span};
