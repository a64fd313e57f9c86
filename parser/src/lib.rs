//! FILENAME: parser/src/lib.rs
//! PURPOSE: Library root for the filter text parsers.
//! CONTEXT: Reads the two textual query dialects that the engine emits and
//! consumes, producing one shared expression tree for both.
//!
//! PIPELINE: Filter String --> Lexer --> Tokens --> Parser --> AST --> Engine lowering
//!
//! SUPPORTED DIALECTS:
//! - Expression: it.Name.Contains("x") && it.Age >= 18
//! - OData: contains(Name,'x') and Age ge 18

pub mod ast;
pub mod lexer;
pub mod odata;
pub mod parser;
pub mod token;


pub use ast::{BinaryOperator, Expression, Literal, UnaryOperator};
pub use lexer::{Dialect, Lexer};
pub use odata::ODataParser;
pub use parser::{parse, ParseError, ParseResult, Parser, MAX_NESTING};
pub use token::Token;
