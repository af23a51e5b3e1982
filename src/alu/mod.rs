//! Module for parsing ALU templates.
//!
//! It contains all structs for the internal representation of a template
//! (i.e., the AST) and the pest-generated parser.
mod body;
mod expression;
mod parser;
mod template;
mod template_error;

pub use self::body::*;
pub use self::expression::*;
pub use self::parser::*;
pub use self::template::*;
pub use self::template_error::*;

/// A position within a file (i.e., line and column)
pub type Position = (String, usize, usize);
