//! SMT translation and verification.
//!
//! The solver's write-SMT mode dumps an intermediate DAG; a single walker
//! turns it into a quantifier-preserving formula. Verification asserts
//! the universally quantified formula; counter-example generation asserts
//! its negated body and reads back a model.
mod backend;
mod dag;
mod formula;

use std::{error::Error, fmt::Display, io};

pub use self::backend::{split_counter_examples, SmtBackend, SmtResult};
pub use self::dag::formula_from_dag;
pub use self::formula::{conjunction, QuantifiedFormula, SmtExpr, SmtValue};

#[derive(Debug, Clone)]
pub struct SmtError {
    pub message: String,
}

impl Display for SmtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for SmtError {}

impl From<io::Error> for SmtError {
    fn from(error: io::Error) -> Self {
        SmtError {
            message: error.to_string(),
        }
    }
}
