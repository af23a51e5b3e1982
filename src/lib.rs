#[macro_use]
extern crate pest_derive;

pub mod alu;
pub mod cegis;
pub mod codegen;
pub mod compiler;
pub mod program;
pub mod sketch;
pub mod smt;
pub mod solver;
