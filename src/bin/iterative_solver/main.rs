//! # Iterative solver
//!
//! This binary synthesizes a switch configuration for a packet program on
//! a stages-by-columns ALU grid. It combines sketch generation, the
//! external synthesizer, and SMT verification into a single application.
mod cli;

use cli::*;

use std::error::Error;

use log::error;
use pipesynth::{
    cegis::{IterativeSolver, Outcome, RefinementMode},
    compiler::{file_stem, Compiler, CompilerOptions},
    solver::SolverOptions,
};

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::init();

    simple_logger::init_with_level((&args.verbosity).into()).unwrap();

    let sketch_name = format!(
        "{}_{}_{}_{}_{}",
        file_stem(&args.program_file),
        file_stem(&args.stateful_alu_file),
        file_stem(&args.stateless_alu_file),
        args.num_pipeline_stages,
        args.num_alus_per_stage
    );

    let options = CompilerOptions {
        pkt_fields_to_check: args.pkt_fields.clone(),
        solver: SolverOptions {
            parallel_sketch: args.parallel_sketch,
            ..SolverOptions::default()
        },
        ..CompilerOptions::default()
    };

    let compiler = match Compiler::new(
        &args.program_file,
        &args.stateful_alu_file,
        &args.stateless_alu_file,
        args.num_pipeline_stages,
        args.num_alus_per_stage,
        &sketch_name,
        options,
    ) {
        Ok(compiler) => compiler,
        Err(config_error) => {
            error!("{config_error}");
            std::process::exit(1);
        }
    };

    let refinement_mode = if args.hole_elimination {
        RefinementMode::HoleElimination
    } else {
        RefinementMode::CounterExample
    };

    let solver = IterativeSolver::new(compiler, refinement_mode, args.parallel);

    match solver.solve() {
        Ok(Outcome::Done(holes)) => {
            for (hole, value) in &holes {
                println!("int {hole} = {value};");
            }
            Ok(())
        }
        Ok(Outcome::Unsat) => {
            std::process::exit(1);
        }
        Err(fatal) => {
            error!("{fatal}");
            std::process::exit(1);
        }
    }
}
