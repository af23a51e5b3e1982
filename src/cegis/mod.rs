//! Counter-example-guided inductive synthesis loop.
//!
//! Synthesis runs at a small input bit-width; accepted hole assignments
//! are verified on a much larger range. A rejected assignment refines the
//! next round, either by excluding the hole combination outright or by
//! asserting the concrete counter-examples that broke it.
use std::{collections::BTreeMap, error::Error};

use log::info;

use crate::{
    compiler::{Compiler, CodegenOutcome},
    program::ProgramInfo,
    sketch::Refinements,
};

/// How a rejected hole assignment feeds back into synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinementMode {
    /// Forbid the exact hole combination.
    HoleElimination,
    /// Assert concrete inputs the assignment failed on.
    CounterExample,
}

/// Terminal states of the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Verification passed; the configuration is complete.
    Done(BTreeMap<String, u64>),
    /// Synthesis failed at the small bit-width under the accumulated
    /// refinements.
    Unsat,
}

pub struct IterativeSolver {
    compiler: Compiler,
    refinement_mode: RefinementMode,
    parallel_codegen: bool,
}

impl IterativeSolver {
    pub fn new(
        compiler: Compiler,
        refinement_mode: RefinementMode,
        parallel_codegen: bool,
    ) -> IterativeSolver {
        IterativeSolver {
            compiler,
            refinement_mode,
            parallel_codegen,
        }
    }

    /// Run synthesize-verify-refine to a terminal state. Refinements only
    /// ever accumulate: iteration i+1 observes everything iteration i
    /// learned.
    pub fn solve(&self) -> Result<Outcome, Box<dyn Error>> {
        let mut iteration = 1;
        let mut refinements = Refinements::default();

        loop {
            let outcome = self.synthesize(iteration, &refinements)?;
            info!("Iteration #{iteration}");

            if !outcome.success {
                info!("FAILURE: Failed synthesis at 2 bits.");
                return Ok(Outcome::Unsat);
            }

            info!("Synthesis succeeded with 2 bits, proceeding to verification.");
            if self.compiler.sol_verify(&outcome.holes, iteration)? == 0 {
                info!("SUCCESS: Verification succeeded.");
                return Ok(Outcome::Done(outcome.holes));
            }

            info!("Verification failed. Trying again.");
            match self.refinement_mode {
                RefinementMode::HoleElimination => {
                    refinements
                        .constraints
                        .push(hole_elimination_assert(&outcome.holes));
                }
                RefinementMode::CounterExample => {
                    refinements.testcases +=
                        &self.additional_testcases(&outcome.holes, iteration)?;
                }
            }

            iteration += 1;
        }
    }

    fn synthesize(
        &self,
        iteration: usize,
        refinements: &Refinements,
    ) -> Result<CodegenOutcome, Box<dyn Error>> {
        if self.parallel_codegen {
            self.compiler.parallel_codegen(refinements)
        } else {
            self.compiler.serial_codegen(iteration, refinements)
        }
    }

    /// Counter-examples from every bit-width between the synthesis and
    /// verification ranges. A width that yields none still contributes a
    /// zero-valued test case, so every refinement makes progress.
    fn additional_testcases(
        &self,
        holes: &BTreeMap<String, u64>,
        iteration: usize,
    ) -> Result<String, Box<dyn Error>> {
        let mut definitions = String::new();
        let mut asserts = String::new();

        for bits in 2..10 {
            info!("Trying to generate counterexample of {bits} bits");
            let (pkt_fields, state_vars) =
                self.compiler
                    .counter_example_generator(bits, holes, iteration)?;

            let (definition, assertion) = testcase_block(
                iteration,
                bits,
                &pkt_fields,
                &state_vars,
                self.compiler.info(),
                self.compiler.num_state_slots(),
            );
            definitions += &definition;
            asserts += &assertion;
        }

        Ok(definitions + &asserts)
    }
}

/// One refinement constraint forbidding an exact hole combination.
pub fn hole_elimination_assert(holes: &BTreeMap<String, u64>) -> String {
    let mut terms: Vec<String> = holes
        .iter()
        .map(|(hole, value)| format!("({hole} == {value})"))
        .collect();
    terms.push("1".to_string());
    format!("!({})", terms.join(" && "))
}

/// Build the input-record definition and assertion for one
/// counter-example, shifted past the bit-width it was found at. Fields
/// the model left unconstrained default to zero.
pub fn testcase_block(
    iteration: usize,
    bits: u32,
    pkt_fields: &BTreeMap<String, i64>,
    state_vars: &BTreeMap<String, i64>,
    info: &ProgramInfo,
    num_state_slots: usize,
) -> (String, String) {
    let offset = 1i64 << bits;
    let record = format!("x_{iteration}_{bits}");

    let mut fields = vec![];
    for field in 0..info.num_fields {
        let name = format!("pkt_{field}");
        let value = pkt_fields.get(&name).copied().unwrap_or(0);
        fields.push(format!("{name} = {}", value + offset));
    }
    for group in 0..info.num_state_groups {
        for slot in 0..num_state_slots {
            let name = format!("state_group_{group}_state_{slot}");
            let value = state_vars.get(&name).copied().unwrap_or(0);
            fields.push(format!("{name} = {}", value + offset));
        }
    }

    let definition = format!(
        "    |StateAndPacket| {record} = |StateAndPacket|({});\n",
        fields.join(",\n        ")
    );
    let assertion = format!("    assert (pipeline({record}) == program({record}));\n");

    (definition, assertion)
}
