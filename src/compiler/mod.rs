//! Orchestration of one synthesis request.
//!
//! A `Compiler` ties the program, the two ALU templates, and the grid
//! dimensions together and drives the external tools: sketch generation
//! and synthesis (serial or parallel), hole verification through the SMT
//! backend, and counter-example generation.
use std::{
    collections::BTreeMap,
    error::Error,
    fmt::Display,
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info};
use serde::Serialize;

use crate::{
    alu::{AluTemplate, StateKind},
    codegen::CodegenOptions,
    program::ProgramInfo,
    sketch::{Mode, Refinements, SketchGenerator},
    smt::{formula_from_dag, split_counter_examples, SmtBackend, SmtResult},
    solver::{
        enumerate_assignments, parse_hole_assignments, RunningTask, SketchSolver, SolverOptions,
        Supervisor,
    },
};

/// Bit-width hole assignments are verified at. Much wider than the
/// synthesis range; counter-examples are searched below it.
pub const VERIFY_BITS: u32 = 10;

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub message: String,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for ConfigError {}

/// Result triple of one codegen run: solver verdict, captured output,
/// and parsed hole values on success.
#[derive(Debug, Default)]
pub struct CodegenOutcome {
    pub success: bool,
    pub output: String,
    pub holes: BTreeMap<String, u64>,
}

/// Everything an external equivalence checker needs besides the sketch
/// text itself.
#[derive(Debug, Serialize)]
struct SideChannel<'a> {
    holes: &'a BTreeMap<String, u32>,
    hole_arguments: &'a [String],
    constraints: &'a [String],
    num_fields_in_prog: usize,
    num_state_groups: usize,
    num_state_slots: usize,
}

#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Packet fields whose output equality is asserted; empty means all.
    pub pkt_fields_to_check: Vec<usize>,
    pub solver: SolverOptions,
    pub codegen: CodegenOptions,
    /// Worker cap for parallel codegen.
    pub parallel_workers: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            pkt_fields_to_check: vec![],
            solver: SolverOptions::default(),
            codegen: CodegenOptions::default(),
            parallel_workers: 8,
        }
    }
}

pub struct Compiler {
    program_text: String,
    sketch_name: String,
    num_pipeline_stages: usize,
    info: ProgramInfo,
    generator: SketchGenerator,
    solver: SketchSolver,
    backend: SmtBackend,
    parallel_workers: usize,
}

impl Compiler {
    pub fn new(
        program_file: &Path,
        stateful_alu_file: &Path,
        stateless_alu_file: &Path,
        num_pipeline_stages: usize,
        num_alus_per_stage: usize,
        sketch_name: &str,
        options: CompilerOptions,
    ) -> Result<Compiler, Box<dyn Error>> {
        let program_text = fs::read_to_string(program_file)?;
        let info = ProgramInfo::scan(&program_text)?;

        if info.num_fields > num_alus_per_stage {
            return Err(Box::new(ConfigError {
                message: format!(
                    "program uses {} packet fields but the grid only has {} ALUs per stage; \
                     try increasing the number of ALUs per stage",
                    info.num_fields, num_alus_per_stage
                ),
            }));
        }

        let stateful_template = Self::load_template(stateful_alu_file, StateKind::Stateful)?;
        let stateless_template = Self::load_template(stateless_alu_file, StateKind::Stateless)?;

        if info.num_state_slots() > stateful_template.state_vars.len() {
            return Err(Box::new(ConfigError {
                message: format!(
                    "program uses {} state slots per group but the stateful ALU only has {}",
                    info.num_state_slots(),
                    stateful_template.state_vars.len()
                ),
            }));
        }

        let pkt_fields_to_check = if options.pkt_fields_to_check.is_empty() {
            (0..info.num_fields).collect()
        } else {
            for field in &options.pkt_fields_to_check {
                if *field >= info.num_fields {
                    return Err(Box::new(ConfigError {
                        message: format!("packet field {field} is not referenced by the program"),
                    }));
                }
            }
            options.pkt_fields_to_check.clone()
        };

        let generator = SketchGenerator::new(
            sketch_name,
            num_pipeline_stages,
            num_alus_per_stage,
            stateful_template,
            stateless_template,
            &file_stem(stateful_alu_file),
            &file_stem(stateless_alu_file),
            info.clone(),
            pkt_fields_to_check,
            options.codegen,
        );

        Ok(Compiler {
            program_text,
            sketch_name: sketch_name.to_owned(),
            num_pipeline_stages,
            info,
            generator,
            solver: SketchSolver::new(options.solver),
            backend: SmtBackend::new(),
            parallel_workers: options.parallel_workers,
        })
    }

    fn load_template(file: &Path, expected: StateKind) -> Result<AluTemplate, Box<dyn Error>> {
        let text = fs::read_to_string(file)?;
        let template = AluTemplate::parse(&text, &file.to_string_lossy())?;

        if template.state_kind != expected {
            return Err(Box::new(ConfigError {
                message: format!(
                    "{} declares the wrong ALU kind ({:?} expected)",
                    file.display(),
                    expected
                ),
            }));
        }

        Ok(template)
    }

    pub fn info(&self) -> &ProgramInfo {
        &self.info
    }

    /// Slots per state group, as the generated sketch lays them out.
    pub fn num_state_slots(&self) -> usize {
        self.generator.num_state_slots()
    }

    fn run_codegen(
        &self,
        refinements: &Refinements,
        sketch_file: &Path,
    ) -> Result<CodegenOutcome, Box<dyn Error>> {
        let sketch = self
            .generator
            .generate(&self.program_text, &Mode::Codegen, refinements)?;
        fs::write(sketch_file, &sketch.text)?;
        info!("Sketch file is {}", sketch_file.display());

        let run = self.solver.synthesize(sketch_file)?;
        if !run.success {
            return Ok(CodegenOutcome {
                success: false,
                output: run.output,
                holes: BTreeMap::new(),
            });
        }

        let hole_names: Vec<String> = sketch.holes.keys().cloned().collect();
        let holes = parse_hole_assignments(&hole_names, &run.output)?;
        Ok(CodegenOutcome {
            success: true,
            output: run.output,
            holes,
        })
    }

    pub fn serial_codegen(
        &self,
        iter_cnt: usize,
        refinements: &Refinements,
    ) -> Result<CodegenOutcome, Box<dyn Error>> {
        let sketch_file = format!("{}_codegen_iteration_{iter_cnt}.sk", self.sketch_name);
        self.run_codegen(refinements, Path::new(&sketch_file))
    }

    /// Race one synthesis child per state-group-to-stage assignment.
    /// Infeasible assignments are fine; the solver rejects them.
    pub fn parallel_codegen(
        &self,
        refinements: &Refinements,
    ) -> Result<CodegenOutcome, Box<dyn Error>> {
        let assignments =
            enumerate_assignments(self.num_pipeline_stages, self.info.num_state_groups);

        let mut sketches = vec![];
        for (index, assignment) in assignments.iter().enumerate() {
            let count = index + 1;
            debug!("assignment #{count} is {assignment:?}");

            let mut constrained = refinements.clone();
            for (group, chosen) in assignment.iter().enumerate() {
                for stage in 0..self.num_pipeline_stages {
                    let value = if stage == *chosen { 1 } else { 0 };
                    constrained.constraints.push(format!(
                        "{}_salu_config_{stage}_{group} == {value}",
                        self.sketch_name
                    ));
                }
            }

            let sketch =
                self.generator
                    .generate(&self.program_text, &Mode::Codegen, &constrained)?;
            let sketch_file = PathBuf::from(format!("{}_{count}_codegen.sk", self.sketch_name));
            fs::write(&sketch_file, &sketch.text)?;
            sketches.push((sketch, sketch_file));
        }

        let supervisor = Supervisor {
            worker_cap: self.parallel_workers,
            ..Supervisor::default()
        };

        let outcome = supervisor.race(sketches.len(), |index| {
            let (_, sketch_file) = &sketches[index];
            let output_file = SketchSolver::output_file(sketch_file);
            let child = self.solver.spawn(sketch_file, &output_file)?;
            Ok(RunningTask {
                index,
                child,
                output_file,
            })
        })?;

        let Some(winner) = outcome.winner else {
            return Ok(CodegenOutcome {
                success: false,
                output: outcome.output,
                holes: BTreeMap::new(),
            });
        };
        let hole_names: Vec<String> = sketches[winner].0.holes.keys().cloned().collect();
        let holes = parse_hole_assignments(&hole_names, &outcome.output)?;
        Ok(CodegenOutcome {
            success: true,
            output: outcome.output,
            holes,
        })
    }

    /// Emit the bare pipeline plus a side-channel file with everything an
    /// external equivalence checker needs.
    pub fn optverify(&self) -> Result<(), Box<dyn Error>> {
        let sketch =
            self.generator
                .generate(&self.program_text, &Mode::OptVerify, &Refinements::default())?;

        let sketch_file = format!("{}_optverify.sk", self.sketch_name);
        fs::write(&sketch_file, &sketch.text)?;
        info!("Sketch file is {sketch_file}");

        let side_channel = SideChannel {
            holes: &sketch.holes,
            hole_arguments: &sketch.hole_arguments,
            constraints: &sketch.constraints,
            num_fields_in_prog: self.info.num_fields,
            num_state_groups: self.info.num_state_groups,
            num_state_slots: self.num_state_slots(),
        };
        let side_file = format!("{}.json", self.sketch_name);
        fs::write(&side_file, serde_json::to_string_pretty(&side_channel)?)?;
        info!("Side channel file is {side_file}");

        Ok(())
    }

    /// Check a hole assignment on the wide input range. Returns 0 when
    /// the universally quantified formula holds, -1 otherwise.
    pub fn sol_verify(
        &self,
        hole_assignments: &BTreeMap<String, u64>,
        iter_cnt: usize,
    ) -> Result<i32, Box<dyn Error>> {
        let sketch = self.generator.generate(
            &self.program_text,
            &Mode::SolVerify {
                hole_assignments: hole_assignments.clone(),
            },
            &Refinements::default(),
        )?;

        let sketch_file = format!("{}_sol_verify_iteration_{iter_cnt}.sk", self.sketch_name);
        fs::write(&sketch_file, &sketch.text)?;

        let smt_file = format!("{}_iteration_{iter_cnt}.smt2", self.sketch_name);
        self.solver
            .write_smt(Path::new(&sketch_file), Path::new(&smt_file), None)?;

        let dag = fs::read_to_string(&smt_file)?;
        let formula = formula_from_dag(&dag)?;

        // The dumped range is dropped; verification supplies its own,
        // much wider one.
        let script = formula.universal_script(VERIFY_BITS);
        let script_file = format!("{}_universal_iteration_{iter_cnt}.smt2", self.sketch_name);
        let (verdict, _) = self.backend.check(&script, Path::new(&script_file))?;

        Ok(if verdict == SmtResult::Sat { 0 } else { -1 })
    }

    /// Search for inputs at `bits` bits on which the fixed pipeline and
    /// the program disagree. Empty maps mean no counter-example at this
    /// width.
    pub fn counter_example_generator(
        &self,
        bits: u32,
        hole_assignments: &BTreeMap<String, u64>,
        iter_cnt: usize,
    ) -> Result<(BTreeMap<String, i64>, BTreeMap<String, i64>), Box<dyn Error>> {
        let sketch = self.generator.generate(
            &self.program_text,
            &Mode::CexGen {
                hole_assignments: hole_assignments.clone(),
                input_offset: 1 << bits,
            },
            &Refinements::default(),
        )?;

        let base = format!(
            "{}_cexgen_iteration_{iter_cnt}_bits_{bits}",
            self.sketch_name
        );
        let sketch_file = format!("{base}.sk");
        fs::write(&sketch_file, &sketch.text)?;

        let smt_file = format!("{base}.smt2");
        self.solver
            .write_smt(Path::new(&sketch_file), Path::new(&smt_file), Some(bits))?;

        let dag = fs::read_to_string(&smt_file)?;
        let formula = formula_from_dag(&dag)?;

        let script = formula.negation_script(bits);
        let script_file = format!("{base}_negated.smt2");
        let (verdict, output) = self.backend.check(&script, Path::new(&script_file))?;

        if verdict != SmtResult::Sat {
            info!("Failed to generate counterexamples, z3 returned {verdict:?}");
            return Ok((BTreeMap::new(), BTreeMap::new()));
        }

        let model = SmtBackend::model_values(&output);
        Ok(split_counter_examples(&model))
    }
}

/// The file name without directories and extension, the way sketch names
/// are derived from input files.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem(Path::new("specs/simple.sk")), "simple");
        assert_eq!(file_stem(Path::new("raw.stateful_alu")), "raw");
    }
}
