//! Driver for the external sketch synthesizer.
//!
//! This module wraps the `sketch` binary: it runs synthesis with a
//! deterministic seed at the (small) synthesis bit-width, runs the
//! write-SMT front-end mode with a negligible timeout, and parses hole
//! assignments out of the captured output.
mod parallel;

use std::{
    collections::BTreeMap,
    error::Error,
    fmt::Display,
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use log::{debug, info};
use regex::Regex;

pub use self::parallel::{enumerate_assignments, RaceOutcome, RunningTask, Supervisor};

#[derive(Debug, Clone)]
pub struct SolverError {
    pub message: String,
}

impl Display for SolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for SolverError {}

impl From<io::Error> for SolverError {
    fn from(error: io::Error) -> Self {
        SolverError {
            message: error.to_string(),
        }
    }
}

/// How the synthesizer is invoked.
#[derive(Debug, Clone, Copy)]
pub struct SolverOptions {
    pub seed: u64,
    /// Pass `--slv-parallel` through to the solver.
    pub parallel_sketch: bool,
    /// Input bit bound for synthesis runs.
    pub synthesis_bits: u32,
    /// Timeout for synthesis runs, in minutes.
    pub timeout: u32,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            seed: 1,
            parallel_sketch: false,
            synthesis_bits: 2,
            timeout: 60,
        }
    }
}

/// Result of one synthesis invocation. The verbatim output is also left
/// in `output_file` for post-mortem debugging.
#[derive(Debug)]
pub struct SynthesisRun {
    pub success: bool,
    pub output: String,
    pub output_file: PathBuf,
}

pub struct SketchSolver {
    options: SolverOptions,
}

impl SketchSolver {
    pub fn new(options: SolverOptions) -> Self {
        SketchSolver { options }
    }

    fn synthesis_command(&self, sketch_file: &Path) -> Command {
        let mut command = Command::new("sketch");
        command
            .arg("-V")
            .arg("12")
            .arg(format!("--slv-seed={}", self.options.seed));
        if self.options.parallel_sketch {
            command.arg("--slv-parallel");
        }
        command
            .arg(format!("--bnd-inbits={}", self.options.synthesis_bits))
            .arg(format!("--slv-timeout={}", self.options.timeout))
            .arg(sketch_file);
        command
    }

    /// The sidecar file synthesis output is preserved in.
    pub fn output_file(sketch_file: &Path) -> PathBuf {
        let stem = sketch_file
            .to_string_lossy()
            .trim_end_matches(".sk")
            .to_string();
        PathBuf::from(format!("{stem}_output.txt"))
    }

    /// Run synthesis on `sketch_file` and capture its output verbatim.
    pub fn synthesize(&self, sketch_file: &Path) -> Result<SynthesisRun, SolverError> {
        info!("Running sketch on {}", sketch_file.display());

        let output = self
            .synthesis_command(sketch_file)
            .output()
            .map_err(|error| SolverError {
                message: format!("failed to invoke sketch: {error}"),
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined += &String::from_utf8_lossy(&output.stderr);

        let output_file = Self::output_file(sketch_file);
        fs::write(&output_file, &combined)?;
        debug!(
            "sketch exited with {:?}, output left in {}",
            output.status.code(),
            output_file.display()
        );

        // A signal death is a crash, not an unsatisfiable sketch.
        if output.status.code().is_none() {
            return Err(SolverError {
                message: format!(
                    "sketch terminated abnormally; output left in {}",
                    output_file.display()
                ),
            });
        }

        Ok(SynthesisRun {
            success: output.status.success(),
            output: combined,
            output_file,
        })
    }

    /// Spawn a synthesis child in its own process group with its output
    /// redirected to `output_file`. Used by parallel codegen so the
    /// supervisor can terminate whole subtrees.
    pub fn spawn(
        &self,
        sketch_file: &Path,
        output_file: &Path,
    ) -> Result<std::process::Child, SolverError> {
        use std::os::unix::process::CommandExt;

        let stdout = File::create(output_file)?;
        let stderr = stdout.try_clone()?;

        let mut command = self.synthesis_command(sketch_file);
        command
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .process_group(0);

        Ok(command.spawn()?)
    }

    /// Run the solver as an SMT front-end only: negligible timeout, dump
    /// the intermediate DAG to `smt_file`.
    pub fn write_smt(
        &self,
        sketch_file: &Path,
        smt_file: &Path,
        input_bits: Option<u32>,
    ) -> Result<(), SolverError> {
        let mut command = Command::new("sketch");
        command
            .arg("-V")
            .arg("12")
            .arg(format!("--slv-seed={}", self.options.seed))
            .arg("--slv-timeout=0.001");
        if let Some(bits) = input_bits {
            command.arg(format!("--bnd-inbits={bits}"));
        }
        command
            .arg("--beopt:writeSMT")
            .arg(smt_file)
            .arg(sketch_file);

        debug!("Dumping SMT for {}", sketch_file.display());

        // The solver is expected to time out; only the written file counts.
        let _ = command.output().map_err(|error| SolverError {
            message: format!("failed to invoke sketch: {error}"),
        })?;

        if !smt_file.exists() {
            return Err(SolverError {
                message: format!(
                    "sketch did not produce the SMT file {}",
                    smt_file.display()
                ),
            });
        }

        Ok(())
    }
}

/// Parse hole values out of solver output. Every known hole must appear
/// exactly once as `<name>__<suffix> = <value>`; anything else is a fatal
/// parse error.
pub fn parse_hole_assignments(
    hole_names: &[String],
    output: &str,
) -> Result<BTreeMap<String, u64>, SolverError> {
    let mut assignments = BTreeMap::new();

    for hole in hole_names {
        let pattern = format!(r"\b{}__\w+ = (\d+)", regex::escape(hole));
        let matcher = Regex::new(&pattern).expect("valid hole pattern");

        let values: Vec<u64> = matcher
            .captures_iter(output)
            .map(|capture| capture[1].parse().unwrap())
            .collect();

        match values.as_slice() {
            [value] => {
                assignments.insert(hole.clone(), *value);
            }
            [] => {
                return Err(SolverError {
                    message: format!("hole '{hole}' is missing from the solver output"),
                })
            }
            _ => {
                return Err(SolverError {
                    message: format!("hole '{hole}' appears more than once in the solver output"),
                })
            }
        }
    }

    Ok(assignments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hole_assignments() {
        let holes = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let assignments = parse_hole_assignments(&holes, "a__one = 3; b__two = 4 c__three = 5")
            .expect("should parse");

        assert_eq!(assignments.get("a"), Some(&3));
        assert_eq!(assignments.get("b"), Some(&4));
        assert_eq!(assignments.get("c"), Some(&5));
    }

    #[test]
    fn test_parse_rejects_duplicated_hole() {
        let holes = vec!["a".to_string()];

        assert!(parse_hole_assignments(&holes, "a__one = 3; a__two = 4").is_err());
    }

    #[test]
    fn test_parse_rejects_missing_hole() {
        let holes = vec!["a".to_string(), "b".to_string()];

        assert!(parse_hole_assignments(&holes, "a__one = 3;").is_err());
    }

    #[test]
    fn test_parse_does_not_match_suffixes_of_longer_names() {
        let holes = vec!["mux".to_string()];

        // 'demux__x' must not satisfy the lookup for 'mux'.
        assert!(parse_hole_assignments(&holes, "demux__x = 1").is_err());
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            SketchSolver::output_file(Path::new("simple_codegen_iteration_1.sk")),
            PathBuf::from("simple_codegen_iteration_1_output.txt")
        );
    }
}
