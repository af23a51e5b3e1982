use std::{
    collections::BTreeMap,
    fs,
    path::Path,
    process::Command,
};

use log::{debug, error};
use once_cell::sync::Lazy;
use regex::Regex;

use super::SmtError;

static MODEL_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"define-fun\s+([A-Za-z0-9_]+)\s+\(\)\s+Int\s+(\(-\s*\d+\)|\d+)").unwrap()
});
static PKT_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^pkt_\d+").unwrap());
static STATE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^state_group_\d+_state_\d+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtResult {
    Sat,
    Unsat,
    Unknown,
}

/// Driver for the external SMT engine. Scripts are written to disk and
/// preserved for post-mortem debugging.
#[derive(Debug, Default)]
pub struct SmtBackend;

impl SmtBackend {
    pub fn new() -> Self {
        SmtBackend
    }

    /// Write `script` to `script_file`, run the engine on it, and return
    /// the verdict along with the raw output.
    pub fn check(&self, script: &str, script_file: &Path) -> Result<(SmtResult, String), SmtError> {
        fs::write(script_file, script)?;
        debug!("Checking {}", script_file.display());

        let output = Command::new("z3")
            .arg("-smt2")
            .arg(script_file)
            .output()
            .map_err(|err| SmtError {
                message: format!("failed to invoke z3: {err}"),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            error!("{stderr}");
        }

        let verdict = match stdout.split_whitespace().next() {
            Some("sat") => SmtResult::Sat,
            Some("unsat") => SmtResult::Unsat,
            _ => SmtResult::Unknown,
        };

        Ok((verdict, stdout))
    }

    /// Integer assignments from a `(get-model)` dump.
    pub fn model_values(output: &str) -> BTreeMap<String, i64> {
        let mut values = BTreeMap::new();

        for capture in MODEL_VALUE.captures_iter(output) {
            let name = capture[1].to_string();
            let literal = &capture[2];
            let value = if let Some(inner) = literal.strip_prefix("(-") {
                -inner
                    .trim_end_matches(')')
                    .trim()
                    .parse::<i64>()
                    .unwrap_or(0)
            } else {
                literal.parse().unwrap_or(0)
            };
            values.insert(name, value);
        }

        values
    }
}

/// Split model values into packet-field and state-slot counter-examples.
/// Solver-generated name suffixes are trimmed down to the canonical keys.
pub fn split_counter_examples(
    model: &BTreeMap<String, i64>,
) -> (BTreeMap<String, i64>, BTreeMap<String, i64>) {
    let mut pkt_fields = BTreeMap::new();
    let mut state_vars = BTreeMap::new();

    for (name, value) in model {
        if let Some(matched) = STATE_KEY.find(name) {
            state_vars.insert(matched.as_str().to_string(), *value);
        } else if let Some(matched) = PKT_KEY.find(name) {
            pkt_fields.insert(matched.as_str().to_string(), *value);
        }
    }

    (pkt_fields, state_vars)
}
