//! Sketch generation for the pipeline grid.
//!
//! This module wires compiled ALU instances, operand muxes, and output
//! muxes into a stages-by-columns grid, adds the state-allocation
//! constraints, and emits one monolithic sketch with the harness variant
//! the caller asked for.
mod mode;

use std::{
    collections::BTreeMap,
    error::Error,
    fmt::Display,
};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    alu::AluTemplate,
    codegen::{self, CodegenOptions, CompiledAlu, HoleRegistry},
    program::ProgramInfo,
};

pub use self::mode::Mode;

#[derive(Debug, Clone)]
pub struct SketchError {
    pub message: String,
}

impl Display for SketchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for SketchError {}

impl From<codegen::CodegenError> for SketchError {
    fn from(error: codegen::CodegenError) -> Self {
        SketchError {
            message: error.message,
        }
    }
}

/// Extra constraints and test cases accumulated by refinement. Constraint
/// strings are asserted verbatim; the testcase text is spliced into the
/// harness as-is (it carries its own definitions and asserts).
#[derive(Debug, Default, Clone)]
pub struct Refinements {
    pub constraints: Vec<String>,
    pub testcases: String,
}

/// A generated sketch plus the metadata an external consumer needs: the
/// declared holes, the order they are passed in, and the allocator
/// constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sketch {
    pub text: String,
    pub holes: BTreeMap<String, u32>,
    pub hole_arguments: Vec<String>,
    pub constraints: Vec<String>,
    pub total_hole_bits: u32,
}

pub struct SketchGenerator {
    sketch_name: String,
    num_pipeline_stages: usize,
    num_alus_per_stage: usize,
    stateful_template: AluTemplate,
    stateless_template: AluTemplate,
    stateful_name: String,
    stateless_name: String,
    info: ProgramInfo,
    pkt_fields_to_check: Vec<usize>,
    options: CodegenOptions,
}

impl SketchGenerator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sketch_name: &str,
        num_pipeline_stages: usize,
        num_alus_per_stage: usize,
        stateful_template: AluTemplate,
        stateless_template: AluTemplate,
        stateful_name: &str,
        stateless_name: &str,
        info: ProgramInfo,
        pkt_fields_to_check: Vec<usize>,
        options: CodegenOptions,
    ) -> SketchGenerator {
        SketchGenerator {
            sketch_name: sketch_name.to_owned(),
            num_pipeline_stages,
            num_alus_per_stage,
            stateful_template,
            stateless_template,
            stateful_name: stateful_name.to_owned(),
            stateless_name: stateless_name.to_owned(),
            info,
            pkt_fields_to_check,
            options,
        }
    }

    /// Slots per state group, as declared by the stateful template.
    pub fn num_state_slots(&self) -> usize {
        self.stateful_template.state_vars.len()
    }

    fn stateless_instance(&self, stage: usize, column: usize) -> String {
        format!("{}_{stage}_{column}", self.stateless_name)
    }

    fn stateful_instance(&self, stage: usize, group: usize) -> String {
        format!("{}_{stage}_{group}", self.stateful_name)
    }

    fn salu_config_hole(&self, stage: usize, group: usize) -> String {
        format!("{}_salu_config_{stage}_{group}", self.sketch_name)
    }

    fn stateless_operand_mux(&self, stage: usize, column: usize, operand: usize) -> String {
        format!(
            "{}_stateless_operand_mux_{stage}_{column}_{operand}",
            self.sketch_name
        )
    }

    fn stateful_operand_mux(&self, stage: usize, group: usize, operand: usize) -> String {
        format!(
            "{}_stateful_operand_mux_{stage}_{group}_{operand}",
            self.sketch_name
        )
    }

    fn output_mux(&self, stage: usize, column: usize) -> String {
        format!("{}_output_mux_phv_{stage}_{column}", self.sketch_name)
    }

    /// Selector width for an N-to-1 mux.
    fn mux_ctrl_width(&self) -> u32 {
        let inputs = self.num_alus_per_stage;
        if inputs <= 1 {
            1
        } else {
            (usize::BITS - (inputs - 1).leading_zeros()).max(1)
        }
    }

    /// The state-allocation constraints: every state group lands on
    /// exactly one stage, and no stage takes more groups than it has
    /// stateful ALUs.
    fn allocator_constraints(&self) -> Vec<String> {
        let mut constraints = vec![];

        for group in 0..self.info.num_state_groups {
            let sum = (0..self.num_pipeline_stages)
                .map(|stage| self.salu_config_hole(stage, group))
                .collect::<Vec<_>>()
                .join(" + ");
            constraints.push(format!("({sum}) == 1"));
        }

        for stage in 0..self.num_pipeline_stages {
            if self.info.num_state_groups == 0 {
                break;
            }
            let sum = (0..self.info.num_state_groups)
                .map(|group| self.salu_config_hole(stage, group))
                .collect::<Vec<_>>()
                .join(" + ");
            constraints.push(format!("({sum}) <= {}", self.num_alus_per_stage));
        }

        constraints
    }

    /// Generate the sketch for `mode`. The returned metadata covers every
    /// hole the sketch declares: template holes, mux selectors, and
    /// allocator bits.
    pub fn generate(
        &self,
        program: &str,
        mode: &Mode,
        refinements: &Refinements,
    ) -> Result<Sketch, SketchError> {
        let mut registry = HoleRegistry::new();

        // One compiled instance per grid position, so every position gets
        // its own holes.
        let mut stateless_alus = vec![];
        for stage in 0..self.num_pipeline_stages {
            let mut row = vec![];
            for column in 0..self.num_alus_per_stage {
                row.push(codegen::compile(
                    &self.stateless_template,
                    &self.stateless_instance(stage, column),
                    self.options,
                    &mut registry,
                )?);
            }
            stateless_alus.push(row);
        }

        let mut stateful_alus = vec![];
        for stage in 0..self.num_pipeline_stages {
            let mut row = vec![];
            for group in 0..self.info.num_state_groups {
                row.push(codegen::compile(
                    &self.stateful_template,
                    &self.stateful_instance(stage, group),
                    self.options,
                    &mut registry,
                )?);
            }
            stateful_alus.push(row);
        }

        let mux_definitions = self.generate_muxes(&mut registry)?;

        for stage in 0..self.num_pipeline_stages {
            for group in 0..self.info.num_state_groups {
                registry
                    .add(&self.salu_config_hole(stage, group), 1)
                    .map_err(SketchError::from)?;
            }
        }

        let constraints = self.allocator_constraints();

        debug!(
            "sketch '{}' declares {} holes",
            self.sketch_name,
            registry.len()
        );
        info!("Total number of hole bits is {}", registry.total_bits());

        let mut text = format!("// Sketch {} \n\n", self.sketch_name);

        text += &self.struct_definitions();
        text += &self.hole_definitions(&registry, mode)?;

        for row in &stateless_alus {
            for alu in row {
                text += &alu.helper_functions;
                text += &alu.main_function;
                text += "\n";
            }
        }
        for row in &stateful_alus {
            for alu in row {
                text += &alu.helper_functions;
                text += &alu.main_function;
                text += "\n";
            }
        }
        text += &mux_definitions;

        if *mode != Mode::OptVerify {
            text += program;
            text += "\n";
        }

        text += &self.pipeline_function(&stateless_alus, &stateful_alus, &registry, mode);

        if *mode != Mode::OptVerify {
            text += &self.harness(mode, &constraints, refinements);
        }

        Ok(Sketch {
            text,
            hole_arguments: registry.names(),
            holes: registry.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            total_hole_bits: registry.total_bits(),
            constraints,
        })
    }

    fn struct_definitions(&self) -> String {
        let mut text = String::from("struct StateAndPacket {\n");
        for field in 0..self.info.num_fields {
            text += &format!("    int pkt_{field};\n");
        }
        for group in 0..self.info.num_state_groups {
            for slot in 0..self.num_state_slots() {
                text += &format!("    int state_group_{group}_state_{slot};\n");
            }
        }
        text += "}\n\n";

        if self.info.num_state_groups > 0 {
            text += "struct StateGroup {\n";
            for slot in 0..self.num_state_slots() {
                text += &format!("    int state_{slot};\n");
            }
            text += "}\n\n";
        }

        text
    }

    fn hole_definitions(
        &self,
        registry: &HoleRegistry,
        mode: &Mode,
    ) -> Result<String, SketchError> {
        // In optverify mode the holes become pipeline parameters instead.
        if *mode == Mode::OptVerify {
            return Ok(String::new());
        }

        let mut text = String::new();
        match mode.hole_assignments() {
            None => {
                for (name, width) in registry {
                    text += &format!("int {name} = ??({width});\n");
                }
            }
            Some(assignments) => {
                for (name, _) in registry {
                    let Some(value) = assignments.get(name) else {
                        return Err(SketchError {
                            message: format!("hole '{name}' has no assigned value"),
                        });
                    };
                    text += &format!("int {name} = {value};\n");
                }
            }
        }
        text += "\n";
        Ok(text)
    }

    fn generate_muxes(&self, registry: &mut HoleRegistry) -> Result<String, SketchError> {
        let mut text = String::new();
        let width = self.mux_ctrl_width();

        for stage in 0..self.num_pipeline_stages {
            for column in 0..self.num_alus_per_stage {
                for operand in 0..self.stateless_template.packet_fields.len() {
                    let name = self.stateless_operand_mux(stage, column, operand);
                    text += &self.mux_definition(&name);
                    registry.add(&format!("{name}_ctrl"), width)?;
                }
            }
            for group in 0..self.info.num_state_groups {
                for operand in 0..self.stateful_template.packet_fields.len() {
                    let name = self.stateful_operand_mux(stage, group, operand);
                    text += &self.mux_definition(&name);
                    registry.add(&format!("{name}_ctrl"), width)?;
                }
            }
            for column in 0..self.num_alus_per_stage {
                let name = self.output_mux(stage, column);
                text += &self.mux_definition(&name);
                registry.add(&format!("{name}_ctrl"), width)?;
            }
        }

        Ok(text)
    }

    /// An N-to-1 mux over the stage's containers, selected by a hole.
    fn mux_definition(&self, name: &str) -> String {
        let inputs = (0..self.num_alus_per_stage)
            .map(|input| format!("int input_{input}"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut body = String::new();
        if self.num_alus_per_stage == 1 {
            body += "    return input_0;\n";
        } else {
            for input in 0..self.num_alus_per_stage - 1 {
                let keyword = if input == 0 { "if" } else { "else if" };
                body += &format!("    {keyword} (ctrl == {input}) return input_{input};\n");
            }
            body += &format!("    else return input_{};\n", self.num_alus_per_stage - 1);
        }

        format!("int {name}({inputs}, int ctrl) {{\n{body}}}\n\n")
    }

    fn mux_call(&self, name: &str, stage: usize) -> String {
        let inputs = (0..self.num_alus_per_stage)
            .map(|input| format!("input_{stage}_{input}"))
            .collect::<Vec<_>>()
            .join(",");
        format!("{name}({inputs},{name}_ctrl)")
    }

    fn pipeline_function(
        &self,
        stateless_alus: &[Vec<CompiledAlu>],
        stateful_alus: &[Vec<CompiledAlu>],
        registry: &HoleRegistry,
        mode: &Mode,
    ) -> String {
        let mut parameters = vec!["|StateAndPacket| state_and_packet".to_owned()];
        if *mode == Mode::OptVerify {
            for (name, _) in registry {
                parameters.push(format!("int {name}"));
            }
        }
        let parameters = parameters.join(", ");

        let mut text = format!("|StateAndPacket| pipeline({parameters}) {{\n");

        // Containers entering stage 0: program fields first, the spare
        // columns start at zero.
        for column in 0..self.num_alus_per_stage {
            if column < self.info.num_fields {
                text += &format!("    int input_0_{column} = state_and_packet.pkt_{column};\n");
            } else {
                text += &format!("    int input_0_{column} = 0;\n");
            }
        }

        for group in 0..self.info.num_state_groups {
            let fields = (0..self.num_state_slots())
                .map(|slot| {
                    format!("state_{slot} = state_and_packet.state_group_{group}_state_{slot}")
                })
                .collect::<Vec<_>>()
                .join(", ");
            text += &format!("    |StateGroup| state_group_{group} = |StateGroup|({fields});\n");
        }

        for stage in 0..self.num_pipeline_stages {
            text += &format!("\n    // Stage {stage}\n");

            for column in 0..self.num_alus_per_stage {
                let alu = &stateless_alus[stage][column];
                let mut arguments = vec![];
                for operand in 0..alu.packet_fields.len() {
                    let mux = self.stateless_operand_mux(stage, column, operand);
                    arguments.push(self.mux_call(&mux, stage));
                }
                arguments.extend(alu.hole_arguments());
                text += &format!(
                    "    int stateless_output_{stage}_{column} = {}({});\n",
                    alu.instance_name,
                    arguments.join(",")
                );
            }

            for group in 0..self.info.num_state_groups {
                let alu = &stateful_alus[stage][group];
                let mut arguments = vec![format!("state_group_{group}")];
                for operand in 0..alu.packet_fields.len() {
                    let mux = self.stateful_operand_mux(stage, group, operand);
                    arguments.push(self.mux_call(&mux, stage));
                }
                arguments.extend(alu.hole_arguments());
                text += &format!(
                    "    if ({} == 1) {{\n        {}({});\n    }}\n",
                    self.salu_config_hole(stage, group),
                    alu.instance_name,
                    arguments.join(",")
                );
            }

            for column in 0..self.num_alus_per_stage {
                let mux = self.output_mux(stage, column);
                let outputs = (0..self.num_alus_per_stage)
                    .map(|input| format!("stateless_output_{stage}_{input}"))
                    .collect::<Vec<_>>()
                    .join(",");
                text += &format!(
                    "    int input_{}_{column} = {mux}({outputs},{mux}_ctrl);\n",
                    stage + 1
                );
            }
        }

        text += "\n";
        for field in 0..self.info.num_fields {
            text += &format!(
                "    state_and_packet.pkt_{field} = input_{}_{field};\n",
                self.num_pipeline_stages
            );
        }
        for group in 0..self.info.num_state_groups {
            for slot in 0..self.num_state_slots() {
                text += &format!(
                    "    state_and_packet.state_group_{group}_state_{slot} = state_group_{group}.state_{slot};\n"
                );
            }
        }
        text += "    return state_and_packet;\n}\n\n";

        text
    }

    fn input_record_fields(&self, offset: u64) -> String {
        let mut fields = vec![];
        for field in 0..self.info.num_fields {
            fields.push(format!("pkt_{field} = pkt_{field}"));
        }
        for group in 0..self.info.num_state_groups {
            for slot in 0..self.num_state_slots() {
                fields.push(format!(
                    "state_group_{group}_state_{slot} = state_group_{group}_state_{slot}"
                ));
            }
        }
        if offset > 0 {
            fields = fields
                .into_iter()
                .map(|field| format!("{field} + {offset}"))
                .collect();
        }
        fields.join(", ")
    }

    fn harness(&self, mode: &Mode, constraints: &[String], refinements: &Refinements) -> String {
        let mut parameters = vec![];
        for field in 0..self.info.num_fields {
            parameters.push(format!("int pkt_{field}"));
        }
        for group in 0..self.info.num_state_groups {
            for slot in 0..self.num_state_slots() {
                parameters.push(format!("int state_group_{group}_state_{slot}"));
            }
        }

        let mut text = format!("harness void main({}) {{\n", parameters.join(", "));
        text += &format!(
            "    |StateAndPacket| x = |StateAndPacket|({});\n",
            self.input_record_fields(mode.input_offset())
        );

        for constraint in constraints {
            text += &format!("    assert({constraint});\n");
        }
        for constraint in &refinements.constraints {
            text += &format!("    assert({constraint});\n");
        }
        if !refinements.testcases.is_empty() {
            text += &refinements.testcases;
        }

        text += "    |StateAndPacket| pipeline_result = pipeline(x);\n";
        text += "    |StateAndPacket| program_result = program(x);\n";
        for field in &self.pkt_fields_to_check {
            text +=
                &format!("    assert(pipeline_result.pkt_{field} == program_result.pkt_{field});\n");
        }
        for (group, slot) in &self.info.state_slots {
            text += &format!(
                "    assert(pipeline_result.state_group_{group}_state_{slot} == program_result.state_group_{group}_state_{slot});\n"
            );
        }
        text += "}\n";

        text
    }
}
