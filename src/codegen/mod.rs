//! Compiler for ALU templates.
//!
//! This module lowers a parsed template into a parametric piece of sketch
//! code: one top-level function per ALU instance plus one helper function
//! per parametric construct, with every unknown configuration value
//! declared as an explicitly sized hole.
mod emitter;
mod holes;

use std::{
    collections::BTreeMap,
    error::Error,
    fmt::Display,
};

use self::emitter::Emitter;

pub use self::holes::HoleRegistry;

use crate::alu::{AluTemplate, StateKind};

/// Width of holes the template declares itself in its `hole variables`
/// section.
pub const DECLARED_HOLE_WIDTH: u32 = 4;

#[derive(Debug, Clone)]
pub struct CodegenError {
    pub message: String,
}

impl Display for CodegenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for CodegenError {}

/// Knobs for template lowering.
#[derive(Debug, Clone, Copy)]
pub struct CodegenOptions {
    /// Bit width of holes generated for `C()` constructs. Narrow by
    /// default; widen when specifications need larger literals.
    pub const_hole_width: u32,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        CodegenOptions { const_hole_width: 2 }
    }
}

/// One compiled ALU instance: the helper functions it relies on, its
/// top-level function, and its hole parameters.
#[derive(Debug, Clone)]
pub struct CompiledAlu {
    pub instance_name: String,
    pub state_kind: StateKind,
    pub helper_functions: String,
    pub main_function: String,
    /// Unprefixed hole name to bit width, sorted by name. The generated
    /// signature appends exactly these, in exactly this order.
    pub args: BTreeMap<String, u32>,
    pub packet_fields: Vec<String>,
    pub state_vars: Vec<String>,
}

impl CompiledAlu {
    /// The fully prefixed hole names this instance expects as trailing
    /// call arguments, in signature order.
    pub fn hole_arguments(&self) -> Vec<String> {
        self.args
            .keys()
            .map(|name| format!("{}_{name}_global", self.instance_name))
            .collect()
    }
}

/// Lower `template` into sketch code for one grid position. Holes are
/// registered under `instance_name` in `registry`; the same template
/// compiles once per instance so every instance carries its own holes.
pub fn compile(
    template: &AluTemplate,
    instance_name: &str,
    options: CodegenOptions,
    registry: &mut HoleRegistry,
) -> Result<CompiledAlu, CodegenError> {
    let mut emitter = Emitter::new(instance_name, registry, options.const_hole_width);

    for hole_var in &template.hole_vars {
        emitter.add_hole(hole_var, DECLARED_HOLE_WIDTH)?;
    }

    let body = emitter.lower_body(&template.body)?;
    let (helper_functions, args) = emitter.into_outputs();

    let mut parameters = vec![];
    if template.state_kind == StateKind::Stateful {
        parameters.push("ref |StateGroup| state_group".to_owned());
    }
    for field in &template.packet_fields {
        parameters.push(format!("int {field}"));
    }
    for hole in args.keys() {
        parameters.push(format!("int {hole}"));
    }
    let parameters = parameters.join(", ");

    let main_function = match template.state_kind {
        StateKind::Stateless => {
            format!("int {instance_name}({parameters}) {{\n    {body}\n}}\n")
        }
        StateKind::Stateful => {
            let mut loads = String::new();
            let mut stores = String::new();
            for (slot, state_var) in template.state_vars.iter().enumerate() {
                loads += &format!("    int {state_var} = state_group.state_{slot};\n");
                stores += &format!("    state_group.state_{slot} = {state_var};\n");
            }
            format!(
                "|StateGroup| {instance_name}({parameters}) {{\n    \
                 |StateGroup| old_state_group = state_group;\n\
                 {loads}    {body}\n{stores}    return old_state_group;\n}}\n"
            )
        }
    };

    Ok(CompiledAlu {
        instance_name: instance_name.to_owned(),
        state_kind: template.state_kind,
        helper_functions,
        main_function,
        args,
        packet_fields: template.packet_fields.clone(),
        state_vars: template.state_vars.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alu::AluTemplate;

    fn stateless_template(body: &str) -> AluTemplate {
        let text = format!(
            "type : stateless\nstate variables : {{}}\npacket fields : {{pkt_0, pkt_1}}\nhole variables : {{}}\nreturn {body};\n"
        );
        AluTemplate::parse(&text, "test.stateless_alu").expect("should parse")
    }

    #[test]
    fn test_mux2_lowering() {
        let template = stateless_template("Mux2(pkt_0, pkt_1)");
        let mut registry = HoleRegistry::new();

        let compiled = compile(&template, "alu_0_0", CodegenOptions::default(), &mut registry)
            .expect("should compile");

        assert!(compiled
            .main_function
            .contains("return alu_0_0_Mux2_0(pkt_0,pkt_1,Mux2_0);"));
        assert!(compiled
            .helper_functions
            .contains("int alu_0_0_Mux2_0(int op1, int op2, int choice)"));
        assert_eq!(registry.get("alu_0_0_Mux2_0_global"), Some(1));
        assert_eq!(compiled.args.get("Mux2_0"), Some(&1));
    }

    #[test]
    fn test_signature_closure() {
        // The parameter list appends the registered holes sorted by name.
        let template = stateless_template("Opt(arith_op(Mux2(pkt_0, C()), pkt_1))");
        let mut registry = HoleRegistry::new();

        let compiled = compile(&template, "alu_1_0", CodegenOptions::default(), &mut registry)
            .expect("should compile");

        assert!(compiled.main_function.starts_with(
            "int alu_1_0(int pkt_0, int pkt_1, int Mux2_0, int Opt_0, int arith_op_0, int const_0)"
        ));
        assert_eq!(
            compiled.hole_arguments(),
            vec![
                "alu_1_0_Mux2_0_global",
                "alu_1_0_Opt_0_global",
                "alu_1_0_arith_op_0_global",
                "alu_1_0_const_0_global"
            ]
        );
    }

    #[test]
    fn test_construct_counters_are_monotone() {
        let template = stateless_template("arith_op(C(), C()) + Mux2(C(), pkt_0)");
        let mut registry = HoleRegistry::new();

        let compiled = compile(&template, "alu_0_1", CodegenOptions::default(), &mut registry)
            .expect("should compile");

        assert!(compiled.main_function.contains("alu_0_1_C_0(const_0)"));
        assert!(compiled.main_function.contains("alu_0_1_C_1(const_1)"));
        assert!(compiled.main_function.contains("alu_0_1_C_2(const_2)"));
        assert_eq!(registry.get("alu_0_1_const_2_global"), Some(2));
    }

    #[test]
    fn test_const_hole_width_knob() {
        let template = stateless_template("C()");
        let mut registry = HoleRegistry::new();
        let options = CodegenOptions { const_hole_width: 5 };

        let compiled =
            compile(&template, "alu_0_0", options, &mut registry).expect("should compile");

        assert_eq!(registry.get("alu_0_0_const_0_global"), Some(5));
        assert_eq!(compiled.args.get("const_0"), Some(&5));
    }

    #[test]
    fn test_rel_op_emits_comparison_against_one() {
        let template = AluTemplate::parse(
            "type : stateful\nstate variables : {state_0}\npacket fields : {pkt_0}\nhole variables : {}\nif (rel_op(state_0, pkt_0)) {\n    state_0 = state_0 + 1;\n}\n",
            "rel.stateful_alu",
        )
        .expect("should parse");
        let mut registry = HoleRegistry::new();

        let compiled = compile(&template, "salu_0_0", CodegenOptions::default(), &mut registry)
            .expect("should compile");

        assert!(compiled
            .main_function
            .contains("if (salu_0_0_rel_op_0(state_0,pkt_0,rel_op_0) == 1)"));
        assert_eq!(registry.get("salu_0_0_rel_op_0_global"), Some(2));
    }

    #[test]
    fn test_rel_op_helper_opcode_table() {
        let template = stateless_template("rel_op(pkt_0, pkt_1)");
        let mut registry = HoleRegistry::new();

        let compiled = compile(&template, "alu_0_0", CodegenOptions::default(), &mut registry)
            .expect("should compile");

        // Opcodes select not-equal, less-than, greater-than, equal, in
        // that order.
        let helper = &compiled.helper_functions;
        let neq = helper.find("(operand1 != operand2)").expect("has !=");
        let less = helper.find("(operand1 < operand2)").expect("has <");
        let greater = helper.find("(operand1 > operand2)").expect("has >");
        let equal = helper.find("(operand1 == operand2)").expect("has ==");
        assert!(neq < less && less < greater && greater < equal);
        assert!(helper.contains("if (opcode == 0)"));
        assert!(helper.contains("else if (opcode == 1)"));
        assert!(helper.contains("else if (opcode == 2)"));
    }

    #[test]
    fn test_arith_op_helper_adds_then_subtracts() {
        let template = stateless_template("arith_op(pkt_0, pkt_1)");
        let mut registry = HoleRegistry::new();

        let compiled = compile(&template, "alu_0_0", CodegenOptions::default(), &mut registry)
            .expect("should compile");

        let helper = &compiled.helper_functions;
        let add = helper.find("operand1 + operand2").expect("has +");
        let sub = helper.find("operand1 - operand2").expect("has -");
        assert!(add < sub);
        assert_eq!(registry.get("alu_0_0_arith_op_0_global"), Some(1));
    }

    #[test]
    fn test_stateful_returns_state_group() {
        let template = AluTemplate::parse(
            "type : stateful\nstate variables : {state_0, state_1}\npacket fields : {pkt_0}\nhole variables : {}\nstate_0 = state_1 + pkt_0;\n",
            "pair.stateful_alu",
        )
        .expect("should parse");
        let mut registry = HoleRegistry::new();

        let compiled = compile(&template, "salu_1_1", CodegenOptions::default(), &mut registry)
            .expect("should compile");

        assert!(compiled
            .main_function
            .starts_with("|StateGroup| salu_1_1(ref |StateGroup| state_group, int pkt_0)"));
        assert!(compiled.main_function.contains("int state_0 = state_group.state_0;"));
        assert!(compiled.main_function.contains("int state_1 = state_group.state_1;"));
        assert!(compiled.main_function.contains("state_group.state_0 = state_0;"));
        assert!(compiled.main_function.contains("state_group.state_1 = state_1;"));
        assert!(compiled.main_function.contains("return old_state_group;"));
    }

    #[test]
    fn test_declared_hole_vars_get_registered() {
        let template = AluTemplate::parse(
            "type : stateless\nstate variables : {}\npacket fields : {pkt_0}\nhole variables : {limit}\nreturn pkt_0 + limit;\n",
            "holes.stateless_alu",
        )
        .expect("should parse");
        let mut registry = HoleRegistry::new();

        let compiled = compile(&template, "alu_0_0", CodegenOptions::default(), &mut registry)
            .expect("should compile");

        assert_eq!(registry.get("alu_0_0_limit_global"), Some(DECLARED_HOLE_WIDTH));
        assert!(compiled
            .main_function
            .starts_with("int alu_0_0(int pkt_0, int limit)"));
    }

    #[test]
    fn test_duplicate_instance_is_fatal() {
        let template = stateless_template("Mux2(pkt_0, pkt_1)");
        let mut registry = HoleRegistry::new();

        compile(&template, "alu_0_0", CodegenOptions::default(), &mut registry)
            .expect("should compile");

        // Compiling the same instance name twice collides in the registry.
        assert!(compile(&template, "alu_0_0", CodegenOptions::default(), &mut registry).is_err());
    }
}
