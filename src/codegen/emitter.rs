use std::collections::BTreeMap;

use log::trace;

use crate::alu::{AluBody, Expression, GuardedUpdates, Update};

use super::{CodegenError, HoleRegistry};

/// Per-construct counters. Each parametric construct kind numbers its
/// instantiations independently and strictly monotonically, so generated
/// helper and hole names carry the kind and its per-template index.
#[derive(Debug, Default, Clone, Copy)]
struct ConstructCounters {
    mux2: u32,
    mux3: u32,
    rel_op: u32,
    arith_op: u32,
    opt: u32,
    constant: u32,
}

/// Builder accumulating the two outputs of template lowering: the helper
/// function text and the per-instance hole table. All emission goes
/// through the typed methods below.
pub(crate) struct Emitter<'a> {
    instance: &'a str,
    helpers: String,
    args: BTreeMap<String, u32>,
    counters: ConstructCounters,
    registry: &'a mut HoleRegistry,
    const_hole_width: u32,
}

impl<'a> Emitter<'a> {
    pub fn new(instance: &'a str, registry: &'a mut HoleRegistry, const_hole_width: u32) -> Self {
        Emitter {
            instance,
            helpers: String::new(),
            args: BTreeMap::new(),
            counters: ConstructCounters::default(),
            registry,
            const_hole_width,
        }
    }

    /// Register a hole under its instance-prefixed global name and in the
    /// per-instance argument table. Both registrations must be fresh.
    pub fn add_hole(&mut self, name: &str, width: u32) -> Result<(), CodegenError> {
        self.registry
            .add(&format!("{}_{}_global", self.instance, name), width)?;
        if self.args.insert(name.to_owned(), width).is_some() {
            return Err(CodegenError {
                message: format!(
                    "hole '{name}' appears twice in the argument list of '{}'",
                    self.instance
                ),
            });
        }
        Ok(())
    }

    pub fn into_outputs(self) -> (String, BTreeMap<String, u32>) {
        (self.helpers, self.args)
    }

    pub fn lower_body(&mut self, body: &AluBody) -> Result<String, CodegenError> {
        match body {
            AluBody::Update(update) => self.lower_update(update),
            AluBody::Return(expression) => {
                Ok(format!("return {};", self.lower_expression(expression)?))
            }
            AluBody::Cascade {
                if_arm,
                elif_arms,
                else_arm,
            } => {
                let mut text = self.lower_arm("if", if_arm)?;
                for arm in elif_arms {
                    text += &self.lower_arm(" else if", arm)?;
                }
                if let Some(updates) = else_arm {
                    text += &format!(" else {{\n{}\n    }}", self.lower_updates(updates)?);
                }
                Ok(text)
            }
        }
    }

    fn lower_arm(&mut self, keyword: &str, arm: &GuardedUpdates) -> Result<String, CodegenError> {
        let guard = self.lower_expression(&arm.guard)?;
        let updates = self.lower_updates(&arm.updates)?;
        Ok(format!("{keyword} ({guard}) {{\n{updates}\n    }}"))
    }

    fn lower_updates(&mut self, updates: &[Update]) -> Result<String, CodegenError> {
        let mut lowered = vec![];
        for update in updates {
            lowered.push(format!("    {}", self.lower_update(update)?));
        }
        Ok(lowered.join("\n"))
    }

    fn lower_update(&mut self, update: &Update) -> Result<String, CodegenError> {
        let value = self.lower_expression(&update.value)?;
        Ok(format!("{} = {};", update.state_var, value))
    }

    pub fn lower_expression(&mut self, expression: &Expression) -> Result<String, CodegenError> {
        trace!("lowering expression {expression:?}");

        match expression {
            Expression::Num(num) => Ok(num.to_string()),
            Expression::True => Ok("true".to_owned()),
            Expression::Var(name) => Ok(name.clone()),
            Expression::Paren(inner) => Ok(format!("({})", self.lower_expression(inner)?)),
            Expression::Binary { verb, lhs, rhs } => {
                let lhs = self.lower_expression(lhs)?;
                let rhs = self.lower_expression(rhs)?;
                Ok(format!("{lhs} {} {rhs}", verb.as_str()))
            }
            Expression::Mux2(first, second) => {
                let first = self.lower_expression(first)?;
                let second = self.lower_expression(second)?;
                let index = self.counters.mux2;
                self.counters.mux2 += 1;

                self.emit_mux2(index)?;
                Ok(format!(
                    "{}_Mux2_{index}({first},{second},Mux2_{index})",
                    self.instance
                ))
            }
            Expression::Mux3(first, second, third) => {
                let first = self.lower_expression(first)?;
                let second = self.lower_expression(second)?;
                let third = self.lower_expression(third)?;
                let index = self.counters.mux3;
                self.counters.mux3 += 1;

                self.emit_mux3(index)?;
                Ok(format!(
                    "{}_Mux3_{index}({first},{second},{third},Mux3_{index})",
                    self.instance
                ))
            }
            Expression::Mux3WithNum(first, second, num) => {
                let first = self.lower_expression(first)?;
                let second = self.lower_expression(second)?;
                let index = self.counters.mux3;
                self.counters.mux3 += 1;

                self.emit_mux3_with_num(index, *num)?;
                Ok(format!(
                    "{}_Mux3_{index}({first},{second},Mux3_{index})",
                    self.instance
                ))
            }
            Expression::Opt(operand) => {
                let operand = self.lower_expression(operand)?;
                let index = self.counters.opt;
                self.counters.opt += 1;

                self.emit_opt(index)?;
                Ok(format!("{}_Opt_{index}({operand},Opt_{index})", self.instance))
            }
            Expression::Const => {
                let index = self.counters.constant;
                self.counters.constant += 1;

                self.emit_constant(index)?;
                Ok(format!("{}_C_{index}(const_{index})", self.instance))
            }
            Expression::RelOp(first, second) => {
                let first = self.lower_expression(first)?;
                let second = self.lower_expression(second)?;
                let index = self.counters.rel_op;
                self.counters.rel_op += 1;

                self.emit_rel_op(index)?;
                Ok(format!(
                    "{}_rel_op_{index}({first},{second},rel_op_{index}) == 1",
                    self.instance
                ))
            }
            Expression::ArithOp(first, second) => {
                let first = self.lower_expression(first)?;
                let second = self.lower_expression(second)?;
                let index = self.counters.arith_op;
                self.counters.arith_op += 1;

                self.emit_arith_op(index)?;
                Ok(format!(
                    "{}_arith_op_{index}({first},{second},arith_op_{index})",
                    self.instance
                ))
            }
        }
    }

    fn emit_mux2(&mut self, index: u32) -> Result<(), CodegenError> {
        self.helpers += &format!(
            "int {inst}_Mux2_{index}(int op1, int op2, int choice) {{\n    \
             if (choice == 0) return op1;\n    \
             else return op2;\n}}\n\n",
            inst = self.instance
        );
        self.add_hole(&format!("Mux2_{index}"), 1)
    }

    fn emit_mux3(&mut self, index: u32) -> Result<(), CodegenError> {
        self.helpers += &format!(
            "int {inst}_Mux3_{index}(int op1, int op2, int op3, int choice) {{\n    \
             if (choice == 0) return op1;\n    \
             else if (choice == 1) return op2;\n    \
             else return op3;\n}}\n\n",
            inst = self.instance
        );
        self.add_hole(&format!("Mux3_{index}"), 2)
    }

    fn emit_mux3_with_num(&mut self, index: u32, num: i64) -> Result<(), CodegenError> {
        self.helpers += &format!(
            "int {inst}_Mux3_{index}(int op1, int op2, int choice) {{\n    \
             if (choice == 0) return op1;\n    \
             else if (choice == 1) return op2;\n    \
             else return {num};\n}}\n\n",
            inst = self.instance
        );
        self.add_hole(&format!("Mux3_{index}"), 2)
    }

    fn emit_rel_op(&mut self, index: u32) -> Result<(), CodegenError> {
        self.helpers += &format!(
            "int {inst}_rel_op_{index}(int operand1, int operand2, int opcode) {{\n    \
             if (opcode == 0) {{\n      return (operand1 != operand2) ? 1 : 0;\n    }} \
             else if (opcode == 1) {{\n      return (operand1 < operand2) ? 1 : 0;\n    }} \
             else if (opcode == 2) {{\n      return (operand1 > operand2) ? 1 : 0;\n    }} \
             else {{\n      return (operand1 == operand2) ? 1 : 0;\n    }}\n}}\n\n",
            inst = self.instance
        );
        self.add_hole(&format!("rel_op_{index}"), 2)
    }

    fn emit_arith_op(&mut self, index: u32) -> Result<(), CodegenError> {
        self.helpers += &format!(
            "int {inst}_arith_op_{index}(int operand1, int operand2, int opcode) {{\n    \
             if (opcode == 0) {{\n      return operand1 + operand2;\n    }} \
             else {{\n      return operand1 - operand2;\n    }}\n}}\n\n",
            inst = self.instance
        );
        self.add_hole(&format!("arith_op_{index}"), 1)
    }

    fn emit_constant(&mut self, index: u32) -> Result<(), CodegenError> {
        self.helpers += &format!(
            "int {inst}_C_{index}(int value) {{\n    return value;\n}}\n\n",
            inst = self.instance
        );
        self.add_hole(&format!("const_{index}"), self.const_hole_width)
    }

    fn emit_opt(&mut self, index: u32) -> Result<(), CodegenError> {
        self.helpers += &format!(
            "int {inst}_Opt_{index}(int op1, int enable) {{\n    \
             if (enable != 0) return 0;\n    return op1;\n}}\n\n",
            inst = self.instance
        );
        self.add_hole(&format!("Opt_{index}"), 1)
    }
}
