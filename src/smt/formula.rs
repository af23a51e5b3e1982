use std::collections::BTreeMap;

/// An SMT expression over integers and booleans, rendered to SMT-LIB 2
/// text without simplification.
#[derive(Debug, Clone, PartialEq)]
pub enum SmtExpr {
    IntLit(i64),
    BoolLit(bool),
    Var(String),
    Neg(Box<SmtExpr>),
    Add(Box<SmtExpr>, Box<SmtExpr>),
    Mul(Box<SmtExpr>, Box<SmtExpr>),
    Div(Box<SmtExpr>, Box<SmtExpr>),
    Mod(Box<SmtExpr>, Box<SmtExpr>),
    Not(Box<SmtExpr>),
    And(Box<SmtExpr>, Box<SmtExpr>),
    Or(Box<SmtExpr>, Box<SmtExpr>),
    Xor(Box<SmtExpr>, Box<SmtExpr>),
    Lt(Box<SmtExpr>, Box<SmtExpr>),
    Le(Box<SmtExpr>, Box<SmtExpr>),
    Eq(Box<SmtExpr>, Box<SmtExpr>),
    Ite(Box<SmtExpr>, Box<SmtExpr>, Box<SmtExpr>),
    Implies(Box<SmtExpr>, Box<SmtExpr>),
}

/// A value an expression evaluates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtValue {
    Int(i64),
    Bool(bool),
}

impl SmtValue {
    fn int(self) -> i64 {
        match self {
            SmtValue::Int(value) => value,
            SmtValue::Bool(value) => {
                if value {
                    1
                } else {
                    0
                }
            }
        }
    }

    fn bool(self) -> bool {
        match self {
            SmtValue::Bool(value) => value,
            SmtValue::Int(value) => value > 0,
        }
    }
}

impl SmtExpr {
    pub fn to_smt2(&self) -> String {
        match self {
            SmtExpr::IntLit(value) => {
                if *value < 0 {
                    format!("(- {})", -value)
                } else {
                    value.to_string()
                }
            }
            SmtExpr::BoolLit(value) => value.to_string(),
            SmtExpr::Var(name) => name.clone(),
            SmtExpr::Neg(operand) => format!("(- {})", operand.to_smt2()),
            SmtExpr::Add(lhs, rhs) => format!("(+ {} {})", lhs.to_smt2(), rhs.to_smt2()),
            SmtExpr::Mul(lhs, rhs) => format!("(* {} {})", lhs.to_smt2(), rhs.to_smt2()),
            SmtExpr::Div(lhs, rhs) => format!("(div {} {})", lhs.to_smt2(), rhs.to_smt2()),
            SmtExpr::Mod(lhs, rhs) => format!("(mod {} {})", lhs.to_smt2(), rhs.to_smt2()),
            SmtExpr::Not(operand) => format!("(not {})", operand.to_smt2()),
            SmtExpr::And(lhs, rhs) => format!("(and {} {})", lhs.to_smt2(), rhs.to_smt2()),
            SmtExpr::Or(lhs, rhs) => format!("(or {} {})", lhs.to_smt2(), rhs.to_smt2()),
            SmtExpr::Xor(lhs, rhs) => format!("(xor {} {})", lhs.to_smt2(), rhs.to_smt2()),
            SmtExpr::Lt(lhs, rhs) => format!("(< {} {})", lhs.to_smt2(), rhs.to_smt2()),
            SmtExpr::Le(lhs, rhs) => format!("(<= {} {})", lhs.to_smt2(), rhs.to_smt2()),
            SmtExpr::Eq(lhs, rhs) => format!("(= {} {})", lhs.to_smt2(), rhs.to_smt2()),
            SmtExpr::Ite(condition, then, otherwise) => format!(
                "(ite {} {} {})",
                condition.to_smt2(),
                then.to_smt2(),
                otherwise.to_smt2()
            ),
            SmtExpr::Implies(lhs, rhs) => format!("(=> {} {})", lhs.to_smt2(), rhs.to_smt2()),
        }
    }

    /// Evaluate under an integer environment. Booleans and integers
    /// coerce the same way the DAG translation does.
    pub fn eval(&self, env: &BTreeMap<String, i64>) -> SmtValue {
        match self {
            SmtExpr::IntLit(value) => SmtValue::Int(*value),
            SmtExpr::BoolLit(value) => SmtValue::Bool(*value),
            SmtExpr::Var(name) => SmtValue::Int(*env.get(name).unwrap_or(&0)),
            SmtExpr::Neg(operand) => SmtValue::Int(-operand.eval(env).int()),
            SmtExpr::Add(lhs, rhs) => SmtValue::Int(lhs.eval(env).int() + rhs.eval(env).int()),
            SmtExpr::Mul(lhs, rhs) => SmtValue::Int(lhs.eval(env).int() * rhs.eval(env).int()),
            SmtExpr::Div(lhs, rhs) => SmtValue::Int(lhs.eval(env).int() / rhs.eval(env).int()),
            SmtExpr::Mod(lhs, rhs) => SmtValue::Int(lhs.eval(env).int() % rhs.eval(env).int()),
            SmtExpr::Not(operand) => SmtValue::Bool(!operand.eval(env).bool()),
            SmtExpr::And(lhs, rhs) => SmtValue::Bool(lhs.eval(env).bool() && rhs.eval(env).bool()),
            SmtExpr::Or(lhs, rhs) => SmtValue::Bool(lhs.eval(env).bool() || rhs.eval(env).bool()),
            SmtExpr::Xor(lhs, rhs) => SmtValue::Bool(lhs.eval(env).bool() ^ rhs.eval(env).bool()),
            SmtExpr::Lt(lhs, rhs) => SmtValue::Bool(lhs.eval(env).int() < rhs.eval(env).int()),
            SmtExpr::Le(lhs, rhs) => SmtValue::Bool(lhs.eval(env).int() <= rhs.eval(env).int()),
            SmtExpr::Eq(lhs, rhs) => SmtValue::Bool(lhs.eval(env).int() == rhs.eval(env).int()),
            SmtExpr::Ite(condition, then, otherwise) => {
                if condition.eval(env).bool() {
                    then.eval(env)
                } else {
                    otherwise.eval(env)
                }
            }
            SmtExpr::Implies(lhs, rhs) => {
                SmtValue::Bool(!lhs.eval(env).bool() || rhs.eval(env).bool())
            }
        }
    }
}

/// Conjunction of a list of boolean expressions, `true` when empty.
pub fn conjunction(mut expressions: Vec<SmtExpr>) -> SmtExpr {
    let Some(mut conjunction) = expressions.pop() else {
        return SmtExpr::BoolLit(true);
    };
    while let Some(expression) = expressions.pop() {
        conjunction = SmtExpr::And(Box::new(expression), Box::new(conjunction));
    }
    conjunction
}

/// The quantifier-preserving formula a solver DAG translates to:
/// `forall sources. range(bits) => assertion`. Both consumers derive
/// their script from the same walker output; only the outermost shape
/// differs.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantifiedFormula {
    pub sources: Vec<String>,
    pub assertion: SmtExpr,
}

impl QuantifiedFormula {
    /// `0 <= source < 2^bits` for every source.
    fn range_bound(&self, bits: u32) -> SmtExpr {
        let limit = 1i64 << bits;
        conjunction(
            self.sources
                .iter()
                .map(|source| {
                    SmtExpr::And(
                        Box::new(SmtExpr::Le(
                            Box::new(SmtExpr::IntLit(0)),
                            Box::new(SmtExpr::Var(source.clone())),
                        )),
                        Box::new(SmtExpr::Lt(
                            Box::new(SmtExpr::Var(source.clone())),
                            Box::new(SmtExpr::IntLit(limit)),
                        )),
                    )
                })
                .collect(),
        )
    }

    fn body(&self, bits: u32) -> SmtExpr {
        SmtExpr::Implies(
            Box::new(self.range_bound(bits)),
            Box::new(self.assertion.clone()),
        )
    }

    /// Script asserting the universally quantified formula; `sat` means
    /// the assertion holds on the whole range.
    pub fn universal_script(&self, bits: u32) -> String {
        let bindings = self
            .sources
            .iter()
            .map(|source| format!("({source} Int)"))
            .collect::<Vec<_>>()
            .join(" ");

        format!(
            "(assert (forall ({bindings}) {}))\n(check-sat)\n",
            self.body(bits).to_smt2()
        )
    }

    /// Script asserting the negated body with free sources; a model is a
    /// counter-example within the range.
    pub fn negation_script(&self, bits: u32) -> String {
        let mut script = String::new();
        for source in &self.sources {
            script += &format!("(declare-const {source} Int)\n");
        }
        script += &format!(
            "(assert (not {}))\n(check-sat)\n(get-model)\n",
            self.body(bits).to_smt2()
        );
        script
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<SmtExpr> {
        Box::new(SmtExpr::Var(name.to_string()))
    }

    #[test]
    fn test_to_smt2_renders_negative_literals() {
        assert_eq!(SmtExpr::IntLit(-3).to_smt2(), "(- 3)");
        assert_eq!(SmtExpr::IntLit(3).to_smt2(), "3");
    }

    #[test]
    fn test_universal_script_shape() {
        let formula = QuantifiedFormula {
            sources: vec!["pkt_0".to_string()],
            assertion: SmtExpr::Eq(var("pkt_0"), var("pkt_0")),
        };

        let script = formula.universal_script(10);

        assert_eq!(
            script,
            "(assert (forall ((pkt_0 Int)) (=> (and (<= 0 pkt_0) (< pkt_0 1024)) (= pkt_0 pkt_0))))\n(check-sat)\n"
        );
    }

    #[test]
    fn test_negation_script_declares_sources() {
        let formula = QuantifiedFormula {
            sources: vec!["pkt_0".to_string(), "state_group_0_state_0".to_string()],
            assertion: SmtExpr::BoolLit(true),
        };

        let script = formula.negation_script(2);

        assert!(script.starts_with("(declare-const pkt_0 Int)\n(declare-const state_group_0_state_0 Int)\n"));
        assert!(script.contains("(assert (not (=>"));
        assert!(script.ends_with("(check-sat)\n(get-model)\n"));
    }

    #[test]
    fn test_eval_coerces_between_sorts() {
        // (1 < 2) + 1 == 2 under bool-to-int coercion.
        let expression = SmtExpr::Add(
            Box::new(SmtExpr::Lt(
                Box::new(SmtExpr::IntLit(1)),
                Box::new(SmtExpr::IntLit(2)),
            )),
            Box::new(SmtExpr::IntLit(1)),
        );

        assert_eq!(expression.eval(&BTreeMap::new()), SmtValue::Int(2));
    }
}
