use std::collections::HashMap;

use super::{
    conjunction,
    QuantifiedFormula,
    SmtError,
    SmtExpr,
};

/// A node bound during the walk, tagged with its sort.
#[derive(Debug, Clone)]
enum Typed {
    Int(SmtExpr),
    Bool(SmtExpr),
}

impl Typed {
    /// Coerce to integer sort: `ite(b, 1, 0)` for booleans.
    fn int(&self) -> SmtExpr {
        match self {
            Typed::Int(expression) => expression.clone(),
            Typed::Bool(expression) => SmtExpr::Ite(
                Box::new(expression.clone()),
                Box::new(SmtExpr::IntLit(1)),
                Box::new(SmtExpr::IntLit(0)),
            ),
        }
    }

    /// Coerce to boolean sort: `i > 0` for integers.
    fn bool(&self) -> SmtExpr {
        match self {
            Typed::Bool(expression) => expression.clone(),
            Typed::Int(expression) => SmtExpr::Lt(
                Box::new(SmtExpr::IntLit(0)),
                Box::new(expression.clone()),
            ),
        }
    }

    fn is_bool(&self) -> bool {
        matches!(self, Typed::Bool(_))
    }
}

struct Walker<'a> {
    bindings: HashMap<String, Typed>,
    sources: Vec<String>,
    asserts: Vec<SmtExpr>,
    line: &'a str,
}

impl<'a> Walker<'a> {
    fn error(&self, message: impl Into<String>) -> SmtError {
        SmtError {
            message: format!("{} in DAG line '{}'", message.into(), self.line),
        }
    }

    fn operand(&self, id: &str) -> Result<Typed, SmtError> {
        self.bindings
            .get(&format!("_n{id}"))
            .cloned()
            .ok_or_else(|| self.error(format!("operand _n{id} is not defined yet")))
    }

    fn token<'b>(&self, tokens: &[&'b str], index: usize) -> Result<&'b str, SmtError> {
        tokens
            .get(index)
            .copied()
            .ok_or_else(|| self.error("too few operands"))
    }
}

/// Walk the solver's DAG dump in order and build the single
/// quantifier-preserving formula both verification and counter-example
/// generation consume.
pub fn formula_from_dag(dag: &str) -> Result<QuantifiedFormula, SmtError> {
    let mut walker = Walker {
        bindings: HashMap::new(),
        sources: vec![],
        asserts: vec![],
        line: "",
    };

    for line in dag.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = tokens.first() else {
            continue;
        };
        if *first == "dag" || *first == "TUPLE_DEF" {
            continue;
        }
        walker.line = line;

        let output = format!("_n{first}");
        let operation = walker.token(&tokens, 2)?;

        // ASSERT names its operand right after the keyword; every other
        // node carries its declared type there.
        if operation == "ASSERT" {
            let id = walker.token(&tokens, 3)?;
            let assertion = walker.operand(id)?.bool();
            walker.asserts.push(assertion);
            continue;
        }

        let bound = match operation {
            "S" => {
                let var_type = walker.token(&tokens, 3)?;
                if var_type != "INT" {
                    return Err(walker.error(format!("unexpected source type '{var_type}'")));
                }
                let name = walker.token(&tokens, 4)?.to_string();
                walker.sources.push(name.clone());
                Typed::Int(SmtExpr::Var(name))
            }
            "CONST" => {
                let var_type = walker.token(&tokens, 3)?;
                let value = walker.token(&tokens, 4)?;
                match var_type {
                    "INT" => Typed::Int(SmtExpr::IntLit(value.parse().map_err(|_| {
                        walker.error(format!("invalid integer constant '{value}'"))
                    })?)),
                    "BOOL" => match value {
                        "0" => Typed::Bool(SmtExpr::BoolLit(false)),
                        "1" => Typed::Bool(SmtExpr::BoolLit(true)),
                        value => {
                            return Err(
                                walker.error(format!("invalid boolean constant '{value}'"))
                            )
                        }
                    },
                    var_type => {
                        return Err(walker.error(format!("constant type '{var_type}' not supported")))
                    }
                }
            }
            "NEG" => {
                let operand = walker.operand(walker.token(&tokens, 4)?)?;
                Typed::Int(SmtExpr::Neg(Box::new(operand.int())))
            }
            "NOT" => {
                let operand = walker.operand(walker.token(&tokens, 4)?)?;
                Typed::Bool(SmtExpr::Not(Box::new(operand.bool())))
            }
            "AND" | "OR" | "XOR" => {
                let lhs = walker.operand(walker.token(&tokens, 4)?)?.bool();
                let rhs = walker.operand(walker.token(&tokens, 5)?)?.bool();
                Typed::Bool(match operation {
                    "AND" => SmtExpr::And(Box::new(lhs), Box::new(rhs)),
                    "OR" => SmtExpr::Or(Box::new(lhs), Box::new(rhs)),
                    _ => SmtExpr::Xor(Box::new(lhs), Box::new(rhs)),
                })
            }
            "PLUS" | "TIMES" | "DIV" | "MOD" => {
                let lhs = walker.operand(walker.token(&tokens, 4)?)?.int();
                let rhs = walker.operand(walker.token(&tokens, 5)?)?.int();
                Typed::Int(match operation {
                    "PLUS" => SmtExpr::Add(Box::new(lhs), Box::new(rhs)),
                    "TIMES" => SmtExpr::Mul(Box::new(lhs), Box::new(rhs)),
                    "DIV" => SmtExpr::Div(Box::new(lhs), Box::new(rhs)),
                    _ => SmtExpr::Mod(Box::new(lhs), Box::new(rhs)),
                })
            }
            "LT" | "EQ" => {
                let lhs = walker.operand(walker.token(&tokens, 4)?)?.int();
                let rhs = walker.operand(walker.token(&tokens, 5)?)?.int();
                Typed::Bool(if operation == "LT" {
                    SmtExpr::Lt(Box::new(lhs), Box::new(rhs))
                } else {
                    SmtExpr::Eq(Box::new(lhs), Box::new(rhs))
                })
            }
            "ARRACC" => {
                // selector, else-value, then-value
                let selector = walker.operand(walker.token(&tokens, 4)?)?.bool();
                let otherwise = walker.operand(walker.token(&tokens, 6)?)?;
                let then = walker.operand(walker.token(&tokens, 7)?)?;
                ite(selector, then, otherwise)
            }
            "ARRASS" => {
                // The comparand takes the selector's sort.
                let selector = walker.operand(walker.token(&tokens, 4)?)?;
                let comparand = walker.token(&tokens, 6)?;
                let condition = if selector.is_bool() {
                    let comparand = match comparand {
                        "0" => false,
                        "1" => true,
                        comparand => {
                            return Err(walker
                                .error(format!("invalid boolean comparand '{comparand}'")))
                        }
                    };
                    SmtExpr::Eq(
                        Box::new(selector.int()),
                        Box::new(SmtExpr::IntLit(i64::from(comparand))),
                    )
                } else {
                    let comparand: i64 = comparand.parse().map_err(|_| {
                        walker.error(format!("invalid integer comparand '{comparand}'"))
                    })?;
                    SmtExpr::Eq(Box::new(selector.int()), Box::new(SmtExpr::IntLit(comparand)))
                };
                let otherwise = walker.operand(walker.token(&tokens, 7)?)?;
                let then = walker.operand(walker.token(&tokens, 8)?)?;
                ite(condition, then, otherwise)
            }
            operation => {
                return Err(walker.error(format!("unknown operation '{operation}'")));
            }
        };

        walker.bindings.insert(output, bound);
    }

    // Without sources and a condition there is no implication to verify
    // or negate.
    if walker.sources.is_empty() {
        return Err(SmtError {
            message: "DAG defines no source variables".to_string(),
        });
    }
    if walker.asserts.is_empty() {
        return Err(SmtError {
            message: "DAG defines no assertions".to_string(),
        });
    }

    Ok(QuantifiedFormula {
        sources: walker.sources,
        assertion: conjunction(walker.asserts),
    })
}

/// If-then-else whose branches keep their common sort when they agree and
/// fall back to integers when they disagree.
fn ite(condition: SmtExpr, then: Typed, otherwise: Typed) -> Typed {
    if then.is_bool() && otherwise.is_bool() {
        Typed::Bool(SmtExpr::Ite(
            Box::new(condition),
            Box::new(then.bool()),
            Box::new(otherwise.bool()),
        ))
    } else {
        Typed::Int(SmtExpr::Ite(
            Box::new(condition),
            Box::new(then.int()),
            Box::new(otherwise.int()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::smt::SmtValue;

    const SIMPLE_DAG: &str = "\
dag 6
0 = S INT pkt_0__s2
1 = CONST INT 1
2 = PLUS INT 0 1
3 = EQ BOOL 2 2
4 = ASSERT 3
";

    #[test]
    fn test_simple_dag_translates() {
        let formula = formula_from_dag(SIMPLE_DAG).expect("should translate");

        assert_eq!(formula.sources, vec!["pkt_0__s2".to_string()]);
        assert_eq!(
            formula.assertion.to_smt2(),
            "(= (+ pkt_0__s2 1) (+ pkt_0__s2 1))"
        );
    }

    #[test]
    fn test_arracc_selects_the_then_branch_on_true() {
        // out = sel ? n4 : n3 with sel = (0 < src)
        let dag = "\
0 = S INT src__s1
1 = CONST INT 0
2 = LT BOOL 1 0
3 = CONST INT 10
4 = CONST INT 20
5 = ARRACC INT 2 2 3 4
6 = EQ BOOL 5 4
7 = ASSERT 6
";
        let formula = formula_from_dag(dag).expect("should translate");

        let mut env = BTreeMap::new();
        env.insert("src__s1".to_string(), 5);
        assert_eq!(formula.assertion.eval(&env), SmtValue::Bool(true));

        env.insert("src__s1".to_string(), 0);
        assert_eq!(formula.assertion.eval(&env), SmtValue::Bool(false));
    }

    #[test]
    fn test_arrass_compares_against_the_literal() {
        // out = (src == 2) ? 7 : 3
        let dag = "\
0 = S INT src__s1
1 = CONST INT 3
2 = CONST INT 7
3 = ARRASS INT 0 = 2 1 2
4 = CONST INT 7
5 = EQ BOOL 3 4
6 = ASSERT 5
";
        let formula = formula_from_dag(dag).expect("should translate");

        let mut env = BTreeMap::new();
        env.insert("src__s1".to_string(), 2);
        assert_eq!(formula.assertion.eval(&env), SmtValue::Bool(true));

        env.insert("src__s1".to_string(), 1);
        assert_eq!(formula.assertion.eval(&env), SmtValue::Bool(false));
    }

    #[test]
    fn test_boolean_operands_coerce_to_int() {
        // (a < b) + 1 forces an ite() coercion.
        let dag = "\
0 = S INT a__s1
1 = S INT b__s1
2 = LT BOOL 0 1
3 = CONST INT 1
4 = PLUS INT 2 3
5 = EQ BOOL 4 3
6 = ASSERT 5
";
        let formula = formula_from_dag(dag).expect("should translate");

        assert!(formula
            .assertion
            .to_smt2()
            .contains("(ite (< a__s1 b__s1) 1 0)"));
    }

    #[test]
    fn test_unresolved_operand_is_fatal() {
        let dag = "\
0 = S INT src__s1
1 = PLUS INT 0 9
2 = ASSERT 1
";
        assert!(formula_from_dag(dag).is_err());
    }

    #[test]
    fn test_dag_without_asserts_is_fatal() {
        let dag = "0 = S INT src__s1\n";
        assert!(formula_from_dag(dag).is_err());
    }

    #[test]
    fn test_dag_without_sources_is_fatal() {
        let dag = "\
0 = CONST BOOL 1
1 = ASSERT 0
";
        assert!(formula_from_dag(dag).is_err());
    }

    #[test]
    fn test_unknown_operation_is_fatal() {
        let dag = "\
0 = S INT src__s1
1 = FROB INT 0 0
2 = ASSERT 1
";
        assert!(formula_from_dag(dag).is_err());
    }
}
