use pest::iterators::Pair;

use super::{AluBody, AluParser, Position, Rule, TemplateError};

/// Whether a template describes a stateful or a stateless ALU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Stateful,
    Stateless,
}

/// A parsed ALU template: the state indicator, the declared state
/// variables, packet fields, and hole variables, and the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AluTemplate {
    pub state_kind: StateKind,
    pub state_vars: Vec<String>,
    pub packet_fields: Vec<String>,
    pub hole_vars: Vec<String>,
    pub body: AluBody,
    pub position: Position,
}

impl AluTemplate {
    /// Parse and validate a template document. `file` is only used for
    /// error locations.
    pub fn parse(template: &str, file: &str) -> Result<AluTemplate, TemplateError> {
        let mut pairs = AluParser::parse_template(template, file)?;
        let template = Self::from_pair(pairs.next().unwrap(), file);
        template.validate()?;
        Ok(template)
    }

    pub fn from_pair(pair: Pair<Rule>, file: &str) -> AluTemplate {
        assert_eq!(pair.as_rule(), Rule::alu);

        let (line, col) = pair.line_col();
        let mut inner = pair.into_inner();

        let state_indicator = inner.next().unwrap();
        let state_kind = match state_indicator.into_inner().next().unwrap().as_str() {
            "stateful" => StateKind::Stateful,
            "stateless" => StateKind::Stateless,
            kind => unreachable!("unexpected state indicator '{kind}'"),
        };

        let state_vars = Self::idents_from_pair(inner.next().unwrap());
        let packet_fields = Self::idents_from_pair(inner.next().unwrap());
        let hole_vars = Self::idents_from_pair(inner.next().unwrap());
        let body = AluBody::from_pair(inner.next().unwrap(), file);

        AluTemplate {
            state_kind,
            state_vars,
            packet_fields,
            hole_vars,
            body,
            position: (file.to_string(), line, col),
        }
    }

    fn idents_from_pair(pair: Pair<Rule>) -> Vec<String> {
        pair.into_inner()
            .map(|ident| ident.as_str().to_owned())
            .collect()
    }

    /// Enforce the structural rules that the grammar alone cannot: a
    /// stateless template has no state variables and exactly one return,
    /// a stateful template has no return.
    fn validate(&self) -> Result<(), TemplateError> {
        match self.state_kind {
            StateKind::Stateless => {
                if !self.state_vars.is_empty() {
                    return Err(TemplateError {
                        message: format!(
                            "state variables given to stateless ALU: {}",
                            self.state_vars.join(", ")
                        ),
                        position: self.position.clone(),
                    });
                }
                if !matches!(self.body, AluBody::Return(_)) {
                    return Err(TemplateError {
                        message: "stateless ALU must end in a single return statement".to_string(),
                        position: self.position.clone(),
                    });
                }
            }
            StateKind::Stateful => {
                if matches!(self.body, AluBody::Return(_)) {
                    return Err(TemplateError {
                        message: "return statement given to stateful ALU".to_string(),
                        position: self.position.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alu::{BinaryVerb, Expression};

    const RAW_STATEFUL: &str = r"type : stateful
state variables : {state_0}
packet fields : {pkt_0}
hole variables : {}
state_0 = state_0 + pkt_0;
";

    const SIMPLE_STATELESS: &str = r"type : stateless
state variables : {}
packet fields : {pkt_0, pkt_1}
hole variables : {}
return Opt(arith_op(Mux3(pkt_0, pkt_1, C()), Mux3(pkt_0, pkt_1, C())));
";

    #[test]
    fn test_parse_raw_stateful() {
        let template = AluTemplate::parse(RAW_STATEFUL, "raw.stateful_alu").expect("should parse");

        assert_eq!(template.state_kind, StateKind::Stateful);
        assert_eq!(template.state_vars, vec!["state_0".to_string()]);
        assert_eq!(template.packet_fields, vec!["pkt_0".to_string()]);
        assert!(template.hole_vars.is_empty());

        let AluBody::Update(update) = &template.body else {
            panic!("expected a single update");
        };
        assert_eq!(update.state_var, "state_0");
        assert_eq!(
            update.value,
            Expression::Binary {
                verb: BinaryVerb::Add,
                lhs: Box::new(Expression::Var("state_0".into())),
                rhs: Box::new(Expression::Var("pkt_0".into())),
            }
        );
    }

    #[test]
    fn test_parse_simple_stateless() {
        let template =
            AluTemplate::parse(SIMPLE_STATELESS, "simple.stateless_alu").expect("should parse");

        assert_eq!(template.state_kind, StateKind::Stateless);
        assert!(matches!(template.body, AluBody::Return(_)));
    }

    #[test]
    fn test_parse_cascade() {
        let template = AluTemplate::parse(
            r"type : stateful
state variables : {state_0, state_1}
packet fields : {pkt_0}
hole variables : {}
if (rel_op(state_0, C())) {
    state_0 = Mux2(state_0, pkt_0);
} elif (state_1 == 0) {
    state_1 = state_1 + C();
} else {
    state_0 = 0;
    state_1 = Opt(pkt_0);
}
",
            "cascade.stateful_alu",
        )
        .expect("should parse");

        let AluBody::Cascade {
            if_arm,
            elif_arms,
            else_arm,
        } = &template.body
        else {
            panic!("expected a cascade");
        };
        assert!(matches!(if_arm.guard, Expression::RelOp(_, _)));
        assert_eq!(elif_arms.len(), 1);
        assert_eq!(else_arm.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn test_mux3_with_literal_third_input() {
        let template = AluTemplate::parse(
            r"type : stateless
state variables : {}
packet fields : {pkt_0, pkt_1}
hole variables : {}
return Mux3(pkt_0, pkt_1, 1);
",
            "mux3.stateless_alu",
        )
        .expect("should parse");

        let AluBody::Return(expression) = &template.body else {
            panic!("expected a return");
        };
        assert_eq!(
            *expression,
            Expression::Mux3WithNum(
                Box::new(Expression::Var("pkt_0".into())),
                Box::new(Expression::Var("pkt_1".into())),
                1
            )
        );
    }

    #[test]
    fn test_stateless_with_state_vars_is_rejected() {
        let result = AluTemplate::parse(
            r"type : stateless
state variables : {state_0}
packet fields : {pkt_0}
hole variables : {}
return pkt_0;
",
            "bad.stateless_alu",
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_stateful_with_return_is_rejected() {
        let result = AluTemplate::parse(
            r"type : stateful
state variables : {state_0}
packet fields : {pkt_0}
hole variables : {}
return state_0;
",
            "bad.stateful_alu",
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_missing_terminator_is_rejected() {
        let result = AluTemplate::parse(
            r"type : stateful
state variables : {state_0}
packet fields : {pkt_0}
hole variables : {}
state_0 = state_0 + pkt_0
",
            "bad.stateful_alu",
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_state_indicator_is_rejected() {
        let result = AluTemplate::parse(
            r"type : statefull
state variables : {state_0}
packet fields : {pkt_0}
hole variables : {}
state_0 = pkt_0;
",
            "bad.stateful_alu",
        );

        assert!(result.is_err());
    }
}
