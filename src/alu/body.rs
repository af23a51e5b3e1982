use pest::iterators::Pair;

use super::{Expression, Position, Rule};

/// A single state-variable update, e.g. `state_0 = state_0 + pkt_0;`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub state_var: String,
    pub value: Expression,
    pub position: Position,
}

impl Update {
    pub fn from_pair(pair: Pair<Rule>, file: &str) -> Update {
        assert_eq!(pair.as_rule(), Rule::update);

        let (line, col) = pair.line_col();
        let mut inner = pair.into_inner();
        let state_var = inner.next().unwrap().as_str().to_owned();
        let value = Expression::from_pair(inner.next().unwrap());

        Update {
            state_var,
            value,
            position: (file.to_string(), line, col),
        }
    }
}

/// One `if`/`elif` arm: a guard expression and the updates it enables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedUpdates {
    pub guard: Expression,
    pub updates: Vec<Update>,
}

/// The body of an ALU template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AluBody {
    /// A single unconditional update (stateful only).
    Update(Update),
    /// A single return statement (stateless only).
    Return(Expression),
    /// An if/elif*/else cascade of guarded updates.
    Cascade {
        if_arm: GuardedUpdates,
        elif_arms: Vec<GuardedUpdates>,
        else_arm: Option<Vec<Update>>,
    },
}

impl AluBody {
    pub fn from_pair(pair: Pair<Rule>, file: &str) -> AluBody {
        assert_eq!(pair.as_rule(), Rule::alu_body);

        let body = pair.into_inner().next().unwrap();
        match body.as_rule() {
            Rule::update => AluBody::Update(Update::from_pair(body, file)),
            Rule::return_statement => {
                let expression = body.into_inner().next().unwrap();
                AluBody::Return(Expression::from_pair(expression))
            }
            Rule::if_cascade => Self::from_cascade(body, file),
            rule => unreachable!("invalid body rule '{rule:?}'"),
        }
    }

    fn from_cascade(pair: Pair<Rule>, file: &str) -> AluBody {
        let mut inner = pair.into_inner();

        let guard = Expression::from_pair(inner.next().unwrap());
        let updates = Self::updates_from_pair(inner.next().unwrap(), file);
        let if_arm = GuardedUpdates { guard, updates };

        let mut elif_arms = vec![];
        let mut else_arm = None;

        for arm in inner {
            match arm.as_rule() {
                Rule::elif_arm => {
                    let mut arm = arm.into_inner();
                    let guard = Expression::from_pair(arm.next().unwrap());
                    let updates = Self::updates_from_pair(arm.next().unwrap(), file);
                    elif_arms.push(GuardedUpdates { guard, updates });
                }
                Rule::else_arm => {
                    let updates = arm.into_inner().next().unwrap();
                    else_arm = Some(Self::updates_from_pair(updates, file));
                }
                rule => unreachable!("invalid cascade rule '{rule:?}'"),
            }
        }

        AluBody::Cascade {
            if_arm,
            elif_arms,
            else_arm,
        }
    }

    fn updates_from_pair(pair: Pair<Rule>, file: &str) -> Vec<Update> {
        assert_eq!(pair.as_rule(), Rule::updates);

        pair.into_inner()
            .map(|update| Update::from_pair(update, file))
            .collect()
    }
}
