use pest::iterators::Pair;

use super::Rule;

/// Binary operators connecting two sub-expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryVerb {
    Add,
    Sub,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    And,
    Or,
}

impl BinaryVerb {
    pub fn from_str(verb: &str) -> BinaryVerb {
        match verb {
            "+" => BinaryVerb::Add,
            "-" => BinaryVerb::Sub,
            "==" => BinaryVerb::Equal,
            "!=" => BinaryVerb::NotEqual,
            "<" => BinaryVerb::LessThan,
            "<=" => BinaryVerb::LessEqual,
            ">" => BinaryVerb::GreaterThan,
            ">=" => BinaryVerb::GreaterEqual,
            "&&" => BinaryVerb::And,
            "||" => BinaryVerb::Or,
            verb => unreachable!("unexpected binary verb '{verb}'"),
        }
    }

    /// The operator as it appears in emitted code.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryVerb::Add => "+",
            BinaryVerb::Sub => "-",
            BinaryVerb::Equal => "==",
            BinaryVerb::NotEqual => "!=",
            BinaryVerb::LessThan => "<",
            BinaryVerb::LessEqual => "<=",
            BinaryVerb::GreaterThan => ">",
            BinaryVerb::GreaterEqual => ">=",
            BinaryVerb::And => "&&",
            BinaryVerb::Or => "||",
        }
    }
}

/// An expression within a guard, update, or return statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// An integer literal.
    Num(i64),
    /// The boolean literal `true`.
    True,
    /// A reference to a packet field, state variable, or hole variable.
    Var(String),
    /// A 2-to-1 multiplexer over two operands.
    Mux2(Box<Expression>, Box<Expression>),
    /// A 3-to-1 multiplexer over three operands.
    Mux3(Box<Expression>, Box<Expression>, Box<Expression>),
    /// A 3-to-1 multiplexer whose third input is a literal.
    Mux3WithNum(Box<Expression>, Box<Expression>, i64),
    /// Predicated zeroing of an operand.
    Opt(Box<Expression>),
    /// A synthesized constant.
    Const,
    /// A synthesized relational operator over two operands.
    RelOp(Box<Expression>, Box<Expression>),
    /// A synthesized arithmetic operator over two operands.
    ArithOp(Box<Expression>, Box<Expression>),
    /// A parenthesized sub-expression.
    Paren(Box<Expression>),
    Binary {
        verb: BinaryVerb,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
}

impl Expression {
    pub fn from_pair(pair: Pair<Rule>) -> Expression {
        match pair.as_rule() {
            Rule::or_expr => Self::fold_chain(pair, BinaryVerb::Or),
            Rule::and_expr => Self::fold_chain(pair, BinaryVerb::And),
            Rule::rel_expr => Self::from_rel_expr(pair),
            Rule::add_expr => Self::from_add_expr(pair),
            Rule::mux2 => {
                let mut inner = pair.into_inner();
                let first = Expression::from_pair(inner.next().unwrap());
                let second = Expression::from_pair(inner.next().unwrap());
                Expression::Mux2(Box::new(first), Box::new(second))
            }
            Rule::mux3 => {
                let mut inner = pair.into_inner();
                let first = Expression::from_pair(inner.next().unwrap());
                let second = Expression::from_pair(inner.next().unwrap());
                let third = Expression::from_pair(inner.next().unwrap());

                // A literal third input selects the specialized variant,
                // whose helper bakes the literal in instead of taking a
                // third operand.
                if let Expression::Num(num) = third {
                    Expression::Mux3WithNum(Box::new(first), Box::new(second), num)
                } else {
                    Expression::Mux3(Box::new(first), Box::new(second), Box::new(third))
                }
            }
            Rule::opt_fn => {
                let mut inner = pair.into_inner();
                let operand = Expression::from_pair(inner.next().unwrap());
                Expression::Opt(Box::new(operand))
            }
            Rule::const_fn => Expression::Const,
            Rule::rel_op_fn => {
                let mut inner = pair.into_inner();
                let first = Expression::from_pair(inner.next().unwrap());
                let second = Expression::from_pair(inner.next().unwrap());
                Expression::RelOp(Box::new(first), Box::new(second))
            }
            Rule::arith_op_fn => {
                let mut inner = pair.into_inner();
                let first = Expression::from_pair(inner.next().unwrap());
                let second = Expression::from_pair(inner.next().unwrap());
                Expression::ArithOp(Box::new(first), Box::new(second))
            }
            Rule::paren => {
                let mut inner = pair.into_inner();
                let expression = Expression::from_pair(inner.next().unwrap());
                Expression::Paren(Box::new(expression))
            }
            Rule::true_lit => Expression::True,
            Rule::num => Expression::Num(pair.as_str().parse::<i64>().expect("number too large")),
            Rule::ident => Expression::Var(pair.as_str().to_owned()),
            rule => unreachable!("invalid expression rule '{rule:?}'"),
        }
    }

    /// Fold a `lhs (verb rhs)*` chain of same-precedence operands into a
    /// left-associative tree. A chain of length one stays unwrapped.
    fn fold_chain(pair: Pair<Rule>, verb: BinaryVerb) -> Expression {
        let mut inner = pair.into_inner();
        let mut expression = Expression::from_pair(inner.next().unwrap());

        for operand in inner {
            let rhs = Expression::from_pair(operand);
            expression = Expression::Binary {
                verb,
                lhs: Box::new(expression),
                rhs: Box::new(rhs),
            };
        }

        expression
    }

    fn from_rel_expr(pair: Pair<Rule>) -> Expression {
        let mut inner = pair.into_inner();
        let lhs = Expression::from_pair(inner.next().unwrap());

        let Some(verb) = inner.next() else {
            return lhs;
        };
        let verb = BinaryVerb::from_str(verb.as_str());
        let rhs = Expression::from_pair(inner.next().unwrap());

        Expression::Binary {
            verb,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn from_add_expr(pair: Pair<Rule>) -> Expression {
        let mut inner = pair.into_inner();
        let mut expression = Expression::from_pair(inner.next().unwrap());

        while let Some(verb) = inner.next() {
            let verb = BinaryVerb::from_str(verb.as_str());
            let rhs = Expression::from_pair(inner.next().unwrap());
            expression = Expression::Binary {
                verb,
                lhs: Box::new(expression),
                rhs: Box::new(rhs),
            };
        }

        expression
    }
}
