//! Predicate queries over records.
//!
//! A predicate arrives as a flat list of terms. Each term is either a
//! condition `(operator, field, operand)` or a bare combinator `and` / `or`.
//! Terms combine as a strict left fold: every condition joins the expression
//! built so far with the pending combinator, `and` when none is pending.
//!
//! ```text
//! a or b c   =>  (a OR b) AND c
//! a b or c   =>  (a AND b) OR c
//! ```

use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use crate::value::Value;
use std::cmp::Ordering;
use std::fmt;

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Field equals the operand.
    EqualTo,
    /// Field differs from the operand (or is absent).
    NotEqualTo,
    /// Integer field is greater than the operand.
    GreaterThan,
    /// Integer field is greater than or equal to the operand.
    GreaterThanOrEqualTo,
    /// Integer field is less than the operand.
    LessThan,
    /// Integer field is less than or equal to the operand.
    LessThanOrEqualTo,
    /// String field contains the operand (case-sensitive).
    Contains,
}

impl Operator {
    /// All operators, in wire-name order.
    pub const ALL: [Self; 7] = [
        Self::EqualTo,
        Self::NotEqualTo,
        Self::GreaterThan,
        Self::GreaterThanOrEqualTo,
        Self::LessThan,
        Self::LessThanOrEqualTo,
        Self::Contains,
    ];

    /// Looks an operator up by its wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EqualTo => "equalTo",
            Self::NotEqualTo => "notEqualTo",
            Self::GreaterThan => "greaterThan",
            Self::GreaterThanOrEqualTo => "greaterThanOrEqualTo",
            Self::LessThan => "lessThan",
            Self::LessThanOrEqualTo => "lessThanOrEqualTo",
            Self::Contains => "contains",
        }
    }

    const fn accepts(self, operand: &Operand) -> bool {
        match self {
            Self::EqualTo | Self::NotEqualTo => true,
            Self::GreaterThan
            | Self::GreaterThanOrEqualTo
            | Self::LessThan
            | Self::LessThanOrEqualTo => matches!(operand, Operand::Int(_)),
            Self::Contains => matches!(operand, Operand::String(_)),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Integer operand (32- and 64-bit inputs alike).
    Int(i64),
    /// String operand.
    String(String),
}

impl From<i64> for Operand {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Operand {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Operand {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

/// A single `field operator operand` test.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Condition {
    field: String,
    operator: Operator,
    operand: Operand,
}

impl Condition {
    fn matches(&self, record: &Record) -> bool {
        let value = record.get(&self.field);
        match self.operator {
            Operator::EqualTo => equals(value, &self.operand),
            Operator::NotEqualTo => !equals(value, &self.operand),
            Operator::GreaterThan => compare(value, &self.operand) == Some(Ordering::Greater),
            Operator::GreaterThanOrEqualTo => matches!(
                compare(value, &self.operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::LessThan => compare(value, &self.operand) == Some(Ordering::Less),
            Operator::LessThanOrEqualTo => matches!(
                compare(value, &self.operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Contains => match (value, &self.operand) {
                (Value::String(haystack), Operand::String(needle)) => {
                    haystack.contains(needle.as_str())
                }
                _ => false,
            },
        }
    }
}

fn equals(value: &Value, operand: &Operand) -> bool {
    match (value, operand) {
        (Value::Int(a), Operand::Int(b)) => a == b,
        (Value::String(a), Operand::String(b)) => a == b,
        _ => false,
    }
}

fn compare(value: &Value, operand: &Operand) -> Option<Ordering> {
    match (value, operand) {
        (Value::Int(a), Operand::Int(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Left-deep expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Condition(Condition),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    fn matches(&self, record: &Record) -> bool {
        match self {
            Self::Condition(cond) => cond.matches(record),
            Self::And(lhs, rhs) => lhs.matches(record) && rhs.matches(record),
            Self::Or(lhs, rhs) => lhs.matches(record) || rhs.matches(record),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    And,
    Or,
}

impl Combinator {
    const fn name(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

#[derive(Debug, Clone)]
enum Token {
    Condition(Condition),
    Combinator(Combinator),
}

/// A compiled predicate. The empty query matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    expr: Option<Expr>,
}

impl Query {
    /// A query matching every record.
    #[must_use]
    pub const fn all() -> Self {
        Self { expr: None }
    }

    /// Starts building a query.
    #[must_use]
    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    /// Parses a predicate from its term list.
    ///
    /// Each term is `[operator, field, operand]` or `["and"]` / `["or"]`.
    ///
    /// # Errors
    ///
    /// - `UnknownOperator` for operator names the engine does not know
    /// - `UnsupportedType` for operands the operator does not accept
    /// - `InvalidQuery` for malformed terms or misplaced combinators
    pub fn parse(terms: &[Vec<Value>]) -> CoreResult<Self> {
        let mut builder = QueryBuilder::default();
        for term in terms {
            builder.tokens.push(parse_term(term)?);
        }
        builder.build()
    }

    /// Returns true if this query matches every record.
    #[must_use]
    pub const fn is_all(&self) -> bool {
        self.expr.is_none()
    }

    /// Tests a record against the predicate.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.expr.as_ref().is_none_or(|expr| expr.matches(record))
    }
}

fn parse_term(term: &[Value]) -> CoreResult<Token> {
    let Some(head) = term.first() else {
        return Err(CoreError::invalid_query("empty predicate term"));
    };
    let Some(name) = head.as_str() else {
        return Err(CoreError::invalid_query(format!(
            "operator must be a string, got {}",
            head.type_name()
        )));
    };

    let combinator = match name {
        "and" => Some(Combinator::And),
        "or" => Some(Combinator::Or),
        _ => None,
    };
    if let Some(combinator) = combinator {
        if term.len() != 1 {
            return Err(CoreError::invalid_query(format!(
                "'{name}' takes no operands"
            )));
        }
        return Ok(Token::Combinator(combinator));
    }

    let operator = Operator::from_name(name).ok_or_else(|| CoreError::unknown_operator(name))?;
    let [_, field, operand] = term else {
        return Err(CoreError::invalid_query(format!(
            "'{name}' expects a field name and one operand"
        )));
    };
    let Some(field) = field.as_str() else {
        return Err(CoreError::invalid_query(format!(
            "'{name}' field name must be a string"
        )));
    };
    let operand = match operand {
        Value::Int(n) => Operand::Int(*n),
        Value::String(s) => Operand::String(s.clone()),
        other => {
            return Err(CoreError::unsupported_type(format!(
                "'{name}' does not accept {} operands",
                other.type_name()
            )))
        }
    };
    if !operator.accepts(&operand) {
        return Err(CoreError::unsupported_type(format!(
            "'{name}' does not accept {} operands",
            match operand {
                Operand::Int(_) => "int",
                Operand::String(_) => "string",
            }
        )));
    }

    Ok(Token::Condition(Condition {
        field: field.to_string(),
        operator,
        operand,
    }))
}

/// Builds a [`Query`] term by term, with the same folding rules as
/// [`Query::parse`].
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    tokens: Vec<Token>,
}

impl QueryBuilder {
    fn condition(mut self, field: &str, operator: Operator, operand: Operand) -> Self {
        self.tokens.push(Token::Condition(Condition {
            field: field.to_string(),
            operator,
            operand,
        }));
        self
    }

    /// Adds `field == operand`.
    #[must_use]
    pub fn equal_to(self, field: &str, operand: impl Into<Operand>) -> Self {
        self.condition(field, Operator::EqualTo, operand.into())
    }

    /// Adds `field != operand`.
    #[must_use]
    pub fn not_equal_to(self, field: &str, operand: impl Into<Operand>) -> Self {
        self.condition(field, Operator::NotEqualTo, operand.into())
    }

    /// Adds `field > operand`.
    #[must_use]
    pub fn greater_than(self, field: &str, operand: i64) -> Self {
        self.condition(field, Operator::GreaterThan, Operand::Int(operand))
    }

    /// Adds `field >= operand`.
    #[must_use]
    pub fn greater_than_or_equal_to(self, field: &str, operand: i64) -> Self {
        self.condition(field, Operator::GreaterThanOrEqualTo, Operand::Int(operand))
    }

    /// Adds `field < operand`.
    #[must_use]
    pub fn less_than(self, field: &str, operand: i64) -> Self {
        self.condition(field, Operator::LessThan, Operand::Int(operand))
    }

    /// Adds `field <= operand`.
    #[must_use]
    pub fn less_than_or_equal_to(self, field: &str, operand: i64) -> Self {
        self.condition(field, Operator::LessThanOrEqualTo, Operand::Int(operand))
    }

    /// Adds a substring test on a string field.
    #[must_use]
    pub fn contains(self, field: &str, needle: impl Into<String>) -> Self {
        self.condition(field, Operator::Contains, Operand::String(needle.into()))
    }

    /// Joins the next condition with AND.
    #[must_use]
    pub fn and(mut self) -> Self {
        self.tokens.push(Token::Combinator(Combinator::And));
        self
    }

    /// Joins the next condition with OR.
    #[must_use]
    pub fn or(mut self) -> Self {
        self.tokens.push(Token::Combinator(Combinator::Or));
        self
    }

    /// Folds the terms into a query.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` for a leading, trailing or doubled combinator.
    pub fn build(self) -> CoreResult<Query> {
        let mut expr: Option<Expr> = None;
        let mut pending: Option<Combinator> = None;

        for token in self.tokens {
            match token {
                Token::Combinator(combinator) => {
                    if expr.is_none() {
                        return Err(CoreError::invalid_query(format!(
                            "'{}' has no left operand",
                            combinator.name()
                        )));
                    }
                    if let Some(previous) = pending {
                        return Err(CoreError::invalid_query(format!(
                            "'{}' follows '{}' without a condition between them",
                            combinator.name(),
                            previous.name()
                        )));
                    }
                    pending = Some(combinator);
                }
                Token::Condition(cond) => {
                    let leaf = Expr::Condition(cond);
                    expr = Some(match expr {
                        None => leaf,
                        Some(acc) => match pending.take().unwrap_or(Combinator::And) {
                            Combinator::And => Expr::And(Box::new(acc), Box::new(leaf)),
                            Combinator::Or => Expr::Or(Box::new(acc), Box::new(leaf)),
                        },
                    });
                }
            }
        }

        if let Some(dangling) = pending {
            return Err(CoreError::invalid_query(format!(
                "'{}' has no right operand",
                dangling.name()
            )));
        }
        Ok(Query { expr })
    }
}
