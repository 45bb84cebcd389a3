//! Condition model and the single dispatch function that decides a cell against an operator.

use crate::error::{ReclimitError, Result};
use crate::table::{parse_number, Cell};
use crate::CoercionMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Operator {
    #[default]
    NoOp,
    Equals,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Contains,
    NotContains,
}

impl Operator {
    /// Wire token used in requests and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::NoOp => "",
            Operator::Equals => "==",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::GreaterOrEqual => ">=",
            Operator::LessOrEqual => "<=",
            Operator::Contains => "contains",
            Operator::NotContains => "not contains",
        }
    }

    /// Human label shown by the form.
    pub fn label(&self) -> &'static str {
        match self {
            Operator::NoOp => "(none)",
            Operator::Equals => "Equals",
            Operator::GreaterThan => "Greater than",
            Operator::LessThan => "Less than",
            Operator::GreaterOrEqual => "Greater or equal",
            Operator::LessOrEqual => "Less or equal",
            Operator::Contains => "Contains",
            Operator::NotContains => "Not contains",
        }
    }

    pub fn iterator() -> impl Iterator<Item = Operator> {
        [
            Operator::Equals,
            Operator::GreaterThan,
            Operator::LessThan,
            Operator::GreaterOrEqual,
            Operator::LessOrEqual,
            Operator::Contains,
            Operator::NotContains,
        ]
        .iter()
        .copied()
    }

    /// True for the four ordering comparisons, which need both sides as numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Operator::GreaterThan
                | Operator::LessThan
                | Operator::GreaterOrEqual
                | Operator::LessOrEqual
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ReclimitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Ok(Operator::NoOp),
            "==" => Ok(Operator::Equals),
            ">" => Ok(Operator::GreaterThan),
            "<" => Ok(Operator::LessThan),
            ">=" => Ok(Operator::GreaterOrEqual),
            "<=" => Ok(Operator::LessOrEqual),
            "contains" => Ok(Operator::Contains),
            "not contains" => Ok(Operator::NotContains),
            other => Err(ReclimitError::Validation(format!(
                "unrecognized operator {:?} (expected one of ==, >, <, >=, <=, contains, not contains)",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Operator {
    type Error = ReclimitError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Operator> for &'static str {
    fn from(op: Operator) -> Self {
        op.as_str()
    }
}

/// What to do when a cell or literal cannot be read as a number for an ordering comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoercionPolicy {
    /// The condition is false for the offending row only.
    #[default]
    #[serde(rename = "row")]
    RowScoped,
    /// Any failure in the column disables the whole condition. Missing cells compare as NaN.
    #[serde(rename = "column")]
    ColumnScoped,
}

impl From<CoercionMode> for CoercionPolicy {
    fn from(mode: CoercionMode) -> Self {
        match mode {
            CoercionMode::Row => CoercionPolicy::RowScoped,
            CoercionMode::Column => CoercionPolicy::ColumnScoped,
        }
    }
}

impl FromStr for CoercionPolicy {
    type Err = ReclimitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "row" => Ok(CoercionPolicy::RowScoped),
            "column" => Ok(CoercionPolicy::ColumnScoped),
            other => Err(ReclimitError::Validation(format!(
                "unknown coercion policy {:?} (expected \"row\" or \"column\")",
                other
            ))),
        }
    }
}

/// `(column, operator, literal)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub literal: String,
}

impl Condition {
    pub fn new(column: impl Into<String>, operator: Operator, literal: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            operator,
            literal: literal.into(),
        }
    }

    /// An inert condition never excludes a row.
    pub fn is_inert(&self) -> bool {
        is_inert(self.operator, &self.literal)
    }
}

/// `(column, operator, literal, replacement)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRule {
    pub column: String,
    pub operator: Operator,
    pub literal: String,
    pub replacement: String,
}

impl UpdateRule {
    pub fn new(
        column: impl Into<String>,
        operator: Operator,
        literal: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            operator,
            literal: literal.into(),
            replacement: replacement.into(),
        }
    }

    pub fn is_inert(&self) -> bool {
        is_inert(self.operator, &self.literal)
    }
}

pub fn is_inert(operator: Operator, literal: &str) -> bool {
    operator == Operator::NoOp || literal.is_empty()
}

/// Result of checking one cell, before a coercion policy is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Match,
    NoMatch,
    /// The cell or the literal could not be read as a number.
    CoercionFailure,
}

/// Check one cell. `missing_as_nan` makes a missing cell compare false instead of failing
/// coercion, which is how the column-scoped policy treats gaps.
pub fn check(cell: &Cell, operator: Operator, literal: &str, missing_as_nan: bool) -> Outcome {
    if is_inert(operator, literal) {
        return Outcome::Match;
    }
    let hit = match operator {
        Operator::NoOp => true,
        Operator::Equals => cell.render() == literal,
        Operator::Contains => contains_ci(&cell.render(), literal),
        Operator::NotContains => !contains_ci(&cell.render(), literal),
        Operator::GreaterThan
        | Operator::LessThan
        | Operator::GreaterOrEqual
        | Operator::LessOrEqual => {
            let Some(rhs) = parse_number(literal) else {
                return Outcome::CoercionFailure;
            };
            let lhs = match cell.as_number() {
                Some(n) => n,
                None if missing_as_nan && cell.is_missing() => f64::NAN,
                None => return Outcome::CoercionFailure,
            };
            compare(operator, lhs, rhs)
        }
    };
    if hit {
        Outcome::Match
    } else {
        Outcome::NoMatch
    }
}

/// Decide a cell under the row-scoped policy: a coercion failure is a non-match.
pub fn evaluate(cell: &Cell, operator: Operator, literal: &str) -> bool {
    check(cell, operator, literal, false) == Outcome::Match
}

fn compare(operator: Operator, lhs: f64, rhs: f64) -> bool {
    match operator {
        Operator::GreaterThan => lhs > rhs,
        Operator::LessThan => lhs < rhs,
        Operator::GreaterOrEqual => lhs >= rhs,
        Operator::LessOrEqual => lhs <= rhs,
        _ => false,
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
