//! Filter and update pipelines over an in-memory [`Table`].
//!
//! Both pipelines are synchronous and pure: they read the input table, never mutate it, and
//! return a new table truncated to the row cap. The coercion policy is carried by [`Engine`];
//! the free functions [`filter`], [`update`] and [`count`] use the default row-scoped policy.

use crate::condition::{check, CoercionPolicy, Condition, Operator, Outcome, UpdateRule};
use crate::error::{ReclimitError, Result};
use crate::table::{Cell, Row, Table};
use std::fmt;
use std::num::NonZeroUsize;
use tracing::{debug, warn};

/// Maximum number of rows kept in a result. `None` keeps every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowCap(Option<NonZeroUsize>);

impl RowCap {
    pub const UNLIMITED: RowCap = RowCap(None);

    pub fn new(limit: usize) -> Result<Self> {
        NonZeroUsize::new(limit)
            .map(|n| RowCap(Some(n)))
            .ok_or_else(|| ReclimitError::Validation("max rows must be a positive integer".into()))
    }

    /// Parse user input. Blank means no limit; zero, negative or non-numeric input is rejected.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::UNLIMITED);
        }
        match trimmed.parse::<i64>() {
            Ok(n) => Self::from_wire(Some(n)),
            Err(_) => Err(ReclimitError::Validation(format!(
                "max rows must be a positive integer, got {:?}",
                trimmed
            ))),
        }
    }

    /// Cap as it arrives in a request (`null` or an integer).
    pub fn from_wire(value: Option<i64>) -> Result<Self> {
        match value {
            None => Ok(Self::UNLIMITED),
            Some(n) if n > 0 => Self::new(n as usize),
            Some(n) => Err(ReclimitError::Validation(format!(
                "max rows must be a positive integer, got {}",
                n
            ))),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.0.map(NonZeroUsize::get)
    }

    pub fn is_unlimited(&self) -> bool {
        self.0.is_none()
    }

    /// Size of a result of `len` rows after capping.
    pub fn apply(&self, len: usize) -> usize {
        self.limit().map_or(len, |cap| len.min(cap))
    }
}

impl fmt::Display for RowCap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.limit() {
            Some(n) => write!(f, "{}", n),
            None => f.write_str("unlimited"),
        }
    }
}

/// A condition bound to a column position, with the policy decision already taken.
struct BoundCondition<'a> {
    column: usize,
    operator: Operator,
    literal: &'a str,
    /// Disabled by a column-scoped coercion failure; admits every row.
    bypass: bool,
}

impl BoundCondition<'_> {
    fn admits(&self, row: &Row, missing_as_nan: bool) -> bool {
        if self.bypass {
            return true;
        }
        row.get(self.column)
            .map(|cell| check(cell, self.operator, self.literal, missing_as_nan) == Outcome::Match)
            .unwrap_or(false)
    }
}

/// Pipeline runner carrying the coercion policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Engine {
    pub policy: CoercionPolicy,
}

impl Engine {
    pub fn new(policy: CoercionPolicy) -> Self {
        Self { policy }
    }

    fn missing_as_nan(&self) -> bool {
        self.policy == CoercionPolicy::ColumnScoped
    }

    /// True when the column-scoped policy disables this check for the current column contents.
    fn column_bypassed<'a>(
        &self,
        mut cells: impl Iterator<Item = &'a Cell>,
        operator: Operator,
        literal: &str,
    ) -> bool {
        if self.policy != CoercionPolicy::ColumnScoped || !operator.is_numeric() {
            return false;
        }
        cells.any(|cell| check(cell, operator, literal, true) == Outcome::CoercionFailure)
    }

    /// Bind conditions to column positions. `None` when a column is missing, which admits nothing.
    fn bind<'a>(&self, table: &Table, conditions: &'a [Condition]) -> Option<Vec<BoundCondition<'a>>> {
        let mut bound = Vec::with_capacity(conditions.len());
        for condition in conditions {
            let Some(column) = table.column_index(&condition.column) else {
                debug!(column = %condition.column, "filter references an unknown column");
                return None;
            };
            if condition.is_inert() {
                continue;
            }
            let bypass = self.column_bypassed(
                table.column(column),
                condition.operator,
                &condition.literal,
            );
            if bypass {
                warn!(
                    column = %condition.column,
                    operator = %condition.operator,
                    literal = %condition.literal,
                    "non-numeric values in column, condition not applied"
                );
            }
            bound.push(BoundCondition {
                column,
                operator: condition.operator,
                literal: &condition.literal,
                bypass,
            });
        }
        Some(bound)
    }

    fn admitted<'t>(
        &self,
        table: &'t Table,
        conditions: &'t [Condition],
    ) -> Box<dyn Iterator<Item = &'t Row> + 't> {
        let Some(bound) = self.bind(table, conditions) else {
            return Box::new(std::iter::empty());
        };
        let missing_as_nan = self.missing_as_nan();
        Box::new(
            table
                .rows()
                .iter()
                .filter(move |row| bound.iter().all(|c| c.admits(row, missing_as_nan))),
        )
    }

    /// Keep the rows for which every condition holds, in original order, up to `cap`.
    pub fn filter(&self, table: &Table, conditions: &[Condition], cap: RowCap) -> Table {
        let admitted = self.admitted(table, conditions);
        let rows: Vec<Row> = match cap.limit() {
            Some(n) => admitted.take(n).cloned().collect(),
            None => admitted.cloned().collect(),
        };
        debug!(
            input_rows = table.num_rows(),
            output_rows = rows.len(),
            conditions = conditions.len(),
            cap = %cap,
            "filter complete"
        );
        table.with_rows(rows)
    }

    /// Number of rows [`Engine::filter`] would return, without building the table.
    pub fn count(&self, table: &Table, conditions: &[Condition], cap: RowCap) -> usize {
        let admitted = self.admitted(table, conditions);
        match cap.limit() {
            Some(n) => admitted.take(n).count(),
            None => admitted.count(),
        }
    }

    /// Apply rules in order to a copy of `table`; each rule sees the writes of earlier rules.
    pub fn update(&self, table: &Table, rules: &[UpdateRule], cap: RowCap) -> Table {
        let mut working = table.clone();
        let missing_as_nan = self.missing_as_nan();
        let mut written = 0usize;

        for rule in rules {
            let Some(column) = working.column_index(&rule.column) else {
                warn!(column = %rule.column, "update rule skipped, column not found");
                continue;
            };
            if rule.is_inert() {
                continue;
            }
            if self.column_bypassed(working.column(column), rule.operator, &rule.literal) {
                warn!(
                    column = %rule.column,
                    operator = %rule.operator,
                    literal = %rule.literal,
                    "non-numeric values in column, update rule not applied"
                );
                continue;
            }
            for row in 0..working.num_rows() {
                let hit = working
                    .cell(row, column)
                    .map(|cell| check(cell, rule.operator, &rule.literal, missing_as_nan))
                    == Some(Outcome::Match);
                if hit {
                    working.set_cell(row, column, Cell::Text(rule.replacement.clone()));
                    written += 1;
                }
            }
        }

        if let Some(n) = cap.limit() {
            working.truncate(n);
        }
        debug!(
            input_rows = table.num_rows(),
            output_rows = working.num_rows(),
            rules = rules.len(),
            cells_written = written,
            cap = %cap,
            "update complete"
        );
        working
    }
}

/// [`Engine::filter`] with the default policy.
pub fn filter(table: &Table, conditions: &[Condition], cap: RowCap) -> Table {
    Engine::default().filter(table, conditions, cap)
}

/// [`Engine::update`] with the default policy.
pub fn update(table: &Table, rules: &[UpdateRule], cap: RowCap) -> Table {
    Engine::default().update(table, rules, cap)
}

/// [`Engine::count`] with the default policy.
pub fn count(table: &Table, conditions: &[Condition], cap: RowCap) -> usize {
    Engine::default().count(table, conditions, cap)
}
