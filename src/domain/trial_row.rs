//! One row of a trials table turned into a JSON event payload.
//!
//! Experiment code keeps per-trial bookkeeping in a table (acceptance,
//! reward, effort, timings). [`TrialRow::payload`] makes a row JSON-safe:
//! missing values and non-finite floats become `null`, and the `trial`
//! column is sent as an integer.

use serde_json::{Map, Number, Value};

/// A single table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Missing value.
    Missing,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value; NaN means missing.
    Float(f64),
    /// Text value.
    Text(String),
}

impl Cell {
    fn to_json(&self) -> Value {
        match self {
            Self::Missing => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Missing, Into::into)
    }
}

/// Column filter applied when building a payload.
#[derive(Debug, Clone, Default)]
pub struct RowSelection {
    /// Keep only these columns (`None` keeps all).
    pub include: Option<Vec<String>>,
    /// Remove these columns.
    pub exclude: Option<Vec<String>>,
    /// Omit columns whose value is `null`.
    pub drop_none: bool,
}

/// An ordered set of named cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialRow {
    columns: Vec<(String, Cell)>,
}

impl TrialRow {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column, builder style.
    #[must_use]
    pub fn with(mut self, column: &str, cell: impl Into<Cell>) -> Self {
        self.columns.push((column.to_string(), cell.into()));
        self
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Builds the JSON payload for this row.
    #[must_use]
    pub fn payload(&self, selection: &RowSelection) -> Map<String, Value> {
        let mut payload = Map::new();
        for (column, cell) in &self.columns {
            if let Some(include) = &selection.include
                && !include.contains(column)
            {
                continue;
            }
            if let Some(exclude) = &selection.exclude
                && exclude.contains(column)
            {
                continue;
            }
            let value = cell.to_json();
            if value.is_null() && selection.drop_none {
                continue;
            }
            payload.insert(column.clone(), value);
        }

        if let Some(trial) = payload.get_mut("trial")
            && let Some(as_int) = super::array_header::coerce_trial(trial)
        {
            *trial = Value::from(as_int);
        }

        payload
    }
}
