use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{CostAnomalyError, CostAnomalyResult};

/// Separator between dimension values in a composite group key.
pub const GROUP_VALUE_SEPARATOR: &str = " / ";

/// Placeholder for a dimension value missing from the billing data.
pub const UNKNOWN_VALUE: &str = "unknown";

/// A billing dimension costs can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Service,
    Account,
    Region,
}

impl Dimension {
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Service => "service",
            Dimension::Account => "account",
            Dimension::Region => "region",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = CostAnomalyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "service" | "product_code" => Ok(Dimension::Service),
            "account" | "usage_account_id" => Ok(Dimension::Account),
            "region" => Ok(Dimension::Region),
            other => Err(CostAnomalyError::InvalidGrouping { name: other.to_string() }),
        }
    }
}

/// Ordered, non-empty, duplicate-free list of dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupBy(Vec<Dimension>);

impl GroupBy {
    pub fn single(dimension: Dimension) -> Self {
        Self(vec![dimension])
    }

    pub fn new(dimensions: Vec<Dimension>) -> CostAnomalyResult<Self> {
        if dimensions.is_empty() {
            return Err(CostAnomalyError::InvalidGrouping { name: String::new() });
        }
        let mut unique: Vec<Dimension> = Vec::with_capacity(dimensions.len());
        for dimension in dimensions {
            if !unique.contains(&dimension) {
                unique.push(dimension);
            }
        }
        Ok(Self(unique))
    }

    /// Parses every name before anything else happens; the first unknown name wins.
    pub fn from_names<I, S>(names: I) -> CostAnomalyResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let dimensions = names
            .into_iter()
            .map(|name| name.as_ref().parse::<Dimension>())
            .collect::<CostAnomalyResult<Vec<_>>>()?;
        Self::new(dimensions)
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Display label, e.g. `service+account`.
    pub fn label(&self) -> String {
        self.0.iter().map(Dimension::name).collect::<Vec<_>>().join("+")
    }

    /// Joins one row's dimension values into a group key, `unknown` for gaps.
    pub fn group_value<S: AsRef<str>>(values: &[Option<S>]) -> String {
        values
            .iter()
            .map(|v| match v {
                Some(s) if !s.as_ref().is_empty() => s.as_ref(),
                _ => UNKNOWN_VALUE,
            })
            .collect::<Vec<_>>()
            .join(GROUP_VALUE_SEPARATOR)
    }
}

impl Default for GroupBy {
    fn default() -> Self {
        Self::single(Dimension::Service)
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for GroupBy {
    type Err = CostAnomalyError;

    /// Accepts `service`, `service+account`, `account,region`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_names(s.split(|c: char| c == '+' || c == ','))
    }
}

impl Serialize for GroupBy {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}
