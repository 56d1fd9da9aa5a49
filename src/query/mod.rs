//! Query descriptors and SQL construction.
//!
//! Observer clients describe what they want to see as a small JSON document
//! (a [`QueryDescriptor`]); the builder turns that document plus the table
//! schema into a single SQL statement for the query service.

pub mod builder;
pub mod literal;

use serde::{Deserialize, Serialize};

pub use builder::build_query;
pub use literal::{render_literal, LiteralType};

/// A dashboard query in descriptor form.
///
/// The `type` tag selects the shape: `table` and `timeseries` aggregate rows,
/// `samples` selects raw rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QueryDescriptor {
    /// Aggregation rendered as a table.
    Table(AggregateQuery),
    /// Aggregation bucketed along the schema's time column.
    Timeseries(AggregateQuery),
    /// Raw row sample without aggregation.
    Samples(SampleQuery),
}

/// Descriptor body shared by table and timeseries queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateQuery {
    /// Columns to group by, in order.
    #[serde(default)]
    pub group_by_cols: Vec<String>,
    /// Columns to aggregate.
    #[serde(default)]
    pub agg_cols: Vec<AggColumn>,
    /// Aggregation applied to columns that do not pick their own.
    pub default_agg: String,
    #[serde(default)]
    pub filters: Vec<Filter>,
    /// Column to order the result by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
}

impl AggregateQuery {
    pub fn new(default_agg: impl Into<String>) -> Self {
        Self {
            default_agg: default_agg.into(),
            ..Self::default()
        }
    }

    pub fn with_group_by(mut self, col: impl Into<String>) -> Self {
        self.group_by_cols.push(col.into());
        self
    }

    pub fn with_agg_col(mut self, name: impl Into<String>) -> Self {
        self.agg_cols.push(AggColumn {
            name: name.into(),
            agg: None,
        });
        self
    }

    pub fn with_agg_col_as(mut self, name: impl Into<String>, agg: impl Into<String>) -> Self {
        self.agg_cols.push(AggColumn {
            name: name.into(),
            agg: Some(agg.into()),
        });
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_order_by(mut self, col: impl Into<String>) -> Self {
        self.order_by = Some(col.into());
        self
    }
}

/// One aggregated output column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggColumn {
    /// Schema column to aggregate.
    pub name: String,
    /// Aggregation for this column; falls back to the query's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agg: Option<String>,
}

/// Descriptor body of a samples query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleQuery {
    /// Columns to select, in order.
    pub cols: Vec<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    /// Column to order the result by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
}

impl SampleQuery {
    pub fn new<I, S>(cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cols: cols.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_order_by(mut self, col: impl Into<String>) -> Self {
        self.order_by = Some(col.into());
        self
    }
}

/// One WHERE predicate in descriptor form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    /// Schema column the predicate applies to.
    pub col: String,
    /// SQL comparison operator, e.g. `=` or `IN`.
    pub op: String,
    /// Right-hand side value.
    pub value: serde_json::Value,
    /// Declared literal type of `value`; untyped values render raw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<LiteralType>,
}

impl Filter {
    pub fn new(col: impl Into<String>, op: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            col: col.into(),
            op: op.into(),
            value,
            value_type: None,
        }
    }

    pub fn with_value_type(mut self, value_type: LiteralType) -> Self {
        self.value_type = Some(value_type);
        self
    }
}
