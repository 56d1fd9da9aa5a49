//! Turns query descriptors into SQL statements.
//!
//! All three query shapes produce a single-line statement. Column references
//! are resolved against the schema first: a derived column contributes its
//! SQL expression wherever it appears (select list, aggregates, filters,
//! ordering) and is aliased back to its name only in the select list.
//! Aggregated grouping relies on select-list ordinals, so group-by columns
//! always lead the select list.

use crate::error::{LakeviewError, Result};
use crate::schema::TableSchema;

use super::literal::render_literal;
use super::{AggregateQuery, Filter, QueryDescriptor, SampleQuery};

/// Builds the SQL text for a descriptor against a schema.
///
/// Every column the descriptor references must be declared in the schema;
/// an unresolvable reference is a build error, as is a descriptor that
/// selects nothing.
pub fn build_query(descriptor: &QueryDescriptor, schema: &TableSchema) -> Result<String> {
    match descriptor {
        QueryDescriptor::Table(query) => build_aggregate(query, schema, false),
        QueryDescriptor::Timeseries(query) => build_aggregate(query, schema, true),
        QueryDescriptor::Samples(query) => build_samples(query, schema),
    }
}

fn build_aggregate(query: &AggregateQuery, schema: &TableSchema, timeseries: bool) -> Result<String> {
    let mut group_by_cols: Vec<&str> = Vec::new();
    // Timeseries queries bucket along the time column, unless the client
    // already groups by it explicitly.
    if timeseries && !query.group_by_cols.iter().any(|c| c == &schema.time_col) {
        group_by_cols.push(&schema.time_col);
    }
    group_by_cols.extend(query.group_by_cols.iter().map(String::as_str));

    let mut selects = Vec::new();
    for col in &group_by_cols {
        selects.push(select_item(col, schema)?);
    }
    for agg_col in &query.agg_cols {
        let agg = agg_col.agg.as_deref().unwrap_or(&query.default_agg);
        if agg.is_empty() {
            return Err(LakeviewError::build(format!(
                "No aggregation given for column '{}'",
                agg_col.name
            )));
        }
        let expr = resolve_column(&agg_col.name, schema)?;
        selects.push(format!(
            "{} as {}_{}_agg",
            aggregate_expr(expr, agg),
            agg_col.name,
            agg
        ));
    }
    if selects.is_empty() {
        return Err(LakeviewError::build("Query selects no columns"));
    }

    let mut sql = format!("SELECT {} FROM {}", selects.join(", "), schema.table);
    if let Some(clause) = where_clause(&query.filters, schema)? {
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
    }
    if !group_by_cols.is_empty() {
        let ordinals: Vec<String> = (1..=group_by_cols.len()).map(|n| n.to_string()).collect();
        sql.push_str(" GROUP BY ");
        sql.push_str(&ordinals.join(", "));
    }
    if let Some(order_by) = &query.order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(resolve_column(order_by, schema)?);
    }
    Ok(sql)
}

fn build_samples(query: &SampleQuery, schema: &TableSchema) -> Result<String> {
    let mut selects = Vec::with_capacity(query.cols.len());
    for col in &query.cols {
        selects.push(select_item(col, schema)?);
    }
    if selects.is_empty() {
        return Err(LakeviewError::build("Query selects no columns"));
    }

    let mut sql = format!("SELECT {} FROM {}", selects.join(", "), schema.table);
    if let Some(clause) = where_clause(&query.filters, schema)? {
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
    }
    if let Some(order_by) = &query.order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(resolve_column(order_by, schema)?);
    }
    Ok(sql)
}

/// Select-list entry for a plainly selected column. Derived columns spell out
/// their expression and alias it back to the column name.
fn select_item(col: &str, schema: &TableSchema) -> Result<String> {
    let spec = schema
        .fields
        .get(col)
        .ok_or_else(|| unknown_column(col))?;
    Ok(match &spec.derived {
        Some(expr) => format!("{expr} as {col}"),
        None => col.to_string(),
    })
}

/// Resolves a column to the expression it stands for, failing on columns the
/// schema does not declare.
fn resolve_column<'a>(col: &'a str, schema: &'a TableSchema) -> Result<&'a str> {
    schema.resolve(col).ok_or_else(|| unknown_column(col))
}

fn unknown_column(col: &str) -> LakeviewError {
    LakeviewError::build(format!("Column '{col}' is not declared in the schema"))
}

/// Aggregate call for one column expression. Percentile shorthands map onto
/// `approx_percentile` with the matching fraction; any other name is applied
/// as a plain SQL function.
fn aggregate_expr(expr: &str, agg: &str) -> String {
    match agg {
        "p75" => format!("approx_percentile({expr}, 0.75)"),
        "p90" => format!("approx_percentile({expr}, 0.90)"),
        "p95" => format!("approx_percentile({expr}, 0.95)"),
        "p99" => format!("approx_percentile({expr}, 0.99)"),
        _ => format!("{agg}({expr})"),
    }
}

/// Conjunction of the resolved filter predicates, or [`None`] when the
/// descriptor carries no filters (the WHERE clause is omitted entirely).
fn where_clause(filters: &[Filter], schema: &TableSchema) -> Result<Option<String>> {
    if filters.is_empty() {
        return Ok(None);
    }
    let mut predicates = Vec::with_capacity(filters.len());
    for filter in filters {
        let expr = resolve_column(&filter.col, schema)?;
        let literal = render_literal(&filter.value, filter.value_type.as_ref());
        predicates.push(format!("{} {} {}", expr, filter.op, literal));
    }
    Ok(Some(predicates.join(" AND ")))
}
