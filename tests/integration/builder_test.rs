//! SQL construction integration tests.
//!
//! Pins the exact SQL text generated for the descriptor shapes the dashboard
//! sends.

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use serde_json::json;

use lakeview::query::{
    build_query, AggregateQuery, Filter, LiteralType, QueryDescriptor, SampleQuery,
};
use lakeview::schema::{FieldSpec, TableSchema};

fn access_log_schema() -> TableSchema {
    let mut fields = BTreeMap::new();
    fields.insert(
        "ds".to_string(),
        FieldSpec::string().with_derived("regexp_extract(requestdatetime, '^(.*?):', 1)"),
    );
    fields.insert(
        "transfer".to_string(),
        FieldSpec::number().with_derived("bytessent + objectsize"),
    );
    fields.insert("bucket".to_string(), FieldSpec::string());
    fields.insert("operation".to_string(), FieldSpec::string());
    fields.insert("httpstatus".to_string(), FieldSpec::string());
    fields.insert("remoteip".to_string(), FieldSpec::string());
    fields.insert("requesturi".to_string(), FieldSpec::string());
    fields.insert("bytessent".to_string(), FieldSpec::number());
    fields.insert("objectsize".to_string(), FieldSpec::number());
    fields.insert("totaltime".to_string(), FieldSpec::number());
    TableSchema {
        table: "access_logs_db.cdn_logs".to_string(),
        time_col: "ds".to_string(),
        fields,
    }
}

#[test]
fn test_table_query_aggregates_derived_column() {
    let descriptor = QueryDescriptor::Table(
        AggregateQuery::new("sum")
            .with_group_by("bucket")
            .with_agg_col("transfer"),
    );
    let sql = build_query(&descriptor, &access_log_schema()).unwrap();
    assert_eq!(
        sql,
        "SELECT bucket, sum(bytessent + objectsize) as transfer_sum_agg \
         FROM access_logs_db.cdn_logs GROUP BY 1"
    );
}

#[test]
fn test_aggregate_without_group_by_has_no_group_clause() {
    let descriptor = QueryDescriptor::Table(AggregateQuery::new("max").with_agg_col("totaltime"));
    let sql = build_query(&descriptor, &access_log_schema()).unwrap();
    assert_eq!(
        sql,
        "SELECT max(totaltime) as totaltime_max_agg FROM access_logs_db.cdn_logs"
    );
}

#[test]
fn test_timeseries_prepends_derived_time_column() {
    let descriptor = QueryDescriptor::Timeseries(AggregateQuery::new("avg").with_agg_col("totaltime"));
    let sql = build_query(&descriptor, &access_log_schema()).unwrap();
    assert_eq!(
        sql,
        "SELECT regexp_extract(requestdatetime, '^(.*?):', 1) as ds, \
         avg(totaltime) as totaltime_avg_agg \
         FROM access_logs_db.cdn_logs GROUP BY 1"
    );
}

#[test]
fn test_timeseries_time_column_leads_explicit_group_bys() {
    let descriptor = QueryDescriptor::Timeseries(
        AggregateQuery::new("sum")
            .with_group_by("operation")
            .with_agg_col("transfer"),
    );
    let sql = build_query(&descriptor, &access_log_schema()).unwrap();
    assert_eq!(
        sql,
        "SELECT regexp_extract(requestdatetime, '^(.*?):', 1) as ds, operation, \
         sum(bytessent + objectsize) as transfer_sum_agg \
         FROM access_logs_db.cdn_logs GROUP BY 1, 2"
    );
}

#[test]
fn test_percentile_and_custom_aggregations() {
    let descriptor = QueryDescriptor::Table(
        AggregateQuery::new("sum")
            .with_group_by("operation")
            .with_agg_col_as("totaltime", "p95")
            .with_agg_col_as("totaltime", "foo"),
    );
    let sql = build_query(&descriptor, &access_log_schema()).unwrap();
    assert_eq!(
        sql,
        "SELECT operation, approx_percentile(totaltime, 0.95) as totaltime_p95_agg, \
         foo(totaltime) as totaltime_foo_agg \
         FROM access_logs_db.cdn_logs GROUP BY 1"
    );
}

#[test]
fn test_every_percentile_shorthand_gets_its_fraction() {
    let descriptor = QueryDescriptor::Table(
        AggregateQuery::new("sum")
            .with_agg_col_as("totaltime", "p75")
            .with_agg_col_as("totaltime", "p90")
            .with_agg_col_as("totaltime", "p99"),
    );
    let sql = build_query(&descriptor, &access_log_schema()).unwrap();
    assert!(sql.contains("approx_percentile(totaltime, 0.75) as totaltime_p75_agg"));
    assert!(sql.contains("approx_percentile(totaltime, 0.90) as totaltime_p90_agg"));
    assert!(sql.contains("approx_percentile(totaltime, 0.99) as totaltime_p99_agg"));
}

#[test]
fn test_filters_substitute_derived_expressions() {
    let descriptor = QueryDescriptor::Table(
        AggregateQuery::new("sum")
            .with_group_by("bucket")
            .with_agg_col("bytessent")
            .with_filter(Filter::new("transfer", ">", json!(1048576)))
            .with_filter(
                Filter::new("operation", "=", json!("REST.GET.OBJECT"))
                    .with_value_type(LiteralType::String),
            ),
    );
    let sql = build_query(&descriptor, &access_log_schema()).unwrap();
    assert_eq!(
        sql,
        "SELECT bucket, sum(bytessent) as bytessent_sum_agg \
         FROM access_logs_db.cdn_logs \
         WHERE bytessent + objectsize > 1048576 AND operation = 'REST.GET.OBJECT' \
         GROUP BY 1"
    );
}

#[test]
fn test_samples_query_selects_derived_columns_with_alias() {
    let descriptor =
        QueryDescriptor::Samples(SampleQuery::new(["remoteip", "requesturi", "transfer"]));
    let sql = build_query(&descriptor, &access_log_schema()).unwrap();
    assert_eq!(
        sql,
        "SELECT remoteip, requesturi, bytessent + objectsize as transfer \
         FROM access_logs_db.cdn_logs"
    );
}

#[test]
fn test_samples_with_tuple_filter_and_order_by() {
    let descriptor = QueryDescriptor::Samples(
        SampleQuery::new(["requesturi", "httpstatus"])
            .with_filter(
                Filter::new("httpstatus", "IN", json!(["500", "503"]))
                    .with_value_type(LiteralType::tuple_of(LiteralType::String)),
            )
            .with_order_by("ds"),
    );
    let sql = build_query(&descriptor, &access_log_schema()).unwrap();
    assert_eq!(
        sql,
        "SELECT requesturi, httpstatus FROM access_logs_db.cdn_logs \
         WHERE httpstatus IN ('500', '503') \
         ORDER BY regexp_extract(requestdatetime, '^(.*?):', 1)"
    );
}

#[test]
fn test_array_literal_in_filter() {
    let descriptor = QueryDescriptor::Samples(
        SampleQuery::new(["requesturi"]).with_filter(
            Filter::new("operation", "=", json!(["REST.GET.OBJECT", "REST.PUT.OBJECT"]))
                .with_value_type(LiteralType::array_of(LiteralType::String)),
        ),
    );
    let sql = build_query(&descriptor, &access_log_schema()).unwrap();
    assert_eq!(
        sql,
        "SELECT requesturi FROM access_logs_db.cdn_logs \
         WHERE operation = ARRAY ['REST.GET.OBJECT', 'REST.PUT.OBJECT']"
    );
}

#[test]
fn test_group_by_ordinals_cover_every_group_column() {
    let descriptor = QueryDescriptor::Table(
        AggregateQuery::new("sum")
            .with_group_by("bucket")
            .with_group_by("operation")
            .with_group_by("httpstatus")
            .with_agg_col("transfer"),
    );
    let sql = build_query(&descriptor, &access_log_schema()).unwrap();
    assert!(sql.ends_with("GROUP BY 1, 2, 3"), "got: {sql}");
}

#[test]
fn test_order_by_follows_group_by_on_aggregates() {
    let descriptor = QueryDescriptor::Table(
        AggregateQuery::new("sum")
            .with_group_by("bucket")
            .with_agg_col("transfer")
            .with_order_by("bucket"),
    );
    let sql = build_query(&descriptor, &access_log_schema()).unwrap();
    assert_eq!(
        sql,
        "SELECT bucket, sum(bytessent + objectsize) as transfer_sum_agg \
         FROM access_logs_db.cdn_logs GROUP BY 1 ORDER BY bucket"
    );
}

#[test]
fn test_descriptor_round_trips_through_json() {
    // The exact envelope an observer client sends.
    let descriptor: QueryDescriptor = serde_json::from_value(json!({
        "type": "table",
        "groupByCols": ["bucket"],
        "aggCols": [{"name": "transfer"}],
        "defaultAgg": "sum",
        "filters": [],
    }))
    .unwrap();
    let sql = build_query(&descriptor, &access_log_schema()).unwrap();
    assert_eq!(
        sql,
        "SELECT bucket, sum(bytessent + objectsize) as transfer_sum_agg \
         FROM access_logs_db.cdn_logs GROUP BY 1"
    );
}
