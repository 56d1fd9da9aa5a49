//! Table schema model and discovery.
//!
//! The schema describes one log table: its qualified name, the column used as
//! the time axis, and per-column metadata. A small set of columns is declared
//! statically in the config file (including derived expressions the service
//! cannot know about); the rest are discovered from the query service and
//! merged in behind the static declarations.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::ResultCache;
use crate::error::{LakeviewError, Result};
use crate::service::SharedQueryService;

/// Coarse column type as exposed to dashboard clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
}

/// Metadata for a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// SQL expression this column is computed from. Columns without a derived
    /// expression are read directly from the table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived: Option<String>,
}

impl FieldSpec {
    /// Creates a plain string column.
    pub fn string() -> Self {
        Self {
            field_type: FieldType::String,
            derived: None,
        }
    }

    /// Creates a plain numeric column.
    pub fn number() -> Self {
        Self {
            field_type: FieldType::Number,
            derived: None,
        }
    }

    /// Attaches a derived SQL expression to the column.
    pub fn with_derived(mut self, expr: impl Into<String>) -> Self {
        self.derived = Some(expr.into());
        self
    }
}

/// Schema of the log table queries are built against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    /// Qualified table name, e.g. `access_logs_db.cdn_logs`.
    pub table: String,
    /// Column used as the time axis of timeseries queries.
    pub time_col: String,
    /// Column metadata keyed by column name.
    pub fields: BTreeMap<String, FieldSpec>,
}

impl TableSchema {
    /// Checks the structural invariants of the schema.
    ///
    /// The time column must be declared in `fields` and must be a string
    /// column, since timeseries queries group by its textual value.
    pub fn validate(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(LakeviewError::config("Schema table must not be empty"));
        }
        match self.fields.get(&self.time_col) {
            None => Err(LakeviewError::config(format!(
                "Schema time column '{}' is not declared in fields",
                self.time_col
            ))),
            Some(spec) if spec.field_type != FieldType::String => {
                Err(LakeviewError::config(format!(
                    "Schema time column '{}' must be a string column",
                    self.time_col
                )))
            }
            Some(_) => Ok(()),
        }
    }

    /// Resolves a column name to the SQL expression that produces it: the
    /// derived expression when one is declared, otherwise the name itself.
    /// Returns [`None`] for columns the schema does not declare.
    pub fn resolve<'a>(&'a self, col: &'a str) -> Option<&'a str> {
        self.fields
            .get(col)
            .map(|spec| spec.derived.as_deref().unwrap_or(col))
    }

    /// Merges discovered columns into this schema. Static declarations win
    /// over discovered ones, so derived expressions and manual type overrides
    /// survive discovery.
    pub fn merged_with(&self, discovered: BTreeMap<String, FieldSpec>) -> TableSchema {
        let mut fields = discovered;
        for (name, spec) in &self.fields {
            fields.insert(name.clone(), spec.clone());
        }
        TableSchema {
            table: self.table.clone(),
            time_col: self.time_col.clone(),
            fields,
        }
    }
}

/// Serves the table schema, merging static config with columns discovered
/// from the query service.
///
/// Discovery runs at most once per table; the merged result is kept in a
/// [`ResultCache`] so repeated lookups reuse it. A failed discovery is not
/// cached and will be retried on the next lookup.
pub struct SchemaCatalog {
    static_schema: TableSchema,
    service: SharedQueryService,
    cache: ResultCache<TableSchema>,
}

impl SchemaCatalog {
    pub fn new(static_schema: TableSchema, service: SharedQueryService) -> Self {
        Self {
            static_schema,
            service,
            cache: ResultCache::new(),
        }
    }

    /// Returns the statically configured schema without consulting the
    /// service.
    pub fn static_schema(&self) -> &TableSchema {
        &self.static_schema
    }

    /// Returns the static schema merged with columns discovered from the
    /// query service.
    pub async fn merged(&self) -> Result<TableSchema> {
        let table = self.static_schema.table.clone();
        let fetch_table = table.clone();
        let service = Arc::clone(&self.service);
        let static_schema = self.static_schema.clone();
        self.cache
            .get_or_fetch("table_schema", &table, || async move {
                let discovered = service.table_schema(&fetch_table).await?;
                Ok(static_schema.merged_with(discovered))
            })
            .await
    }
}
