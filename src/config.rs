//! Configuration management for Lakeview.
//!
//! Handles loading configuration from TOML files and environment variables:
//! the listen address, the query gateway connection and the static table
//! schema.

use crate::error::{LakeviewError, Result};
use crate::schema::{FieldSpec, TableSchema};
use crate::service::ServiceConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Main configuration structure for Lakeview.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Query service connection.
    #[serde(default)]
    pub service: ServiceSettings,

    /// Static schema of the log table.
    #[serde(default)]
    pub schema: SchemaConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_listen")]
    pub listen: IpAddr,

    /// Port to listen on. Port 0 lets the OS pick a free one.
    #[serde(default = "default_http_port")]
    pub port: u16,
}

fn default_listen() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_http_port() -> u16 {
    13337
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_http_port(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen, self.port)
    }
}

/// Query service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Base URL of the query gateway.
    pub endpoint: Option<String>,

    /// Object store location the gateway writes result CSVs under.
    pub output_location: Option<String>,

    /// Delay between status polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Gateway request timeout, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            output_location: None,
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServiceSettings {
    /// Applies environment variables as defaults for fields the config file
    /// leaves unset.
    pub fn apply_env_defaults(&mut self) {
        if self.endpoint.is_none() {
            self.endpoint = std::env::var("LAKEVIEW_ENDPOINT").ok();
        }
        if self.output_location.is_none() {
            self.output_location = std::env::var("LAKEVIEW_OUTPUT_LOCATION").ok();
        }
    }

    /// Delay between status polls as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Builds the gateway connection config, validating the endpoint URL.
    pub fn to_service_config(&self) -> Result<ServiceConfig> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            LakeviewError::config(
                "Query gateway endpoint is not configured (set service.endpoint or LAKEVIEW_ENDPOINT)",
            )
        })?;
        let url = Url::parse(endpoint)
            .map_err(|e| LakeviewError::config(format!("Invalid gateway endpoint: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(LakeviewError::config(format!(
                "Invalid scheme '{}'. Expected 'http' or 'https'",
                url.scheme()
            )));
        }

        let output_location = self.output_location.as_deref().ok_or_else(|| {
            LakeviewError::config(
                "Result output location is not configured (set service.output_location or LAKEVIEW_OUTPUT_LOCATION)",
            )
        })?;

        Ok(ServiceConfig::new(endpoint, output_location).with_timeout(self.timeout_secs))
    }
}

/// Static schema of the log table.
///
/// Only columns that need a declaration up front belong here: the time
/// column, derived columns and manual type overrides. Everything else is
/// discovered from the query service at runtime. Declaring any
/// `[schema.fields.*]` table replaces the built-in field set entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Qualified table name.
    #[serde(default = "default_table")]
    pub table: String,

    /// Column used as the time axis.
    #[serde(default = "default_time_col")]
    pub time_col: String,

    /// Statically declared columns.
    #[serde(default = "default_fields")]
    pub fields: BTreeMap<String, FieldSpec>,
}

fn default_table() -> String {
    "access_logs_db.cdn_logs".to_string()
}

fn default_time_col() -> String {
    "ds".to_string()
}

fn default_fields() -> BTreeMap<String, FieldSpec> {
    let mut fields = BTreeMap::new();
    // The time column is derived: access log timestamps carry a time-of-day
    // part that the day buckets must strip.
    fields.insert(
        "ds".to_string(),
        FieldSpec::string().with_derived("regexp_extract(requestdatetime, '^(.*?):', 1)"),
    );
    fields.insert(
        "transfer".to_string(),
        FieldSpec::number().with_derived("bytessent + objectsize"),
    );
    fields.insert("requestdatetime".to_string(), FieldSpec::string());
    fields.insert("remoteip".to_string(), FieldSpec::string());
    fields.insert("requester".to_string(), FieldSpec::string());
    fields.insert("operation".to_string(), FieldSpec::string());
    fields.insert("requesturi".to_string(), FieldSpec::string());
    fields.insert("httpstatus".to_string(), FieldSpec::string());
    fields.insert("bucket".to_string(), FieldSpec::string());
    fields.insert("bytessent".to_string(), FieldSpec::number());
    fields.insert("objectsize".to_string(), FieldSpec::number());
    fields.insert("totaltime".to_string(), FieldSpec::number());
    fields
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            time_col: default_time_col(),
            fields: default_fields(),
        }
    }
}

impl SchemaConfig {
    /// Builds and validates the table schema.
    pub fn to_schema(&self) -> Result<TableSchema> {
        let schema = TableSchema {
            table: self.table.clone(),
            time_col: self.time_col.clone(),
            fields: self.fields.clone(),
        };
        schema.validate()?;
        Ok(schema)
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lakeview")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| LakeviewError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            LakeviewError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }
}
