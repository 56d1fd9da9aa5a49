//! Command-line argument parsing for Lakeview.
//!
//! Uses clap to parse CLI arguments. Flags override the corresponding
//! settings from the config file.

use crate::config::Config;
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

/// An operator dashboard server for ad-hoc log analytics.
#[derive(Parser, Debug)]
#[command(name = "lakeview")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short = 'l', long, value_name = "ADDR")]
    pub listen: Option<IpAddr>,

    /// Port to listen on (0 picks a free port)
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Query gateway endpoint
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Use an in-process mock query service (for development and testing)
    #[arg(long)]
    pub mock_service: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Applies CLI overrides on top of the loaded config.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(endpoint) = &self.endpoint {
            config.service.endpoint = Some(endpoint.clone());
        }
    }
}
