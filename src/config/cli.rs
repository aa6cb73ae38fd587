use crate::config::toml_config::EtlConfig;
use crate::utils::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "shop-orders-etl")]
#[command(about = "Export new shop orders into warehouse tables, one table per product line")]
pub struct CliArgs {
    /// TOML configuration; without it the SHOPIFY_* environment variables are used
    #[arg(long, env = "ETL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Only run these domains (repeatable)
    #[arg(long = "domain")]
    pub domains: Vec<String>,

    #[arg(long, help = "Fetch and transform without writing to the warehouse")]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

impl CliArgs {
    pub fn load_config(&self) -> Result<EtlConfig> {
        match &self.config {
            Some(path) => {
                tracing::info!("📄 Loading configuration from {}", path.display());
                EtlConfig::from_file(path)
            }
            None => {
                tracing::info!("📄 No configuration file, reading SHOPIFY_* environment variables");
                EtlConfig::from_env()
            }
        }
    }
}
