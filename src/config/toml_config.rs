use crate::adapters::http::{FetchOptions, RetryPolicy};
use crate::adapters::warehouse::bigquery::{BigQueryConfig, DEFAULT_ENDPOINT};
use crate::domain::model::DomainConfig;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_identifier, validate_non_empty_string, validate_path, validate_positive_number,
    validate_required_field, validate_unique, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

/// Product lines exported when no configuration file is given.
pub const DEFAULT_DOMAINS: [&str; 3] = ["basket", "rugby", "foot"];

static ENV_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("static pattern"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    #[serde(default)]
    pub warehouse: WarehouseSettings,
    #[serde(default)]
    pub fetch: FetchSettings,
    pub domains: Vec<DomainConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseKind {
    #[default]
    Csv,
    Bigquery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseSettings {
    #[serde(default)]
    pub kind: WarehouseKind,
    #[serde(default = "default_warehouse_path")]
    pub path: String,
    pub project: Option<String>,
    pub dataset: Option<String>,
    pub access_token: Option<String>,
    pub endpoint: Option<String>,
}

fn default_warehouse_path() -> String {
    "./warehouse".to_string()
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            kind: WarehouseKind::default(),
            path: default_warehouse_path(),
            project: None,
            dataset: None,
            access_token: None,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchSettings {
    pub timeout_seconds: Option<u64>,
    pub rate_limit_base_delay_ms: Option<u64>,
    pub rate_limit_max_delay_ms: Option<u64>,
    pub rate_limit_max_retries: Option<u32>,
    pub load_partial_pages: Option<bool>,
}

impl FetchSettings {
    pub fn to_options(&self) -> FetchOptions {
        let defaults = FetchOptions::default();
        FetchOptions {
            retry: RetryPolicy {
                base_delay: self
                    .rate_limit_base_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.base_delay),
                max_delay: self
                    .rate_limit_max_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.max_delay),
                max_retries: self
                    .rate_limit_max_retries
                    .unwrap_or(defaults.retry.max_retries),
            },
            timeout: self
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            load_partial_pages: self
                .load_partial_pages
                .unwrap_or(defaults.load_partial_pages),
        }
    }
}

impl WarehouseSettings {
    pub fn bigquery_config(&self) -> Result<BigQueryConfig> {
        Ok(BigQueryConfig {
            project: validate_required_field("warehouse.project", &self.project)?.clone(),
            dataset: validate_required_field("warehouse.dataset", &self.dataset)?.clone(),
            access_token: validate_required_field("warehouse.access_token", &self.access_token)?
                .clone(),
            endpoint: self
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        })
    }
}

impl EtlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置，字串值中的 `${VAR}` 以環境變數取代
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::from_toml_str_with(content, |name| std::env::var(name).ok())
    }

    pub fn from_toml_str_with<F>(content: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let table: toml::Table = toml::from_str(content).map_err(|e| EtlError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })?;
        // 先解析再取代，環境變數的值不會被當成 TOML 語法
        let mut document = toml::Value::Table(table);
        substitute_env_vars(&mut document, &lookup)?;
        document.try_into::<Self>().map_err(|e| EtlError::ConfigError {
            message: format!("Invalid configuration: {}", e),
        })
    }

    /// The three historical domains, wired from `SHOPIFY_<NAME>_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: String| {
            lookup(&name).ok_or(EtlError::MissingConfigError { field: name })
        };

        let domains = DEFAULT_DOMAINS
            .iter()
            .map(|name| {
                let prefix = format!("SHOPIFY_{}", name.to_uppercase());
                Ok(DomainConfig {
                    name: name.to_string(),
                    table_id: format!("{}_orders", name),
                    api_url: require(format!("{}_ENDPOINT", prefix))?,
                    api_key: require(format!("{}_API_KEY", prefix))?,
                    api_password: require(format!("{}_PASSWORD", prefix))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let kind = match lookup("ETL_WAREHOUSE").as_deref() {
            None | Some("csv") => WarehouseKind::Csv,
            Some("bigquery") => WarehouseKind::Bigquery,
            Some(other) => {
                return Err(EtlError::InvalidConfigValueError {
                    field: "ETL_WAREHOUSE".to_string(),
                    value: other.to_string(),
                    reason: "Expected 'csv' or 'bigquery'".to_string(),
                })
            }
        };

        Ok(Self {
            warehouse: WarehouseSettings {
                kind,
                path: lookup("ETL_WAREHOUSE_PATH").unwrap_or_else(default_warehouse_path),
                project: lookup("BIGQUERY_PROJECT"),
                dataset: lookup("BIGQUERY_DATASET"),
                access_token: lookup("BIGQUERY_ACCESS_TOKEN"),
                endpoint: lookup("BIGQUERY_ENDPOINT"),
            },
            fetch: FetchSettings::default(),
            domains,
        })
    }

    /// Keeps the named domains, in configuration order. Empty selection keeps all.
    pub fn select_domains(&self, names: &[String]) -> Result<Vec<DomainConfig>> {
        if let Some(unknown) = names
            .iter()
            .find(|n| !self.domains.iter().any(|d| &d.name == *n))
        {
            return Err(EtlError::InvalidConfigValueError {
                field: "domain".to_string(),
                value: unknown.clone(),
                reason: format!(
                    "Unknown domain. Configured: {}",
                    self.domains
                        .iter()
                        .map(|d| d.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            });
        }

        Ok(self
            .domains
            .iter()
            .filter(|d| names.is_empty() || names.contains(&d.name))
            .cloned()
            .collect())
    }
}

/// Replaces `${VAR}` inside every string value of the parsed document.
fn substitute_env_vars<F>(value: &mut toml::Value, lookup: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        toml::Value::String(text) => {
            *text = substitute_in_str(text, lookup)?;
        }
        toml::Value::Array(items) => {
            for item in items {
                substitute_env_vars(item, lookup)?;
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                substitute_env_vars(item, lookup)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn substitute_in_str<F>(text: &str, lookup: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = None;
    let result = ENV_PLACEHOLDER.replace_all(text, |caps: &regex::Captures| {
        let var_name = &caps[1];
        lookup(var_name).unwrap_or_else(|| {
            missing.get_or_insert_with(|| var_name.to_string());
            String::new()
        })
    });

    match missing {
        Some(field) => Err(EtlError::MissingConfigError { field }),
        None => Ok(result.into_owned()),
    }
}

impl Validate for EtlConfig {
    fn validate(&self) -> Result<()> {
        if self.domains.is_empty() {
            return Err(EtlError::ConfigValidationError {
                field: "domains".to_string(),
                message: "At least one domain must be configured".to_string(),
            });
        }

        for domain in &self.domains {
            validate_non_empty_string("domains.name", &domain.name)?;
            validate_identifier("domains.table_id", &domain.table_id)?;
            validate_url("domains.api_url", &domain.api_url)?;
            validate_non_empty_string("domains.api_key", &domain.api_key)?;
            validate_non_empty_string("domains.api_password", &domain.api_password)?;
        }
        validate_unique("domains.name", self.domains.iter().map(|d| d.name.as_str()))?;
        validate_unique(
            "domains.table_id",
            self.domains.iter().map(|d| d.table_id.as_str()),
        )?;

        let options = self.fetch.to_options();
        validate_positive_number(
            "fetch.rate_limit_max_retries",
            u64::from(options.retry.max_retries),
            1,
        )?;
        if options.retry.max_delay < options.retry.base_delay {
            return Err(EtlError::ConfigValidationError {
                field: "fetch.rate_limit_max_delay_ms".to_string(),
                message: "Must not be lower than fetch.rate_limit_base_delay_ms".to_string(),
            });
        }

        match self.warehouse.kind {
            WarehouseKind::Csv => validate_path("warehouse.path", &self.warehouse.path)?,
            WarehouseKind::Bigquery => {
                let bq = self.warehouse.bigquery_config()?;
                validate_non_empty_string("warehouse.project", &bq.project)?;
                validate_identifier("warehouse.dataset", &bq.dataset)?;
                validate_non_empty_string("warehouse.access_token", &bq.access_token)?;
                validate_url("warehouse.endpoint", &bq.endpoint)?;
            }
        }

        Ok(())
    }
}
