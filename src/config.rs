use crate::constants;
use crate::error::{Result, SummaryError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub tables: TableNames,
    pub ingest: IngestConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

/// Names of the fact tables inside the store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub purchases: String,
    pub sales: String,
    pub vendor_invoice: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub file_name: String,
    /// Default filter directive when RUST_LOG is unset.
    pub level: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MetricsConfig {
    /// When set, the Prometheus exposition text is written here at the end of a run.
    pub textfile: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::DEFAULT_STORE_PATH),
        }
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            purchases: constants::PURCHASES_TABLE.to_string(),
            sales: constants::SALES_TABLE.to_string(),
            vendor_invoice: constants::VENDOR_INVOICE_TABLE.to_string(),
        }
    }
}

impl TableNames {
    pub fn table_for(&self, kind: crate::types::FactKind) -> &str {
        use crate::types::FactKind;
        match kind {
            FactKind::Purchase => &self.purchases,
            FactKind::Sales => &self.sales,
            FactKind::VendorInvoice => &self.vendor_invoice,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(constants::DEFAULT_DATA_DIR),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::DEFAULT_OUTPUT_PATH),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(constants::DEFAULT_LOG_DIR),
            file_name: constants::DEFAULT_LOG_FILE.to_string(),
            level: "vendor_summary=info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicitly given file must exist. Without one, `vendor_summary.toml` in the
    /// working directory is used when present, otherwise the built-in defaults.
    /// Environment overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(constants::DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SummaryError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_path(constants::ENV_STORE) {
            self.store.path = v;
        }
        if let Some(v) = env_path(constants::ENV_OUTPUT) {
            self.export.path = v;
        }
        if let Some(v) = env_path(constants::ENV_DATA_DIR) {
            self.ingest.data_dir = v;
        }
        if let Some(v) = env_path(constants::ENV_LOG_DIR) {
            self.logging.dir = v;
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v.trim())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [tables]
            sales = "Sales"

            [export]
            path = "out/summary.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.tables.sales, "Sales");
        assert_eq!(config.tables.purchases, constants::PURCHASES_TABLE);
        assert_eq!(config.export.path, PathBuf::from("out/summary.csv"));
        assert_eq!(config.store.path, PathBuf::from(constants::DEFAULT_STORE_PATH));
        assert!(config.metrics.textfile.is_none());
    }

    #[test]
    fn missing_explicit_file_is_a_config_error() {
        let err = Config::load(Some(Path::new("/nonexistent/vendor_summary.toml"))).unwrap_err();
        assert!(matches!(err, SummaryError::Config(_)));
    }

    #[test]
    fn invalid_toml_is_rejected() {
        assert!(matches!(
            Config::from_toml("[store\npath = 1"),
            Err(SummaryError::Toml(_))
        ));
    }
}
