//! Application configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration, loadable from a JSON file. Every field has a
/// default so partial config files work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoxConfig {
    pub storage: StorageConfig,
    pub analysis: AnalysisConfig,
    pub output: OutputConfig,
}

/// Where invoices live in S3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Bucket receiving synced invoice files.
    pub bucket: String,
    /// AWS region; falls back to the environment when empty.
    pub region: Option<String>,
    /// Key prefix for synced objects.
    pub prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: None,
            prefix: "invoices".to_string(),
        }
    }
}

/// Analysis job polling, parallelism, and custom queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Seconds between job status checks.
    pub poll_interval_secs: u64,
    /// Give up on a job after this many seconds.
    pub max_wait_secs: u64,
    /// Documents analyzed concurrently.
    pub max_parallel: usize,
    /// Custom questions submitted with each analysis job. An empty list
    /// disables the queries feature entirely.
    pub queries: Vec<QueryConfig>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            max_wait_secs: 600,
            max_parallel: 3,
            queries: vec![
                QueryConfig::new("What is the invoice number?", "INVOICE_NUMBER"),
                QueryConfig::new("What is the invoice date?", "INVOICE_DATE"),
                QueryConfig::new("What is the total amount?", "TOTAL_AMOUNT"),
                QueryConfig::new("What is the payment terms?", "PAYMENT_TERMS"),
            ],
        }
    }
}

/// One custom question with its answer alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub text: String,
    #[serde(default)]
    pub alias: Option<String>,
}

impl QueryConfig {
    fn new(text: &str, alias: &str) -> Self {
        Self {
            text: text.to_string(),
            alias: Some(alias.to_string()),
        }
    }
}

/// What gets written next to each processed invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for extracted records and reports.
    pub output_dir: PathBuf,
    /// Write a per-invoice markdown report.
    pub write_reports: bool,
    /// Keep the raw block set next to each record for offline re-runs.
    pub keep_blocks: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            write_reports: true,
            keep_blocks: false,
        }
    }
}

impl InvoxConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config {}: {}", path.display(), e))?;
        let config = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("failed to parse config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Save configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .map_err(|e| anyhow::anyhow!("failed to write config {}: {}", path.display(), e))?;
        Ok(())
    }

    /// Load from the given path, or defaults when none is given and no
    /// file exists at the conventional location.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::from_file(Path::new(p)),
            None => {
                let default = default_config_path();
                if default.exists() {
                    Self::from_file(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Conventional config location: `invox.json` in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("invox.json")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = InvoxConfig::default();
        assert_eq!(config.analysis.poll_interval_secs, 5);
        assert_eq!(config.analysis.max_parallel, 3);
        assert_eq!(config.storage.prefix, "invoices");
        assert!(config.output.write_reports);
        assert_eq!(config.analysis.queries.len(), 4);
        assert_eq!(config.analysis.queries[0].text, "What is the invoice number?");
        assert_eq!(
            config.analysis.queries[0].alias.as_deref(),
            Some("INVOICE_NUMBER")
        );
    }

    #[test]
    fn queries_can_be_disabled_or_replaced() {
        let disabled: InvoxConfig =
            serde_json::from_str(r#"{"analysis": {"queries": []}}"#).unwrap();
        assert!(disabled.analysis.queries.is_empty());

        let custom: InvoxConfig = serde_json::from_str(
            r#"{"analysis": {"queries": [{"text": "What is the PO number?"}]}}"#,
        )
        .unwrap();
        assert_eq!(custom.analysis.queries.len(), 1);
        assert_eq!(custom.analysis.queries[0].alias, None);
    }

    #[test]
    fn partial_config_files_fill_in_defaults() {
        let config: InvoxConfig =
            serde_json::from_str(r#"{"storage": {"bucket": "my-invoices"}}"#).unwrap();
        assert_eq!(config.storage.bucket, "my-invoices");
        assert_eq!(config.storage.prefix, "invoices");
        assert_eq!(config.analysis.max_wait_secs, 600);
    }

    #[test]
    fn config_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invox.json");

        let mut config = InvoxConfig::default();
        config.storage.bucket = "bucket-a".to_string();
        config.analysis.max_parallel = 8;
        config.save(&path).unwrap();

        let back = InvoxConfig::from_file(&path).unwrap();
        assert_eq!(back, config);
    }
}
