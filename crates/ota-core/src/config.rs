//! ota.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OtaConfig {
    pub storage: StorageConfig,
    pub blob: BlobConfig,
    pub hash: HashConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// redb database file.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ota.redb"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Base URL that relative blob keys are resolved against.
    pub download_url: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            download_url: "http://127.0.0.1:3000/download".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HashConfig {
    /// Concurrent file hashing workers. `None` uses the available parallelism.
    pub workers: Option<usize>,
}

impl HashConfig {
    pub fn effective_workers(&self) -> usize {
        self.workers
            .filter(|w| *w > 0)
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(4)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Entries returned by a history query.
    pub limit: usize,
    /// Rows per record family removed by one purge call.
    pub purge_batch: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: 15,
            purge_batch: 1000,
        }
    }
}

impl OtaConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: OtaConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OtaConfig::default();
        assert_eq!(config.history.limit, 15);
        assert_eq!(config.history.purge_batch, 1000);
        assert_eq!(config.storage.path, PathBuf::from("ota.redb"));
        assert!(config.hash.effective_workers() >= 1);
    }

    #[test]
    fn test_parse_partial() {
        let toml_str = r#"
[blob]
download_url = "https://cdn.example.com/ota"

[hash]
workers = 2
"#;
        let config: OtaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.blob.download_url, "https://cdn.example.com/ota");
        assert_eq!(config.hash.effective_workers(), 2);
        assert_eq!(config.history.limit, 15);
    }

    #[test]
    fn test_zero_workers_falls_back() {
        let config = HashConfig { workers: Some(0) };
        assert!(config.effective_workers() >= 1);
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = OtaConfig::default();
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("purge_batch"));
        let parsed: OtaConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.history.purge_batch, 1000);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = OtaConfig::load_or_default(&dir.path().join("ota.toml")).unwrap();
        assert_eq!(config.history.limit, 15);
    }
}
