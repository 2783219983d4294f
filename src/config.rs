use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 25;
const DEFAULT_BUFFER_TIMEOUT_SECS: u64 = 20;
const DEFAULT_EXTRACTOR_TIMEOUT_SECS: u64 = 120;
const DEFAULT_FILENAME_PREFIX: &str = "neon";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Desktop-browser identity sent with every outbound request.
    pub user_agent: String,
    /// Timeout for fetching a community-post page.
    pub page_timeout_secs: u64,
    /// Timeout for the final binary buffer fetch.
    pub buffer_timeout_secs: u64,
    /// Wall-clock cap on one metadata-extractor run.
    pub extractor_timeout_secs: u64,
    /// Prefix for synthesized download filenames.
    pub filename_prefix: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            page_timeout_secs: DEFAULT_PAGE_TIMEOUT_SECS,
            buffer_timeout_secs: DEFAULT_BUFFER_TIMEOUT_SECS,
            extractor_timeout_secs: DEFAULT_EXTRACTOR_TIMEOUT_SECS,
            filename_prefix: DEFAULT_FILENAME_PREFIX.to_string(),
        }
    }
}

pub fn load_fetch_config(path: &Path) -> Result<FetchConfig> {
    if !path.exists() {
        return Ok(FetchConfig::default());
    }
    let bytes = std::fs::read(path)?;
    let parsed: FetchConfig = serde_json::from_slice(&bytes).map_err(|e| EngineError::ConfigInvalid {
        path: path.to_string_lossy().to_string(),
        detail: e.to_string(),
    })?;
    Ok(parsed)
}

pub fn save_fetch_config(path: &Path, config: &FetchConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names_the_magic_constants() {
        let cfg = FetchConfig::default();
        assert_eq!(cfg.buffer_timeout_secs, 20);
        assert_eq!(cfg.filename_prefix, "neon");
        assert!(cfg.user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn load_missing_file_yields_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_fetch_config(&dir.path().join("absent.json")).expect("config");
        assert_eq!(cfg.buffer_timeout_secs, FetchConfig::default().buffer_timeout_secs);
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("fetch.json");

        let mut cfg = FetchConfig::default();
        cfg.buffer_timeout_secs = 5;
        cfg.filename_prefix = "batch".to_string();
        save_fetch_config(&path, &cfg).expect("save");

        let loaded = load_fetch_config(&path).expect("load");
        assert_eq!(loaded.buffer_timeout_secs, 5);
        assert_eq!(loaded.filename_prefix, "batch");
    }

    #[test]
    fn load_malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fetch.json");
        std::fs::write(&path, "not json").expect("write");

        let err = load_fetch_config(&path).expect_err("malformed config must fail");
        assert!(matches!(err, EngineError::ConfigInvalid { .. }));
    }
}
