// 設定ファイル読み込みサービス
//
// core::config の純粋性を保つため、ファイルI/Oはこのサービスに集約する。

use crate::core::config::Config;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// 設定ファイル読み込みサービス
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// YAMLファイルから設定を読み込み、妥当性を検証する
    pub fn from_file(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = content.parse()?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {:?}", path))?;

        debug!(
            path = %path.display(),
            default_schema = %config.default_schema,
            overrides = config.comparison.len(),
            "Loaded config file"
        );
        Ok(config)
    }

    /// デフォルトパスから設定を読み込む
    pub fn load_default() -> Result<Config> {
        let path = Path::new(Config::DEFAULT_CONFIG_PATH);
        Self::from_file(path)
    }

    /// 設定ファイルがあれば読み込み、なければ既定値を返す
    pub fn load_or_default(path: &Path) -> Result<Config> {
        if path.exists() {
            Self::from_file(path)
        } else {
            debug!(path = %path.display(), "Config file not found; using defaults");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_from_file_reads_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".sdldiff.yaml");
        fs::write(&path, "version: \"1.0\"\ndefault_schema: app\n").unwrap();

        let config = ConfigLoader::from_file(&path).unwrap();
        assert_eq!(config.default_schema, "app");
    }

    #[test]
    fn test_from_file_rejects_invalid_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".sdldiff.yaml");
        fs::write(&path, "version: \"1.0\"\ndefault_schema: \"bad name\"\n").unwrap();

        assert!(ConfigLoader::from_file(&path).is_err());
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = TempDir::new().unwrap();
        let config = ConfigLoader::load_or_default(&dir.path().join("missing.yaml")).unwrap();
        assert_eq!(config, Config::default());
    }
}
