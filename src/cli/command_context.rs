// コマンド共通コンテキスト
//
// 設定ファイル読み込みやパス解決の重複をCLI層で集約する。

use crate::core::config::Config;
use crate::services::config_loader::ConfigLoader;
use crate::services::schema_diff_detector::SchemaDiffDetectorService;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// CLIコマンド共通の実行コンテキスト
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub project_path: PathBuf,
    pub config_path: PathBuf,
    pub config: Config,
}

impl CommandContext {
    /// プロジェクトルートから設定を読み込んでコンテキストを作成
    ///
    /// 設定ファイルがない場合は既定値を使用します。
    pub fn load(project_path: PathBuf) -> Result<Self> {
        Self::load_with_config(project_path, None)
    }

    /// カスタム設定ファイルパスを指定してコンテキストを作成
    ///
    /// 明示的に指定された設定ファイルが存在しない場合はエラーになります。
    pub fn load_with_config(
        project_path: PathBuf,
        custom_config_path: Option<PathBuf>,
    ) -> Result<Self> {
        let config = match &custom_config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(anyhow!("Config file not found: {:?}", path));
                }
                ConfigLoader::from_file(path).with_context(|| "Failed to read config file")?
            }
            None => {
                let path = project_path.join(Config::DEFAULT_CONFIG_PATH);
                ConfigLoader::load_or_default(&path)
                    .with_context(|| "Failed to read config file")?
            }
        };
        let config_path = custom_config_path
            .unwrap_or_else(|| project_path.join(Config::DEFAULT_CONFIG_PATH));

        Ok(Self {
            project_path,
            config_path,
            config,
        })
    }

    /// 入力ファイルのパスを解決（相対パスはプロジェクトルート基準）
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_path.join(path)
        }
    }

    /// SDLファイルを読み込む
    pub fn read_sdl(&self, path: &Path) -> Result<String> {
        let path = self.resolve_path(path);
        if !path.exists() {
            return Err(anyhow!("SDL file not found: {:?}", path));
        }
        fs::read_to_string(&path).with_context(|| format!("Failed to read SDL file: {:?}", path))
    }

    /// 設定を反映した差分検出サービス
    pub fn detector(&self) -> SchemaDiffDetectorService {
        SchemaDiffDetectorService::from_config(&self.config)
    }
}
