// 設定ファイル管理
//
// 差分計算の設定（YAML形式）の定義と検証を行います。
// ファイルI/Oは services::config_loader に集約しています。

use crate::core::chunk::ObjectCategory;
use crate::core::error::ConfigError;
use crate::core::identifier::is_plain_identifier;
use crate::core::naming;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// 定義テキストの比較戦略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStrategy {
    /// 元テキストの完全一致
    Exact,
    /// 空白の差異を無視
    Whitespace,
    /// トークン単位の意味的比較（識別子の引用符・大文字小文字、WHERE句の括弧を正規化）
    Semantic,
}

impl ComparisonStrategy {
    /// カテゴリの既定の比較戦略
    pub fn default_for(category: ObjectCategory) -> Self {
        match category {
            ObjectCategory::Index => ComparisonStrategy::Semantic,
            _ => ComparisonStrategy::Exact,
        }
    }
}

/// 差分計算設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// 設定ファイルのバージョン
    pub version: String,

    /// 未修飾の識別子に適用するスキーマ名
    #[serde(default = "default_schema")]
    pub default_schema: String,

    /// カテゴリ別の比較戦略（未指定のカテゴリは既定値）
    #[serde(default)]
    pub comparison: BTreeMap<ObjectCategory, ComparisonStrategy>,
}

fn default_schema() -> String {
    naming::DEFAULT_SCHEMA.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            default_schema: default_schema(),
            comparison: BTreeMap::new(),
        }
    }
}

impl Config {
    /// デフォルトの設定ファイルパス
    pub const DEFAULT_CONFIG_PATH: &'static str = naming::CONFIG_FILE;

    /// 設定の妥当性を検証
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::MissingVersion);
        }

        if !is_plain_identifier(&self.default_schema) {
            return Err(ConfigError::InvalidDefaultSchema {
                name: self.default_schema.clone(),
            });
        }

        Ok(())
    }

    /// カテゴリに適用する比較戦略
    pub fn strategy_for(&self, category: ObjectCategory) -> ComparisonStrategy {
        self.comparison
            .get(&category)
            .copied()
            .unwrap_or_else(|| ComparisonStrategy::default_for(category))
    }
}

/// std::str::FromStrトレイトの実装
impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(yaml: &str) -> Result<Self, Self::Err> {
        serde_saphyr::from_str(yaml).with_context(|| "Failed to parse config file")
    }
}
