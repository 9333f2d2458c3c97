//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。
//! 解析错误附带 `行:列`，TOML 由 span 偏移换算，JSON 直接取自 serde_json。

use std::fmt;
use std::path::Path;

use contracts::{ContractError, ReaderBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式 (不区分大小写)
    pub fn from_extension(ext: &str) -> Option<Self> {
        [Self::Toml, Self::Json]
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(ext))
    }

    /// 从文件路径推断格式
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| {
                ContractError::config_parse(format!(
                    "unsupported config file '{}': expected .toml or .json",
                    path.display()
                ))
            })
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }

    /// 反序列化为 [`ReaderBlueprint`] (不做校验)
    pub fn parse(self, content: &str) -> Result<ReaderBlueprint, ContractError> {
        match self {
            Self::Toml => toml::from_str(content).map_err(|e| {
                let at = e
                    .span()
                    .map(|span| Location::from_offset(content, span.start));
                let message = e.message().to_string();
                self.parse_error(at, message, e)
            }),
            Self::Json => serde_json::from_str(content).map_err(|e| {
                let at = (e.line() > 0).then(|| Location {
                    line: e.line(),
                    column: e.column(),
                });
                // serde_json appends the position itself
                let full = e.to_string();
                let message = match at {
                    Some(at) => full
                        .strip_suffix(&format!(" at line {} column {}", at.line, at.column))
                        .unwrap_or(&full)
                        .to_string(),
                    None => full,
                };
                self.parse_error(at, message, e)
            }),
        }
    }

    /// 序列化为 pretty 文本
    pub fn render(self, blueprint: &ReaderBlueprint) -> Result<String, ContractError> {
        let rendered = match self {
            Self::Toml => toml::to_string_pretty(blueprint).map_err(|e| e.to_string()),
            Self::Json => serde_json::to_string_pretty(blueprint).map_err(|e| e.to_string()),
        };
        rendered.map_err(|e| ContractError::config_parse(format!("{self} serialize error: {e}")))
    }

    fn parse_error<E>(self, at: Option<Location>, message: String, source: E) -> ContractError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let message = match at {
            Some(at) => format!("{self} parse error at {at}: {message}"),
            None => format!("{self} parse error: {message}"),
        };
        ContractError::ConfigParse {
            message,
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toml => f.write_str("TOML"),
            Self::Json => f.write_str("JSON"),
        }
    }
}

/// 文本中的位置，行列均从 1 开始
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Location {
    line: usize,
    column: usize,
}

impl Location {
    fn from_offset(content: &str, offset: usize) -> Self {
        let before = content.get(..offset).unwrap_or(content);
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        Self {
            line: before.matches('\n').count() + 1,
            column: before[line_start..].chars().count() + 1,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
