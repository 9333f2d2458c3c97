//! # Config Loader
//!
//! 配置加载：文件/字符串 → 解析 → 两层校验 → `ReaderBlueprint`。
//!
//! 从文件加载时，解析与校验错误前缀为文件路径。
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("sense-reader.toml")).unwrap();
//! println!("Broker: {}", blueprint.broker.address);
//! ```

mod parser;
mod validator;

pub use contracts::ReaderBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从文件加载，格式由扩展名 (.toml / .json) 决定
    pub fn load_from_path(path: &Path) -> Result<ReaderBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format).map_err(|e| with_origin(e, path))
    }

    /// 从字符串加载
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ReaderBlueprint, ContractError> {
        let blueprint = format.parse(content)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Validate an already-built blueprint (e.g. defaults plus CLI overrides)
    pub fn validate(blueprint: &ReaderBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// 生效配置的文本形式 (`info --dump`)
    pub fn render(blueprint: &ReaderBlueprint, format: ConfigFormat) -> Result<String, ContractError> {
        format.render(blueprint)
    }
}

fn with_origin(error: ContractError, path: &Path) -> ContractError {
    match error {
        ContractError::ConfigParse { message, source } => ContractError::ConfigParse {
            message: format!("{}: {message}", path.display()),
            source,
        },
        ContractError::ConfigValidation { field, message } => ContractError::ConfigValidation {
            field,
            message: format!("{message} (in {})", path.display()),
        },
        other => other,
    }
}
