//! Ingestion 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 重试耗尽仍无法连接 broker
    #[error("failed to connect to {address} after {attempts} attempt(s): {message}")]
    ConnectionFailed {
        /// Broker 地址
        address: String,
        /// 已尝试次数
        attempts: u32,
        /// 最后一次失败原因
        message: String,
    },

    /// 尚未连接
    #[error("not connected to a broker")]
    NotConnected,

    /// 订阅过滤器非法
    #[error("invalid subscription filter '{filter}'")]
    InvalidFilter {
        /// 过滤器
        filter: String,
    },

    /// MQTT 客户端请求失败
    #[error("mqtt client error: {0}")]
    Client(String),

    /// 消息源已在监听
    #[error("source {source_name} is already listening")]
    AlreadyListening {
        /// 消息源名称
        source_name: String,
    },

    /// Pipeline 已启动
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 消息源返回的错误
    #[error(transparent)]
    Source(#[from] ContractError),
}

impl From<rumqttc::ClientError> for IngestionError {
    fn from(e: rumqttc::ClientError) -> Self {
        IngestionError::Client(e.to_string())
    }
}

impl From<IngestionError> for ContractError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::ConnectionFailed {
                address, message, ..
            } => ContractError::connection(address, message),
            IngestionError::Source(inner) => inner,
            other => ContractError::Other(other.to_string()),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
