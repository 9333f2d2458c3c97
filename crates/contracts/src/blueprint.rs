//! ReaderBlueprint - Config Loader 输出
//!
//! 描述完整的读取端配置：broker 连接、主题目录、存储容量、归一化规则、背压策略与轮询周期。
//! 所有小节都有默认值，空配置即可得到与 Sense HAT 发布端匹配的默认设置。

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

use crate::{ContractError, StreamKind};

/// 默认 MQTT 端口
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的读取端配置蓝图
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ReaderBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// Broker 连接设置
    #[serde(default)]
    #[validate(nested)]
    pub broker: BrokerConfig,

    /// 主题目录
    #[serde(default)]
    #[validate(nested)]
    pub topics: TopicConfig,

    /// 每个数据流的历史容量
    #[serde(default)]
    #[validate(nested)]
    pub store: StoreConfig,

    /// 载荷归一化规则
    #[serde(default)]
    #[validate(nested)]
    pub normalizer: NormalizerConfig,

    /// 接收队列与背压
    #[serde(default)]
    #[validate(nested)]
    pub ingestion: IngestionConfig,

    /// 展示层轮询设置
    #[serde(default)]
    #[validate(nested)]
    pub dashboard: DashboardConfig,
}

/// Broker 连接配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BrokerConfig {
    /// Broker 地址 `host[:port]`
    #[serde(default = "default_broker_address")]
    #[validate(length(min = 1, message = "broker address must not be empty"))]
    pub address: String,

    /// MQTT client id
    #[serde(default = "default_client_id")]
    #[validate(length(min = 1, max = 64))]
    pub client_id: String,

    /// Keep-alive 间隔 (秒)
    #[serde(default = "default_keep_alive_secs")]
    #[validate(range(min = 5, max = 3600))]
    pub keep_alive_secs: u64,

    /// 连接重试策略
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: default_broker_address(),
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive_secs(),
            retry: RetryConfig::default(),
        }
    }
}

impl BrokerConfig {
    /// 解析 `host[:port]`，可带 `mqtt://` / `tcp://` 前缀
    pub fn host_port(&self) -> Result<(String, u16), ContractError> {
        parse_broker_address(&self.address)
    }
}

/// 解析 broker 地址
pub fn parse_broker_address(address: &str) -> Result<(String, u16), ContractError> {
    let trimmed = address.trim();
    let without_scheme = trimmed
        .strip_prefix("mqtt://")
        .or_else(|| trimmed.strip_prefix("tcp://"))
        .unwrap_or(trimmed);

    let (host, port) = match without_scheme.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port.parse().map_err(|_| {
                ContractError::config_validation(
                    "broker.address",
                    format!("invalid port in '{address}'"),
                )
            })?;
            (host, port)
        }
        None => (without_scheme, DEFAULT_MQTT_PORT),
    };

    if host.is_empty() {
        return Err(ContractError::config_validation(
            "broker.address",
            format!("missing host in '{address}'"),
        ));
    }
    if port == 0 {
        return Err(ContractError::config_validation(
            "broker.address",
            "port must be > 0",
        ));
    }

    Ok((host.to_string(), port))
}

fn default_broker_address() -> String {
    "pi-fw.local:1883".to_string()
}

fn default_client_id() -> String {
    "sense-reader".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

/// 连接重试配置 (指数退避)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RetryConfig {
    /// 初始连接的最大尝试次数
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 100))]
    pub max_attempts: u32,

    /// 首次重试前的等待 (毫秒)
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// 退避上限 (毫秒)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// 单次连接尝试的超时 (毫秒)
    #[serde(default = "default_connect_timeout_ms")]
    #[validate(range(min = 100))]
    pub connect_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

/// 主题配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TopicConfig {
    /// 所有数据流共享的主题前缀
    #[serde(default = "default_topic_prefix")]
    #[validate(length(min = 1, message = "topic prefix must not be empty"))]
    pub prefix: String,

    /// 订阅通配符 (缺省为前缀首段加 `/#`，即 `sense_hat/#`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            prefix: default_topic_prefix(),
            subscription: None,
        }
    }
}

impl TopicConfig {
    /// 数据流对应的完整主题
    pub fn topic_for(&self, kind: StreamKind) -> String {
        format!("{}/{}", self.prefix, kind.topic_suffix())
    }

    /// 实际使用的订阅过滤器
    ///
    /// 未配置时订阅设备根主题，`raw` 等同级主题也会到达并计为未知主题。
    pub fn subscription_filter(&self) -> String {
        if let Some(filter) = &self.subscription {
            return filter.clone();
        }
        let root = self
            .prefix
            .split_once('/')
            .map_or(self.prefix.as_str(), |(root, _)| root);
        format!("{root}/#")
    }
}

fn default_topic_prefix() -> String {
    "sense_hat/data".to_string()
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StoreConfig {
    /// 每个数据流的默认历史长度
    #[serde(default = "default_capacity")]
    #[validate(range(min = 1, max = 1_000_000))]
    pub capacity: usize,

    /// 按数据流名称覆盖容量
    #[serde(default)]
    pub capacities: BTreeMap<String, usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            capacities: BTreeMap::new(),
        }
    }
}

impl StoreConfig {
    /// 指定数据流的容量
    pub fn capacity_for(&self, kind: StreamKind) -> usize {
        self.capacities
            .get(kind.name())
            .copied()
            .unwrap_or(self.capacity)
    }
}

fn default_capacity() -> usize {
    10
}

/// 时间戳显示时区
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeZoneMode {
    /// 本机时区
    #[default]
    Local,
    /// UTC
    Utc,
}

/// 归一化配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NormalizerConfig {
    /// 数值字段保留的小数位数
    #[serde(default = "default_decimals")]
    #[validate(range(max = 12))]
    pub decimals: u32,

    /// strftime 风格的显示格式
    #[serde(default = "default_timestamp_format")]
    #[validate(length(min = 1))]
    pub timestamp_format: String,

    /// 显示时区
    #[serde(default)]
    pub timezone: TimeZoneMode,
}

/// 小数位上限，超过后 `10^n` 放大会丢失 f64 精度
pub const MAX_DECIMALS: u32 = 12;

impl NormalizerConfig {
    /// 校验 strftime 格式串
    ///
    /// 配置加载与归一化器构造共用，运行期格式化因此不会遇到非法格式。
    pub fn check_timestamp_format(&self) -> Result<(), ContractError> {
        let format = &self.timestamp_format;
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(ContractError::config_validation(
                "normalizer.timestamp_format",
                format!("invalid strftime format '{format}'"),
            ));
        }
        Ok(())
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            decimals: default_decimals(),
            timestamp_format: default_timestamp_format(),
            timezone: TimeZoneMode::default(),
        }
    }
}

fn default_decimals() -> u32 {
    3
}

fn default_timestamp_format() -> String {
    "%d/%m/%Y, %H:%M:%S.%6f".to_string()
}

/// 丢包策略 (接收队列满时)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// 丢弃最旧的排队消息
    DropOldest,
    /// 丢弃新到达的消息
    #[default]
    DropNewest,
}

/// 接收队列配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IngestionConfig {
    /// 网络线程与消费者之间的队列容量
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1, max = 1_000_000))]
    pub queue_capacity: usize,

    /// 队列满时的丢包策略
    #[serde(default)]
    pub drop_policy: DropPolicy,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            drop_policy: DropPolicy::default(),
        }
    }
}

fn default_queue_capacity() -> usize {
    256
}

/// 展示层轮询配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DashboardConfig {
    /// 轮询周期 (毫秒)
    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 1))]
    pub poll_interval_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_publisher() {
        let blueprint = ReaderBlueprint::default();
        assert_eq!(
            blueprint.topics.topic_for(StreamKind::Accel),
            "sense_hat/data/accel"
        );
        assert_eq!(blueprint.topics.subscription_filter(), "sense_hat/#");
        assert_eq!(blueprint.store.capacity, 10);
        assert_eq!(blueprint.normalizer.decimals, 3);
        assert!(blueprint.validate().is_ok());
    }

    #[test]
    fn subscription_defaults_to_prefix_root() {
        let mut topics = TopicConfig {
            prefix: "lab/pi2/sense".into(),
            subscription: None,
        };
        assert_eq!(topics.subscription_filter(), "lab/#");

        topics.prefix = "sensehat".into();
        assert_eq!(topics.subscription_filter(), "sensehat/#");

        topics.subscription = Some("sensehat/+".into());
        assert_eq!(topics.subscription_filter(), "sensehat/+");
    }

    #[test]
    fn timestamp_format_check() {
        let mut normalizer = NormalizerConfig::default();
        assert!(normalizer.check_timestamp_format().is_ok());

        normalizer.timestamp_format = "%Y-%m-%d %Q".into();
        match normalizer.check_timestamp_format() {
            Err(ContractError::ConfigValidation { field, .. }) => {
                assert_eq!(field, "normalizer.timestamp_format")
            }
            other => panic!("expected ConfigValidation, got {other:?}"),
        }
    }

    #[test]
    fn capacity_overrides() {
        let mut store = StoreConfig::default();
        store.capacities.insert("accel".into(), 50);
        assert_eq!(store.capacity_for(StreamKind::Accel), 50);
        assert_eq!(store.capacity_for(StreamKind::Gyro), 10);
    }

    #[test]
    fn broker_address_parsing() {
        assert_eq!(
            parse_broker_address("pi-fw.local").unwrap(),
            ("pi-fw.local".to_string(), 1883)
        );
        assert_eq!(
            parse_broker_address("mqtt://10.0.0.5:1884").unwrap(),
            ("10.0.0.5".to_string(), 1884)
        );
        assert!(parse_broker_address("host:notaport").is_err());
        assert!(parse_broker_address(":1883").is_err());
    }

    #[test]
    fn derived_validation_rejects_zero_capacity() {
        let mut blueprint = ReaderBlueprint::default();
        blueprint.store.capacity = 0;
        assert!(blueprint.validate().is_err());
    }
}
