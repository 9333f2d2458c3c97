//! Mock 消息源
//!
//! 用于无 broker、无 Sense HAT 硬件环境的测试与演示：
//! - synthetic: 按固定频率为每个数据流主题生成 Sense HAT 形状的 JSON 载荷
//! - scripted: 在 `listen` 中按顺序同步投递预先给定的消息

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use contracts::{BusMessage, ContractError, MessageCallback, MessageSource, StreamKind};
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::IngestionError;

/// 发布端额外发出、但不在数据流目录中的原始 IMU 主题
pub const RAW_TOPIC_SUFFIXES: [&str; 2] = ["accel_raw", "gyro_raw"];

/// Mock 消息源配置
#[derive(Debug, Clone)]
pub struct MockSourceConfig {
    /// 消息源名称
    pub name: String,

    /// 主题前缀
    pub prefix: String,

    /// 每个主题的发送频率 (Hz)
    pub frequency_hz: f64,

    /// 是否同时发送 `accel_raw` / `gyro_raw`
    pub include_raw: bool,
}

impl Default for MockSourceConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            prefix: "sense_hat/data".to_string(),
            frequency_hz: 10.0,
            include_raw: false,
        }
    }
}

/// Mock 消息源
pub struct MockMessageSource {
    config: MockSourceConfig,
    script: Option<Vec<BusMessage>>,
    listening: Arc<AtomicBool>,
    sent: Arc<AtomicU64>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl MockMessageSource {
    /// 创建新的 Mock 消息源
    pub fn new(config: MockSourceConfig) -> Self {
        Self {
            config,
            script: None,
            listening: Arc::new(AtomicBool::new(false)),
            sent: Arc::new(AtomicU64::new(0)),
            shutdown: None,
            task: None,
        }
    }

    /// 周期性生成合成载荷
    pub fn synthetic(prefix: &str, frequency_hz: f64) -> Self {
        Self::new(MockSourceConfig {
            prefix: prefix.to_string(),
            frequency_hz,
            ..Default::default()
        })
    }

    /// 同时发送原始 IMU 主题
    pub fn with_raw_topics(mut self, include_raw: bool) -> Self {
        self.config.include_raw = include_raw;
        self
    }

    /// 按顺序投递给定消息
    pub fn scripted(messages: Vec<BusMessage>) -> Self {
        let mut source = Self::new(MockSourceConfig {
            name: "scripted".to_string(),
            ..Default::default()
        });
        source.script = Some(messages);
        source
    }

    /// 已投递的消息数
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl MessageSource for MockMessageSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn listen(&mut self, callback: MessageCallback) -> Result<(), ContractError> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(IngestionError::AlreadyListening {
                source_name: self.config.name.clone(),
            }
            .into());
        }

        if let Some(script) = self.script.take() {
            debug!(source = %self.config.name, count = script.len(), "Delivering scripted messages");
            for message in script {
                callback(message);
                self.sent.fetch_add(1, Ordering::Relaxed);
            }
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown = Some(shutdown_tx);
        self.task = Some(tokio::spawn(run_synthetic(
            self.config.clone(),
            callback,
            self.sent.clone(),
            shutdown_rx,
        )));
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ContractError> {
        if !self.listening.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| ContractError::Other(format!("mock source task failed: {e}")))?;
        }

        debug!(source = %self.config.name, sent = self.sent(), "Mock source stopped");
        Ok(())
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

async fn run_synthetic(
    config: MockSourceConfig,
    callback: MessageCallback,
    sent: Arc<AtomicU64>,
    mut shutdown: watch::Receiver<bool>,
) {
    let interval = Duration::from_secs_f64(1.0 / config.frequency_hz.max(0.001));
    let mut ticker = tokio::time::interval(interval);
    let mut tick: u64 = 0;

    debug!(
        source = %config.name,
        prefix = %config.prefix,
        frequency_hz = config.frequency_hz,
        "Mock source started"
    );

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        let ts = epoch_now();
        for kind in StreamKind::ALL {
            let topic = format!("{}/{}", config.prefix, kind.topic_suffix());
            callback(BusMessage::new(topic, encode(&synthetic_payload(kind, ts, tick))));
            sent.fetch_add(1, Ordering::Relaxed);
        }
        if config.include_raw {
            for suffix in RAW_TOPIC_SUFFIXES {
                let topic = format!("{}/{}", config.prefix, suffix);
                callback(BusMessage::new(topic, encode(&raw_payload(ts, tick))));
                sent.fetch_add(1, Ordering::Relaxed);
            }
        }

        trace!(tick, ts, "Mock tick published");
        tick += 1;
    }
}

fn epoch_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

fn encode(value: &Value) -> Vec<u8> {
    value.to_string().into_bytes()
}

/// 与 Sense HAT 发布端形状一致的载荷
pub fn synthetic_payload(kind: StreamKind, ts: f64, tick: u64) -> Value {
    let phase = tick as f64 / 10.0;
    match kind {
        StreamKind::Basic => json!({
            "ts": ts,
            "humidity": 41.0 + 2.0 * phase.sin(),
            "temperature_c": 29.0 + 0.5 * phase.cos(),
            "temperature_from_pressure": 28.4 + 0.5 * phase.cos(),
            "pressure_millibars": 1013.25 + 0.8 * phase.sin(),
            "compass_north": (tick as f64 * 3.0) % 360.0,
        }),
        StreamKind::Accel => json!({
            "ts": ts,
            "roll": 2.0 * phase.sin(),
            "pitch": 1.5 * phase.cos(),
            "yaw": (tick as f64 * 2.0) % 360.0,
            "x": 0.01 * phase.sin(),
            "y": 0.01 * phase.cos(),
            "z": 0.998,
        }),
        StreamKind::Gyro => json!({
            "ts": ts,
            "roll": 0.2 * phase.cos(),
            "pitch": 0.1 * phase.sin(),
            "yaw": (tick as f64 * 2.0) % 360.0,
            "x": 0.002 * phase.cos(),
            "y": -0.001,
            "z": 0.003 * phase.sin(),
        }),
        StreamKind::Orientation => json!({
            "ts": ts,
            "roll": 2.0 * phase.sin(),
            "pitch": 1.5 * phase.cos(),
            "yaw": (tick as f64 * 2.0) % 360.0,
        }),
    }
}

fn raw_payload(ts: f64, tick: u64) -> Value {
    let phase = tick as f64 / 10.0;
    json!({
        "ts": ts,
        "x": 0.01 * phase.sin(),
        "y": 0.01 * phase.cos(),
        "z": 1.0,
    })
}
