//! SensorDataStore - 写路径与查询接口
//!
//! 持有每个数据流一个 [`ChannelBuffer`] (启动时全部分配，不增不删)，
//! 组合 [`TopicRouter`] 与 [`PayloadNormalizer`]：
//!
//! ```text
//! route(topic, payload)
//!   ├─ TopicRouter::resolve ── None ──► Dropped(UnknownTopic)
//!   ├─ PayloadNormalizer::normalize ── Err ──► Dropped(Decode)
//!   └─ ChannelBuffer::append ──► Stored
//! ```
//!
//! 写路径的所有失败都在 `route` 内被计数并吞掉，不会传播到网络线程。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use contracts::{
    BusMessage, ContractError, DropReason, MessageRouter, Reading, ReaderBlueprint, RouteOutcome,
    StoreConfig, StreamKind,
};
use observability::{RunningStats, StatsSummary, StreamSummary};
use tracing::{debug, instrument, trace};

use crate::buffer::ChannelBuffer;
use crate::normalizer::PayloadNormalizer;
use crate::router::TopicRouter;

/// 写路径计数器
#[derive(Debug, Default)]
pub struct StoreMetrics {
    stored: [AtomicU64; StreamKind::COUNT],
    decode_errors: [AtomicU64; StreamKind::COUNT],
    unknown_topics: AtomicU64,
    lag_ms: Mutex<[RunningStats; StreamKind::COUNT]>,
}

impl StoreMetrics {
    fn record_stored(&self, kind: StreamKind) {
        self.stored[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    fn record_decode_error(&self, kind: StreamKind) {
        self.decode_errors[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    fn record_unknown_topic(&self) {
        self.unknown_topics.fetch_add(1, Ordering::Relaxed);
    }

    fn record_lag(&self, kind: StreamKind, lag_ms: f64) {
        let mut lag = self.lag_ms.lock().unwrap_or_else(PoisonError::into_inner);
        lag[kind.index()].push(lag_ms);
    }

    /// 已存储读数 (全部数据流)
    pub fn stored_total(&self) -> u64 {
        self.stored.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// 解码失败 (全部数据流)
    pub fn decode_errors_total(&self) -> u64 {
        self.decode_errors
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }

    pub fn decode_errors(&self, kind: StreamKind) -> u64 {
        self.decode_errors[kind.index()].load(Ordering::Relaxed)
    }

    pub fn unknown_topics(&self) -> u64 {
        self.unknown_topics.load(Ordering::Relaxed)
    }

    /// 接收延迟统计
    pub fn lag_ms(&self, kind: StreamKind) -> StatsSummary {
        let lag = self.lag_ms.lock().unwrap_or_else(PoisonError::into_inner);
        StatsSummary::from(&lag[kind.index()])
    }
}

/// 传感器数据存储
///
/// 通过 `Arc<SensorDataStore>` 在网络消费者与轮询方之间共享；
/// 轮询方只能经由查询接口读取副本。
#[derive(Debug)]
pub struct SensorDataStore {
    buffers: [ChannelBuffer; StreamKind::COUNT],
    router: TopicRouter,
    normalizer: PayloadNormalizer,
    metrics: StoreMetrics,
}

impl SensorDataStore {
    /// 创建存储，所有数据流的缓冲区立即分配
    pub fn new(router: TopicRouter, normalizer: PayloadNormalizer, config: &StoreConfig) -> Self {
        let buffers = StreamKind::ALL.map(|kind| ChannelBuffer::new(kind, config.capacity_for(kind)));

        Self {
            buffers,
            router,
            normalizer,
            metrics: StoreMetrics::default(),
        }
    }

    /// 从完整配置构建
    pub fn from_blueprint(blueprint: &ReaderBlueprint) -> Result<Self, ContractError> {
        let router = TopicRouter::new(&blueprint.topics);
        let normalizer = PayloadNormalizer::new(&blueprint.normalizer)?;
        Ok(Self::new(router, normalizer, &blueprint.store))
    }

    /// 写路径入口：路由、解码、追加
    ///
    /// 永不失败；丢弃原因通过返回值与计数器报告。
    #[instrument(level = "trace", skip(self, payload), fields(bytes = payload.len()))]
    pub fn route(&self, topic: &str, payload: &[u8]) -> RouteOutcome {
        let Some(kind) = self.router.resolve(topic) else {
            trace!(topic = %topic, "No stream for topic, dropping");
            self.metrics.record_unknown_topic();
            observability::record_unknown_topic();
            return RouteOutcome::Dropped(DropReason::UnknownTopic);
        };

        match self.normalizer.normalize(kind, payload) {
            Ok(reading) => self.store(kind, reading),
            Err(e) => {
                debug!(stream = %kind, topic = %topic, error = %e, "Dropping undecodable payload");
                self.metrics.record_decode_error(kind);
                observability::record_decode_error(kind);
                RouteOutcome::Dropped(DropReason::Decode {
                    stream: kind,
                    message: e.to_string(),
                })
            }
        }
    }

    fn store(&self, kind: StreamKind, reading: Reading) -> RouteOutcome {
        let buffer = self.buffer(kind);
        let evicted = buffer.append(reading);

        self.metrics.record_stored(kind);
        observability::record_reading_stored(kind, buffer.len());

        RouteOutcome::Stored {
            stream: kind,
            evicted,
        }
    }

    /// 指定数据流的缓冲副本 (最旧在前)；未知或为空的数据流返回空列表
    pub fn snapshot(&self, stream: &str, max_count: Option<usize>) -> Vec<Reading> {
        stream
            .parse::<StreamKind>()
            .map(|kind| self.buffer(kind).snapshot(max_count))
            .unwrap_or_default()
    }

    /// 指定数据流的最新读数；未知或为空的数据流返回 `None`
    pub fn latest(&self, stream: &str) -> Option<Reading> {
        let kind = stream.parse::<StreamKind>().ok()?;
        self.buffer(kind).latest()
    }

    /// 数据流的缓冲区
    #[inline]
    pub fn buffer(&self, kind: StreamKind) -> &ChannelBuffer {
        &self.buffers[kind.index()]
    }

    pub fn router(&self) -> &TopicRouter {
        &self.router
    }

    pub fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    /// 每个数据流的运行摘要
    pub fn stream_summaries(&self) -> Vec<StreamSummary> {
        self.buffers
            .iter()
            .map(|buffer| {
                let kind = buffer.stream();
                let stats = buffer.stats();
                StreamSummary {
                    stream: kind,
                    buffered: stats.len,
                    capacity: stats.capacity,
                    appended: stats.appended,
                    evicted: stats.evicted,
                    out_of_order: stats.out_of_order,
                    decode_errors: self.metrics.decode_errors(kind),
                    lag_ms: self.metrics.lag_ms(kind),
                }
            })
            .collect()
    }
}

impl MessageRouter for SensorDataStore {
    fn route(&self, message: &BusMessage) -> RouteOutcome {
        let outcome = SensorDataStore::route(self, &message.topic, &message.payload);

        if let RouteOutcome::Stored { stream, .. } = outcome {
            if let Some(reading) = self.buffer(stream).latest() {
                if let Some(lag_ms) = ingest_lag_ms(message.received_at, reading.epoch_secs()) {
                    self.metrics.record_lag(stream, lag_ms);
                    observability::record_ingest_lag_ms(stream, lag_ms);
                }
            }
        }

        outcome
    }
}

/// 到达时间 - 发布端时间戳 (毫秒)
fn ingest_lag_ms(received_at: SystemTime, epoch_secs: f64) -> Option<f64> {
    let received = received_at.duration_since(UNIX_EPOCH).ok()?.as_secs_f64();
    let lag = (received - epoch_secs) * 1000.0;
    lag.is_finite().then_some(lag)
}
