//! 写路径指标收集模块
//!
//! 记录消息接收、解码、存储等事件，并提供运行结束时的摘要。

use contracts::{ConnectionState, StreamKind};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// 注册指标描述 (Prometheus HELP 文本)
pub fn describe_metrics() {
    describe_counter!(
        "sense_reader_messages_received_total",
        "Messages delivered by the message bus"
    );
    describe_counter!(
        "sense_reader_queue_dropped_total",
        "Messages dropped because the ingestion queue was full"
    );
    describe_counter!(
        "sense_reader_readings_stored_total",
        "Readings appended to a stream history"
    );
    describe_counter!(
        "sense_reader_decode_errors_total",
        "Payloads discarded because they failed to decode"
    );
    describe_counter!(
        "sense_reader_unknown_topics_total",
        "Messages on topics outside the stream catalog"
    );
    describe_gauge!(
        "sense_reader_buffer_depth",
        "Readings currently held per stream"
    );
    describe_gauge!(
        "sense_reader_queue_depth",
        "Messages waiting in the ingestion queue"
    );
    describe_gauge!(
        "sense_reader_connection_state",
        "0=disconnected 1=connecting 2=connected 3=reconnecting"
    );
    describe_histogram!(
        "sense_reader_ingest_lag_ms",
        Unit::Milliseconds,
        "Arrival time minus the publisher timestamp"
    );
}

/// 记录消息到达
pub fn record_message_received() {
    counter!("sense_reader_messages_received_total").increment(1);
}

/// 记录接收队列丢包
pub fn record_queue_dropped() {
    counter!("sense_reader_queue_dropped_total").increment(1);
}

/// 记录读数写入与缓冲深度
pub fn record_reading_stored(stream: StreamKind, depth: usize) {
    counter!("sense_reader_readings_stored_total", "stream" => stream.name()).increment(1);
    record_buffer_depth(stream, depth);
}

/// 记录缓冲区深度
pub fn record_buffer_depth(stream: StreamKind, depth: usize) {
    gauge!("sense_reader_buffer_depth", "stream" => stream.name()).set(depth as f64);
}

/// 记录解码失败
pub fn record_decode_error(stream: StreamKind) {
    counter!("sense_reader_decode_errors_total", "stream" => stream.name()).increment(1);
}

/// 记录未知主题
pub fn record_unknown_topic() {
    counter!("sense_reader_unknown_topics_total").increment(1);
}

/// 记录连接状态
pub fn record_connection_state(state: ConnectionState) {
    gauge!("sense_reader_connection_state").set(state.as_gauge());
}

/// 记录接收延迟 (到达时间 - 发布端时间戳)
pub fn record_ingest_lag_ms(stream: StreamKind, lag_ms: f64) {
    histogram!("sense_reader_ingest_lag_ms", "stream" => stream.name()).record(lag_ms);
}

/// 单个数据流的运行摘要
#[derive(Debug, Clone)]
pub struct StreamSummary {
    pub stream: StreamKind,
    pub buffered: usize,
    pub capacity: usize,
    pub appended: u64,
    pub evicted: u64,
    pub out_of_order: u64,
    pub decode_errors: u64,
    pub lag_ms: StatsSummary,
}

/// 运行摘要
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub duration_secs: f64,
    pub messages_received: u64,
    pub queue_dropped: u64,
    pub readings_stored: u64,
    pub decode_errors: u64,
    pub unknown_topics: u64,
    pub streams: Vec<StreamSummary>,
}

impl RunSummary {
    /// 平均消息速率
    pub fn messages_per_sec(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.messages_received as f64 / self.duration_secs
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Ingestion Summary ===")?;
        writeln!(f, "Duration: {:.2}s", self.duration_secs)?;
        writeln!(
            f,
            "Messages received: {} ({:.2}/s)",
            self.messages_received,
            self.messages_per_sec()
        )?;
        writeln!(f, "Queue drops: {}", self.queue_dropped)?;
        writeln!(f, "Readings stored: {}", self.readings_stored)?;
        writeln!(f, "Decode errors: {}", self.decode_errors)?;
        writeln!(f, "Unknown topics: {}", self.unknown_topics)?;

        for stream in &self.streams {
            writeln!(
                f,
                "  {:<12} {}/{} buffered, appended={}, evicted={}, out_of_order={}, decode_errors={}",
                stream.stream.name(),
                stream.buffered,
                stream.capacity,
                stream.appended,
                stream.evicted,
                stream.out_of_order,
                stream.decode_errors
            )?;
            writeln!(f, "  {:<12} lag (ms): {}", "", stream.lag_ms)?;
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
