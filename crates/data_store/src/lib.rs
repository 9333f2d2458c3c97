//! # Data Store
//!
//! 遥测数据的写路径与查询接口。
//!
//! ## 核心组件
//!
//! - [`ChannelBuffer`]: 单个数据流的定长 FIFO 历史
//! - [`TopicRouter`]: 主题 → 数据流的静态映射
//! - [`PayloadNormalizer`]: JSON 载荷 → [`Reading`](contracts::Reading)
//! - [`SensorDataStore`]: 组合以上组件，实现 [`MessageRouter`](contracts::MessageRouter)
//!
//! ## 使用示例
//!
//! ```ignore
//! let store = Arc::new(SensorDataStore::from_blueprint(&blueprint)?);
//!
//! store.route("sense_hat/data/accel", payload);
//! let window = store.snapshot("accel", Some(10));
//! ```

pub mod buffer;
pub mod error;
pub mod normalizer;
pub mod router;
pub mod store;

pub use buffer::{BufferStats, ChannelBuffer};
pub use error::DecodeError;
pub use normalizer::{PayloadNormalizer, TIMESTAMP_FIELD};
pub use router::TopicRouter;
pub use store::{SensorDataStore, StoreMetrics};
