//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试（无需 broker）
//! - 并发读写测试

#[cfg(test)]
mod contract_tests {
    use contracts::{ReaderBlueprint, StreamKind};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_default_blueprint_is_valid() {
        let bp = ReaderBlueprint::default();
        assert!(config_loader::ConfigLoader::validate(&bp).is_ok());
        for kind in StreamKind::ALL {
            assert_eq!(bp.store.capacity_for(kind), 10);
        }
    }

    #[test]
    fn test_sample_config_loads() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../sense-reader.toml");
        let bp = config_loader::ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(bp.broker.address, "pi-fw.local:1883");
        assert_eq!(bp.store.capacity_for(StreamKind::Orientation), 30);
        assert_eq!(bp.store.capacity_for(StreamKind::Basic), 10);
    }
}

#[cfg(test)]
fn attitude(ts: f64, roll: f64) -> String {
    format!(r#"{{"ts": {ts}, "roll": {roll}, "pitch": 2.0, "yaw": 3.0}}"#)
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{BusMessage, MessageRouter, StreamKind};
    use data_store::SensorDataStore;
    use ingestion::{BackpressureConfig, IngestionPipeline, MockMessageSource};

    use super::attitude;

    const READER_TOML: &str = r#"
[topics]
prefix = "sense_hat/data"

[store]
capacity = 10
[store.capacities]
accel = 3

[normalizer]
timezone = "utc"
"#;

    fn store() -> Arc<SensorDataStore> {
        let bp = ConfigLoader::load_from_str(READER_TOML, ConfigFormat::Toml).unwrap();
        Arc::new(SensorDataStore::from_blueprint(&bp).unwrap())
    }

    fn pipeline(
        source: MockMessageSource,
        store: &Arc<SensorDataStore>,
    ) -> IngestionPipeline<MockMessageSource> {
        let router: Arc<dyn MessageRouter> = store.clone();
        IngestionPipeline::new(source, router, BackpressureConfig::default())
    }

    /// Scripted messages -> IngestionPipeline -> SensorDataStore
    #[tokio::test]
    async fn test_e2e_eviction_through_pipeline() {
        let store = store();
        let script = (1..=4)
            .map(|ts| BusMessage::new("sense_hat/data/accel", attitude(ts as f64, 0.5)))
            .collect();

        let mut pipeline = pipeline(MockMessageSource::scripted(script), &store);
        pipeline.start().await.unwrap();
        pipeline.shutdown().await.unwrap();

        let ts: Vec<f64> = store
            .snapshot("accel", None)
            .iter()
            .map(|r| r.epoch_secs())
            .collect();
        assert_eq!(ts, vec![2.0, 3.0, 4.0]);

        let stats = store.buffer(StreamKind::Accel).stats();
        assert_eq!(stats.appended, 4);
        assert_eq!(stats.evicted, 1);
        assert_eq!(pipeline.metrics().snapshot().routed, 4);
    }

    /// Bad input never reaches a buffer and never stops the pipeline
    #[tokio::test]
    async fn test_e2e_drops_are_counted() {
        let store = store();
        let script = vec![
            BusMessage::new(
                "sense_hat/data/orientation",
                attitude(1_700_000_000.0, 1.23456),
            ),
            BusMessage::new("sense_hat/data/orientation", "{not json"),
            BusMessage::new("sense_hat/data/gyro", r#"{"roll": 1.0, "pitch": 2.0, "yaw": 3.0}"#),
            BusMessage::new("sense_hat/data/accel_raw", r#"{"ts": 1.0, "x": 0.1, "y": 0.2, "z": 0.3}"#),
            BusMessage::new("other/topic", "{}"),
            BusMessage::new(
                "sense_hat/data/basic",
                r#"{"ts": 1700000000, "humidity": 40.12345, "temperature_c": 21.5, "pressure_millibars": 1013.25, "compass_north": 90.0}"#,
            ),
        ];

        let mut pipeline = pipeline(MockMessageSource::scripted(script), &store);
        pipeline.start().await.unwrap();
        pipeline.shutdown().await.unwrap();

        let ingest = pipeline.metrics().snapshot();
        assert_eq!(ingest.messages_received, 6);
        assert_eq!(ingest.routed, 2);
        assert_eq!(ingest.decode_errors, 2);
        assert_eq!(ingest.unknown_topics, 2);
        assert_eq!(ingest.queue_dropped, 0);

        let metrics = store.metrics();
        assert_eq!(metrics.decode_errors(StreamKind::Orientation), 1);
        assert_eq!(metrics.decode_errors(StreamKind::Gyro), 1);
        assert_eq!(metrics.unknown_topics(), 2);
        assert!(store.buffer(StreamKind::Gyro).is_empty());

        let orientation = store.latest("orientation").unwrap();
        assert_eq!(orientation.get("roll"), Some(1.235));
        assert_eq!(orientation.get("pitch"), Some(2.0));
        assert_eq!(orientation.timestamp(), "14/11/2023, 22:13:20.000000");

        let basic = store.latest("basic").unwrap();
        assert_eq!(basic.get("humidity"), Some(40.123));
        assert_eq!(basic.get("temperature_from_pressure"), None);
    }

    /// Synthetic publisher covers every stream plus the raw IMU topics
    #[tokio::test]
    async fn test_e2e_synthetic_source() {
        let store = store();
        let source = MockMessageSource::synthetic("sense_hat/data", 50.0).with_raw_topics(true);

        let mut pipeline = pipeline(source, &store);
        pipeline.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        pipeline.shutdown().await.unwrap();

        for kind in StreamKind::ALL {
            let buffer = store.buffer(kind);
            assert!(!buffer.is_empty(), "{kind} should have readings");
            assert!(buffer.len() <= buffer.capacity());
        }
        assert_eq!(store.buffer(StreamKind::Accel).capacity(), 3);

        let ingest = pipeline.metrics().snapshot();
        assert_eq!(ingest.decode_errors, 0);
        assert!(ingest.unknown_topics > 0);
        assert_eq!(ingest.processed(), ingest.messages_received - ingest.queue_dropped);
        assert_eq!(pipeline.source().sent(), ingest.messages_received);
    }

    /// Unknown or never-populated streams read as empty
    #[test]
    fn test_read_path_absence() {
        let store = store();
        assert!(store.latest("basic").is_none());
        assert!(store.snapshot("basic", Some(5)).is_empty());
        assert!(store.latest("magnetometer").is_none());
        assert!(store.snapshot("magnetometer", None).is_empty());
    }
}

#[cfg(test)]
mod concurrency_tests {
    use std::sync::Arc;
    use std::thread;

    use contracts::{StoreConfig, StreamKind};
    use data_store::{PayloadNormalizer, SensorDataStore, TopicRouter};

    use super::attitude;

    const CAPACITY: usize = 16;
    const WRITES: usize = 2_000;
    const READERS: usize = 4;

    fn store() -> Arc<SensorDataStore> {
        let normalizer = PayloadNormalizer::new(&Default::default()).unwrap();
        let config = StoreConfig {
            capacity: CAPACITY,
            ..Default::default()
        };
        Arc::new(SensorDataStore::new(
            TopicRouter::default(),
            normalizer,
            &config,
        ))
    }

    /// One writer, several pollers: snapshots are bounded, ordered and whole
    #[test]
    fn test_concurrent_route_and_snapshot() {
        let store = store();

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..WRITES {
                    let ts = (i + 1) as f64;
                    let outcome = store.route("sense_hat/data/gyro", attitude(ts, ts).as_bytes());
                    assert!(outcome.is_stored());
                }
            })
        };

        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    let mut observed = 0usize;
                    for _ in 0..500 {
                        let snapshot = store.snapshot("gyro", None);
                        assert!(snapshot.len() <= CAPACITY);
                        for pair in snapshot.windows(2) {
                            assert_eq!(pair[1].epoch_secs(), pair[0].epoch_secs() + 1.0);
                        }
                        for reading in &snapshot {
                            // roll is written equal to ts
                            assert_eq!(reading.get("roll"), Some(reading.epoch_secs()));
                            assert_eq!(reading.get("yaw"), Some(3.0));
                        }
                        observed += snapshot.len();
                    }
                    observed
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        let snapshot = store.snapshot("gyro", None);
        assert_eq!(snapshot.len(), CAPACITY.min(WRITES));
        assert_eq!(snapshot.last().unwrap().epoch_secs(), WRITES as f64);
        assert_eq!(store.metrics().stored_total(), WRITES as u64);
    }

    /// Streams lock independently
    #[test]
    fn test_parallel_writers_on_separate_streams() {
        let store = store();

        let handles: Vec<_> = StreamKind::ALL
            .into_iter()
            .filter(|kind| *kind != StreamKind::Basic)
            .map(|kind| {
                let store = store.clone();
                thread::spawn(move || {
                    let topic = format!("sense_hat/data/{}", kind.topic_suffix());
                    for i in 0..100 {
                        store.route(&topic, attitude(i as f64, 0.0).as_bytes());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for kind in [StreamKind::Accel, StreamKind::Gyro, StreamKind::Orientation] {
            let stats = store.buffer(kind).stats();
            assert_eq!(stats.appended, 100);
            assert_eq!(stats.len, CAPACITY);
            assert_eq!(stats.out_of_order, 0);
        }
        assert!(store.buffer(StreamKind::Basic).is_empty());
    }
}
