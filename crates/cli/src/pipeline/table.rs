//! Latest-values rendering for the poll loop.

use contracts::StreamKind;
use data_store::SensorDataStore;
use serde_json::{json, Map, Value};

const STREAM_WIDTH: usize = 12;
const TS_WIDTH: usize = 28;

/// Render the latest reading of every stream as a fixed-width table
pub fn render_table(store: &SensorDataStore, poll: u64) -> String {
    let mut lines = Vec::with_capacity(StreamKind::COUNT + 2);
    lines.push(format!("--- poll #{poll} ---"));
    lines.push(row("stream", "ts", "values"));

    for kind in StreamKind::ALL {
        let line = match store.buffer(kind).latest() {
            Some(reading) => {
                let values = reading
                    .fields()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect::<Vec<_>>()
                    .join("  ");
                row(kind.name(), reading.timestamp(), &values)
            }
            None => row(kind.name(), "-", "(no data)"),
        };
        lines.push(line);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn row(stream: &str, ts: &str, values: &str) -> String {
    format!(
        "{:<sw$} {:<tw$} {}",
        stream,
        ts,
        values,
        sw = STREAM_WIDTH,
        tw = TS_WIDTH
    )
}

/// Render one poll as a JSON object (`null` for streams without data)
pub fn render_json(store: &SensorDataStore, poll: u64) -> Value {
    let mut streams = Map::new();
    for kind in StreamKind::ALL {
        let latest = store
            .buffer(kind)
            .latest()
            .and_then(|reading| serde_json::to_value(reading).ok())
            .unwrap_or(Value::Null);
        streams.insert(kind.name().to_string(), latest);
    }
    json!({ "poll": poll, "latest": streams })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{NormalizerConfig, StoreConfig, TimeZoneMode};
    use data_store::{PayloadNormalizer, TopicRouter};

    fn store() -> SensorDataStore {
        let normalizer = PayloadNormalizer::new(&NormalizerConfig {
            timezone: TimeZoneMode::Utc,
            ..Default::default()
        })
        .unwrap();
        SensorDataStore::new(TopicRouter::default(), normalizer, &StoreConfig::default())
    }

    #[test]
    fn test_table_marks_empty_streams() {
        let store = store();
        store.route(
            "sense_hat/data/gyro",
            br#"{"ts": 1700000000, "roll": 0.12345, "pitch": 0.0, "yaw": -1.5}"#,
        );

        let table = render_table(&store, 3);
        assert!(table.starts_with("--- poll #3 ---"));

        let gyro = table.lines().find(|l| l.starts_with("gyro")).unwrap();
        assert!(gyro.contains("14/11/2023, 22:13:20.000000"));
        assert!(gyro.contains("roll=0.123"));
        assert!(gyro.contains("yaw=-1.5"));

        let basic = table.lines().find(|l| l.starts_with("basic")).unwrap();
        assert!(basic.contains("(no data)"));

        // header + one row per stream, columns aligned
        assert_eq!(table.lines().count(), 2 + StreamKind::COUNT);
        assert!(table.ends_with('\n'));
        let header = table.lines().nth(1).unwrap();
        assert_eq!(header.find("ts"), gyro.find("14/11"));
        assert_eq!(basic.find('-'), Some(STREAM_WIDTH + 1));
    }

    #[test]
    fn test_json_latest() {
        let store = store();
        store.route(
            "sense_hat/data/orientation",
            br#"{"ts": 1700000000, "roll": 1.23456, "pitch": 2.0, "yaw": 3.0}"#,
        );

        let value = render_json(&store, 1);
        assert_eq!(value["poll"], 1);
        assert_eq!(value["latest"]["orientation"]["roll"], 1.235);
        assert!(value["latest"]["accel"].is_null());
    }
}
