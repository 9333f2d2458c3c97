//! `info` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigFormat, ConfigLoader};
use contracts::{ReaderBlueprint, StreamKind};
use serde::Serialize;
use tracing::info;

use super::{collect_warnings, load_blueprint};
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    broker: BrokerInfo,
    subscription: String,
    streams: Vec<StreamInfo>,
    normalizer: NormalizerInfo,
    queue_capacity: usize,
    drop_policy: String,
    poll_interval_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct BrokerInfo {
    address: String,
    client_id: String,
    keep_alive_secs: u64,
    max_attempts: u32,
}

#[derive(Serialize)]
struct StreamInfo {
    name: &'static str,
    topic: String,
    capacity: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldInfo>,
}

#[derive(Serialize)]
struct FieldInfo {
    name: &'static str,
    required: bool,
}

#[derive(Serialize)]
struct NormalizerInfo {
    decimals: u32,
    timestamp_format: String,
    timezone: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = ?args.config, "Loading configuration info");

    let blueprint = load_blueprint(args.config.as_deref())?;

    if args.dump {
        print!("{}", dump_config(&blueprint, args.json)?);
        return Ok(());
    }

    if args.json {
        let info = build_config_info(&blueprint, args.fields);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args.fields);
    }

    Ok(())
}

fn dump_config(blueprint: &ReaderBlueprint, json: bool) -> Result<String> {
    let format = if json {
        ConfigFormat::Json
    } else {
        ConfigFormat::Toml
    };
    let mut text = ConfigLoader::render(blueprint, format)
        .with_context(|| format!("Failed to render config as {format}"))?;
    if !text.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}

fn build_config_info(blueprint: &ReaderBlueprint, with_fields: bool) -> ConfigInfo {
    let streams = StreamKind::ALL
        .iter()
        .map(|&kind| StreamInfo {
            name: kind.name(),
            topic: blueprint.topics.topic_for(kind),
            capacity: blueprint.store.capacity_for(kind),
            fields: if with_fields {
                kind.fields()
                    .iter()
                    .map(|f| FieldInfo {
                        name: f.name,
                        required: f.required,
                    })
                    .collect()
            } else {
                Vec::new()
            },
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        broker: BrokerInfo {
            address: blueprint.broker.address.clone(),
            client_id: blueprint.broker.client_id.clone(),
            keep_alive_secs: blueprint.broker.keep_alive_secs,
            max_attempts: blueprint.broker.retry.max_attempts,
        },
        subscription: blueprint.topics.subscription_filter(),
        streams,
        normalizer: NormalizerInfo {
            decimals: blueprint.normalizer.decimals,
            timestamp_format: blueprint.normalizer.timestamp_format.clone(),
            timezone: format!("{:?}", blueprint.normalizer.timezone),
        },
        queue_capacity: blueprint.ingestion.queue_capacity,
        drop_policy: format!("{:?}", blueprint.ingestion.drop_policy),
        poll_interval_ms: blueprint.dashboard.poll_interval_ms,
        warnings: collect_warnings(blueprint),
    }
}

fn print_config_info(blueprint: &ReaderBlueprint, with_fields: bool) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Sense Reader Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let broker = &blueprint.broker;
    println!("📡 Broker");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Address: {}", broker.address);
    println!("   ├─ Client ID: {}", broker.client_id);
    println!("   ├─ Keep-alive: {}s", broker.keep_alive_secs);
    println!(
        "   └─ Retry: {} attempts, {}ms..{}ms backoff",
        broker.retry.max_attempts, broker.retry.initial_delay_ms, broker.retry.max_delay_ms
    );

    println!("\n🧭 Streams ({})", StreamKind::COUNT);
    println!("   Subscription: {}", blueprint.topics.subscription_filter());
    for (i, kind) in StreamKind::ALL.iter().enumerate() {
        let is_last = i == StreamKind::COUNT - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} {} ({}, keeps {})",
            prefix,
            kind,
            blueprint.topics.topic_for(*kind),
            blueprint.store.capacity_for(*kind)
        );

        if with_fields {
            let fields = kind.fields();
            for (j, field) in fields.iter().enumerate() {
                let field_prefix = if j == fields.len() - 1 { "└─" } else { "├─" };
                let marker = if field.required { "" } else { " (optional)" };
                println!("   {}  {} {}{}", child_prefix, field_prefix, field.name, marker);
            }
        }
    }

    let normalizer = &blueprint.normalizer;
    println!("\n⚙️  Normalizer");
    println!("   ├─ Decimals: {}", normalizer.decimals);
    println!("   ├─ Timestamp: {}", normalizer.timestamp_format);
    println!("   └─ Timezone: {:?}", normalizer.timezone);

    println!("\n📥 Ingestion");
    println!("   ├─ Queue capacity: {}", blueprint.ingestion.queue_capacity);
    println!("   ├─ Drop policy: {:?}", blueprint.ingestion.drop_policy);
    println!("   └─ Poll interval: {}ms", blueprint.dashboard.poll_interval_ms);

    let warnings = collect_warnings(blueprint);
    if !warnings.is_empty() {
        println!("\n⚠ Warnings:");
        for warning in warnings {
            println!("   - {}", warning);
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_defaults() {
        let info = build_config_info(&ReaderBlueprint::default(), false);
        assert_eq!(info.streams.len(), 4);
        assert_eq!(info.streams[0].topic, "sense_hat/data/basic");
        assert!(info.streams.iter().all(|s| s.fields.is_empty()));
        assert_eq!(info.normalizer.decimals, 3);
    }

    #[test]
    fn test_info_fields() {
        let info = build_config_info(&ReaderBlueprint::default(), true);
        let basic = &info.streams[0];
        let optional: Vec<_> = basic.fields.iter().filter(|f| !f.required).collect();
        assert_eq!(optional.len(), 1);
        assert_eq!(optional[0].name, "temperature_from_pressure");

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["streams"][3]["name"], "orientation");
        assert!(json.get("warnings").is_none());
    }

    #[test]
    fn test_dump_fills_defaults() {
        let mut bp = ReaderBlueprint::default();
        bp.store.capacities.insert("accel".into(), 50);

        let toml = dump_config(&bp, false).unwrap();
        assert!(toml.contains("[store.capacities]"), "{toml}");
        assert!(toml.contains("accel = 50"), "{toml}");
        let reloaded = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(reloaded.topics.subscription_filter(), "sense_hat/#");
        assert_eq!(reloaded.store.capacity_for(StreamKind::Accel), 50);

        let json: serde_json::Value = serde_json::from_str(&dump_config(&bp, true).unwrap()).unwrap();
        assert_eq!(json["broker"]["address"], "pi-fw.local:1883");
    }
}
