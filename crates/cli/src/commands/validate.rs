//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{ReaderBlueprint, StreamKind};
use serde::Serialize;
use tracing::info;

use super::collect_warnings;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    broker: String,
    subscription: String,
    streams: usize,
    total_capacity: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(summarize(&blueprint)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn summarize(blueprint: &ReaderBlueprint) -> ConfigSummary {
    ConfigSummary {
        version: format!("{:?}", blueprint.version),
        broker: blueprint.broker.address.clone(),
        subscription: blueprint.topics.subscription_filter(),
        streams: StreamKind::COUNT,
        total_capacity: StreamKind::ALL
            .iter()
            .map(|&kind| blueprint.store.capacity_for(kind))
            .sum(),
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Broker: {}", summary.broker);
            println!("  Subscription: {}", summary.subscription);
            println!(
                "  Streams: {} ({} readings total)",
                summary.streams, summary.total_capacity
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn args(path: PathBuf) -> ValidateArgs {
        ValidateArgs {
            config: path,
            json: true,
        }
    }

    #[test]
    fn test_valid_file() {
        let file = config_file("[store]\ncapacity = 20\n[store.capacities]\nbasic = 5\n");
        let result = validate_config(&args(file.path().to_path_buf()));

        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.streams, 4);
        assert_eq!(summary.total_capacity, 65);
        assert_eq!(summary.subscription, "sense_hat/#");
    }

    #[test]
    fn test_invalid_file() {
        let file = config_file("[normalizer]\ndecimals = 20\n");
        let result = validate_config(&args(file.path().to_path_buf()));

        assert!(!result.valid);
        assert!(result.error.unwrap().contains("normalizer.decimals"));
        assert!(run_validate(&args(file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = validate_config(&args(PathBuf::from("/nonexistent/sense-reader.toml")));
        assert!(!result.valid);
        assert!(result.error.unwrap().starts_with("File not found"));
    }
}
