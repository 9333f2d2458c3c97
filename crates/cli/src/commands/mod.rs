//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_reader;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::ReaderBlueprint;
use tracing::info;

use crate::error::CliError;

/// Load the blueprint from `path`, or fall back to built-in defaults
fn load_blueprint(path: Option<&Path>) -> Result<ReaderBlueprint> {
    let Some(path) = path else {
        info!("No configuration file given, using built-in defaults");
        return Ok(ReaderBlueprint::default());
    };

    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }

    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Non-fatal configuration issues shared by `validate` and `info`
fn collect_warnings(blueprint: &ReaderBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    let filter = blueprint.topics.subscription_filter();
    if filter.starts_with('#') || filter.starts_with('+') {
        warnings.push(format!(
            "topics.subscription '{filter}' matches every device on the broker - extra topics are counted as unknown"
        ));
    }

    let largest = contracts::StreamKind::ALL
        .iter()
        .map(|&kind| blueprint.store.capacity_for(kind))
        .max()
        .unwrap_or(blueprint.store.capacity);
    if blueprint.ingestion.queue_capacity < largest {
        warnings.push(format!(
            "ingestion.queue_capacity ({}) is smaller than the largest stream history ({})",
            blueprint.ingestion.queue_capacity, largest
        ));
    }

    if blueprint.broker.retry.max_attempts == 1 {
        warnings.push("broker.retry.max_attempts is 1 - initial connect is not retried".to_string());
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_path() {
        let bp = load_blueprint(None).unwrap();
        assert_eq!(bp.broker.address, ReaderBlueprint::default().broker.address);
    }

    #[test]
    fn test_missing_file() {
        let err = load_blueprint(Some(Path::new("/nonexistent/reader.toml"))).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[broker]\naddress = \"10.0.0.7:1884\"").unwrap();

        let bp = load_blueprint(Some(file.path())).unwrap();
        assert_eq!(bp.broker.host_port().unwrap(), ("10.0.0.7".to_string(), 1884));
    }

    #[test]
    fn test_warnings() {
        let mut bp = ReaderBlueprint::default();
        assert!(collect_warnings(&bp).is_empty());

        // The default root filter is not a warning on its own
        bp.topics.subscription = Some("sense_hat/#".into());
        assert!(collect_warnings(&bp).is_empty());

        bp.topics.subscription = Some("+/data/#".into());
        bp.store.capacities.insert("accel".into(), 500);
        bp.broker.retry.max_attempts = 1;
        let warnings = collect_warnings(&bp);
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("every device"));
        assert!(warnings[1].contains("queue_capacity"));
    }
}
