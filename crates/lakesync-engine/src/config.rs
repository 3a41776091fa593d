//! Sync config loading: YAML parsing with environment variable
//! substitution, plus up-front validation.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use lakesync_types::config::SyncConfig;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns an error if any referenced environment variable is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = input.to_string();
    let mut missing = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => {
                missing.push(var_name.to_string());
            }
        }
    }

    if !missing.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", missing.join(", "));
    }

    Ok(result)
}

/// Parse a sync config YAML string (after env var substitution).
///
/// # Errors
///
/// Returns an error if env var substitution fails, the YAML is invalid, or
/// validation rejects the config.
pub fn parse_config_str(yaml_str: &str) -> Result<SyncConfig> {
    let substituted = substitute_env_vars(yaml_str)?;
    let config: SyncConfig =
        serde_yaml::from_str(&substituted).context("Failed to parse sync config YAML")?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse a sync config YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn load_config(path: &Path) -> Result<SyncConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config_str(&content)
}

/// Reject configs the engine cannot run.
///
/// # Errors
///
/// Returns an error describing the first rejected field.
pub fn validate_config(config: &SyncConfig) -> Result<()> {
    if config.table_path.trim().is_empty() {
        anyhow::bail!("table_path must not be empty");
    }
    if config.table_name.trim().is_empty() {
        anyhow::bail!("table_name must not be empty");
    }
    if config.key_field.trim().is_empty() {
        anyhow::bail!("key_field must not be empty");
    }
    if config.ordering_field.trim().is_empty() {
        anyhow::bail!("ordering_field must not be empty");
    }
    if config.source_limit == 0 {
        anyhow::bail!("source_limit must be greater than zero");
    }
    if config.catalog_sync.enabled && config.catalog_table_name().trim().is_empty() {
        anyhow::bail!("catalog sync enabled but no catalog table name available");
    }
    Ok(())
}
