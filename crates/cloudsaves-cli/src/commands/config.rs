//! Config command - View and validate CloudSaves configuration
//!
//! Provides the `cloudsaves config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Prints the configuration file path
//! 3. Validates the configuration file and reports every error

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use cloudsaves_core::config::Config;
use tracing::info;

use super::{load_config, plural};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config_path, format),
            ConfigCommand::Path => execute_path(config_path, format),
            ConfigCommand::Validate => execute_validate(config_path, format),
        }
    }
}

fn execute_show(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let config = load_config(config_path)?;

    info!(config_path = %config_path.display(), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        let source = if config_path.exists() {
            config_path.display().to_string()
        } else {
            "defaults".to_string()
        };
        formatter.success(&format!("Configuration ({})", source));
        formatter.info("");

        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(())
}

fn execute_path(config_path: &Path, format: OutputFormat) -> Result<()> {
    if format.is_json() {
        let formatter = get_formatter(format);
        formatter.print_json(&serde_json::json!({
            "config_path": config_path.display().to_string(),
            "exists": config_path.exists(),
        }));
    } else {
        println!("{}", config_path.display());
    }
    Ok(())
}

/// Outcome of validating a configuration file
#[derive(Debug, PartialEq)]
enum Validation {
    Missing,
    Unparsable(String),
    Checked(Vec<String>),
}

fn validate_file(config_path: &Path) -> Validation {
    if !config_path.exists() {
        return Validation::Missing;
    }
    match Config::load(config_path) {
        Ok(config) => Validation::Checked(config.validate().iter().map(|e| e.to_string()).collect()),
        Err(e) => Validation::Unparsable(format!("{e:#}")),
    }
}

fn execute_validate(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    info!(config_path = %config_path.display(), "Validating configuration");

    let validation = validate_file(config_path);

    if format.is_json() {
        let (valid, errors) = match &validation {
            Validation::Missing => (
                false,
                vec!["Configuration file not found. Using defaults.".to_string()],
            ),
            Validation::Unparsable(e) => (false, vec![format!("Failed to parse configuration: {}", e)]),
            Validation::Checked(errors) => (errors.is_empty(), errors.clone()),
        };
        formatter.print_json(&serde_json::json!({
            "valid": valid,
            "config_path": config_path.display().to_string(),
            "errors": errors,
        }));
        return Ok(());
    }

    match validation {
        Validation::Missing => {
            formatter.info(&format!(
                "Configuration file not found at {}",
                config_path.display()
            ));
            formatter.info("Using default configuration.");
        }
        Validation::Unparsable(e) => {
            formatter.error(&format!("Failed to parse configuration: {}", e));
            formatter.info(&format!("File: {}", config_path.display()));
        }
        Validation::Checked(errors) if errors.is_empty() => {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        }
        Validation::Checked(errors) => {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                plural(errors.len())
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {}", error));
            }
        }
    }

    Ok(())
}
