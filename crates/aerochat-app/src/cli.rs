//! CLI argument definitions for the aerochat binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// aerochat: a terminal assistant that answers drone telemetry questions
/// locally and everything else through a local language model.
#[derive(Parser, Debug)]
#[command(name = "aerochat", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Model to chat with; skips the interactive selection.
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Initial locale code (e.g. en, es, ca).
    #[arg(short = 'L', long = "locale")]
    pub locale: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Read every answer to the end instead of cutting it at a sentence break.
    #[arg(long = "no-early-stop")]
    pub no_early_stop: bool,

    /// Translate utterances into the pivot language and answers back.
    #[arg(long = "translate")]
    pub translate: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > AEROCHAT_CONFIG env var > ~/.aerochat/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("AEROCHAT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Resolve the model name; `None` means ask the user.
    pub fn resolve_model(&self, config_model: Option<&str>) -> Option<String> {
        self.model
            .clone()
            .or_else(|| config_model.map(str::to_string))
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".aerochat").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".aerochat").join("config.toml");
    }
    PathBuf::from("config.toml")
}
