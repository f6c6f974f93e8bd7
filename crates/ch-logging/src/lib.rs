// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Centralized logging utilities for Content Harbor
//!
//! This crate provides standardized logging initialization so every
//! Content Harbor component logs the same way: `tracing` with an
//! `EnvFilter`, plaintext or JSON output, console by default and a log
//! file when one is requested.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export Level for convenience
pub use tracing::Level;

/// Output format for log messages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable plaintext format
    #[default]
    Plaintext,
    /// Structured JSON format
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Plaintext => write!(f, "plaintext"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plaintext" => Ok(LogFormat::Plaintext),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!(
                "Invalid log format: {}. Use 'plaintext' or 'json'",
                s
            )),
        }
    }
}

/// CLI log level enum for clap integration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CliLogLevel {
    /// Only error conditions
    Error,
    /// Errors and warnings
    Warn,
    /// Errors, warnings, and informational messages
    #[default]
    Info,
    /// All above plus debug information
    Debug,
    /// All above plus detailed tracing
    Trace,
}

impl From<CliLogLevel> for Level {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliLogLevel::Error => write!(f, "error"),
            CliLogLevel::Warn => write!(f, "warn"),
            CliLogLevel::Info => write!(f, "info"),
            CliLogLevel::Debug => write!(f, "debug"),
            CliLogLevel::Trace => write!(f, "trace"),
        }
    }
}

/// Standardized CLI logging arguments for clap integration
///
/// Use with `#[command(flatten)]` in clap structs for a consistent
/// logging CLI across all Content Harbor binaries. Binaries log to the
/// console by default and to a file when --log-file or --log-dir is
/// given.
#[derive(Clone, Debug, Default, clap::Args, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CliLoggingArgs {
    /// Log verbosity level
    #[arg(long, value_enum, help = "Log verbosity level (default: info)")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<CliLogLevel>,

    /// Log output format
    #[arg(long, value_enum, help = "Log output format (default: plaintext)")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<LogFormat>,

    /// Directory for log files
    #[arg(long, help = "Directory for log files (default: platform specific)")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Log filename
    #[arg(long, help = "Log filename")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

impl CliLoggingArgs {
    /// Initialize logging based on the parsed CLI arguments.
    ///
    /// `component` names the binary (e.g. "ch-sync") and becomes the
    /// default log file name.
    pub fn init(&self, component: &str) -> anyhow::Result<()> {
        let level: Level = self.log_level.unwrap_or_default().into();
        let format = self.log_format.unwrap_or_default();

        match self.resolve_log_path(component) {
            Some(path) => init_file_logging(level, format, &path),
            None => init_console_logging(level, format),
        }
    }

    fn resolve_log_path(&self, component: &str) -> Option<PathBuf> {
        if self.log_dir.is_none() && self.log_file.is_none() {
            return None;
        }
        let dir = self
            .log_dir
            .as_ref()
            .map(PathBuf::from)
            .or_else(default_log_dir)?;
        let file = self
            .log_file
            .clone()
            .unwrap_or_else(|| format!("{component}.log"));
        Some(dir.join(file))
    }
}

fn default_log_dir() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::cache_dir)
        .map(|d| d.join("content-harbor").join("logs"))
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Initialize console logging with the given level and format.
pub fn init_console_logging(level: Level, format: LogFormat) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(level));
    match format {
        LogFormat::Plaintext => registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}")),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr),
            )
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}")),
    }
}

/// Initialize logging to a file, creating parent directories as
/// needed.
pub fn init_file_logging(level: Level, format: LogFormat, path: &PathBuf) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::sync::Mutex::new(OpenOptions::new().create(true).append(true).open(path)?);

    let registry = tracing_subscriber::registry().with(env_filter(level));
    match format {
        LogFormat::Plaintext => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(file),
            )
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}")),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(file))
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}")),
    }
}
