//! Configuration for attach-console.
//!
//! The configuration file is located at `~/.attach-console/config.toml`:
//!
//! ```toml
//! [console]
//! title = "Debug Console"
//! forward_logs = true
//!
//! # Color names: black, dark_grey, red, dark_red, green, dark_green,
//! #              yellow, dark_yellow, blue, dark_blue, magenta,
//! #              dark_magenta, cyan, dark_cyan, white, grey
//! [colors]
//! info = "white"
//! warning = "yellow"
//! error = "red"
//! exception = "red"
//! fallback = "white"
//!
//! [log]
//! level = "info"
//! ```

use std::fs;
use std::path::PathBuf;

use crossterm::style::Color;
use serde::{Deserialize, Serialize};

use crate::console::{SessionOptions, SeverityColorMap};
use crate::log::Severity;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub console: ConsoleConfig,
    pub colors: ColorConfig,
    pub log: LogConfig,
}

/// Console window settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub title: Option<String>,
    /// Stream log events into the console
    pub forward_logs: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            title: Some("attach-console".to_string()),
            forward_logs: true,
        }
    }
}

/// Severity colors by crossterm color name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub info: Option<String>,
    pub warning: Option<String>,
    pub error: Option<String>,
    pub exception: Option<String>,
    pub assert: Option<String>,
    pub fallback: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            info: Some("white".to_string()),
            warning: Some("yellow".to_string()),
            error: Some("red".to_string()),
            exception: Some("red".to_string()),
            assert: None,
            fallback: "white".to_string(),
        }
    }
}

impl ColorConfig {
    fn name_for(&self, severity: Severity) -> Option<&str> {
        match severity {
            Severity::Info => self.info.as_deref(),
            Severity::Warning => self.warning.as_deref(),
            Severity::Error => self.error.as_deref(),
            Severity::Exception => self.exception.as_deref(),
            Severity::Assert => self.assert.as_deref(),
        }
    }

    /// Build the color table. Unknown names are skipped, so that severity
    /// falls back.
    pub fn color_map(&self) -> SeverityColorMap {
        let fallback = parse_color(&self.fallback).unwrap_or(Color::White);
        let mut map = SeverityColorMap::new(fallback);
        for severity in Severity::ALL {
            if let Some(color) = self.name_for(severity).and_then(parse_color) {
                map.set(severity, color);
            }
        }
        map
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive, e.g. "info" or "attach_console=debug"
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn parse_color(name: &str) -> Option<Color> {
    Color::try_from(name.trim().to_lowercase().as_str()).ok()
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(config) = Self::parse(&content) {
                        return config;
                    }
                }
            }
        }
        Self::default()
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Directory holding config and log files
    pub fn config_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".attach-console"))
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        let dir = Self::config_dir()?;
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir.join("config.toml"))
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            title: self.console.title.clone(),
            forward_logs: self.console.forward_logs,
            colors: self.colors.color_map(),
        }
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}
