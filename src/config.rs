use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::MaintError;
use crate::log_sink::ChannelId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub ui: UiConfig,

    #[serde(default)]
    pub health_check: HealthCheckConfig,

    #[serde(default)]
    pub cleanup: CleanupConfig,

    #[serde(default)]
    pub defragment: DefragmentConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            LoggingLevel::Error => "error",
            LoggingLevel::Warn => "warn",
            LoggingLevel::Info => "info",
            LoggingLevel::Debug => "debug",
            LoggingLevel::Trace => "trace",
        }
    }

    /// Raise verbosity by `steps` levels (`-v`, `-vv`).
    pub fn raised(self, steps: u8) -> Self {
        let order = [
            LoggingLevel::Error,
            LoggingLevel::Warn,
            LoggingLevel::Info,
            LoggingLevel::Debug,
            LoggingLevel::Trace,
        ];
        let current = order.iter().position(|l| *l == self).unwrap_or(2);
        order[(current + steps as usize).min(order.len() - 1)]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory holding the per-channel log files
    #[serde(default)]
    pub dir: Option<PathBuf>,

    #[serde(default)]
    pub level: LoggingLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_progress_reset_ms")]
    pub progress_reset_ms: u64,

    #[serde(default = "default_panel_lines")]
    pub panel_lines: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCommand {
    pub channel: ChannelId,
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default = "default_true")]
    pub requires_privilege: bool,

    #[serde(default = "default_health_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_health_commands")]
    pub commands: Vec<HealthCommand>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_true")]
    pub requires_privilege: bool,

    /// Roots whose contents are deleted. `~` and `%VAR%` are expanded.
    #[serde(default = "default_cleanup_paths")]
    pub paths: Vec<String>,

    /// Glob patterns that are never deleted
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefragmentConfig {
    #[serde(default)]
    pub requires_privilege: bool,

    #[serde(default = "default_drives")]
    pub drives: Vec<String>,

    #[serde(default = "default_estimated_steps")]
    pub estimated_steps: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// 0 disables the timeout
    #[serde(default)]
    pub timeout_secs: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            progress_reset_ms: default_progress_reset_ms(),
            panel_lines: default_panel_lines(),
        }
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            requires_privilege: true,
            timeout_secs: default_health_timeout(),
            commands: default_health_commands(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            requires_privilege: true,
            paths: default_cleanup_paths(),
            exclude: Vec::new(),
        }
    }
}

impl Default for DefragmentConfig {
    fn default() -> Self {
        Self {
            requires_privilege: false,
            drives: default_drives(),
            estimated_steps: default_estimated_steps(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: 0,
        }
    }
}

fn default_true() -> bool { true }
fn default_tick_ms() -> u64 { 100 }
fn default_progress_reset_ms() -> u64 { 1000 }
fn default_panel_lines() -> usize { 200 }
fn default_health_timeout() -> u64 { 3600 }
fn default_estimated_steps() -> u32 { 100 }
fn default_poll_interval_ms() -> u64 { 100 }
fn default_drives() -> Vec<String> { vec!["C:".to_string(), "D:".to_string()] }

fn default_health_commands() -> Vec<HealthCommand> {
    [
        (ChannelId::CheckHealth, "Dism.exe /online /Cleanup-Image /checkhealth"),
        (ChannelId::ScanHealth, "Dism.exe /online /Cleanup-Image /scanhealth"),
        (ChannelId::RestoreHealth, "Dism.exe /online /Cleanup-Image /Restorehealth"),
        (ChannelId::SfcScannow, "sfc /scannow"),
        (ChannelId::AnalyzeComponentStore, "Dism.exe /Online /Cleanup-Image /AnalyzeComponentStore"),
        (ChannelId::StartComponentCleanup, "Dism.exe /Online /Cleanup-Image /StartComponentCleanup"),
    ]
    .into_iter()
    .map(|(channel, command)| HealthCommand {
        channel,
        command: command.to_string(),
    })
    .collect()
}

fn default_cleanup_paths() -> Vec<String> {
    if cfg!(windows) {
        vec![
            "%TEMP%".to_string(),
            "~/AppData/Local/Temp".to_string(),
            "~/AppData/Local/Microsoft/Windows/History".to_string(),
        ]
    } else {
        vec![std::env::temp_dir().to_string_lossy().into_owned()]
    }
}

impl Config {
    /// Get the config file path, e.g. %APPDATA%\maintkit\config\config.toml
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "maintkit")
            .context("Could not determine the configuration directory")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load config from the default location or return defaults
    pub fn load() -> Self {
        match Self::config_path() {
            Ok(path) if path.exists() => match Self::load_from(&path) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: {:#}", e);
                    Self::default()
                }
            },
            _ => Self::default(),
        }
    }

    /// Load config from an explicit file. Errors are not swallowed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, toml).context("Failed to write config file")?;

        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), MaintError> {
        if self.ui.tick_ms == 0 {
            return Err(MaintError::InvalidConfig("ui.tick_ms must be at least 1".into()));
        }
        if self.defragment.estimated_steps == 0 {
            return Err(MaintError::InvalidConfig(
                "defragment.estimated_steps must be at least 1".into(),
            ));
        }
        if self.health_check.timeout_secs == 0 {
            return Err(MaintError::InvalidConfig(
                "health_check.timeout_secs must be at least 1".into(),
            ));
        }
        let mut seen = Vec::new();
        for cmd in &self.health_check.commands {
            if cmd.channel == ChannelId::Error || seen.contains(&cmd.channel) {
                return Err(MaintError::InvalidConfig(format!(
                    "health_check command channel {:?} is reserved or used twice",
                    cmd.channel
                )));
            }
            seen.push(cmd.channel);
        }
        Ok(())
    }

    /// Directory for the per-channel log files
    pub fn log_dir(&self) -> PathBuf {
        if let Some(dir) = &self.logging.dir {
            return expand_path(&dir.to_string_lossy());
        }
        ProjectDirs::from("", "", "maintkit")
            .map(|dirs| dirs.data_local_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.ui.tick_ms.max(1))
    }

    pub fn progress_reset_delay(&self) -> Duration {
        Duration::from_millis(self.ui.progress_reset_ms)
    }

    /// Cleanup roots with `~` and `%VAR%` expanded
    pub fn cleanup_roots(&self) -> Vec<PathBuf> {
        self.cleanup.paths.iter().map(|p| expand_path(p)).collect()
    }
}

/// Expand a leading `~` and any `%VAR%` references.
///
/// Unset variables are left as written so the path shows up as not found.
pub fn expand_path(raw: &str) -> PathBuf {
    let mut expanded = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('%') {
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                expanded.push_str(&rest[..start]);
                match std::env::var(name) {
                    Ok(value) => expanded.push_str(&value),
                    Err(_) => {
                        expanded.push('%');
                        expanded.push_str(name);
                        expanded.push('%');
                    }
                }
                rest = &after[end + 1..];
            }
            _ => break,
        }
    }
    expanded.push_str(rest);

    if let Some(stripped) = expanded.strip_prefix('~') {
        if stripped.is_empty() || stripped.starts_with('/') || stripped.starts_with('\\') {
            if let Some(base) = BaseDirs::new() {
                let relative = stripped.trim_start_matches(['/', '\\']);
                return if relative.is_empty() {
                    base.home_dir().to_path_buf()
                } else {
                    base.home_dir().join(relative)
                };
            }
        }
    }
    PathBuf::from(expanded)
}
