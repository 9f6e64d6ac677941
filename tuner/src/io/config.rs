//! Tool configuration stored in `tuner.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::{FdRetention, RunMode};

/// Bootstrap configuration (TOML).
///
/// Read once at startup and folded into the values the engine is
/// constructed with; nothing re-reads it mid-run. Missing fields default to
/// values that make a bare invocation safe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TunerConfig {
    /// Simulate: never fork, never mutate the filesystem.
    pub dry_run: bool,

    /// Working directory applied to commands that do not set their own.
    pub default_workdir: Option<PathBuf>,

    /// Descriptor retention for spawned commands.
    pub fd_retention: FdRetentionChoice,

    /// Pause between advisory-lock attempts, in milliseconds.
    pub lock_retry_interval_ms: u64,
}

/// Configurable subset of [`FdRetention`]. Explicit descriptor lists only
/// make sense programmatically, so the config file offers the two policies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FdRetentionChoice {
    #[default]
    CloseUntracked,
    KeepAll,
}

impl From<FdRetentionChoice> for FdRetention {
    fn from(choice: FdRetentionChoice) -> Self {
        match choice {
            FdRetentionChoice::CloseUntracked => FdRetention::CloseUntracked,
            FdRetentionChoice::KeepAll => FdRetention::KeepAll,
        }
    }
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            default_workdir: None,
            fd_retention: FdRetentionChoice::default(),
            lock_retry_interval_ms: 200,
        }
    }
}

impl TunerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lock_retry_interval_ms == 0 {
            return Err(anyhow!("lock_retry_interval_ms must be > 0"));
        }
        if let Some(dir) = &self.default_workdir
            && dir.as_os_str().is_empty()
        {
            return Err(anyhow!("default_workdir must not be empty"));
        }
        Ok(())
    }

    /// Run mode after folding in a CLI `--dry-run` override. The flag can
    /// only make a run more cautious, never less.
    pub fn run_mode(&self, dry_run_flag: bool) -> RunMode {
        RunMode::from_flag(self.dry_run || dry_run_flag)
    }

    pub fn lock_retry_interval(&self) -> Duration {
        Duration::from_millis(self.lock_retry_interval_ms)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TunerConfig::default()`.
pub fn load_config(path: &Path) -> Result<TunerConfig> {
    if !path.exists() {
        let cfg = TunerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TunerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &TunerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
