//! Shared configuration loaded from a TOML file, mirrored across the
//! producer, server, and client binaries so they can point at the same
//! data directory and kick-bus location.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

fn default_retention_days() -> u32 {
    1
}

fn default_poll_interval_seconds() -> u64 {
    600
}

fn default_kickme_dir() -> PathBuf {
    PathBuf::from("sockets")
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the server binds its router-facing TCP listener to.
    pub listen: SocketAddr,

    /// Directory holding `current`, `<serial>.ax` snapshots, and
    /// `<to>.ix.<from>` deltas.
    pub data_dir: PathBuf,

    /// How long a snapshot (and its deltas) survive a producer run before
    /// being garbage collected, in days.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// How often the client polls with a serial-query while idle, in
    /// seconds.
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,

    /// Directory the producer scans for kick-bus endpoint sockets, and
    /// the server registers its own endpoint into.
    #[serde(default = "default_kickme_dir")]
    pub kickme_dir: PathBuf,
}

impl Config {
    pub fn retention_window_seconds(&self) -> u32 {
        self.retention_days.saturating_mul(24 * 60 * 60)
    }
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}
