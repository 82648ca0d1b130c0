use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use goop_transport::{NodeId, RelayInfo};
use serde::Deserialize;

/// CLI flags, parsed with `clap`'s derive API exactly as the rest of
/// the project's binaries do. Anything set here overrides the matching
/// TOML field.
#[derive(Debug, Parser)]
#[command(name = "goop-node", about = "Goop2 peer node")]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "goop.toml")]
    pub config: PathBuf,

    /// Directory holding the identity key and the store database.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Display content line served on the `content` protocol.
    #[arg(long)]
    pub content: Option<String>,

    /// Contact email, used as `_owner_email` for local inserts.
    #[arg(long)]
    pub email: Option<String>,
}

/// A relay peer configured in TOML (§3 RelayInfo), before the identity
/// string is parsed into a [`NodeId`].
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    pub relay_id: String,
    pub addrs: Vec<String>,
    #[serde(default = "default_cleanup_delay_secs")]
    pub cleanup_delay_secs: u64,
    #[serde(default = "default_poll_deadline_secs")]
    pub poll_deadline_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_recovery_grace_secs")]
    pub recovery_grace_secs: u64,
}

fn default_cleanup_delay_secs() -> u64 {
    3
}
fn default_poll_deadline_secs() -> u64 {
    25
}
fn default_connect_timeout_secs() -> u64 {
    15
}
fn default_recovery_grace_secs() -> u64 {
    5
}

impl RelayConfig {
    pub fn into_relay_info(self) -> Result<RelayInfo, crate::error::NodeError> {
        let relay_id: NodeId = self
            .relay_id
            .parse()
            .map_err(|_| crate::error::NodeError::Config(format!("invalid relay_id: {}", self.relay_id)))?;
        Ok(RelayInfo {
            relay_id,
            addrs: self.addrs,
            cleanup_delay: Duration::from_secs(self.cleanup_delay_secs),
            poll_deadline: Duration::from_secs(self.poll_deadline_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            recovery_grace: Duration::from_secs(self.recovery_grace_secs),
        })
    }
}

/// Node configuration loaded from TOML and overlaid with CLI flags
/// (EXPANSION C). All timeouts default to the table in §5.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_content")]
    pub content: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub avatar_path: Option<PathBuf>,

    #[serde(default)]
    pub video_disabled: bool,

    #[serde(default = "default_template")]
    pub active_template: String,

    #[serde(default)]
    pub site_root: Option<PathBuf>,

    #[serde(default)]
    pub docs_root: Option<PathBuf>,

    #[serde(default)]
    pub relay: Option<RelayConfig>,

    #[serde(default = "default_dial_timeout_secs")]
    pub dial_timeout_secs: u64,

    #[serde(default = "default_min_addr_ttl_secs")]
    pub min_addr_ttl_secs: u64,

    #[serde(default = "default_relay_tick_secs")]
    pub relay_tick_secs: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./goop-data")
}
fn default_content() -> String {
    String::new()
}
fn default_template() -> String {
    "default".to_string()
}
fn default_dial_timeout_secs() -> u64 {
    5
}
fn default_min_addr_ttl_secs() -> u64 {
    120
}
fn default_relay_tick_secs() -> u64 {
    2
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            content: default_content(),
            email: String::new(),
            avatar_path: None,
            video_disabled: false,
            active_template: default_template(),
            site_root: None,
            docs_root: None,
            relay: None,
            dial_timeout_secs: default_dial_timeout_secs(),
            min_addr_ttl_secs: default_min_addr_ttl_secs(),
            relay_tick_secs: default_relay_tick_secs(),
        }
    }
}

impl NodeConfig {
    /// Load from `path` if it exists, else fall back to defaults.
    /// Mirrors the project's own binaries: TOML on disk, never required.
    pub fn load(path: &Path) -> Result<Self, crate::error::NodeError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| crate::error::NodeError::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&text)
            .map_err(|e| crate::error::NodeError::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Overlay CLI flags onto a loaded config.
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(dir) = &cli.data_dir {
            self.data_dir = dir.clone();
        }
        if let Some(content) = &cli.content {
            self.content = content.clone();
        }
        if let Some(email) = &cli.email {
            self.email = email.clone();
        }
        self
    }

    pub fn key_path(&self) -> PathBuf {
        self.data_dir.join("identity.key")
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store.db")
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn min_addr_ttl(&self) -> Duration {
        Duration::from_secs(self.min_addr_ttl_secs)
    }

    pub fn relay_tick_interval(&self) -> Duration {
        Duration::from_secs(self.relay_tick_secs)
    }
}
