use crate::error::{ChainError, Result};
use crate::network::PeerAddress;
use crate::utils::MAX_DECODE_BYTES;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

static DEFAULT_NODE_ADDR: &str = "127.0.0.1:2001";
static DEFAULT_LEDGER_NAME: &str = "default";
static DEFAULT_DATA_DIR: &str = "data";

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const LEDGER_NAME_KEY: &str = "LEDGER_NAME";
const DATA_DIR_KEY: &str = "DATA_DIR";
const BOOTSTRAP_NODE_KEY: &str = "BOOTSTRAP_NODE";

/// Settings for one node. Every field has a default, so a TOML file only
/// needs the keys it wants to change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the ledger; selects the block directory under `data_dir`
    pub ledger_name: String,
    pub data_dir: PathBuf,
    /// Address the listener binds; port 0 picks a free port
    pub listen_addr: String,
    /// Host announced to peers. Defaults to the listen host, or the
    /// detected local IP when listening on an unspecified address.
    pub advertise_host: Option<String>,
    /// `host:port` of a node to bootstrap from
    pub bootstrap: Option<String>,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
    pub max_frame_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ledger_name: String::from(DEFAULT_LEDGER_NAME),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            listen_addr: String::from(DEFAULT_NODE_ADDR),
            advertise_host: None,
            bootstrap: None,
            connect_timeout_ms: 5_000,
            io_timeout_ms: 60_000,
            max_frame_bytes: MAX_DECODE_BYTES,
        }
    }
}

impl Config {
    /// Defaults overlaid with the process environment
    pub fn from_env() -> Config {
        Config::default().with_env_lookup(|key| env::var(key).ok())
    }

    /// Read a TOML file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path)
            .map_err(|e| ChainError::Config(format!("Failed to read {}: {e}", path.display())))?;
        let config: Config = toml::from_str(&text)
            .map_err(|e| ChainError::Config(format!("Failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    fn with_env_lookup<F>(mut self, lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(NODE_ADDRESS_KEY) {
            self.listen_addr = addr;
        }
        if let Some(name) = lookup(LEDGER_NAME_KEY) {
            self.ledger_name = name;
        }
        if let Some(dir) = lookup(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(bootstrap) = lookup(BOOTSTRAP_NODE_KEY) {
            self.bootstrap = Some(bootstrap);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.ledger_name.trim().is_empty() {
            return Err(ChainError::Config("ledger_name must not be empty".to_string()));
        }
        if self.max_frame_bytes == 0 || self.max_frame_bytes > MAX_DECODE_BYTES {
            return Err(ChainError::Config(format!(
                "max_frame_bytes must be between 1 and {MAX_DECODE_BYTES}"
            )));
        }
        self.bootstrap_peer()?;
        Ok(())
    }

    pub fn bootstrap_peer(&self) -> Result<Option<PeerAddress>> {
        self.bootstrap
            .as_deref()
            .map(|addr| {
                addr.parse::<PeerAddress>()
                    .map_err(|e| ChainError::Config(format!("Invalid bootstrap address: {e}")))
            })
            .transpose()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}
