use crate::config::Config;
use crate::error::{ChainError, Result};
use crate::wallet::{Identity, KeyPairPem};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "gossip-chain")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

/// Settings shared by every command that opens a ledger
#[derive(Args, Debug, Clone, Default)]
pub struct NodeArgs {
    #[arg(long = "config", help = "TOML file with node settings")]
    pub config: Option<PathBuf>,
    #[arg(long = "listen", help = "Address to listen on, e.g. 0.0.0.0:2001")]
    pub listen: Option<String>,
    #[arg(long = "ledger", help = "Name of the ledger")]
    pub ledger: Option<String>,
    #[arg(long = "data-dir", help = "Directory holding ledger data")]
    pub data_dir: Option<PathBuf>,
    #[arg(long = "bootstrap", help = "HOST:PORT of a node to join through")]
    pub bootstrap: Option<String>,
    #[arg(long = "key-file", help = "JSON key file written by keygen")]
    pub key_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "keygen", about = "Generate a signing keypair")]
    Keygen {
        #[arg(long = "out", help = "Write the keypair to this file instead of stdout")]
        out: Option<PathBuf>,
    },
    #[command(name = "start-node", about = "Run a ledger node until killed")]
    StartNode {
        #[command(flatten)]
        node: NodeArgs,
    },
    #[command(name = "insert", about = "Sign a JSON payload and mine it into a block")]
    Insert {
        #[arg(long = "name", help = "Label for the minted block")]
        name: String,
        #[arg(long = "data", help = "JSON payload")]
        data: String,
        #[command(flatten)]
        node: NodeArgs,
    },
    #[command(name = "print-chain", about = "Print the local chain as JSON")]
    PrintChain {
        #[command(flatten)]
        node: NodeArgs,
    },
    #[command(name = "select", about = "Print the payloads of blocks labeled NAME")]
    Select {
        #[arg(long = "name", help = "Block label to select")]
        name: String,
        #[command(flatten)]
        node: NodeArgs,
    },
    #[command(name = "validate", about = "Check hash links and proofs of the local chain")]
    Validate {
        #[command(flatten)]
        node: NodeArgs,
    },
}

impl NodeArgs {
    /// Config file (or environment) overlaid with the flags that were given
    pub fn to_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::from_env(),
        };
        if let Some(listen) = &self.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(ledger) = &self.ledger {
            config.ledger_name = ledger.clone();
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(bootstrap) = &self.bootstrap {
            config.bootstrap = Some(bootstrap.clone());
        }
        config.validate()?;
        Ok(config)
    }

    /// Settings for a short-lived node. Without `--listen` it binds a free
    /// port on the configured host, so it can run beside a long-lived node.
    pub fn to_ephemeral_config(&self) -> Result<Config> {
        let mut config = self.to_config()?;
        if self.listen.is_none() {
            let host = config
                .listen_addr
                .rsplit_once(':')
                .map(|(host, _)| host)
                .unwrap_or(config.listen_addr.as_str());
            config.listen_addr = format!("{host}:0");
        }
        Ok(config)
    }

    /// Identity from the key file, or a fresh one when none is given
    pub fn identity(&self) -> Result<Identity> {
        match &self.key_file {
            Some(path) => {
                let keys = read_key_file(path)?;
                Identity::from_pem(&keys.private, &keys.public)
            }
            None => Identity::create_or_load(None, None),
        }
    }
}

pub fn read_key_file(path: &Path) -> Result<KeyPairPem> {
    let text = fs::read_to_string(path)
        .map_err(|e| ChainError::Io(format!("Failed to read {}: {e}", path.display())))?;
    Ok(serde_json::from_str(&text)?)
}

pub fn write_key_file(path: &Path, keys: &KeyPairPem) -> Result<()> {
    let text = serde_json::to_string_pretty(keys)?;
    fs::write(path, text)
        .map_err(|e| ChainError::Io(format!("Failed to write {}: {e}", path.display())))
}
