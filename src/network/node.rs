use crate::config::Config;
use crate::core::{proof_of_work_until, Block, Ledger, MiningAbort, Payload, Record};
use crate::error::{ChainError, Result};
use crate::network::server::Server;
use crate::network::{GossipTransport, PeerAddress, PeerRegistry};
use crate::storage::BlockStore;
use crate::utils::local_ip;
use crate::wallet::{Identity, KeyPairPem};
use log::{debug, error, info, warn};
use rsa::RsaPublicKey;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;
use std::time::Duration;

/// State shared between the node facade and its connection handlers
pub struct NodeState {
    ledger: RwLock<Ledger>,
    peers: PeerRegistry,
    self_address: PeerAddress,
    max_frame_bytes: usize,
    io_timeout: Duration,
}

impl NodeState {
    pub fn read_ledger(&self) -> Result<RwLockReadGuard<'_, Ledger>> {
        self.ledger
            .read()
            .map_err(|_| ChainError::Lock("Failed to acquire read lock on ledger".to_string()))
    }

    pub fn write_ledger(&self) -> Result<RwLockWriteGuard<'_, Ledger>> {
        self.ledger
            .write()
            .map_err(|_| ChainError::Lock("Failed to acquire write lock on ledger".to_string()))
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn self_address(&self) -> &PeerAddress {
        &self.self_address
    }

    /// Register `address` unless it is this node
    pub fn register_peer(&self, address: PeerAddress) -> bool {
        if address == self.self_address {
            return false;
        }
        self.peers.register(address)
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }
}

/// A running ledger node: the listener, the local chain and the peer set
pub struct Node {
    state: Arc<NodeState>,
    identity: Identity,
    transport: GossipTransport,
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    /// Open the ledger, bind the listener and bootstrap from the configured peer.
    ///
    /// A failed bootstrap is logged and the node keeps running on its own chain.
    pub fn start(config: &Config, identity: Identity) -> Result<Node> {
        config.validate()?;

        let store = BlockStore::for_ledger(&config.data_dir, &config.ledger_name);
        let ledger = Ledger::open(store)?;

        let listener = TcpListener::bind(&config.listen_addr).map_err(|e| {
            ChainError::Network(format!("Failed to bind to {}: {e}", config.listen_addr))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ChainError::Network(format!("Failed to read listener address: {e}")))?;
        let self_address = advertised_address(config, local_addr);

        let state = Arc::new(NodeState {
            ledger: RwLock::new(ledger),
            peers: PeerRegistry::new(),
            self_address,
            max_frame_bytes: config.max_frame_bytes,
            io_timeout: config.io_timeout(),
        });
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = Server::new(Arc::clone(&state), Arc::clone(&shutdown)).spawn(listener)?;

        let node = Node {
            state,
            identity,
            transport: GossipTransport::from_config(config),
            local_addr,
            shutdown,
            listener: Mutex::new(Some(handle)),
        };
        info!(
            "Node {} serving ledger '{}' as {}",
            node.node_identifier()?,
            config.ledger_name,
            node.self_address()
        );

        if let Some(master) = config.bootstrap_peer()? {
            if let Err(e) = node.bootstrap(&master) {
                warn!("Bootstrap from {master} failed: {e}");
            }
        }

        Ok(node)
    }

    /// Join the network through `master`.
    ///
    /// Learns the master's peers, announces this node to the master, then
    /// adopts the longest valid chain among everyone known.
    pub fn bootstrap(&self, master: &PeerAddress) -> Result<bool> {
        let discovered = self.transport.fetch_peers(master)?;
        self.transport
            .register_with(master, self.self_address())?;

        for peer in discovered {
            self.state.register_peer(peer);
        }
        self.state.register_peer(master.clone());

        self.resolve_conflicts()
    }

    /// Adopt the longest valid chain among known peers.
    ///
    /// Peers that fail or send a chain no longer than ours are skipped.
    /// Returns whether the local chain was replaced.
    pub fn resolve_conflicts(&self) -> Result<bool> {
        let mut max_length = self.state.read_ledger()?.len();
        let mut new_chain: Option<Vec<Block>> = None;

        for peer in self.state.peers().all() {
            match self.transport.fetch_chain(&peer) {
                Ok((length, chain)) if length > max_length => {
                    let starts_at_genesis = matches!(chain.first(), Some(first) if first.is_genesis());
                    if starts_at_genesis && Ledger::valid_chain(&chain) {
                        max_length = length;
                        new_chain = Some(chain);
                    } else {
                        warn!("Ignoring invalid chain of {length} blocks from {peer}");
                    }
                }
                Ok((length, _)) => {
                    debug!("Chain of {length} blocks from {peer} is not longer than ours");
                }
                Err(e) if e.is_peer_failure() => {
                    warn!("Could not fetch chain from {peer}: {e}");
                }
                Err(e) => {
                    error!("Fetching chain from {peer} failed: {e}");
                }
            }
        }

        match new_chain {
            // replace_chain re-checks the length against a chain that may have grown meanwhile
            Some(chain) => self.state.write_ledger()?.replace_chain(chain),
            None => Ok(false),
        }
    }

    pub fn register_peer(&self, address: PeerAddress) -> bool {
        self.state.register_peer(address)
    }

    /// Buffer a signed payload; `None` when the signature is rejected
    pub fn add_transaction(
        &self,
        payload: Payload,
        signature: &[u8],
        public_key: &RsaPublicKey,
    ) -> Result<Option<u64>> {
        Ok(self
            .state
            .write_ledger()?
            .new_transaction(payload, signature, public_key))
    }

    pub fn mine_block(&self, name: &str, public_key: &str) -> Result<Block> {
        self.mine_block_until(name, public_key, &MiningAbort::new())
    }

    /// Mint a block from the pending payloads, broadcast it, then reconcile.
    ///
    /// The proof search runs without holding the ledger lock. When the tip
    /// moves underneath it the search starts over on the new tip.
    pub fn mine_block_until(
        &self,
        name: &str,
        public_key: &str,
        abort: &MiningAbort,
    ) -> Result<Block> {
        let block = loop {
            let last_proof = self.state.read_ledger()?.last_block().get_proof();
            let proof = proof_of_work_until(last_proof, abort)?;

            let mut ledger = self.state.write_ledger()?;
            if ledger.last_block().get_proof() != last_proof {
                debug!("Tip moved while mining, restarting proof search");
                continue;
            }
            break ledger.commit_block(name, public_key, proof)?;
        };

        for peer in self.state.peers().all() {
            self.transport.push_block(&peer, &block);
        }
        if let Err(e) = self.resolve_conflicts() {
            warn!("Conflict resolution after mining failed: {e}");
        }

        Ok(block)
    }

    /// Sign `payload` with this node's identity and mine it into a block labeled `name`
    pub fn submit(&self, name: &str, payload: Payload) -> Result<Block> {
        let signature = self.identity.sign(&payload)?;
        if self
            .add_transaction(payload, &signature, self.identity.public_key())?
            .is_none()
        {
            return Err(ChainError::Crypto(
                "Node identity produced a signature it cannot verify".to_string(),
            ));
        }
        self.mine_block(name, self.identity.public_pem())
    }

    /// Reconcile with peers, then return a copy of the local chain
    pub fn chain(&self) -> Result<Vec<Block>> {
        if let Err(e) = self.resolve_conflicts() {
            warn!("Conflict resolution failed: {e}");
        }
        self.snapshot()
    }

    /// Copy of the local chain without contacting peers
    pub fn snapshot(&self) -> Result<Vec<Block>> {
        Ok(self.state.read_ledger()?.chain().to_vec())
    }

    pub fn records(&self, name: &str) -> Result<Vec<Record>> {
        if let Err(e) = self.resolve_conflicts() {
            warn!("Conflict resolution failed: {e}");
        }
        Ok(self.state.read_ledger()?.records(name))
    }

    pub fn is_valid(&self) -> Result<bool> {
        Ok(Ledger::valid_chain(self.state.read_ledger()?.chain()))
    }

    pub fn peers(&self) -> HashSet<PeerAddress> {
        self.state.peers().all()
    }

    pub fn keys(&self) -> KeyPairPem {
        self.identity.keys()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn self_address(&self) -> &PeerAddress {
        self.state.self_address()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn node_identifier(&self) -> Result<String> {
        Ok(self.state.read_ledger()?.node_identifier().to_string())
    }

    /// Stop accepting connections and wait for the listener thread.
    ///
    /// Handlers already running finish on their own.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        // accept() only returns on a connection, so make one
        let mut wake = self.local_addr;
        if wake.ip().is_unspecified() {
            wake.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
        }
        if let Err(e) = TcpStream::connect_timeout(&wake, Duration::from_secs(1)) {
            debug!("Wake-up connection to {wake} failed: {e}");
        }

        let handle = match self.listener.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => {
                error!("Failed to acquire listener handle lock");
                None
            }
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Listener thread panicked");
            }
        }
        info!("Node {} stopped", self.self_address());
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn advertised_address(config: &Config, local_addr: SocketAddr) -> PeerAddress {
    let host = match &config.advertise_host {
        Some(host) => host.clone(),
        None if local_addr.ip().is_unspecified() => local_ip().to_string(),
        None => local_addr.ip().to_string(),
    };
    PeerAddress::new(host, local_addr.port())
}
