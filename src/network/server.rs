use crate::error::{ChainError, Result};
use crate::network::message::{read_frame, write_frame, Package, Response};
use crate::network::node::NodeState;
use log::{debug, error, info};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Accept loop serving one node's ledger and peer set
pub struct Server {
    state: Arc<NodeState>,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    pub fn new(state: Arc<NodeState>, shutdown: Arc<AtomicBool>) -> Self {
        Self { state, shutdown }
    }

    /// Run the accept loop on a background thread
    pub fn spawn(self, listener: TcpListener) -> Result<JoinHandle<()>> {
        let addr = listener
            .local_addr()
            .map_err(|e| ChainError::Network(format!("Failed to read listener address: {e}")))?;
        info!("Server listening on {addr}");

        thread::Builder::new()
            .name(format!("listener-{}", addr.port()))
            .spawn(move || self.run(listener))
            .map_err(|e| ChainError::Network(format!("Failed to spawn listener thread: {e}")))
    }

    fn run(&self, listener: TcpListener) {
        for stream in listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            match stream {
                Ok(stream) => {
                    // One thread per connection, no cap
                    let state = Arc::clone(&self.state);
                    thread::spawn(move || {
                        let peer_addr = stream
                            .peer_addr()
                            .map(|addr| addr.to_string())
                            .unwrap_or_else(|_| "unknown".to_string());
                        if let Err(e) = Self::handle_connection(&state, stream) {
                            error!("Error handling connection from {peer_addr}: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {e}");
                }
            }
        }
        debug!("Listener stopped");
    }

    /// Serve exactly one request, then close the connection
    pub fn handle_connection(state: &NodeState, mut stream: TcpStream) -> Result<()> {
        stream.set_read_timeout(Some(state.io_timeout()))?;
        stream.set_write_timeout(Some(state.io_timeout()))?;

        let package: Package = read_frame(&mut stream, state.max_frame_bytes())?;
        debug!("Received {}", package.kind());

        match package {
            Package::GetChain => {
                let response = {
                    let ledger = state.read_ledger()?;
                    Response::Chain {
                        length: ledger.len() as u64,
                        chain: ledger.chain().to_vec(),
                    }
                };
                write_frame(&mut stream, &response)?;
            }
            Package::GetNodes => {
                let response = Response::Peers {
                    peers: state.peers().all().into_iter().collect(),
                };
                write_frame(&mut stream, &response)?;
            }
            Package::RegisterPeer { address } => {
                state.register_peer(address);
            }
            Package::PushBlock { block } => {
                let id = block.get_id();
                if !state.write_ledger()?.accept_block(block)? {
                    info!("Ignored pushed block {id}: it does not extend the local tip");
                }
            }
        }

        let _ = stream.shutdown(Shutdown::Both);
        Ok(())
    }
}
