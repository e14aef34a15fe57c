// Client side of the gossip protocol: one connection per call, no pooling, no retries.
// Connect, read and write are bounded by the configured timeouts.

use crate::config::Config;
use crate::core::Block;
use crate::error::{ChainError, Result};
use crate::network::message::{read_frame, write_frame, Package, Response};
use crate::network::PeerAddress;
use log::{debug, warn};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GossipTransport {
    connect_timeout: Duration,
    io_timeout: Duration,
    max_frame_bytes: usize,
}

impl GossipTransport {
    pub fn new(connect_timeout: Duration, io_timeout: Duration, max_frame_bytes: usize) -> Self {
        GossipTransport {
            connect_timeout,
            io_timeout,
            max_frame_bytes,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.connect_timeout(),
            config.io_timeout(),
            config.max_frame_bytes,
        )
    }

    /// Fetch a peer's `(length, chain)`.
    ///
    /// A reply whose length disagrees with the chain it carries is malformed;
    /// an empty chain is `NoData`.
    pub fn fetch_chain(&self, peer: &PeerAddress) -> Result<(usize, Vec<Block>)> {
        match self.request(peer, &Package::GetChain)? {
            Response::Chain { length, chain } => {
                if length as usize != chain.len() {
                    return Err(ChainError::MalformedResponse(format!(
                        "{peer}: reported length {length} but sent {} blocks",
                        chain.len()
                    )));
                }
                if chain.is_empty() {
                    return Err(ChainError::NoData(format!("{peer}: empty chain")));
                }
                Ok((chain.len(), chain))
            }
            other => Err(unexpected(peer, &other)),
        }
    }

    pub fn fetch_peers(&self, peer: &PeerAddress) -> Result<Vec<PeerAddress>> {
        match self.request(peer, &Package::GetNodes)? {
            Response::Peers { peers } => Ok(peers),
            other => Err(unexpected(peer, &other)),
        }
    }

    /// Offer `block` to `peer`. Failures are logged and otherwise ignored.
    pub fn push_block(&self, peer: &PeerAddress, block: &Block) {
        let package = Package::PushBlock {
            block: block.clone(),
        };
        if let Err(e) = self.send(peer, &package) {
            warn!("Failed to push block {} to {peer}: {e}", block.get_id());
        }
    }

    /// Announce `self_address` to `peer`. No reply is expected.
    pub fn register_with(&self, peer: &PeerAddress, self_address: &PeerAddress) -> Result<()> {
        let package = Package::RegisterPeer {
            address: self_address.clone(),
        };
        self.send(peer, &package)
    }

    fn connect(&self, peer: &PeerAddress) -> Result<TcpStream> {
        let addrs = peer
            .resolve()
            .map_err(|e| ChainError::PeerUnreachable(format!("{peer}: {e}")))?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.io_timeout))?;
                    stream.set_write_timeout(Some(self.io_timeout))?;
                    return Ok(stream);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(ChainError::PeerUnreachable(match last_error {
            Some(e) => format!("{peer}: {e}"),
            None => format!("{peer}: no addresses resolved"),
        }))
    }

    fn request(&self, peer: &PeerAddress, package: &Package) -> Result<Response> {
        debug!("Sending {} to {peer}", package.kind());
        let mut stream = self.connect(peer)?;
        write_frame(&mut stream, package).map_err(|e| peer_error(peer, e))?;
        let response = read_frame(&mut stream, self.max_frame_bytes).map_err(|e| peer_error(peer, e));
        let _ = stream.shutdown(Shutdown::Both);
        response
    }

    fn send(&self, peer: &PeerAddress, package: &Package) -> Result<()> {
        debug!("Sending {} to {peer}", package.kind());
        let mut stream = self.connect(peer)?;
        write_frame(&mut stream, package).map_err(|e| peer_error(peer, e))?;
        let _ = stream.shutdown(Shutdown::Write);
        Ok(())
    }
}

fn peer_error(peer: &PeerAddress, err: ChainError) -> ChainError {
    match err {
        ChainError::Io(msg) => ChainError::PeerUnreachable(format!("{peer}: {msg}")),
        ChainError::Serialization(msg) => ChainError::MalformedResponse(format!("{peer}: {msg}")),
        other => other,
    }
}

fn unexpected(peer: &PeerAddress, response: &Response) -> ChainError {
    let kind = match response {
        Response::Chain { .. } => "chain",
        Response::Peers { .. } => "peer list",
    };
    ChainError::MalformedResponse(format!("{peer}: unexpected {kind} reply"))
}
