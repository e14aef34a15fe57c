//! Wire messages and framing
//!
//! Every message travels as a 4-byte big-endian length followed by the
//! bincode encoding of a tagged envelope. One request and at most one
//! reply per connection.

use crate::core::Block;
use crate::error::{ChainError, Result};
use crate::network::PeerAddress;
use crate::utils::{deserialize, serialize};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

const FRAME_HEADER_LEN: usize = 4;

/// Requests a node accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum Package {
    /// Ask for the full chain; answered with `Response::Chain`
    GetChain,
    /// Ask for the known peer list; answered with `Response::Peers`
    GetNodes,
    /// Announce the sender's listening address. No reply.
    RegisterPeer { address: PeerAddress },
    /// Offer a freshly minted block. No reply.
    PushBlock { block: Block },
}

/// Replies to `GetChain` and `GetNodes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum Response {
    Chain { length: u64, chain: Vec<Block> },
    Peers { peers: Vec<PeerAddress> },
}

impl Package {
    pub fn kind(&self) -> &'static str {
        match self {
            Package::GetChain => "GET_CHAIN",
            Package::GetNodes => "GET_NODES",
            Package::RegisterPeer { .. } => "REGISTER_PEER",
            Package::PushBlock { .. } => "PUSH_BLOCK",
        }
    }
}

pub fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: Write,
    T: Serialize + bincode::Encode,
{
    let body = serialize(message)?;
    let len = u32::try_from(body.len()).map_err(|_| {
        ChainError::Serialization(format!("message of {} bytes is too large", body.len()))
    })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(&body)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame, refusing bodies larger than `max_bytes`
pub fn read_frame<R, T>(reader: &mut R, max_bytes: usize) -> Result<T>
where
    R: Read,
    T: for<'de> Deserialize<'de> + bincode::Decode<()>,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    reader.read_exact(&mut header)?;
    let len = u32::from_be_bytes(header) as usize;
    if len > max_bytes {
        return Err(ChainError::Serialization(format!(
            "frame of {len} bytes exceeds limit of {max_bytes}"
        )));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    deserialize(&body)
}
