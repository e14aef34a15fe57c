use ring::digest::{Context, SHA256};

use crate::error::{ChainError, Result};
use data_encoding::HEXLOWER;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the epoch with sub-second precision
pub fn current_timestamp() -> Result<f64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| ChainError::Crypto(format!("System time error: {e}")))?;
    Ok(duration.as_secs_f64())
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

/// Lowercase hex SHA-256, the digest format used for block links and proofs
pub fn sha256_hex(data: &[u8]) -> String {
    HEXLOWER.encode(sha256_digest(data).as_slice())
}

/// Address of the interface that would route to the outside world.
///
/// Connecting a UDP socket sends nothing; it only asks the OS to pick a
/// route. Falls back to loopback when there is no route at all.
pub fn local_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect("10.254.254.254:1")?;
        Ok(socket.local_addr()?.ip())
    };
    probe().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_timestamp_is_recent() {
        let now = current_timestamp().unwrap();
        assert!(now > 1_600_000_000.0);
    }

    #[test]
    fn test_local_ip_never_unspecified() {
        assert!(!local_ip().is_unspecified());
    }
}
