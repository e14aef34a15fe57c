use crate::core::Payload;
use crate::error::{ChainError, Result};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::pss::{BlindedSigningKey, Signature, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

pub const KEY_BITS: usize = 2048;

const PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";
const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";

/// The keypair a node signs its transactions with.
///
/// PEM strings are kept without their header and footer lines, which is the
/// compact form stored in blocks and key files.
pub struct Identity {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    private_pem: Zeroizing<String>,
    public_pem: String,
}

/// Stripped PEM pair, as written to key files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairPem {
    pub private: String,
    pub public: String,
}

impl Identity {
    pub fn generate() -> Result<Identity> {
        Self::generate_with_bits(KEY_BITS)
    }

    pub fn generate_with_bits(bits: usize) -> Result<Identity> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| ChainError::Crypto(format!("Failed to generate RSA key pair: {e}")))?;
        Self::from_private_key(private_key)
    }

    /// Parse a stripped PEM pair
    pub fn from_pem(private_pem: &str, public_pem: &str) -> Result<Identity> {
        let wrapped = Zeroizing::new(wrap_pem(PRIVATE_KEY_LABEL, private_pem));
        let private_key = RsaPrivateKey::from_pkcs1_pem(&wrapped)
            .map_err(|e| ChainError::Crypto(format!("Failed to parse private key: {e}")))?;
        let public_key = parse_public_key(public_pem)?;

        if private_key.to_public_key() != public_key {
            return Err(ChainError::Crypto(
                "Public key does not belong to the private key".to_string(),
            ));
        }

        Ok(Identity {
            private_key,
            public_key,
            private_pem: Zeroizing::new(strip_pem(private_pem)),
            public_pem: strip_pem(public_pem),
        })
    }

    /// Load the pair when both halves are given, otherwise generate a fresh one
    pub fn create_or_load(private_pem: Option<&str>, public_pem: Option<&str>) -> Result<Identity> {
        match (private_pem, public_pem) {
            (Some(private_pem), Some(public_pem)) => Self::from_pem(private_pem, public_pem),
            _ => Self::generate(),
        }
    }

    fn from_private_key(private_key: RsaPrivateKey) -> Result<Identity> {
        let public_key = private_key.to_public_key();
        let private_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| ChainError::Crypto(format!("Failed to encode private key: {e}")))?;
        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| ChainError::Crypto(format!("Failed to encode public key: {e}")))?;

        Ok(Identity {
            private_key,
            public_key,
            private_pem: Zeroizing::new(strip_pem(&private_pem)),
            public_pem: strip_pem(&public_pem),
        })
    }

    pub fn sign(&self, payload: &Payload) -> Result<Vec<u8>> {
        let message = payload.canonical_bytes()?;
        let signing_key = BlindedSigningKey::<Sha256>::new(self.private_key.clone());
        let signature = signing_key.sign_with_rng(&mut rand::thread_rng(), &message);
        Ok(signature.to_vec())
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn public_pem(&self) -> &str {
        self.public_pem.as_str()
    }

    pub fn private_pem(&self) -> &str {
        self.private_pem.as_str()
    }

    pub fn keys(&self) -> KeyPairPem {
        KeyPairPem {
            private: self.private_pem().to_string(),
            public: self.public_pem.clone(),
        }
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("public_pem", &self.public_pem)
            .finish_non_exhaustive()
    }
}

/// Checks a signature over `payload`. Any failure, including a garbled
/// signature, is reported as `false`.
pub fn verify(payload: &Payload, signature: &[u8], public_key: &RsaPublicKey) -> bool {
    let Ok(message) = payload.canonical_bytes() else {
        return false;
    };
    let Ok(signature) = Signature::try_from(signature) else {
        return false;
    };
    VerifyingKey::<Sha256>::new(public_key.clone())
        .verify(&message, &signature)
        .is_ok()
}

/// Parse a stripped SPKI public key, as found in `Block::signer_public_key`
pub fn parse_public_key(public_pem: &str) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(&wrap_pem(PUBLIC_KEY_LABEL, public_pem))
        .map_err(|e| ChainError::Crypto(format!("Failed to parse public key: {e}")))
}

fn strip_pem(pem: &str) -> String {
    pem.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn wrap_pem(label: &str, body: &str) -> String {
    format!(
        "-----BEGIN {label}-----\n{}\n-----END {label}-----\n",
        strip_pem(body)
    )
}
