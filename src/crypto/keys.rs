//! Key derivation for the panel ECB scheme.
//!
//! Both directions derive an AES-128 key from the session's configured
//! access code and a 16-byte initializer exchanged in `RequestAccess`.
//! Type1 and Type2 differ only here.

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::protocol::message::EncryptionType;

/// Required initializer length in bytes.
pub const INITIALIZER_LEN: usize = 16;

/// Derive one directional AES-128 key.
pub fn derive_key(
    kind: EncryptionType,
    access_code: &[u8],
    initializer: &[u8],
) -> Result<[u8; 16]> {
    if access_code.is_empty() {
        return Err(Error::Encryption(format!(
            "no access code configured for {kind:?}"
        )));
    }
    if initializer.len() != INITIALIZER_LEN {
        return Err(Error::Encryption(format!(
            "initializer must be {INITIALIZER_LEN} bytes, got {}",
            initializer.len()
        )));
    }

    let digest = match kind {
        EncryptionType::Type1 => {
            let mut h = Sha256::new();
            h.update(access_code);
            h.update(initializer);
            h.finalize()
        }
        EncryptionType::Type2 => {
            let code_digest = Sha256::digest(access_code);
            let mut h = Sha256::new();
            h.update(code_digest);
            h.update(initializer);
            h.finalize()
        }
    };

    let mut key = [0u8; 16];
    key.copy_from_slice(&digest[..16]);
    Ok(key)
}

/// Generate a fresh random initializer for the inbound direction.
pub fn random_initializer() -> [u8; INITIALIZER_LEN] {
    let mut bytes = [0u8; INITIALIZER_LEN];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    bytes
}
