//! Session encryption for the ITv2 layer.
//!
//! The panel picks `Type1` or `Type2` in its `OpenSession`; both run
//! AES-128-ECB over whole ITv2 frames and differ only in key
//! derivation. Each direction is keyed by its own initializer exchanged
//! in `RequestAccess`, and each direction switches on independently
//! mid-handshake.

mod ecb;
mod keys;

pub use keys::{derive_key, random_initializer, INITIALIZER_LEN};

use aes::Aes128;
use cipher::generic_array::GenericArray;
use cipher::KeyInit;

use crate::error::{Error, Result};
use crate::protocol::message::EncryptionType;

/// One direction's ECB codec, keyed by an explicit initializer.
///
/// The session uses one per direction; panel-side peers (and test
/// harnesses) build their own from the initializers they exchange.
pub struct DirectionalCipher {
    cipher: Aes128,
}

impl DirectionalCipher {
    pub fn new(kind: EncryptionType, access_code: &[u8], initializer: &[u8]) -> Result<Self> {
        let key = derive_key(kind, access_code, initializer)?;
        Ok(Self {
            cipher: Aes128::new(GenericArray::from_slice(&key)),
        })
    }

    /// Encrypt one frame, zero-padded to the block boundary.
    pub fn encrypt(&self, plain: &[u8]) -> Vec<u8> {
        ecb::encrypt(&self.cipher, plain)
    }

    /// Decrypt a whole number of blocks.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        ecb::decrypt(&self.cipher, data)
    }
}

impl std::fmt::Debug for DirectionalCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectionalCipher").finish_non_exhaustive()
    }
}

/// Per-session cipher state for both directions.
#[derive(Debug)]
pub struct SessionCrypto {
    kind: EncryptionType,
    access_code: Vec<u8>,
    outbound: Option<DirectionalCipher>,
    inbound: Option<DirectionalCipher>,
}

impl SessionCrypto {
    /// Create an unconfigured handler for the negotiated scheme.
    pub fn new(kind: EncryptionType, access_code: &[u8]) -> Self {
        Self {
            kind,
            access_code: access_code.to_vec(),
            outbound: None,
            inbound: None,
        }
    }

    pub fn kind(&self) -> EncryptionType {
        self.kind
    }

    /// Key the outbound direction from the initializer the panel sent.
    ///
    /// Must be called exactly once.
    pub fn configure_outbound(&mut self, initializer: &[u8]) -> Result<()> {
        if self.outbound.is_some() {
            return Err(Error::Encryption("outbound direction already keyed".into()));
        }
        self.outbound = Some(DirectionalCipher::new(
            self.kind,
            &self.access_code,
            initializer,
        )?);
        Ok(())
    }

    /// Key the inbound direction from a fresh random initializer and
    /// return that initializer for transmission to the panel.
    ///
    /// Must be called exactly once.
    pub fn configure_inbound(&mut self) -> Result<Vec<u8>> {
        if self.inbound.is_some() {
            return Err(Error::Encryption("inbound direction already keyed".into()));
        }
        let initializer = random_initializer();
        self.inbound = Some(DirectionalCipher::new(
            self.kind,
            &self.access_code,
            &initializer,
        )?);
        Ok(initializer.to_vec())
    }

    pub fn outbound_active(&self) -> bool {
        self.outbound.is_some()
    }

    pub fn inbound_active(&self) -> bool {
        self.inbound.is_some()
    }

    /// Encrypt one outbound frame.
    pub fn encrypt_outbound(&self, plain: &[u8]) -> Result<Vec<u8>> {
        let cipher = self
            .outbound
            .as_ref()
            .ok_or_else(|| Error::Encryption("outbound direction not keyed".into()))?;
        Ok(cipher.encrypt(plain))
    }

    /// Decrypt one inbound frame.
    pub fn decrypt_inbound(&self, data: &[u8]) -> Result<Vec<u8>> {
        let cipher = self
            .inbound
            .as_ref()
            .ok_or_else(|| Error::Encryption("inbound direction not keyed".into()))?;
        cipher.decrypt(data)
    }
}
