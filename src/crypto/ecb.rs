//! AES-128-ECB block operations with zero padding.
//!
//! The panel scheme encrypts each ITv2 frame independently, padded with
//! zeros to the block boundary; the framing layer's length field bounds
//! the logical frame, so padding survives decryption and is discarded
//! there.

use aes::Aes128;
use cipher::generic_array::GenericArray;
use cipher::{BlockDecrypt, BlockEncrypt};

use crate::error::{Error, Result};
use crate::protocol::CIPHER_BLOCK;

/// Encrypt `plain`, zero-padding to the block boundary.
pub fn encrypt(cipher: &Aes128, plain: &[u8]) -> Vec<u8> {
    let padded_len = plain.len().div_ceil(CIPHER_BLOCK) * CIPHER_BLOCK;
    let mut out = Vec::with_capacity(padded_len);
    out.extend_from_slice(plain);
    out.resize(padded_len, 0);
    for chunk in out.chunks_exact_mut(CIPHER_BLOCK) {
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
    }
    out
}

/// Decrypt a whole number of blocks.
pub fn decrypt(cipher: &Aes128, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() % CIPHER_BLOCK != 0 {
        return Err(Error::Encryption(format!(
            "ciphertext length {} is not a multiple of {CIPHER_BLOCK}",
            data.len()
        )));
    }
    let mut out = data.to_vec();
    for chunk in out.chunks_exact_mut(CIPHER_BLOCK) {
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
    }
    Ok(out)
}
