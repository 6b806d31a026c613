//! Authenticated envelope: `nonce || ciphertext || tag`
//!
//! ChaCha20-Poly1305 with a 96-bit nonce drawn from the OS RNG for every seal
//! and a 128-bit tag. The key id travels beside the envelope, not inside it.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use keyroll_core::key::KEY_SIZE;
use keyroll_core::{Error, KeyMaterial, Result};
use rand::rngs::OsRng;
use rand::RngCore;

/// Size of the nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

fn cipher(key: &KeyMaterial, key_id: &str) -> Result<ChaCha20Poly1305> {
    ChaCha20Poly1305::new_from_slice(key.as_bytes()).map_err(|_| {
        Error::invalid_key_material(
            key_id,
            format!("expected {} bytes, got {}", KEY_SIZE, key.len()),
        )
    })
}

/// Encrypt `plaintext` under `key`
pub fn seal(key: &KeyMaterial, key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key, key_id)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    // Output is ciphertext followed by the tag
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| Error::invalid_state(format!("encryption failed: {}", e)))?;

    let mut envelope = Vec::with_capacity(NONCE_SIZE + sealed.len());
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(&sealed);
    Ok(envelope)
}

/// Verify and decrypt an envelope produced by [`seal`]
pub fn open(key: &KeyMaterial, key_id: &str, envelope: &[u8]) -> Result<Vec<u8>> {
    if envelope.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::invalid_state(format!(
            "encrypted body is {} bytes, shorter than nonce and tag ({} bytes)",
            envelope.len(),
            NONCE_SIZE + TAG_SIZE
        )));
    }

    let cipher = cipher(key, key_id)?;
    let (nonce, sealed) = envelope.split_at(NONCE_SIZE);

    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| Error::authentication_failure(key_id))
}
