//! ChaCha20-Poly1305 encryption around another session store.
//!
//! Values are written as `base64(nonce || ciphertext)`; the inner store never
//! sees plaintext.

use argon2::Argon2;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;

use super::{SessionStore, StoreError};

/// Nonce size for ChaCha20-Poly1305 (96 bits = 12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Key size for ChaCha20-Poly1305 (256 bits = 32 bytes).
pub const KEY_SIZE: usize = 32;

/// Minimum salt length accepted by Argon2.
const MIN_SALT_LEN: usize = 8;

pub struct SealedStore<S> {
    inner: S,
    cipher: ChaCha20Poly1305,
}

impl<S: SessionStore> SealedStore<S> {
    pub fn new(inner: S, key: &[u8; KEY_SIZE]) -> Self {
        Self {
            inner,
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Derive the key from a passphrase with Argon2 (default parameters).
    pub fn with_passphrase(inner: S, passphrase: &str, salt: &[u8]) -> Result<Self, StoreError> {
        if salt.len() < MIN_SALT_LEN {
            return Err(StoreError::Crypto(format!(
                "Salt too short: expected at least {}, got {}",
                MIN_SALT_LEN,
                salt.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        Argon2::default()
            .hash_password_into(passphrase.as_bytes(), salt, &mut key)
            .map_err(|e| StoreError::Crypto(e.to_string()))?;
        Ok(Self::new(inner, &key))
    }

    fn seal(&self, plaintext: &str) -> Result<String, StoreError> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| StoreError::Crypto(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(blob))
    }

    fn open(&self, sealed: &str) -> Result<String, StoreError> {
        let blob = STANDARD
            .decode(sealed)
            .map_err(|e| StoreError::Crypto(format!("Invalid sealed value: {}", e)))?;
        if blob.len() < NONCE_SIZE {
            return Err(StoreError::Crypto("Sealed value too short".to_string()));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| StoreError::Crypto("Decryption failed (wrong key or tampered value)".to_string()))?;

        String::from_utf8(plaintext).map_err(|e| StoreError::Crypto(e.to_string()))
    }
}

#[async_trait]
impl<S: SessionStore> SessionStore for SealedStore<S> {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.inner.get(key).await? {
            Some(sealed) => self.open(&sealed).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let sealed = self.seal(value)?;
        self.inner.set(key, &sealed).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key).await
    }
}
