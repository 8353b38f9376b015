//! Encryption of stored project passwords.
//!
//! Override passwords are stored as `base64(nonce || ciphertext || tag)`
//! using AES-256-GCM with a fresh 96-bit nonce per value.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore;
use tracing::debug;

use crate::errors::CryptoError;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Symmetric cipher for passwords kept at rest.
pub trait PasswordCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError>;
}

/// AES-256-GCM implementation of [`PasswordCipher`].
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmCipher").finish_non_exhaustive()
    }
}

impl AesGcmCipher {
    /// Build a cipher from raw key bytes.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_LEN,
                key.len()
            )));
        }
        let key = Key::<Aes256Gcm>::from_slice(key);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Build a cipher from a base64-encoded key (the form kept in the
    /// environment).
    pub fn from_base64_key(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Self::new(&bytes)
    }

    /// Generate a new random key, base64-encoded.
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        STANDARD.encode(key)
    }
}

impl PasswordCipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let raw = STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| CryptoError::MalformedCiphertext(e.to_string()))?;
        if raw.len() <= NONCE_LEN {
            return Err(CryptoError::MalformedCiphertext(format!(
                "value too short ({} bytes)",
                raw.len()
            )));
        }

        let (nonce_bytes, body) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), body)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        debug!("decrypted stored password");
        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }
}

/// Placeholder used when no key is configured. Every call fails with
/// [`CryptoError::KeyMissing`], so projects without overrides still work.
pub struct MissingKeyCipher;

impl PasswordCipher for MissingKeyCipher {
    fn encrypt(&self, _plaintext: &str) -> Result<String, CryptoError> {
        Err(CryptoError::KeyMissing)
    }

    fn decrypt(&self, _ciphertext: &str) -> Result<String, CryptoError> {
        Err(CryptoError::KeyMissing)
    }
}
