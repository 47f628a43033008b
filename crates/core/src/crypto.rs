//! Field-level encryption for sensitive values at rest.
//!
//! Uses ChaCha20-Poly1305 with a process-wide 32-byte key. Every call to
//! [`FieldCipher::encrypt`] draws a fresh random nonce, so encrypting the
//! same plaintext twice yields different ciphertext. Never look rows up by
//! ciphertext; use the plaintext key columns instead.
//!
//! # Wire format
//!
//! ```text
//! base64url_nopad( version:u8 | nonce:[u8; 12] | ciphertext || tag:[u8; 16] )
//! ```
//!
//! # Key rotation
//!
//! Not supported. Replacing the key makes every stored ciphertext
//! unreadable; those rows surface as decryption errors.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;
use thiserror::Error;

/// Key length in bytes.
pub const KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const FORMAT_VERSION: u8 = 1;

/// Errors produced by the field cipher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Key is empty, not base64, or the wrong length.
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    /// Encryption failed inside the AEAD implementation.
    #[error("encryption failed")]
    Encryption,

    /// Ciphertext is malformed, tampered with, or was produced under another key.
    #[error("decryption failed")]
    Decryption,
}

/// Symmetric cipher for individual field values.
#[derive(Clone)]
pub struct FieldCipher {
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl FieldCipher {
    /// Build a cipher from a standard-base64 encoded 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::InvalidKey` if the key is blank, not valid base64,
    /// or does not decode to exactly 32 bytes.
    pub fn from_base64(key_b64: &str) -> Result<Self, CodecError> {
        let trimmed = key_b64.trim();
        if trimmed.is_empty() {
            return Err(CodecError::InvalidKey("key is empty".to_owned()));
        }

        let raw = STANDARD
            .decode(trimmed)
            .or_else(|_| URL_SAFE_NO_PAD.decode(trimmed.trim_end_matches('=')))
            .map_err(|_| CodecError::InvalidKey("key is not valid base64".to_owned()))?;

        Self::from_bytes(&raw)
    }

    /// Build a cipher from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::InvalidKey` if `key` is not 32 bytes long.
    pub fn from_bytes(key: &[u8]) -> Result<Self, CodecError> {
        if key.len() != KEY_LEN {
            return Err(CodecError::InvalidKey(format!(
                "key must be {KEY_LEN} bytes (got {})",
                key.len()
            )));
        }
        let cipher = ChaCha20Poly1305::new_from_slice(key)
            .map_err(|e| CodecError::InvalidKey(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Generate a new random key, encoded as standard base64.
    #[must_use]
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut key);
        STANDARD.encode(key)
    }

    /// Encrypt a plaintext field value.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encryption` if the AEAD operation fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CodecError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CodecError::Encryption)?;

        let mut out = Vec::with_capacity(1 + NONCE_LEN + sealed.len());
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    /// Decrypt a value produced by [`FieldCipher::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Decryption` for malformed input, an unknown format
    /// version, a failed authentication tag (tampering or wrong key), or a
    /// plaintext that is not valid UTF-8.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CodecError> {
        let raw = URL_SAFE_NO_PAD
            .decode(ciphertext.trim())
            .map_err(|_| CodecError::Decryption)?;

        let (version, rest) = raw.split_first().ok_or(CodecError::Decryption)?;
        if *version != FORMAT_VERSION || rest.len() < NONCE_LEN + TAG_LEN {
            return Err(CodecError::Decryption);
        }
        let (nonce_bytes, sealed) = rest.split_at(NONCE_LEN);

        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| CodecError::Decryption)?;

        String::from_utf8(plain).map_err(|_| CodecError::Decryption)
    }

    /// Encrypt an optional value, passing `None` through.
    ///
    /// # Errors
    ///
    /// See [`FieldCipher::encrypt`].
    pub fn encrypt_opt(&self, plaintext: Option<&str>) -> Result<Option<String>, CodecError> {
        plaintext.map(|p| self.encrypt(p)).transpose()
    }

    /// Decrypt an optional value, passing `None` through.
    ///
    /// # Errors
    ///
    /// See [`FieldCipher::decrypt`].
    pub fn decrypt_opt(&self, ciphertext: Option<&str>) -> Result<Option<String>, CodecError> {
        ciphertext.map(|c| self.decrypt(c)).transpose()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cipher() -> FieldCipher {
        FieldCipher::from_base64(&FieldCipher::generate_key()).unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let cipher = cipher();
        for plain in ["", "12.50", "secret data", "ünïcødé ✓"] {
            let sealed = cipher.encrypt(plain).unwrap();
            assert_ne!(sealed, plain);
            assert_eq!(cipher.decrypt(&sealed).unwrap(), plain);
        }
    }

    #[test]
    fn test_encryption_is_non_deterministic() {
        let cipher = cipher();
        let a = cipher.encrypt("19.99").unwrap();
        let b = cipher.encrypt("19.99").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = cipher().encrypt("19.99").unwrap();
        assert_eq!(cipher().decrypt(&sealed), Err(CodecError::Decryption));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = cipher();
        let sealed = cipher.encrypt("19.99").unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(raw);
        assert_eq!(cipher.decrypt(&tampered), Err(CodecError::Decryption));
    }

    #[test]
    fn test_malformed_ciphertext_fails() {
        let cipher = cipher();
        assert_eq!(cipher.decrypt("not-valid!!"), Err(CodecError::Decryption));
        assert_eq!(cipher.decrypt(""), Err(CodecError::Decryption));
        assert_eq!(cipher.decrypt("AQID"), Err(CodecError::Decryption));
    }

    #[test]
    fn test_unknown_version_fails() {
        let cipher = cipher();
        let sealed = cipher.encrypt("x").unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(&sealed).unwrap();
        raw[0] = 2;
        assert_eq!(
            cipher.decrypt(&URL_SAFE_NO_PAD.encode(raw)),
            Err(CodecError::Decryption)
        );
    }

    #[test]
    fn test_invalid_keys_rejected() {
        assert!(matches!(
            FieldCipher::from_base64(""),
            Err(CodecError::InvalidKey(_))
        ));
        assert!(matches!(
            FieldCipher::from_base64("   "),
            Err(CodecError::InvalidKey(_))
        ));
        assert!(matches!(
            FieldCipher::from_base64("%%%not base64%%%"),
            Err(CodecError::InvalidKey(_))
        ));
        assert!(matches!(
            FieldCipher::from_base64(&STANDARD.encode([0u8; 16])),
            Err(CodecError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_optional_helpers() {
        let cipher = cipher();
        assert_eq!(cipher.encrypt_opt(None).unwrap(), None);
        let sealed = cipher.encrypt_opt(Some("7")).unwrap();
        assert_eq!(
            cipher.decrypt_opt(sealed.as_deref()).unwrap().as_deref(),
            Some("7")
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", cipher());
        assert!(debug.contains("[REDACTED]"));
    }
}
