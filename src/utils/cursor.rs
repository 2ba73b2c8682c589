//! Encryption of opaque pagination cursors using AES-256-GCM.
//!
//! Cursors are storage positions; they are encrypted so that clients can
//! neither read nor forge them. Domain data never goes through here.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{
    Engine,
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD},
};
use rand::RngCore;

/// Nonce size for AES-256-GCM (96 bits)
const NONCE_SIZE: usize = 12;

/// Key size for AES-256 (256 bits)
const KEY_SIZE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("token is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("token is too short")]
    Truncated,

    #[error("cipher failure: {0}")]
    Cipher(String),
}

/// Turns cursor bytes into URL-safe strings and back.
pub trait CursorCipher: Send + Sync {
    fn encrypt_to_string(&self, plaintext: &[u8]) -> Result<String, CryptoError>;

    fn decrypt_from_string(&self, token: &str) -> Result<Vec<u8>, CryptoError>;
}

/// AES-256-GCM cipher. Tokens are `base64url(nonce || ciphertext)`.
#[derive(Clone)]
pub struct AesCursorCipher {
    cipher: Aes256Gcm,
}

impl AesCursorCipher {
    pub fn new(key: &[u8; KEY_SIZE]) -> Result<Self, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| CryptoError::InvalidKey(format!("Failed to create cipher: {e}")))?;
        Ok(Self { cipher })
    }

    /// Parse a key from a hex or base64 string
    pub fn from_key_str(key_str: &str) -> Result<Self, CryptoError> {
        let key_str = key_str.trim();

        // Try hex first
        if key_str.len() == KEY_SIZE * 2 {
            if let Ok(bytes) = hex::decode(key_str) {
                return Self::from_key_bytes(&bytes);
            }
        }

        let bytes = BASE64
            .decode(key_str)
            .map_err(|e| CryptoError::InvalidKey(format!("not hex or base64: {e}")))?;
        Self::from_key_bytes(&bytes)
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("key must be {} bytes, got {}", KEY_SIZE, bytes.len()))
        })?;
        Self::new(&key)
    }
}

impl CursorCipher for AesCursorCipher {
    fn encrypt_to_string(&self, plaintext: &[u8]) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::Cipher(e.to_string()))?;

        let mut token = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        token.extend_from_slice(&nonce_bytes);
        token.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(token))
    }

    fn decrypt_from_string(&self, token: &str) -> Result<Vec<u8>, CryptoError> {
        let raw = URL_SAFE_NO_PAD.decode(token)?;
        if raw.len() <= NONCE_SIZE {
            return Err(CryptoError::Truncated);
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| CryptoError::Cipher(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn decrypts_what_it_encrypts() {
        let cipher = AesCursorCipher::from_key_str(HEX_KEY).unwrap();
        let token = cipher.encrypt_to_string(b"carol").unwrap();
        assert!(!token.contains('+') && !token.contains('/') && !token.contains('='));
        assert_eq!(cipher.decrypt_from_string(&token).unwrap(), b"carol");
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let cipher = AesCursorCipher::from_key_str(HEX_KEY).unwrap();
        let token = cipher.encrypt_to_string(b"carol").unwrap();

        let mut raw = URL_SAFE_NO_PAD.decode(&token).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let forged = URL_SAFE_NO_PAD.encode(raw);

        assert!(matches!(
            cipher.decrypt_from_string(&forged),
            Err(CryptoError::Cipher(_))
        ));
        assert!(matches!(
            cipher.decrypt_from_string("not base64!"),
            Err(CryptoError::Encoding(_))
        ));
        assert!(matches!(
            cipher.decrypt_from_string("AAAA"),
            Err(CryptoError::Truncated)
        ));
    }

    #[test]
    fn key_must_be_32_bytes() {
        assert!(AesCursorCipher::from_key_str("deadbeef").is_err());
        assert!(AesCursorCipher::from_key_str(&BASE64.encode([7u8; KEY_SIZE])).is_ok());
    }
}
