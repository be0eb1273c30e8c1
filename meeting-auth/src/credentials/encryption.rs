//! AES-GCM encryption utilities for securing credential records stored at rest.
//!
//! The key is the raw bytes of the configured encryption key string. A 16-byte
//! key selects AES-128-GCM and a 32-byte key selects AES-256-GCM; any other
//! length is rejected before a cipher is ever constructed.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;

use crate::error::{storage_error, Error, StorageErrorKind};

/// 12-byte nonce size for AES-GCM
const NONCE_SIZE: usize = 12;

/// Random bytes behind a generated secret; 24 bytes encode to 32 base64 characters.
const SECRET_SOURCE_BYTES: usize = 24;

enum Cipher {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

impl Cipher {
    fn new(key: &[u8]) -> Result<Self, Error> {
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key)
                .map(Cipher::Aes128)
                .map_err(|_| invalid_key_length(key.len())),
            32 => Aes256Gcm::new_from_slice(key)
                .map(Cipher::Aes256)
                .map_err(|_| invalid_key_length(key.len())),
            len => Err(invalid_key_length(len)),
        }
    }

    fn encrypt(&self, nonce_bytes: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let nonce = Nonce::from_slice(nonce_bytes);
        let result = match self {
            Cipher::Aes128(cipher) => cipher.encrypt(nonce, plaintext),
            Cipher::Aes256(cipher) => cipher.encrypt(nonce, plaintext),
        };
        result.map_err(|_| storage_error(StorageErrorKind::EncryptionFailed, "encryption failed"))
    }

    fn decrypt(&self, nonce_bytes: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        let nonce = Nonce::from_slice(nonce_bytes);
        let result = match self {
            Cipher::Aes128(cipher) => cipher.decrypt(nonce, ciphertext),
            Cipher::Aes256(cipher) => cipher.decrypt(nonce, ciphertext),
        };
        result.map_err(|_| {
            storage_error(
                StorageErrorKind::DecryptionFailed,
                "decryption failed - data may be corrupted or key is incorrect",
            )
        })
    }
}

fn invalid_key_length(len: usize) -> Error {
    storage_error(
        StorageErrorKind::InvalidKeyLength,
        &format!("encryption key must be 16 or 32 bytes, got {}", len),
    )
}

/// Encrypts plaintext using AES-GCM with a random nonce.
///
/// The nonce is prepended to the ciphertext.
///
/// # Arguments
/// * `plaintext` - The data to encrypt
/// * `key` - The 16 or 32 byte encryption key
///
/// # Returns
/// Bytes containing nonce + ciphertext
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, Error> {
    let cipher = Cipher::new(key)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill(&mut nonce_bytes);

    let ciphertext = cipher.encrypt(&nonce_bytes, plaintext)?;

    let mut combined = nonce_bytes.to_vec();
    combined.extend(ciphertext);

    Ok(combined)
}

/// Decrypts bytes that were encrypted with `encrypt()`.
///
/// # Arguments
/// * `combined` - Bytes containing nonce + ciphertext
/// * `key` - The 16 or 32 byte encryption key
///
/// # Returns
/// The original plaintext bytes
pub fn decrypt(combined: &[u8], key: &[u8]) -> Result<Vec<u8>, Error> {
    let cipher = Cipher::new(key)?;

    if combined.len() < NONCE_SIZE {
        return Err(storage_error(
            StorageErrorKind::DecryptionFailed,
            "ciphertext too short - missing nonce",
        ));
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
    cipher.decrypt(nonce_bytes, ciphertext)
}

/// Generates a random 32-character secret suitable as an encryption key.
pub fn generate_secret() -> String {
    let random_bytes: [u8; SECRET_SOURCE_BYTES] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const KEY_16: &[u8] = b"demo_encrypt_key";
    const KEY_32: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn test_encrypt_decrypt_roundtrip_aes128() {
        let plaintext = b"my-secret-credential";
        let encrypted = encrypt(plaintext, KEY_16).expect("encryption should succeed");
        assert_ne!(&encrypted[NONCE_SIZE..], plaintext);
        let decrypted = decrypt(&encrypted, KEY_16).expect("decryption should succeed");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip_aes256() {
        let plaintext = "API密钥🔐with-unicode-✓".as_bytes();
        let encrypted = encrypt(plaintext, KEY_32).unwrap();
        assert_eq!(decrypt(&encrypted, KEY_32).unwrap(), plaintext);
    }

    #[test]
    fn test_encrypt_produces_different_outputs() {
        let plaintext = b"same-input";
        let encrypted1 = encrypt(plaintext, KEY_32).unwrap();
        let encrypted2 = encrypt(plaintext, KEY_32).unwrap();
        assert_ne!(encrypted1, encrypted2);
        assert_eq!(decrypt(&encrypted1, KEY_32).unwrap(), plaintext);
        assert_eq!(decrypt(&encrypted2, KEY_32).unwrap(), plaintext);
    }

    #[test]
    fn test_wrong_key_length_is_rejected_on_encrypt() {
        for key in [
            &b""[..],
            &b"short"[..],
            &b"0123456789abcdef01234"[..],
            &[7u8; 33][..],
        ] {
            let result = encrypt(b"secret", key);
            assert!(matches!(
                result,
                Err(Error {
                    error_kind: ErrorKind::Storage(StorageErrorKind::InvalidKeyLength),
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_wrong_key_length_is_rejected_on_decrypt() {
        let encrypted = encrypt(b"secret", KEY_16).unwrap();
        let truncated_key = &KEY_16[..15];
        let result = decrypt(&encrypted, truncated_key);
        assert!(matches!(
            result,
            Err(Error {
                error_kind: ErrorKind::Storage(StorageErrorKind::InvalidKeyLength),
                ..
            })
        ));
    }

    #[test]
    fn test_wrong_key_returns_decryption_failed() {
        let encrypted = encrypt(b"secret", KEY_16).unwrap();
        let result = decrypt(&encrypted, b"other_encryptkey");
        assert!(matches!(
            result,
            Err(Error {
                error_kind: ErrorKind::Storage(StorageErrorKind::DecryptionFailed),
                ..
            })
        ));
    }

    #[test]
    fn test_tampered_ciphertext_returns_decryption_failed() {
        let mut encrypted = encrypt(b"secret", KEY_32).unwrap();
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0xff;
        assert!(decrypt(&encrypted, KEY_32).is_err());
    }

    #[test]
    fn test_ciphertext_too_short_returns_decryption_failed() {
        let result = decrypt(b"abc", KEY_32);
        assert!(matches!(
            result,
            Err(Error {
                error_kind: ErrorKind::Storage(StorageErrorKind::DecryptionFailed),
                ..
            })
        ));
    }

    #[test]
    fn test_empty_plaintext() {
        let encrypted = encrypt(b"", KEY_16).unwrap();
        assert!(decrypt(&encrypted, KEY_16).unwrap().is_empty());
    }

    #[test]
    fn test_generated_secret_is_a_valid_key() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 32);
        assert_ne!(secret, generate_secret());

        let encrypted = encrypt(b"payload", secret.as_bytes()).unwrap();
        assert_eq!(decrypt(&encrypted, secret.as_bytes()).unwrap(), b"payload");
    }
}
