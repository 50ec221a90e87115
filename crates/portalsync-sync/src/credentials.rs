//! Credential encryption and encoding.
//!
//! Passwords are sealed with AES-256-GCM using a 16-byte random IV and a
//! 16-byte tag, stored as `base64(iv || tag || ciphertext)`. Key material is
//! chosen explicitly through [`KeySource`]; the cipher never reads the
//! environment on its own.

use std::fmt;

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{SecondsFormat, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Environment variable holding a base64-encoded 32-byte key.
pub const KEY_ENV: &str = "PORTALSYNC_ENCRYPTION_KEY";

/// Identifier used for key derivation when nothing better is available.
pub const DEFAULT_KEY_IDENTIFIER: &str = "portalsync-default";

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;

type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Where the encryption key comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Raw key bytes; must be 32 bytes long.
    Explicit(Vec<u8>),
    /// A base64-encoded 32-byte key.
    Base64(String),
    /// SHA-256 of an environment identifier such as the host name.
    Derived(String),
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(_) => f.write_str("Explicit([REDACTED])"),
            Self::Base64(_) => f.write_str("Base64([REDACTED])"),
            Self::Derived(identifier) => f.debug_tuple("Derived").field(identifier).finish(),
        }
    }
}

impl KeySource {
    /// Reads `PORTALSYNC_ENCRYPTION_KEY`, else derives from `HOSTNAME`, else
    /// from a fixed identifier.
    pub fn from_env() -> Self {
        if let Ok(key) = std::env::var(KEY_ENV)
            && !key.trim().is_empty()
        {
            return Self::Base64(key.trim().to_string());
        }
        let identifier = std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_KEY_IDENTIFIER.to_string());
        Self::Derived(identifier)
    }

    /// Resolves the 32-byte key.
    pub fn key(&self) -> Result<[u8; KEY_LEN], CryptoError> {
        let bytes = match self {
            Self::Explicit(bytes) => bytes.clone(),
            Self::Base64(text) => BASE64.decode(text)?,
            Self::Derived(identifier) => Sha256::digest(identifier.as_bytes()).to_vec(),
        };
        <[u8; KEY_LEN]>::try_from(bytes.as_slice()).map_err(|_| CryptoError::KeyLength(bytes.len()))
    }
}

/// Decoded portal credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct EncodedCredentials {
    username: String,
    password_encrypted: String,
    timestamp: String,
}

/// AES-256-GCM cipher for stored passwords.
#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm16,
}

impl fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl CredentialCipher {
    pub fn new(source: &KeySource) -> Result<Self, CryptoError> {
        Ok(Self::from_key(source.key()?))
    }

    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self {
            cipher: Aes256Gcm16::new(Key::<Aes256Gcm16>::from_slice(&key)),
        }
    }

    /// Encrypts `plaintext` into `base64(iv || tag || ciphertext)`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        if plaintext.is_empty() {
            return Err(CryptoError::EmptyPlaintext);
        }

        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        // The AEAD output is ciphertext followed by the tag.
        let sealed = self
            .cipher
            .encrypt(Nonce::<U16>::from_slice(&iv), plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        let mut combined = Vec::with_capacity(IV_LEN + sealed.len());
        combined.extend_from_slice(&iv);
        combined.extend_from_slice(tag);
        combined.extend_from_slice(ciphertext);
        Ok(BASE64.encode(combined))
    }

    /// Reverses [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(CryptoError::EmptyCiphertext);
        }

        let combined = BASE64.decode(encoded)?;
        if combined.len() <= IV_LEN + TAG_LEN {
            return Err(CryptoError::Truncated(combined.len()));
        }
        let (iv, rest) = combined.split_at(IV_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);

        let mut sealed = Vec::with_capacity(rest.len());
        sealed.extend_from_slice(ciphertext);
        sealed.extend_from_slice(tag);

        let plaintext = self
            .cipher
            .decrypt(Nonce::<U16>::from_slice(iv), sealed.as_slice())
            .map_err(|_| CryptoError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::Utf8)
    }

    /// Packs a username and encrypted password into base64 JSON
    /// `{username, password_encrypted, timestamp}`.
    pub fn encode_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<String, CryptoError> {
        let payload = EncodedCredentials {
            username: username.to_string(),
            password_encrypted: self.encrypt(password)?,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let json =
            serde_json::to_vec(&payload).map_err(|e| CryptoError::Payload(e.to_string()))?;
        Ok(BASE64.encode(json))
    }

    /// Unpacks credentials produced by [`encode_credentials`](Self::encode_credentials).
    pub fn decode_credentials(&self, encoded: &str) -> Result<Credentials, CryptoError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(CryptoError::EmptyCiphertext);
        }
        let json = BASE64.decode(encoded)?;
        let payload: EncodedCredentials =
            serde_json::from_slice(&json).map_err(|e| CryptoError::Payload(e.to_string()))?;
        Ok(Credentials {
            password: self.decrypt(&payload.password_encrypted)?,
            username: payload.username,
        })
    }
}

/// SHA-256 of `input`, hex encoded.
pub fn hash_hex(input: &str) -> String {
    Sha256::digest(input.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// True when `input` hashes to `expected` (hex, case-insensitive).
pub fn verify_hash(input: &str, expected: &str) -> bool {
    hash_hex(input).eq_ignore_ascii_case(expected.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> CredentialCipher {
        CredentialCipher::new(&KeySource::Derived("test-host".into())).unwrap()
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let cipher = cipher();
        let sealed = cipher.encrypt("hunter2").unwrap();
        let raw = BASE64.decode(&sealed).unwrap();
        assert_eq!(raw.len(), IV_LEN + TAG_LEN + "hunter2".len());
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "hunter2");
    }

    #[test]
    fn random_iv_per_encryption() {
        let cipher = cipher();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn tampering_is_detected() {
        let cipher = cipher();
        let mut raw = BASE64.decode(cipher.encrypt("hunter2").unwrap()).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let err = cipher.decrypt(&BASE64.encode(raw)).unwrap_err();
        assert!(matches!(err, CryptoError::Decrypt));
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = cipher().encrypt("hunter2").unwrap();
        let other = CredentialCipher::new(&KeySource::Derived("other-host".into())).unwrap();
        assert!(matches!(other.decrypt(&sealed), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn rejects_bad_input() {
        let cipher = cipher();
        assert!(matches!(cipher.encrypt(""), Err(CryptoError::EmptyPlaintext)));
        assert!(matches!(cipher.decrypt("  "), Err(CryptoError::EmptyCiphertext)));
        assert!(matches!(cipher.decrypt("!!not base64!!"), Err(CryptoError::Base64(_))));
        assert!(matches!(
            cipher.decrypt(&BASE64.encode([0u8; 32])),
            Err(CryptoError::Truncated(32))
        ));
    }

    #[test]
    fn key_sources() {
        let key = [7u8; 32];
        let explicit = CredentialCipher::new(&KeySource::Explicit(key.to_vec())).unwrap();
        let encoded = CredentialCipher::new(&KeySource::Base64(BASE64.encode(key))).unwrap();
        let sealed = explicit.encrypt("s3cret").unwrap();
        assert_eq!(encoded.decrypt(&sealed).unwrap(), "s3cret");

        assert!(matches!(
            KeySource::Explicit(vec![1, 2, 3]).key(),
            Err(CryptoError::KeyLength(3))
        ));
        assert!(matches!(
            KeySource::Base64(BASE64.encode([0u8; 16])).key(),
            Err(CryptoError::KeyLength(16))
        ));
        assert_eq!(
            KeySource::Derived("test-host".into()).key().unwrap().to_vec(),
            Sha256::digest(b"test-host").to_vec()
        );
    }

    #[test]
    fn debug_output_is_redacted() {
        let key = KeySource::Base64("c2VjcmV0".into());
        assert!(!format!("{:?}", key).contains("c2VjcmV0"));

        let creds = Credentials {
            username: "alice".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{:?}", creds).contains("hunter2"));
        assert!(!format!("{:?}", cipher()).contains("key: ["));
    }

    #[test]
    fn credentials_encoding() {
        let cipher = cipher();
        let encoded = cipher.encode_credentials("alice", "hunter2").unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&BASE64.decode(&encoded).unwrap()).unwrap();
        assert_eq!(json["username"], "alice");
        assert!(json["password_encrypted"].is_string());
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));

        assert_eq!(
            cipher.decode_credentials(&encoded).unwrap(),
            Credentials {
                username: "alice".into(),
                password: "hunter2".into(),
            }
        );
        assert!(matches!(
            cipher.decode_credentials(&BASE64.encode("{}")),
            Err(CryptoError::Payload(_))
        ));
    }

    #[test]
    fn hashing() {
        assert_eq!(
            hash_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(verify_hash(
            "abc",
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD"
        ));
        assert!(!verify_hash("abd", &hash_hex("abc")));
    }
}
