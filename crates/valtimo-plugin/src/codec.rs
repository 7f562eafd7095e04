//! Secret property codec
//!
//! New values are written as AES-128-GCM with a random 96-bit nonce:
//!
//! ```text
//! {AES/GCM/NoPadding}<base64(nonce || ciphertext || tag)>
//! ```
//!
//! Values without the prefix come from the legacy scheme (AES-128-ECB with
//! PKCS#7 padding, base64 encoded). They are still read but never written.

use crate::errors::CodecError;
use aes_gcm::aead::{Aead, AeadCore, OsRng};
use aes_gcm::aes::cipher::BlockDecrypt;
use aes_gcm::aes::{Aes128, Block};
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde_json::{Map, Value};
use std::fmt;
use valtimo_definitions::{PluginDefinition, ValueType};

pub const GCM_PREFIX: &str = "{AES/GCM/NoPadding}";
pub const KEY_LENGTH: usize = 16;

const NONCE_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;
const BLOCK_LENGTH: usize = 16;

#[derive(Clone)]
pub struct Encryptor {
    gcm: Aes128Gcm,
    legacy: Aes128,
}

impl fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encryptor").finish_non_exhaustive()
    }
}

impl Encryptor {
    pub fn new(secret: &[u8]) -> Result<Self, CodecError> {
        if secret.len() != KEY_LENGTH {
            return Err(CodecError::InvalidKeyLength(secret.len()));
        }
        let gcm = <Aes128Gcm as KeyInit>::new_from_slice(secret)
            .map_err(|_| CodecError::InvalidKeyLength(secret.len()))?;
        let legacy = <Aes128 as KeyInit>::new_from_slice(secret)
            .map_err(|_| CodecError::InvalidKeyLength(secret.len()))?;
        Ok(Encryptor { gcm, legacy })
    }

    /// Encrypt with a fresh nonce; two calls never produce the same text.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CodecError> {
        let nonce = Aes128Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .gcm
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CodecError::EncryptionFailed(e.to_string()))?;

        let mut payload = Vec::with_capacity(NONCE_LENGTH + sealed.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&sealed);
        Ok(format!("{}{}", GCM_PREFIX, BASE64_STANDARD.encode(payload)))
    }

    pub fn decrypt(&self, text: &str) -> Result<String, CodecError> {
        match text.strip_prefix(GCM_PREFIX) {
            Some(encoded) => self.decrypt_gcm(encoded),
            None => self.decrypt_legacy(text),
        }
    }

    fn decrypt_gcm(&self, encoded: &str) -> Result<String, CodecError> {
        let payload = decode(encoded)?;
        if payload.len() < NONCE_LENGTH + TAG_LENGTH {
            return Err(CodecError::DecryptionFailed(format!(
                "payload of {} bytes is too short",
                payload.len()
            )));
        }
        let (nonce, sealed) = payload.split_at(NONCE_LENGTH);
        let plain = self
            .gcm
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CodecError::DecryptionFailed("authentication failed".to_string()))?;
        utf8(plain)
    }

    fn decrypt_legacy(&self, encoded: &str) -> Result<String, CodecError> {
        let mut data = decode(encoded)?;
        if data.is_empty() || data.len() % BLOCK_LENGTH != 0 {
            return Err(CodecError::DecryptionFailed(format!(
                "legacy payload of {} bytes is not block aligned",
                data.len()
            )));
        }

        for chunk in data.chunks_exact_mut(BLOCK_LENGTH) {
            let block = Block::from_mut_slice(chunk);
            self.legacy.decrypt_block(block);
        }

        let pad = usize::from(data[data.len() - 1]);
        if pad == 0
            || pad > BLOCK_LENGTH
            || !data[data.len() - pad..].iter().all(|&b| usize::from(b) == pad)
        {
            return Err(CodecError::DecryptionFailed("invalid padding".to_string()));
        }
        data.truncate(data.len() - pad);
        utf8(data)
    }

    // =========================================================================
    // PROPERTY BAGS
    // =========================================================================

    /// Encrypt the secret properties of a bag. Everything else is copied as is.
    pub fn encrypt_properties(
        &self,
        definition: &PluginDefinition,
        properties: &Map<String, Value>,
    ) -> Result<Map<String, Value>, CodecError> {
        let mut raw = properties.clone();
        for property in definition.secret_properties() {
            let Some(value) = raw.get_mut(property.name.as_ref()) else {
                continue;
            };
            let plaintext = match &*value {
                Value::Null => continue,
                Value::String(text) if is_text(&property.value_type) => text.clone(),
                other => serde_json::to_string(other)
                    .map_err(|e| CodecError::EncryptionFailed(e.to_string()))?,
            };
            *value = Value::String(self.encrypt(&plaintext)?);
        }
        Ok(raw)
    }

    /// Decrypt the secret properties of a stored bag.
    pub fn decrypt_properties(
        &self,
        definition: &PluginDefinition,
        raw: &Map<String, Value>,
    ) -> Result<Map<String, Value>, CodecError> {
        let mut properties = raw.clone();
        for property in definition.secret_properties() {
            let Some(value) = properties.get_mut(property.name.as_ref()) else {
                continue;
            };
            let plaintext = match value {
                Value::Null => continue,
                Value::String(text) => self.decrypt(text)?,
                _ => {
                    return Err(CodecError::DecryptionFailed(format!(
                        "secret property '{}' is not an encrypted string",
                        property.name
                    )))
                }
            };
            *value = restore(&property.value_type, plaintext);
        }
        Ok(properties)
    }
}

/// Text-shaped secrets are stored as their raw text, everything else as JSON text.
fn is_text(value_type: &ValueType) -> bool {
    matches!(
        value_type,
        ValueType::String
            | ValueType::Uri
            | ValueType::Uuid
            | ValueType::Configuration
            | ValueType::Enum(_)
    )
}

/// Plaintext that is not valid JSON stays a string so older rows keep loading.
fn restore(value_type: &ValueType, plaintext: String) -> Value {
    if is_text(value_type) {
        return Value::String(plaintext);
    }
    serde_json::from_str(&plaintext).unwrap_or(Value::String(plaintext))
}

fn decode(encoded: &str) -> Result<Vec<u8>, CodecError> {
    BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|e| CodecError::DecryptionFailed(format!("invalid base64: {}", e)))
}

fn utf8(bytes: Vec<u8>) -> Result<String, CodecError> {
    String::from_utf8(bytes)
        .map_err(|_| CodecError::DecryptionFailed("plaintext is not UTF-8".to_string()))
}
