use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use service_core::error::AppError;

// ==================== Constants ====================

/// AES-256 key length in bytes.
pub const KEY_LENGTH: usize = 32;

/// GCM nonce length in bytes. A fresh random nonce is generated for every
/// encryption and prepended to the ciphertext.
pub const NONCE_LENGTH: usize = 12;

/// GCM authentication tag length in bytes.
pub const TAG_LENGTH: usize = 16;

// ==================== Cipher ====================

/// AES-256-GCM cipher for secrets at rest. Output layout is
/// `nonce || ciphertext+tag`, so each record carries its own nonce and no
/// nonce is ever reused across records.
#[derive(Clone)]
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher").field("key", &"[REDACTED]").finish()
    }
}

impl SecretCipher {
    pub fn new(key: &[u8]) -> Result<Self, AppError> {
        if key.len() != KEY_LENGTH {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "encryption key must be {} bytes, got {}",
                KEY_LENGTH,
                key.len()
            )));
        }
        let key = Key::<Aes256Gcm>::from_slice(key);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Builds a cipher from a base64-encoded 32-byte key, the form the key
    /// takes in configuration.
    pub fn from_base64(key_base64: &str) -> Result<Self, AppError> {
        let key = BASE64
            .decode(key_base64.trim())
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("encryption key is not valid base64: {}", e)))?;
        Self::new(&key)
    }

    /// Generates a fresh random key, base64 encoded for storage in
    /// configuration.
    pub fn generate_key() -> String {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        BASE64.encode(key)
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, AppError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("encryption failed")))?;

        let mut combined = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(combined)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, AppError> {
        if data.len() < NONCE_LENGTH + TAG_LENGTH {
            return Err(AppError::InternalError(anyhow::anyhow!(
                "ciphertext too short to contain nonce and tag"
            )));
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LENGTH);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("decryption failed")))
    }

    /// Encrypts a string and returns the result base64 encoded, the form
    /// stored in TEXT columns.
    pub fn encrypt_string(&self, plaintext: &str) -> Result<String, AppError> {
        let combined = self.encrypt(plaintext.as_bytes())?;
        Ok(BASE64.encode(combined))
    }

    pub fn decrypt_string(&self, encoded: &str) -> Result<String, AppError> {
        let combined = BASE64
            .decode(encoded)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("stored ciphertext is not valid base64: {}", e)))?;
        let plaintext = self.decrypt(&combined)?;
        String::from_utf8(plaintext)
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("decrypted data is not valid UTF-8")))
    }
}

// ==================== Tests ====================
