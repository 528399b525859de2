use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 32;

fn new_hmac(key: &[u8]) -> Result<HmacSha256, AppError> {
    <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| AppError::Crypto(format!("HMAC init failed: {e}")))
}

fn decode_key(name: &str, b64: &str) -> Result<Vec<u8>, AppError> {
    let key = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|e| AppError::Crypto(format!("Invalid {name} base64: {e}")))?;

    if key.len() != 32 {
        return Err(AppError::Crypto(format!(
            "{name} must be 32 bytes, got {}",
            key.len()
        )));
    }
    Ok(key)
}

/// AES-256-GCM for Evernote tokens at rest, HMAC-SHA256 for the session cookie.
#[derive(Clone)]
pub struct CryptoEngine {
    cipher: Aes256Gcm,
    signing_key: Vec<u8>,
}

impl CryptoEngine {
    pub fn new(master_key_b64: &str, session_secret_b64: &str) -> Result<Self, AppError> {
        let master_key = decode_key("MASTER_KEY", master_key_b64)?;
        let signing_key = decode_key("SESSION_SECRET", session_secret_b64)?;

        let cipher = Aes256Gcm::new_from_slice(&master_key)
            .map_err(|e| AppError::Crypto(format!("Failed to init AES cipher: {e}")))?;

        Ok(Self {
            cipher,
            signing_key,
        })
    }

    /// Encrypt a token. Returns base64(nonce || ciphertext).
    pub fn encrypt(&self, plaintext: &str) -> Result<String, AppError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| AppError::Crypto(format!("Encryption failed: {e}")))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
    }

    pub fn decrypt(&self, encrypted_b64: &str) -> Result<String, AppError> {
        let combined = base64::engine::general_purpose::STANDARD
            .decode(encrypted_b64)
            .map_err(|e| AppError::Crypto(format!("Invalid base64: {e}")))?;

        if combined.len() < NONCE_LEN {
            return Err(AppError::Crypto("Ciphertext too short".into()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| AppError::Crypto(format!("Decryption failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::Crypto(format!("Invalid UTF-8 after decrypt: {e}")))
    }

    /// Sign a cookie payload. Returns url-safe base64(hmac || payload).
    pub fn sign(&self, payload: &str) -> Result<String, AppError> {
        let mut mac = new_hmac(&self.signing_key)?;
        mac.update(payload.as_bytes());
        let signature = mac.finalize().into_bytes();

        let mut combined = signature.to_vec();
        combined.extend_from_slice(payload.as_bytes());

        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&combined))
    }

    /// Verify a value produced by [`CryptoEngine::sign`] and return its payload.
    /// `None` on any malformed or tampered input.
    pub fn verify(&self, signed: &str) -> Option<String> {
        let combined = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(signed)
            .ok()?;

        if combined.len() < TAG_LEN {
            return None;
        }
        let (signature, payload) = combined.split_at(TAG_LEN);

        let mut mac = new_hmac(&self.signing_key).ok()?;
        mac.update(payload);
        mac.verify_slice(signature).ok()?;

        String::from_utf8(payload.to_vec()).ok()
    }
}

#[cfg(test)]
pub(crate) fn test_engine() -> CryptoEngine {
    let config = crate::config::test_config();
    CryptoEngine::new(&config.master_key, &config.session_secret).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_encryption_hides_plaintext() {
        let engine = test_engine();
        let token = "S=s1:U=8f2a1:E=16b:C=16a:P=1cd:A=remarker:V=2:H=0f3e";
        let encrypted = engine.encrypt(token).unwrap();
        assert!(!encrypted.contains("remarker"));
        assert_eq!(engine.decrypt(&encrypted).unwrap(), token);
    }

    #[test]
    fn test_encrypt_uses_fresh_nonce() {
        let engine = test_engine();
        assert_ne!(
            engine.encrypt("same-input").unwrap(),
            engine.encrypt("same-input").unwrap()
        );
    }

    #[test]
    fn test_decrypt_rejects_short_input() {
        let engine = test_engine();
        let short = base64::engine::general_purpose::STANDARD.encode([1u8; 4]);
        assert!(engine.decrypt(&short).is_err());
    }

    #[test]
    fn test_signed_cookie_value() {
        let engine = test_engine();
        let signed = engine.sign("3f1c9a52-8a1e-4c57-9f1d-7b2c0e0d6a11").unwrap();
        assert_eq!(
            engine.verify(&signed).as_deref(),
            Some("3f1c9a52-8a1e-4c57-9f1d-7b2c0e0d6a11")
        );
    }

    #[test]
    fn test_tampered_cookie_rejected() {
        let engine = test_engine();
        let signed = engine.sign("client").unwrap();
        assert!(engine.verify(&format!("{signed}X")).is_none());
        assert!(engine.verify("not base64 !!").is_none());

        let other = CryptoEngine::new(
            &base64::engine::general_purpose::STANDARD.encode([0x42u8; 32]),
            &base64::engine::general_purpose::STANDARD.encode([0x44u8; 32]),
        )
        .unwrap();
        assert!(other.verify(&signed).is_none());
    }

    #[test]
    fn test_rejects_wrong_key_length() {
        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        let ok = base64::engine::general_purpose::STANDARD.encode([0u8; 32]);
        assert!(CryptoEngine::new(&short, &ok).is_err());
        assert!(CryptoEngine::new(&ok, &short).is_err());
    }
}
