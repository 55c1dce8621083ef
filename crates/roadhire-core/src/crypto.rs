//! Field-level encryption for SSNs and the admin re-authentication gate.
//!
//! Ciphertext is ChaCha20-Poly1305 under a 256-bit server-held key with a
//! fresh random 96-bit nonce per encryption, stored as
//! `v1:` + base64(`nonce ‖ ciphertext ‖ tag`). Decryption requires a
//! [`Reauthenticated`] proof, which can only be minted by
//! [`AdminCredentials::reauthenticate`].

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use chacha20poly1305::{AeadCore, ChaCha20Poly1305, KeyInit, Nonce, aead::Aead};
use rand_core::{OsRng, RngCore};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::ssn::Ssn;

const CIPHERTEXT_PREFIX: &str = "v1:";
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
  #[error("encryption key must be 32 bytes of hex")]
  InvalidKey,

  #[error("malformed ciphertext")]
  MalformedCiphertext,

  /// Authentication tag mismatch: wrong key or tampered ciphertext.
  #[error("ciphertext failed authentication")]
  Integrity,

  #[error("encryption failed")]
  Encrypt,

  #[error("re-authentication failed")]
  Authorization,
}

// ─── Cipher ──────────────────────────────────────────────────────────────────

/// Encrypts and decrypts SSNs with the server-held key.
pub struct SsnCipher {
  key: Zeroizing<[u8; 32]>,
}

impl SsnCipher {
  pub fn from_bytes(key: [u8; 32]) -> Self {
    Self { key: Zeroizing::new(key) }
  }

  /// Parse a 64-character hex key, as stored in configuration.
  pub fn from_hex(hex_key: &str) -> Result<Self, CryptoError> {
    let bytes = Zeroizing::new(
      hex::decode(hex_key.trim()).map_err(|_| CryptoError::InvalidKey)?,
    );
    let key: [u8; 32] = bytes
      .as_slice()
      .try_into()
      .map_err(|_| CryptoError::InvalidKey)?;
    Ok(Self::from_bytes(key))
  }

  /// Generate a fresh random key, hex encoded.
  pub fn generate_key_hex() -> String {
    let mut key = Zeroizing::new([0u8; 32]);
    OsRng.fill_bytes(&mut key[..]);
    hex::encode(&key[..])
  }

  fn aead(&self) -> ChaCha20Poly1305 {
    ChaCha20Poly1305::new(&(*self.key).into())
  }

  pub fn encrypt(&self, ssn: &Ssn) -> Result<String, CryptoError> {
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let sealed = self
      .aead()
      .encrypt(&nonce, ssn.digits().as_bytes())
      .map_err(|_| CryptoError::Encrypt)?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(format!("{CIPHERTEXT_PREFIX}{}", B64.encode(out)))
  }

  /// Recover the full SSN. Gated on a fresh admin re-authentication.
  pub fn decrypt(
    &self,
    ciphertext: &str,
    _proof: &Reauthenticated,
  ) -> Result<Ssn, CryptoError> {
    let encoded = ciphertext
      .strip_prefix(CIPHERTEXT_PREFIX)
      .ok_or(CryptoError::MalformedCiphertext)?;
    let raw = B64
      .decode(encoded)
      .map_err(|_| CryptoError::MalformedCiphertext)?;
    if raw.len() <= NONCE_LEN {
      return Err(CryptoError::MalformedCiphertext);
    }

    let (nonce, sealed) = raw.split_at(NONCE_LEN);
    let plain = Zeroizing::new(
      self
        .aead()
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| CryptoError::Integrity)?,
    );
    let digits =
      std::str::from_utf8(&plain).map_err(|_| CryptoError::MalformedCiphertext)?;
    Ssn::parse(digits).map_err(|_| CryptoError::MalformedCiphertext)
  }
}

// ─── Re-authentication ───────────────────────────────────────────────────────

/// Credentials an admin re-enters before a privileged read.
#[derive(Clone)]
pub struct AdminCredentials {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Proof that an admin re-entered their password just now.
///
/// Has no public constructor; obtain one from
/// [`AdminCredentials::reauthenticate`].
#[derive(Debug)]
pub struct Reauthenticated {
  username: String,
}

impl Reauthenticated {
  pub fn username(&self) -> &str { &self.username }
}

impl AdminCredentials {
  pub fn reauthenticate(
    &self,
    password: &str,
  ) -> Result<Reauthenticated, CryptoError> {
    if !verify_password(&self.password_hash, password) {
      return Err(CryptoError::Authorization);
    }
    Ok(Reauthenticated { username: self.username.clone() })
  }

  #[cfg(test)]
  pub(crate) fn test_proof(username: &str) -> Reauthenticated {
    Reauthenticated { username: username.to_owned() }
  }
}

/// Check `password` against an argon2 PHC string. Malformed hashes never
/// verify.
pub fn verify_password(password_hash: &str, password: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(password_hash) else {
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}
