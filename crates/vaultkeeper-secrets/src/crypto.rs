//! Three-tier envelope encryption: master key -> per-user KEK -> per-secret DEK.
//!
//! A user's KEK is never stored. It is re-derived on every call with
//! PBKDF2-HMAC-SHA256 over `master_key || user_id` and a per-secret salt, so
//! only the salt has to be persisted. Each secret value is sealed with
//! AES-256-GCM under a fresh random DEK, and the DEK is wrapped under the KEK.
//!
//! Wrapped DEK layout:
//!
//! ```text
//! version (1) || nonce (12) || commitment (32) || AES-GCM(DEK) + tag (48)
//! ```
//!
//! The KEK is split with HKDF-SHA256 into a wrap key and a commitment key.
//! The commitment is an HMAC over the wrap nonce and is checked before the
//! GCM open, which binds the wrapped DEK to exactly one KEK.

use std::num::NonZeroU32;

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use ring::pbkdf2;
use sha2::Sha256;
use tracing::warn;
use vaultkeeper_core::config::MIN_KDF_ITERATIONS;
use zeroize::Zeroizing;

use crate::error::{Result, SecretError};

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const SALT_SIZE: usize = 32;
const TAG_SIZE: usize = 16;
const COMMITMENT_SIZE: usize = 32;

const WRAP_VERSION: u8 = 0x01;
const WRAPPED_DEK_LEN: usize = 1 + NONCE_SIZE + COMMITMENT_SIZE + KEY_SIZE + TAG_SIZE;

const HKDF_WRAP_INFO: &[u8] = b"vaultkeeper-dek-wrap-v1";
const HKDF_COMMIT_INFO: &[u8] = b"vaultkeeper-dek-commit-v1";
const COMMIT_LABEL: &[u8] = b"dek-wrap";

type HmacSha256 = Hmac<Sha256>;

/// Process-wide root key. Constructed once at startup and injected.
pub struct MasterKey(Zeroizing<[u8; KEY_SIZE]>);

impl MasterKey {
    /// Build a master key from exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(SecretError::KeySource(format!(
                "master key must be exactly {KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Generate a new random master key.
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        rand::thread_rng().fill_bytes(&mut key[..]);
        Self(key)
    }

    /// Short non-reversible identifier, safe to log.
    pub fn fingerprint(&self) -> String {
        vaultkeeper_core::id::sha256_hex(&self.0[..])[..16].to_string()
    }

    /// Hex encoding of the key, for export to a key file or terminal.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&self.0[..]))
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0[..]
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// A per-user key-encryption key. Lives only for the duration of one call.
pub struct UserKek(Zeroizing<[u8; KEY_SIZE]>);

impl UserKek {
    fn split(&self) -> (Zeroizing<[u8; KEY_SIZE]>, Zeroizing<[u8; KEY_SIZE]>) {
        let hk = Hkdf::<Sha256>::new(None, &self.0[..]);
        let mut wrap_key = Zeroizing::new([0u8; KEY_SIZE]);
        let mut commit_key = Zeroizing::new([0u8; KEY_SIZE]);
        // expand cannot fail when output length <= 255 * hash-length
        hk.expand(HKDF_WRAP_INFO, &mut wrap_key[..])
            .expect("HKDF expand should not fail for 32-byte output");
        hk.expand(HKDF_COMMIT_INFO, &mut commit_key[..])
            .expect("HKDF expand should not fail for 32-byte output");
        (wrap_key, commit_key)
    }

    #[cfg(test)]
    fn bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl std::fmt::Debug for UserKek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("UserKek([REDACTED])")
    }
}

/// A per-secret data-encryption key.
pub struct Dek(Zeroizing<[u8; KEY_SIZE]>);

impl std::fmt::Debug for Dek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Dek([REDACTED])")
    }
}

/// Output of [`EnvelopeCipher::encrypt`]. Everything here is safe to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedValue {
    pub ciphertext: Vec<u8>,
    pub dek_encrypted: Vec<u8>,
    pub kek_salt: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
}

/// Output of [`EnvelopeCipher::rotate_dek`]. The KEK salt is unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatedValue {
    pub ciphertext: Vec<u8>,
    pub dek_encrypted: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
}

/// Envelope cipher bound to one master key.
///
/// Holds no per-user state: KEKs are derived per call and dropped
/// (zeroized) before the call returns.
pub struct EnvelopeCipher {
    master_key: MasterKey,
    iterations: NonZeroU32,
}

impl std::fmt::Debug for EnvelopeCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeCipher")
            .field("master_key", &self.master_key.fingerprint())
            .field("iterations", &self.iterations)
            .finish()
    }
}

impl EnvelopeCipher {
    /// Create a cipher using the minimum production iteration count.
    pub fn new(master_key: MasterKey) -> Self {
        Self {
            master_key,
            iterations: NonZeroU32::new(MIN_KDF_ITERATIONS).unwrap_or(NonZeroU32::MIN),
        }
    }

    /// Create a cipher with an explicit PBKDF2 iteration count.
    ///
    /// Counts below the production minimum are accepted with a warning so
    /// tests and benchmarks can run quickly; configuration validation is
    /// what keeps them out of deployments.
    pub fn with_iterations(master_key: MasterKey, iterations: u32) -> Result<Self> {
        let iterations = NonZeroU32::new(iterations)
            .ok_or_else(|| SecretError::validation("kdf iterations must be non-zero"))?;
        if iterations.get() < MIN_KDF_ITERATIONS {
            warn!(
                iterations = iterations.get(),
                minimum = MIN_KDF_ITERATIONS,
                "KEK derivation below production iteration count"
            );
        }
        Ok(Self {
            master_key,
            iterations,
        })
    }

    /// PBKDF2 iteration count in use.
    pub fn iterations(&self) -> u32 {
        self.iterations.get()
    }

    /// Derive the KEK for `user_id`. A fresh 32-byte salt is generated when
    /// `salt` is `None`; the salt actually used is returned alongside the key.
    pub fn derive_user_kek(
        &self,
        user_id: &str,
        salt: Option<&[u8]>,
    ) -> Result<(UserKek, Vec<u8>)> {
        if user_id.is_empty() {
            return Err(SecretError::validation("user_id must not be empty"));
        }
        let salt = match salt {
            Some(s) if s.is_empty() => {
                return Err(SecretError::validation("kek salt must not be empty"));
            }
            Some(s) => s.to_vec(),
            None => {
                let mut s = vec![0u8; SALT_SIZE];
                rand::thread_rng().fill_bytes(&mut s);
                s
            }
        };

        let mut secret = Zeroizing::new(Vec::with_capacity(KEY_SIZE + user_id.len()));
        secret.extend_from_slice(self.master_key.expose());
        secret.extend_from_slice(user_id.as_bytes());

        let mut kek = Zeroizing::new([0u8; KEY_SIZE]);
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            self.iterations,
            &salt,
            &secret,
            &mut kek[..],
        );
        Ok((UserKek(kek), salt))
    }

    /// Generate a random 256-bit DEK.
    pub fn generate_dek() -> Dek {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        rand::thread_rng().fill_bytes(&mut key[..]);
        Dek(key)
    }

    /// Encrypt `plaintext` for `user_id`.
    ///
    /// Pass the stored `kek_salt` to keep using the same KEK for an existing
    /// secret, or `None` to start a new one.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        user_id: &str,
        kek_salt: Option<&[u8]>,
    ) -> Result<EncryptedValue> {
        let (kek, kek_salt) = self.derive_user_kek(user_id, kek_salt)?;
        let (ciphertext, dek_encrypted, nonce) = seal_under_new_dek(&kek, plaintext, user_id)?;
        Ok(EncryptedValue {
            ciphertext,
            dek_encrypted,
            kek_salt,
            nonce,
        })
    }

    /// Decrypt a value produced by [`EnvelopeCipher::encrypt`].
    ///
    /// Every failure (bad salt, wrong user, failed unwrap, failed tag check)
    /// is reported as [`SecretError::DecryptionFailed`].
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        dek_encrypted: &[u8],
        kek_salt: &[u8],
        nonce: &[u8],
        user_id: &str,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let (kek, _) = self
            .derive_user_kek(user_id, Some(kek_salt))
            .map_err(|_| SecretError::DecryptionFailed)?;
        open_with_wrapped_dek(&kek, ciphertext, dek_encrypted, nonce, user_id)
    }

    /// Re-encrypt a value under a fresh DEK and nonce. The KEK does not rotate.
    pub fn rotate_dek(
        &self,
        ciphertext: &[u8],
        old_dek_encrypted: &[u8],
        kek_salt: &[u8],
        nonce: &[u8],
        user_id: &str,
    ) -> Result<RotatedValue> {
        let (kek, _) = self
            .derive_user_kek(user_id, Some(kek_salt))
            .map_err(|_| SecretError::DecryptionFailed)?;
        let plaintext = open_with_wrapped_dek(&kek, ciphertext, old_dek_encrypted, nonce, user_id)?;
        let (ciphertext, dek_encrypted, nonce) = seal_under_new_dek(&kek, &plaintext, user_id)?;
        Ok(RotatedValue {
            ciphertext,
            dek_encrypted,
            nonce,
        })
    }
}

/// One-way SHA-256 digest for external integrity commitment.
pub fn hash_for_anchor(plaintext: &[u8]) -> String {
    vaultkeeper_core::id::sha256_hex(plaintext)
}

fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

fn seal_under_new_dek(
    kek: &UserKek,
    plaintext: &[u8],
    user_id: &str,
) -> Result<(Vec<u8>, Vec<u8>, [u8; NONCE_SIZE])> {
    let dek = EnvelopeCipher::generate_dek();
    let nonce = random_nonce();

    let cipher = Aes256Gcm::new_from_slice(&dek.0[..])
        .map_err(|e| SecretError::EncryptionFailed(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| SecretError::EncryptionFailed(e.to_string()))?;

    let dek_encrypted = wrap_dek(kek, &dek, user_id)?;
    Ok((ciphertext, dek_encrypted, nonce))
}

fn open_with_wrapped_dek(
    kek: &UserKek,
    ciphertext: &[u8],
    dek_encrypted: &[u8],
    nonce: &[u8],
    user_id: &str,
) -> Result<Zeroizing<Vec<u8>>> {
    if nonce.len() != NONCE_SIZE || ciphertext.len() < TAG_SIZE {
        return Err(SecretError::DecryptionFailed);
    }
    let dek = unwrap_dek(kek, dek_encrypted, user_id)?;
    let cipher =
        Aes256Gcm::new_from_slice(&dek.0[..]).map_err(|_| SecretError::DecryptionFailed)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| SecretError::DecryptionFailed)
}

fn commitment(commit_key: &[u8], nonce: &[u8]) -> Result<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(commit_key)
        .map_err(|e| SecretError::EncryptionFailed(e.to_string()))?;
    mac.update(COMMIT_LABEL);
    mac.update(nonce);
    Ok(mac)
}

fn wrap_dek(kek: &UserKek, dek: &Dek, user_id: &str) -> Result<Vec<u8>> {
    let (wrap_key, commit_key) = kek.split();
    let nonce = random_nonce();

    let tag = commitment(&commit_key[..], &nonce)?.finalize().into_bytes();

    let cipher = Aes256Gcm::new_from_slice(&wrap_key[..])
        .map_err(|e| SecretError::EncryptionFailed(e.to_string()))?;
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &dek.0[..],
                aad: user_id.as_bytes(),
            },
        )
        .map_err(|e| SecretError::EncryptionFailed(e.to_string()))?;

    let mut out = Vec::with_capacity(WRAPPED_DEK_LEN);
    out.push(WRAP_VERSION);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&tag);
    out.extend_from_slice(&sealed);
    Ok(out)
}

fn unwrap_dek(kek: &UserKek, wrapped: &[u8], user_id: &str) -> Result<Dek> {
    if wrapped.len() != WRAPPED_DEK_LEN || wrapped[0] != WRAP_VERSION {
        return Err(SecretError::DecryptionFailed);
    }
    let (nonce, rest) = wrapped[1..].split_at(NONCE_SIZE);
    let (tag, sealed) = rest.split_at(COMMITMENT_SIZE);

    let (wrap_key, commit_key) = kek.split();
    commitment(&commit_key[..], nonce)
        .map_err(|_| SecretError::DecryptionFailed)?
        .verify_slice(tag)
        .map_err(|_| SecretError::DecryptionFailed)?;

    let cipher =
        Aes256Gcm::new_from_slice(&wrap_key[..]).map_err(|_| SecretError::DecryptionFailed)?;
    let raw = Zeroizing::new(
        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: user_id.as_bytes(),
                },
            )
            .map_err(|_| SecretError::DecryptionFailed)?,
    );
    if raw.len() != KEY_SIZE {
        return Err(SecretError::DecryptionFailed);
    }
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(&raw);
    Ok(Dek(key))
}
