//! Password-based encryption of private keys
//!
//! A 256-bit key is derived from the password with a deliberately slow KDF
//! and used for AES-256-GCM.
//!
//! # Security Notes
//!
//! - Default KDF is PBKDF2-HMAC-SHA256 at 600 000 iterations; Argon2id is
//!   available for callers who want memory hardness
//! - KDF parameters travel with the ciphertext, so the cost can be raised
//!   later without stranding older backups
//! - Every call draws a fresh 16-byte salt and 12-byte nonce from the OS RNG
//! - A failed tag check is reported as one error whatever the cause
//! - Derived keys are zeroized as soon as the cipher is built

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use hmac::Hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Result, WalletError};

/// Salt length for key derivation
pub const SALT_LEN: usize = 16;

/// Nonce length for AES-256-GCM
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length
pub const TAG_LEN: usize = 16;

const KEY_LEN: usize = 32;

pub const PBKDF2_DEFAULT_ITERATIONS: u32 = 600_000;
pub const PBKDF2_MIN_ITERATIONS: u32 = 100_000;
/// Ten times the default
pub const PBKDF2_MAX_ITERATIONS: u32 = 6_000_000;

/// Argon2id defaults: 64 MiB, 3 passes, 4 lanes
pub const ARGON2_DEFAULT_MEMORY_KIB: u32 = 65_536;
pub const ARGON2_DEFAULT_ITERATIONS: u32 = 3;
pub const ARGON2_DEFAULT_PARALLELISM: u32 = 4;

/// OWASP minimum for Argon2id: 19 MiB, 2 passes
pub const ARGON2_MIN_MEMORY_KIB: u32 = 19_456;
pub const ARGON2_MIN_ITERATIONS: u32 = 2;
/// Argon2id ceilings: 1 GiB, 16 passes, 16 lanes
pub const ARGON2_MAX_MEMORY_KIB: u32 = 1024 * 1024;
pub const ARGON2_MAX_ITERATIONS: u32 = 16;
pub const ARGON2_MAX_PARALLELISM: u32 = 16;

/// Key derivation function and its cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum KdfParams {
    #[serde(rename = "pbkdf2-sha256")]
    Pbkdf2Sha256 { iterations: u32 },

    #[serde(rename = "argon2id", rename_all = "camelCase")]
    Argon2id {
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    },
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::Pbkdf2Sha256 {
            iterations: PBKDF2_DEFAULT_ITERATIONS,
        }
    }
}

impl KdfParams {
    pub fn argon2id_default() -> Self {
        Self::Argon2id {
            memory_kib: ARGON2_DEFAULT_MEMORY_KIB,
            iterations: ARGON2_DEFAULT_ITERATIONS,
            parallelism: ARGON2_DEFAULT_PARALLELISM,
        }
    }

    /// Reject parameters below the supported minimum cost.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Pbkdf2Sha256 { iterations } => {
                if iterations < PBKDF2_MIN_ITERATIONS {
                    return Err(WalletError::WeakKdfParameters(format!(
                        "pbkdf2-sha256 needs at least {} iterations",
                        PBKDF2_MIN_ITERATIONS
                    )));
                }
            }
            Self::Argon2id {
                memory_kib,
                iterations,
                parallelism,
            } => {
                if memory_kib < ARGON2_MIN_MEMORY_KIB
                    || iterations < ARGON2_MIN_ITERATIONS
                    || parallelism == 0
                {
                    return Err(WalletError::WeakKdfParameters(format!(
                        "argon2id needs at least {} KiB, {} passes and 1 lane",
                        ARGON2_MIN_MEMORY_KIB, ARGON2_MIN_ITERATIONS
                    )));
                }
            }
        }
        Ok(())
    }

    /// Costs no honest writer produces; reading them would stall or exhaust
    /// memory.
    pub fn exceeds_limits(&self) -> bool {
        match *self {
            Self::Pbkdf2Sha256 { iterations } => iterations > PBKDF2_MAX_ITERATIONS,
            Self::Argon2id {
                memory_kib,
                iterations,
                parallelism,
            } => {
                memory_kib > ARGON2_MAX_MEMORY_KIB
                    || iterations > ARGON2_MAX_ITERATIONS
                    || parallelism > ARGON2_MAX_PARALLELISM
            }
        }
    }

    /// Short label for logs, e.g. `pbkdf2-sha256/600000`.
    pub fn describe(&self) -> String {
        match *self {
            Self::Pbkdf2Sha256 { iterations } => format!("pbkdf2-sha256/{}", iterations),
            Self::Argon2id {
                memory_kib,
                iterations,
                parallelism,
            } => format!("argon2id/m={},t={},p={}", memory_kib, iterations, parallelism),
        }
    }
}

/// Output of [`encrypt`]: everything except the password needed to decrypt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedKey {
    pub kdf: KdfParams,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext followed by the 16-byte GCM tag
    pub ciphertext: Vec<u8>,
}

/// Derive a 256-bit key from a password.
fn derive_key(
    password: &str,
    salt: &[u8; SALT_LEN],
    kdf: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);

    match *kdf {
        KdfParams::Pbkdf2Sha256 { iterations } => {
            pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, iterations, &mut key[..])
                .map_err(|_| WalletError::EncryptionFailure)?;
        }
        KdfParams::Argon2id {
            memory_kib,
            iterations,
            parallelism,
        } => {
            let params = Params::new(memory_kib, iterations, parallelism, Some(KEY_LEN))
                .map_err(|_| WalletError::EncryptionFailure)?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password_into(password.as_bytes(), salt, &mut key[..])
                .map_err(|_| WalletError::EncryptionFailure)?;
        }
    }

    Ok(key)
}

fn fill_random(buf: &mut [u8]) -> Result<()> {
    fill_from(&mut OsRng, buf)
}

/// Fill `buf` from `rng`; a failing source is fatal.
pub(crate) fn fill_from<R: RngCore + ?Sized>(rng: &mut R, buf: &mut [u8]) -> Result<()> {
    rng.try_fill_bytes(buf).map_err(|e| {
        log::error!("OS random source failed: {}", e);
        WalletError::EntropyUnavailable
    })
}

/// Encrypt a secret under a password.
///
/// The cipher applies no password policy of its own; that is the caller's
/// job. Each call uses a new salt and nonce, so encrypting the same secret
/// twice never yields the same output.
pub fn encrypt(secret: &[u8], password: &str, kdf: &KdfParams) -> Result<EncryptedKey> {
    kdf.validate()?;

    let mut salt = [0u8; SALT_LEN];
    fill_random(&mut salt)?;
    let mut nonce = [0u8; NONCE_LEN];
    fill_random(&mut nonce)?;

    let key = derive_key(password, &salt, kdf)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));
    drop(key);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), secret)
        .map_err(|_| WalletError::EncryptionFailure)?;

    log::debug!("encrypted {} bytes with {}", secret.len(), kdf.describe());

    Ok(EncryptedKey {
        kdf: *kdf,
        salt,
        nonce,
        ciphertext,
    })
}

/// Decrypt with the password used for [`encrypt`].
///
/// # Errors
/// [`WalletError::WrongPasswordOrCorruptData`] for any failure, whether the
/// password is wrong or a single bit of salt, nonce, parameters or
/// ciphertext changed.
pub fn decrypt(encrypted: &EncryptedKey, password: &str) -> Result<Zeroizing<Vec<u8>>> {
    if encrypted.ciphertext.len() < TAG_LEN || encrypted.kdf.exceeds_limits() {
        return Err(WalletError::WrongPasswordOrCorruptData);
    }

    let key = derive_key(password, &encrypted.salt, &encrypted.kdf)
        .map_err(|_| WalletError::WrongPasswordOrCorruptData)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));
    drop(key);

    cipher
        .decrypt(
            Nonce::from_slice(&encrypted.nonce),
            encrypted.ciphertext.as_slice(),
        )
        .map(Zeroizing::new)
        .map_err(|_| WalletError::WrongPasswordOrCorruptData)
}

/// A random source that always fails.
#[cfg(test)]
pub(crate) struct BrokenRng;

#[cfg(test)]
impl RngCore for BrokenRng {
    fn next_u32(&mut self) -> u32 {
        0
    }

    fn next_u64(&mut self) -> u64 {
        0
    }

    fn fill_bytes(&mut self, _dest: &mut [u8]) {}

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        Err(rand::Error::new("entropy source unavailable"))
    }
}
