//! Encrypted wallet backup file
//!
//! The backup is the only artifact that ever leaves the process. It is a JSON
//! document carrying the public address, the KDF parameters and the AES-GCM
//! output, all binary fields as standard padded base64. The recovery phrase
//! is never written.
//!
//! Version 1 documents written by the browser dashboard stored `encryptedKey`
//! as a single base64 string wrapping `{salt, iv, data}` byte arrays, with
//! the `0x`-hex private key as plaintext. Those are still read so existing
//! users can restore.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::address::is_valid_address;
use crate::crypto::{decrypt, EncryptedKey, KdfParams, NONCE_LEN, SALT_LEN, TAG_LEN};
use crate::error::{Result, WalletError};
use crate::keys::{import_from_private_key, import_from_private_key_bytes, KeyMaterial, PRIVATE_KEY_LEN};

/// The only document version this crate reads or writes.
pub const BACKUP_VERSION: u32 = 1;

/// Value of the `platform` field in documents we write.
pub const PLATFORM: &str = "opm-wallet-rs";

pub const CIPHER_NAME: &str = "aes-256-gcm";

/// Iteration count of the dashboard's PBKDF2-SHA256 backups.
pub const LEGACY_PBKDF2_ITERATIONS: u32 = 100_000;

pub const NON_CUSTODY_WARNING: &str = "This file contains your encrypted wallet. Keep it safe and \
never share your password. OnePremium never holds your keys: if you lose this file, your \
password and your seed phrase, nobody can recover your funds.";

/// How the decrypted plaintext is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaintextFormat {
    /// The 32 raw private key bytes
    RawKey,
    /// UTF-8 `0x`-hex private key, as the dashboard wrote it
    LegacyHex,
}

/// A parsed backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupDocument {
    pub version: u32,
    pub platform: String,
    pub address: String,
    pub encrypted: EncryptedKey,
    pub plaintext: PlaintextFormat,
    pub created_at: Option<String>,
    pub warning: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDocument {
    version: u32,
    platform: String,
    address: String,
    encrypted_key: WireEncryptedKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireEncryptedKey {
    Current(WireCipherBlob),
    Legacy(String),
}

#[derive(Serialize, Deserialize)]
struct WireCipherBlob {
    cipher: String,
    kdf: KdfParams,
    salt: String,
    iv: String,
    ciphertext: String,
}

#[derive(Deserialize)]
struct LegacyBlob {
    salt: Vec<u8>,
    iv: Vec<u8>,
    data: Vec<u8>,
}

fn malformed(reason: impl Into<String>) -> WalletError {
    WalletError::MalformedBackup(reason.into())
}

impl BackupDocument {
    /// Wrap freshly encrypted key material, stamped with the current time.
    pub fn new(address: &str, encrypted: EncryptedKey) -> Result<Self> {
        if !is_valid_address(address) {
            return Err(malformed("invalid address"));
        }

        Ok(Self {
            version: BACKUP_VERSION,
            platform: PLATFORM.to_string(),
            address: address.to_string(),
            encrypted,
            plaintext: PlaintextFormat::RawKey,
            created_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            warning: Some(NON_CUSTODY_WARNING.to_string()),
        })
    }

    /// Pretty-printed JSON. Legacy documents are re-encoded in the legacy
    /// shape so a read/write cycle never changes how plaintext is decoded.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let encrypted_key = match self.plaintext {
            PlaintextFormat::RawKey => WireEncryptedKey::Current(WireCipherBlob {
                cipher: CIPHER_NAME.to_string(),
                kdf: self.encrypted.kdf,
                salt: BASE64.encode(self.encrypted.salt),
                iv: BASE64.encode(self.encrypted.nonce),
                ciphertext: BASE64.encode(&self.encrypted.ciphertext),
            }),
            PlaintextFormat::LegacyHex => {
                let blob = serde_json::json!({
                    "salt": self.encrypted.salt.to_vec(),
                    "iv": self.encrypted.nonce.to_vec(),
                    "data": self.encrypted.ciphertext,
                });
                WireEncryptedKey::Legacy(BASE64.encode(blob.to_string()))
            }
        };

        let wire = WireDocument {
            version: self.version,
            platform: self.platform.clone(),
            address: self.address.clone(),
            encrypted_key,
            created_at: self.created_at.clone(),
            warning: self.warning.clone(),
        };
        serde_json::to_vec_pretty(&wire).map_err(|e| malformed(e.to_string()))
    }

    /// Parse and validate a backup file.
    ///
    /// The version is checked before anything else so a future schema is
    /// never half-interpreted with today's rules.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|_| malformed("not a JSON document"))?;

        let version = value
            .get("version")
            .ok_or_else(|| malformed("missing version"))?
            .as_u64()
            .ok_or_else(|| malformed("version must be an integer"))?;
        if version != u64::from(BACKUP_VERSION) {
            return Err(malformed(format!("unsupported version {}", version)));
        }

        let wire: WireDocument =
            serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;

        if !is_valid_address(&wire.address) {
            return Err(malformed("invalid address"));
        }

        let (encrypted, plaintext) = match wire.encrypted_key {
            WireEncryptedKey::Current(blob) => (decode_current(blob)?, PlaintextFormat::RawKey),
            WireEncryptedKey::Legacy(encoded) => {
                (decode_legacy(&encoded)?, PlaintextFormat::LegacyHex)
            }
        };

        Ok(Self {
            version: wire.version,
            platform: wire.platform,
            address: wire.address,
            encrypted,
            plaintext,
            created_at: wire.created_at,
            warning: wire.warning,
        })
    }
}

fn decode_fixed<const N: usize>(field: &str, encoded: &str) -> Result<[u8; N]> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|_| malformed(format!("{} is not valid base64", field)))?;
    bytes
        .try_into()
        .map_err(|_| malformed(format!("{} must be {} bytes", field, N)))
}

fn check_kdf(kdf: &KdfParams) -> Result<()> {
    kdf.validate().map_err(|_| malformed("key derivation cost below minimum"))?;
    if kdf.exceeds_limits() {
        return Err(malformed("key derivation cost out of range"));
    }
    Ok(())
}

fn decode_current(blob: WireCipherBlob) -> Result<EncryptedKey> {
    if blob.cipher != CIPHER_NAME {
        return Err(malformed(format!("unsupported cipher {}", blob.cipher)));
    }
    check_kdf(&blob.kdf)?;

    let salt = decode_fixed::<SALT_LEN>("salt", &blob.salt)?;
    let nonce = decode_fixed::<NONCE_LEN>("iv", &blob.iv)?;
    let ciphertext = BASE64
        .decode(&blob.ciphertext)
        .map_err(|_| malformed("ciphertext is not valid base64"))?;
    if ciphertext.len() <= TAG_LEN {
        return Err(malformed("ciphertext too short"));
    }

    Ok(EncryptedKey {
        kdf: blob.kdf,
        salt,
        nonce,
        ciphertext,
    })
}

fn decode_legacy(encoded: &str) -> Result<EncryptedKey> {
    let json = BASE64
        .decode(encoded)
        .map_err(|_| malformed("encryptedKey is not valid base64"))?;
    let blob: LegacyBlob =
        serde_json::from_slice(&json).map_err(|_| malformed("encryptedKey payload is malformed"))?;

    let salt: [u8; SALT_LEN] = blob
        .salt
        .try_into()
        .map_err(|_| malformed(format!("salt must be {} bytes", SALT_LEN)))?;
    let nonce: [u8; NONCE_LEN] = blob
        .iv
        .try_into()
        .map_err(|_| malformed(format!("iv must be {} bytes", NONCE_LEN)))?;
    if blob.data.len() <= TAG_LEN {
        return Err(malformed("ciphertext too short"));
    }

    Ok(EncryptedKey {
        kdf: KdfParams::Pbkdf2Sha256 {
            iterations: LEGACY_PBKDF2_ITERATIONS,
        },
        salt,
        nonce,
        ciphertext: blob.data,
    })
}

/// Build the backup document bytes for an encrypted key.
pub fn serialize(address: &str, encrypted: &EncryptedKey) -> Result<Vec<u8>> {
    BackupDocument::new(address, encrypted.clone())?.to_json()
}

/// Parse backup document bytes.
pub fn deserialize(bytes: &[u8]) -> Result<BackupDocument> {
    BackupDocument::from_json(bytes)
}

/// Decrypt a backup and rebuild its key material.
///
/// The address derived from the decrypted key must match the one stored in
/// the document. A mismatch means the file was altered and is reported the
/// same way as a wrong password.
pub fn restore(document: &BackupDocument, password: &str) -> Result<KeyMaterial> {
    let plaintext = decrypt(&document.encrypted, password)?;

    let mut material = match document.plaintext {
        PlaintextFormat::RawKey => {
            let mut secret: [u8; PRIVATE_KEY_LEN] = plaintext
                .as_slice()
                .try_into()
                .map_err(|_| WalletError::WrongPasswordOrCorruptData)?;
            import_from_private_key_bytes(&mut secret)
        }
        PlaintextFormat::LegacyHex => std::str::from_utf8(&plaintext)
            .map_err(|_| WalletError::WrongPasswordOrCorruptData)
            .and_then(import_from_private_key),
    }
    .map_err(|_| WalletError::WrongPasswordOrCorruptData)?;

    if !material.address().eq_ignore_ascii_case(&document.address) {
        log::warn!("backup address does not match its decrypted key");
        material.wipe();
        return Err(WalletError::WrongPasswordOrCorruptData);
    }

    log::info!("restored wallet {}", material.address());
    Ok(material)
}

/// Download file name used by the dashboard: `opm-wallet-0x1234ab-backup.json`.
pub fn backup_file_name(address: &str) -> String {
    let prefix: String = address.chars().take(8).collect();
    format!("opm-wallet-{}-backup.json", prefix)
}
