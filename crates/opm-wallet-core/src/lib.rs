//! OPM Wallet Core
//!
//! Key management for a non-custodial EVM wallet.
//!
//! # Key Derivation
//!
//! - New wallets get a 12-word BIP-39 phrase
//! - 12- and 24-word phrases can be imported
//! - The account key is derived via BIP-44: m/44'/60'/0'/0/0
//!
//! # Encrypted Backup
//!
//! Private keys are encrypted with PBKDF2-SHA256 (or Argon2id) + AES-256-GCM
//! and written as a versioned JSON document. The phrase is never persisted.

pub mod address;
pub mod backup;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod memory;
pub mod password;
pub mod seed;

pub use address::{is_valid_address, to_checksum_address};
pub use backup::{backup_file_name, deserialize, restore, serialize, BackupDocument};
pub use crypto::{decrypt, encrypt, EncryptedKey, KdfParams};
pub use error::{Result, WalletError};
pub use keys::{
    generate, import_from_mnemonic, import_from_private_key, KeyMaterial, ETH_DERIVATION_PATH,
};
pub use password::{assess as assess_password, check_policy as check_password_policy};
pub use seed::{is_valid_mnemonic, normalize_phrase, phrases_match};
