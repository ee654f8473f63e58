//! Error taxonomy shared by every key-management operation.
//!
//! Messages are intentionally generic. Callers show them to users verbatim,
//! so no variant carries the offending word, byte offset or the reason an
//! authenticated decryption failed.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Invalid seed phrase")]
    InvalidMnemonic,

    #[error("Seed phrase does not match")]
    SeedMismatch,

    #[error("Password must be at least {min_len} characters and both entries must match")]
    WeakOrMismatchedPassword { min_len: usize },

    #[error("Encryption failed")]
    EncryptionFailure,

    #[error("Wrong password or corrupted backup")]
    WrongPasswordOrCorruptData,

    #[error("Malformed backup: {0}")]
    MalformedBackup(String),

    #[error("Key derivation parameters are below the supported minimum: {0}")]
    WeakKdfParameters(String),

    /// The operating system random source could not be read.
    #[error("Secure random source unavailable")]
    EntropyUnavailable,
}

impl WalletError {
    /// Environment faults that the user cannot fix by retrying input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::EntropyUnavailable)
    }
}

pub type Result<T> = std::result::Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_entropy_failure_is_fatal() {
        assert!(WalletError::EntropyUnavailable.is_fatal());
        assert!(!WalletError::SeedMismatch.is_fatal());
        assert!(!WalletError::WrongPasswordOrCorruptData.is_fatal());
        assert!(!WalletError::MalformedBackup("x".into()).is_fatal());
    }

    #[test]
    fn test_decrypt_failure_message_is_generic() {
        let msg = WalletError::WrongPasswordOrCorruptData.to_string();
        assert_eq!(msg, "Wrong password or corrupted backup");
    }
}
