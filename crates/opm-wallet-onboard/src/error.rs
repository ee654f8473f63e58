use opm_wallet_core::WalletError;
use thiserror::Error;

use crate::session::Stage;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OnboardingError {
    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("This action is not available during the {0} step")]
    WrongStage(Stage),

    #[error("All risk disclaimers must be accepted first")]
    DisclaimersNotAccepted,

    #[error("Could not save the backup file: {0}")]
    BackupHandoff(String),

    #[error("Could not connect the wallet: {0}")]
    SessionHandoff(String),

    /// Another operation holds the session.
    #[error("Another wallet operation is in progress")]
    SessionBusy,

    #[error("Wallet operation was interrupted")]
    Interrupted,
}

impl OnboardingError {
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Wallet(e) => e.is_fatal(),
            Self::Interrupted => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, OnboardingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_failure_is_fatal_for_the_session() {
        assert!(OnboardingError::from(WalletError::EntropyUnavailable).is_fatal());
        assert!(OnboardingError::Interrupted.is_fatal());
        assert!(!OnboardingError::from(WalletError::SeedMismatch).is_fatal());
        assert!(!OnboardingError::SessionBusy.is_fatal());
        assert!(!OnboardingError::BackupHandoff("disk full".into()).is_fatal());
    }
}
