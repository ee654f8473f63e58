//! Collaborators that receive the results of a finished onboarding.
//!
//! Where the backup goes (browser download, file on disk, cloud drive) and
//! what "connected" means for the host application are not decided here.

use std::error::Error;

pub type HandoffError = Box<dyn Error + Send + Sync>;

/// Receives the serialized backup document.
///
/// Called once per successful onboarding, after encryption has completed.
/// An error keeps the session at the password step so the user can retry.
pub trait BackupSink {
    fn save(&mut self, file_name: &str, document: &[u8]) -> Result<(), HandoffError>;
}

/// Marks the wallet as the active account of the host application.
pub trait SessionConnector {
    fn connect(&mut self, address: &str) -> Result<(), HandoffError>;
}

impl<T: BackupSink + ?Sized> BackupSink for &mut T {
    fn save(&mut self, file_name: &str, document: &[u8]) -> Result<(), HandoffError> {
        (**self).save(file_name, document)
    }
}

impl<T: SessionConnector + ?Sized> SessionConnector for &mut T {
    fn connect(&mut self, address: &str) -> Result<(), HandoffError> {
        (**self).connect(address)
    }
}
