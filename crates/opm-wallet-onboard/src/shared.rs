//! Single-owner access to an onboarding session from many threads.
//!
//! Every call takes the lock with `try_lock`. A second call while one is in
//! flight fails with [`OnboardingError::SessionBusy`] instead of queueing
//! behind a multi-second key derivation or interleaving with it.

use std::sync::{Arc, Mutex, TryLockError};

use zeroize::Zeroizing;

use crate::error::{OnboardingError, Result};
use crate::handoff::{BackupSink, SessionConnector};
use crate::session::{Completion, OnboardingSession, Stage};

#[derive(Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<OnboardingSession>>,
}

impl SharedSession {
    pub fn new(session: OnboardingSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Run `f` with exclusive access to the session.
    ///
    /// A poisoned lock means an earlier call panicked mid-transition. The
    /// session is never handed out again; the caller must start over.
    pub fn with<R>(&self, f: impl FnOnce(&mut OnboardingSession) -> Result<R>) -> Result<R> {
        let mut guard = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                log::debug!("rejected call on busy onboarding session");
                return Err(OnboardingError::SessionBusy);
            }
            Err(TryLockError::Poisoned(_)) => {
                log::error!("onboarding session is poisoned");
                return Err(OnboardingError::SessionBusy);
            }
        };
        f(&mut guard)
    }

    pub fn stage(&self) -> Result<Stage> {
        self.with(|session| Ok(session.stage()))
    }

    pub fn set_password<B, C>(
        &self,
        password: &str,
        confirmation: &str,
        sink: &mut B,
        connector: &mut C,
    ) -> Result<Completion>
    where
        B: BackupSink + ?Sized,
        C: SessionConnector + ?Sized,
    {
        self.with(|session| session.set_password(password, confirmation, sink, connector))
    }

    /// [`OnboardingSession::set_password`] on the blocking thread pool, so
    /// key derivation does not stall the async runtime.
    pub async fn set_password_async<B, C>(
        &self,
        password: Zeroizing<String>,
        confirmation: Zeroizing<String>,
        mut sink: B,
        mut connector: C,
    ) -> Result<Completion>
    where
        B: BackupSink + Send + 'static,
        C: SessionConnector + Send + 'static,
    {
        let shared = self.clone();
        tokio::task::spawn_blocking(move || {
            shared.set_password(&password, &confirmation, &mut sink, &mut connector)
        })
        .await
        .map_err(|e| {
            log::error!("password task failed: {}", e);
            OnboardingError::Interrupted
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Disclaimers;

    #[test]
    fn test_nested_call_is_rejected() {
        let shared = SharedSession::default();
        let other = shared.clone();
        let result = shared.with(|_| other.stage());
        assert_eq!(result, Err(OnboardingError::SessionBusy));
        assert_eq!(shared.stage(), Ok(Stage::Choose));
    }

    #[test]
    fn test_poisoned_session_stays_closed() {
        let shared = SharedSession::default();
        let worker = shared.clone();
        let joined = std::thread::spawn(move || {
            let _ = worker.with(|_| -> Result<()> { panic!("transition panicked") });
        })
        .join();
        assert!(joined.is_err());
        assert_eq!(shared.stage(), Err(OnboardingError::SessionBusy));
    }

    #[test]
    fn test_calls_pass_through() {
        let shared = SharedSession::default();
        shared
            .with(|s| s.acknowledge_disclaimers(Disclaimers::all()))
            .unwrap();
        shared.with(|s| s.begin_key_import()).unwrap();
        assert_eq!(shared.stage(), Ok(Stage::ImportByKey));
    }
}
