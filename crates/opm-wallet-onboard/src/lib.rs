//! OPM Wallet Onboarding
//!
//! Guides a user from "no wallet" to an encrypted backup:
//! accept the risk disclaimers, create or import a key, prove the phrase was
//! written down, pick a password, hand the backup off.

pub mod error;
pub mod handoff;
pub mod session;
pub mod shared;

pub use error::{OnboardingError, Result};
pub use handoff::{BackupSink, HandoffError, SessionConnector};
pub use session::{Completion, Disclaimers, OnboardingSession, Stage};
pub use shared::SharedSession;
