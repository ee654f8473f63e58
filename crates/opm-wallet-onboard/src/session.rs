//! The onboarding state machine
//!
//! ```text
//! Choose ──create──▶ Create ──phrase_saved──▶ ConfirmSeed ──confirm_seed──┐
//!   │                                                                     ▼
//!   ├──begin_seed_import──▶ ImportBySeed ──import_seed──────────▶ SetPassword ──▶ Complete
//!   └──begin_key_import───▶ ImportByKey ───import_key───────────────────┘
//! ```
//!
//! Every method either performs its transition or returns an error and
//! leaves the stage unchanged. The session owns the candidate key material
//! and wipes it on completion, cancellation, when navigating back to
//! `Choose`, and on drop.

use std::fmt;

use opm_wallet_core::backup::{backup_file_name, serialize};
use opm_wallet_core::crypto::{encrypt, KdfParams};
use opm_wallet_core::keys::{generate, import_from_mnemonic, import_from_private_key, KeyMaterial};
use opm_wallet_core::password::{assess, check_policy, PasswordStrength};
use opm_wallet_core::seed::{is_valid_mnemonic, phrases_match};
use opm_wallet_core::WalletError;
use zeroize::Zeroizing;

use crate::error::{OnboardingError, Result};
use crate::handoff::{BackupSink, SessionConnector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Choose,
    /// New wallet generated, phrase shown to the user
    Create,
    ConfirmSeed,
    ImportBySeed,
    ImportByKey,
    SetPassword,
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Choose => "choose",
            Stage::Create => "create",
            Stage::ConfirmSeed => "confirm seed",
            Stage::ImportBySeed => "import seed",
            Stage::ImportByKey => "import key",
            Stage::SetPassword => "set password",
            Stage::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Risk acknowledgements required before a wallet is created or imported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Disclaimers {
    /// Token prices are volatile and may go to zero
    pub market_risk: bool,
    /// The operator never holds the keys
    pub non_custodial: bool,
    /// A lost password, backup and phrase cannot be recovered by anyone
    pub no_recovery: bool,
}

impl Disclaimers {
    pub fn all() -> Self {
        Self {
            market_risk: true,
            non_custodial: true,
            no_recovery: true,
        }
    }

    pub fn all_accepted(&self) -> bool {
        self.market_risk && self.non_custodial && self.no_recovery
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Created,
    Seed,
    Key,
}

/// What a finished onboarding hands back to the caller. Contains no secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub address: String,
    pub file_name: String,
    pub password_strength: PasswordStrength,
    pub password_warnings: Vec<String>,
}

#[derive(Debug)]
pub struct OnboardingSession {
    stage: Stage,
    disclaimers: Disclaimers,
    origin: Option<Origin>,
    candidate: Option<KeyMaterial>,
    kdf: KdfParams,
    completion: Option<Completion>,
}

impl Default for OnboardingSession {
    fn default() -> Self {
        Self::new(KdfParams::default())
    }
}

impl OnboardingSession {
    /// Start a session that will encrypt with the given KDF parameters.
    pub fn new(kdf: KdfParams) -> Self {
        Self {
            stage: Stage::Choose,
            disclaimers: Disclaimers::default(),
            origin: None,
            candidate: None,
            kdf,
            completion: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }

    pub fn disclaimers(&self) -> Disclaimers {
        self.disclaimers
    }

    /// Address of the wallet being onboarded, if one exists yet.
    pub fn candidate_address(&self) -> Option<&str> {
        self.candidate.as_ref().map(|m| m.address())
    }

    pub fn has_candidate(&self) -> bool {
        self.candidate.is_some()
    }

    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    fn expect_stage(&self, expected: Stage) -> Result<()> {
        if self.stage != expected {
            return Err(OnboardingError::WrongStage(self.stage));
        }
        Ok(())
    }

    fn expect_leave_choose(&self) -> Result<()> {
        self.expect_stage(Stage::Choose)?;
        if !self.disclaimers.all_accepted() {
            return Err(OnboardingError::DisclaimersNotAccepted);
        }
        Ok(())
    }

    fn advance(&mut self, next: Stage) {
        log::debug!("onboarding: {} -> {}", self.stage, next);
        self.stage = next;
    }

    fn candidate(&self) -> Result<&KeyMaterial> {
        self.candidate
            .as_ref()
            .ok_or(OnboardingError::WrongStage(self.stage))
    }

    fn discard_candidate(&mut self) {
        if let Some(mut material) = self.candidate.take() {
            material.wipe();
        }
    }

    pub fn acknowledge_disclaimers(&mut self, disclaimers: Disclaimers) -> Result<()> {
        self.expect_stage(Stage::Choose)?;
        if !disclaimers.all_accepted() {
            return Err(OnboardingError::DisclaimersNotAccepted);
        }
        self.disclaimers = disclaimers;
        Ok(())
    }

    /// Generate a new wallet and show its phrase.
    pub fn create(&mut self) -> Result<()> {
        self.expect_leave_choose()?;

        let material = generate()?;
        log::info!("generated wallet {}", material.address());
        self.candidate = Some(material);
        self.origin = Some(Origin::Created);
        self.advance(Stage::Create);
        Ok(())
    }

    pub fn reveal_phrase(&self) -> Result<Zeroizing<String>> {
        self.expect_stage(Stage::Create)?;
        let phrase = self
            .candidate()?
            .mnemonic()
            .ok_or(OnboardingError::WrongStage(self.stage))?;
        Ok(Zeroizing::new(phrase.to_string()))
    }

    pub fn reveal_private_key(&self) -> Result<Zeroizing<String>> {
        self.expect_stage(Stage::Create)?;
        Ok(self.candidate()?.private_key_hex())
    }

    /// The user says the phrase is written down.
    pub fn phrase_saved(&mut self) -> Result<()> {
        self.expect_stage(Stage::Create)?;
        self.advance(Stage::ConfirmSeed);
        Ok(())
    }

    /// Check the re-typed phrase. The error does not say which word differs.
    pub fn confirm_seed(&mut self, input: &str) -> Result<()> {
        self.expect_stage(Stage::ConfirmSeed)?;

        let expected = self.candidate()?.mnemonic().unwrap_or_default();
        if !phrases_match(expected, input) {
            log::debug!("seed confirmation did not match");
            return Err(WalletError::SeedMismatch.into());
        }

        self.advance(Stage::SetPassword);
        Ok(())
    }

    pub fn begin_seed_import(&mut self) -> Result<()> {
        self.expect_leave_choose()?;
        self.origin = Some(Origin::Seed);
        self.advance(Stage::ImportBySeed);
        Ok(())
    }

    pub fn import_seed(&mut self, phrase: &str) -> Result<()> {
        self.expect_stage(Stage::ImportBySeed)?;
        if !is_valid_mnemonic(phrase) {
            return Err(WalletError::InvalidMnemonic.into());
        }

        let material = import_from_mnemonic(phrase)?;
        log::info!("imported wallet {} from seed phrase", material.address());
        self.candidate = Some(material);
        self.advance(Stage::SetPassword);
        Ok(())
    }

    pub fn begin_key_import(&mut self) -> Result<()> {
        self.expect_leave_choose()?;
        self.origin = Some(Origin::Key);
        self.advance(Stage::ImportByKey);
        Ok(())
    }

    pub fn import_key(&mut self, private_key_hex: &str) -> Result<()> {
        self.expect_stage(Stage::ImportByKey)?;

        let material = import_from_private_key(private_key_hex)?;
        log::info!("imported wallet {} from private key", material.address());
        self.candidate = Some(material);
        self.advance(Stage::SetPassword);
        Ok(())
    }

    /// Encrypt the candidate key, hand the backup to `sink` and the address
    /// to `connector`.
    ///
    /// Nothing reaches either collaborator unless encryption and
    /// serialization both succeeded. On any error the session stays at
    /// `SetPassword` with the candidate intact.
    pub fn set_password<B, C>(
        &mut self,
        password: &str,
        confirmation: &str,
        sink: &mut B,
        connector: &mut C,
    ) -> Result<Completion>
    where
        B: BackupSink + ?Sized,
        C: SessionConnector + ?Sized,
    {
        self.expect_stage(Stage::SetPassword)?;
        check_policy(password, confirmation)?;

        let material = self.candidate()?;
        let encrypted = encrypt(material.private_key(), password, &self.kdf)?;
        let document = serialize(material.address(), &encrypted)?;
        let address = material.address().to_string();
        let file_name = backup_file_name(&address);

        sink.save(&file_name, &document).map_err(|e| {
            log::warn!("backup handoff failed: {}", e);
            OnboardingError::BackupHandoff(e.to_string())
        })?;
        connector.connect(&address).map_err(|e| {
            log::warn!("session handoff failed: {}", e);
            OnboardingError::SessionHandoff(e.to_string())
        })?;

        let advice = assess(password);
        let completion = Completion {
            address,
            file_name,
            password_strength: advice.strength,
            password_warnings: advice.warnings,
        };

        self.discard_candidate();
        self.completion = Some(completion.clone());
        self.advance(Stage::Complete);
        log::info!("onboarding complete for {}", completion.address);
        Ok(completion)
    }

    /// Step back one screen. Returning to `Choose` wipes the candidate.
    pub fn back(&mut self) -> Result<()> {
        let previous = match (self.stage, self.origin) {
            (Stage::Create, _) | (Stage::ImportBySeed, _) | (Stage::ImportByKey, _) => {
                self.discard_candidate();
                Stage::Choose
            }
            (Stage::ConfirmSeed, _) => Stage::Create,
            (Stage::SetPassword, Some(Origin::Created)) => Stage::ConfirmSeed,
            (Stage::SetPassword, Some(Origin::Seed)) => {
                self.discard_candidate();
                Stage::ImportBySeed
            }
            (Stage::SetPassword, Some(Origin::Key)) => {
                self.discard_candidate();
                Stage::ImportByKey
            }
            (stage, _) => return Err(OnboardingError::WrongStage(stage)),
        };
        self.advance(previous);
        Ok(())
    }

    /// Abandon the attempt from any stage.
    pub fn cancel(&mut self) {
        self.discard_candidate();
        self.origin = None;
        self.completion = None;
        self.advance(Stage::Choose);
    }
}

impl Drop for OnboardingSession {
    fn drop(&mut self) {
        self.discard_candidate();
    }
}
