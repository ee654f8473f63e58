//! Interactive onboarding and restore flows.
//!
//! Each flow drives an [`OnboardingSession`] through a [`Terminal`]. Input
//! errors the user can fix (bad phrase, weak password) are reported and
//! asked again; everything else ends the flow.

use std::path::Path;

use anyhow::{Context, Result};
use opm_wallet_core::backup::{deserialize, restore};
use opm_wallet_core::WalletError;
use opm_wallet_onboard::{
    BackupSink, Completion, Disclaimers, OnboardingError, OnboardingSession, SessionConnector,
};

use crate::terminal::Terminal;

/// Attempts before `restore` gives up on the password.
const RESTORE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Create,
    ImportSeed,
    ImportKey,
}

fn confirm<T: Terminal>(term: &mut T, question: &str) -> Result<bool> {
    let answer = term.ask(&format!("{} [y/N] ", question))?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub fn acknowledge_disclaimers<T: Terminal>(
    term: &mut T,
    session: &mut OnboardingSession,
) -> Result<()> {
    term.say("Before you continue:")?;
    let disclaimers = Disclaimers {
        market_risk: confirm(
            term,
            "Token prices are volatile and you may lose everything. Do you accept this risk?",
        )?,
        non_custodial: confirm(
            term,
            "This wallet is non-custodial: only you hold the keys. Do you understand?",
        )?,
        no_recovery: confirm(
            term,
            "If you lose your password, backup file and seed phrase, nobody can recover your funds. Do you understand?",
        )?,
    };
    if !disclaimers.all_accepted() {
        anyhow::bail!("All disclaimers must be accepted to continue");
    }
    session.acknowledge_disclaimers(disclaimers)?;
    Ok(())
}

fn show_phrase<T: Terminal>(term: &mut T, session: &OnboardingSession) -> Result<()> {
    let phrase = session.reveal_phrase()?;
    term.say("")?;
    term.say("Your seed phrase. Write it down in order and keep it offline:")?;
    for (i, word) in phrase.split(' ').enumerate() {
        term.say(&format!("{:>4}. {}", i + 1, word))?;
    }
    let key = session.reveal_private_key()?;
    term.say(&format!("Private key: {}", key.as_str()))?;
    term.say("Anyone with these words or this key controls your funds.")?;
    Ok(())
}

fn create_flow<T: Terminal>(term: &mut T, session: &mut OnboardingSession) -> Result<()> {
    session.create()?;

    'reveal: loop {
        show_phrase(term, session)?;
        loop {
            let answer = term.ask("Type 'saved' once the phrase is written down: ")?;
            match answer.trim() {
                "saved" => break,
                "cancel" => {
                    session.cancel();
                    anyhow::bail!("Cancelled");
                }
                _ => {}
            }
        }
        session.phrase_saved()?;

        loop {
            let input = term.ask("Re-type your seed phrase ('back' to see it again): ")?;
            if input.trim() == "back" {
                session.back()?;
                continue 'reveal;
            }
            match session.confirm_seed(&input) {
                Ok(()) => return Ok(()),
                Err(OnboardingError::Wallet(WalletError::SeedMismatch)) => {
                    term.say("That does not match the phrase shown. Try again.")?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn import_seed_flow<T: Terminal>(term: &mut T, session: &mut OnboardingSession) -> Result<()> {
    session.begin_seed_import()?;
    loop {
        let phrase = term.ask("Enter your 12 or 24 word seed phrase: ")?;
        match session.import_seed(&phrase) {
            Ok(()) => return Ok(()),
            Err(OnboardingError::Wallet(e @ WalletError::InvalidMnemonic)) => {
                term.say(&e.to_string())?;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn import_key_flow<T: Terminal>(term: &mut T, session: &mut OnboardingSession) -> Result<()> {
    session.begin_key_import()?;
    loop {
        let key = term.ask_secret("Enter your private key (64 hex characters): ")?;
        match session.import_key(&key) {
            Ok(()) => return Ok(()),
            Err(OnboardingError::Wallet(e @ WalletError::InvalidPrivateKey)) => {
                term.say(&e.to_string())?;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn password_flow<T, B, C>(
    term: &mut T,
    session: &mut OnboardingSession,
    sink: &mut B,
    connector: &mut C,
) -> Result<Completion>
where
    T: Terminal,
    B: BackupSink + ?Sized,
    C: SessionConnector + ?Sized,
{
    loop {
        let password = term.ask_secret("Choose a password (at least 8 characters): ")?;
        let confirmation = term.ask_secret("Confirm password: ")?;
        term.say("Encrypting...")?;
        match session.set_password(&password, &confirmation, sink, connector) {
            Ok(completion) => return Ok(completion),
            Err(OnboardingError::Wallet(e @ WalletError::WeakOrMismatchedPassword { .. })) => {
                term.say(&e.to_string())?;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Run one onboarding flow to completion.
pub fn run<T, B, C>(
    term: &mut T,
    session: &mut OnboardingSession,
    flow: Flow,
    sink: &mut B,
    connector: &mut C,
) -> Result<Completion>
where
    T: Terminal,
    B: BackupSink + ?Sized,
    C: SessionConnector + ?Sized,
{
    acknowledge_disclaimers(term, session)?;

    match flow {
        Flow::Create => create_flow(term, session)?,
        Flow::ImportSeed => import_seed_flow(term, session)?,
        Flow::ImportKey => import_key_flow(term, session)?,
    }

    let completion = password_flow(term, session, sink, connector)?;

    term.say("")?;
    term.say(&format!("Wallet ready: {}", completion.address))?;
    term.say(&format!("Backup saved as {}", completion.file_name))?;
    for warning in &completion.password_warnings {
        term.say(&format!("Password hint: {}", warning))?;
    }
    term.say("Keep the backup file and your password safe. They cannot be recovered.")?;
    Ok(completion)
}

/// Decrypt a backup file, check it and connect its address.
pub fn restore_backup<T, C>(term: &mut T, path: &Path, connector: &mut C) -> Result<String>
where
    T: Terminal,
    C: SessionConnector + ?Sized,
{
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let document = deserialize(&bytes).context("Not a valid wallet backup")?;
    term.say(&format!("Backup for {}", document.address))?;

    for attempt in 1..=RESTORE_ATTEMPTS {
        let password = term.ask_secret("Backup password: ")?;
        match restore(&document, &password) {
            Ok(material) => {
                connector
                    .connect(material.address())
                    .map_err(|e| anyhow::anyhow!("Could not connect the wallet: {}", e))?;
                term.say(&format!("Unlocked {}", material.address()))?;
                return Ok(material.address().to_string());
            }
            Err(e @ WalletError::WrongPasswordOrCorruptData) => {
                log::debug!("restore attempt {} failed", attempt);
                term.say(&e.to_string())?;
            }
            Err(e) => return Err(e.into()),
        }
    }
    anyhow::bail!("Too many failed attempts")
}
