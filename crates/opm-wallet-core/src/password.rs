//! Password policy and strength advice
//!
//! [`check_policy`] is the hard gate applied before encryption: at least
//! [`MIN_PASSWORD_LEN`] characters and an identical confirmation entry.
//! [`assess`] is advisory only. It never blocks a password that passed the
//! gate; it produces warnings the front end can show next to the field.

use std::collections::HashSet;

use crate::error::{Result, WalletError};

/// Minimum password length in Unicode scalar values.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Estimated bits below which a password is flagged as weak.
const WEAK_BELOW_BITS: f64 = 40.0;
/// Estimated bits from which a password counts as strong.
const STRONG_FROM_BITS: f64 = 64.0;

/// Frequently guessed passwords and crypto-themed words.
const COMMON_FRAGMENTS: &[&str] = &[
    "password", "passwort", "123456", "qwerty", "azerty", "letmein", "iloveyou", "admin",
    "welcome", "monkey", "dragon", "master", "bitcoin", "ethereum", "crypto", "wallet", "metamask",
    "opm", "onepremium", "moon", "lambo", "hodl",
];

/// Enforce length and confirmation equality.
pub fn check_policy(password: &str, confirmation: &str) -> Result<()> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    if !long_enough || password != confirmation {
        return Err(WalletError::WeakOrMismatchedPassword {
            min_len: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PasswordStrength {
    Weak,
    Fair,
    Strong,
}

#[derive(Debug, Clone)]
pub struct PasswordAdvice {
    pub strength: PasswordStrength,
    pub estimated_bits: f64,
    pub warnings: Vec<String>,
}

/// Rough brute-force cost of a password, with penalties for the patterns
/// people actually use.
pub fn assess(password: &str) -> PasswordAdvice {
    let chars: Vec<char> = password.chars().collect();
    let mut warnings = Vec::new();

    if chars.is_empty() {
        return PasswordAdvice {
            strength: PasswordStrength::Weak,
            estimated_bits: 0.0,
            warnings: vec!["Password is empty".to_string()],
        };
    }

    let pool: f64 = [
        (chars.iter().any(|c| c.is_ascii_lowercase()), 26.0),
        (chars.iter().any(|c| c.is_ascii_uppercase()), 26.0),
        (chars.iter().any(|c| c.is_ascii_digit()), 10.0),
        (chars.iter().any(|c| c.is_ascii_punctuation() || *c == ' '), 33.0),
        (chars.iter().any(|c| !c.is_ascii()), 100.0),
    ]
    .iter()
    .filter(|(present, _)| *present)
    .map(|(_, size)| size)
    .sum();

    let mut bits = chars.len() as f64 * pool.max(2.0).log2();

    let lower = password.to_lowercase();
    if COMMON_FRAGMENTS.iter().any(|f| lower.contains(f)) {
        bits *= 0.5;
        warnings.push("Contains a common password or word".to_string());
    }

    let distinct = chars.iter().collect::<HashSet<_>>().len();
    if distinct * 2 < chars.len() {
        bits *= 0.6;
        warnings.push("Too many repeated characters".to_string());
    }

    let runs = chars
        .windows(3)
        .filter(|w| {
            let (a, b, c) = (w[0] as i64, w[1] as i64, w[2] as i64);
            (b - a == 1 && c - b == 1) || (a - b == 1 && b - c == 1)
        })
        .count();
    if runs >= 2 {
        bits -= runs as f64 * 3.0;
        warnings.push("Contains sequences like abc or 321".to_string());
    }

    if chars.len() < 12 {
        warnings.push("12 or more characters are recommended".to_string());
    }

    let bits = bits.max(0.0);
    let strength = if bits < WEAK_BELOW_BITS {
        PasswordStrength::Weak
    } else if bits < STRONG_FROM_BITS {
        PasswordStrength::Fair
    } else {
        PasswordStrength::Strong
    };

    PasswordAdvice {
        strength,
        estimated_bits: bits,
        warnings,
    }
}
