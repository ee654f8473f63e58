//! BIP-39 recovery phrase handling
//!
//! Generation, validation and the exact-match comparison used when the user
//! re-types a freshly generated phrase.
//!
//! # Normalization
//!
//! Every phrase is lower-cased (Unicode-aware) and its whitespace collapsed to
//! single spaces before use. Nothing else is rewritten: punctuation stays
//! significant, so `"accident."` is not the word `"accident"`.

use bip39::{Language, Mnemonic};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::crypto::fill_from;
use crate::error::{Result, WalletError};

/// Word counts accepted for import.
pub const ACCEPTED_WORD_COUNTS: [usize; 2] = [12, 24];

/// Word count of freshly generated phrases.
pub const GENERATED_WORD_COUNT: usize = 12;

/// 128 bits of entropy encode a 12-word phrase.
const GENERATED_ENTROPY_LEN: usize = 16;

/// Lower-case the phrase and collapse all whitespace runs to one space.
pub fn normalize_phrase(phrase: &str) -> Zeroizing<String> {
    let mut out = Zeroizing::new(String::with_capacity(phrase.len()));
    for word in phrase.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.extend(word.chars().flat_map(char::to_lowercase));
    }
    out
}

/// Generate a new 12-word English mnemonic from the OS random source.
///
/// Refuses to proceed when the OS source fails; there is no fallback RNG.
pub fn generate_mnemonic() -> Result<Mnemonic> {
    mnemonic_from_rng(&mut OsRng)
}

pub(crate) fn mnemonic_from_rng<R: RngCore + ?Sized>(rng: &mut R) -> Result<Mnemonic> {
    let mut entropy = Zeroizing::new([0u8; GENERATED_ENTROPY_LEN]);
    fill_from(rng, &mut entropy[..])?;

    Mnemonic::from_entropy_in(Language::English, &entropy[..])
        .map_err(|_| WalletError::EntropyUnavailable)
}

/// Parse a user-supplied phrase.
///
/// Only 12- and 24-word phrases are accepted even though BIP-39 also defines
/// 15, 18 and 21 words.
pub fn parse_mnemonic(phrase: &str) -> Result<Mnemonic> {
    let normalized = normalize_phrase(phrase);
    let word_count = normalized.split(' ').filter(|w| !w.is_empty()).count();
    if !ACCEPTED_WORD_COUNTS.contains(&word_count) {
        return Err(WalletError::InvalidMnemonic);
    }

    Mnemonic::parse_in_normalized(Language::English, &normalized)
        .map_err(|_| WalletError::InvalidMnemonic)
}

/// Whether `phrase` is a well-formed English mnemonic of an accepted length
/// with a valid checksum.
pub fn is_valid_mnemonic(phrase: &str) -> bool {
    parse_mnemonic(phrase).is_ok()
}

/// BIP-39 seed with the empty passphrase.
pub fn derive_seed(mnemonic: &Mnemonic) -> Zeroizing<[u8; 64]> {
    Zeroizing::new(mnemonic.to_seed(""))
}

/// Compare the phrase the user typed back against the one they were shown.
///
/// Case-insensitive and whitespace-collapsing, but sensitive to word order.
/// Every position is compared so the result carries no hint of where the
/// first difference is.
pub fn phrases_match(expected: &str, input: &str) -> bool {
    let expected = normalize_phrase(expected);
    let input = normalize_phrase(input);
    if expected.is_empty() {
        return false;
    }

    let expected_words: Vec<&str> = expected.split(' ').collect();
    let input_words: Vec<&str> = input.split(' ').collect();
    if expected_words.len() != input_words.len() {
        return false;
    }

    expected_words
        .iter()
        .zip(&input_words)
        .fold(true, |all_equal, (a, b)| all_equal & (a == b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ZERO_12: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const ZERO_18: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon \
         abandon abandon abandon abandon abandon abandon abandon abandon agent";
    const ZERO_24: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon \
         abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon \
         abandon abandon abandon art";
    const SHOWN: &str =
        "abandon ability able about above absent absorb abstract absurd abuse access accident";

    #[test]
    fn test_generated_phrase_is_valid_12_words() {
        let mnemonic = generate_mnemonic().unwrap();
        assert_eq!(mnemonic.word_count(), GENERATED_WORD_COUNT);
        assert!(is_valid_mnemonic(&mnemonic.to_string()));
    }

    #[test]
    fn test_generation_refuses_broken_random_source() {
        let err = mnemonic_from_rng(&mut crate::crypto::BrokenRng).unwrap_err();
        assert_eq!(err, WalletError::EntropyUnavailable);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_generation_does_not_repeat() {
        let a = generate_mnemonic().unwrap().to_string();
        let b = generate_mnemonic().unwrap().to_string();
        assert_ne!(a, b);
    }

    #[test]
    fn test_accepts_12_and_24_words() {
        assert!(is_valid_mnemonic(ZERO_12));
        assert!(is_valid_mnemonic(ZERO_24));
    }

    #[test]
    fn test_rejects_other_bip39_lengths() {
        // Valid BIP-39, but not a length we import
        assert!(Mnemonic::parse_in(Language::English, ZERO_18).is_ok());
        assert!(!is_valid_mnemonic(ZERO_18));
    }

    #[test]
    fn test_rejects_non_wordlist_token() {
        let phrase = ZERO_12.replacen("abandon", "bitcoinz", 1);
        assert!(!is_valid_mnemonic(&phrase));
    }

    #[test]
    fn test_rejects_bad_checksum() {
        // Every word is in the list; the checksum word is wrong
        let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon";
        assert!(!is_valid_mnemonic(phrase));
    }

    #[test]
    fn test_garbage_never_panics() {
        for input in ["", "   ", "\u{0}", "about", "🦀 🦀 🦀", "a ".repeat(5000).as_str()] {
            assert!(!is_valid_mnemonic(input));
        }
    }

    #[test]
    fn test_validation_normalizes_case_and_spacing() {
        let messy = format!("  {}\n", ZERO_12.to_uppercase().replace(' ', "\t  "));
        assert!(is_valid_mnemonic(&messy));
    }

    #[test]
    fn test_normalize_phrase() {
        assert_eq!(normalize_phrase("  Foo\tBAR \n baz ").as_str(), "foo bar baz");
        assert_eq!(normalize_phrase("").as_str(), "");
    }

    #[test]
    fn test_confirmation_exact_match() {
        assert!(phrases_match(SHOWN, SHOWN));
    }

    #[test]
    fn test_confirmation_is_case_insensitive() {
        let input = SHOWN.replace("ability", "Ability");
        assert!(phrases_match(SHOWN, &input));
        assert!(phrases_match(SHOWN, &SHOWN.to_uppercase()));
    }

    #[test]
    fn test_confirmation_collapses_whitespace() {
        let input = format!("\n {} \t", SHOWN.replace(' ', "   "));
        assert!(phrases_match(SHOWN, &input));
    }

    #[test]
    fn test_confirmation_rejects_reordering() {
        let input = SHOWN.replace("ability able", "able ability");
        assert!(!phrases_match(SHOWN, &input));
    }

    #[test]
    fn test_confirmation_rejects_punctuation() {
        let input = format!("{}.", SHOWN);
        assert!(!phrases_match(SHOWN, &input));
    }

    #[test]
    fn test_confirmation_rejects_missing_or_extra_word() {
        let missing = SHOWN.replace(" accident", "");
        assert!(!phrases_match(SHOWN, &missing));
        let extra = format!("{} abandon", SHOWN);
        assert!(!phrases_match(SHOWN, &extra));
    }

    #[test]
    fn test_confirmation_against_empty_phrase_fails() {
        assert!(!phrases_match("", ""));
    }

    #[test]
    fn test_derive_seed_deterministic() {
        let mnemonic = parse_mnemonic(ZERO_12).unwrap();
        assert_eq!(*derive_seed(&mnemonic), *derive_seed(&mnemonic));
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(s in "\\PC{0,64}") {
            let once = normalize_phrase(&s);
            let twice = normalize_phrase(&once);
            prop_assert_eq!(once.as_str(), twice.as_str());
        }

        #[test]
        fn prop_confirmation_ignores_case(entropy in proptest::array::uniform16(any::<u8>())) {
            let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy).unwrap();
            let phrase = mnemonic.to_string();
            prop_assert!(phrases_match(&phrase, &phrase.to_uppercase()));
        }
    }
}
