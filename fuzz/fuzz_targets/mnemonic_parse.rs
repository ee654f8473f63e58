#![no_main]

use libfuzzer_sys::fuzz_target;
use opm_wallet_core::seed::{is_valid_mnemonic, parse_mnemonic, phrases_match};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    // Validation and parsing must agree and never panic
    assert_eq!(is_valid_mnemonic(s), parse_mnemonic(s).is_ok());

    // Confirmation compares arbitrary user input against a phrase
    if let Some((expected, input)) = s.split_once('|') {
        let _ = phrases_match(expected, input);
        if !expected.trim().is_empty() {
            assert!(phrases_match(expected, expected));
        }
    }
});
