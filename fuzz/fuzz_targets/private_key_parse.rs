#![no_main]

use libfuzzer_sys::fuzz_target;
use opm_wallet_core::address::is_valid_address;
use opm_wallet_core::keys::import_from_private_key;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(material) = import_from_private_key(s) {
            assert!(is_valid_address(material.address()));
        }
        let _ = is_valid_address(s);
    }
});
