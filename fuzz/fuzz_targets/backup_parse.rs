#![no_main]

use libfuzzer_sys::fuzz_target;
use opm_wallet_core::backup::BackupDocument;

fuzz_target!(|data: &[u8]| {
    // Parsing untrusted backup files must never panic
    if let Ok(document) = BackupDocument::from_json(data) {
        // Anything accepted must re-encode to something equally accepted
        let bytes = document.to_json().expect("accepted document re-encodes");
        let reparsed = BackupDocument::from_json(&bytes).expect("re-encoded document parses");
        assert_eq!(reparsed, document);
    }
});
