//! Fuzz target: amount and "amount@token" parsing
//!
//! Arbitrary strings must parse or fail cleanly, and every accepted amount
//! must survive format -> parse unchanged.
//!
//! Run: cargo +nightly fuzz run fuzz_parse_amount -- -max_len=256

#![no_main]
use dfx_core::{format_amount, parse_amount, TokenAmount};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(amount) = parse_amount(s) {
        let text = format_amount(amount);
        assert_eq!(parse_amount(&text).ok(), Some(amount), "{} -> {}", s, text);
    }

    if let Ok(list) = TokenAmount::parse_list(s) {
        for entry in list {
            assert!(!entry.token.is_empty());
        }
    }
});
