//! Fuzz target: Block JSON deserialization
//!
//! Feeds arbitrary bytes to serde_json to detect panics, stack overflows,
//! or unexpected behavior in Block deserialization (the acceptchain input).
//!
//! Run: cargo +nightly fuzz run fuzz_block_deserialize -- -max_len=4096

#![no_main]
use dfx_core::{Block, Transaction};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(blocks) = serde_json::from_slice::<Vec<Block>>(data) {
        for block in &blocks {
            let _ = block.hash();
        }
    }
    if let Ok(tx) = serde_json::from_slice::<Transaction>(data) {
        let _ = tx.txid();
        let _ = tx.total_out();
    }
});
