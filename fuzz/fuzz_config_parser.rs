//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary text to `GraphConfig::parse()`. Parsing and validation
//! must reject bad input with an error, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = gnugraph_config::GraphConfig::parse(s) {
            // Anything that parses must also survive a round trip through validation.
            assert!(config.validate().is_ok());
        }
    }
});
