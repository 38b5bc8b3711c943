//! Fuzz target for the record formatter.
//!
//! Run with: cargo +nightly fuzz run fuzz_format
//!
//! The first byte picks a precision; the rest is read as little-endian `f64`s,
//! including NaN, infinities and subnormals.

#![no_main]

use gnugraph_core::{Formatter, Value};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&first, rest)) = data.split_first() else {
        return;
    };
    let formatter = Formatter::new(usize::from(first % 20));
    let values: Vec<f64> = rest
        .chunks_exact(8)
        .map(|chunk| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            f64::from_le_bytes(bytes)
        })
        .collect();

    for &v in &values {
        let text = formatter.format(v);
        assert!(text.ends_with(' '));
        assert!(!text.contains('\n'));

        let digits = text
            .trim_end()
            .split(['e', 'E'])
            .next()
            .unwrap_or_default()
            .chars()
            .filter(char::is_ascii_digit)
            .count();
        // Fixed notation is used down to 1e-4, which adds up to four leading zeros.
        assert!(digits <= formatter.precision() + 4, "{v:e} -> {text:?}");
    }

    let line = formatter.format(Value::Sequence(&values));
    assert_eq!(line.matches(' ').count(), values.len());
});
