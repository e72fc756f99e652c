// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::path::Path;
use std::str::FromStr;

use shoebox::hashing::{fingerprint_bytes, fingerprint_reader};
use shoebox::import::should_import;
use shoebox::organizer::bucket_of;
use shoebox::{Fingerprint, MediaType};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    text: &'a str,
    bytes: &'a [u8],
}

fuzz_target!(|input: Input| {
    // Parsed fingerprints print back in canonical form
    if let Ok(fp) = Fingerprint::from_str(input.text) {
        assert_eq!(fp.to_string(), input.text.trim().to_ascii_lowercase());
        assert_eq!(Fingerprint::from_str(fp.as_str()).ok(), Some(fp));
    }

    // Streaming and one-shot hashing agree
    let streamed = fingerprint_reader(input.bytes).expect("reading a slice cannot fail");
    assert_eq!(streamed, fingerprint_bytes(input.bytes));

    let path = Path::new(input.text);
    let _ = MediaType::from_path(path);
    let _ = should_import(path);
    let _ = bucket_of(input.text);
});
