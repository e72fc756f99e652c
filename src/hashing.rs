// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Content fingerprints for deduplication
//!
//! A fingerprint is the BLAKE3 digest of a file's bytes, rendered as lowercase
//! hex. It depends only on content, never on the file name or location.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::str::FromStr;
use tracing::trace;

use crate::{Result, ShoeboxError};

/// Read buffer used while streaming a file through the hasher
const CHUNK_SIZE: usize = 64 * 1024;

/// Hex length of a BLAKE3 digest
const HEX_LEN: usize = 64;

/// A content digest (lowercase hex BLAKE3)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Full hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 hex characters, used for human-facing disambiguation
    pub fn short(&self) -> &str {
        &self.0[..8]
    }

    fn from_hash(hash: blake3::Hash) -> Self {
        Self(hash.to_hex().to_string())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = ShoeboxError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != HEX_LEN || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ShoeboxError::CorruptLibrary(format!(
                "invalid content hash: {:?}",
                s
            )));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Stream a reader through BLAKE3 until EOF
pub fn fingerprint_reader<R: Read>(mut reader: R) -> std::io::Result<Fingerprint> {
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(Fingerprint::from_hash(hasher.finalize()))
}

/// Compute the fingerprint of a file without loading it into memory.
///
/// A read failure part-way through returns the I/O error; no partial digest
/// is ever produced.
pub fn compute_fingerprint(path: &Path) -> Result<Fingerprint> {
    let file = File::open(path)?;
    let digest = fingerprint_reader(file)?;
    trace!(?path, %digest, "fingerprinted");
    Ok(digest)
}

/// Fingerprint an in-memory buffer
pub fn fingerprint_bytes(data: &[u8]) -> Fingerprint {
    Fingerprint::from_hash(blake3::hash(data))
}
