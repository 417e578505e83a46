// SPDX-License-Identifier: MIT

//! C1: streaming MD5 integrity primitives.
//!
//! Digests are rendered as 32 lower-case hex characters. Buffer checksums
//! feed variables in ascending `id` order and stream each buffer
//! sequentially, so two ranks with equal `(id, size, bytes)` sets produce
//! identical digests regardless of registration order.

use fti_ff_core::ProtectedVariable;
use md5::{Digest, Md5};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChecksumError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Computes the MD5 digest over a set of protected variables, ordered by
/// ascending `id` so checksum results are independent of registration
/// order.
pub fn checksum_variables(vars: &[ProtectedVariable<'_>]) -> String {
    let mut order: Vec<&ProtectedVariable<'_>> = vars.iter().collect();
    order.sort_by_key(|v| v.id);

    let mut hasher = Md5::new();
    for var in order {
        hasher.update(var.as_bytes());
    }
    hex_digest(hasher.finalize().as_slice())
}

/// Computes the MD5 digest over an entire file's contents.
///
/// Returns `"unreadable"` on any I/O error rather than surfacing a
/// partial digest computed over less than the whole file.
pub fn checksum_file(path: &Path) -> String {
    match checksum_file_inner(path) {
        Ok(digest) => digest,
        Err(_) => "unreadable".to_string(),
    }
}

fn checksum_file_inner(path: &Path) -> Result<String, ChecksumError> {
    let mut file = File::open(path).map_err(|source| ChecksumError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf).map_err(|source| ChecksumError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex_digest(hasher.finalize().as_slice()))
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
#[path = "checksum_tests.rs"]
mod tests;
