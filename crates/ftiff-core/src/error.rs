// SPDX-License-Identifier: MIT

//! Error taxonomy shared by every crate in the workspace.
//!
//! Each crate defines its own narrow error enum for the concern it owns
//! (`ChecksumError`, `BlockError`, `FileIoError`, `DescriptorError`,
//! `LevelError`, `RecoverError`); [`FtiError`] aggregates them behind a
//! single boundary type so that public entry points can return one
//! `Result` type and still carry the kind taxonomy (io, corrupt,
//! collective, unsupported, internal).

use thiserror::Error;

/// The three-kind integer result surfaced by every public call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    Success,
    NoSuchCheckpoint,
    Unrecoverable,
}

/// Top-level error aggregating every concern's error type.
///
/// `Internal` is reserved for violated invariants. Callers that receive
/// it should treat it as non-recoverable process state; the core itself
/// panics before ever constructing one that crosses a public boundary
/// (see [`ErrorKind::Internal`] and `fti_ff_core::invariant!`).
#[derive(Debug, Error)]
pub enum FtiError {
    #[error("io error: {0}")]
    Io(String),
    #[error("corrupt checkpoint state: {0}")]
    Corrupt(String),
    #[error("collective operation failed: {0}")]
    Collective(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl FtiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FtiError::Io(_) => ErrorKind::Io,
            FtiError::Corrupt(_) => ErrorKind::Corrupt,
            FtiError::Collective(_) => ErrorKind::Collective,
            FtiError::Unsupported(_) => ErrorKind::Unsupported,
        }
    }

    /// Maps this error to the integer return code surfaced at the API
    /// boundary: `io` during a fresh checkpoint write is retry-ok,
    /// `corrupt` during recovery means no level validated, anything else
    /// recoverable is a plain failure.
    pub fn to_return_code(&self) -> ReturnCode {
        match self {
            FtiError::Io(_) => ReturnCode::NoSuchCheckpoint,
            FtiError::Corrupt(_) | FtiError::Collective(_) | FtiError::Unsupported(_) => {
                ReturnCode::Unrecoverable
            }
        }
    }
}

/// Error kind taxonomy: `io`, `corrupt`, `collective`, `unsupported`,
/// `internal`. `Internal` never appears on [`FtiError`] because violated
/// invariants abort the process instead of propagating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Corrupt,
    Collective,
    Unsupported,
    Internal,
}

/// Logs and aborts the process for a violated invariant.
///
/// This is the one deliberate use of `panic!` outside test code:
/// `internal` errors represent violated invariants that should never
/// occur at runtime, so they abort the process rather than propagate.
#[macro_export]
macro_rules! invariant {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            let msg = format!($($arg)+);
            tracing::error!(invariant = msg.as_str(), "internal invariant violated");
            panic!("internal invariant violated: {msg}");
        }
    };
}
