// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fti-ff-core: shared domain types, trait boundaries and error model for
//! the FTI-FF checkpoint/recover core.

pub mod collective;
pub mod error;
pub mod rscodec;
pub mod topology;
pub mod variable;

pub use collective::{Collective, FakeCollective};
pub use error::{ErrorKind, FtiError, ReturnCode};
pub use rscodec::{FakeRsCodec, RsCodec};
pub use topology::{CheckpointLevel, Directories, DurabilityState, GroupTopology, IoMode, LevelDirs};
pub use variable::ProtectedVariable;
