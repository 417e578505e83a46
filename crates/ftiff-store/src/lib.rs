// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fti-ff-store: the FTI-FF on-disk layout — integrity primitives (C1),
//! block model (C2), serializer (C3) and group metadata store (C4).

mod block;
mod checksum;
mod descriptor;
mod fileio;

pub use block::{BlockError, BlockList, ChunkDescriptor, DataBlock};
pub use checksum::{checksum_file, checksum_variables};
pub use descriptor::{DescriptorError, GroupDescriptor, RankFields};
pub use fileio::{read, verify_header_digest, write, FileHeader, FileIoError, FILE_HEADER_SIZE};
