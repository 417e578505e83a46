// SPDX-License-Identifier: MIT

//! C2: the FTI-FF block model.
//!
//! Expressed as an ordered `Vec<DataBlock>` with stable indices rather
//! than a pointer-linked structure, removing the need for aliased
//! owning pointers and trivializing serialization. Traversal is by
//! index; block 0 describes the initial layout, each later block
//! describes only the delta since the previous checkpoint.

use crate::fileio::FILE_HEADER_SIZE;
use fti_ff_core::ProtectedVariable;
use std::collections::HashMap;
use thiserror::Error;

/// On-disk record locating one contiguous piece of one variable.
/// Fixed layout: `id: i32, var_index: i32, dest_offset: i64,
/// file_offset: i64, chunk_size: i64` (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub id: u32,
    pub var_index: u32,
    pub file_offset: u64,
    pub dest_offset: u64,
    pub chunk_size: u64,
}

impl ChunkDescriptor {
    pub const RECORD_SIZE: u64 = 4 + 4 + 8 + 8 + 8;
}

/// One segment of the file: a fixed header (`num_vars: i32, block_size:
/// i64`) followed by `num_vars` [`ChunkDescriptor`] records, followed by
/// the raw chunk bytes. Blocks are contiguous on disk in list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    pub block_size: u64,
    pub chunks: Vec<ChunkDescriptor>,
}

impl DataBlock {
    pub const HEADER_SIZE: u64 = 4 + 8;

    pub fn num_vars(&self) -> u32 {
        self.chunks.len() as u32
    }

    /// `block_size == header_size + num_vars * chunk_record_size + sum(chunk_size)`.
    fn expected_block_size(&self) -> u64 {
        Self::HEADER_SIZE
            + self.chunks.len() as u64 * ChunkDescriptor::RECORD_SIZE
            + self.chunks.iter().map(|c| c.chunk_size).sum::<u64>()
    }
}

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("shrinking variable {id} from {old_size} to {new_size} is not supported")]
    Shrink { id: u32, old_size: u64, new_size: u64 },
}

/// The ordered sequence of [`DataBlock`]s for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockList {
    pub blocks: Vec<DataBlock>,
}

impl BlockList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total file size implied by the current block list, including the
    /// file header.
    pub fn total_size(&self) -> u64 {
        FILE_HEADER_SIZE + self.blocks.iter().map(|b| b.block_size).sum::<u64>()
    }

    /// Releases the block list. Safe to call on a partially-built list.
    pub fn free_layout(&mut self) {
        self.blocks.clear();
    }

    /// Sum of prior chunk sizes per known variable id, in block order.
    fn known_sizes(&self) -> HashMap<u32, u64> {
        let mut sizes = HashMap::new();
        for block in &self.blocks {
            for chunk in &block.chunks {
                *sizes.entry(chunk.id).or_insert(0) += chunk.chunk_size;
            }
        }
        sizes
    }

    /// Mutates the block list so it reflects `current_vars`.
    ///
    /// First call creates block 0 with one chunk per variable in
    /// registration order. Later calls append at most one new block
    /// holding the union of NEW (unseen ids) and GROW (grown ids)
    /// chunks, ordered NEW-before-GROW then ascending `id`. Variables
    /// whose size is unchanged or whose size shrank (unsupported, see
    /// `BlockError::Shrink`) produce no chunk.
    pub fn update_layout(
        &mut self,
        current_vars: &[ProtectedVariable<'_>],
    ) -> Result<(), BlockError> {
        if self.blocks.is_empty() {
            return self.create_initial_block(current_vars);
        }

        let old_size = self.known_sizes();
        let mut new_chunks = Vec::new();
        let mut grow_chunks = Vec::new();

        for (var_index, var) in current_vars.iter().enumerate() {
            match old_size.get(&var.id) {
                None => new_chunks.push((var_index as u32, var.id, 0u64, var.size)),
                Some(&prior) => {
                    if var.size > prior {
                        grow_chunks.push((var_index as u32, var.id, prior, var.size - prior));
                    } else if var.size < prior {
                        return Err(BlockError::Shrink {
                            id: var.id,
                            old_size: prior,
                            new_size: var.size,
                        });
                    }
                }
            }
        }

        if new_chunks.is_empty() && grow_chunks.is_empty() {
            return Ok(());
        }

        grow_chunks.sort_by_key(|(_, id, _, _)| *id);
        new_chunks.sort_by_key(|(_, id, _, _)| *id);

        let base_file_offset = self.total_size() + DataBlock::HEADER_SIZE;
        let num_chunks = new_chunks.len() + grow_chunks.len();
        let mut chunks = Vec::with_capacity(num_chunks);
        let mut running_offset = base_file_offset + num_chunks as u64 * ChunkDescriptor::RECORD_SIZE;

        for (var_index, id, dest_offset, chunk_size) in new_chunks.into_iter().chain(grow_chunks) {
            chunks.push(ChunkDescriptor {
                id,
                var_index,
                file_offset: running_offset,
                dest_offset,
                chunk_size,
            });
            running_offset += chunk_size;
        }

        let block = DataBlock {
            block_size: DataBlock::HEADER_SIZE
                + num_chunks as u64 * ChunkDescriptor::RECORD_SIZE
                + chunks.iter().map(|c| c.chunk_size).sum::<u64>(),
            chunks,
        };
        debug_assert_eq!(block.block_size, block.expected_block_size());
        self.blocks.push(block);
        Ok(())
    }

    fn create_initial_block(
        &mut self,
        current_vars: &[ProtectedVariable<'_>],
    ) -> Result<(), BlockError> {
        let num_chunks = current_vars.len();
        let base_file_offset = FILE_HEADER_SIZE + DataBlock::HEADER_SIZE;
        let mut running_offset =
            base_file_offset + num_chunks as u64 * ChunkDescriptor::RECORD_SIZE;

        let mut chunks = Vec::with_capacity(num_chunks);
        for (var_index, var) in current_vars.iter().enumerate() {
            chunks.push(ChunkDescriptor {
                id: var.id,
                var_index: var_index as u32,
                file_offset: running_offset,
                dest_offset: 0,
                chunk_size: var.size,
            });
            running_offset += var.size;
        }

        let block = DataBlock {
            block_size: DataBlock::HEADER_SIZE
                + num_chunks as u64 * ChunkDescriptor::RECORD_SIZE
                + chunks.iter().map(|c| c.chunk_size).sum::<u64>(),
            chunks,
        };
        debug_assert_eq!(block.block_size, block.expected_block_size());
        self.blocks.push(block);
        Ok(())
    }
}

#[cfg(test)]
#[path = "block_tests.rs"]
mod tests;
