// SPDX-License-Identifier: MIT

//! C3: the FTI-FF serializer.
//!
//! Binary layout is fixed, little-endian and field-by-field — never a
//! native struct dump — so it is reproducible across builds even though
//! it is not claimed to be cross-architecture portable.

use crate::block::{BlockList, ChunkDescriptor, DataBlock};
use crate::checksum;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fti_ff_core::ProtectedVariable;
use memmap2::Mmap;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read};
use std::path::Path;
use thiserror::Error;

/// `checkpoint_id: u32, total_ckpt_size: u64, timestamp_ns: i64,
/// digest: [u8; 16]`.
pub const FILE_HEADER_SIZE: u64 = 4 + 8 + 8 + 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub checkpoint_id: u32,
    pub total_ckpt_size: u64,
    pub timestamp_ns: i64,
    pub digest: [u8; 16],
}

#[derive(Debug, Error)]
pub enum FileIoError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("checkpoint file is unrecoverable: {0}")]
    Unrecoverable(String),
    #[error("checkpoint file is corrupt: {0}")]
    Corrupt(String),
}

/// Writes `header`, `blocks` and the backing bytes of `vars` to `path`.
///
/// Truncates the file to `header.total_ckpt_size`, writes the header with
/// a zeroed digest slot, writes every block's descriptor records and
/// chunk bytes at their absolute `file_offset`, then recomputes the MD5
/// over the whole file and patches it into the header before `fsync`.
pub fn write(
    path: &Path,
    header: &FileHeader,
    blocks: &BlockList,
    vars: &[ProtectedVariable<'_>],
) -> Result<(), FileIoError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let var_by_id: HashMap<u32, &ProtectedVariable<'_>> =
        vars.iter().map(|v| (v.id, v)).collect();

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    file.set_len(header.total_ckpt_size)?;

    let mut zeroed = *header;
    zeroed.digest = [0u8; 16];
    write_header(&file, &zeroed)?;

    let mut cursor = FILE_HEADER_SIZE;
    for block in &blocks.blocks {
        write_block(&file, cursor, block, &var_by_id)?;
        cursor += block.block_size;
    }

    let digest = checksum::checksum_file(path);
    let digest_bytes = hex_to_bytes(&digest).unwrap_or([0u8; 16]);
    let mut final_header = *header;
    final_header.digest = digest_bytes;
    write_header(&file, &final_header)?;

    file.sync_all()?;
    Ok(())
}

fn write_header(file: &File, header: &FileHeader) -> Result<(), FileIoError> {
    let mut buf = Vec::with_capacity(FILE_HEADER_SIZE as usize);
    buf.write_u32::<LittleEndian>(header.checkpoint_id)?;
    buf.write_u64::<LittleEndian>(header.total_ckpt_size)?;
    buf.write_i64::<LittleEndian>(header.timestamp_ns)?;
    buf.extend_from_slice(&header.digest);
    write_at(file, 0, &buf)
}

fn write_block(
    file: &File,
    block_start: u64,
    block: &DataBlock,
    var_by_id: &HashMap<u32, &ProtectedVariable<'_>>,
) -> Result<(), FileIoError> {
    let mut header_buf = Vec::with_capacity(DataBlock::HEADER_SIZE as usize);
    header_buf.write_i32::<LittleEndian>(block.num_vars() as i32)?;
    header_buf.write_i64::<LittleEndian>(block.block_size as i64)?;
    write_at(file, block_start, &header_buf)?;

    let mut offset = block_start + DataBlock::HEADER_SIZE;
    for chunk in &block.chunks {
        let mut rec = Vec::with_capacity(ChunkDescriptor::RECORD_SIZE as usize);
        rec.write_i32::<LittleEndian>(chunk.id as i32)?;
        rec.write_i32::<LittleEndian>(chunk.var_index as i32)?;
        rec.write_i64::<LittleEndian>(chunk.dest_offset as i64)?;
        rec.write_i64::<LittleEndian>(chunk.file_offset as i64)?;
        rec.write_i64::<LittleEndian>(chunk.chunk_size as i64)?;
        write_at(file, offset, &rec)?;
        offset += ChunkDescriptor::RECORD_SIZE;
    }

    for chunk in &block.chunks {
        if chunk.chunk_size == 0 {
            continue;
        }
        let var = var_by_id.get(&chunk.id).ok_or_else(|| {
            FileIoError::Corrupt(format!("no registered variable for chunk id {}", chunk.id))
        })?;
        let start = chunk.dest_offset as usize;
        let end = start + chunk.chunk_size as usize;
        let bytes = &var.host_buffer[start..end];
        write_at(file, chunk.file_offset, bytes)?;
    }

    Ok(())
}

fn write_at(file: &File, offset: u64, bytes: &[u8]) -> Result<(), FileIoError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        file.write_all_at(bytes, offset)?;
    }
    #[cfg(not(unix))]
    {
        use std::io::{Seek, SeekFrom, Write};
        let mut file = file.try_clone()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)?;
    }
    Ok(())
}

/// Reads `header` and the block list back from `path` via a read-only
/// memory mapping, which is released before this function returns.
///
/// Walks blocks by following `end_of_file += block.block_size` until it
/// equals `header.total_ckpt_size`. Also returns the effective size of
/// every variable found (the max of `dest_offset + chunk_size` across
/// all its chunks, aggregated in block order).
pub fn read(path: &Path) -> Result<(FileHeader, BlockList, HashMap<u32, u64>), FileIoError> {
    let file =
        File::open(path).map_err(|e| FileIoError::Unrecoverable(format!("open failed: {e}")))?;
    // SAFETY: the file is not concurrently truncated by another process
    // for the duration of this mapping — the core owns the file
    // exclusively for the duration of a call.
    let mmap = unsafe { Mmap::map(&file) }
        .map_err(|e| FileIoError::Unrecoverable(format!("mmap failed: {e}")))?;

    let header = parse_header(&mmap)?;

    let mut cursor = FILE_HEADER_SIZE;
    let mut blocks = Vec::new();
    let mut var_sizes: HashMap<u32, u64> = HashMap::new();

    while cursor < header.total_ckpt_size {
        let block_start = cursor;
        let mut block_header = Cursor::new(
            mmap.get(block_start as usize..(block_start + DataBlock::HEADER_SIZE) as usize)
                .ok_or_else(|| FileIoError::Corrupt("block header runs past end of file".into()))?,
        );
        let num_vars = block_header.read_i32::<LittleEndian>()?;
        let block_size = block_header.read_i64::<LittleEndian>()?;
        if num_vars < 0 || block_size < DataBlock::HEADER_SIZE as i64 {
            return Err(FileIoError::Corrupt(format!(
                "nonsensical block header at offset {block_start}: num_vars={num_vars} block_size={block_size}"
            )));
        }

        let mut chunks = Vec::with_capacity(num_vars as usize);
        let mut rec_offset = block_start + DataBlock::HEADER_SIZE;
        for _ in 0..num_vars {
            let end = rec_offset + ChunkDescriptor::RECORD_SIZE;
            let mut rec = Cursor::new(mmap.get(rec_offset as usize..end as usize).ok_or_else(
                || FileIoError::Corrupt("chunk descriptor runs past end of file".into()),
            )?);
            let id = rec.read_i32::<LittleEndian>()?;
            let var_index = rec.read_i32::<LittleEndian>()?;
            let dest_offset = rec.read_i64::<LittleEndian>()?;
            let file_offset = rec.read_i64::<LittleEndian>()?;
            let chunk_size = rec.read_i64::<LittleEndian>()?;
            if id < 0 || var_index < 0 || dest_offset < 0 || file_offset < 0 || chunk_size < 0 {
                return Err(FileIoError::Corrupt(format!(
                    "negative field in chunk descriptor at offset {rec_offset}"
                )));
            }
            let chunk = ChunkDescriptor {
                id: id as u32,
                var_index: var_index as u32,
                file_offset: file_offset as u64,
                dest_offset: dest_offset as u64,
                chunk_size: chunk_size as u64,
            };
            let effective_end = chunk.dest_offset + chunk.chunk_size;
            let entry = var_sizes.entry(chunk.id).or_insert(0);
            *entry = (*entry).max(effective_end);
            chunks.push(chunk);
            rec_offset = end;
        }

        blocks.push(DataBlock {
            block_size: block_size as u64,
            chunks,
        });
        cursor += block_size as u64;
        if cursor > header.total_ckpt_size {
            return Err(FileIoError::Corrupt(format!(
                "block list overshoots declared total size: {cursor} > {}",
                header.total_ckpt_size
            )));
        }
    }

    Ok((header, BlockList { blocks }, var_sizes))
}

fn parse_header(mmap: &Mmap) -> Result<FileHeader, FileIoError> {
    let bytes = mmap
        .get(0..FILE_HEADER_SIZE as usize)
        .ok_or_else(|| FileIoError::Corrupt("file shorter than header".into()))?;
    let mut cursor = Cursor::new(bytes);
    let checkpoint_id = cursor.read_u32::<LittleEndian>()?;
    let total_ckpt_size = cursor.read_u64::<LittleEndian>()?;
    let timestamp_ns = cursor.read_i64::<LittleEndian>()?;
    let mut digest = [0u8; 16];
    cursor.read_exact(&mut digest)?;
    Ok(FileHeader {
        checkpoint_id,
        total_ckpt_size,
        timestamp_ns,
        digest,
    })
}

/// Recomputes the MD5 over the file with its header digest slot zeroed,
/// and compares it against `header.digest` (invariant 4).
pub fn verify_header_digest(path: &Path, header: &FileHeader) -> Result<bool, FileIoError> {
    use md5::Digest;
    let mut bytes = std::fs::read(path)?;
    let digest_start = (4 + 8 + 8) as usize;
    bytes[digest_start..digest_start + 16].fill(0);
    let mut hasher = md5::Md5::new();
    hasher.update(&bytes);
    let computed = hasher.finalize();
    Ok(computed.as_slice() == header.digest)
}

fn hex_to_bytes(hex: &str) -> Option<[u8; 16]> {
    if hex.len() != 32 {
        return None;
    }
    let mut out = [0u8; 16];
    for (i, chunk) in out.iter_mut().enumerate() {
        *chunk = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}

#[cfg(test)]
#[path = "fileio_tests.rs"]
mod tests;
