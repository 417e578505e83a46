// SPDX-License-Identifier: MIT

//! C7: the recovery driver.

use crate::error::EngineError;
use crate::levels::highest_ready_level;
use crate::session::Session;
use fti_ff_core::{invariant, Collective, FtiError, IoMode, ProtectedVariable, RsCodec};
use fti_ff_core::CheckpointLevel;
use fti_ff_store::{read, verify_header_digest, GroupDescriptor};
use std::collections::HashMap;
use tracing::{info, warn};

/// Recovers every variable in `vars` from the highest-durability level
/// whose readiness check passes.
pub fn recover_all<C: Collective, R: RsCodec>(
    session: &Session<C, R>,
    vars: &mut [ProtectedVariable<'_>],
) -> Result<CheckpointLevel, EngineError> {
    recover(session, vars)
}

/// Recovers a single variable by id from the highest-durability level.
pub fn recover_one<C: Collective, R: RsCodec>(
    session: &Session<C, R>,
    var: &mut ProtectedVariable<'_>,
) -> Result<CheckpointLevel, EngineError> {
    recover(session, std::slice::from_mut(var))
}

fn recover<C: Collective, R: RsCodec>(
    session: &Session<C, R>,
    vars: &mut [ProtectedVariable<'_>],
) -> Result<CheckpointLevel, EngineError> {
    let ready = highest_ready_level(
        &session.collective,
        &session.directories,
        &session.topology,
        session.topology.sector_id,
        session.topology.group_id,
    )?
    .ok_or(EngineError::Unrecoverable)?;

    info!(level = %ready.level, "recovering checkpoint from level");
    let bytes = load_level_bytes(session, ready.level)?;
    restore_from_bytes(session, &bytes, &ready.descriptor, vars)?;
    Ok(ready.level)
}

fn own_path<C: Collective, R: RsCodec>(
    session: &Session<C, R>,
    level: CheckpointLevel,
) -> std::path::PathBuf {
    session.directories.level(level).ckpt_dir.join(session.ckpt_file_name(session.checkpoint_id))
}

/// Path to this rank's own file under the L2 holder it mirrors itself at
/// (`held-by-{own_rank}`), or under the ring neighbor that mirrors it on
/// its behalf (`held-by-{own_rank + 1}`).
fn l2_held_path<C: Collective, R: RsCodec>(
    session: &Session<C, R>,
    holder_rank: u32,
) -> std::path::PathBuf {
    let own_rank = session.topology.group_rank;
    session
        .directories
        .level(CheckpointLevel::L2Partner)
        .ckpt_dir
        .join(format!("held-by-{holder_rank}"))
        .join(session.ckpt_file_name_for(own_rank, session.checkpoint_id))
}

fn load_level_bytes<C: Collective, R: RsCodec>(
    session: &Session<C, R>,
    level: CheckpointLevel,
) -> Result<Vec<u8>, EngineError> {
    match level {
        CheckpointLevel::L1Local | CheckpointLevel::L4Pfs => Ok(std::fs::read(own_path(session, level))?),
        CheckpointLevel::L2Partner => {
            let own_rank = session.topology.group_rank;
            let mirror_holder = (own_rank + 1) % session.topology.group_size;
            for holder in [own_rank, mirror_holder] {
                let path = l2_held_path(session, holder);
                if path.is_file() {
                    return Ok(std::fs::read(path)?);
                }
            }
            Err(EngineError::Unrecoverable)
        }
        CheckpointLevel::L3ReedSolomon => {
            let own = own_path(session, level);
            if own.is_file() {
                return Ok(std::fs::read(own)?);
            }
            warn!("own Reed-Solomon file missing, reconstructing from group");
            let marker = vec![0u8];
            let gathered = session.collective.all_gather_fixed(&marker)?;
            let surviving: Vec<Option<Vec<u8>>> = gathered
                .into_iter()
                .enumerate()
                .map(|(rank, _)| {
                    let path = session
                        .directories
                        .level(level)
                        .ckpt_dir
                        .join(format!("Ckpt{}-Rank{rank}.fti", session.checkpoint_id));
                    std::fs::read(path).ok()
                })
                .collect();
            Ok(session.rs_codec.decode(&surviving)?)
        }
    }
}

/// Demultiplexes `bytes` back into `vars`, dispatching on [`IoMode`]: the
/// FTI-FF path reads the block list back through C3 (§4.7 point 3); the
/// legacy path reads the flat file directly, demultiplexed by the
/// variable table recorded in the descriptor (§4.7 point 4).
fn restore_from_bytes<C: Collective, R: RsCodec>(
    session: &Session<C, R>,
    bytes: &[u8],
    descriptor: &GroupDescriptor,
    vars: &mut [ProtectedVariable<'_>],
) -> Result<(), EngineError> {
    match session.io_mode {
        IoMode::FtiFf => restore_from_ftiff_bytes(session, bytes, vars),
        IoMode::Legacy => restore_from_flat_bytes(session, bytes, descriptor, vars),
    }
}

fn restore_from_flat_bytes<C: Collective, R: RsCodec>(
    session: &Session<C, R>,
    bytes: &[u8],
    descriptor: &GroupDescriptor,
    vars: &mut [ProtectedVariable<'_>],
) -> Result<(), EngineError> {
    let fields = descriptor
        .rows
        .get(&session.topology.group_rank)
        .ok_or(EngineError::Unrecoverable)?;

    let mut positions: HashMap<u32, (usize, usize)> = HashMap::new();
    let mut cursor = 0usize;
    for &(id, size) in &fields.vars {
        let end = cursor + size as usize;
        positions.insert(id, (cursor, end));
        cursor = end;
    }
    if cursor != bytes.len() {
        return Err(EngineError::Core(FtiError::Corrupt(format!(
            "flat checkpoint file is {} bytes, variable table declares {}",
            bytes.len(),
            cursor
        ))));
    }

    for var in vars.iter_mut() {
        let (start, end) = positions
            .get(&var.id)
            .copied()
            .ok_or(EngineError::Unrecoverable)?;
        let recovered = (end - start) as u64;
        if recovered != var.size {
            return Err(EngineError::SizeMismatch { id: var.id, recovered, declared: var.size });
        }
        invariant!(
            end - start <= var.host_buffer.len(),
            "variable {} recovered chunk overruns host buffer",
            var.id
        );
        var.host_buffer[..end - start].copy_from_slice(&bytes[start..end]);
    }

    Ok(())
}

fn restore_from_ftiff_bytes<C: Collective, R: RsCodec>(
    session: &Session<C, R>,
    bytes: &[u8],
    vars: &mut [ProtectedVariable<'_>],
) -> Result<(), EngineError> {
    std::fs::create_dir_all(&session.directories.tmp_meta_dir)?;
    let scratch_path = session.directories.tmp_meta_dir.join(format!(
        "recover-rank{}-{}.fti",
        session.topology.group_rank, session.checkpoint_id
    ));
    std::fs::write(&scratch_path, bytes)?;

    let (header, blocks, var_sizes) = read(&scratch_path)?;
    let digest_ok = verify_header_digest(&scratch_path, &header)?;
    let file_bytes = std::fs::read(&scratch_path)?;
    let _ = std::fs::remove_file(&scratch_path);

    if !digest_ok {
        warn!(checkpoint_id = session.checkpoint_id, "checkpoint file digest mismatch on recovery");
        return Err(EngineError::Core(FtiError::Corrupt(
            "checkpoint file digest does not match header".into(),
        )));
    }

    for var in vars.iter_mut() {
        let declared = var_sizes.get(&var.id).copied().unwrap_or(0);
        let mut recovered: u64 = 0;
        for block in &blocks.blocks {
            for chunk in &block.chunks {
                if chunk.id != var.id {
                    continue;
                }
                let start = chunk.file_offset as usize;
                let end = start + chunk.chunk_size as usize;
                let dst_start = chunk.dest_offset as usize;
                let dst_end = dst_start + chunk.chunk_size as usize;
                invariant!(
                    dst_end <= var.host_buffer.len(),
                    "variable {} recovered chunk overruns host buffer",
                    var.id
                );
                var.host_buffer[dst_start..dst_end].copy_from_slice(&file_bytes[start..end]);
                recovered += chunk.chunk_size;
            }
        }
        if recovered != declared {
            return Err(EngineError::SizeMismatch { id: var.id, recovered, declared });
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "recover_tests.rs"]
mod tests;
