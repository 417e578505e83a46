// SPDX-License-Identifier: MIT

//! End-to-end write-path orchestrator: C2 (block layout) -> C1
//! (checksum) -> C3 (serialize) -> C4 (descriptor) -> C5/C6 (durability
//! hand-off across levels).

use crate::error::EngineError;
use crate::reduce::{decode_fields, encode_fields, gather_group_descriptor};
use crate::session::Session;
use fti_ff_core::{CheckpointLevel, Collective, IoMode, ProtectedVariable, RsCodec};
use fti_ff_store::{checksum_file, write, FileHeader, GroupDescriptor, RankFields};
use std::collections::BTreeMap;
use tracing::info;

/// Drives one rank's checkpoint write up to and including `target_level`.
/// Dispatches on [`IoMode`]: the FTI-FF path writes block-structured
/// files through C3; the legacy path writes a flat byte dump and ships
/// its descriptor row to its node's head over `send`/`recv` (§4.6)
/// instead of the group-wide gather the FTI-FF path uses.
pub fn checkpoint<C: Collective, R: RsCodec>(
    session: &mut Session<C, R>,
    checkpoint_id: u32,
    target_level: CheckpointLevel,
    vars: &mut [ProtectedVariable<'_>],
) -> Result<(), EngineError> {
    session.checkpoint_id = checkpoint_id;
    match session.io_mode {
        IoMode::FtiFf => checkpoint_ftiff(session, checkpoint_id, target_level, vars),
        IoMode::Legacy => checkpoint_legacy(session, checkpoint_id, target_level, vars),
    }
}

/// Drives one rank's checkpoint write up to and including `target_level`,
/// in durability order: L1 write, L2 partner mirror, L3 Reed-Solomon
/// encode, L4 parallel-filesystem flush.
fn checkpoint_ftiff<C: Collective, R: RsCodec>(
    session: &mut Session<C, R>,
    checkpoint_id: u32,
    target_level: CheckpointLevel,
    vars: &mut [ProtectedVariable<'_>],
) -> Result<(), EngineError> {
    session.blocks.update_layout(vars)?;

    let file_name = session.ckpt_file_name(checkpoint_id);
    let l1_path = session.directories.level(CheckpointLevel::L1Local).ckpt_dir.join(&file_name);

    let header = FileHeader {
        checkpoint_id,
        total_ckpt_size: session.blocks.total_size(),
        timestamp_ns: 0,
        digest: [0u8; 16],
    };
    write(&l1_path, &header, &session.blocks, vars)?;
    let checksum = checksum_file(&l1_path);
    info!(checkpoint_id, level = %CheckpointLevel::L1Local, %checksum, "wrote checkpoint file");

    let mut fields = RankFields {
        ckpt_file_name: file_name.clone(),
        ckpt_file_size: header.total_ckpt_size,
        ckpt_file_maxs: header.total_ckpt_size,
        ckpt_checksum: checksum,
        rsed_checksum: None,
        vars: vars.iter().map(|v| (v.id, v.size)).collect(),
    };

    write_descriptor_at(session, CheckpointLevel::L1Local, &fields)?;
    if target_level == CheckpointLevel::L1Local {
        return Ok(());
    }

    // Each rank mirrors its ring predecessor's file: gather every rank's
    // L1 bytes, then store the bytes belonging to `partner_rank()`
    // (this rank's predecessor) under a directory scoped to this rank
    // as holder, so a predecessor's total data loss still leaves its
    // mirror recoverable.
    let own_bytes_for_mirror = std::fs::read(&l1_path)?;
    let group_files = session.collective.all_gather_fixed(&own_bytes_for_mirror)?;
    let own_rank = session.topology.group_rank;
    let mirrored_rank = session.topology.partner_rank();
    let own_held_dir = session
        .directories
        .level(CheckpointLevel::L2Partner)
        .ckpt_dir
        .join(format!("held-by-{own_rank}"));
    std::fs::create_dir_all(&own_held_dir)?;
    std::fs::write(own_held_dir.join(&file_name), &own_bytes_for_mirror)?;
    if let Some(mirrored_bytes) = group_files.get(mirrored_rank as usize) {
        let mirrored_name = session.ckpt_file_name_for(mirrored_rank, checkpoint_id);
        std::fs::write(own_held_dir.join(&mirrored_name), mirrored_bytes)?;
    }
    info!(checkpoint_id, level = %CheckpointLevel::L2Partner, mirrors = mirrored_rank, "mirrored checkpoint file to partner tier");
    write_descriptor_at(session, CheckpointLevel::L2Partner, &fields)?;
    if target_level == CheckpointLevel::L2Partner {
        return Ok(());
    }

    let own_bytes = std::fs::read(&l1_path)?;
    let group_files = session.collective.all_gather_fixed(&own_bytes)?;
    let rs_bytes = session.rs_codec.encode(&group_files)?;
    let l3_dir = session.directories.level(CheckpointLevel::L3ReedSolomon).ckpt_dir.clone();
    std::fs::create_dir_all(&l3_dir)?;
    let l3_path = l3_dir.join(&file_name);
    std::fs::write(&l3_path, &rs_bytes)?;
    fields.rsed_checksum = Some(checksum_file(&l3_path));
    info!(checkpoint_id, level = %CheckpointLevel::L3ReedSolomon, "encoded Reed-Solomon checkpoint file");
    write_descriptor_at(session, CheckpointLevel::L3ReedSolomon, &fields)?;
    if target_level == CheckpointLevel::L3ReedSolomon {
        return Ok(());
    }

    let l4_dir = session.directories.level(CheckpointLevel::L4Pfs).ckpt_dir.clone();
    std::fs::create_dir_all(&l4_dir)?;
    std::fs::copy(&l1_path, l4_dir.join(&file_name))?;
    info!(checkpoint_id, level = %CheckpointLevel::L4Pfs, "flushed checkpoint file to parallel filesystem tier");
    write_descriptor_at(session, CheckpointLevel::L4Pfs, &fields)?;

    Ok(())
}

/// Writes this rank's variables as a flat byte dump rather than an
/// FTI-FF block-structured file (§4.7 point 4).
///
/// A rank sharing its node with others (`node_size > 1`) defers to its
/// head: a head rank has no protected data of its own and instead
/// receives its body ranks' rows over `recv` and writes the descriptor
/// on their behalf; a body rank ships its row to the head over `send`
/// in place of the group-wide gather the FTI-FF path uses. A solo rank
/// (`node_size == 1`) is its own head and body and keeps the ordinary
/// group-wide descriptor write and full level pipeline.
fn checkpoint_legacy<C: Collective, R: RsCodec>(
    session: &mut Session<C, R>,
    checkpoint_id: u32,
    target_level: CheckpointLevel,
    vars: &mut [ProtectedVariable<'_>],
) -> Result<(), EngineError> {
    if session.topology.am_i_head && session.topology.node_size > 1 {
        return receive_legacy_descriptor_rows(session, target_level);
    }

    let file_name = session.ckpt_file_name(checkpoint_id);
    let l1_path = session.directories.level(CheckpointLevel::L1Local).ckpt_dir.join(&file_name);
    if let Some(parent) = l1_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut buf = Vec::new();
    for var in vars.iter() {
        buf.extend_from_slice(var.host_buffer);
    }
    std::fs::write(&l1_path, &buf)?;
    let checksum = checksum_file(&l1_path);
    info!(checkpoint_id, level = %CheckpointLevel::L1Local, %checksum, "wrote legacy flat checkpoint file");

    let fields = RankFields {
        ckpt_file_name: file_name,
        ckpt_file_size: buf.len() as u64,
        ckpt_file_maxs: buf.len() as u64,
        ckpt_checksum: checksum,
        rsed_checksum: None,
        vars: vars.iter().map(|v| (v.id, v.size)).collect(),
    };

    if session.topology.node_size > 1 {
        let head = session.topology.head_rank();
        session.collective.send(head, &encode_fields(&fields))?;
        return Ok(());
    }

    write_descriptor_at(session, target_level, &fields)
}

/// Head-side counterpart of [`checkpoint_legacy`]: receives one row per
/// body rank on this node (`1..node_size`, relative to the head's own
/// group rank) and writes the descriptor directly, since the head never
/// participates in the FTI-FF path's group-wide gather.
fn receive_legacy_descriptor_rows<C: Collective, R: RsCodec>(
    session: &Session<C, R>,
    target_level: CheckpointLevel,
) -> Result<(), EngineError> {
    let head_rank = session.topology.head_rank();
    let mut rows = BTreeMap::new();
    for offset in 1..session.topology.node_size {
        let body_rank = head_rank + offset;
        let buf = session.collective.recv(body_rank)?;
        rows.insert(body_rank, decode_fields(&buf)?);
    }
    let descriptor = GroupDescriptor { rows };
    let path = GroupDescriptor::path(
        &session.directories.level(target_level).meta_dir,
        session.topology.sector_id,
        session.topology.group_id,
    );
    descriptor.write_descriptor(&path)?;
    Ok(())
}

fn write_descriptor_at<C: Collective, R: RsCodec>(
    session: &Session<C, R>,
    level: CheckpointLevel,
    fields: &RankFields,
) -> Result<(), EngineError> {
    if let Some(descriptor) = gather_group_descriptor(&session.collective, fields)? {
        let path = GroupDescriptor::path(
            &session.directories.level(level).meta_dir,
            session.topology.sector_id,
            session.topology.group_id,
        );
        descriptor.write_descriptor(&path)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
