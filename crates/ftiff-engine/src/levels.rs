// SPDX-License-Identifier: MIT

//! C5: per-level readiness predicates and the durability state machine.
//! Recovery probes levels highest-durability first and recovers from
//! the first one whose readiness check passes.

use crate::meta::load_level_descriptor;
use fti_ff_core::{CheckpointLevel, Collective, Directories, DurabilityState, FtiError, GroupTopology};
use fti_ff_store::{checksum_file, DescriptorError, GroupDescriptor};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),
    #[error("collective error: {0}")]
    Core(#[from] FtiError),
}

fn healthy_copy(
    directories: &Directories,
    descriptor: &GroupDescriptor,
    rank: u32,
    level: CheckpointLevel,
) -> bool {
    let Some(fields) = descriptor.rows.get(&rank) else {
        return false;
    };
    let path = directories.level(level).ckpt_dir.join(&fields.ckpt_file_name);
    path.is_file()
        && std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0) == fields.ckpt_file_size
        && checksum_file(&path) == fields.ckpt_checksum
}

/// L1: this rank's own checkpoint file matches the descriptor's declared
/// size and checksum.
pub fn l1_ready(directories: &Directories, descriptor: &GroupDescriptor, group_rank: u32) -> bool {
    healthy_copy(directories, descriptor, group_rank, CheckpointLevel::L1Local)
}

/// Path a rank's L2 copy of `owner_rank`'s file would live at, under the
/// directory of whichever rank is holding it (`owner_rank` itself, or
/// `owner_rank`'s ring neighbor who mirrors it).
fn l2_held_copy_path(
    directories: &Directories,
    descriptor: &GroupDescriptor,
    owner_rank: u32,
    holder_rank: u32,
) -> Option<(std::path::PathBuf, String)> {
    let fields = descriptor.rows.get(&owner_rank)?;
    let path = directories
        .level(CheckpointLevel::L2Partner)
        .ckpt_dir
        .join(format!("held-by-{holder_rank}"))
        .join(&fields.ckpt_file_name);
    Some((path, fields.ckpt_checksum.clone()))
}

/// L2: either this rank's own held copy, or the copy its ring neighbor
/// mirrors on its behalf, is healthy. Each rank mirrors its ring
/// predecessor's file (see [`checkpoint::checkpoint`]'s L2 step), so
/// `group_rank`'s data is backed up at `(group_rank + 1) % group_size`.
pub fn l2_ready(directories: &Directories, descriptor: &GroupDescriptor, topology: &GroupTopology) -> bool {
    let rank = topology.group_rank;
    let mirror_holder = (rank + 1) % topology.group_size;
    for holder in [rank, mirror_holder] {
        if let Some((path, checksum)) = l2_held_copy_path(directories, descriptor, rank, holder) {
            if path.is_file() && checksum_file(&path) == checksum {
                return true;
            }
        }
    }
    false
}

/// L3: the group can tolerate at most one erased (missing or corrupt)
/// rank file, gathered via a logical-OR reduction across the group.
pub fn l3_ready(
    collective: &dyn Collective,
    directories: &Directories,
    descriptor: &GroupDescriptor,
    group_rank: u32,
) -> Result<bool, LevelError> {
    let erased = !healthy_copy(directories, descriptor, group_rank, CheckpointLevel::L3ReedSolomon);
    let votes = collective.all_reduce_or(erased)?;
    Ok(votes.iter().filter(|&&e| e).count() <= 1)
}

/// L4: the parallel-filesystem copy matches the descriptor's declared
/// checksum.
pub fn l4_ready(directories: &Directories, descriptor: &GroupDescriptor, group_rank: u32) -> bool {
    healthy_copy(directories, descriptor, group_rank, CheckpointLevel::L4Pfs)
}

/// Durability state of one rank's row at a level: `Absent` if no row
/// exists, `Staged` if the row exists but fails its readiness check,
/// `Durable` otherwise. `Active` is reserved for the level a recovery
/// actually picks.
pub fn durability_state(
    descriptor: Option<&GroupDescriptor>,
    group_rank: u32,
    ready: bool,
) -> DurabilityState {
    match descriptor.and_then(|d| d.rows.get(&group_rank)) {
        None => DurabilityState::Absent,
        Some(_) if ready => DurabilityState::Durable,
        Some(_) => DurabilityState::Staged,
    }
}

/// The highest-durability level ready for recovery, and the descriptor
/// that was loaded to make that call.
pub struct ReadyLevel {
    pub level: CheckpointLevel,
    pub descriptor: GroupDescriptor,
}

/// Probes every level for `sector_id`/`group_id` and returns the
/// highest-durability one whose readiness check passes.
pub fn highest_ready_level(
    collective: &dyn Collective,
    directories: &Directories,
    topology: &GroupTopology,
    sector_id: u32,
    group_id: u32,
) -> Result<Option<ReadyLevel>, LevelError> {
    let mut by_level = std::collections::HashMap::new();
    for level in CheckpointLevel::ALL {
        if let Some(descriptor) = load_level_descriptor(directories, level, sector_id, group_id)? {
            by_level.insert(level, descriptor);
        }
    }

    // `all_reduce_or` is a group barrier: every rank must vote on L3
    // readiness regardless of which level ultimately wins, or ranks that
    // short-circuit at L4 would leave the others waiting.
    let l3_vote = match by_level.get(&CheckpointLevel::L3ReedSolomon) {
        Some(descriptor) => l3_ready(collective, directories, descriptor, topology.group_rank)?,
        None => {
            collective.all_reduce_or(true)?;
            false
        }
    };

    for level in CheckpointLevel::highest_first() {
        let Some(descriptor) = by_level.get(&level) else {
            continue;
        };
        let ready = match level {
            CheckpointLevel::L4Pfs => l4_ready(directories, descriptor, topology.group_rank),
            CheckpointLevel::L3ReedSolomon => l3_vote,
            CheckpointLevel::L2Partner => l2_ready(directories, descriptor, topology),
            CheckpointLevel::L1Local => l1_ready(directories, descriptor, topology.group_rank),
        };
        if ready {
            return Ok(Some(ReadyLevel { level, descriptor: descriptor.clone() }));
        }
    }
    Ok(None)
}

#[cfg(test)]
#[path = "levels_tests.rs"]
mod tests;
