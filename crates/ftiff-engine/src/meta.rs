// SPDX-License-Identifier: MIT

//! C4 loader: aggregates the descriptor staged at each level for one
//! sector/group pair.

use fti_ff_core::{CheckpointLevel, Directories, GroupTopology};
use fti_ff_store::{DescriptorError, GroupDescriptor};

#[derive(Debug, Clone)]
pub struct LevelMeta {
    pub level: CheckpointLevel,
    pub checkpoint_id: u32,
    pub descriptor: GroupDescriptor,
}

/// Loads the descriptor staged at `level` for `sector_id`/`group_id`, if
/// one has ever been written there.
pub fn load_level_descriptor(
    directories: &Directories,
    level: CheckpointLevel,
    sector_id: u32,
    group_id: u32,
) -> Result<Option<GroupDescriptor>, DescriptorError> {
    let path = GroupDescriptor::path(&directories.level(level).meta_dir, sector_id, group_id);
    if !path.is_file() {
        return Ok(None);
    }
    GroupDescriptor::load_descriptor(&path).map(Some)
}

/// Loads every level's descriptor for `sector_id`/`group_id`, tagging
/// each with the checkpoint id a rank of `topology` would recover.
///
/// Non-head ranks populate their own row only, and take `ckpt_id` from
/// it. Head ranks represent no protected data of their own; they scan
/// the body ranks on their node (`head_rank+1 ..= head_rank+node_size-1`)
/// and take the maximum `ckpt_id` across those rows, per §4.4.
pub fn load_all_levels(
    directories: &Directories,
    topology: &GroupTopology,
    sector_id: u32,
    group_id: u32,
) -> Result<Vec<LevelMeta>, DescriptorError> {
    let mut out = Vec::new();
    for level in CheckpointLevel::ALL {
        if let Some(descriptor) = load_level_descriptor(directories, level, sector_id, group_id)? {
            let checkpoint_id = level_checkpoint_id(&descriptor, topology);
            out.push(LevelMeta { level, checkpoint_id, descriptor });
        }
    }
    Ok(out)
}

/// `ckpt_id` this rank's role implies for one level's descriptor.
fn level_checkpoint_id(descriptor: &GroupDescriptor, topology: &GroupTopology) -> u32 {
    if topology.am_i_head && topology.node_size > 1 {
        let head_rank = topology.head_rank();
        return (1..topology.node_size)
            .filter_map(|offset| descriptor.rows.get(&(head_rank + offset)))
            .filter_map(|fields| GroupDescriptor::checkpoint_id_from_file_name(&fields.ckpt_file_name))
            .max()
            .unwrap_or(0);
    }
    descriptor
        .rows
        .get(&topology.group_rank)
        .and_then(|fields| GroupDescriptor::checkpoint_id_from_file_name(&fields.ckpt_file_name))
        .unwrap_or(0)
}

/// Picks the largest checkpoint id across every level's metadata — a
/// fencepost that is easy to get backwards when a level's id is not yet
/// known to be the newest.
pub fn latest_checkpoint_id(levels: &[LevelMeta]) -> Option<u32> {
    levels.iter().map(|m| m.checkpoint_id).max()
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
