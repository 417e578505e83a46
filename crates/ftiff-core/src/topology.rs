// SPDX-License-Identifier: MIT

//! Group/topology inputs consumed from the external process-topology
//! collaborator, and the durability-level enumeration.

use std::fmt;

/// Fields the core consumes from the external topology collaborator.
/// The core never re-derives these; they are given at `Session`
/// construction and held for the run's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupTopology {
    pub group_id: u32,
    pub group_rank: u32,
    pub group_size: u32,
    pub sector_id: u32,
    pub node_size: u32,
    pub am_i_head: bool,
}

impl GroupTopology {
    /// Rank of this rank's L2 partner: the previous rank in the group,
    /// wrapping around.
    pub fn partner_rank(&self) -> u32 {
        (self.group_rank + self.group_size - 1) % self.group_size
    }

    /// Rank of the head process for this rank's node: the lowest group
    /// rank in the contiguous `node_size`-wide block this rank falls in.
    pub fn head_rank(&self) -> u32 {
        self.group_rank - (self.group_rank % self.node_size)
    }
}

/// Selects between the FTI-FF block-structured file format and the
/// legacy flat-file format, per §4.7. The whole run agrees on one mode;
/// it is not re-derived per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoMode {
    /// Block-structured files written/read by C3 (`fti_ff_store::write`/
    /// `read`), with head ranks holding no protected data of their own.
    #[default]
    FtiFf,
    /// A flat byte dump, demultiplexed on recovery by the `vars` table
    /// carried in the descriptor. Body ranks ship that table to their
    /// node's head via `Collective::send` rather than the group-wide
    /// gather the FTI-FF path uses.
    Legacy,
}

/// One of the four durability tiers, ordered cheapest-to-costliest.
/// Recovery prefers the highest-numbered level whose readiness check
/// passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckpointLevel {
    /// Local-only: no replication, cheapest and least durable.
    L1Local = 1,
    /// Partner-mirror: each rank's file is copied to a neighbor.
    L2Partner = 2,
    /// Reed-Solomon erasure across the group.
    L3ReedSolomon = 3,
    /// Parallel-filesystem flush: most durable, most expensive.
    L4Pfs = 4,
}

impl CheckpointLevel {
    pub const ALL: [CheckpointLevel; 4] = [
        CheckpointLevel::L1Local,
        CheckpointLevel::L2Partner,
        CheckpointLevel::L3ReedSolomon,
        CheckpointLevel::L4Pfs,
    ];

    /// All levels, highest (most durable) first — the order recovery
    /// probes them in.
    pub fn highest_first() -> impl Iterator<Item = CheckpointLevel> {
        Self::ALL.into_iter().rev()
    }
}

impl fmt::Display for CheckpointLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointLevel::L1Local => write!(f, "L1"),
            CheckpointLevel::L2Partner => write!(f, "L2"),
            CheckpointLevel::L3ReedSolomon => write!(f, "L3"),
            CheckpointLevel::L4Pfs => write!(f, "L4"),
        }
    }
}

/// Durability state of a checkpoint at a given level, per rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityState {
    /// No checkpoint file present for this level.
    Absent,
    /// File exists in the staging directory; descriptor exists.
    Staged,
    /// Level-specific post-processing succeeded.
    Durable,
    /// The most recent Durable checkpoint at this level.
    Active,
}

/// Opaque POSIX paths the core is given for a run. The core never
/// parses configuration files; this struct is its entire config input.
#[derive(Debug, Clone)]
pub struct Directories {
    pub meta_dir: std::path::PathBuf,
    pub tmp_meta_dir: std::path::PathBuf,
    pub levels: [LevelDirs; 4],
}

#[derive(Debug, Clone)]
pub struct LevelDirs {
    pub ckpt_dir: std::path::PathBuf,
    pub meta_dir: std::path::PathBuf,
}

impl Directories {
    pub fn level(&self, level: CheckpointLevel) -> &LevelDirs {
        &self.levels[level as usize - 1]
    }
}
