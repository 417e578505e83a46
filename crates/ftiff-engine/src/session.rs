// SPDX-License-Identifier: MIT

//! Per-run state, threaded through every public call instead of living
//! in process globals.

use fti_ff_core::{Collective, Directories, GroupTopology, IoMode, RsCodec};
use fti_ff_store::BlockList;

/// Owns the block list and the collaborators needed to drive a
/// checkpoint/recover call for one rank of one run. Generic over the
/// collective and RS-codec trait implementations so tests can substitute
/// [`fti_ff_core::FakeCollective`] / [`fti_ff_core::FakeRsCodec`].
pub struct Session<C: Collective, R: RsCodec> {
    pub directories: Directories,
    pub topology: GroupTopology,
    pub collective: C,
    pub rs_codec: R,
    pub checkpoint_id: u32,
    pub blocks: BlockList,
    pub io_mode: IoMode,
}

impl<C: Collective, R: RsCodec> Session<C, R> {
    pub fn new(directories: Directories, topology: GroupTopology, collective: C, rs_codec: R) -> Self {
        Self {
            directories,
            topology,
            collective,
            rs_codec,
            checkpoint_id: 0,
            blocks: BlockList::new(),
            io_mode: IoMode::default(),
        }
    }

    /// File name for this rank's checkpoint file at the given id, e.g.
    /// `Ckpt3-Rank1.fti` — matches the `Ckpt<n>` prefix the descriptor
    /// loader parses back out.
    pub fn ckpt_file_name(&self, checkpoint_id: u32) -> String {
        self.ckpt_file_name_for(self.topology.group_rank, checkpoint_id)
    }

    /// File name for `rank`'s checkpoint file at the given id.
    pub fn ckpt_file_name_for(&self, rank: u32, checkpoint_id: u32) -> String {
        format!("Ckpt{checkpoint_id}-Rank{rank}.fti")
    }
}
