// SPDX-License-Identifier: MIT

//! Collective-communication trait boundary.
//!
//! The core never implements these primitives; it consumes them from an
//! external communication collaborator. The ordering guarantee the core
//! relies on: every primitive here is barriered at group scope and
//! returns only after every rank has contributed.

use crate::error::FtiError;

/// All-gather / reduction primitives the core consumes.
pub trait Collective: Send + Sync {
    /// Gathers a fixed-size buffer from every rank in the group, ordered
    /// by group rank. `buf` is this rank's contribution; the returned
    /// vector has `group_size` entries of `buf.len()` bytes each.
    fn all_gather_fixed(&self, buf: &[u8]) -> Result<Vec<Vec<u8>>, FtiError>;

    /// Gathers a fixed-size buffer from every rank to rank 0 only. Ranks
    /// other than 0 get an empty vector back.
    fn gather_to_zero(&self, buf: &[u8]) -> Result<Vec<Vec<u8>>, FtiError>;

    /// Sends a byte buffer to `dest` rank within the group.
    fn send(&self, dest: u32, buf: &[u8]) -> Result<(), FtiError>;

    /// Receives a byte buffer sent by `src` rank within the group.
    fn recv(&self, src: u32) -> Result<Vec<u8>, FtiError>;

    /// Logical-OR reduction of one bit per rank (used by L3 readiness to
    /// gather the `erased[]` bitvector).
    fn all_reduce_or(&self, bit: bool) -> Result<Vec<bool>, FtiError>;

    /// This rank's position in the group.
    fn group_rank(&self) -> u32;

    /// Number of ranks in the group.
    fn group_size(&self) -> u32;
}

/// In-memory single-process fake used for deterministic tests. Each
/// simulated rank gets its own handle sharing the same backing channel
/// set; `all_gather_fixed`/`gather_to_zero` are driven by pre-seeded
/// per-rank buffers rather than real synchronization, since production
/// barriering is the real collaborator's job, not the core's.
#[derive(Clone)]
pub struct FakeCollective {
    rank: u32,
    size: u32,
    /// Shared view of what every rank would contribute, indexed by rank.
    contributions: std::sync::Arc<parking_lot::Mutex<Vec<Option<Vec<u8>>>>>,
    /// Point-to-point mailboxes, indexed by destination rank.
    mailboxes: std::sync::Arc<parking_lot::Mutex<Vec<Vec<Vec<u8>>>>>,
}

impl FakeCollective {
    pub fn new_group(size: u32) -> Vec<Self> {
        let contributions = std::sync::Arc::new(parking_lot::Mutex::new(vec![None; size as usize]));
        let mailboxes =
            std::sync::Arc::new(parking_lot::Mutex::new(vec![Vec::new(); size as usize]));
        (0..size)
            .map(|rank| FakeCollective {
                rank,
                size,
                contributions: contributions.clone(),
                mailboxes: mailboxes.clone(),
            })
            .collect()
    }

    /// Seeds this rank's contribution for the next all-gather/gather.
    pub fn set_contribution(&self, buf: &[u8]) {
        let mut guard = self.contributions.lock();
        guard[self.rank as usize] = Some(buf.to_vec());
    }
}

impl Collective for FakeCollective {
    fn all_gather_fixed(&self, buf: &[u8]) -> Result<Vec<Vec<u8>>, FtiError> {
        self.set_contribution(buf);
        let guard = self.contributions.lock();
        guard
            .iter()
            .enumerate()
            .map(|(rank, entry)| {
                entry.clone().ok_or_else(|| {
                    FtiError::Collective(format!("rank {rank} never contributed to all-gather"))
                })
            })
            .collect()
    }

    fn gather_to_zero(&self, buf: &[u8]) -> Result<Vec<Vec<u8>>, FtiError> {
        self.set_contribution(buf);
        if self.rank != 0 {
            return Ok(Vec::new());
        }
        self.all_gather_fixed(buf)
    }

    fn send(&self, dest: u32, buf: &[u8]) -> Result<(), FtiError> {
        let mut guard = self.mailboxes.lock();
        guard[dest as usize].push(buf.to_vec());
        Ok(())
    }

    fn recv(&self, _src: u32) -> Result<Vec<u8>, FtiError> {
        let mut guard = self.mailboxes.lock();
        let inbox = &mut guard[self.rank as usize];
        if inbox.is_empty() {
            return Err(FtiError::Collective(format!(
                "rank {} has no pending message",
                self.rank
            )));
        }
        Ok(inbox.remove(0))
    }

    fn all_reduce_or(&self, bit: bool) -> Result<Vec<bool>, FtiError> {
        let gathered = self.all_gather_fixed(&[bit as u8])?;
        Ok(gathered.into_iter().map(|b| b[0] != 0).collect())
    }

    fn group_rank(&self) -> u32 {
        self.rank
    }

    fn group_size(&self) -> u32 {
        self.size
    }
}

#[cfg(test)]
#[path = "collective_tests.rs"]
mod tests;
