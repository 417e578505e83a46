// SPDX-License-Identifier: MIT

//! C4: the group metadata store.
//!
//! Path convention: `<metaDir|mTmpDir>/sector<S>-group<G>.fti`, a small
//! `[section]` / `key = value` text document with one section per
//! in-group rank. No general-purpose ini crate is reached for here — the
//! format is small, FTI-specific and hand-rolled, the same way the
//! teacher hand-rolls its own JSONL WAL format rather than pull in a log
//! crate for it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed descriptor line: {0:?}")]
    Malformed(String),
    #[error("rank {0} row missing from descriptor")]
    MissingRow(u32),
}

/// One in-group-rank's row of a [`GroupDescriptor`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankFields {
    pub ckpt_file_name: String,
    pub ckpt_file_size: u64,
    pub ckpt_file_maxs: u64,
    pub ckpt_checksum: String,
    pub rsed_checksum: Option<String>,
    /// `(var_id, var_size)` pairs in registration order.
    pub vars: Vec<(u32, u64)>,
}

/// An ordered key/value document with one section per group rank,
/// recording file names, sizes, checksums and the per-variable layout
/// table (§4.4/§6).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupDescriptor {
    pub rows: BTreeMap<u32, RankFields>,
}

impl GroupDescriptor {
    pub fn path(meta_dir: &Path, sector_id: u32, group_id: u32) -> PathBuf {
        meta_dir.join(format!("sector{sector_id}-group{group_id}.fti"))
    }

    /// Serializes this descriptor to its `[section]`/`key = value` text
    /// form.
    fn render(&self) -> String {
        let mut out = String::new();
        for (rank, fields) in &self.rows {
            out.push_str(&format!("[{rank}]\n"));
            out.push_str(&format!("Ckpt_file_name = {}\n", fields.ckpt_file_name));
            out.push_str(&format!("Ckpt_file_size = {}\n", fields.ckpt_file_size));
            out.push_str(&format!("Ckpt_file_maxs = {}\n", fields.ckpt_file_maxs));
            out.push_str(&format!("Ckpt_checksum = {}\n", fields.ckpt_checksum));
            if let Some(rsed) = &fields.rsed_checksum {
                out.push_str(&format!("RSed_checksum = {rsed}\n"));
            }
            for (j, (id, size)) in fields.vars.iter().enumerate() {
                out.push_str(&format!("Var{j}_id = {id}\n"));
                out.push_str(&format!("Var{j}_size = {size}\n"));
            }
        }
        out
    }

    fn parse(text: &str) -> Result<Self, DescriptorError> {
        let mut rows: BTreeMap<u32, RankFields> = BTreeMap::new();
        let mut current: Option<u32> = None;

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(stripped) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                let rank: u32 = stripped
                    .parse()
                    .map_err(|_| DescriptorError::Malformed(raw_line.to_string()))?;
                current = Some(rank);
                rows.entry(rank).or_default();
                continue;
            }
            let rank = current.ok_or_else(|| DescriptorError::Malformed(raw_line.to_string()))?;
            let (key, value) = line
                .split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .ok_or_else(|| DescriptorError::Malformed(raw_line.to_string()))?;
            let fields = rows.entry(rank).or_default();
            set_field(fields, key, value)?;
        }

        Ok(GroupDescriptor { rows })
    }

    /// Rank 0 of the group writes the descriptor to the staging metadata
    /// directory, replacing any previous file — atomic via write-then-rename.
    pub fn write_descriptor(&self, path: &Path) -> Result<(), DescriptorError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("fti.tmp");
        fs::write(&tmp_path, self.render())?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn load_descriptor(path: &Path) -> Result<Self, DescriptorError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Patches in the Reed-Solomon checksum for every rank (rank `i`
    /// gets `digests[i]`), rewriting the file in place.
    pub fn patch_rsed_checksums(
        &mut self,
        path: &Path,
        digests: &[String],
    ) -> Result<(), DescriptorError> {
        for (rank, digest) in digests.iter().enumerate() {
            if let Some(fields) = self.rows.get_mut(&(rank as u32)) {
                fields.rsed_checksum = Some(digest.clone());
            }
        }
        self.write_descriptor(path)
    }

    /// Returns `(own, partner, rsed)` checksums for `group_rank`, where
    /// partner is read from the partner's own row
    /// `(group_rank + group_size - 1) % group_size`.
    pub fn get_checksums(
        &self,
        group_rank: u32,
        group_size: u32,
    ) -> Result<(String, String, Option<String>), DescriptorError> {
        let own = self
            .rows
            .get(&group_rank)
            .ok_or(DescriptorError::MissingRow(group_rank))?;
        let partner_rank = (group_rank + group_size - 1) % group_size;
        let partner = self
            .rows
            .get(&partner_rank)
            .ok_or(DescriptorError::MissingRow(partner_rank))?;
        Ok((
            own.ckpt_checksum.clone(),
            partner.ckpt_checksum.clone(),
            own.rsed_checksum.clone(),
        ))
    }

    /// Parses the leading `Ckpt<n>` substring of a checkpoint file name,
    /// as the loader does to recover the checkpoint id.
    pub fn checkpoint_id_from_file_name(name: &str) -> Option<u32> {
        let rest = name.strip_prefix("Ckpt")?;
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        digits.parse().ok()
    }
}

fn set_field(fields: &mut RankFields, key: &str, value: &str) -> Result<(), DescriptorError> {
    match key {
        "Ckpt_file_name" => fields.ckpt_file_name = value.to_string(),
        "Ckpt_file_size" => {
            fields.ckpt_file_size = value
                .parse()
                .map_err(|_| DescriptorError::Malformed(format!("{key}={value}")))?
        }
        "Ckpt_file_maxs" => {
            fields.ckpt_file_maxs = value
                .parse()
                .map_err(|_| DescriptorError::Malformed(format!("{key}={value}")))?
        }
        "Ckpt_checksum" => fields.ckpt_checksum = value.to_string(),
        "RSed_checksum" => fields.rsed_checksum = Some(value.to_string()),
        _ => {
            if let Some(rest) = key.strip_prefix("Var") {
                if let Some((idx, field)) = rest.split_once('_') {
                    let idx: usize = idx
                        .parse()
                        .map_err(|_| DescriptorError::Malformed(format!("{key}={value}")))?;
                    if fields.vars.len() <= idx {
                        fields.vars.resize(idx + 1, (0, 0));
                    }
                    match field {
                        "id" => {
                            fields.vars[idx].0 = value
                                .parse()
                                .map_err(|_| DescriptorError::Malformed(format!("{key}={value}")))?
                        }
                        "size" => {
                            fields.vars[idx].1 = value
                                .parse()
                                .map_err(|_| DescriptorError::Malformed(format!("{key}={value}")))?
                        }
                        _ => return Err(DescriptorError::Malformed(format!("{key}={value}"))),
                    }
                    return Ok(());
                }
            }
            return Err(DescriptorError::Malformed(format!("{key}={value}")));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
