// SPDX-License-Identifier: MIT

//! C6: thin orchestration built on the `Collective` trait — gathering
//! each rank's descriptor row to the group writer and electing which
//! rank owns the write.

use fti_ff_core::{Collective, FtiError};
use fti_ff_store::{GroupDescriptor, RankFields};
use std::collections::BTreeMap;

/// Rank 0 of every group is the group writer.
pub fn is_group_writer(collective: &dyn Collective) -> bool {
    collective.group_rank() == 0
}

/// Gathers every rank's descriptor row to the group writer and
/// assembles the full per-group descriptor there. Non-writer ranks get
/// back `None`.
pub fn gather_group_descriptor(
    collective: &dyn Collective,
    own_fields: &RankFields,
) -> Result<Option<GroupDescriptor>, FtiError> {
    let encoded = encode_fields(own_fields);
    let gathered = collective.gather_to_zero(&encoded)?;
    if !is_group_writer(collective) {
        return Ok(None);
    }
    let mut rows = BTreeMap::new();
    for (rank, buf) in gathered.into_iter().enumerate() {
        rows.insert(rank as u32, decode_fields(&buf)?);
    }
    Ok(Some(GroupDescriptor { rows }))
}

pub(crate) fn encode_fields(fields: &RankFields) -> Vec<u8> {
    let mut out = Vec::new();
    push_str(&mut out, &fields.ckpt_file_name);
    out.extend_from_slice(&fields.ckpt_file_size.to_le_bytes());
    out.extend_from_slice(&fields.ckpt_file_maxs.to_le_bytes());
    push_str(&mut out, &fields.ckpt_checksum);
    match &fields.rsed_checksum {
        Some(s) => {
            out.push(1);
            push_str(&mut out, s);
        }
        None => out.push(0),
    }
    out.extend_from_slice(&(fields.vars.len() as u32).to_le_bytes());
    for (id, size) in &fields.vars {
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
    }
    out
}

pub(crate) fn decode_fields(buf: &[u8]) -> Result<RankFields, FtiError> {
    let mut cursor = 0usize;
    let ckpt_file_name = pop_str(buf, &mut cursor)?;
    let ckpt_file_size = pop_u64(buf, &mut cursor)?;
    let ckpt_file_maxs = pop_u64(buf, &mut cursor)?;
    let ckpt_checksum = pop_str(buf, &mut cursor)?;
    let has_rsed = *buf
        .get(cursor)
        .ok_or_else(|| FtiError::Corrupt("truncated rank row".into()))?;
    cursor += 1;
    let rsed_checksum = if has_rsed == 1 { Some(pop_str(buf, &mut cursor)?) } else { None };
    let num_vars = pop_u32(buf, &mut cursor)?;
    let mut vars = Vec::with_capacity(num_vars as usize);
    for _ in 0..num_vars {
        let id = pop_u32(buf, &mut cursor)?;
        let size = pop_u64(buf, &mut cursor)?;
        vars.push((id, size));
    }
    Ok(RankFields {
        ckpt_file_name,
        ckpt_file_size,
        ckpt_file_maxs,
        ckpt_checksum,
        rsed_checksum,
        vars,
    })
}

fn push_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn pop_u32(buf: &[u8], cursor: &mut usize) -> Result<u32, FtiError> {
    let end = *cursor + 4;
    let bytes: [u8; 4] = buf
        .get(*cursor..end)
        .ok_or_else(|| FtiError::Corrupt("truncated rank row".into()))?
        .try_into()
        .map_err(|_| FtiError::Corrupt("truncated rank row".into()))?;
    *cursor = end;
    Ok(u32::from_le_bytes(bytes))
}

fn pop_u64(buf: &[u8], cursor: &mut usize) -> Result<u64, FtiError> {
    let end = *cursor + 8;
    let bytes: [u8; 8] = buf
        .get(*cursor..end)
        .ok_or_else(|| FtiError::Corrupt("truncated rank row".into()))?
        .try_into()
        .map_err(|_| FtiError::Corrupt("truncated rank row".into()))?;
    *cursor = end;
    Ok(u64::from_le_bytes(bytes))
}

fn pop_str(buf: &[u8], cursor: &mut usize) -> Result<String, FtiError> {
    let len = pop_u32(buf, cursor)? as usize;
    let end = *cursor + len;
    let bytes = buf
        .get(*cursor..end)
        .ok_or_else(|| FtiError::Corrupt("truncated rank row".into()))?;
    *cursor = end;
    String::from_utf8(bytes.to_vec()).map_err(|_| FtiError::Corrupt("non-utf8 rank row".into()))
}

#[cfg(test)]
#[path = "reduce_tests.rs"]
mod tests;
