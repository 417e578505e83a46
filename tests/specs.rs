//! End-to-end scenarios (S1-S6) run at the library level: real
//! serializer round-trips for the block model, and real multi-rank
//! checkpoint/recover cycles through `fti-ff-engine` for the level
//! fallback scenarios.

use fti_ff_core::{
    CheckpointLevel, Directories, FakeCollective, FakeRsCodec, GroupTopology, LevelDirs,
    ProtectedVariable,
};
use fti_ff_engine::{recover_all, Session};
use fti_ff_store::{checksum_file, write, BlockList, FileHeader, GroupDescriptor, RankFields};
use similar_asserts::assert_eq;
use std::collections::BTreeMap;

fn directories(root: &std::path::Path) -> Directories {
    let level = |name: &str| LevelDirs {
        ckpt_dir: root.join(name).join("ckpt"),
        meta_dir: root.join(name).join("meta"),
    };
    Directories {
        meta_dir: root.join("global-meta"),
        tmp_meta_dir: root.join("tmp-meta"),
        levels: [level("l1"), level("l2"), level("l3"), level("l4")],
    }
}

fn topology(group_rank: u32, group_size: u32) -> GroupTopology {
    GroupTopology {
        group_id: 0,
        group_rank,
        group_size,
        sector_id: 0,
        node_size: 1,
        am_i_head: group_rank == 0,
    }
}

/// S1: one variable `id=7, size=16`, bytes `00..0F`. Block 0 holds
/// exactly one chunk covering the whole buffer at `dest_offset=0`.
#[test]
fn s1_fresh_checkpoint_produces_a_single_full_width_chunk() {
    let mut buf: Vec<u8> = (0..16u8).collect();
    let vars = vec![ProtectedVariable::new(7, &mut buf)];
    let mut blocks = BlockList::new();
    blocks.update_layout(&vars).unwrap();

    assert_eq!(blocks.blocks.len(), 1);
    let chunk = blocks.blocks[0].chunks[0];
    assert_eq!(chunk.id, 7);
    assert_eq!(chunk.dest_offset, 0);
    assert_eq!(chunk.chunk_size, 16);
}

/// S2: the same variable grows from 16 to 24 bytes. The new block holds
/// exactly one chunk, `dest_offset=16, chunk_size=8`.
#[test]
fn s2_growth_appends_a_block_covering_only_the_new_bytes() {
    let mut buf: Vec<u8> = (0..16u8).collect();
    let vars = vec![ProtectedVariable::new(7, &mut buf)];
    let mut blocks = BlockList::new();
    blocks.update_layout(&vars).unwrap();

    let mut grown: Vec<u8> = (0..24u8).collect();
    let vars = vec![ProtectedVariable::new(7, &mut grown)];
    blocks.update_layout(&vars).unwrap();

    assert_eq!(blocks.blocks.len(), 2);
    assert_eq!(blocks.blocks[1].chunks.len(), 1);
    let chunk = blocks.blocks[1].chunks[0];
    assert_eq!(chunk.dest_offset, 16);
    assert_eq!(chunk.chunk_size, 8);
}

/// S3: after a fresh checkpoint, a new variable `id=11, size=4` is
/// registered. The second checkpoint appends a block with exactly one
/// NEW chunk for it and nothing else.
#[test]
fn s3_new_variable_appends_a_block_with_only_its_own_chunk() {
    let mut buf: Vec<u8> = (0..16u8).collect();
    let vars = vec![ProtectedVariable::new(7, &mut buf)];
    let mut blocks = BlockList::new();
    blocks.update_layout(&vars).unwrap();

    let mut buf7 = buf.clone();
    let mut buf11 = vec![0xAAu8; 4];
    let vars = vec![
        ProtectedVariable::new(7, &mut buf7),
        ProtectedVariable::new(11, &mut buf11),
    ];
    blocks.update_layout(&vars).unwrap();

    assert_eq!(blocks.blocks.len(), 2);
    assert_eq!(blocks.blocks[1].chunks.len(), 1);
    let chunk = blocks.blocks[1].chunks[0];
    assert_eq!(chunk.id, 11);
    assert_eq!(chunk.dest_offset, 0);
    assert_eq!(chunk.chunk_size, 4);
}

/// Writes a real FTI-FF checkpoint file for `rank` at `level`'s ckpt_dir
/// and returns the `RankFields` row it implies. Driving a true multi-rank
/// checkpoint needs a real barrier between ranks, which the in-memory
/// collective stand-in used here does not provide (each call requires
/// every rank's contribution already present, with no wait); staging
/// fixtures directly keeps these scenarios deterministic.
fn stage_ckpt_file(
    directories: &Directories,
    level: CheckpointLevel,
    rank: u32,
    checkpoint_id: u32,
    content: &[u8],
) -> RankFields {
    let mut buf = content.to_vec();
    let vars = vec![ProtectedVariable::new(1, &mut buf)];
    let mut blocks = BlockList::new();
    blocks.update_layout(&vars).unwrap();
    let header = FileHeader {
        checkpoint_id,
        total_ckpt_size: blocks.total_size(),
        timestamp_ns: 0,
        digest: [0u8; 16],
    };
    let name = format!("Ckpt{checkpoint_id}-Rank{rank}.fti");
    let path = directories.level(level).ckpt_dir.join(&name);
    write(&path, &header, &blocks, &vars).unwrap();
    RankFields {
        ckpt_file_name: name,
        ckpt_file_size: header.total_ckpt_size,
        ckpt_file_maxs: header.total_ckpt_size,
        ckpt_checksum: checksum_file(&path),
        rsed_checksum: None,
        vars: vec![(1, content.len() as u64)],
    }
}

fn write_descriptor(directories: &Directories, level: CheckpointLevel, rows: BTreeMap<u32, RankFields>) {
    let path = GroupDescriptor::path(&directories.level(level).meta_dir, 0, 0);
    GroupDescriptor { rows }.write_descriptor(&path).unwrap();
}

/// S4: a 4-rank group where rank 2's own L1 file and own-held L2 copy
/// are both gone. Recovery falls back to the copy its ring neighbor
/// (rank 3) mirrors on rank 2's behalf and restores the pre-loss bytes
/// exactly.
#[test]
fn s4_recovers_rank_from_its_ring_mirrored_l2_copy() {
    let dir = tempfile::tempdir().unwrap();
    let directories = directories(dir.path());
    let original: Vec<u8> = (0..32u8).collect();

    // Rank 2's file is mirrored under rank 3's held-by area, matching
    // where `checkpoint` would have placed it.
    let mirror_dir = directories.level(CheckpointLevel::L2Partner).ckpt_dir.join("held-by-3");
    std::fs::create_dir_all(&mirror_dir).unwrap();
    let mirror_path = mirror_dir.join("Ckpt1-Rank2.fti");

    let mut buf = original.clone();
    let vars = vec![ProtectedVariable::new(1, &mut buf)];
    let mut blocks = BlockList::new();
    blocks.update_layout(&vars).unwrap();
    let header = FileHeader {
        checkpoint_id: 1,
        total_ckpt_size: blocks.total_size(),
        timestamp_ns: 0,
        digest: [0u8; 16],
    };
    write(&mirror_path, &header, &blocks, &vars).unwrap();
    let mirrored_fields = RankFields {
        ckpt_file_name: "Ckpt1-Rank2.fti".to_string(),
        ckpt_file_size: header.total_ckpt_size,
        ckpt_file_maxs: header.total_ckpt_size,
        ckpt_checksum: checksum_file(&mirror_path),
        rsed_checksum: None,
        vars: vec![(1, original.len() as u64)],
    };

    let mut rows = BTreeMap::new();
    rows.insert(2, mirrored_fields);
    write_descriptor(&directories, CheckpointLevel::L2Partner, rows);

    let group = FakeCollective::new_group(4);
    // Only rank 2 is driven through `recover_all`; its groupmates never
    // run, so their L3 erased-vote is seeded ahead of the unconditional
    // barrier `highest_ready_level` performs.
    for other in [0u32, 1, 3] {
        group[other as usize].set_contribution(&[0]);
    }
    let mut session2 = Session::new(directories, topology(2, 4), group[2].clone(), FakeRsCodec);
    session2.checkpoint_id = 1;

    let mut restored = vec![0u8; 32];
    let mut restore_vars = vec![ProtectedVariable::new(1, &mut restored)];
    let level = recover_all(&session2, &mut restore_vars).unwrap();
    assert_eq!(level, CheckpointLevel::L2Partner);
    assert_eq!(restored, original);
}

/// S5: a rank's own L3 file is missing, but the Reed-Solomon encoded
/// files of every other rank survived. Recovery decodes the missing
/// file from the group and restores it exactly.
#[test]
fn s5_recovers_via_reed_solomon_when_own_l3_file_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let directories = directories(dir.path());
    let original: Vec<u8> = (0..28u8).collect();

    // Ranks 1-3 have healthy Reed-Solomon files; rank 0's is absent.
    let mut rows = BTreeMap::new();
    for rank in 1u32..4 {
        let fields = stage_ckpt_file(&directories, CheckpointLevel::L3ReedSolomon, rank, 1, &original);
        rows.insert(rank, fields);
    }
    write_descriptor(&directories, CheckpointLevel::L3ReedSolomon, rows);

    let group = FakeCollective::new_group(4);
    for other in [1u32, 2, 3] {
        group[other as usize].set_contribution(&[0]);
    }
    let mut session0 = Session::new(directories, topology(0, 4), group[0].clone(), FakeRsCodec);
    session0.checkpoint_id = 1;

    let mut restored = vec![0u8; 28];
    let mut restore_vars = vec![ProtectedVariable::new(1, &mut restored)];
    let level = recover_all(&session0, &mut restore_vars).unwrap();
    assert_eq!(level, CheckpointLevel::L3ReedSolomon);
    assert_eq!(restored, original);
}

/// S6: one payload byte in rank 0's file is flipped after it was
/// written. The checksum mismatch is detected at the level it was
/// staged to, and recovery falls back to the next-healthiest level.
#[test]
fn s6_corruption_is_detected_and_recovery_falls_back_to_l2() {
    let dir = tempfile::tempdir().unwrap();
    let directories = directories(dir.path());
    let original: Vec<u8> = (0..20u8).collect();

    let fields_l1 = stage_ckpt_file(&directories, CheckpointLevel::L1Local, 0, 1, &original);
    let mut rows = BTreeMap::new();
    rows.insert(0, fields_l1);
    write_descriptor(&directories, CheckpointLevel::L1Local, rows);

    // Flip one payload byte in place; the descriptor still records the
    // pre-corruption checksum, so L1 readiness now fails.
    let l1_path = directories.level(CheckpointLevel::L1Local).ckpt_dir.join("Ckpt1-Rank0.fti");
    let mut bytes = std::fs::read(&l1_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&l1_path, bytes).unwrap();

    // An intact own-held L2 copy is the next-best level.
    let fields_l2 = stage_ckpt_file(&directories, CheckpointLevel::L2Partner, 0, 1, &original);
    let own_held_dir = directories.level(CheckpointLevel::L2Partner).ckpt_dir.join("held-by-0");
    std::fs::create_dir_all(&own_held_dir).unwrap();
    std::fs::rename(
        directories.level(CheckpointLevel::L2Partner).ckpt_dir.join("Ckpt1-Rank0.fti"),
        own_held_dir.join("Ckpt1-Rank0.fti"),
    )
    .unwrap();
    let mut rows = BTreeMap::new();
    rows.insert(0, fields_l2);
    write_descriptor(&directories, CheckpointLevel::L2Partner, rows);

    let group = FakeCollective::new_group(2);
    group[1].set_contribution(&[0]);
    let mut session0 = Session::new(directories, topology(0, 2), group[0].clone(), FakeRsCodec);
    session0.checkpoint_id = 1;

    let mut restored = vec![0u8; 20];
    let mut restore_vars = vec![ProtectedVariable::new(1, &mut restored)];
    let level = recover_all(&session0, &mut restore_vars).unwrap();
    assert_eq!(level, CheckpointLevel::L2Partner);
    assert_eq!(restored, original);
}
