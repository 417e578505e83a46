use super::*;

fn sample() -> GroupDescriptor {
    let mut rows = BTreeMap::new();
    rows.insert(
        0,
        RankFields {
            ckpt_file_name: "Ckpt3-Rank0.fti".into(),
            ckpt_file_size: 128,
            ckpt_file_maxs: 256,
            ckpt_checksum: "a".repeat(32),
            rsed_checksum: None,
            vars: vec![(7, 16), (11, 4)],
        },
    );
    rows.insert(
        1,
        RankFields {
            ckpt_file_name: "Ckpt3-Rank1.fti".into(),
            ckpt_file_size: 256,
            ckpt_file_maxs: 256,
            ckpt_checksum: "b".repeat(32),
            rsed_checksum: Some("c".repeat(32)),
            vars: vec![(7, 24)],
        },
    );
    GroupDescriptor { rows }
}

#[test]
fn round_trips_through_write_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = GroupDescriptor::path(dir.path(), 0, 2);
    let original = sample();
    original.write_descriptor(&path).unwrap();

    let loaded = GroupDescriptor::load_descriptor(&path).unwrap();
    assert_eq!(loaded, original);
}

#[test]
fn path_matches_sectors_and_group_naming_convention() {
    let path = GroupDescriptor::path(Path::new("/meta"), 3, 7);
    assert_eq!(path, Path::new("/meta/sector3-group7.fti"));
}

#[test]
fn get_checksums_reads_partner_from_partners_own_row() {
    let descriptor = sample();
    // group_size 2: rank 0's partner is (0 + 2 - 1) % 2 = 1
    let (own, partner, rsed) = descriptor.get_checksums(0, 2).unwrap();
    assert_eq!(own, "a".repeat(32));
    assert_eq!(partner, "b".repeat(32));
    assert_eq!(rsed, None);
}

#[test]
fn patch_rsed_checksums_rewrites_every_rank() {
    let dir = tempfile::tempdir().unwrap();
    let path = GroupDescriptor::path(dir.path(), 0, 0);
    let mut descriptor = sample();
    descriptor.write_descriptor(&path).unwrap();

    descriptor
        .patch_rsed_checksums(&path, &["x".repeat(32), "y".repeat(32)])
        .unwrap();

    let loaded = GroupDescriptor::load_descriptor(&path).unwrap();
    assert_eq!(loaded.rows[&0].rsed_checksum, Some("x".repeat(32)));
    assert_eq!(loaded.rows[&1].rsed_checksum, Some("y".repeat(32)));
}

#[test]
fn checkpoint_id_is_parsed_from_leading_ckpt_prefix() {
    assert_eq!(
        GroupDescriptor::checkpoint_id_from_file_name("Ckpt42-Rank3.fti"),
        Some(42)
    );
    assert_eq!(GroupDescriptor::checkpoint_id_from_file_name("bogus"), None);
}

#[test]
fn malformed_line_outside_a_section_is_rejected() {
    let err = GroupDescriptor::parse("ckpt_file_size = 12\n").unwrap_err();
    assert!(matches!(err, DescriptorError::Malformed(_)));
}
