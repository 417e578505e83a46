use super::*;
use fti_ff_core::FakeCollective;

fn fields(name: &str) -> RankFields {
    RankFields {
        ckpt_file_name: name.to_string(),
        ckpt_file_size: 100,
        ckpt_file_maxs: 100,
        ckpt_checksum: "abc123".to_string(),
        rsed_checksum: None,
        vars: vec![(1, 40), (2, 60)],
    }
}

#[test]
fn is_group_writer_is_only_true_for_rank_zero() {
    let group = FakeCollective::new_group(2);
    assert!(is_group_writer(&group[0]));
    assert!(!is_group_writer(&group[1]));
}

#[test]
fn gather_group_descriptor_round_trips_every_row_at_the_writer() {
    let group = FakeCollective::new_group(2);
    group[1].set_contribution(&encode_fields(&fields("Ckpt1-Rank1.fti")));

    let descriptor = gather_group_descriptor(&group[0], &fields("Ckpt1-Rank0.fti"))
        .unwrap()
        .expect("rank 0 is the group writer");

    assert_eq!(descriptor.rows.len(), 2);
    assert_eq!(descriptor.rows[&0].ckpt_file_name, "Ckpt1-Rank0.fti");
    assert_eq!(descriptor.rows[&1].ckpt_file_name, "Ckpt1-Rank1.fti");
    assert_eq!(descriptor.rows[&1].vars, vec![(1, 40), (2, 60)]);
}

#[test]
fn gather_group_descriptor_is_none_on_non_writer_ranks() {
    let group = FakeCollective::new_group(2);
    group[0].set_contribution(b"placeholder");
    let result = gather_group_descriptor(&group[1], &fields("Ckpt1-Rank1.fti")).unwrap();
    assert!(result.is_none());
}

#[test]
fn encode_decode_round_trips_a_row_with_an_rsed_checksum() {
    let mut original = fields("Ckpt1-Rank0.fti");
    original.rsed_checksum = Some("rs-digest".to_string());
    let encoded = encode_fields(&original);
    let decoded = decode_fields(&encoded).unwrap();
    assert_eq!(decoded, original);
}
