use super::*;

#[test]
fn all_gather_returns_every_ranks_contribution_in_order() {
    let ranks = FakeCollective::new_group(3);
    ranks[1].set_contribution(b"b");
    ranks[2].set_contribution(b"c");
    let gathered = ranks[0].all_gather_fixed(b"a").unwrap();
    assert_eq!(gathered, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
}

#[test]
fn gather_to_zero_is_empty_on_non_head_ranks() {
    let ranks = FakeCollective::new_group(2);
    ranks[1].set_contribution(b"x");
    let at_zero = ranks[0].gather_to_zero(b"zero").unwrap();
    assert_eq!(at_zero, vec![b"zero".to_vec(), b"x".to_vec()]);

    let ranks = FakeCollective::new_group(2);
    ranks[0].set_contribution(b"zero");
    let at_one = ranks[1].gather_to_zero(b"x").unwrap();
    assert!(at_one.is_empty());
}

#[test]
fn send_recv_roundtrips_between_ranks() {
    let ranks = FakeCollective::new_group(2);
    ranks[0].send(1, b"hello").unwrap();
    let received = ranks[1].recv(0).unwrap();
    assert_eq!(received, b"hello");
}

#[test]
fn all_reduce_or_gathers_every_ranks_bit() {
    let ranks = FakeCollective::new_group(3);
    ranks[1].set_contribution(&[1]);
    ranks[2].set_contribution(&[0]);
    let bits = ranks[0].all_reduce_or(false).unwrap();
    assert_eq!(bits, vec![false, true, false]);
}
