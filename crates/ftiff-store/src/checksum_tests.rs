use super::*;

#[test]
fn checksum_variables_is_order_independent() {
    let mut buf_a = [0u8, 1, 2, 3];
    let mut buf_b = [4u8, 5, 6];
    let forward = vec![
        ProtectedVariable::new(1, &mut buf_a),
        ProtectedVariable::new(2, &mut buf_b),
    ];

    let mut buf_b2 = [4u8, 5, 6];
    let mut buf_a2 = [0u8, 1, 2, 3];
    let reversed = vec![
        ProtectedVariable::new(2, &mut buf_b2),
        ProtectedVariable::new(1, &mut buf_a2),
    ];

    assert_eq!(checksum_variables(&forward), checksum_variables(&reversed));
    assert_eq!(checksum_variables(&forward).len(), 32);
}

#[test]
fn checksum_file_matches_known_md5() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.bin");
    std::fs::write(&path, b"hello world").unwrap();
    // md5("hello world") = 5eb63bbbe01eeed093cb22bb8f5acdc3
    assert_eq!(checksum_file(&path), "5eb63bbbe01eeed093cb22bb8f5acdc3");
}

#[test]
fn checksum_file_is_unreadable_on_missing_file() {
    let path = std::path::Path::new("/nonexistent/path/to/nowhere.bin");
    assert_eq!(checksum_file(path), "unreadable");
}
