use branchgate::binlog::BinlogOp;
use branchgate::editor::AccessTableEditor;
use branchgate::{AccessConfig, AccessControl, AccessRow, BranchgateError, Permissions};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

fn populated() -> (Arc<AccessControl>, AccessTableEditor) {
    let control = Arc::new(AccessControl::new(AccessConfig::new("root", "%")));
    let mut editor = AccessTableEditor::new(Arc::clone(&control));
    editor
        .insert(
            None,
            &AccessRow::new("main", "alice", "%", Permissions::WRITE),
        )
        .unwrap();
    editor
        .insert(
            None,
            &AccessRow::new("feat/%", "carol", "10.0.%", Permissions::ADMIN),
        )
        .unwrap();
    editor
        .delete(
            None,
            &AccessRow::new("main", "alice", "%", Permissions::WRITE),
        )
        .unwrap();
    (control, editor)
}

#[test]
fn round_trip_restores_rows_and_journal() {
    let (control, _) = populated();
    let bytes = control.serialize().unwrap();

    let restored = AccessControl::new(AccessConfig::new("root", "%"));
    restored.deserialize(&bytes).unwrap();

    assert_eq!(restored.index_of("feat/%", "carol", "10.0.%").unwrap(), Some(0));
    assert_eq!(restored.index_of("main", "alice", "%").unwrap(), None);

    let rows = branchgate::schema::rows(&restored).unwrap();
    assert_eq!(rows.len(), 2);

    let journal = restored.journal().unwrap();
    let ops: Vec<BinlogOp> = journal.iter().map(|entry| entry.op).collect();
    assert_eq!(ops, [BinlogOp::Insert, BinlogOp::Insert, BinlogOp::Delete]);
    assert_eq!(journal[2].value.branch, "main");

    // A second trip produces identical bytes.
    assert_eq!(bytes, restored.serialize().unwrap());
}

#[test]
fn serialization_does_not_clear_the_journal_but_checkpoint_does() {
    let (control, mut editor) = populated();

    let first = control.serialize().unwrap();
    let second = control.serialize().unwrap();
    assert_eq!(first, second);

    control.checkpoint().unwrap();
    let after_checkpoint = control.serialize().unwrap();
    assert!(after_checkpoint.len() < first.len());

    // New edits journal again after the checkpoint.
    editor
        .insert(None, &AccessRow::new("dev", "erin", "%", Permissions::WRITE))
        .unwrap();
    let with_new_edit = control.serialize().unwrap();
    assert!(with_new_edit.len() > after_checkpoint.len());
}

#[test]
fn deserialize_into_a_non_empty_store_is_rejected() {
    let (control, _) = populated();
    let bytes = control.serialize().unwrap();

    let err = control.deserialize(&bytes).unwrap_err();
    assert!(matches!(err, BranchgateError::Decode(_)));
}

#[test]
fn truncated_blobs_are_rejected_and_leave_the_store_empty() {
    let (control, _) = populated();
    let bytes = control.serialize().unwrap();

    for cut in [1, 5, bytes.len() / 2, bytes.len() - 1] {
        let target = AccessControl::new(AccessConfig::new("root", "%"));
        let err = target.deserialize(&bytes[..cut]).unwrap_err();
        assert!(matches!(err, BranchgateError::Decode(_)), "cut {cut}");
        // The failed decode must not have left partial rows behind.
        assert_eq!(branchgate::schema::rows(&target).unwrap().len(), 1);
        target.deserialize(&bytes).expect("store still usable");
    }
}

#[test]
fn blob_round_trips_through_a_file() {
    let (control, _) = populated();
    let bytes = control.serialize().unwrap();

    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("branch_access.bin");
    fs::write(&path, &bytes).expect("write blob");
    let read_back = fs::read(&path).expect("read blob");

    let restored = AccessControl::new(AccessConfig::new("root", "%"));
    restored.deserialize(&read_back).unwrap();
    assert_eq!(
        restored.matches("feat/x", "carol", "10.0.0.9").unwrap(),
        (true, Permissions::ADMIN)
    );
}

#[test]
fn read_locked_serialization_snapshots_the_same_bytes() {
    let write_locked = AccessControl::new(AccessConfig::new("root", "%"));
    let snapshotting = AccessControl::new(AccessConfig {
        read_locked_serialize: true,
        ..AccessConfig::new("root", "%")
    });
    for control in [&write_locked, &snapshotting] {
        control
            .insert("main", "alice", "%", Permissions::WRITE)
            .unwrap();
    }
    assert_eq!(
        write_locked.serialize().unwrap(),
        snapshotting.serialize().unwrap()
    );
}
