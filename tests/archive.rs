use std::io::Cursor;

use chunkvault::index::Index;
use chunkvault::{Archive, Error};

const CHUNK_SIZE: u64 = 4 * 1024 * 1024;

fn archive(dir: &std::path::Path, name: &str) -> Archive {
    Archive::new(dir, name, CHUNK_SIZE).unwrap()
}

fn zeros(len: usize) -> Cursor<Vec<u8>> {
    Cursor::new(vec![0u8; len])
}

fn restore_to_vec(archive: &Archive, level: Option<i64>, size: usize) -> Vec<u8> {
    let mut target = Cursor::new(vec![0u8; size]);
    archive.restore(&mut target, level).unwrap();
    target.into_inner()
}

#[test]
fn fresh_archive_backup_and_restore() {
    let dir = tempfile::tempdir().unwrap();
    let archive = archive(dir.path(), "disk");

    let mut source = zeros(10 * 1024 * 1024);
    archive.backup(&mut source, None).unwrap();

    let index = Index::read(&archive.base_index_path(), CHUNK_SIZE).unwrap();
    assert_eq!(index.size(), 10 * 1024 * 1024);
    assert_eq!(index.chunk_ids().collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(index.get_meta(2).unwrap().length, 2 * 1024 * 1024);

    assert!(archive.existing_levels().unwrap().is_empty());

    let restored = restore_to_vec(&archive, None, 10 * 1024 * 1024);
    assert_eq!(restored, source.into_inner());
}

#[test]
fn incremental_no_op_produces_empty_overlay() {
    let dir = tempfile::tempdir().unwrap();
    let archive = archive(dir.path(), "disk");

    let image = vec![0u8; 10 * 1024 * 1024];
    archive.backup(&mut Cursor::new(image.clone()), None).unwrap();
    archive.backup(&mut Cursor::new(image.clone()), None).unwrap();

    assert_eq!(archive.existing_levels().unwrap(), vec![0]);
    let overlay_index = Index::read(&archive.overlay_index_path(0), CHUNK_SIZE).unwrap();
    assert_eq!(overlay_index.size(), 10 * 1024 * 1024);
    assert_eq!(overlay_index.chunk_ids().count(), 0);

    let restored = restore_to_vec(&archive, Some(0), 10 * 1024 * 1024);
    assert_eq!(restored, image);
}

#[test]
fn single_chunk_change_produces_a_one_entry_overlay() {
    let dir = tempfile::tempdir().unwrap();
    let archive = archive(dir.path(), "disk");

    let original = vec![0u8; 10 * 1024 * 1024];
    archive.backup(&mut Cursor::new(original.clone()), None).unwrap();

    let mut modified = original.clone();
    let patch_at = CHUNK_SIZE as usize;
    modified[patch_at..patch_at + 4].copy_from_slice(&[0x01, 0x02, 0x03, 0x04]);
    archive.backup(&mut Cursor::new(modified.clone()), None).unwrap();

    let overlay_index = Index::read(&archive.overlay_index_path(0), CHUNK_SIZE).unwrap();
    assert_eq!(overlay_index.chunk_ids().collect::<Vec<_>>(), vec![1]);

    let restored_old = restore_to_vec(&archive, Some(0), 10 * 1024 * 1024);
    assert_eq!(restored_old, original);

    let restored_latest = restore_to_vec(&archive, None, 10 * 1024 * 1024);
    assert_eq!(restored_latest, modified);
}

#[test]
fn hint_guided_backup_matches_full_backup() {
    let dir = tempfile::tempdir().unwrap();
    let archive = archive(dir.path(), "disk");

    let original = vec![0u8; 10 * 1024 * 1024];
    archive.backup(&mut Cursor::new(original.clone()), None).unwrap();

    let mut modified = original.clone();
    let patch_at = CHUNK_SIZE as usize;
    modified[patch_at..patch_at + 4].copy_from_slice(&[0x01, 0x02, 0x03, 0x04]);

    let hints = vec![(CHUNK_SIZE, 4)];
    archive
        .backup(&mut Cursor::new(modified.clone()), Some(hints.as_slice()))
        .unwrap();

    let overlay_index = Index::read(&archive.overlay_index_path(0), CHUNK_SIZE).unwrap();
    assert_eq!(overlay_index.chunk_ids().collect::<Vec<_>>(), vec![1]);

    let restored_latest = restore_to_vec(&archive, None, 10 * 1024 * 1024);
    assert_eq!(restored_latest, modified);
}

#[test]
fn grow_preserves_overlay_size() {
    let dir = tempfile::tempdir().unwrap();
    let archive = archive(dir.path(), "disk");

    let small = vec![0xABu8; 4 * 1024 * 1024];
    archive.backup(&mut Cursor::new(small.clone()), None).unwrap();

    let large = vec![0xCDu8; 12 * 1024 * 1024];
    archive.backup(&mut Cursor::new(large.clone()), None).unwrap();

    let base_index = Index::read(&archive.base_index_path(), CHUNK_SIZE).unwrap();
    assert_eq!(base_index.size(), 12 * 1024 * 1024);
    assert_eq!(base_index.chunk_ids().collect::<Vec<_>>(), vec![0, 1, 2]);

    let overlay_index = Index::read(&archive.overlay_index_path(0), CHUNK_SIZE).unwrap();
    assert_eq!(overlay_index.size(), 4 * 1024 * 1024);
    assert_eq!(overlay_index.chunk_ids().collect::<Vec<_>>(), vec![0]);

    let restored = restore_to_vec(&archive, Some(0), 4 * 1024 * 1024);
    assert_eq!(restored, small);
}

#[test]
fn scrub_detects_and_invalidates_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let archive = archive(dir.path(), "disk");

    archive
        .backup(&mut zeros(10 * 1024 * 1024), None)
        .unwrap();

    let checked = archive.scrub(None).unwrap();
    assert_eq!(checked, 3);

    let data = std::fs::read(archive.base_data_path()).unwrap();
    let mut corrupted = data.clone();
    corrupted[100] = 0xFF;
    std::fs::write(archive.base_data_path(), &corrupted).unwrap();

    archive.scrub(None).unwrap();

    let index = Index::read(&archive.base_index_path(), CHUNK_SIZE).unwrap();
    assert_eq!(index.get_meta(0).unwrap().checksum, "");

    let err = archive.restore(&mut Cursor::new(vec![0u8; 10 * 1024 * 1024]), None);
    match err {
        Err(Error::ChunkChecksumWrong(_)) => panic!("restore is non-strict, should not fail"),
        _ => {}
    }
}

#[test]
fn backup_name_with_reserved_substring_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let err = Archive::new(dir.path(), "foo.data.bar", CHUNK_SIZE).unwrap_err();
    assert!(matches!(err, Error::ReservedNameInBackupName(_)));
}

#[test]
fn restore_of_unknown_level_fails() {
    let dir = tempfile::tempdir().unwrap();
    let archive = archive(dir.path(), "disk");
    archive.backup(&mut zeros(CHUNK_SIZE as usize), None).unwrap();

    let mut target = Cursor::new(vec![0u8; CHUNK_SIZE as usize]);
    let err = archive.restore(&mut target, Some(7)).unwrap_err();
    assert!(matches!(err, Error::LevelNotFound(7)));
}
