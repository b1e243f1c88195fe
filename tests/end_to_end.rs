//! End-to-end scenarios over a real temporary backing file, driving the
//! façade exactly as the interactive command surface would.

use std::fs;
use std::io::Write;

use v6fs::{Error, Volume};

fn temp_volume_path() -> std::path::PathBuf {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("volume.img");
    std::mem::forget(dir); // keep the directory alive for the test's lifetime
    path
}

#[test]
fn initfs_lays_out_superblock_and_root_directory() {
    let path = temp_volume_path();
    let mut volume = Volume::open(&path).unwrap();
    volume.initfs(2000, 200).unwrap();

    let metadata = fs::metadata(&path).unwrap();
    assert_eq!(metadata.len(), 2000 * 512);

    let root = volume.load_inode(1).unwrap();
    assert!(root.is_directory());
    assert_eq!(volume.dir_lookup(&root, ".").unwrap(), 1);
    assert_eq!(volume.dir_lookup(&root, "..").unwrap(), 0);
}

#[test]
fn cpin_then_cpout_round_trips_small_file() {
    let path = temp_volume_path();
    let mut volume = Volume::open(&path).unwrap();
    volume.initfs(500, 32).unwrap();

    let host_dir = tempfile::tempdir().unwrap();
    let host_in = host_dir.path().join("hello.txt");
    fs::write(&host_in, b"hello world").unwrap();

    volume.cpin(&host_in, "/h").unwrap();

    let host_out = host_dir.path().join("out.txt");
    volume.cpout("/h", &host_out).unwrap();

    assert_eq!(fs::read(&host_out).unwrap(), b"hello world");
}

#[test]
fn rm_removes_file_and_subsequent_cpout_fails() {
    let path = temp_volume_path();
    let mut volume = Volume::open(&path).unwrap();
    volume.initfs(500, 32).unwrap();

    let host_dir = tempfile::tempdir().unwrap();
    let host_in = host_dir.path().join("hello.txt");
    fs::write(&host_in, b"hello world").unwrap();
    volume.cpin(&host_in, "/h").unwrap();

    volume.rm("/h").unwrap();

    let host_out = host_dir.path().join("out2.txt");
    let err = volume.cpout("/h", &host_out).unwrap_err();
    assert!(matches!(err, Error::NoSuchFile));
}

#[test]
fn cpin_of_multi_block_file_upgrades_to_large_and_round_trips() {
    let path = temp_volume_path();
    let mut volume = Volume::open(&path).unwrap();
    volume.initfs(4000, 64).unwrap();

    let mut payload = vec![0u8; 4097];
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte = (i % 256) as u8;
    }
    let host_dir = tempfile::tempdir().unwrap();
    let host_in = host_dir.path().join("big.bin");
    let mut f = fs::File::create(&host_in).unwrap();
    f.write_all(&payload).unwrap();
    drop(f);

    volume.cpin(&host_in, "/b").unwrap();

    let inode_num = volume.resolve_path("/b").unwrap();
    let inode = volume.load_inode(inode_num).unwrap();
    assert!(inode.is_large());

    let host_out = host_dir.path().join("big_out.bin");
    volume.cpout("/b", &host_out).unwrap();
    assert_eq!(fs::read(&host_out).unwrap(), payload);
}

#[test]
fn mkdir_twice_fails_with_file_exists() {
    let path = temp_volume_path();
    let mut volume = Volume::open(&path).unwrap();
    volume.initfs(1000, 32).unwrap();

    volume.mkdir("/a").unwrap();
    let err = volume.mkdir("/a").unwrap_err();
    assert!(matches!(err, Error::FileExists));
}

#[test]
fn exhausting_allocation_fails_cleanly_without_leaking_blocks() {
    let path = temp_volume_path();
    let mut volume = Volume::open(&path).unwrap();
    volume.initfs(60, 32).unwrap();

    let host_dir = tempfile::tempdir().unwrap();
    let mut attempted = Vec::new();
    let mut last_err = None;
    for i in 0..64 {
        let host_in = host_dir.path().join(format!("chunk{i}.bin"));
        fs::write(&host_in, vec![7u8; 2048]).unwrap();
        let v6_path = format!("/f{i}");
        attempted.push(v6_path.clone());
        if let Err(e) = volume.cpin(&host_in, &v6_path) {
            last_err = Some(e);
            break;
        }
    }

    assert!(matches!(last_err, Some(Error::AllocateFailure)));

    // Partition invariant: every data block is either reachable from a live
    // i-node or sitting in the free list, the two sets are disjoint, and
    // together they cover the whole data region -- nothing vanished when
    // the last cpin failed partway through. This also covers the failing
    // cpin's own name: a well-behaved cpin leaves it nameable (and its
    // successfully copied prefix reachable) even though the call errored.
    let mut reachable = std::collections::HashSet::new();
    for v6_path in &attempted {
        let inode_num = volume.resolve_path(v6_path).unwrap();
        if inode_num == 0 {
            continue;
        }
        let inode = volume.load_inode(inode_num).unwrap();
        for block in volume.block_iter(&inode).unwrap() {
            assert!(
                reachable.insert(block),
                "block {block} reachable from more than one live i-node"
            );
        }
    }

    let mut free_set = std::collections::HashSet::new();
    loop {
        match volume.alloc_block() {
            Ok(b) => assert!(free_set.insert(b), "block {b} appears twice in the free list"),
            Err(_) => break,
        }
    }

    for block in &reachable {
        assert!(
            !free_set.contains(block),
            "block {block} is both reachable and free -- a double free"
        );
    }

    let first_data_block = 2 + ((32 + 15) / 16);
    let fsize = 60u32;
    let total = (reachable.len() + free_set.len()) as u32;
    assert_eq!(
        total,
        fsize - first_data_block,
        "blocks lost: reachable ({}) + free ({}) != data region size ({})",
        reachable.len(),
        free_set.len(),
        fsize - first_data_block
    );
}

#[test]
fn nested_directories_resolve_through_path_segments() {
    let path = temp_volume_path();
    let mut volume = Volume::open(&path).unwrap();
    volume.initfs(1000, 64).unwrap();

    volume.mkdir("/a").unwrap();
    volume.mkdir("/a/b").unwrap();

    let host_dir = tempfile::tempdir().unwrap();
    let host_in = host_dir.path().join("leaf.txt");
    fs::write(&host_in, b"leaf").unwrap();
    volume.cpin(&host_in, "/a/b/leaf.txt").unwrap();

    let host_out = host_dir.path().join("leaf_out.txt");
    volume.cpout("/a/b/leaf.txt", &host_out).unwrap();
    assert_eq!(fs::read(&host_out).unwrap(), b"leaf");
}
