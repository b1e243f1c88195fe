//! The operations façade: `initfs`, `cpin`, `cpout`, `mkdir`, `rm`,
//! built entirely atop the block device, codec, free-block manager, i-node
//! table, block-map, directory layer, and path resolver. `quit` lives on
//! [`Volume`] itself since it needs no directory or path support.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use arrayvec::ArrayVec;
use log::info;

use crate::device::BLOCK_SIZE;
use crate::error::{Error, Result};
use crate::inode::{Inode, InodeFlags, DEFAULT_DIR_PERM, DEFAULT_FILE_PERM, INODES_PER_BLOCK};
use crate::path::ROOT_INODE;
use crate::superblock::Superblock;
use crate::volume::Volume;

impl Volume {
    /// Extends the backing file to `num_blocks` blocks, lays out the
    /// superblock and i-node table for `num_inodes` i-nodes, chains every
    /// data block onto the free list, and creates the root directory
    /// (i-node 1) with `.` pointing at itself and `..` pointing at the
    /// sentinel 0 (see the root `..` policy documented in DESIGN.md).
    pub fn initfs(&mut self, num_blocks: u32, num_inodes: u32) -> Result<()> {
        if num_inodes == 0 {
            return Err(Error::InvalidInodeNumber(0));
        }
        let isize = (num_inodes + INODES_PER_BLOCK as u32 - 1) / INODES_PER_BLOCK as u32;
        let first_data_block = 2 + isize;
        if num_blocks <= first_data_block {
            return Err(Error::InvalidBlockNumber(num_blocks));
        }

        info!("initfs: {} blocks, {} inodes", num_blocks, num_inodes);
        self.device.zero_extend(num_blocks)?;

        let mut free = ArrayVec::new();
        free.push(0u16); // end-of-chain sentinel
        self.install_superblock(Superblock {
            isize: isize as u16,
            fsize: num_blocks as u16,
            free,
            inode: ArrayVec::new(),
            flock: 0,
            ilock: 0,
            fmod: 0,
            time: [0, 0],
        });

        for block in first_data_block..num_blocks {
            self.free_block(block)?;
        }

        let mut root = Inode::new_empty();
        root.flags = InodeFlags::ALLOCATED
            | InodeFlags::dir_type()
            | InodeFlags::from_bits_truncate(DEFAULT_DIR_PERM);
        root.nlinks = 1;
        self.save_inode(ROOT_INODE, &root)?;

        self.dir_insert(&mut root, ".", ROOT_INODE)?;
        self.dir_insert(&mut root, "..", 0)?;
        self.save_inode(ROOT_INODE, &root)?;

        self.repopulate_inode_cache()?;
        self.flush_superblock()?;
        Ok(())
    }

    /// Copies a host file into the volume at `v6_path`, one 512-byte chunk
    /// (the last possibly short) per allocated block. `v6_path`'s parent
    /// must resolve. If `v6_path` already names an entry, that i-node is
    /// located and reused (new blocks are appended after its existing
    /// content) rather than treated as a collision; `mkdir` is the
    /// operation that rejects name collisions, not `cpin`.
    pub fn cpin(&mut self, host_path: impl AsRef<Path>, v6_path: &str) -> Result<()> {
        let mut host = File::open(host_path.as_ref()).map_err(Error::FileOpenFailure)?;

        let (parent, name) = self.resolve_parent(v6_path)?;
        let mut parent_inode = self.load_inode(parent)?;
        let existing = self.dir_lookup(&parent_inode, name)?;

        let (target_num, mut target) = if existing != 0 {
            (existing, self.load_inode(existing)?)
        } else {
            let target_num = self.claim_inode()?;
            let mut target = Inode::new_empty();
            target.flags = InodeFlags::ALLOCATED | InodeFlags::from_bits_truncate(DEFAULT_FILE_PERM);
            target.nlinks = 1;
            self.save_inode(target_num, &target)?;
            // Name the entry before copying any data so a mid-copy failure
            // still leaves a recoverable (rm-able) truncated prefix, per the
            // documented failure-atomicity policy.
            self.dir_insert(&mut parent_inode, name, target_num)?;
            self.save_inode(parent, &parent_inode)?;
            (target_num, target)
        };

        let mut buf = [0u8; BLOCK_SIZE];
        loop {
            let mut total = 0;
            while total < BLOCK_SIZE {
                let n = host.read(&mut buf[total..]).map_err(Error::FileOpenFailure)?;
                if n == 0 {
                    break;
                }
                total += n;
            }
            if total == 0 {
                break;
            }
            if total < BLOCK_SIZE {
                buf[total..].fill(0);
            }
            let block = self.alloc_block()?;
            self.device.write_block(block, &buf)?;
            self.append_block(&mut target, block, total as u32)?;
            // Persist after every chunk: if a later alloc in this loop
            // fails, the blocks already written stay reachable from the
            // on-disk i-node instead of becoming unreferenced.
            self.save_inode(target_num, &target)?;
            if total < BLOCK_SIZE {
                break;
            }
        }

        info!("cpin: {} -> {}", host_path.as_ref().display(), v6_path);
        Ok(())
    }

    /// Copies the volume file at `v6_path` out to a host file, truncating
    /// the final block to the file's recorded byte length. Fails
    /// `NoSuchFile` if `v6_path` does not resolve.
    pub fn cpout(&mut self, v6_path: &str, host_path: impl AsRef<Path>) -> Result<()> {
        let inode_num = self.resolve_path(v6_path)?;
        if inode_num == 0 {
            return Err(Error::NoSuchFile);
        }
        let inode = self.load_inode(inode_num)?;
        let mut remaining = inode.file_size();

        let mut host = File::create(host_path.as_ref()).map_err(Error::FileOpenFailure)?;
        let blocks: Vec<u32> = self.block_iter(&inode)?.collect();
        for block in blocks {
            if remaining == 0 {
                break;
            }
            let mut buf = [0u8; BLOCK_SIZE];
            self.device.read_block(block, &mut buf)?;
            let take = remaining.min(BLOCK_SIZE as u32) as usize;
            host.write_all(&buf[..take]).map_err(Error::FileOpenFailure)?;
            remaining -= take as u32;
        }

        info!("cpout: {} -> {}", v6_path, host_path.as_ref().display());
        Ok(())
    }

    /// Creates a new, empty directory at `v6_path`. Fails `FileExists` on a
    /// name collision in the parent directory.
    pub fn mkdir(&mut self, v6_path: &str) -> Result<()> {
        let (parent, name) = self.resolve_parent(v6_path)?;
        let mut parent_inode = self.load_inode(parent)?;
        if self.dir_lookup(&parent_inode, name)? != 0 {
            return Err(Error::FileExists);
        }

        let target_num = self.claim_inode()?;
        let mut target = Inode::new_empty();
        target.flags = InodeFlags::ALLOCATED
            | InodeFlags::dir_type()
            | InodeFlags::from_bits_truncate(DEFAULT_DIR_PERM);
        target.nlinks = 1;
        self.save_inode(target_num, &target)?;

        self.dir_insert(&mut target, ".", target_num)?;
        self.dir_insert(&mut target, "..", parent)?;
        self.save_inode(target_num, &target)?;

        self.dir_insert(&mut parent_inode, name, target_num)?;
        self.save_inode(parent, &parent_inode)?;

        info!("mkdir: {}", v6_path);
        Ok(())
    }

    /// Removes the file or directory named by `v6_path`: frees every block
    /// it owns, zeroes its i-node, and removes its entry from its parent
    /// directory. Not recursive — see the `rm` policy note in DESIGN.md.
    /// Fails `NoSuchFile` if `v6_path` does not resolve.
    pub fn rm(&mut self, v6_path: &str) -> Result<()> {
        let (parent, name) = self.resolve_parent(v6_path)?;
        let mut parent_inode = self.load_inode(parent)?;
        let target_num = self.dir_lookup(&parent_inode, name)?;
        if target_num == 0 {
            return Err(Error::NoSuchFile);
        }

        self.release_inode(target_num)?;
        self.dir_remove(&mut parent_inode, name)?;
        self.save_inode(parent, &parent_inode)?;

        info!("rm: {}", v6_path);
        Ok(())
    }
}
