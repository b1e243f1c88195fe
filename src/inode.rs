//! I-nodes: the on-disk record (flags, size, block addresses) and the
//! operations that load, save, claim, and release them from the i-node
//! table. The table itself has no separate type — it is simply the
//! i-node blocks of the open [`Volume`], addressed by inode number.

use bitflags::bitflags;
use log::debug;

use crate::device::BLOCK_SIZE;
use crate::error::{Error, Result};
use crate::volume::Volume;

pub const INODE_SIZE: usize = 32;
pub const INODES_PER_BLOCK: usize = 16;
pub const NDIRECT: usize = 8;

/// Highest representable file size (32 MiB).
pub const MAX_FILE_SIZE: u64 = 1 << 25;

bitflags! {
    /// I-node flag bits, in the octal layout of the original format.
    pub struct InodeFlags: u16 {
        const ALLOCATED  = 0o100000;
        const TYPE_DIR   = 0o040000;
        const TYPE_CHAR  = 0o020000;
        const TYPE_BLOCK = 0o060000;
        const LARGE      = 0o010000;
        const SETUID     = 0o004000;
        const SETGID     = 0o002000;
        const SIZE_MSB   = 0o001000;
        const PERM_MASK  = 0o000777;
    }
}

const TYPE_MASK: u16 = 0o060000;

impl InodeFlags {
    /// The bit pattern selecting the directory file type. (`TYPE_DIR` is
    /// already exactly that pattern — this alias exists so call sites read
    /// as "the directory type", not "one raw bit".)
    pub fn dir_type() -> InodeFlags {
        InodeFlags::TYPE_DIR
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Plain,
    Directory,
    CharSpecial,
    BlockSpecial,
}

/// Default permission bits for a newly created directory (`rwxr-xr-x`),
/// used when `initfs` creates the root directory.
pub const DEFAULT_DIR_PERM: u16 = 0o755;

/// Default permission bits for a newly created plain file. The on-disk
/// format records permissions but never enforces them, and no default is
/// mandated for `cpin`-created files; `rw-r--r--` is the conventional Unix
/// default, documented as a decided policy in DESIGN.md.
pub const DEFAULT_FILE_PERM: u16 = 0o644;

/// In-memory mirror of the 32-byte on-disk i-node record. Field widths
/// and names follow the record exactly so that [`crate::codec`] can encode
/// and decode it losslessly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub flags: InodeFlags,
    pub nlinks: u8,
    pub uid: u8,
    pub gid: u8,
    pub size_hi: u8,
    pub size_lo: u16,
    pub addr: [u16; 8],
    pub actime: [u16; 2],
    pub modtime: [u16; 2],
}

impl Inode {
    pub fn new_empty() -> Self {
        Inode {
            flags: InodeFlags::empty(),
            nlinks: 0,
            uid: 0,
            gid: 0,
            size_hi: 0,
            size_lo: 0,
            addr: [0; 8],
            actime: [0, 0],
            modtime: [0, 0],
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.flags.contains(InodeFlags::ALLOCATED)
    }

    pub fn is_large(&self) -> bool {
        self.flags.contains(InodeFlags::LARGE)
    }

    pub fn is_directory(&self) -> bool {
        self.file_type() == FileType::Directory
    }

    pub fn file_type(&self) -> FileType {
        match self.flags.bits() & TYPE_MASK {
            0o040000 => FileType::Directory,
            0o020000 => FileType::CharSpecial,
            0o060000 => FileType::BlockSpecial,
            _ => FileType::Plain,
        }
    }

    /// The file's byte length, decoded from the size_msb/size_hi/size_lo fields.
    pub fn file_size(&self) -> u32 {
        let msb = if self.flags.contains(InodeFlags::SIZE_MSB) {
            1u32 << 25
        } else {
            0
        };
        msb | ((self.size_hi as u32) << 16) | (self.size_lo as u32)
    }

    /// Sets the file's byte length, decomposing it into `size_msb`/`size_hi`/
    /// `size_lo`. Callers are responsible for rejecting sizes above
    /// [`MAX_FILE_SIZE`] before calling this (see `FileTooLarge`).
    pub fn set_file_size(&mut self, size: u32) {
        if size & (1 << 25) != 0 {
            self.flags.insert(InodeFlags::SIZE_MSB);
        } else {
            self.flags.remove(InodeFlags::SIZE_MSB);
        }
        self.size_hi = ((size >> 16) & 0xFF) as u8;
        self.size_lo = (size & 0xFFFF) as u16;
    }
}

/// Computes the i-node block number and in-block byte offset for i-node
/// number `n` (1-based).
fn locate(n: u32) -> (u32, usize) {
    let block = (n - 1) / INODES_PER_BLOCK as u32 + 2;
    let offset = ((n - 1) as usize % INODES_PER_BLOCK) * INODE_SIZE;
    (block, offset)
}

impl Volume {
    /// Loads i-node `n` from the table. Rejects `n == 0` or `n` beyond the
    /// table's capacity (`isize * 16`).
    pub fn load_inode(&mut self, n: u32) -> Result<Inode> {
        let isize = self.superblock()?.isize as u32;
        if n == 0 || n > isize * INODES_PER_BLOCK as u32 {
            return Err(Error::InvalidInodeNumber(n));
        }
        let (block_no, offset) = locate(n);
        let mut block = [0u8; BLOCK_SIZE];
        self.device.read_block(block_no, &mut block)?;
        let mut record = [0u8; INODE_SIZE];
        record.copy_from_slice(&block[offset..offset + INODE_SIZE]);
        Ok(crate::codec::decode_inode(&record))
    }

    /// Writes i-node `n` back, read-modify-write on its enclosing block.
    pub fn save_inode(&mut self, n: u32, inode: &Inode) -> Result<()> {
        let isize = self.superblock()?.isize as u32;
        if n == 0 || n > isize * INODES_PER_BLOCK as u32 {
            return Err(Error::InvalidInodeNumber(n));
        }
        let (block_no, offset) = locate(n);
        let mut block = [0u8; BLOCK_SIZE];
        self.device.read_block(block_no, &mut block)?;
        block[offset..offset + INODE_SIZE].copy_from_slice(&crate::codec::encode_inode(inode));
        self.device.write_block(block_no, &block)?;
        Ok(())
    }

    /// Refills the superblock's free-inode-number cache by scanning the
    /// i-node table in order for unallocated slots, up to its 100-entry
    /// capacity.
    pub fn repopulate_inode_cache(&mut self) -> Result<()> {
        let isize = self.superblock()?.isize as u32;
        let mut found = arrayvec::ArrayVec::<u16, 100>::new();
        'blocks: for inode_block in 0..isize {
            let mut block = [0u8; BLOCK_SIZE];
            self.device.read_block(inode_block + 2, &mut block)?;
            for slot in 0..INODES_PER_BLOCK {
                if found.is_full() {
                    break 'blocks;
                }
                let offset = slot * INODE_SIZE;
                let mut record = [0u8; INODE_SIZE];
                record.copy_from_slice(&block[offset..offset + INODE_SIZE]);
                let inode = crate::codec::decode_inode(&record);
                if !inode.is_allocated() {
                    let number = inode_block * INODES_PER_BLOCK as u32 + slot as u32 + 1;
                    found.push(number as u16);
                }
            }
        }
        debug!("repopulated inode cache with {} entries", found.len());
        self.superblock_mut()?.inode = found;
        Ok(())
    }

    /// Claims a free i-node number, refilling the cache first if it is
    /// empty. The caller is responsible for setting `allocated` plus a type
    /// before saving the claimed i-node.
    pub fn claim_inode(&mut self) -> Result<u32> {
        if self.superblock()?.inode.is_empty() {
            self.repopulate_inode_cache()?;
        }
        let sb = self.superblock_mut()?;
        sb.inode.pop().map(|n| n as u32).ok_or(Error::AllocateFailure)
    }

    /// Releases i-node `n`: frees every data block (and, for a large file,
    /// every indirection block) it owns, then zeroes and saves the record.
    /// The free-inode cache is not eagerly updated; the next refill
    /// discovers the released slot.
    pub fn release_inode(&mut self, n: u32) -> Result<()> {
        let inode = self.load_inode(n)?;

        let data_blocks: Vec<u32> = self.block_iter(&inode)?.collect();
        for block in data_blocks {
            self.free_block(block)?;
        }

        if inode.is_large() {
            for addr in &inode.addr[0..7] {
                if *addr != 0 {
                    self.free_block(*addr as u32)?;
                }
            }
            if inode.addr[7] != 0 {
                let doubly = self.read_indirect(inode.addr[7] as u32)?;
                for single in doubly.iter() {
                    if *single != 0 {
                        self.free_block(*single as u32)?;
                    }
                }
                self.free_block(inode.addr[7] as u32)?;
            }
        }

        self.save_inode(n, &Inode::new_empty())?;
        debug!("released inode {}", n);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_of_doubly_indirect_file_frees_every_indirection_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volume.img");
        let mut volume = Volume::open(&path).unwrap();
        volume.initfs(3000, 64).unwrap();

        let mut inode = Inode::new_empty();
        inode.flags = InodeFlags::ALLOCATED;
        // Reach one logical index past the singly-indirect region so a
        // doubly-indirect block and one of its singly-indirect children
        // both get materialized.
        let l = 7 * 256;
        let data_block = volume.alloc_block().unwrap();
        volume.set_block_at(&mut inode, l, data_block).unwrap();
        inode.set_file_size((l as u64 * BLOCK_SIZE as u64 + 1) as u32);
        volume.save_inode(10, &inode).unwrap();

        let before = volume.superblock().unwrap().free.len();
        volume.release_inode(10).unwrap();
        let after = volume.superblock().unwrap().free.len();

        // Freed: the data block, one singly-indirect child, and the
        // doubly-indirect block itself -- three more than before.
        assert_eq!(after, before + 3);

        // The released i-node no longer reaches the singly-indirect child,
        // so re-allocating must be able to hand that exact block back out
        // without tripping "double free" bookkeeping elsewhere.
        let released = volume.load_inode(10).unwrap();
        assert!(!released.is_allocated());
    }
}
