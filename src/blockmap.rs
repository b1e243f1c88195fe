//! Block-map addressing: translating a logical block index within a
//! file into a physical block number, under the small-file (direct-only) and
//! large-file (singly/doubly indirect) addressing disciplines, including the
//! small→large upgrade and the append/iterate operations built on top.

use crate::codec;
use crate::device::BLOCK_SIZE;
use crate::error::{Error, Result};
use crate::inode::{Inode, InodeFlags, MAX_FILE_SIZE, NDIRECT};
use crate::volume::Volume;

/// Block numbers per indirect block (512 bytes / 2-byte entries).
const PTRS_PER_BLOCK: u32 = 256;
/// Number of singly-indirect regions addressed directly from `addr[0..7)`;
/// `addr[7]` is the doubly-indirect block.
const NSINGLE: u32 = 7;

/// Highest logical block index a file may reach, bound by the 32 MiB size
/// cap rather than the structural capacity of 7*256 + 256*256 blocks.
pub const MAX_LOGICAL_BLOCKS: u32 = (MAX_FILE_SIZE / BLOCK_SIZE as u64) as u32;

fn zero_indirect() -> [u16; 256] {
    [0u16; 256]
}

impl Volume {
    /// Returns the physical block number of logical block `l` in `inode`,
    /// or 0 if it is a hole.
    pub fn block_at(&mut self, inode: &Inode, l: u32) -> Result<u32> {
        if !inode.is_large() {
            if (l as usize) >= NDIRECT {
                return Ok(0);
            }
            return Ok(inode.addr[l as usize] as u32);
        }

        let q = l / PTRS_PER_BLOCK;
        let r = (l % PTRS_PER_BLOCK) as usize;

        if q < NSINGLE {
            let single_no = inode.addr[q as usize];
            if single_no == 0 {
                return Ok(0);
            }
            let slots = self.read_indirect(single_no as u32)?;
            Ok(slots[r] as u32)
        } else {
            let double_no = inode.addr[7];
            if double_no == 0 {
                return Ok(0);
            }
            let doubly = self.read_indirect(double_no as u32)?;
            let idx = (q - NSINGLE) as usize;
            if idx >= doubly.len() {
                return Err(Error::InvalidIndex(l));
            }
            let single_no = doubly[idx];
            if single_no == 0 {
                return Ok(0);
            }
            let slots = self.read_indirect(single_no as u32)?;
            Ok(slots[r] as u32)
        }
    }

    /// Sets logical block `l` of `inode` to physical block `block`,
    /// materializing any missing indirection along the way. A small file
    /// that needs an index ≥ 8 is upgraded to a large file first.
    pub fn set_block_at(&mut self, inode: &mut Inode, l: u32, block: u32) -> Result<()> {
        if !inode.is_large() {
            if (l as usize) < NDIRECT {
                inode.addr[l as usize] = block as u16;
                return Ok(());
            }
            self.upgrade_to_large(inode)?;
            return self.set_block_at(inode, l, block);
        }

        let q = l / PTRS_PER_BLOCK;
        let r = (l % PTRS_PER_BLOCK) as usize;

        if q < NSINGLE {
            let addr_index = q as usize;
            if inode.addr[addr_index] == 0 {
                let new_block = self.alloc_block()?;
                self.write_indirect(new_block, &zero_indirect())?;
                inode.addr[addr_index] = new_block as u16;
            }
            let single_no = inode.addr[addr_index] as u32;
            let mut slots = self.read_indirect(single_no)?;
            slots[r] = block as u16;
            self.write_indirect(single_no, &slots)?;
        } else {
            if inode.addr[7] == 0 {
                let new_block = self.alloc_block()?;
                self.write_indirect(new_block, &zero_indirect())?;
                inode.addr[7] = new_block as u16;
            }
            let double_no = inode.addr[7] as u32;
            let mut doubly = self.read_indirect(double_no)?;
            let idx = (q - NSINGLE) as usize;
            if idx >= doubly.len() {
                return Err(Error::InvalidIndex(l));
            }
            if doubly[idx] == 0 {
                let new_single = self.alloc_block()?;
                self.write_indirect(new_single, &zero_indirect())?;
                doubly[idx] = new_single as u16;
                self.write_indirect(double_no, &doubly)?;
            }
            let single_no = doubly[idx] as u32;
            let mut slots = self.read_indirect(single_no)?;
            slots[r] = block as u16;
            self.write_indirect(single_no, &slots)?;
        }
        Ok(())
    }

    /// Converts a small file's 8 direct blocks into a large file's first
    /// singly-indirect block. A no-op if the
    /// file is already large.
    fn upgrade_to_large(&mut self, inode: &mut Inode) -> Result<()> {
        if inode.is_large() {
            return Ok(());
        }
        let new_block = self.alloc_block()?;
        let mut slots = zero_indirect();
        for (i, addr) in inode.addr.iter().enumerate() {
            slots[i] = *addr;
        }
        self.write_indirect(new_block, &slots)?;
        inode.addr = [0; 8];
        inode.addr[0] = new_block as u16;
        inode.flags.insert(InodeFlags::LARGE);
        Ok(())
    }

    /// Appends `block` (holding `nbytes` bytes of payload) to `inode` at the
    /// lowest currently-unallocated logical index, and grows the recorded
    /// file size by `nbytes`.
    pub fn append_block(&mut self, inode: &mut Inode, block: u32, nbytes: u32) -> Result<()> {
        let mut l = 0u32;
        loop {
            if l >= MAX_LOGICAL_BLOCKS {
                return Err(Error::FileTooLarge);
            }
            if self.block_at(inode, l)? == 0 {
                break;
            }
            l += 1;
        }
        self.set_block_at(inode, l, block)?;

        let new_size = inode
            .file_size()
            .checked_add(nbytes)
            .filter(|&size| (size as u64) <= MAX_FILE_SIZE)
            .ok_or(Error::FileTooLarge)?;
        inode.set_file_size(new_size);
        Ok(())
    }

    /// Begins iteration over `inode`'s allocated block numbers in
    /// increasing logical order, skipping holes. Returns an
    /// owned value carrying its own cursor rather than mutating shared
    /// process state, so independent iterations over different i-nodes
    /// never interfere. The block list is resolved eagerly at construction
    /// time (indirect blocks are read once, up front) so the returned
    /// iterator needs no further device access.
    pub fn block_iter(&mut self, inode: &Inode) -> Result<BlockIter> {
        let total_logical =
            ((inode.file_size() as u64 + BLOCK_SIZE as u64 - 1) / BLOCK_SIZE as u64) as u32;
        let mut blocks = Vec::with_capacity(total_logical as usize);
        for l in 0..total_logical {
            let b = self.block_at(inode, l)?;
            if b != 0 {
                blocks.push(b);
            }
        }
        Ok(BlockIter {
            inner: blocks.into_iter(),
        })
    }

    pub(crate) fn read_indirect(&mut self, block_no: u32) -> Result<[u16; 256]> {
        let mut buf = [0u8; BLOCK_SIZE];
        self.device.read_block(block_no, &mut buf)?;
        Ok(codec::decode_indirect(&buf))
    }

    fn write_indirect(&mut self, block_no: u32, slots: &[u16; 256]) -> Result<()> {
        self.device.write_block(block_no, &codec::encode_indirect(slots))
    }
}

/// A forward iterator over a file's allocated physical block numbers, in
/// increasing logical order. See [`Volume::block_iter`].
pub struct BlockIter {
    inner: std::vec::IntoIter<u32>,
}

impl Iterator for BlockIter {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        self.inner.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_volume() -> Volume {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volume.img");
        std::mem::forget(dir);
        let mut volume = Volume::open(&path).unwrap();
        volume.initfs(2000, 32).unwrap();
        volume
    }

    #[test]
    fn small_file_addresses_eight_direct_blocks() {
        let mut volume = small_volume();
        let mut inode = Inode::new_empty();
        for l in 0..NDIRECT as u32 {
            let block = volume.alloc_block().unwrap();
            volume.set_block_at(&mut inode, l, block).unwrap();
            assert_eq!(volume.block_at(&inode, l).unwrap(), block);
        }
        assert!(!inode.is_large());
    }

    #[test]
    fn ninth_block_triggers_small_to_large_upgrade_preserving_prior_blocks() {
        let mut volume = small_volume();
        let mut inode = Inode::new_empty();
        let mut placed = Vec::new();
        for l in 0..NDIRECT as u32 {
            let block = volume.alloc_block().unwrap();
            volume.set_block_at(&mut inode, l, block).unwrap();
            placed.push(block);
        }

        let ninth = volume.alloc_block().unwrap();
        volume.set_block_at(&mut inode, NDIRECT as u32, ninth).unwrap();

        assert!(inode.is_large());
        for (l, block) in placed.iter().enumerate() {
            assert_eq!(volume.block_at(&inode, l as u32).unwrap(), *block);
        }
        assert_eq!(volume.block_at(&inode, NDIRECT as u32).unwrap(), ninth);
    }

    #[test]
    fn crossing_the_doubly_indirect_boundary_addresses_correctly() {
        let mut volume = small_volume();
        let mut inode = Inode::new_empty();

        let last_singly = NSINGLE * PTRS_PER_BLOCK - 1; // highest index still in addr[0..7)
        let first_doubly = NSINGLE * PTRS_PER_BLOCK; // first index routed through addr[7]

        let a = volume.alloc_block().unwrap();
        let b = volume.alloc_block().unwrap();
        volume.set_block_at(&mut inode, last_singly, a).unwrap();
        volume.set_block_at(&mut inode, first_doubly, b).unwrap();

        assert_eq!(volume.block_at(&inode, last_singly).unwrap(), a);
        assert_eq!(volume.block_at(&inode, first_doubly).unwrap(), b);
        assert_ne!(inode.addr[6], 0); // last singly-indirect region materialized
        assert_ne!(inode.addr[7], 0); // doubly-indirect block materialized
    }

    #[test]
    fn append_rejects_growth_past_the_file_size_cap() {
        let mut volume = small_volume();
        let mut inode = Inode::new_empty();
        inode.set_file_size((MAX_FILE_SIZE - 1) as u32);
        let block = volume.alloc_block().unwrap();
        let err = volume.append_block(&mut inode, block, 2).unwrap_err();
        assert!(matches!(err, Error::FileTooLarge));
    }
}
