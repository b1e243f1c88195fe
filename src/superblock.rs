//! The superblock and the free-block manager: a linked chain of
//! "free-list blocks," each holding a count and up to 100 block numbers,
//! whose live head is cached directly in the superblock.

use arrayvec::ArrayVec;
use log::{debug, warn};

use crate::codec;
use crate::device::BLOCK_SIZE;
use crate::error::{Error, Result};
use crate::volume::Volume;

pub const FREE_CACHE_CAP: usize = 100;
pub const INODE_CACHE_CAP: usize = 100;

/// In-memory mirror of the 512-byte superblock record. `free`/`inode`
/// are fixed-capacity stacks rather than a raw array plus a separate length
/// field — the same information, with the invariant `len() <= 100` enforced
/// by the type instead of by convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub isize: u16,
    pub fsize: u16,
    pub free: ArrayVec<u16, FREE_CACHE_CAP>,
    pub inode: ArrayVec<u16, INODE_CACHE_CAP>,
    pub flock: u8,
    pub ilock: u8,
    pub fmod: u8,
    pub time: [u16; 2],
}

impl Superblock {
    /// First data block number; blocks `[0, first_data_block)` hold the
    /// boot block, superblock, and i-node table.
    pub fn first_data_block(&self) -> u32 {
        2 + self.isize as u32
    }
}

impl Volume {
    /// Allocates one data block: pop the superblock's free-block cache,
    /// and if it just emptied, treat the popped value as a link to the
    /// next free-list block and refill the cache from it before returning
    /// the original candidate.
    pub fn alloc_block(&mut self) -> Result<u32> {
        let sb = self.superblock_mut()?;
        let candidate = sb.free.pop().ok_or(Error::AllocateFailure)?;

        if sb.free.is_empty() {
            if candidate == 0 {
                // End of chain: nothing left to link to.
                warn!("free-block chain exhausted");
                return Err(Error::AllocateFailure);
            }
            let mut block = [0u8; BLOCK_SIZE];
            self.device.read_block(candidate as u32, &mut block)?;
            let nfree = u16::from_le_bytes([block[0], block[1]]) as usize;
            let nfree = nfree.min(FREE_CACHE_CAP);
            let mut refilled = ArrayVec::new();
            for i in 0..nfree {
                let off = 2 + i * 2;
                refilled.push(u16::from_le_bytes([block[off], block[off + 1]]));
            }
            self.superblock_mut()?.free = refilled;
        }

        debug!("allocated block {}", candidate);
        Ok(candidate as u32)
    }

    /// Frees block `b`: if the cache is full, spill it to `b` as a new
    /// chain head first, then push `b` onto the (now empty) cache.
    pub fn free_block(&mut self, b: u32) -> Result<()> {
        let sb = self.superblock()?;
        if b < sb.first_data_block() || b >= sb.fsize as u32 {
            return Err(Error::InvalidBlockNumber(b));
        }

        let sb = self.superblock_mut()?;
        if sb.free.len() == FREE_CACHE_CAP {
            let mut block = [0u8; BLOCK_SIZE];
            block[0..2].copy_from_slice(&(sb.free.len() as u16).to_le_bytes());
            for (i, slot) in sb.free.iter().enumerate() {
                let off = 2 + i * 2;
                block[off..off + 2].copy_from_slice(&slot.to_le_bytes());
            }
            self.device.write_block(b, &block)?;
            self.superblock_mut()?.free.clear();
        }

        self.superblock_mut()?.free.push(b as u16);
        Ok(())
    }

    /// Encodes and writes the in-memory superblock back to block 1.
    pub fn flush_superblock(&mut self) -> Result<()> {
        let sb = self.superblock()?.clone();
        let buf = codec::encode_superblock(&sb);
        self.device.write_block(1, &buf)?;
        debug!("flushed superblock");
        Ok(())
    }
}
