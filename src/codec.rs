//! Bit-exact (de)serialization of the superblock and i-node on-disk records.
//!
//! This is the only place in the crate that knows the byte offsets from
//! the on-disk format. Every field is copied explicitly with
//! `from_le_bytes`/`to_le_bytes` rather than transmuted or aliased onto the
//! raw buffer: the latter silently breaks on big-endian hosts and whenever
//! the in-memory struct's alignment or padding disagrees with the on-disk
//! layout, which is exactly the trap zerocopy-style casts set for you here.

use arrayvec::ArrayVec;
use static_assertions::const_assert_eq;

use crate::device::BLOCK_SIZE;
use crate::inode::{Inode, InodeFlags, INODE_SIZE};
use crate::superblock::{Superblock, FREE_CACHE_CAP, INODE_CACHE_CAP};

const_assert_eq!(INODE_SIZE, 32);
const_assert_eq!(BLOCK_SIZE, 512);

const SB_ISIZE: usize = 0;
const SB_FSIZE: usize = 2;
const SB_NFREE: usize = 4;
const SB_FREE: usize = 6;
const SB_NINODE: usize = 206;
const SB_INODE: usize = 208;
const SB_FLOCK: usize = 408;
const SB_ILOCK: usize = 409;
const SB_FMOD: usize = 410;
const SB_TIME: usize = 411;

/// Encodes a superblock into its 512-byte on-disk block. Bytes beyond the
/// `time` field (415..512) are zero, matching the original layout's unused
/// trailer.
pub fn encode_superblock(sb: &Superblock) -> [u8; BLOCK_SIZE] {
    let mut buf = [0u8; BLOCK_SIZE];

    buf[SB_ISIZE..SB_ISIZE + 2].copy_from_slice(&sb.isize.to_le_bytes());
    buf[SB_FSIZE..SB_FSIZE + 2].copy_from_slice(&sb.fsize.to_le_bytes());
    buf[SB_NFREE..SB_NFREE + 2].copy_from_slice(&(sb.free.len() as u16).to_le_bytes());
    for (i, slot) in sb.free.iter().enumerate() {
        let off = SB_FREE + i * 2;
        buf[off..off + 2].copy_from_slice(&slot.to_le_bytes());
    }
    buf[SB_NINODE..SB_NINODE + 2].copy_from_slice(&(sb.inode.len() as u16).to_le_bytes());
    for (i, slot) in sb.inode.iter().enumerate() {
        let off = SB_INODE + i * 2;
        buf[off..off + 2].copy_from_slice(&slot.to_le_bytes());
    }
    buf[SB_FLOCK] = sb.flock;
    buf[SB_ILOCK] = sb.ilock;
    buf[SB_FMOD] = sb.fmod;
    buf[SB_TIME..SB_TIME + 2].copy_from_slice(&sb.time[0].to_le_bytes());
    buf[SB_TIME + 2..SB_TIME + 4].copy_from_slice(&sb.time[1].to_le_bytes());

    buf
}

/// Decodes a superblock from a 512-byte block. `nfree`/`ninode` are clamped
/// to 100 (the cache's fixed capacity) before the corresponding array is
/// read, so a corrupt count cannot read out of bounds.
pub fn decode_superblock(buf: &[u8; BLOCK_SIZE]) -> Superblock {
    let isize = u16::from_le_bytes([buf[SB_ISIZE], buf[SB_ISIZE + 1]]);
    let fsize = u16::from_le_bytes([buf[SB_FSIZE], buf[SB_FSIZE + 1]]);

    let nfree = (u16::from_le_bytes([buf[SB_NFREE], buf[SB_NFREE + 1]]) as usize)
        .min(FREE_CACHE_CAP);
    let mut free = ArrayVec::new();
    for i in 0..nfree {
        let off = SB_FREE + i * 2;
        free.push(u16::from_le_bytes([buf[off], buf[off + 1]]));
    }

    let ninode = (u16::from_le_bytes([buf[SB_NINODE], buf[SB_NINODE + 1]]) as usize)
        .min(INODE_CACHE_CAP);
    let mut inode = ArrayVec::new();
    for i in 0..ninode {
        let off = SB_INODE + i * 2;
        inode.push(u16::from_le_bytes([buf[off], buf[off + 1]]));
    }

    Superblock {
        isize,
        fsize,
        free,
        inode,
        flock: buf[SB_FLOCK],
        ilock: buf[SB_ILOCK],
        fmod: buf[SB_FMOD],
        time: [
            u16::from_le_bytes([buf[SB_TIME], buf[SB_TIME + 1]]),
            u16::from_le_bytes([buf[SB_TIME + 2], buf[SB_TIME + 3]]),
        ],
    }
}

const IN_FLAGS: usize = 0;
const IN_NLINKS: usize = 2;
const IN_UID: usize = 3;
const IN_GID: usize = 4;
const IN_SIZE_HI: usize = 5;
const IN_SIZE_LO: usize = 6;
const IN_ADDR: usize = 8;
const IN_ACTIME: usize = 24;
const IN_MODTIME: usize = 28;

/// Encodes an i-node into its 32-byte on-disk record.
pub fn encode_inode(inode: &Inode) -> [u8; INODE_SIZE] {
    let mut buf = [0u8; INODE_SIZE];

    buf[IN_FLAGS..IN_FLAGS + 2].copy_from_slice(&inode.flags.bits().to_le_bytes());
    buf[IN_NLINKS] = inode.nlinks;
    buf[IN_UID] = inode.uid;
    buf[IN_GID] = inode.gid;
    buf[IN_SIZE_HI] = inode.size_hi;
    buf[IN_SIZE_LO..IN_SIZE_LO + 2].copy_from_slice(&inode.size_lo.to_le_bytes());
    for (i, addr) in inode.addr.iter().enumerate() {
        let off = IN_ADDR + i * 2;
        buf[off..off + 2].copy_from_slice(&addr.to_le_bytes());
    }
    buf[IN_ACTIME..IN_ACTIME + 2].copy_from_slice(&inode.actime[0].to_le_bytes());
    buf[IN_ACTIME + 2..IN_ACTIME + 4].copy_from_slice(&inode.actime[1].to_le_bytes());
    buf[IN_MODTIME..IN_MODTIME + 2].copy_from_slice(&inode.modtime[0].to_le_bytes());
    buf[IN_MODTIME + 2..IN_MODTIME + 4].copy_from_slice(&inode.modtime[1].to_le_bytes());

    buf
}

/// Decodes an i-node from its 32-byte on-disk record.
pub fn decode_inode(buf: &[u8; INODE_SIZE]) -> Inode {
    let mut addr = [0u16; 8];
    for (i, slot) in addr.iter_mut().enumerate() {
        let off = IN_ADDR + i * 2;
        *slot = u16::from_le_bytes([buf[off], buf[off + 1]]);
    }

    Inode {
        flags: InodeFlags::from_bits_truncate(u16::from_le_bytes([buf[IN_FLAGS], buf[IN_FLAGS + 1]])),
        nlinks: buf[IN_NLINKS],
        uid: buf[IN_UID],
        gid: buf[IN_GID],
        size_hi: buf[IN_SIZE_HI],
        size_lo: u16::from_le_bytes([buf[IN_SIZE_LO], buf[IN_SIZE_LO + 1]]),
        addr,
        actime: [
            u16::from_le_bytes([buf[IN_ACTIME], buf[IN_ACTIME + 1]]),
            u16::from_le_bytes([buf[IN_ACTIME + 2], buf[IN_ACTIME + 3]]),
        ],
        modtime: [
            u16::from_le_bytes([buf[IN_MODTIME], buf[IN_MODTIME + 1]]),
            u16::from_le_bytes([buf[IN_MODTIME + 2], buf[IN_MODTIME + 3]]),
        ],
    }
}

/// Reads a slot table of 2-byte little-endian block numbers out of a raw
/// indirect block (256 entries per block).
pub fn decode_indirect(buf: &[u8; BLOCK_SIZE]) -> [u16; 256] {
    let mut slots = [0u16; 256];
    for (i, slot) in slots.iter_mut().enumerate() {
        let off = i * 2;
        *slot = u16::from_le_bytes([buf[off], buf[off + 1]]);
    }
    slots
}

/// Encodes a slot table of 256 block numbers into a raw indirect block.
pub fn encode_indirect(slots: &[u16; 256]) -> [u8; BLOCK_SIZE] {
    let mut buf = [0u8; BLOCK_SIZE];
    for (i, slot) in slots.iter().enumerate() {
        let off = i * 2;
        buf[off..off + 2].copy_from_slice(&slot.to_le_bytes());
    }
    buf
}
