//! Directory layer: a directory's data is just a stream of 16-byte
//! entries — a 2-byte i-node number (0 = empty slot) and a 14-byte,
//! zero-padded name — 32 entries per 512-byte block.

use crate::device::BLOCK_SIZE;
use crate::error::{Error, Result};
use crate::inode::Inode;
use crate::volume::Volume;

pub const DIRENT_SIZE: usize = 16;
pub const NAME_LEN: usize = 14;
const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIRENT_SIZE;

/// Truncates `name` to [`NAME_LEN`] bytes and zero-pads the remainder.
fn pad_name(name: &str) -> [u8; NAME_LEN] {
    let mut padded = [0u8; NAME_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(NAME_LEN);
    padded[..len].copy_from_slice(&bytes[..len]);
    padded
}

fn encode_dirent(inode_num: u16, name: &str) -> [u8; DIRENT_SIZE] {
    let mut buf = [0u8; DIRENT_SIZE];
    buf[0..2].copy_from_slice(&inode_num.to_le_bytes());
    buf[2..2 + NAME_LEN].copy_from_slice(&pad_name(name));
    buf
}

fn decode_dirent(buf: &[u8]) -> (u16, [u8; NAME_LEN]) {
    let inode_num = u16::from_le_bytes([buf[0], buf[1]]);
    let mut name = [0u8; NAME_LEN];
    name.copy_from_slice(&buf[2..2 + NAME_LEN]);
    (inode_num, name)
}

impl Volume {
    /// Looks up `name` in directory `dir`, returning its i-node number, or 0
    /// if not found or if `dir` is not a directory.
    pub fn dir_lookup(&mut self, dir: &Inode, name: &str) -> Result<u32> {
        if !dir.is_directory() {
            return Ok(0);
        }
        let target = pad_name(name);
        let blocks: Vec<u32> = self.block_iter(dir)?.collect();
        for block_no in blocks {
            let mut buf = [0u8; BLOCK_SIZE];
            self.device.read_block(block_no, &mut buf)?;
            for slot in 0..ENTRIES_PER_BLOCK {
                let off = slot * DIRENT_SIZE;
                let (inode_num, entry_name) = decode_dirent(&buf[off..off + DIRENT_SIZE]);
                if inode_num != 0 && entry_name == target {
                    return Ok(inode_num as u32);
                }
            }
        }
        Ok(0)
    }

    /// Inserts a new `(name, target_inode)` entry into directory `dir`,
    /// reusing an empty slot if one exists or appending a fresh data block
    /// otherwise. Fails `FileExists` on a duplicate name, or
    /// `NotADirectory` if `dir` is not a directory.
    pub fn dir_insert(&mut self, dir: &mut Inode, name: &str, target_inode: u32) -> Result<()> {
        if !dir.is_directory() {
            return Err(Error::NotADirectory);
        }
        if self.dir_lookup(dir, name)? != 0 {
            return Err(Error::FileExists);
        }

        let blocks: Vec<u32> = self.block_iter(dir)?.collect();
        for block_no in blocks {
            let mut buf = [0u8; BLOCK_SIZE];
            self.device.read_block(block_no, &mut buf)?;
            for slot in 0..ENTRIES_PER_BLOCK {
                let off = slot * DIRENT_SIZE;
                let (inode_num, _) = decode_dirent(&buf[off..off + DIRENT_SIZE]);
                if inode_num == 0 {
                    buf[off..off + DIRENT_SIZE]
                        .copy_from_slice(&encode_dirent(target_inode as u16, name));
                    self.device.write_block(block_no, &buf)?;
                    return Ok(());
                }
            }
        }

        // No free slot in any existing block: allocate a fresh one.
        let new_block = self.alloc_block()?;
        let mut buf = [0u8; BLOCK_SIZE];
        buf[0..DIRENT_SIZE].copy_from_slice(&encode_dirent(target_inode as u16, name));
        self.device.write_block(new_block, &buf)?;
        self.append_block(dir, new_block, BLOCK_SIZE as u32)
    }

    /// Removes the entry named `name` from directory `dir` by zeroing its
    /// slot (tombstone-style; the block and the directory's recorded size
    /// are unchanged). Fails `NoSuchFile` if no such entry exists.
    pub fn dir_remove(&mut self, dir: &mut Inode, name: &str) -> Result<()> {
        if !dir.is_directory() {
            return Err(Error::NotADirectory);
        }
        let target = pad_name(name);
        let blocks: Vec<u32> = self.block_iter(dir)?.collect();
        for block_no in blocks {
            let mut buf = [0u8; BLOCK_SIZE];
            self.device.read_block(block_no, &mut buf)?;
            for slot in 0..ENTRIES_PER_BLOCK {
                let off = slot * DIRENT_SIZE;
                let (inode_num, entry_name) = decode_dirent(&buf[off..off + DIRENT_SIZE]);
                if inode_num != 0 && entry_name == target {
                    buf[off..off + 2].copy_from_slice(&0u16.to_le_bytes());
                    self.device.write_block(block_no, &buf)?;
                    return Ok(());
                }
            }
        }
        Err(Error::NoSuchFile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_padding_pads_short_names() {
        let mut expected = [0u8; NAME_LEN];
        expected[0] = b'a';
        assert_eq!(pad_name("a"), expected);
    }

    #[test]
    fn name_padding_fills_exact_length() {
        assert_eq!(pad_name("fourteen_chars"), *b"fourteen_chars");
    }

    #[test]
    fn name_padding_truncates_long_names() {
        let name = "fifteen_chars12"; // 15 bytes
        assert_eq!(pad_name(name), *b"fifteen_chars1");
    }
}
