//! The owned volume handle.
//!
//! The original core kept the open file and the superblock cache as
//! process-wide globals. This implementation
//! replaces both with a single owned `Volume` value threaded through every
//! operation — no hidden static state, so nothing stops a caller (or a test)
//! from opening more than one volume in the same process.

use std::path::Path;

use log::info;

use crate::codec;
use crate::device::{BlockDevice, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::superblock::Superblock;

pub struct Volume {
    pub(crate) device: BlockDevice,
    superblock: Option<Superblock>,
}

impl Volume {
    /// Opens (creating if absent) the backing file at `path`. If the file
    /// is already large enough to hold a superblock, it is loaded eagerly;
    /// otherwise the volume starts uninitialized and `initfs` must be run
    /// before any other operation.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut device = BlockDevice::open(path)?;
        let superblock = if device.len_bytes()? >= 2 * BLOCK_SIZE as u64 {
            let mut buf = [0u8; BLOCK_SIZE];
            device
                .read_block(1, &mut buf)
                .map_err(|_| Error::SuperblockReadError)?;
            Some(codec::decode_superblock(&buf))
        } else {
            None
        };
        if superblock.is_some() {
            info!("loaded existing volume");
        } else {
            info!("opened new, uninitialized volume");
        }
        Ok(Volume { device, superblock })
    }

    pub fn is_initialized(&self) -> bool {
        self.superblock.is_some()
    }

    pub(crate) fn superblock(&self) -> Result<&Superblock> {
        self.superblock.as_ref().ok_or(Error::FileSystemNotInitialized)
    }

    pub(crate) fn superblock_mut(&mut self) -> Result<&mut Superblock> {
        self.superblock.as_mut().ok_or(Error::FileSystemNotInitialized)
    }

    pub(crate) fn install_superblock(&mut self, sb: Superblock) {
        self.superblock = Some(sb);
    }

    /// Flushes the superblock to block 1 and closes out the session. The
    /// superblock is, by design, the last block written on a clean exit.
    pub fn quit(&mut self) -> Result<()> {
        self.flush_superblock()
    }
}
