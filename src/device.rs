//! Raw block device over a host file.
//!
//! A `BlockDevice` treats a regular host file as a flat array of
//! [`BLOCK_SIZE`]-byte blocks, numbered from 0. It owns the open file handle
//! and has no cache of its own: every read or write round-trips to the host
//! file system, in the same spirit as a kernel's `bio`/disk layer minus the
//! buffer cache — a single-shot userspace tool has no need to amortize disk
//! access across callers.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use crate::error::{Error, Result};

pub const BLOCK_SIZE: usize = 512;

pub struct BlockDevice {
    file: File,
}

impl BlockDevice {
    /// Opens `path` for reading and writing, creating it (empty) if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(Error::FileOpenFailure)?;
        debug!("opened backing volume {}", path.display());
        Ok(Self { file })
    }

    /// Current length of the backing file, in bytes.
    pub fn len_bytes(&self) -> Result<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(Error::FileOpenFailure)
    }

    fn seek_to(&mut self, block_no: u32) -> Result<()> {
        let offset = block_no as u64 * BLOCK_SIZE as u64;
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(Error::SeekFailure)?;
        Ok(())
    }

    /// Reads exactly one block into `buf`. Fails with `BlockReadFailure` on a
    /// short transfer (e.g. reading past the end of the file).
    pub fn read_block(&mut self, block_no: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        self.seek_to(block_no)?;
        let mut total = 0;
        while total < BLOCK_SIZE {
            let n = self
                .file
                .read(&mut buf[total..])
                .map_err(|_| Error::BlockReadFailure)?;
            if n == 0 {
                return Err(Error::BlockReadFailure);
            }
            total += n;
        }
        Ok(())
    }

    /// Writes exactly one block from `buf`. Fails with `BlockWriteFailure` on
    /// a short transfer.
    pub fn write_block(&mut self, block_no: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        self.seek_to(block_no)?;
        self.file
            .write_all(buf)
            .map_err(|_| Error::BlockWriteFailure)?;
        Ok(())
    }

    /// Extends the backing file to `num_blocks` zero-filled blocks, writing
    /// every block explicitly (rather than relying on `set_len`'s sparse-file
    /// behavior, so that a subsequent `stat` reports a fully materialized
    /// file, matching `initfs`'s observable behavior on the original).
    pub fn zero_extend(&mut self, num_blocks: u32) -> Result<()> {
        let zero = [0u8; BLOCK_SIZE];
        for block_no in 0..num_blocks {
            self.write_block(block_no, &zero)?;
        }
        Ok(())
    }
}
