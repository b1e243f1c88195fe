//! The error taxonomy produced by the file-system core.
//!
//! Every fallible entry point in this crate returns `Result<T, Error>`. No
//! variant here is "fatal" in the sense of aborting the process — callers
//! (the CLI driver in particular) are expected to report the error and keep
//! going, except where opening the backing file itself fails.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not open file: {0}")]
    FileOpenFailure(#[source] io::Error),

    #[error("seek failed: {0}")]
    SeekFailure(#[source] io::Error),

    #[error("block read failed (short transfer)")]
    BlockReadFailure,

    #[error("block write failed (short transfer)")]
    BlockWriteFailure,

    #[error("superblock could not be read")]
    SuperblockReadError,

    #[error("file system is not initialized; run initfs first")]
    FileSystemNotInitialized,

    #[error("invalid block number: {0}")]
    InvalidBlockNumber(u32),

    #[error("invalid inode number: {0}")]
    InvalidInodeNumber(u32),

    #[error("invalid block index: {0}")]
    InvalidIndex(u32),

    #[error("no free blocks left to allocate")]
    AllocateFailure,

    #[error("no such file")]
    NoSuchFile,

    #[error("file already exists")]
    FileExists,

    #[error("not a directory")]
    NotADirectory,

    #[error("file too large (exceeds 32 MiB)")]
    FileTooLarge,
}

pub type Result<T> = std::result::Result<T, Error>;
