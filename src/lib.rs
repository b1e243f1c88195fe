//! A user-space re-creation of the Unix Version 6 on-disk file system.
//!
//! Treats a single host-provided regular file as a raw block device and
//! exposes five coarse operations — initialize, copy a file in, copy a file
//! out, make a directory, remove an entry — through the owned [`Volume`]
//! handle. The on-disk layout (superblock, i-node table, small/large file
//! addressing, directory entries) is byte-compatible with the original
//! format; see the module-level docs of [`codec`] for the exact offsets.

pub mod blockmap;
pub mod codec;
pub mod device;
pub mod dir;
pub mod error;
pub mod inode;
pub mod ops;
pub mod path;
pub mod superblock;
pub mod volume;

pub use blockmap::BlockIter;
pub use error::{Error, Result};
pub use inode::{FileType, Inode, InodeFlags};
pub use volume::Volume;
