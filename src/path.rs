//! Path resolver: walks a `/`-separated path from the root i-node
//! (number 1) to a terminal i-node, one directory lookup per segment.

use itertools::{Itertools, Position};

use crate::error::{Error, Result};
use crate::volume::Volume;

/// The root directory's fixed i-node number.
pub const ROOT_INODE: u32 = 1;

impl Volume {
    /// Resolves `path` to its terminal i-node number, starting at the root.
    /// Empty segments (from leading, trailing, or repeated slashes) are
    /// discarded. Returns 0 if any segment's lookup fails to resolve.
    pub fn resolve_path(&mut self, path: &str) -> Result<u32> {
        let mut current = ROOT_INODE;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let dir = self.load_inode(current)?;
            let next = self.dir_lookup(&dir, segment)?;
            if next == 0 {
                return Ok(0);
            }
            current = next;
        }
        Ok(current)
    }

    /// Resolves the parent directory of `path` (every segment but the
    /// last) and returns it alongside the final path component, without
    /// looking that last component up. Used by operations that need to
    /// insert or locate a name within its containing directory (`mkdir`,
    /// `cpin`). Fails `NoSuchFile` if any leading segment fails to resolve,
    /// or if `path` has no final component at all.
    pub fn resolve_parent<'p>(&mut self, path: &'p str) -> Result<(u32, &'p str)> {
        let mut current = ROOT_INODE;
        let mut final_name: Option<&str> = None;

        for item in path.split('/').filter(|s| !s.is_empty()).with_position() {
            match item {
                Position::Last(name) | Position::Only(name) => final_name = Some(name),
                Position::First(segment) | Position::Middle(segment) => {
                    let dir = self.load_inode(current)?;
                    let next = self.dir_lookup(&dir, segment)?;
                    if next == 0 {
                        return Err(Error::NoSuchFile);
                    }
                    current = next;
                }
            }
        }

        final_name.map(|name| (current, name)).ok_or(Error::NoSuchFile)
    }
}
