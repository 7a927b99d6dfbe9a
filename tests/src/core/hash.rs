use std::collections::HashMap;

use drc_core::hash::*;
use proptest::prelude::*;

#[test]
fn install_and_lookup() {
    let mut t = HashTable::new();
    assert!(t.is_empty());
    t.install(0, 0x8000_1000, 0x40);
    assert!(t.exists(0, 0x8000_1000));
    assert!(!t.exists(1, 0x8000_1000));
    assert_eq!(t.lookup(0, 0x8000_1000), Some(0x40));
    assert_eq!(t.lookup(0, 0x8000_1004), None);
}

#[test]
fn reinstall_replaces_in_place() {
    let mut t = HashTable::new();
    t.install(2, 0x1000, 0x100);
    t.install(2, 0x1000, 0x200);
    assert_eq!(t.len(), 1);
    assert_eq!(t.lookup(2, 0x1000), Some(0x200));
}

#[test]
fn modes_are_distinct_keys() {
    let mut t = HashTable::new();
    t.install(0, 0x1000, 1);
    t.install(4, 0x1000, 2);
    assert_eq!(t.len(), 2);
    assert_eq!(t.lookup(0, 0x1000), Some(1));
    assert_eq!(t.lookup(4, 0x1000), Some(2));
    // The jump cache slot is shared; a hit must still check the mode.
    assert_eq!(t.lookup(0, 0x1000), Some(1));
}

#[test]
fn jump_cache_alias_falls_back_to_chain() {
    let mut t = HashTable::new();
    let a = 0x1000;
    let b = a + (JMP_CACHE_SIZE as u32) * 4;
    t.install(0, a, 10);
    t.install(0, b, 20);
    assert_eq!(t.lookup(0, a), Some(10));
    assert_eq!(t.lookup(0, b), Some(20));
    assert_eq!(t.lookup(0, a), Some(10));
}

#[test]
fn reset_drops_everything() {
    let mut t = HashTable::new();
    for pc in (0..64u32).map(|i| i * 4) {
        t.install(0, pc, pc);
    }
    assert_eq!(t.len(), 64);
    assert_eq!(t.lookup(0, 8), Some(8));
    t.reset();
    assert!(t.is_empty());
    assert_eq!(t.lookup(0, 8), None);
    assert!(!t.exists(0, 8));
}

#[test]
fn bucket_in_range() {
    for pc in [0u32, 4, 0x8000_0000, 0xffff_fffc] {
        for mode in 0..6u8 {
            assert!(HashTable::hash(mode, pc) < HASH_SIZE);
        }
    }
}

proptest! {
    #[test]
    fn one_entry_per_key(keys in proptest::collection::vec((0u8..6, any::<u32>(), any::<u32>()), 1..200)) {
        let mut t = HashTable::new();
        let mut model = HashMap::new();
        for &(mode, pc, code) in &keys {
            t.install(mode, pc, code);
            model.insert((mode, pc), code);
        }
        prop_assert_eq!(t.len(), model.len());
        for (&(mode, pc), &code) in &model {
            prop_assert_eq!(t.lookup(mode, pc), Some(code));
        }
    }
}
