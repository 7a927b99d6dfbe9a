use drc_backend::{CacheError, CodeCache, HandleTable};
use drc_core::Handle;

#[test]
fn code_and_near_share_the_arena() {
    let mut cache = CodeCache::allocate(64 * 1024).unwrap();
    let cap = cache.capacity();
    assert!(cap >= 64 * 1024);
    assert_eq!(cache.remaining(), cap);

    let a = cache.begin_code(10).unwrap();
    let b = cache.begin_code(10).unwrap();
    assert_eq!(a, 0);
    assert_eq!(b % 16, 0);
    assert!(b >= 10);

    cache.alloc_near(256, 8).unwrap();
    assert_eq!(cache.near_size(), 256);
    assert_eq!(cache.remaining(), cap - 256 - cache.code_size());
}

#[test]
fn reset_keeps_near_allocations() {
    let mut cache = CodeCache::allocate(16 * 1024).unwrap();
    cache.alloc_near(1024, 16).unwrap();
    cache.begin_code(4096).unwrap();
    cache.reset();
    assert_eq!(cache.code_size(), 0);
    assert_eq!(cache.near_size(), 1024);
}

#[test]
fn begin_code_reports_full() {
    let mut cache = CodeCache::allocate(4096).unwrap();
    let cap = cache.capacity();
    match cache.begin_code(cap + 1) {
        Err(CacheError::Full { requested, .. }) => assert_eq!(requested, cap + 1),
        other => panic!("expected Full, got {other:?}"),
    }
}

#[test]
fn handles_survive_clear() {
    let mut cache = CodeCache::allocate(16 * 1024).unwrap();
    let mut table = HandleTable::new(&mut cache, 4).unwrap();
    let a = table.alloc("a").unwrap();
    let b = table.alloc("b").unwrap();
    assert_eq!((a, b), (Handle(0), Handle(1)));
    assert_eq!(table.resolve(a), None);

    table.define(a, 0x40);
    assert_eq!(table.resolve(a), Some(0x40));
    assert_eq!(table.name(b), "b");

    table.clear_definitions();
    assert_eq!(table.resolve(a), None);
    assert_eq!(table.len(), 2);
    table.define(a, 0x80);
    assert_eq!(table.resolve(a), Some(0x80));
}

#[test]
fn handle_capacity() {
    let mut cache = CodeCache::allocate(16 * 1024).unwrap();
    let mut table = HandleTable::new(&mut cache, 2).unwrap();
    table.alloc("x").unwrap();
    table.alloc("y").unwrap();
    assert!(matches!(
        table.alloc("z"),
        Err(CacheError::HandlesExhausted { capacity: 2 })
    ));
    assert_eq!(table.resolve(Handle(7)), None);
}
