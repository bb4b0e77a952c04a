//! Integration tests for the allocate/deallocate contract.

#![allow(unsafe_code)]

use std::collections::HashSet;
use std::ptr::NonNull;

use blockpool_core::{BlockLayout, FixedPool, LockKind, PoolConfig, PoolError, LINK_SIZE};

fn addr(ptr: *const u8) -> usize {
    ptr as usize
}

#[test]
fn test_allocate_until_full() {
    let pool = FixedPool::new(5, 8).unwrap();
    let blocks: Vec<_> = (0..5).map(|_| pool.allocate().unwrap()).collect();

    let addrs: Vec<_> = blocks.iter().map(|b| addr(b.as_ptr())).collect();
    for pair in addrs.windows(2) {
        assert_eq!(pair[1] - pair[0], 8);
    }

    assert_eq!(
        pool.allocate().unwrap_err(),
        PoolError::OutOfMemory { block_count: 5 }
    );

    // Free the third block handed out; it comes straight back.
    let mut blocks = blocks;
    let third = blocks.remove(2);
    let third_addr = addr(third.as_ptr());
    pool.deallocate(third).unwrap();

    let again = pool.allocate().unwrap();
    assert_eq!(addr(again.as_ptr()), third_addr);
}

#[test]
fn test_dealloc_then_realloc_single_block() {
    let pool = FixedPool::new(1, 8).unwrap();

    let block = pool.allocate().unwrap();
    let first = addr(block.as_ptr());
    pool.deallocate(block).unwrap();

    let block = pool.allocate().unwrap();
    assert_eq!(addr(block.as_ptr()), first);
}

#[test]
fn test_dealloc_out_of_bound() {
    let pool = FixedPool::new(10, 8).unwrap();
    let mut foreign = vec![0u8; 8];
    let ptr = NonNull::new(foreign.as_mut_ptr()).unwrap();

    // SAFETY: the buffer is not part of the pool, so the pool never writes it.
    let err = unsafe { pool.deallocate_ptr(ptr) }.unwrap_err();
    assert_eq!(err, PoolError::OutOfBound { addr: addr(ptr.as_ptr()) });
    assert_eq!(pool.free_count(), 10);
    assert_eq!(foreign, [0u8; 8]);
}

#[test]
fn test_block_from_other_pool_is_out_of_bound() {
    let pool_a = FixedPool::new(4, 16).unwrap();
    let pool_b = FixedPool::new(4, 16).unwrap();

    let _held = pool_a.allocate().unwrap();
    let before = pool_a.free_count();
    let foreign = pool_b.allocate().unwrap();

    let err = pool_a.deallocate(foreign).unwrap_err();
    assert!(matches!(err.error, PoolError::OutOfBound { .. }));
    assert_eq!(pool_a.free_count(), before);

    // The rejected block is still usable and goes back to its own pool.
    pool_b.deallocate(err.block).unwrap();
    assert_eq!(pool_b.free_count(), 4);
}

#[test]
fn test_distinct_non_overlapping_blocks() {
    let pool = FixedPool::new(64, 24).unwrap();
    let blocks: Vec<_> = (0..64).map(|_| pool.allocate().unwrap()).collect();

    let mut ranges: Vec<_> = blocks
        .iter()
        .map(|b| (addr(b.as_ptr()), addr(b.as_ptr()) + b.len()))
        .collect();
    let unique: HashSet<_> = ranges.iter().map(|r| r.0).collect();
    assert_eq!(unique.len(), 64);

    ranges.sort_unstable();
    for pair in ranges.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "blocks overlap: {pair:?}");
    }
}

#[test]
fn test_content_survives_free_and_realloc() {
    let pool = FixedPool::new(3, 32).unwrap();

    let mut block = pool.allocate().unwrap();
    block.fill(0xAB);
    pool.deallocate(block).unwrap();

    let block = pool.allocate().unwrap();
    // The first word held the free-list link while the block was free.
    assert!(block[LINK_SIZE..].iter().all(|&b| b == 0xAB));
}

#[test]
fn test_alloc_and_dealloc_loop() {
    const COUNT: usize = 89;
    const BLOCK_SIZE: usize = 97;
    let pool = FixedPool::new(COUNT, BLOCK_SIZE).unwrap();

    for _ in 0..3 {
        let mut blocks = Vec::with_capacity(COUNT);
        for j in 0..COUNT {
            let mut block = pool.allocate().unwrap();
            assert_eq!(block.len(), BLOCK_SIZE);
            block.fill(u8::try_from(j).unwrap());
            blocks.push(block);
        }

        assert_eq!(
            pool.allocate().unwrap_err(),
            PoolError::OutOfMemory { block_count: COUNT }
        );

        for (j, block) in blocks.iter().enumerate() {
            let expected = [u8::try_from(j).unwrap(); BLOCK_SIZE];
            assert_eq!(&block[..], &expected[..]);
        }

        for block in blocks {
            pool.deallocate(block).unwrap();
        }
        assert_eq!(pool.free_count(), COUNT);
    }

    let stats = pool.stats();
    assert_eq!(stats.total_allocations, 3 * COUNT as u64);
    assert_eq!(stats.total_deallocations, 3 * COUNT as u64);
    assert_eq!(stats.failed_allocations, 3);
    assert_eq!(stats.peak_allocated, COUNT);
}

#[test]
fn test_alloc_configured_block_size() {
    const COUNT: usize = 20;
    let pool = FixedPool::new(COUNT, 2).unwrap();
    assert_eq!(pool.stride(), LINK_SIZE);

    let mut blocks = Vec::with_capacity(COUNT);
    for j in 0..COUNT {
        let mut block = pool.allocate().unwrap();
        assert_eq!(block.len(), 2);
        block.copy_from_slice(&u16::try_from(j).unwrap().to_le_bytes());
        blocks.push(block);
    }

    for (j, block) in blocks.iter().enumerate() {
        assert_eq!(&block[..], &u16::try_from(j).unwrap().to_le_bytes());
    }

    for block in blocks {
        pool.deallocate(block).unwrap();
    }
}

#[test]
fn test_index_address_round_trip() {
    let pool = FixedPool::new(17, 12).unwrap();
    let layout = BlockLayout::new(pool.block_count(), pool.block_size()).unwrap();
    let blocks: Vec<_> = (0..17).map(|_| pool.allocate().unwrap()).collect();
    let base = addr(blocks[0].as_ptr());

    for (i, block) in blocks.iter().enumerate() {
        assert_eq!(layout.addr_of(base, i), addr(block.as_ptr()));
        assert_eq!(layout.index_of(base, addr(block.as_ptr())), i);
    }
}

#[test]
fn test_raw_round_trip() {
    let pool = FixedPool::new(2, 8).unwrap();
    let ptr = pool.allocate().unwrap().into_raw();
    assert!(pool.contains(ptr.as_ptr()));
    assert_eq!(pool.allocated_count(), 1);

    // SAFETY: `ptr` is an allocated block start with no live view.
    unsafe { pool.deallocate_ptr(ptr) }.unwrap();
    assert_eq!(pool.allocated_count(), 0);
}

#[test]
fn test_pool_from_toml_config() {
    let config = PoolConfig::from_toml_str(
        r#"
        block_count = 8
        block_size = 64
        lock = "parking"
        track_ownership = true
        "#,
    )
    .unwrap();

    let pool = FixedPool::from_config(&config).unwrap();
    assert_eq!(pool.lock_kind(), LockKind::Parking);
    assert_eq!(pool.block_count(), 8);
    assert_eq!(pool.block_size(), 64);

    let ptr = pool.allocate().unwrap().into_raw();
    // SAFETY: allocated block start with no live view.
    unsafe { pool.deallocate_ptr(ptr) }.unwrap();
    // SAFETY: ownership tracking rejects the repeat before touching memory.
    let err = unsafe { pool.deallocate_ptr(ptr) }.unwrap_err();
    assert_eq!(err, PoolError::DoubleFree { index: 0 });
}

#[test]
fn test_capacity_overflow_is_an_error() {
    let err = FixedPool::new(usize::MAX / 4, 64).unwrap_err();
    assert!(matches!(err, PoolError::CapacityOverflow { .. }));
}
