#![no_main]
use fragmem_core::{AllocErrorKind, Allocator, AllocatorConfig, CheckLevel, Handle};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First two bytes pick the region size, the rest is a sequence of 3-byte ops.
    if data.len() < 2 {
        return;
    }
    let capacity = 1 + usize::from(u16::from_le_bytes([data[0], data[1]]) % 4096);
    let Ok(alloc) = Allocator::with_config(
        AllocatorConfig::new(capacity)
            .with_check(CheckLevel::Full)
            .with_log_capacity(0),
    ) else {
        return;
    };
    let mut live: Vec<Handle> = Vec::new();
    let mut retired: Vec<Handle> = Vec::new();

    for chunk in data[2..].chunks_exact(3) {
        let arg = usize::from(u16::from_le_bytes([chunk[1], chunk[2]]));
        match chunk[0] % 4 {
            0 | 1 => {
                let size = arg % (capacity + 2);
                let before = alloc.free_total();
                match alloc.allocate(size) {
                    Ok(handle) => {
                        assert_eq!(handle.total_size(), size);
                        assert_eq!(alloc.free_total(), before - size);
                        live.push(handle);
                    }
                    Err(err) => match err.kind() {
                        AllocErrorKind::InvalidArgument => assert_eq!(size, 0),
                        AllocErrorKind::OutOfMemory => {
                            assert!(before < size);
                            assert_eq!(alloc.free_total(), before);
                        }
                        AllocErrorKind::SegmentNotFound => unreachable!("allocate never reports this"),
                    },
                }
            }
            2 => {
                if !live.is_empty() {
                    let handle = live.swap_remove(arg % live.len());
                    alloc.release(&handle).unwrap();
                    retired.push(handle);
                }
            }
            _ => {
                // With nothing live, any stale handle must be rejected untouched.
                if live.is_empty()
                    && let Some(handle) = retired.get(arg % retired.len().max(1))
                {
                    let before = alloc.dump();
                    let err = alloc.release(handle).unwrap_err();
                    assert_eq!(err.kind(), AllocErrorKind::SegmentNotFound);
                    assert_eq!(alloc.dump(), before);
                }
            }
        }
        alloc.verify().unwrap();
    }

    for handle in live {
        alloc.release(&handle).unwrap();
    }
    assert_eq!(alloc.free_total(), capacity);
    assert_eq!(alloc.block_count(), 1);
});
