//! Fragmentation walk-through.
//!
//! Fill the region with 1-byte allocations, free every odd-indexed one, then
//! ask for 2 bytes: the request is satisfied from two non-adjacent fragments.

use std::fmt::Write as _;

use fragmem_core::{AllocError, Allocator, AllocatorConfig, CheckLevel, Handle};

use crate::HarnessError;

/// Region size used by `harness demo` when none is given.
pub const DEFAULT_DEMO_CAPACITY: usize = 5;

/// Result of a demo run: the printed text and the allocator it ran against.
#[derive(Debug)]
pub struct DemoRun {
    pub transcript: String,
    pub allocator: Allocator,
}

/// Run the walk-through on a fresh allocator of `capacity` bytes.
pub fn run(capacity: usize) -> Result<DemoRun, HarnessError> {
    if capacity < 2 {
        return Err(AllocError::InvalidArgument {
            reason: "demo needs a capacity of at least 2",
        }
        .into());
    }
    let allocator =
        Allocator::with_config(AllocatorConfig::new(capacity).with_check(CheckLevel::Full))?;
    let mut out = String::new();

    let mut handles: Vec<Option<Handle>> = Vec::with_capacity(capacity);
    for i in 0..capacity {
        match allocator.allocate(1) {
            Ok(handle) => {
                let _ = writeln!(out, "Allocated block {i}: {handle}");
                handles.push(Some(handle));
            }
            Err(_) => {
                let _ = writeln!(out, "Allocation failed at index {i}");
                handles.push(None);
            }
        }
    }
    let _ = writeln!(out, "{}", allocator.dump());

    let mut freed = Vec::new();
    for (i, slot) in handles.iter().enumerate().skip(1).step_by(2) {
        if let Some(handle) = slot {
            allocator.release(handle)?;
            freed.push(i);
        }
    }
    let _ = writeln!(out, "\nAfter freeing blocks {}:", join_indices(&freed));
    let _ = writeln!(out, "{}", allocator.dump());

    match allocator.allocate(2) {
        Ok(handle) => {
            let _ = writeln!(
                out,
                "\nAllocated 2 bytes across non-contiguous segments: {handle}"
            );
        }
        Err(_) => {
            let _ = writeln!(
                out,
                "Allocation of 2 bytes failed due to insufficient free memory."
            );
        }
    }
    let _ = writeln!(out, "{}", allocator.dump());

    Ok(DemoRun {
        transcript: out,
        allocator,
    })
}

/// `[1]` -> `1`, `[1, 3]` -> `1 and 3`, `[1, 3, 5]` -> `1, 3 and 5`.
fn join_indices(indices: &[usize]) -> String {
    match indices {
        [] => String::new(),
        [only] => only.to_string(),
        [init @ .., last] => {
            let head: Vec<String> = init.iter().map(ToString::to_string).collect();
            format!("{} and {last}", head.join(", "))
        }
    }
}
