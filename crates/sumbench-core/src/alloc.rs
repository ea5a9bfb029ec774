//! Allocation accounting.
//!
//! The harness reads an [`AllocationProbe`] immediately before and after
//! each timed invocation and records the difference. The probe observes; it
//! never influences what a kernel does.
//!
//! To get real numbers the host binary installs [`CountingAllocator`]:
//!
//! ```rust,ignore
//! use sumbench_core::alloc::CountingAllocator;
//!
//! #[global_allocator]
//! static GLOBAL: CountingAllocator = CountingAllocator::new();
//! ```

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic count of bytes allocated by the process so far.
pub trait AllocationProbe {
    fn allocated_bytes(&self) -> u64;
}

/// Probe for hosts without allocation accounting; always reports zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProbe;

impl AllocationProbe for NullProbe {
    fn allocated_bytes(&self) -> u64 {
        0
    }
}

/// `GlobalAlloc` wrapper around [`System`] that counts bytes requested.
///
/// Frees are not subtracted: the count is "bytes allocated", matching what
/// a per-trial allocation column reports.
#[derive(Debug)]
pub struct CountingAllocator {
    allocated: AtomicU64,
}

impl CountingAllocator {
    pub const fn new() -> Self {
        Self {
            allocated: AtomicU64::new(0),
        }
    }

    fn count(&self, bytes: usize) {
        self.allocated.fetch_add(bytes as u64, Ordering::Relaxed);
    }
}

impl Default for CountingAllocator {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            self.count(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            self.count(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() && new_size > layout.size() {
            self.count(new_size - layout.size());
        }
        new_ptr
    }
}

impl AllocationProbe for CountingAllocator {
    fn allocated_bytes(&self) -> u64 {
        self.allocated.load(Ordering::Relaxed)
    }
}

impl<P: AllocationProbe + ?Sized> AllocationProbe for &P {
    fn allocated_bytes(&self) -> u64 {
        (**self).allocated_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_probe_reports_zero() {
        assert_eq!(NullProbe.allocated_bytes(), 0);
    }

    #[test]
    fn counting_allocator_counts_requested_bytes() {
        let counter = CountingAllocator::new();
        let layout = Layout::array::<f32>(64).unwrap();
        unsafe {
            let ptr = counter.alloc(layout);
            assert!(!ptr.is_null());
            assert_eq!(counter.allocated_bytes(), 256);

            let grown = counter.realloc(ptr, layout, 512);
            assert!(!grown.is_null());
            assert_eq!(counter.allocated_bytes(), 512);

            counter.dealloc(grown, Layout::from_size_align(512, layout.align()).unwrap());
        }
        assert_eq!(counter.allocated_bytes(), 512);
    }

    #[test]
    fn probe_by_reference() {
        fn read<P: AllocationProbe>(probe: P) -> u64 {
            probe.allocated_bytes()
        }
        let counter = CountingAllocator::new();
        assert_eq!(read(&counter), 0);
        assert_eq!(read(&NullProbe as &dyn AllocationProbe), 0);
    }
}
