//! Allocator abstraction.
//!
//! Containers in this crate never touch the global heap directly. Every
//! allocation is routed through an [`Allocator`] handle that the caller hands
//! to the container when it is initialized. The container borrows the
//! allocator; it never owns it.

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

// ---------------------------------------------------------------------------
// DbgInfo
// ---------------------------------------------------------------------------

/// Debug information attached to every allocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbgInfo {
    /// Static label describing what the memory is for.
    pub static_name: &'static str,
    /// Source file of the allocation site.
    pub file: &'static str,
    /// Source line of the allocation site.
    pub line: u32,
}

impl DbgInfo {
    /// Construct debug info by hand. Prefer the [`sfz_dbg!`](crate::sfz_dbg) macro.
    pub const fn new(static_name: &'static str, file: &'static str, line: u32) -> Self {
        Self {
            static_name,
            file,
            line,
        }
    }
}

/// Build a [`DbgInfo`] for the current source location.
///
/// ```
/// let dbg = sfz_containers::sfz_dbg!("particles");
/// assert_eq!(dbg.static_name, "particles");
/// ```
#[macro_export]
macro_rules! sfz_dbg {
    ($name:expr) => {
        $crate::allocator::DbgInfo::new($name, file!(), line!())
    };
}

// ---------------------------------------------------------------------------
// Allocator
// ---------------------------------------------------------------------------

/// A source of raw memory.
pub trait Allocator {
    /// Allocate a block satisfying `layout`. Returns `None` on failure.
    fn allocate(&self, dbg: DbgInfo, layout: Layout) -> Option<NonNull<u8>>;

    /// Return a block previously obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this same allocator with
    /// exactly `layout`, and must not have been deallocated already.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Human-readable name, used in logs.
    fn name(&self) -> &str {
        "unnamed"
    }
}

// ---------------------------------------------------------------------------
// StandardAllocator
// ---------------------------------------------------------------------------

/// Allocator backed by the global Rust heap.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardAllocator;

impl Allocator for StandardAllocator {
    fn allocate(&self, dbg: DbgInfo, layout: Layout) -> Option<NonNull<u8>> {
        trace!(
            name = dbg.static_name,
            file = dbg.file,
            line = dbg.line,
            bytes = layout.size(),
            align = layout.align(),
            "allocate"
        );
        if layout.size() == 0 {
            // Zero-sized blocks never reach the heap.
            return NonNull::new(layout.align() as *mut u8);
        }
        // SAFETY: layout has a nonzero size.
        let ptr = unsafe { std::alloc::alloc(layout) };
        NonNull::new(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        trace!(bytes = layout.size(), align = layout.align(), "deallocate");
        if layout.size() == 0 {
            return;
        }
        std::alloc::dealloc(ptr.as_ptr(), layout);
    }

    fn name(&self) -> &str {
        "standard"
    }
}

// ---------------------------------------------------------------------------
// CountingAllocator
// ---------------------------------------------------------------------------

/// Wraps another allocator and keeps track of what is currently live.
///
/// Handy for asserting that a container holds exactly one block and that it
/// gives it back on teardown.
#[derive(Debug, Default)]
pub struct CountingAllocator<A: Allocator = StandardAllocator> {
    inner: A,
    live_allocations: AtomicUsize,
    live_bytes: AtomicUsize,
    total_allocations: AtomicUsize,
}

impl<A: Allocator> CountingAllocator<A> {
    /// Wrap `inner`.
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            live_allocations: AtomicUsize::new(0),
            live_bytes: AtomicUsize::new(0),
            total_allocations: AtomicUsize::new(0),
        }
    }

    /// Number of blocks allocated and not yet returned.
    pub fn live_allocations(&self) -> usize {
        self.live_allocations.load(Ordering::Relaxed)
    }

    /// Bytes allocated and not yet returned.
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Relaxed)
    }

    /// Number of successful allocations over the allocator's lifetime.
    pub fn total_allocations(&self) -> usize {
        self.total_allocations.load(Ordering::Relaxed)
    }
}

impl<A: Allocator> Allocator for CountingAllocator<A> {
    fn allocate(&self, dbg: DbgInfo, layout: Layout) -> Option<NonNull<u8>> {
        let ptr = self.inner.allocate(dbg, layout)?;
        self.live_allocations.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_add(layout.size(), Ordering::Relaxed);
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
        Some(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.inner.deallocate(ptr, layout);
        self.live_allocations.fetch_sub(1, Ordering::Relaxed);
        self.live_bytes.fetch_sub(layout.size(), Ordering::Relaxed);
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_allocator_respects_alignment() {
        let alloc = StandardAllocator;
        let layout = Layout::from_size_align(100, 64).unwrap();
        let ptr = alloc.allocate(crate::sfz_dbg!("test"), layout).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 64, 0);
        unsafe { alloc.deallocate(ptr, layout) };
    }

    #[test]
    fn counting_allocator_tracks_live_blocks() {
        let alloc = CountingAllocator::new(StandardAllocator);
        let layout = Layout::from_size_align(48, 8).unwrap();
        let a = alloc.allocate(crate::sfz_dbg!("a"), layout).unwrap();
        let b = alloc.allocate(crate::sfz_dbg!("b"), layout).unwrap();
        assert_eq!(alloc.live_allocations(), 2);
        assert_eq!(alloc.live_bytes(), 96);

        unsafe { alloc.deallocate(a, layout) };
        assert_eq!(alloc.live_allocations(), 1);
        assert_eq!(alloc.live_bytes(), 48);

        unsafe { alloc.deallocate(b, layout) };
        assert_eq!(alloc.live_allocations(), 0);
        assert_eq!(alloc.total_allocations(), 2);
    }

    #[test]
    fn dbg_macro_records_location() {
        let dbg = crate::sfz_dbg!("where");
        assert_eq!(dbg.static_name, "where");
        assert!(dbg.file.ends_with("allocator.rs"));
        assert!(dbg.line > 0);
    }
}
