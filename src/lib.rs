//! A segregated free-list memory allocator.
//!
//! The heap is one contiguous, growing byte range obtained from a
//! [`HeapSource`] (an `sbrk`-like primitive). Blocks carry boundary tags
//! (a header and a footer word holding size and allocation bit), free blocks
//! are kept in three size tiers of doubly linked lists, allocation runs a
//! bounded best-fit search over one tier, and freeing merges a block with its
//! free physical neighbours right away.
//!
//! Everything is wrapped up in a [`SegMalloc`] instance. There is no global
//! state and no locking: each instance owns an independent heap and must be
//! used from one thread at a time.

#![no_std]
#![deny(missing_docs)]
#![allow(clippy::missing_safety_doc)]

mod block;
mod common;
mod config;
mod fit;
mod freelist;
mod heap;
mod segmalloc;
mod smverbose;

#[cfg(target_os = "macos")]
#[path = "macos.rs"]
mod sys;

#[cfg(target_os = "linux")]
#[path = "linux.rs"]
mod sys;

pub use crate::config::{SegConfig, CHUNK_SIZE, TIER_BOUNDS};
pub use crate::fit::{BestFit, Candidate, FirstFit, FitPolicy, NthFit, FIT_WINDOW};
pub use crate::heap::{HeapSource, MemArena, OutOfMemory, DEFAULT_ARENA_CAPACITY};

/// Minimum block size, boundary tags included.
pub const MIN_BLOCK_SIZE: usize = block::MIN_BLOCK_SIZE;

/// Alignment of every pointer returned by the allocator.
pub const ALIGNMENT: usize = block::DSIZE;

/// An allocator instance
///
/// Instances of this type are used to allocate blocks of memory out of their
/// own heap. The heap is created lazily by the first allocation, or
/// explicitly by [`SegMalloc::init`]. Memory is never given back to the heap
/// source while the instance lives.
pub struct SegMalloc<S = MemArena, F = NthFit>(segmalloc::SegMalloc<S, F>);

/// Constant initializer for `SegMalloc` structure.
pub const SEGMALLOC_INIT: SegMalloc = SegMalloc(segmalloc::SEGMALLOC_INIT);

#[allow(clippy::new_without_default)]
impl SegMalloc {
    /// Creates a new instance of an allocator, same as `SEGMALLOC_INIT`.
    pub fn new() -> SegMalloc {
        SEGMALLOC_INIT
    }
}

impl<S: HeapSource> SegMalloc<S, NthFit> {
    /// Creates an allocator with the default tunables on top of `source`.
    pub fn with_source(source: S) -> SegMalloc<S, NthFit> {
        SegMalloc(segmalloc::SegMalloc::new(
            source,
            NthFit::default(),
            SegConfig::DEFAULT,
        ))
    }
}

impl<S: HeapSource, F: FitPolicy> SegMalloc<S, F> {
    /// Creates an allocator with explicit heap source, fit policy and
    /// tunables. An invalid `config` is replaced by [`SegConfig::DEFAULT`].
    pub fn with_config(source: S, policy: F, config: SegConfig) -> SegMalloc<S, F> {
        let config = if config.is_valid() {
            config
        } else {
            smverbose!("CONFIG: invalid {:?}, using defaults", config);
            SegConfig::DEFAULT
        };
        SegMalloc(segmalloc::SegMalloc::new(source, policy, config))
    }

    /// Tunables in effect for this instance.
    pub fn config(&self) -> &SegConfig {
        self.0.config()
    }

    /// Creates a fresh, empty heap.
    ///
    /// Returns false if the heap source cannot provide the initial chunk.
    /// Calling it again discards the previous heap: every pointer handed out
    /// before becomes dangling.
    #[inline]
    pub unsafe fn init(&mut self) -> bool {
        match self.0.init() {
            Ok(()) => true,
            Err(err) => {
                smverbose!("INIT: {}", err);
                false
            }
        }
    }

    /// Allocates `size` bytes aligned to [`ALIGNMENT`].
    ///
    /// Returns a null pointer if `size` is zero or the heap cannot grow.
    #[inline]
    pub unsafe fn malloc(&mut self, size: usize) -> *mut u8 {
        self.0.malloc(size)
    }

    /// Allocates room for `elements * size` bytes, all zero.
    ///
    /// Returns a null pointer without allocating if the product overflows.
    #[inline]
    pub unsafe fn calloc(&mut self, elements: usize, size: usize) -> *mut u8 {
        self.0.calloc(elements, size)
    }

    /// Releases memory returned by `malloc`, `calloc` or `realloc` of this
    /// instance. A null `ptr` is ignored.
    ///
    /// Passing any other pointer, or a pointer twice, is undefined behavior.
    #[inline]
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        self.0.free(ptr)
    }

    /// Moves an allocation into a new block of `size` bytes.
    ///
    /// A null `ptr` behaves like `malloc`, a zero `size` like `free` (and
    /// returns null). On failure null is returned and `ptr` is still valid.
    /// Otherwise the first `min(size, usable_size(ptr))` bytes are copied
    /// and `ptr` is freed.
    #[inline]
    pub unsafe fn realloc(&mut self, ptr: *mut u8, size: usize) -> *mut u8 {
        self.0.realloc(ptr, size)
    }

    /// Number of bytes usable through a pointer returned by this instance.
    #[inline]
    pub unsafe fn usable_size(&self, ptr: *mut u8) -> usize {
        self.0.usable_size(ptr)
    }

    /// Current heap extent, sentinels included.
    pub fn heap_size(&self) -> usize {
        self.0.heap_size()
    }

    /// Checks the whole heap and the free lists for consistency.
    ///
    /// `tag` is printed with the first violation found when verbose output
    /// is enabled; callers usually pass `line!()`. An allocator with no heap
    /// yet is consistent.
    pub fn check_heap(&self, tag: u32) -> bool {
        unsafe { self.0.check_heap(tag) }
    }
}
