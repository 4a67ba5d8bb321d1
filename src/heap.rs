//! Heap sources: the growth primitive the allocator sits on.

use core::fmt;
use core::ptr;

use crate::common::checked_align_up;
use crate::smverbose;
use crate::sys;

/// Address space reserved by a default [`MemArena`].
pub const DEFAULT_ARENA_CAPACITY: usize = 64 * 1024 * 1024;

/// The heap source could not grow by `requested` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfMemory {
    /// Number of bytes the failed request asked for.
    pub requested: usize,
}

impl fmt::Display for OutOfMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "heap source exhausted growing by {} bytes", self.requested)
    }
}

/// A contiguous, monotonically growing byte range, in the manner of `sbrk`.
///
/// # Safety
///
/// Implementations must hand out memory that is readable and writable,
/// starts at a 16-byte aligned address on the first call after creation or
/// `reset`, and is contiguous with every region returned before it: the
/// pointer returned by `sbrk(n)` is exactly the old break, and the new break
/// is `n` bytes after it.
pub unsafe trait HeapSource {
    /// Extends the heap by `incr` bytes and returns the previous break.
    fn sbrk(&mut self, incr: usize) -> Result<*mut u8, OutOfMemory>;

    /// Current number of bytes handed out since creation or the last `reset`.
    fn heap_size(&self) -> usize;

    /// Forgets every region handed out so far. The next `sbrk` starts from
    /// the beginning of the range again.
    fn reset(&mut self);
}

/// An owned arena backed by one anonymous memory mapping.
///
/// The whole capacity is reserved lazily on the first `sbrk` and released
/// when the arena is dropped. Growth past the capacity fails.
pub struct MemArena {
    base: *mut u8,
    reserved: usize,
    capacity: usize,
    brk: usize,
}

unsafe impl Send for MemArena {}

impl MemArena {
    /// Creates an arena with [`DEFAULT_ARENA_CAPACITY`].
    pub const fn new() -> MemArena {
        MemArena::with_capacity(DEFAULT_ARENA_CAPACITY)
    }

    /// Creates an arena that never grows past `capacity` bytes.
    pub const fn with_capacity(capacity: usize) -> MemArena {
        MemArena {
            base: ptr::null_mut(),
            reserved: 0,
            capacity,
            brk: 0,
        }
    }

    /// Maximum number of bytes this arena can hand out.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn reserve(&mut self) -> bool {
        let size = match checked_align_up(self.capacity.max(1), sys::page_size()) {
            Some(size) => size,
            None => return false,
        };
        let (base, reserved) = unsafe { sys::alloc(size) };
        if base.is_null() {
            smverbose!("ARENA: failed to reserve 0x{:x} bytes", size);
            return false;
        }
        smverbose!("ARENA: reserved [{:?}, 0x{:x}]", base, reserved);
        self.base = base;
        self.reserved = reserved;
        true
    }
}

impl Default for MemArena {
    fn default() -> MemArena {
        MemArena::new()
    }
}

unsafe impl HeapSource for MemArena {
    fn sbrk(&mut self, incr: usize) -> Result<*mut u8, OutOfMemory> {
        let err = OutOfMemory { requested: incr };
        if self.base.is_null() && !self.reserve() {
            return Err(err);
        }
        if incr > self.capacity - self.brk {
            smverbose!("ARENA: sbrk 0x{:x} exceeds capacity, brk=0x{:x}", incr, self.brk);
            return Err(err);
        }
        let old_brk = unsafe { self.base.add(self.brk) };
        self.brk += incr;
        Ok(old_brk)
    }

    fn heap_size(&self) -> usize {
        self.brk
    }

    fn reset(&mut self) {
        self.brk = 0;
    }
}

impl Drop for MemArena {
    fn drop(&mut self) {
        if !self.base.is_null() {
            unsafe {
                sys::free(self.base, self.reserved);
            }
        }
    }
}
