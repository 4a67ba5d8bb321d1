extern crate libc;

use core::ptr;

pub fn page_size() -> usize {
    page_size::get()
}

/// Reserves `size` bytes of zeroed read-write memory.
pub unsafe fn alloc(size: usize) -> (*mut u8, usize) {
    let addr = libc::mmap(
        ptr::null_mut(),
        size,
        libc::PROT_WRITE | libc::PROT_READ,
        libc::MAP_ANONYMOUS | libc::MAP_PRIVATE | libc::MAP_NORESERVE,
        -1,
        0,
    );
    if addr == libc::MAP_FAILED {
        (ptr::null_mut(), 0)
    } else {
        (addr as *mut u8, size)
    }
}

pub unsafe fn free(ptr: *mut u8, size: usize) -> bool {
    libc::munmap(ptr as *mut _, size) == 0
}
