use core::fmt::Arguments;

pub static SM_CHECKS: bool = cfg!(feature = "debug");
pub static SM_HEAP_CHECKS: bool = cfg!(feature = "checks");
pub static SM_VERBOSE: bool = cfg!(feature = "verbose");
pub static VERBOSE_DEL: &str = "====================================";

#[cfg(unix)]
mod ext {
    pub fn debug(s: &str) {
        libc_print::libc_println!("{}", s);
    }
}

/// Static out buffer type
type StaticStr = str_buf::StrBuf<200>;
/// Static out buffer - we use it to avoid memory allocations,
/// when something is printed inside allocator code.
static mut OUT_BUFFER: StaticStr = StaticStr::new();

/// Prints string with args.
/// Output goes to the stream defined in @ext module.
/// Messages longer than the buffer are truncated.
#[inline(never)]
pub fn smprint_fn(args: Arguments<'_>) {
    unsafe {
        let _ = core::fmt::write(&mut OUT_BUFFER, args);
        ext::debug(&OUT_BUFFER);
        OUT_BUFFER.set_len(0);
    }
}

/// Prints string with args if @SM_VERBOSE is set.
#[macro_export]
macro_rules! smverbose {
    ($($arg:tt)*) => {
        if $crate::smverbose::SM_VERBOSE {
            $crate::smverbose::smprint_fn(format_args!($($arg)*))
        }
    }
}

extern crate alloc;
use self::alloc::alloc::handle_alloc_error;

/// Prints current line and throw error using @handle_alloc_error.
#[inline(never)]
pub fn smassert_fn(line: u32) {
    smprint_fn(format_args!("ALLOC ASSERT: {}", line));
    handle_alloc_error(self::alloc::alloc::Layout::new::<u32>());
}

/// Acts like assert using handle_alloc_error if @SM_CHECKS is set, else does nothing.
#[macro_export]
macro_rules! smassert {
    ($check:expr) => {
        if $crate::smverbose::SM_CHECKS && !($check) {
            $crate::smverbose::smassert_fn(line!());
        }
    };
}
