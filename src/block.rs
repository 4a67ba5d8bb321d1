//! Block layout and boundary tags.
//!
//! A block starts with a one word header holding its size and allocation
//! bit. The last word of the block holds a footer with the same encoding.
//! While a block is free the first two payload words are the free-list
//! links; while it is allocated they belong to the user. Every piece of
//! address arithmetic over the heap lives in this module.

use core::mem;
use core::ptr;

use static_assertions::const_assert;

use crate::smassert;

/// Boundary tag word.
pub type Word = u64;

/// Word and header size (bytes).
pub const WSIZE: usize = mem::size_of::<Word>();
/// Double word size, also the payload alignment (bytes).
pub const DSIZE: usize = 2 * WSIZE;
/// Header + two free-list links + footer.
pub const MIN_BLOCK_SIZE: usize = 4 * WSIZE;

const ALLOC_MASK: Word = 0x1;
const SIZE_MASK: Word = !0xF;

#[repr(C)]
pub struct Block {
    header: Word,
    free_prev: *mut Block,
    free_next: *mut Block,
}

const_assert!(WSIZE == 8);
const_assert!(mem::size_of::<Block>() <= MIN_BLOCK_SIZE - WSIZE);
const_assert!(MIN_BLOCK_SIZE % DSIZE == 0);

/// The two interpretations of a block's payload, selected by the
/// allocation bit in its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockView {
    Free {
        prev: *mut Block,
        next: *mut Block,
    },
    Allocated {
        payload: *mut u8,
    },
}

/// Returns a header reflecting a specified size and its alloc status.
pub fn pack(size: usize, alloc: bool) -> Word {
    if alloc {
        size as Word | ALLOC_MASK
    } else {
        size as Word
    }
}

/// Size stored in a boundary tag; the low 4 bits are flags.
pub fn extract_size(word: Word) -> usize {
    (word & SIZE_MASK) as usize
}

pub fn extract_alloc(word: Word) -> bool {
    word & ALLOC_MASK != 0
}

impl Block {
    pub unsafe fn header(me: *mut Block) -> Word {
        (*me).header
    }

    pub unsafe fn size(me: *mut Block) -> usize {
        extract_size((*me).header)
    }

    pub unsafe fn is_alloc(me: *mut Block) -> bool {
        extract_alloc((*me).header)
    }

    /// Bytes usable by the owner of an allocated block: everything between
    /// the header and the footer word.
    pub unsafe fn payload_size(me: *mut Block) -> usize {
        Block::size(me) - DSIZE
    }

    pub unsafe fn write_header(me: *mut Block, size: usize, alloc: bool) {
        (*me).header = pack(size, alloc);
    }

    /// Writes the footer at the last word of the block, as delimited by the
    /// size currently in the block's header.
    pub unsafe fn write_footer(me: *mut Block, size: usize, alloc: bool) {
        smassert!(Block::size(me) >= MIN_BLOCK_SIZE);
        *Block::footer_ptr(me) = pack(size, alloc);
    }

    pub unsafe fn footer(me: *mut Block) -> Word {
        *Block::footer_ptr(me)
    }

    unsafe fn footer_ptr(me: *mut Block) -> *mut Word {
        (me as *mut u8).add(Block::size(me) - WSIZE) as *mut Word
    }

    /// Physically next block: `me` plus its size.
    pub unsafe fn next(me: *mut Block) -> *mut Block {
        Block::plus_offset(me, Block::size(me))
    }

    /// The word right before the header: the previous block's footer.
    pub unsafe fn prev_footer(me: *mut Block) -> Word {
        *(me as *mut Word).sub(1)
    }

    /// Physically previous block, located through its footer.
    pub unsafe fn prev(me: *mut Block) -> *mut Block {
        let size = extract_size(Block::prev_footer(me));
        Block::minus_offset(me, size)
    }

    pub unsafe fn plus_offset(me: *mut Block, offset: usize) -> *mut Block {
        (me as *mut u8).add(offset) as *mut Block
    }

    pub unsafe fn minus_offset(me: *mut Block, offset: usize) -> *mut Block {
        (me as *mut u8).sub(offset) as *mut Block
    }

    pub unsafe fn to_mem(me: *mut Block) -> *mut u8 {
        (me as *mut u8).add(WSIZE)
    }

    pub unsafe fn from_mem(mem: *mut u8) -> *mut Block {
        mem.sub(WSIZE) as *mut Block
    }

    pub unsafe fn view(me: *mut Block) -> BlockView {
        if Block::is_alloc(me) {
            BlockView::Allocated {
                payload: Block::to_mem(me),
            }
        } else {
            BlockView::Free {
                prev: (*me).free_prev,
                next: (*me).free_next,
            }
        }
    }

    pub unsafe fn free_prev(me: *mut Block) -> *mut Block {
        smassert!(!Block::is_alloc(me));
        (*me).free_prev
    }

    pub unsafe fn free_next(me: *mut Block) -> *mut Block {
        smassert!(!Block::is_alloc(me));
        (*me).free_next
    }

    pub unsafe fn set_free_links(me: *mut Block, prev: *mut Block, next: *mut Block) {
        smassert!(!Block::is_alloc(me));
        (*me).free_prev = prev;
        (*me).free_next = next;
    }

    pub unsafe fn set_free_prev(me: *mut Block, prev: *mut Block) {
        smassert!(!Block::is_alloc(me));
        (*me).free_prev = prev;
    }

    pub unsafe fn set_free_next(me: *mut Block, next: *mut Block) {
        smassert!(!Block::is_alloc(me));
        (*me).free_next = next;
    }

    pub unsafe fn clear_free_links(me: *mut Block) {
        Block::set_free_links(me, ptr::null_mut(), ptr::null_mut());
    }
}
