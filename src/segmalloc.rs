// Segregated free-list allocator with boundary-tag coalescing.
//
// Heap layout, low to high addresses:
//
//   | prologue footer | block | block | ... | block | epilogue header |
//
// The prologue footer and the epilogue header are zero sized and always
// marked allocated, so neighbour lookups never leave the heap.

use core::cmp;
use core::ptr;

use crate::block::{extract_alloc, pack, Block, BlockView, Word, DSIZE, MIN_BLOCK_SIZE, WSIZE};
use crate::common::checked_align_up;
use crate::config::SegConfig;
use crate::fit::{Candidate, FitPolicy, NthFit, FIT_WINDOW};
use crate::freelist::{SegLists, NTIERS};
use crate::heap::{HeapSource, MemArena, OutOfMemory};
use crate::smverbose::{SM_HEAP_CHECKS, VERBOSE_DEL};
use crate::{smassert, smverbose};

pub struct SegMalloc<S, F> {
    source: S,
    policy: F,
    config: SegConfig,
    lists: SegLists,
    /// First real block, right after the prologue footer.
    heap_start: *mut Block,
    heap_prol: *mut Block,
    heap_epil: *mut Block,
}

unsafe impl<S: Send, F: Send> Send for SegMalloc<S, F> {}

pub const SEGMALLOC_INIT: SegMalloc<MemArena, NthFit> = SegMalloc::new(
    MemArena::new(),
    NthFit { window: FIT_WINDOW },
    SegConfig::DEFAULT,
);

impl<S, F> SegMalloc<S, F> {
    pub const fn new(source: S, policy: F, config: SegConfig) -> SegMalloc<S, F> {
        SegMalloc {
            source,
            policy,
            config,
            lists: SegLists::new(config.tier_bounds),
            heap_start: ptr::null_mut(),
            heap_prol: ptr::null_mut(),
            heap_epil: ptr::null_mut(),
        }
    }

    pub fn config(&self) -> &SegConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        !self.heap_start.is_null()
    }
}

impl<S: HeapSource, F: FitPolicy> SegMalloc<S, F> {
    /// Creates an empty heap: prologue, epilogue and one chunk of free space.
    /// Anything allocated before is discarded.
    pub unsafe fn init(&mut self) -> Result<(), OutOfMemory> {
        self.heap_start = ptr::null_mut();
        self.heap_prol = ptr::null_mut();
        self.heap_epil = ptr::null_mut();
        self.lists.clear();
        self.source.reset();

        let start = self.source.sbrk(2 * WSIZE)? as *mut Word;
        smassert!(start as usize % DSIZE == 0);
        *start = pack(0, true);
        *start.add(1) = pack(0, true);

        self.heap_prol = start as *mut Block;
        self.heap_start = start.add(1) as *mut Block;
        self.heap_epil = self.heap_start;
        smverbose!("INIT: heap at {:?}", start);

        if let Err(err) = self.extend_heap(self.config.chunk_size) {
            self.heap_start = ptr::null_mut();
            return Err(err);
        }
        self.check_heap_state();
        Ok(())
    }

    pub unsafe fn malloc(&mut self, size: usize) -> *mut u8 {
        smverbose!("{}", VERBOSE_DEL);
        smverbose!("MALLOC: size={:x}", size);

        if !self.is_initialized() && self.init().is_err() {
            return ptr::null_mut();
        }
        if size == 0 {
            return ptr::null_mut();
        }

        let asize = match self.adjust_request(size) {
            Some(asize) => asize,
            None => return ptr::null_mut(),
        };

        let mut block = self.find_fit(asize);
        if block.is_null() {
            let extend_size = cmp::max(asize, self.config.chunk_size);
            block = match self.extend_heap(extend_size) {
                Ok(block) => block,
                Err(err) => {
                    smverbose!("MALLOC: {}", err);
                    return ptr::null_mut();
                }
            };
        }

        self.place(block, asize);
        let mem = Block::to_mem(block);
        smverbose!("MALLOC: ret block[{:?}, {:x}]", block, Block::size(block));
        self.check_heap_state();
        mem
    }

    pub unsafe fn free(&mut self, mem: *mut u8) {
        if mem.is_null() {
            return;
        }
        smverbose!("{}", VERBOSE_DEL);
        smverbose!("FREE: mem={:?}", mem);

        let block = Block::from_mem(mem);
        smassert!(Block::is_alloc(block));
        let size = Block::size(block);
        Block::write_header(block, size, false);
        Block::write_footer(block, size, false);
        self.lists.insert(block);
        self.coalesce(block);
        self.check_heap_state();
    }

    pub unsafe fn realloc(&mut self, oldmem: *mut u8, size: usize) -> *mut u8 {
        smverbose!("{}", VERBOSE_DEL);
        smverbose!("REALLOC: oldmem={:?} size={:x}", oldmem, size);

        if size == 0 {
            self.free(oldmem);
            return ptr::null_mut();
        }
        if oldmem.is_null() {
            return self.malloc(size);
        }

        let newmem = self.malloc(size);
        if newmem.is_null() {
            return ptr::null_mut();
        }
        let copy_size = cmp::min(Block::payload_size(Block::from_mem(oldmem)), size);
        ptr::copy_nonoverlapping(oldmem, newmem, copy_size);
        self.free(oldmem);
        newmem
    }

    pub unsafe fn calloc(&mut self, elements: usize, size: usize) -> *mut u8 {
        let total = match elements.checked_mul(size) {
            Some(total) => total,
            None => {
                smverbose!("CALLOC: {:x} * {:x} overflows", elements, size);
                return ptr::null_mut();
            }
        };
        let mem = self.malloc(total);
        if !mem.is_null() {
            ptr::write_bytes(mem, 0, total);
        }
        mem
    }

    pub unsafe fn usable_size(&self, mem: *mut u8) -> usize {
        if mem.is_null() {
            return 0;
        }
        Block::payload_size(Block::from_mem(mem))
    }

    pub fn heap_size(&self) -> usize {
        self.source.heap_size()
    }

    /// Block size serving a request of `size` bytes: payload plus header and
    /// footer words, rounded to the alignment.
    fn adjust_request(&self, size: usize) -> Option<usize> {
        let asize = checked_align_up(size.checked_add(DSIZE)?, DSIZE)?;
        Some(cmp::max(asize, MIN_BLOCK_SIZE))
    }

    /// Grows the heap by `size` bytes (rounded to the alignment) and returns
    /// the resulting free block, merged with a free block before it if any.
    unsafe fn extend_heap(&mut self, size: usize) -> Result<*mut Block, OutOfMemory> {
        let size = checked_align_up(size, DSIZE).ok_or(OutOfMemory { requested: size })?;
        let mem = self.source.sbrk(size)?;
        smverbose!("EXTEND: new mem [{:?}, 0x{:x}]", mem, size);

        // The new block header takes the place of the old epilogue.
        let block = Block::from_mem(mem);
        smassert!(block == self.heap_epil);
        Block::write_header(block, size, false);
        Block::write_footer(block, size, false);
        self.lists.insert(block);

        let epilogue = Block::next(block);
        Block::write_header(epilogue, 0, true);
        self.heap_epil = epilogue;

        Ok(self.coalesce(block))
    }

    /// Merges a free block with its free physical neighbours. The result is
    /// linked into the tier matching its final size.
    unsafe fn coalesce(&mut self, block: *mut Block) -> *mut Block {
        if Block::is_alloc(block) {
            return block;
        }

        let prev_alloc = extract_alloc(Block::prev_footer(block));
        let next_alloc = Block::is_alloc(Block::next(block));
        let size = Block::size(block);

        let merged = match (prev_alloc, next_alloc) {
            (true, true) => {
                self.lists.remove(block);
                block
            }
            (true, false) => {
                let next = Block::next(block);
                let total = size + Block::size(next);
                self.lists.remove(next);
                self.lists.remove(block);
                Block::write_header(block, total, false);
                Block::write_footer(block, total, false);
                block
            }
            (false, true) => {
                let prev = Block::prev(block);
                let total = size + Block::size(prev);
                self.lists.remove(prev);
                self.lists.remove(block);
                Block::write_header(prev, total, false);
                Block::write_footer(prev, total, false);
                prev
            }
            (false, false) => {
                let prev = Block::prev(block);
                let next = Block::next(block);
                let total = size + Block::size(prev) + Block::size(next);
                self.lists.remove(prev);
                self.lists.remove(next);
                self.lists.remove(block);
                Block::write_header(prev, total, false);
                Block::write_footer(prev, total, false);
                prev
            }
        };

        smverbose!("COALESCE: block[{:?}] -> [{:?}, {:x}]", block, merged, Block::size(merged));
        self.lists.insert(merged);
        merged
    }

    /// Marks `asize` bytes at the start of a free block as allocated,
    /// splitting off the remainder when it can form a block of its own.
    unsafe fn place(&mut self, block: *mut Block, asize: usize) {
        let csize = Block::size(block);
        smassert!(csize >= asize);
        self.lists.remove(block);

        if csize - asize >= MIN_BLOCK_SIZE {
            Block::write_header(block, asize, true);
            Block::write_footer(block, asize, true);

            let rest = Block::next(block);
            Block::write_header(rest, csize - asize, false);
            Block::write_footer(rest, csize - asize, false);
            self.lists.insert(rest);
        } else {
            // Allocated blocks keep a footer too: it is what the next block
            // reads to learn that this one is in use.
            Block::write_header(block, csize, true);
            Block::write_footer(block, csize, true);
        }
    }

    /// Picks a free block of at least `asize` bytes, or null.
    ///
    /// Starts at the tier `asize` belongs to and only moves to larger tiers
    /// while the current one is empty.
    unsafe fn find_fit(&self, asize: usize) -> *mut Block {
        let start = self.lists.tier_for(asize);
        let tier = match (start..NTIERS).find(|&tier| !self.lists.is_empty(tier)) {
            Some(tier) => tier,
            None => return ptr::null_mut(),
        };

        let candidates = self.lists.iter(tier).map(Candidate::new);
        match self.policy.pick(candidates, asize, self.source.heap_size()) {
            Some(candidate) => candidate.block,
            None => ptr::null_mut(),
        }
    }

    /// Walks the whole heap and every free list, returning false on the
    /// first broken invariant. `tag` identifies the caller in the log.
    pub unsafe fn check_heap(&self, tag: u32) -> bool {
        match self.heap_violation() {
            None => true,
            Some(violation) => {
                smverbose!("CHECK HEAP ({}): {}", tag, violation);
                false
            }
        }
    }

    unsafe fn check_heap_state(&self) {
        if !SM_HEAP_CHECKS {
            return;
        }
        smassert!(self.heap_violation().is_none());
    }

    fn in_bounds(&self, block: *mut Block) -> bool {
        self.heap_prol < block && block <= self.heap_epil
    }

    unsafe fn heap_violation(&self) -> Option<&'static str> {
        if !self.is_initialized() {
            return None;
        }
        if Block::header(self.heap_prol) != pack(0, true) {
            return Some("prologue is not a zero sized allocated tag");
        }

        let mut free_blocks = 0;
        let mut block = self.heap_start;
        while Block::size(block) > 0 {
            if !self.in_bounds(block) {
                return Some("block outside heap bounds");
            }
            let size = Block::size(block);
            if size % DSIZE != 0 || size < MIN_BLOCK_SIZE {
                return Some("block size is misaligned or below minimum");
            }
            if !self.in_bounds(Block::next(block)) {
                return Some("block runs past the epilogue");
            }
            if Block::footer(block) != Block::header(block) {
                return Some("footer does not match header");
            }
            match Block::view(block) {
                BlockView::Allocated { payload } => {
                    if payload as usize % DSIZE != 0 {
                        return Some("payload is misaligned");
                    }
                }
                BlockView::Free { .. } => {
                    free_blocks += 1;
                    if !Block::is_alloc(Block::next(block)) {
                        return Some("two adjacent free blocks");
                    }
                }
            }
            block = Block::next(block);
        }

        if block != self.heap_epil {
            return Some("epilogue is not where the heap ends");
        }
        if Block::header(block) != pack(0, true) {
            return Some("epilogue is not a zero sized allocated tag");
        }

        let mut listed = 0;
        for tier in 0..NTIERS {
            let mut prev = ptr::null_mut();
            let mut node = self.lists.head(tier);
            while !node.is_null() {
                if !self.in_bounds(node) {
                    return Some("free list node outside heap bounds");
                }
                let (back, next) = match Block::view(node) {
                    BlockView::Free { prev, next } => (prev, next),
                    BlockView::Allocated { .. } => return Some("allocated block in free list"),
                };
                if Block::footer(node) != Block::header(node) {
                    return Some("free list node footer does not match header");
                }
                if self.lists.tier_for(Block::size(node)) != tier {
                    return Some("free block in the wrong tier");
                }
                if back != prev {
                    return Some("free list back link broken");
                }
                listed += 1;
                if listed > free_blocks {
                    return Some("free list holds blocks that are not in the heap");
                }
                prev = node;
                node = next;
            }
            if self.lists.tail(tier) != prev {
                return Some("free list tail is not the last node");
            }
        }
        if listed != free_blocks {
            return Some("free block missing from free lists");
        }
        None
    }
}
