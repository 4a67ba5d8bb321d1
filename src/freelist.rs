//! Segregated free lists.
//!
//! Free blocks are kept in `NTIERS` independent doubly linked lists chosen
//! by block size. The tier of a block is always computed from the size in
//! its header at the moment of the call, so a block must be removed before
//! its header is rewritten with a different size.

use core::ptr;

use crate::block::{Block, MIN_BLOCK_SIZE};
use crate::smassert;

pub const NTIERS: usize = 3;

pub struct SegLists {
    heads: [*mut Block; NTIERS],
    tails: [*mut Block; NTIERS],
    /// Smallest block size of tiers 1 and 2. Tier 0 starts at the minimum
    /// block size.
    bounds: [usize; NTIERS - 1],
}

impl SegLists {
    pub const fn new(bounds: [usize; NTIERS - 1]) -> SegLists {
        SegLists {
            heads: [ptr::null_mut(); NTIERS],
            tails: [ptr::null_mut(); NTIERS],
            bounds,
        }
    }

    /// Drops every list; the blocks themselves are left untouched.
    pub fn clear(&mut self) {
        self.heads = [ptr::null_mut(); NTIERS];
        self.tails = [ptr::null_mut(); NTIERS];
    }

    pub fn tier_for(&self, size: usize) -> usize {
        smassert!(size >= MIN_BLOCK_SIZE);
        if size < self.bounds[0] {
            0
        } else if size < self.bounds[1] {
            1
        } else {
            2
        }
    }

    pub fn head(&self, tier: usize) -> *mut Block {
        self.heads[tier]
    }

    pub fn tail(&self, tier: usize) -> *mut Block {
        self.tails[tier]
    }

    pub fn is_empty(&self, tier: usize) -> bool {
        self.heads[tier].is_null()
    }

    pub fn iter(&self, tier: usize) -> Iter {
        Iter {
            cur: self.heads[tier],
        }
    }

    /// Pushes a free block at the head of the tier matching its current size.
    pub unsafe fn insert(&mut self, block: *mut Block) {
        if block.is_null() || Block::is_alloc(block) {
            return;
        }
        let tier = self.tier_for(Block::size(block));
        let head = self.heads[tier];
        if head.is_null() {
            Block::clear_free_links(block);
            self.tails[tier] = block;
        } else {
            Block::set_free_links(block, ptr::null_mut(), head);
            Block::set_free_prev(head, block);
        }
        self.heads[tier] = block;
    }

    /// Unlinks a free block from the tier matching its current size.
    ///
    /// Does nothing for allocated blocks and for blocks that are not linked
    /// into that tier.
    pub unsafe fn remove(&mut self, block: *mut Block) {
        if block.is_null() || Block::is_alloc(block) {
            return;
        }
        let tier = self.tier_for(Block::size(block));
        let head = self.heads[tier];
        let tail = self.tails[tier];
        if head.is_null() {
            return;
        }

        let prev = Block::free_prev(block);
        let next = Block::free_next(block);
        if (prev.is_null() && block != head) || (next.is_null() && block != tail) {
            return;
        }

        if head == tail {
            self.heads[tier] = ptr::null_mut();
            self.tails[tier] = ptr::null_mut();
        } else if block == head {
            self.heads[tier] = next;
            Block::set_free_prev(next, ptr::null_mut());
        } else if block == tail {
            self.tails[tier] = prev;
            Block::set_free_next(prev, ptr::null_mut());
        } else {
            Block::set_free_prev(next, prev);
            Block::set_free_next(prev, next);
        }
        Block::clear_free_links(block);
    }
}

/// Walks one tier from head to tail.
pub struct Iter {
    cur: *mut Block,
}

impl Iterator for Iter {
    type Item = *mut Block;

    fn next(&mut self) -> Option<*mut Block> {
        if self.cur.is_null() {
            return None;
        }
        let block = self.cur;
        self.cur = unsafe { Block::free_next(block) };
        Some(block)
    }
}
