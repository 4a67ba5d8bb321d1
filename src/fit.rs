//! Fit policies: how a free block is picked out of one tier.

use crate::block::Block;

/// Nodes scanned by the default [`NthFit`] policy.
pub const FIT_WINDOW: usize = 20;

/// A free block offered to a [`FitPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub(crate) block: *mut Block,
    size: usize,
}

impl Candidate {
    pub(crate) fn new(block: *mut Block) -> Candidate {
        Candidate {
            block,
            size: unsafe { Block::size(block) },
        }
    }

    /// Full size of the free block, boundary tags included.
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Chooses a block for a request of `asize` bytes among the candidates of
/// one free-list tier, given in list order.
///
/// `upper` is a bound no candidate leftover can reach (the heap extent);
/// policies that minimize leftover start from it.
pub trait FitPolicy {
    /// Returns the chosen candidate, or `None` when none of the inspected
    /// candidates can hold `asize` bytes.
    fn pick<I>(&self, candidates: I, asize: usize, upper: usize) -> Option<Candidate>
    where
        I: Iterator<Item = Candidate>;
}

/// Bounded best fit: scan at most `window` nodes from the head and keep the
/// one leaving the smallest remainder. The first of equally good blocks wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NthFit {
    /// Maximum number of list nodes inspected per search.
    pub window: usize,
}

impl Default for NthFit {
    fn default() -> NthFit {
        NthFit { window: FIT_WINDOW }
    }
}

impl FitPolicy for NthFit {
    fn pick<I>(&self, candidates: I, asize: usize, upper: usize) -> Option<Candidate>
    where
        I: Iterator<Item = Candidate>,
    {
        best_of(candidates.take(self.window), asize, upper)
    }
}

/// Unbounded best fit over the whole tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BestFit;

impl FitPolicy for BestFit {
    fn pick<I>(&self, candidates: I, asize: usize, upper: usize) -> Option<Candidate>
    where
        I: Iterator<Item = Candidate>,
    {
        best_of(candidates, asize, upper)
    }
}

/// First block large enough, in list order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirstFit;

impl FitPolicy for FirstFit {
    fn pick<I>(&self, mut candidates: I, asize: usize, _upper: usize) -> Option<Candidate>
    where
        I: Iterator<Item = Candidate>,
    {
        candidates.find(|c| c.size() >= asize)
    }
}

fn best_of<I>(candidates: I, asize: usize, upper: usize) -> Option<Candidate>
where
    I: Iterator<Item = Candidate>,
{
    let mut min_diff = upper;
    let mut best = None;
    for candidate in candidates {
        if candidate.size() < asize {
            continue;
        }
        let diff = candidate.size() - asize;
        if diff < min_diff {
            min_diff = diff;
            best = Some(candidate);
        }
    }
    best
}
