//! Pending-candidate structures, one per traversal order

use super::{CandidateUrl, Strategy};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, VecDeque};

/// A candidate ranked for best-first traversal
///
/// Higher scores pop first; equal scores pop in discovery order.
#[derive(Debug)]
struct Ranked {
    seq: u64,
    candidate: CandidateUrl,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.candidate
            .score()
            .total_cmp(&other.candidate.score())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Candidates waiting for admission
#[derive(Debug)]
pub(crate) enum PendingQueue {
    /// FIFO per depth level
    Levels(BTreeMap<u32, VecDeque<CandidateUrl>>),

    /// LIFO stack
    Stack(Vec<CandidateUrl>),

    /// Max-heap on score
    Heap { heap: BinaryHeap<Ranked>, seq: u64 },
}

impl PendingQueue {
    pub(crate) fn new(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Bfs => Self::Levels(BTreeMap::new()),
            Strategy::Dfs => Self::Stack(Vec::new()),
            Strategy::BestFirst => Self::Heap {
                heap: BinaryHeap::new(),
                seq: 0,
            },
        }
    }

    /// Enqueues a batch of siblings in discovery order
    ///
    /// For the stack the batch is pushed reversed so the first sibling is
    /// popped first.
    pub(crate) fn push_batch(&mut self, batch: Vec<CandidateUrl>) {
        match self {
            Self::Levels(levels) => {
                for candidate in batch {
                    levels
                        .entry(candidate.depth())
                        .or_default()
                        .push_back(candidate);
                }
            }
            Self::Stack(stack) => stack.extend(batch.into_iter().rev()),
            Self::Heap { heap, seq } => {
                for candidate in batch {
                    heap.push(Ranked {
                        seq: *seq,
                        candidate,
                    });
                    *seq += 1;
                }
            }
        }
    }

    /// Pops the next candidate
    ///
    /// `depth_limit` only constrains the level queues: the shallowest level is
    /// popped only if its depth is within the limit.
    pub(crate) fn pop(&mut self, depth_limit: Option<u32>) -> Option<CandidateUrl> {
        match self {
            Self::Levels(levels) => {
                let mut entry = levels.first_entry()?;
                if depth_limit.is_some_and(|limit| *entry.key() > limit) {
                    return None;
                }
                let candidate = entry.get_mut().pop_front();
                if entry.get().is_empty() {
                    entry.remove();
                }
                candidate
            }
            Self::Stack(stack) => stack.pop(),
            Self::Heap { heap, .. } => heap.pop().map(|r| r.candidate),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Levels(levels) => levels.values().map(VecDeque::len).sum(),
            Self::Stack(stack) => stack.len(),
            Self::Heap { heap, .. } => heap.len(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every pending candidate, in pop order
    pub(crate) fn drain(&mut self) -> Vec<CandidateUrl> {
        let mut drained = Vec::with_capacity(self.len());
        while let Some(candidate) = self.pop(None) {
            drained.push(candidate);
        }
        drained
    }
}
