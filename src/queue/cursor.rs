//! Read cursor over the two traversal tiers of a router
//!
//! Sub-queues are read prioritized tier first, in ascending read priority,
//! then unprioritized tier in declaration order. The cursor keeps one
//! position per tier: resetting it only rewinds the prioritized tier, the
//! unprioritized position is fairness state carried across resets.

/// Sizes of the two traversal tiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tiers {
    pub prioritized: usize,
    pub unprioritized: usize,
}

impl Tiers {
    pub fn new(prioritized: usize, unprioritized: usize) -> Self {
        Self {
            prioritized,
            unprioritized,
        }
    }

    pub fn total(&self) -> usize {
        self.prioritized + self.unprioritized
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Position of a cursor, resolved against the tier sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorPosition {
    Prioritized(usize),
    Unprioritized(usize),
}

impl CursorPosition {
    /// Position in the concatenation `prioritized ++ unprioritized`
    pub fn logical_index(self, tiers: Tiers) -> usize {
        match self {
            CursorPosition::Prioritized(i) => i,
            CursorPosition::Unprioritized(j) => tiers.prioritized + j,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadCursor {
    prioritized: usize,
    unprioritized: usize,
}

impl ReadCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position; `None` only when both tiers are empty
    pub fn position(&self, tiers: Tiers) -> Option<CursorPosition> {
        if self.prioritized < tiers.prioritized {
            Some(CursorPosition::Prioritized(self.prioritized))
        } else if self.unprioritized < tiers.unprioritized {
            Some(CursorPosition::Unprioritized(self.unprioritized))
        } else if tiers.prioritized > 0 {
            Some(CursorPosition::Prioritized(0))
        } else {
            None
        }
    }

    pub fn logical_index(&self, tiers: Tiers) -> usize {
        self.position(tiers)
            .map(|position| position.logical_index(tiers))
            .unwrap_or(0)
    }

    /// Move to the next sub-queue
    ///
    /// Past the prioritized tier the cursor enters the unprioritized tier at
    /// its remembered position; past the unprioritized tier both positions
    /// wrap back to the start.
    pub fn advance(&mut self, tiers: Tiers) {
        if self.prioritized < tiers.prioritized {
            self.prioritized += 1;
            if self.prioritized == tiers.prioritized && tiers.unprioritized == 0 {
                self.rewind();
            }
        } else {
            self.unprioritized += 1;
            if self.unprioritized >= tiers.unprioritized {
                self.rewind();
            }
        }
    }

    /// Back to the first prioritized sub-queue, keeping the unprioritized position
    pub fn reset(&mut self) {
        self.prioritized = 0;
    }

    /// Back to the very start of both tiers
    pub fn rewind(&mut self) {
        self.prioritized = 0;
        self.unprioritized = 0;
    }

    pub fn unprioritized_position(&self) -> usize {
        self.unprioritized
    }
}
