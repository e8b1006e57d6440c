//! Fan-in counter for fan-out load stages.

use serde::{Deserialize, Serialize};

/// Result of recording progress on a [`PendingWorkCounter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Still waiting on outstanding work.
    Pending,
    /// This call satisfied the counter. Reported to exactly one caller.
    Satisfied,
    /// The counter was already satisfied; the caller must not transition.
    AlreadySatisfied,
}

impl Progress {
    #[inline]
    pub fn just_satisfied(self) -> bool {
        matches!(self, Progress::Satisfied)
    }
}

/// `(completed, total)` pair. `completed` never exceeds `total`, and `total` shrinks when
/// a unit of work is abandoned so satisfaction stays reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWorkCounter {
    completed: usize,
    total: usize,
    fired: bool,
}

impl PendingWorkCounter {
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
            fired: false,
        }
    }

    #[inline]
    pub fn completed(&self) -> usize {
        self.completed
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    #[inline]
    pub fn is_satisfied(&self) -> bool {
        self.completed >= self.total
    }

    /// Zero-work stages are satisfied immediately; this claims that satisfaction once.
    pub fn claim_if_empty(&mut self) -> Progress {
        if self.total == 0 {
            self.fire()
        } else {
            Progress::Pending
        }
    }

    /// One unit finished successfully.
    pub fn record_completion(&mut self) -> Progress {
        if self.fired {
            return Progress::AlreadySatisfied;
        }
        if self.completed < self.total {
            self.completed += 1;
        }
        self.check()
    }

    /// One unit will never finish; drop it from the total.
    pub fn abandon(&mut self) -> Progress {
        if self.fired {
            return Progress::AlreadySatisfied;
        }
        if self.total > self.completed {
            self.total -= 1;
        }
        self.check()
    }

    fn check(&mut self) -> Progress {
        if self.is_satisfied() {
            self.fire()
        } else {
            Progress::Pending
        }
    }

    fn fire(&mut self) -> Progress {
        if self.fired {
            Progress::AlreadySatisfied
        } else {
            self.fired = true;
            Progress::Satisfied
        }
    }
}
