use serde::{Deserialize, Serialize};
use std::fmt;

/// Position ID, sequential within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Monotonic ID generator. One per run, so IDs are deterministic.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    next_position: u64,
}

impl IdGen {
    pub fn next_position_id(&mut self) -> PositionId {
        self.next_position += 1;
        PositionId(self.next_position)
    }
}
