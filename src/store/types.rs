use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable index of a variable inside one `Tree` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct VarId(pub u32);

impl VarId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

/// Stable index of an equation inside one `Tree` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct EqId(pub u32);

impl EqId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

/// Inclusive range of program releases in which an item is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReleaseRange {
    pub from: u32,
    pub thru: u32,
}

impl ReleaseRange {
    pub const ALWAYS: ReleaseRange = ReleaseRange { from: 0, thru: u32::MAX };

    pub fn new(from: u32, thru: u32) -> Self { Self { from, thru } }

    #[inline]
    pub fn contains(&self, release: u32) -> bool {
        self.from <= release && release <= self.thru
    }
}

impl Default for ReleaseRange {
    fn default() -> Self { Self::ALWAYS }
}

impl fmt::Display for ReleaseRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..={}]", self.from, self.thru)
    }
}

/// The unit system applied to every continuous variable at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitsSet {
    Native,
    English,
    Metric,
}
