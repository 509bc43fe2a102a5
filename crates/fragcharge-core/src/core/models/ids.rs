use serde::Serialize;
use std::fmt;

/// Stable identity of an atom within a [`Structure`](super::structure::Structure).
///
/// The wrapped value is the atom's zero-based position in global iteration
/// order, so ids sort in the same order the atoms were read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AtomId(usize);

impl AtomId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
