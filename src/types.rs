//! Type-safe wrappers for network variables and pool literals.
//!
//! This module provides newtype wrappers that enforce compile-time distinction
//! between network-variable indices and propositional literals, preventing
//! common mistakes when the two kinds of "variable" meet in encoding code.

use std::fmt;
use std::ops::Neg;

/// An index into the network arena (0-indexed).
///
/// Network variables are identified by their position in the
/// [`BayesianNetwork`][crate::network::BayesianNetwork] arena. Parent sets
/// are stored as lists of `VarId`s rather than live references, so the
/// acyclic parent graph never forms ownership cycles.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VarId(u32);

impl VarId {
    /// Creates a new arena index.
    pub fn new(index: u32) -> Self {
        VarId(index)
    }

    /// Returns the raw index as a `u32`.
    pub fn id(self) -> u32 {
        self.0
    }

    /// Returns the index as a `usize`, for arena access.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<VarId> for u32 {
    fn from(var: VarId) -> Self {
        var.0
    }
}

/// A signed propositional literal over pool identifiers.
///
/// Pool identifiers are 1-indexed (0 is reserved), so a literal maps directly
/// to its DIMACS representation: positive for the proposition, negative for
/// its negation.
///
/// # Invariants
///
/// - The underlying pool identifier is >= 1.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Lit(i32);

impl Lit {
    /// Creates a positive literal for the given pool identifier.
    ///
    /// # Panics
    ///
    /// Panics if `id == 0`. Pool identifiers are 1-indexed.
    pub fn positive(id: u32) -> Self {
        assert_ne!(id, 0, "Pool identifiers must be >= 1");
        Lit(id as i32)
    }

    /// Creates a negative literal for the given pool identifier.
    ///
    /// # Panics
    ///
    /// Panics if `id == 0`. Pool identifiers are 1-indexed.
    pub fn negative(id: u32) -> Self {
        assert_ne!(id, 0, "Pool identifiers must be >= 1");
        Lit(-(id as i32))
    }

    /// Builds a literal from its DIMACS representation.
    ///
    /// # Panics
    ///
    /// Panics if `value == 0` (0 terminates a DIMACS clause, it is not a literal).
    pub fn from_dimacs(value: i32) -> Self {
        assert_ne!(value, 0, "DIMACS literals must be nonzero");
        Lit(value)
    }

    /// Returns the pool identifier this literal mentions.
    pub fn var(self) -> u32 {
        self.0.unsigned_abs()
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Returns the signed DIMACS representation.
    pub fn to_dimacs(self) -> i32 {
        self.0
    }
}

impl Neg for Lit {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Lit(-self.0)
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
