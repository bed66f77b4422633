//! Aggregate traits and optimistic versioning for commerce records.

use crate::error::{DomainError, DomainResult};

/// A record with identity and a monotonically increasing version.
///
/// Carts, orders, rentals and stock records are all versioned; every persisted
/// write bumps the version so concurrent writers can detect each other.
pub trait AggregateRoot {
    /// Strongly-typed record identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Number of events applied to this record since it was created.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// The record must not exist yet.
    Absent,
    /// The persisted record must be at exactly this version.
    Exact(u64),
}

impl ExpectedVersion {
    /// `actual` is `None` when no record is persisted under the key.
    pub fn matches(self, actual: Option<u64>) -> bool {
        match (self, actual) {
            (ExpectedVersion::Any, _) => true,
            (ExpectedVersion::Absent, None) => true,
            (ExpectedVersion::Exact(v), Some(found)) => v == found,
            _ => false,
        }
    }

    pub fn check(self, actual: Option<u64>) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual:?})"
            )))
        }
    }
}

/// Decide/evolve split for state machines.
///
/// - `handle(&self, cmd)` validates a command against the current state and
///   returns the events it would produce. It never mutates.
/// - `apply(&mut self, event)` evolves state and bumps the version.
///
/// An empty event list from `handle` means the command was a no-op against the
/// current state (e.g. a repeated payment callback).
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}
