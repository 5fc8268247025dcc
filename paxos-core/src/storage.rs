//! The journal contract (spec.md §3/§6). The core never performs I/O itself: it is
//! handed an implementation of [`Storage`] and trusts its durability guarantee —
//! every call returns only after the write has actually reached stable media.
//!
//! Concrete implementations (an in-memory map for tests, a RocksDB-backed engine for
//! production) live in the sibling `paxos-storage` crate, exactly as `omnipaxos`
//! separates its `Storage` trait from `omnipaxos_storage`'s implementations.

use crate::{
    ballot::BallotNumber,
    ids::{LogIndex, SlotId},
    messages::CommandBytes,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A value the node has durably recorded as accepted for a slot: the id of the
/// Paxos round that produced it, and the command bytes themselves.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Accept {
    pub id: SlotId,
    pub value: CommandBytes,
}

/// The durable watermark record (spec.md §3).
///
/// Invariant P1: `highest_committed.number <= highest_promised`.
/// Invariant P2: both fields are monotonically non-decreasing over the node's
/// lifetime; a regression on save is a bug (see [`crate::error::Error::InvariantViolation`]).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Progress {
    pub highest_promised: BallotNumber,
    pub highest_committed: SlotId,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            highest_promised: BallotNumber::BOTTOM,
            highest_committed: SlotId::new(Default::default(), BallotNumber::BOTTOM, -1),
        }
    }
}

impl Progress {
    /// Checks invariant P2 against a candidate successor. Does not itself guard
    /// against non-monotonic commits at equal ballot; callers only call this when
    /// about to persist a genuinely new value.
    pub fn is_monotonic_successor(&self, next: &Progress) -> bool {
        next.highest_promised >= self.highest_promised
            && next.highest_committed.log_index >= self.highest_committed.log_index
    }
}

/// Errors a [`Storage`] implementation may surface. The core treats every variant as
/// fatal: per spec.md §7, a durability failure propagates as fatal and the core must
/// not send any message that depended on it.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("durable write failed: {0}")]
    WriteFailed(String),
    #[error("durable read failed: {0}")]
    ReadFailed(String),
}

/// The journal contract. All writes must be durable before the call returns; the
/// core assumes no transactional guarantees beyond per-call durability (spec.md §3).
pub trait Storage {
    /// Loads the durable `Progress` record, or the default (nothing promised, nothing
    /// committed) on a cold start with an empty journal.
    fn load(&self) -> Result<Progress, StorageError>;

    /// Durably persists a new `Progress`. Must happen-before any message that depends
    /// on it being visible.
    fn save(&mut self, progress: Progress) -> Result<(), StorageError>;

    /// Durably records `accept` as the last accepted value for `accept.id.log_index`,
    /// overwriting any value previously stored for that slot.
    fn accept(&mut self, accept: Accept) -> Result<(), StorageError>;

    /// The last accepted value for `log_index`, if any.
    fn accepted(&self, log_index: LogIndex) -> Result<Option<Accept>, StorageError>;

    /// `(min, max)` log indices for which an accepted value is stored, or `None` if
    /// the journal holds no accepted values at all.
    fn bounds(&self) -> Result<Option<(LogIndex, LogIndex)>, StorageError>;
}
