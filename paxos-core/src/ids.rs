use std::cmp::Ordering;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ballot::BallotNumber;

/// The id of a cluster member. Dense, small, non-hashed integers so that
/// `nohash_hasher::IntMap` can be used for per-node bookkeeping without paying for a
/// general-purpose hash.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(pub u64);

impl NodeId {
    pub const BOTTOM: NodeId = NodeId(0);

    pub fn new(id: u64) -> Self {
        NodeId(id)
    }
}

impl nohash_hasher::IsEnabled for NodeId {}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        NodeId(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A map keyed by [`NodeId`], backed by `nohash_hasher::IntMap` since node ids are
/// already small dense integers and gain nothing from a cryptographic hash.
pub type NodeMap<T> = std::collections::HashMap<NodeId, T, nohash_hasher::BuildNoHashHasher<NodeId>>;

/// The position of a slot in the replicated log. `i64` so that arithmetic such as
/// `committed.log_index + 1` cannot silently wrap for a freshly booted node whose
/// watermark starts below zero conceptually (we use `-1` as "nothing committed yet").
pub type LogIndex = i64;

/// `SlotId` (a.k.a. "Identifier" in the literature): the triple `(from, number,
/// log_index)` naming a single Paxos instance. `from` names the proposer that minted
/// the id; ordered maps keyed by `SlotId` order by `log_index` alone.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlotId {
    pub from: NodeId,
    pub number: BallotNumber,
    pub log_index: LogIndex,
}

impl SlotId {
    pub fn new(from: NodeId, number: BallotNumber, log_index: LogIndex) -> Self {
        Self {
            from,
            number,
            log_index,
        }
    }

    /// The sentinel id carried by a min-prepare liveness probe: `log_index =
    /// LogIndex::MIN`, ballot `BallotNumber::BOTTOM`. Never a promise-raising
    /// prepare; routed only through the probe path (§9 open question).
    pub fn min_prepare(from: NodeId) -> Self {
        Self {
            from,
            number: BallotNumber::BOTTOM,
            log_index: LogIndex::MIN,
        }
    }

    pub fn is_min_prepare(&self) -> bool {
        self.log_index == LogIndex::MIN
    }
}

/// `SlotId`s compare by `log_index` only: this is the ordering `BTreeMap<SlotId, _>`
/// tables rely on to walk slots in log order.
impl Ord for SlotId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.log_index.cmp(&other.log_index)
    }
}

impl PartialOrd for SlotId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
