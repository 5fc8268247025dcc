use std::cmp::Ordering;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ids::NodeId;

/// A ballot number: the ordered pair `(counter, node_id)` used to totally order
/// proposal rounds across the cluster.
///
/// Uniqueness across nodes is guaranteed by embedding the node id in the ballot
/// itself: two different nodes can never mint the same ballot, so whichever node's
/// ballot compares greater is unambiguously the more senior proposer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BallotNumber {
    pub counter: u64,
    pub node_id: NodeId,
}

impl BallotNumber {
    /// The smallest possible ballot number. No real proposer ever holds a promise
    /// below this value; it is also the ballot carried by a min-prepare probe.
    pub const BOTTOM: BallotNumber = BallotNumber {
        counter: 0,
        node_id: NodeId::BOTTOM,
    };

    pub fn new(counter: u64, node_id: NodeId) -> Self {
        Self { counter, node_id }
    }

    /// A ballot strictly greater than `self`, minted for `node_id`.
    pub fn next_for(self, node_id: NodeId) -> Self {
        BallotNumber {
            counter: self.counter + 1,
            node_id,
        }
    }
}

/// Ordered lexicographically by `counter` then `node_id`.
impl Ord for BallotNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.counter
            .cmp(&other.counter)
            .then_with(|| self.node_id.cmp(&other.node_id))
    }
}

impl PartialOrd for BallotNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_counter_then_node() {
        let a = BallotNumber::new(1, NodeId::new(5));
        let b = BallotNumber::new(1, NodeId::new(9));
        let c = BallotNumber::new(2, NodeId::new(1));
        assert!(a < b);
        assert!(b < c);
        assert!(BallotNumber::BOTTOM < a);
    }

    #[test]
    fn next_for_always_increases() {
        let n = BallotNumber::new(3, NodeId::new(2));
        let next = n.next_for(NodeId::new(7));
        assert!(next > n);
        assert_eq!(next.counter, 4);
        assert_eq!(next.node_id, NodeId::new(7));
    }
}
