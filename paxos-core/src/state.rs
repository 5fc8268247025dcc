//! In-memory node state and its mutators (spec.md §3's `NodeState`, and the
//! "Lenses / state updaters" component of spec.md §2).
//!
//! The original design expresses these mutators as immutable lenses over a
//! `PaxosData` value (design note §9); here, following the teacher's own style in
//! `omnipaxos::util::LeaderState`, they are plain `&mut self` methods on a single
//! owned `NodeState`. The event loop owns exactly one `NodeState` per node and never
//! observes it mid-mutation across an event boundary.

use std::collections::BTreeMap;

use crate::{
    ballot::BallotNumber,
    ids::{LogIndex, NodeMap, SlotId},
    messages::{ClientHandle, CommandBytes},
    storage::{Accept, Progress},
};

/// One peer's reply to a `Prepare`, retained so the recovery value-choice rule
/// (spec.md §4.6) can be applied once a slot reaches majority.
#[derive(Clone, Debug)]
pub enum PrepareVote {
    Ack {
        progress: Progress,
        highest_accepted_index: LogIndex,
        leader_heartbeat: i64,
        accepted_value: Option<Accept>,
    },
    Nack {
        progress: Progress,
        highest_accepted_index: LogIndex,
        leader_heartbeat: i64,
    },
}

/// One peer's reply to an `Accept`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AcceptVote {
    Ack,
    Nack,
}

/// Bookkeeping for one outstanding `Accept` round: the proposal itself, a resend
/// deadline, and the votes gathered so far.
#[derive(Clone, Debug)]
pub struct AcceptTracking {
    pub timeout: i64,
    pub accept: Accept,
    pub votes: NodeMap<AcceptVote>,
}

impl AcceptTracking {
    pub fn ack_count(&self) -> usize {
        self.votes
            .values()
            .filter(|v| matches!(v, AcceptVote::Ack))
            .count()
    }

    pub fn nack_count(&self) -> usize {
        self.votes
            .values()
            .filter(|v| matches!(v, AcceptVote::Nack))
            .count()
    }
}

/// The node's in-memory state (spec.md §3's `NodeState`). `progress` mirrors what is
/// durably recorded; every path that mutates it here must have already durably
/// `save`d the same value first.
#[derive(Clone, Debug, Default)]
pub struct NodeState {
    pub progress: Progress,
    pub leader_heartbeat: i64,
    pub timeout: i64,
    /// `None` for a slot already committed during recovery: a tombstone keeping the
    /// slot out of further probe/recovery bookkeeping without dropping the key.
    pub prepare_responses: BTreeMap<SlotId, Option<NodeMap<PrepareVote>>>,
    pub epoch: Option<BallotNumber>,
    pub accept_responses: BTreeMap<SlotId, AcceptTracking>,
    pub client_commands: BTreeMap<SlotId, (CommandBytes, ClientHandle)>,
}

impl NodeState {
    pub fn new(progress: Progress, timeout: i64) -> Self {
        Self {
            progress,
            leader_heartbeat: 0,
            timeout,
            prepare_responses: BTreeMap::new(),
            epoch: None,
            accept_responses: BTreeMap::new(),
            client_commands: BTreeMap::new(),
        }
    }

    /// Raises the in-memory promise watermark. Callers must durably `save` the same
    /// `Progress` first; this only updates the cached copy.
    pub fn set_highest_promised(&mut self, n: BallotNumber) {
        self.progress.highest_promised = n;
    }

    pub fn set_highest_committed(&mut self, id: SlotId) {
        self.progress.highest_committed = id;
    }

    /// Takes the client commands, handing ownership to the caller so it can notify
    /// each one (e.g. with `NotLeader` or a "no longer leader" failure) without
    /// holding `&mut self` borrowed.
    pub fn drain_client_commands(&mut self) -> BTreeMap<SlotId, (CommandBytes, ClientHandle)> {
        std::mem::take(&mut self.client_commands)
    }

    pub fn clear_prepare_tracking(&mut self) {
        self.prepare_responses.clear();
    }

    pub fn is_probing(&self) -> bool {
        !self.prepare_responses.is_empty()
    }

    pub fn next_accept_log_index(&self, highest_committed_log_index: LogIndex) -> LogIndex {
        let highest_tracked = self
            .accept_responses
            .keys()
            .map(|id| id.log_index)
            .max()
            .unwrap_or(LogIndex::MIN);
        highest_tracked.max(highest_committed_log_index) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeId;

    #[test]
    fn next_accept_log_index_considers_both_watermarks() {
        let mut s = NodeState::new(Progress::default(), 100);
        assert_eq!(s.next_accept_log_index(5), 6);
        s.accept_responses.insert(
            SlotId::new(NodeId::new(1), BallotNumber::new(1, NodeId::new(1)), 9),
            AcceptTracking {
                timeout: 0,
                accept: Accept {
                    id: SlotId::new(NodeId::new(1), BallotNumber::new(1, NodeId::new(1)), 9),
                    value: vec![],
                },
                votes: NodeMap::default(),
            },
        );
        assert_eq!(s.next_accept_log_index(5), 10);
    }
}
