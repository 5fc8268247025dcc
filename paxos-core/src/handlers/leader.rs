//! Leader-specific handlers: heartbeat broadcast and client command intake
//! (spec.md §4.9).

use crate::{
    clock::Random,
    core::{Effects, PaxosCore},
    error::{Error, Result},
    ids::{LogIndex, NodeId, NodeMap, SlotId},
    messages::{ClientHandle, CommandBytes, Message, MsgId},
    role::Role,
    state::{AcceptTracking, AcceptVote},
    storage::{Accept, Storage},
};

impl<S: Storage, R: Random> PaxosCore<S, R> {
    pub(crate) fn dispatch_heartbeat(&mut self, now: i64) -> Result<Effects> {
        let mut effects = Effects::default();
        if self.role != Role::Leader {
            return Ok(effects);
        }
        effects.broadcast(Message::Commit {
            highest_committed: self.state.progress.highest_committed,
            heartbeat: now,
        });
        Ok(effects)
    }

    pub(crate) fn handle_command_value(
        &mut self,
        from: NodeId,
        msg_id: MsgId,
        bytes: CommandBytes,
    ) -> Result<Effects> {
        let mut effects = Effects::default();

        if self.role != Role::Leader {
            effects.unicast(
                from,
                Message::NotLeader {
                    node_id: self.node_id,
                    msg_id,
                },
            );
            return Ok(effects);
        }

        // Invariant L1: a Leader always has an epoch not exceeded by its own
        // promise. Violated only if this node should already have backed down.
        let epoch = self
            .state
            .epoch
            .ok_or(Error::InvariantViolation("leader has no epoch"))?;
        if self.state.progress.highest_promised > epoch {
            return Err(Error::InvariantViolation(
                "leader's highest_promised exceeds its own epoch",
            ));
        }

        let next_log_index = self
            .state
            .next_accept_log_index(self.state.progress.highest_committed.log_index);
        if next_log_index == LogIndex::MAX {
            // The log cannot grow further; reject rather than mint an id that would
            // overflow the next time around (spec.md §8 boundary behavior).
            effects.unicast(
                from,
                Message::NotLeader {
                    node_id: self.node_id,
                    msg_id,
                },
            );
            return Ok(effects);
        }

        let id = SlotId::new(self.node_id, epoch, next_log_index);
        let accept = Accept { id, value: bytes };
        self.storage.accept(accept.clone())?;

        self.state.client_commands.insert(
            id,
            (accept.value.clone(), ClientHandle { from, msg_id }),
        );

        let mut votes = NodeMap::default();
        votes.insert(self.node_id, AcceptVote::Ack);
        self.state.accept_responses.insert(
            id,
            AcceptTracking {
                timeout: self.state.timeout,
                accept: accept.clone(),
                votes,
            },
        );

        if self.config.is_quorum(1) {
            // A lone node's self-ack already satisfies quorum: commit immediately
            // rather than wait for peers that don't exist (spec.md §8: "cluster
            // size 1, every proposal commits on self-ack").
            self.advance_committed_prefix(&mut effects)?;
            return Ok(effects);
        }

        effects.broadcast(Message::Accept {
            id,
            value: accept.value,
        });
        Ok(effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ballot::BallotNumber, test_support::test_core};

    #[test]
    fn non_leader_rejects_command() {
        let mut c = test_core(3);
        let effects = c.handle_command_value(NodeId::new(9), MsgId(1), vec![1]).unwrap();
        match &effects.outbound[0] {
            crate::messages::Outbound::Unicast {
                message: Message::NotLeader { .. },
                ..
            } => {}
            other => panic!("expected NotLeader, got {other:?}"),
        }
    }

    #[test]
    fn leader_mints_accept_and_tracks_client() {
        let mut c = test_core(3);
        c.role = Role::Leader;
        let epoch = BallotNumber::new(1, c.node_id());
        c.state.epoch = Some(epoch);
        c.state.progress.highest_promised = epoch;

        let effects = c.handle_command_value(NodeId::new(9), MsgId(5), vec![7]).unwrap();
        assert_eq!(effects.outbound.len(), 1);
        let id = SlotId::new(c.node_id(), epoch, 0);
        assert!(c.state.accept_responses.contains_key(&id));
        assert!(c.state.client_commands.contains_key(&id));
        assert_eq!(c.storage.accepted(0).unwrap().unwrap().value, vec![7]);
    }

    #[test]
    fn solo_cluster_commits_on_self_ack() {
        let mut c = crate::test_support::test_core_for(NodeId::new(1), 1);
        c.role = Role::Leader;
        let epoch = BallotNumber::new(1, c.node_id());
        c.state.epoch = Some(epoch);
        c.state.progress.highest_promised = epoch;

        let effects = c.handle_command_value(NodeId::new(9), MsgId(5), vec![7]).unwrap();
        assert!(effects.outbound.is_empty());
        assert_eq!(effects.deliveries.len(), 1);
        assert_eq!(effects.client_replies.len(), 1);
        assert_eq!(c.state.progress.highest_committed.log_index, 0);
    }

    #[test]
    fn leader_with_violated_invariant_errs() {
        let mut c = test_core(3);
        c.role = Role::Leader;
        c.state.epoch = None;
        let err = c.handle_command_value(NodeId::new(9), MsgId(1), vec![1]).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn heartbeat_broadcasts_commit_only_as_leader() {
        let mut c = test_core(3);
        assert!(c.dispatch_heartbeat(10).unwrap().outbound.is_empty());
        c.role = Role::Leader;
        let effects = c.dispatch_heartbeat(10).unwrap();
        match &effects.outbound[0] {
            crate::messages::Outbound::Broadcast {
                message: Message::Commit { heartbeat, .. },
            } => assert_eq!(*heartbeat, 10),
            other => panic!("expected Commit broadcast, got {other:?}"),
        }
    }
}
