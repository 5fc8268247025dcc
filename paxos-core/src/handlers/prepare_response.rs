//! Dispatch for `PrepareAck`/`PrepareNack`, and the `Recoverer`'s majority
//! accounting plus Paxos value-choice rule (spec.md §4.6). The `Follower`-in-probe
//! path lives in `handlers::timeout`; `Leader` ignores these entirely (spec.md §4.9).

use crate::{
    clock::Random,
    core::{ClientOutcome, Effects, PaxosCore},
    error::Result,
    ids::{NodeId, NodeMap, SlotId},
    messages::Message,
    role::Role,
    state::{AcceptTracking, AcceptVote, PrepareVote},
    storage::{Accept, Storage},
};

impl<S: Storage, R: Random> PaxosCore<S, R> {
    pub(crate) fn handle_prepare_response(
        &mut self,
        from: NodeId,
        msg: Message,
        now: i64,
    ) -> Result<Effects> {
        let (id, vote) = match msg {
            Message::PrepareAck {
                id,
                progress,
                highest_accepted_index,
                leader_heartbeat,
                accepted_value,
                ..
            } => (
                id,
                PrepareVote::Ack {
                    progress,
                    highest_accepted_index,
                    leader_heartbeat,
                    accepted_value,
                },
            ),
            Message::PrepareNack {
                id,
                progress,
                highest_accepted_index,
                leader_heartbeat,
                ..
            } => (
                id,
                PrepareVote::Nack {
                    progress,
                    highest_accepted_index,
                    leader_heartbeat,
                },
            ),
            _ => return Ok(Effects::default()),
        };

        match self.role {
            Role::Follower => self.follower_probe_response(from, id, vote, now),
            Role::Recoverer => self.recoverer_prepare_response(from, id, vote, now),
            Role::Leader => Ok(Effects::default()),
        }
    }

    /// spec.md §4.6.
    fn recoverer_prepare_response(
        &mut self,
        from: NodeId,
        id: SlotId,
        vote: PrepareVote,
        now: i64,
    ) -> Result<Effects> {
        let mut effects = Effects::default();

        match self.state.prepare_responses.get(&id) {
            None => return Ok(effects),
            Some(None) => return Ok(effects), // already resolved (tombstoned)
            Some(Some(_)) => {}
        }

        let responder_committed = match &vote {
            PrepareVote::Ack { progress, .. } | PrepareVote::Nack { progress, .. } => {
                progress.highest_committed
            }
        };

        if responder_committed.log_index > self.state.progress.highest_committed.log_index {
            effects.unicast(
                from,
                Message::RetransmitRequest {
                    from: self.node_id,
                    to: from,
                    from_log_index: self.state.progress.highest_committed.log_index,
                },
            );
            self.fail_pending_clients(&mut effects, ClientOutcome::NoLongerLeader);
            let fresh = self.fresh_timeout(now);
            self.backdown_to_follower();
            self.state.timeout = fresh;
            return Ok(effects);
        }

        let votes = self
            .state
            .prepare_responses
            .get_mut(&id)
            .and_then(|slot| slot.as_mut())
            .expect("checked Some(Some(_)) above");
        votes.insert(from, vote);

        if !self.config.is_quorum(votes.len()) {
            return Ok(effects);
        }

        let has_nack = votes.values().any(|v| matches!(v, PrepareVote::Nack { .. }));
        if has_nack {
            self.fail_pending_clients(&mut effects, ClientOutcome::NoLongerLeader);
            #[cfg(feature = "logging")]
            slog::info!(self.logger, "backing down on majority nack"; "role" => ?self.role, "slot" => id.log_index);
            let fresh = self.fresh_timeout(now);
            self.backdown_to_follower();
            self.state.timeout = fresh;
            return Ok(effects);
        }

        let votes = votes.clone();
        self.resolve_recovered_slot(id, &votes, &mut effects)?;

        if self.state.prepare_responses.values().all(Option::is_none) {
            self.state.prepare_responses.clear();
            self.role = Role::Leader;
            #[cfg(feature = "logging")]
            slog::info!(self.logger, "promoted to leader"; "epoch" => ?self.state.epoch);
        }

        Ok(effects)
    }

    /// Chooses a value for `id` by the Paxos value-choice rule (maximal accepted
    /// ballot among votes carrying `Some(accepted)`), emits an `Accept` under this
    /// node's epoch, and tombstones the slot — unless it is the single highest slot
    /// under recovery with no accepted value anywhere, in which case it is left open
    /// for a client command once this node is `Leader` (spec.md §4.6 step 2).
    pub(crate) fn resolve_recovered_slot(
        &mut self,
        id: SlotId,
        votes: &NodeMap<PrepareVote>,
        effects: &mut Effects,
    ) -> Result<()> {
        let epoch = self.state.epoch.expect("recoverer always tracks its epoch");
        let highest_recovered = self
            .state
            .prepare_responses
            .keys()
            .next_back()
            .map(|s| s.log_index)
            .unwrap_or(id.log_index);

        let chosen = votes
            .values()
            .filter_map(|v| match v {
                PrepareVote::Ack {
                    accepted_value: Some(a),
                    ..
                } => Some(a.clone()),
                _ => None,
            })
            .max_by_key(|a| a.id.number);

        let value = match chosen {
            Some(accept) => accept.value,
            None if id.log_index < highest_recovered => Vec::new(),
            None => {
                // The single highest slot under recovery: stays open for a real
                // client command, not filled with a no-op.
                self.state.prepare_responses.insert(id, None);
                return Ok(());
            }
        };

        let new_id = SlotId::new(self.node_id, epoch, id.log_index);
        let accept = Accept { id: new_id, value };
        self.storage.accept(accept.clone())?;

        let mut self_votes = NodeMap::default();
        self_votes.insert(self.node_id, AcceptVote::Ack);
        self.state.accept_responses.insert(
            new_id,
            AcceptTracking {
                timeout: self.state.timeout,
                accept: accept.clone(),
                votes: self_votes,
            },
        );

        effects.broadcast(Message::Accept {
            id: new_id,
            value: accept.value,
        });
        self.state.prepare_responses.insert(id, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ballot::BallotNumber, ids::NodeId, storage::Progress, test_support::test_core_for};

    fn recoverer_with_one_outstanding_slot(
        slot: i64,
    ) -> (PaxosCore<crate::test_support::MemStorage, crate::clock::DeterministicRandom>, SlotId) {
        // cluster_size 4 so quorum (3) needs both peer votes below, not just one.
        let mut c = test_core_for(NodeId::new(1), 4);
        c.role = Role::Recoverer;
        let epoch = BallotNumber::new(1, NodeId::new(1));
        c.state.epoch = Some(epoch);
        let id = SlotId::new(NodeId::new(1), epoch, slot);
        let mut votes = NodeMap::default();
        votes.insert(
            NodeId::new(1),
            PrepareVote::Ack {
                progress: Progress::default(),
                highest_accepted_index: -1,
                leader_heartbeat: 0,
                accepted_value: None,
            },
        );
        c.state.prepare_responses.insert(id, Some(votes));
        (c, id)
    }

    #[test]
    fn picks_highest_ballot_among_accepted_values() {
        let (mut c, id) = recoverer_with_one_outstanding_slot(9);
        let low = Accept {
            id: SlotId::new(NodeId::new(2), BallotNumber::new(4, NodeId::new(2)), 9),
            value: b"a".to_vec(),
        };
        let high = Accept {
            id: SlotId::new(NodeId::new(3), BallotNumber::new(6, NodeId::new(3)), 9),
            value: b"b".to_vec(),
        };
        c.recoverer_prepare_response(
            NodeId::new(2),
            id,
            PrepareVote::Ack {
                progress: Progress::default(),
                highest_accepted_index: 9,
                leader_heartbeat: 0,
                accepted_value: Some(low),
            },
            0,
        )
        .unwrap();
        let effects = c
            .recoverer_prepare_response(
                NodeId::new(3),
                id,
                PrepareVote::Ack {
                    progress: Progress::default(),
                    highest_accepted_index: 9,
                    leader_heartbeat: 0,
                    accepted_value: Some(high),
                },
                0,
            )
            .unwrap();

        assert_eq!(c.role(), Role::Leader);
        match &effects.outbound[0] {
            crate::messages::Outbound::Broadcast {
                message: Message::Accept { value, .. },
            } => assert_eq!(value, b"b"),
            other => panic!("expected Accept broadcast, got {other:?}"),
        }
    }

    #[test]
    fn majority_nack_backs_down() {
        let (mut c, id) = recoverer_with_one_outstanding_slot(1);
        c.recoverer_prepare_response(
            NodeId::new(2),
            id,
            PrepareVote::Nack {
                progress: Progress::default(),
                highest_accepted_index: -1,
                leader_heartbeat: 0,
            },
            0,
        )
        .unwrap();
        let effects = c
            .recoverer_prepare_response(
                NodeId::new(3),
                id,
                PrepareVote::Nack {
                    progress: Progress::default(),
                    highest_accepted_index: -1,
                    leader_heartbeat: 0,
                },
                0,
            )
            .unwrap();
        assert_eq!(c.role(), Role::Follower);
        assert!(effects.outbound.is_empty());
    }
}
