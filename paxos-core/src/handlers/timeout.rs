//! `recoverPrepares` (spec.md §4.1), the follower liveness probe and takeover
//! decision (§4.5), and resend for `Recoverer`/`Leader` (§4.8).

use crate::{
    ballot::BallotNumber,
    clock::Random,
    core::{Effects, PaxosCore},
    error::Result,
    ids::{LogIndex, NodeId, NodeMap, SlotId},
    messages::Message,
    role::Role,
    state::PrepareVote,
    storage::Storage,
};

/// spec.md §4.1: a `Prepare` per slot in `[committed_idx+1 ..
/// max(committed_idx+1, accepted_idx+1)]`, all carrying the same new ballot
/// `(highest.counter+1, self_node_id)`. Always yields at least one `Prepare`.
pub(crate) fn recover_prepares(
    highest: BallotNumber,
    committed_idx: LogIndex,
    accepted_idx: LogIndex,
    self_node_id: NodeId,
) -> Vec<SlotId> {
    let new_ballot = highest.next_for(self_node_id);
    let lower = committed_idx + 1;
    let upper = lower.max(accepted_idx + 1);
    (lower..=upper)
        .map(|slot| SlotId::new(self_node_id, new_ballot, slot))
        .collect()
}

impl<S: Storage, R: Random> PaxosCore<S, R> {
    pub(crate) fn dispatch_check_timeout(&mut self, now: i64) -> Result<Effects> {
        if now < self.state.timeout {
            return Ok(Effects::default());
        }
        match self.role {
            Role::Follower => self.follower_check_timeout(now),
            Role::Recoverer | Role::Leader => self.resend_check_timeout(now),
        }
    }

    fn follower_check_timeout(&mut self, now: i64) -> Result<Effects> {
        let mut effects = Effects::default();

        if self.config.is_quorum(1) {
            // A lone node's own vote already satisfies quorum: no peer can ever
            // answer a probe, so go straight to recovery (spec.md §8: "cluster
            // size 1, every proposal commits on self-ack").
            self.take_over(&mut effects)?;
            self.state.timeout = self.fresh_timeout(now);
            return Ok(effects);
        }

        let probe_id = if let Some((&id, _)) = self.state.prepare_responses.iter().next() {
            id
        } else {
            let id = SlotId::min_prepare(self.node_id);
            let mut votes: NodeMap<PrepareVote> = NodeMap::default();
            votes.insert(
                self.node_id,
                PrepareVote::Nack {
                    progress: self.state.progress,
                    highest_accepted_index: self.highest_accepted_index()?,
                    leader_heartbeat: self.state.leader_heartbeat,
                },
            );
            self.state.prepare_responses.insert(id, Some(votes));
            id
        };

        effects.broadcast(Message::Prepare { id: probe_id });
        self.state.timeout = self.fresh_timeout(now);
        Ok(effects)
    }

    fn resend_check_timeout(&mut self, now: i64) -> Result<Effects> {
        let mut effects = Effects::default();

        if !self.state.prepare_responses.is_empty() {
            let ids: Vec<SlotId> = self.state.prepare_responses.keys().copied().collect();
            for id in ids {
                effects.broadcast(Message::Prepare { id });
            }
            self.state.timeout = self.fresh_timeout(now);
            return Ok(effects);
        }

        let due: Vec<SlotId> = self
            .state
            .accept_responses
            .iter()
            .filter(|(_, tracking)| now > tracking.timeout)
            .map(|(id, _)| *id)
            .collect();

        if due.is_empty() {
            return Ok(effects);
        }

        // A Leader never raises its ballot to resend; only a Recoverer's initial
        // prepare does that (spec.md §4.8).
        let fresh = self.fresh_timeout(now);
        for id in due {
            let tracking = self
                .state
                .accept_responses
                .get_mut(&id)
                .expect("id came from this same map");
            effects.broadcast(Message::Accept {
                id: tracking.accept.id,
                value: tracking.accept.value.clone(),
            });
            tracking.timeout = fresh;
        }
        self.state.timeout = fresh;

        Ok(effects)
    }

    /// §4.5 steps 1-3: a `PrepareResponse` arriving while this Follower has a
    /// min-prepare probe outstanding.
    pub(crate) fn follower_probe_response(
        &mut self,
        from: NodeId,
        id: SlotId,
        vote: PrepareVote,
        now: i64,
    ) -> Result<Effects> {
        let mut effects = Effects::default();

        if !self.state.prepare_responses.contains_key(&id) {
            return Ok(effects);
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
            #[cfg(feature = "logging")]
            slog::info!(self.logger, "backing down on higher commit seen in probe response";
                "from" => ?from, "their_slot" => responder_committed.log_index);
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
            .expect("probe slot always carries a live vote map");
        votes.insert(from, vote);

        if !self.config.is_quorum(votes.len()) {
            return Ok(effects);
        }

        let heartbeats_ahead: Vec<i64> = votes
            .values()
            .filter_map(|v| match v {
                PrepareVote::Nack {
                    leader_heartbeat, ..
                } if *leader_heartbeat > self.state.leader_heartbeat => Some(*leader_heartbeat),
                _ => None,
            })
            .collect();

        let take_over = if heartbeats_ahead.is_empty() {
            true
        } else if self.config.is_quorum(heartbeats_ahead.len() + 1) {
            self.state.leader_heartbeat = heartbeats_ahead.iter().copied().max().unwrap();
            self.state.clear_prepare_tracking();
            false
        } else {
            true
        };

        if take_over {
            self.take_over(&mut effects)?;
        }

        Ok(effects)
    }

    /// §4.5 step 3: win a majority of probe votes (or resolve a recovery prepare's
    /// own majority with no dissent) and become `Recoverer`.
    pub(crate) fn take_over(&mut self, effects: &mut Effects) -> Result<()> {
        let progress = self.state.progress;
        let highest = progress.highest_promised.max(progress.highest_committed.number);
        let accepted_idx = self.highest_accepted_index()?;
        let prepares = recover_prepares(
            highest,
            progress.highest_committed.log_index,
            accepted_idx,
            self.node_id,
        );
        let new_ballot = prepares[0].number;

        let mut new_progress = progress;
        new_progress.highest_promised = new_ballot;
        self.save_progress(new_progress)?;
        self.state.set_highest_promised(new_ballot);

        self.state.prepare_responses.clear();
        for &id in &prepares {
            let accepted_value = self.storage.accepted(id.log_index)?;
            let mut votes: NodeMap<PrepareVote> = NodeMap::default();
            votes.insert(
                self.node_id,
                PrepareVote::Ack {
                    progress: self.state.progress,
                    highest_accepted_index: accepted_idx,
                    leader_heartbeat: self.state.leader_heartbeat,
                    accepted_value,
                },
            );
            self.state.prepare_responses.insert(id, Some(votes));
        }
        self.state.epoch = Some(new_ballot);
        self.role = Role::Recoverer;

        if self.config.is_quorum(1) {
            // A lone node's self-vote already satisfies quorum on every slot: no
            // peer exists to complete the round, so resolve immediately rather than
            // wait on promises that will never arrive.
            for &id in &prepares {
                let votes = self.state.prepare_responses[&id]
                    .clone()
                    .expect("just seeded above");
                self.resolve_recovered_slot(id, &votes, effects)?;
            }
            if self.state.prepare_responses.values().all(Option::is_none) {
                self.state.prepare_responses.clear();
                self.role = Role::Leader;
            }
        } else {
            for &id in &prepares {
                effects.broadcast(Message::Prepare { id });
            }
        }

        #[cfg(feature = "logging")]
        slog::info!(self.logger, "taking over as recoverer";
            "epoch" => ?new_ballot, "prepares" => prepares.len());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ballot::BallotNumber, ids::NodeId};

    #[test]
    fn recover_prepares_always_yields_at_least_one() {
        let prepares = recover_prepares(BallotNumber::BOTTOM, -1, -1, NodeId::new(1));
        assert_eq!(prepares.len(), 1);
        assert_eq!(prepares[0].log_index, 0);
    }

    #[test]
    fn recover_prepares_spans_gap_between_committed_and_accepted() {
        let prepares = recover_prepares(BallotNumber::new(3, NodeId::new(2)), 5, 9, NodeId::new(1));
        let indices: Vec<LogIndex> = prepares.iter().map(|p| p.log_index).collect();
        assert_eq!(indices, vec![6, 7, 8, 9]);
        assert!(prepares.iter().all(|p| p.number.counter == 4 && p.number.node_id == NodeId::new(1)));
    }

    #[test]
    fn first_check_timeout_broadcasts_min_prepare_and_seeds_self_nack() {
        let mut c = crate::test_support::test_core(3);
        let effects = c.dispatch_check_timeout(c.next_timeout()).unwrap();
        assert_eq!(effects.outbound.len(), 1);
        assert_eq!(c.state.prepare_responses.len(), 1);
        let (_, votes) = c.state.prepare_responses.iter().next().unwrap();
        assert!(matches!(
            votes.as_ref().unwrap().get(&c.node_id()),
            Some(PrepareVote::Nack { .. })
        ));
    }

    #[test]
    fn heartbeat_evidence_of_live_majority_avoids_takeover() {
        let mut c = crate::test_support::test_core(3);
        c.dispatch_check_timeout(c.next_timeout()).unwrap();
        let (id, _) = c.state.prepare_responses.iter().next().unwrap();
        let id = *id;

        let progress = c.state.progress;
        c.follower_probe_response(
            NodeId::new(2),
            id,
            PrepareVote::Nack {
                progress,
                highest_accepted_index: -1,
                leader_heartbeat: 42,
            },
            0,
        )
        .unwrap();
        let effects = c
            .follower_probe_response(
                NodeId::new(3),
                id,
                PrepareVote::Nack {
                    progress,
                    highest_accepted_index: -1,
                    leader_heartbeat: 42,
                },
                0,
            )
            .unwrap();

        assert_eq!(c.role(), Role::Follower);
        assert_eq!(c.state.leader_heartbeat, 42);
        assert!(effects.outbound.is_empty());
    }

    #[test]
    fn solo_cluster_takes_over_and_promotes_without_peers() {
        let mut c = crate::test_support::test_core_for(NodeId::new(1), 1);
        let effects = c.dispatch_check_timeout(c.next_timeout()).unwrap();
        assert!(effects.outbound.is_empty());
        assert_eq!(c.role(), Role::Leader);
        assert!(c.state.prepare_responses.is_empty());
        assert!(c.state.epoch.is_some());
    }

    #[test]
    fn no_heartbeat_evidence_takes_over() {
        let mut c = crate::test_support::test_core(3);
        c.dispatch_check_timeout(c.next_timeout()).unwrap();
        let (id, _) = c.state.prepare_responses.iter().next().unwrap();
        let id = *id;

        let progress = c.state.progress;
        c.follower_probe_response(
            NodeId::new(2),
            id,
            PrepareVote::Nack {
                progress,
                highest_accepted_index: -1,
                leader_heartbeat: 0,
            },
            0,
        )
        .unwrap();
        let effects = c
            .follower_probe_response(
                NodeId::new(3),
                id,
                PrepareVote::Nack {
                    progress,
                    highest_accepted_index: -1,
                    leader_heartbeat: 0,
                },
                0,
            )
            .unwrap();

        assert_eq!(c.role(), Role::Recoverer);
        assert!(!effects.outbound.is_empty());
        assert!(c.state.epoch.is_some());
    }
}
