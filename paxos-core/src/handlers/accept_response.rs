//! Accept-response handler: quorum accounting, commit-on-majority-ack, and
//! backdown-on-majority-nack (spec.md §4.7).

use crate::{
    clock::Random,
    core::{ClientOutcome, Delivery, Effects, PaxosCore},
    error::Result,
    ids::{NodeId, SlotId},
    state::AcceptVote,
    storage::{Progress, Storage},
};

impl<S: Storage, R: Random> PaxosCore<S, R> {
    pub(crate) fn handle_accept_response(
        &mut self,
        id: SlotId,
        voter: NodeId,
        accepted: bool,
        _progress: Progress,
        now: i64,
    ) -> Result<Effects> {
        let mut effects = Effects::default();

        let Some(tracking) = self.state.accept_responses.get_mut(&id) else {
            return Ok(effects);
        };
        tracking
            .votes
            .insert(voter, if accepted { AcceptVote::Ack } else { AcceptVote::Nack });

        let ack_count = tracking.ack_count();
        let nack_count = tracking.nack_count();

        if self.config.is_quorum(nack_count) {
            self.fail_pending_clients(&mut effects, ClientOutcome::NoLongerLeader);
            let fresh = self.fresh_timeout(now);
            self.backdown_to_follower();
            self.state.timeout = fresh;
            return Ok(effects);
        }

        if !self.config.is_quorum(ack_count) {
            return Ok(effects);
        }

        self.advance_committed_prefix(&mut effects)?;
        Ok(effects)
    }

    /// Commits every contiguous slot, starting just past the current watermark,
    /// whose tracked accept has reached a quorum of acks (spec.md §4.7: "progress
    /// advances as the prefix closes").
    pub(crate) fn advance_committed_prefix(&mut self, effects: &mut Effects) -> Result<()> {
        loop {
            let next = self.state.progress.highest_committed.log_index + 1;
            let Some(id) = self
                .state
                .accept_responses
                .keys()
                .find(|id| id.log_index == next)
                .copied()
            else {
                break;
            };
            let tracking = self
                .state
                .accept_responses
                .get(&id)
                .expect("id came from this same map");
            if !self.config.is_quorum(tracking.ack_count()) {
                break;
            }

            let accept = tracking.accept.clone();
            let mut new_progress = self.state.progress;
            new_progress.highest_committed = id;
            self.save_progress(new_progress)?;
            self.state.set_highest_committed(id);
            self.state.accept_responses.remove(&id);

            #[cfg(feature = "logging")]
            slog::debug!(self.logger, "committed slot"; "slot" => id.log_index, "ballot" => ?id.number);

            if let Some((value, handle)) = self.state.client_commands.remove(&id) {
                debug_assert_eq!(value, accept.value);
                effects.client_replies.push((handle, ClientOutcome::Committed));
            }
            effects.deliveries.push(Delivery {
                slot: accept.id,
                value: accept.value,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ballot::BallotNumber,
        ids::NodeId,
        messages::ClientHandle,
        messages::MsgId,
        state::AcceptTracking,
        storage::Accept,
        test_support::test_core,
    };

    fn seed(c: &mut PaxosCore<crate::test_support::MemStorage, crate::clock::DeterministicRandom>, id: SlotId, value: &[u8]) {
        let mut votes = crate::ids::NodeMap::default();
        votes.insert(c.node_id(), AcceptVote::Ack);
        c.state.accept_responses.insert(
            id,
            AcceptTracking {
                timeout: 1000,
                accept: Accept {
                    id,
                    value: value.to_vec(),
                },
                votes,
            },
        );
    }

    #[test]
    fn majority_ack_commits_and_replies_to_waiting_client() {
        let mut c = test_core(3);
        let epoch = BallotNumber::new(1, c.node_id());
        let id = SlotId::new(c.node_id(), epoch, 0);
        seed(&mut c, id, b"x");
        c.state
            .client_commands
            .insert(id, (b"x".to_vec(), ClientHandle { from: NodeId::new(9), msg_id: MsgId(1) }));

        let effects = c
            .handle_accept_response(id, NodeId::new(2), true, Progress::default(), 0)
            .unwrap();

        assert_eq!(c.state.progress.highest_committed, id);
        assert_eq!(effects.deliveries.len(), 1);
        assert_eq!(effects.client_replies.len(), 1);
        assert_eq!(effects.client_replies[0].1, ClientOutcome::Committed);
        assert!(c.state.accept_responses.is_empty());
    }

    #[test]
    fn majority_nack_backs_down_and_fails_clients() {
        let mut c = test_core(3);
        let epoch = BallotNumber::new(1, c.node_id());
        let id = SlotId::new(c.node_id(), epoch, 0);
        seed(&mut c, id, b"x");
        c.state
            .client_commands
            .insert(id, (b"x".to_vec(), ClientHandle { from: NodeId::new(9), msg_id: MsgId(1) }));
        c.role = crate::role::Role::Leader;

        let effects = c
            .handle_accept_response(id, NodeId::new(2), false, Progress::default(), 0)
            .unwrap();

        assert_eq!(c.role(), crate::role::Role::Follower);
        assert_eq!(effects.client_replies.len(), 1);
        assert_eq!(effects.client_replies[0].1, ClientOutcome::NoLongerLeader);
    }

    #[test]
    fn commit_respects_log_contiguity() {
        let mut c = test_core(3);
        let epoch = BallotNumber::new(1, c.node_id());
        let slot1 = SlotId::new(c.node_id(), epoch, 0);
        let slot2 = SlotId::new(c.node_id(), epoch, 1);
        seed(&mut c, slot1, b"a");
        seed(&mut c, slot2, b"b");

        // slot 1 reaches quorum first but cannot commit before slot 0.
        let effects = c
            .handle_accept_response(slot2, NodeId::new(2), true, Progress::default(), 0)
            .unwrap();
        assert!(effects.deliveries.is_empty());
        assert_eq!(c.state.progress.highest_committed.log_index, -1);

        let effects = c
            .handle_accept_response(slot1, NodeId::new(2), true, Progress::default(), 0)
            .unwrap();
        assert_eq!(effects.deliveries.len(), 2);
        assert_eq!(c.state.progress.highest_committed.log_index, 1);
    }
}
