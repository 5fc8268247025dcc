//! Commit handler (spec.md §4.4), shared fast-forward logic, and the §4.9
//! return-to-follower check for `Recoverer`/`Leader`.

use crate::{
    clock::Random,
    core::{Delivery, Effects, PaxosCore},
    error::Result,
    ids::{LogIndex, NodeId, SlotId},
    messages::Message,
    role::Role,
    storage::Storage,
};

impl<S: Storage, R: Random> PaxosCore<S, R> {
    pub(crate) fn handle_commit(
        &mut self,
        from: NodeId,
        highest_committed: SlotId,
        heartbeat: i64,
        now: i64,
    ) -> Result<Effects> {
        match self.role {
            Role::Follower => self.follower_commit(from, highest_committed, heartbeat, now),
            Role::Recoverer | Role::Leader => {
                self.return_to_follower_on_higher_commit(from, highest_committed, now)
            }
        }
    }

    fn follower_commit(
        &mut self,
        from: NodeId,
        highest_committed: SlotId,
        heartbeat: i64,
        now: i64,
    ) -> Result<Effects> {
        let mut effects = Effects::default();

        // Step 1: refresh heartbeat/timeout evidence and clear any probe in flight
        // if this commit carries evidence of life from a new leader/epoch.
        if heartbeat > self.state.leader_heartbeat || highest_committed.number > self.state.progress.highest_promised {
            self.state.leader_heartbeat = self.state.leader_heartbeat.max(heartbeat);
            self.state.clear_prepare_tracking();
            self.state.timeout = self.fresh_timeout(now);
        }

        if highest_committed.log_index <= self.state.progress.highest_committed.log_index {
            return Ok(effects);
        }

        let delivered = self.fast_forward_deliver(highest_committed)?;
        effects.deliveries.extend(delivered);

        if self.state.progress.highest_committed.log_index < highest_committed.log_index {
            effects.unicast(
                from,
                Message::RetransmitRequest {
                    from: self.node_id,
                    to: from,
                    from_log_index: self.state.progress.highest_committed.log_index,
                },
            );
        }

        Ok(effects)
    }

    /// spec.md §4.9: a `Recoverer`/`Leader` backs down when a `Commit` proves a
    /// strictly newer leader/epoch has moved the log past (or level with, at a
    /// higher epoch than) what we believe.
    fn return_to_follower_on_higher_commit(
        &mut self,
        from: NodeId,
        highest_committed: SlotId,
        now: i64,
    ) -> Result<Effects> {
        let higher = highest_committed.log_index > self.state.progress.highest_committed.log_index
            || (highest_committed.log_index == self.state.progress.highest_committed.log_index
                && self.state.epoch.map(|e| highest_committed.number > e).unwrap_or(true));

        if !higher {
            return Ok(Effects::default());
        }

        let mut effects = Effects::default();
        let delivered = self.fast_forward_deliver(highest_committed)?;
        effects.deliveries.extend(delivered);

        if self.state.progress.highest_committed.log_index < highest_committed.log_index {
            effects.unicast(
                from,
                Message::RetransmitRequest {
                    from: self.node_id,
                    to: from,
                    from_log_index: self.state.progress.highest_committed.log_index,
                },
            );
        }

        self.fail_pending_clients(&mut effects, crate::core::ClientOutcome::NoLongerLeader);

        #[cfg(feature = "logging")]
        slog::info!(self.logger, "backing down on higher commit";
            "role" => ?self.role, "their_slot" => highest_committed.log_index);

        let fresh_timeout = self.fresh_timeout(now);
        self.backdown_to_follower();
        self.state.timeout = fresh_timeout;
        Ok(effects)
    }

    /// Walks slots `(highest_committed.log_index .. target.log_index]` delivering
    /// any whose locally-journaled accept matches `target`'s ballot chain, stopping
    /// at the first gap (spec.md §4.4 step 3, and the §9 open question: the
    /// stricter ballot-chain match, not "any locally-journaled accept").
    pub(crate) fn fast_forward_deliver(&mut self, target: SlotId) -> Result<Vec<Delivery>> {
        let mut deliveries = Vec::new();
        let mut cursor = self.state.progress.highest_committed.log_index;

        while cursor < target.log_index {
            let next: LogIndex = cursor + 1;
            let stored = self.storage.accepted(next)?;
            let Some(accept) = stored else { break };
            if accept.id.number != target.number {
                break;
            }

            let new_committed = accept.id;
            let mut new_progress = self.state.progress;
            new_progress.highest_committed = new_committed;
            self.save_progress(new_progress)?;
            self.state.set_highest_committed(new_committed);

            deliveries.push(Delivery {
                slot: accept.id,
                value: accept.value,
            });
            cursor = next;
        }

        Ok(deliveries)
    }

    /// Answers every client this node was tracking with `outcome`, draining the
    /// bookkeeping (spec.md §4.7/§4.9: "outstanding client commands ... answered
    /// with a no-longer-leader / outcome unknown failure").
    pub(crate) fn fail_pending_clients(
        &mut self,
        effects: &mut Effects,
        outcome: crate::core::ClientOutcome,
    ) {
        for (_, (_, handle)) in self.state.drain_client_commands() {
            effects.client_replies.push((handle, outcome));
        }
    }
}
