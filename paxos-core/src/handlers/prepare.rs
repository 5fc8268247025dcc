//! Prepare handler (spec.md §4.2). Shared by all three roles: a `Prepare` carries no
//! information about the sender's role, so the reaction depends only on how `id`
//! compares to this node's own promise.

use crate::{
    clock::Random,
    core::{Effects, PaxosCore},
    error::Result,
    ids::SlotId,
    messages::Message,
    role::Role,
    storage::Storage,
};

impl<S: Storage, R: Random> PaxosCore<S, R> {
    pub(crate) fn handle_prepare(&mut self, id: SlotId) -> Result<Effects> {
        let mut effects = Effects::default();
        let progress = self.state.progress;

        // A min-prepare never raises a promise, even at cold start where
        // `BallotNumber::BOTTOM` happens to equal an untouched `highest_promised`: it
        // exists purely to collect leader-liveness evidence, so it always gets the
        // probe-style Nack rather than the normal three-way comparison below.
        if id.is_min_prepare() {
            effects.unicast(
                id.from,
                Message::PrepareNack {
                    id,
                    from: self.node_id,
                    progress,
                    highest_accepted_index: self.highest_accepted_index()?,
                    leader_heartbeat: self.state.leader_heartbeat,
                },
            );
            return Ok(effects);
        }

        if id.number < progress.highest_promised {
            effects.unicast(
                id.from,
                Message::PrepareNack {
                    id,
                    from: self.node_id,
                    progress,
                    highest_accepted_index: self.highest_accepted_index()?,
                    leader_heartbeat: self.state.leader_heartbeat,
                },
            );
            return Ok(effects);
        }

        if id.number == progress.highest_promised {
            let accepted_value = self.storage.accepted(id.log_index)?;
            effects.unicast(
                id.from,
                Message::PrepareAck {
                    id,
                    from: self.node_id,
                    progress,
                    highest_accepted_index: self.highest_accepted_index()?,
                    leader_heartbeat: self.state.leader_heartbeat,
                    accepted_value,
                },
            );
            return Ok(effects);
        }

        // id.number > progress.highest_promised: raise the promise durably before
        // replying, then back down regardless of prior role (spec.md §4.2).
        let mut new_progress = progress;
        new_progress.highest_promised = id.number;
        self.save_progress(new_progress)?;
        self.state.set_highest_promised(id.number);

        #[cfg(feature = "logging")]
        slog::debug!(self.logger, "raised promise for incoming prepare";
            "ballot" => ?id.number, "slot" => id.log_index, "prior_role" => ?self.role);

        let accepted_value = self.storage.accepted(id.log_index)?;
        effects.unicast(
            id.from,
            Message::PrepareAck {
                id,
                from: self.node_id,
                progress: self.state.progress,
                highest_accepted_index: self.highest_accepted_index()?,
                leader_heartbeat: self.state.leader_heartbeat,
                accepted_value,
            },
        );
        self.backdown_to_follower();
        Ok(effects)
    }

    /// Shared backdown transition: clear in-flight recovery/leadership bookkeeping
    /// and reset to `Follower`. Does not touch `state.timeout` — callers that have
    /// a `now` in hand set `state.timeout = self.fresh_timeout(now)` themselves
    /// right after calling this, since not every call site has one.
    pub(crate) fn backdown_to_follower(&mut self) {
        self.role = Role::Follower;
        // Timeout is left untouched here: a higher promise does not itself imply
        // the peer holding it is alive, so we keep racing toward our own timeout.
        let prepare_responses = std::mem::take(&mut self.state.prepare_responses);
        let accept_responses = std::mem::take(&mut self.state.accept_responses);
        drop(prepare_responses);
        drop(accept_responses);
        self.state.epoch = None;
        self.state.client_commands.clear();
    }

    pub(crate) fn highest_accepted_index(&self) -> Result<crate::ids::LogIndex> {
        Ok(self
            .storage
            .bounds()?
            .map(|(_, max)| max)
            .unwrap_or(crate::ids::LogIndex::MIN))
    }
}
