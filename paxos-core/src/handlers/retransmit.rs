//! Retransmit request/response (spec.md §4.10) — the only mechanism through which
//! a lagging follower can cross a gap in its local journal.

use crate::{
    clock::Random,
    core::{Delivery, Effects, PaxosCore},
    error::Result,
    ids::{LogIndex, NodeId},
    messages::Message,
    storage::{Accept, Storage},
};

impl<S: Storage, R: Random> PaxosCore<S, R> {
    pub(crate) fn handle_retransmit_request(
        &mut self,
        requester: NodeId,
        from_log_index: LogIndex,
    ) -> Result<Effects> {
        let mut effects = Effects::default();
        let committed_bound = self.state.progress.highest_committed.log_index;

        let mut committed = Vec::new();
        let mut idx = from_log_index + 1;
        while idx <= committed_bound {
            if let Some(accept) = self.storage.accepted(idx)? {
                committed.push(accept);
            }
            idx += 1;
        }

        let mut proposed = Vec::new();
        if let Some((_, max)) = self.storage.bounds()? {
            let mut idx = committed_bound + 1;
            while idx <= max {
                if let Some(accept) = self.storage.accepted(idx)? {
                    proposed.push(accept);
                }
                idx += 1;
            }
        }

        effects.unicast(
            requester,
            Message::RetransmitResponse {
                from: self.node_id,
                to: requester,
                committed,
                proposed,
            },
        );
        Ok(effects)
    }

    pub(crate) fn handle_retransmit_response(
        &mut self,
        committed: Vec<Accept>,
        proposed: Vec<Accept>,
    ) -> Result<Effects> {
        let mut effects = Effects::default();

        for accept in committed {
            if accept.id.log_index != self.state.progress.highest_committed.log_index + 1 {
                break;
            }
            self.storage.accept(accept.clone())?;
            let mut new_progress = self.state.progress;
            new_progress.highest_committed = accept.id;
            self.save_progress(new_progress)?;
            self.state.set_highest_committed(accept.id);
            effects.deliveries.push(Delivery {
                slot: accept.id,
                value: accept.value,
            });
        }

        for accept in proposed {
            if accept.id.number >= self.state.progress.highest_promised
                && accept.id.log_index > self.state.progress.highest_committed.log_index
            {
                self.storage.accept(accept)?;
            }
        }

        Ok(effects)
    }
}
