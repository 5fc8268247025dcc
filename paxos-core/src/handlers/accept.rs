//! Accept handler (spec.md §4.3). Shared by all three roles.

use crate::{
    clock::Random,
    core::{Effects, PaxosCore},
    error::Result,
    ids::SlotId,
    messages::{CommandBytes, Message},
    storage::{Accept, Storage},
};

impl<S: Storage, R: Random> PaxosCore<S, R> {
    pub(crate) fn handle_accept(&mut self, id: SlotId, value: CommandBytes) -> Result<Effects> {
        let mut effects = Effects::default();
        let progress = self.state.progress;

        if id.number < progress.highest_promised {
            effects.unicast(
                id.from,
                Message::AcceptNack {
                    id,
                    from: self.node_id,
                    progress,
                },
            );
            return Ok(effects);
        }

        if id.log_index <= progress.highest_committed.log_index {
            // The slot is sealed: accepting now would violate the single-decision-
            // per-slot invariant (spec.md §4.3, testable property #3).
            effects.unicast(
                id.from,
                Message::AcceptNack {
                    id,
                    from: self.node_id,
                    progress,
                },
            );
            return Ok(effects);
        }

        if id.number > progress.highest_promised {
            let mut new_progress = progress;
            new_progress.highest_promised = id.number;
            self.save_progress(new_progress)?;
            self.state.set_highest_promised(id.number);
        }

        self.storage.accept(Accept { id, value })?;

        effects.unicast(
            id.from,
            Message::AcceptAck {
                id,
                from: self.node_id,
                progress: self.state.progress,
            },
        );
        Ok(effects)
    }
}
