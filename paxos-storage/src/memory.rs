//! A `BTreeMap`-backed [`Storage`], with no persistence beyond process lifetime.
//! Suitable for tests and single-process demos, and used in `paxos-core`'s own
//! dev-dependencies for integration tests, mirroring the teacher's own
//! `omnipaxos` / `omnipaxos_storage` dev-dependency relationship.

use std::collections::BTreeMap;

use paxos_core::{
    ids::LogIndex,
    storage::{Accept, Progress, Storage, StorageError},
};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    progress: Progress,
    accepted: BTreeMap<LogIndex, Accept>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Progress, StorageError> {
        Ok(self.progress)
    }

    fn save(&mut self, progress: Progress) -> Result<(), StorageError> {
        self.progress = progress;
        Ok(())
    }

    fn accept(&mut self, accept: Accept) -> Result<(), StorageError> {
        self.accepted.insert(accept.id.log_index, accept);
        Ok(())
    }

    fn accepted(&self, log_index: LogIndex) -> Result<Option<Accept>, StorageError> {
        Ok(self.accepted.get(&log_index).cloned())
    }

    fn bounds(&self) -> Result<Option<(LogIndex, LogIndex)>, StorageError> {
        match (self.accepted.keys().next(), self.accepted.keys().next_back()) {
            (Some(&min), Some(&max)) => Ok(Some((min, max))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paxos_core::ballot::BallotNumber;
    use paxos_core::ids::{NodeId, SlotId};

    #[test]
    fn cold_start_loads_default_progress() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.load().unwrap(), Progress::default());
        assert_eq!(storage.bounds().unwrap(), None);
    }

    #[test]
    fn accept_then_accepted_round_trips() {
        let mut storage = MemoryStorage::new();
        let id = SlotId::new(NodeId::new(1), BallotNumber::new(1, NodeId::new(1)), 4);
        storage
            .accept(Accept {
                id,
                value: vec![1, 2, 3],
            })
            .unwrap();
        assert_eq!(storage.accepted(4).unwrap().unwrap().value, vec![1, 2, 3]);
        assert_eq!(storage.bounds().unwrap(), Some((4, 4)));
    }

    #[test]
    fn save_overwrites_prior_progress() {
        let mut storage = MemoryStorage::new();
        let id = SlotId::new(NodeId::new(1), BallotNumber::new(2, NodeId::new(1)), 9);
        let progress = Progress {
            highest_promised: BallotNumber::new(2, NodeId::new(1)),
            highest_committed: id,
        };
        storage.save(progress).unwrap();
        assert_eq!(storage.load().unwrap(), progress);
    }
}
