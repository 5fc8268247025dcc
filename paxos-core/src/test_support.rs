//! Shared test doubles for per-handler unit tests (`#[cfg(test)]` only). A single
//! in-memory `Storage` implementation, reused across every handler's own `tests`
//! module instead of being redefined in each one.

#![cfg(test)]

use std::collections::HashMap;

use crate::{
    clock::DeterministicRandom,
    config::Config,
    core::PaxosCore,
    ids::{LogIndex, NodeId},
    storage::{Accept, Progress, Storage, StorageError},
};

#[derive(Default)]
pub(crate) struct MemStorage {
    progress: Progress,
    accepted: HashMap<LogIndex, Accept>,
}

impl Storage for MemStorage {
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
        if self.accepted.is_empty() {
            Ok(None)
        } else {
            let min = *self.accepted.keys().min().unwrap();
            let max = *self.accepted.keys().max().unwrap();
            Ok(Some((min, max)))
        }
    }
}

/// Builds a `Follower`-booted core for node 1 in a cluster of `cluster_size`, with a
/// cold (empty) journal and a deterministic timeout.
pub(crate) fn test_core(cluster_size: usize) -> PaxosCore<MemStorage, DeterministicRandom> {
    test_core_for(NodeId::new(1), cluster_size)
}

pub(crate) fn test_core_for(
    node_id: NodeId,
    cluster_size: usize,
) -> PaxosCore<MemStorage, DeterministicRandom> {
    let config = Config::new(node_id, 100, 300, cluster_size).unwrap();
    let storage = MemStorage::default();
    #[cfg(feature = "logging")]
    {
        PaxosCore::new(config, storage, DeterministicRandom, crate::logger::default_logger(), 0).unwrap()
    }
    #[cfg(not(feature = "logging"))]
    {
        PaxosCore::new(config, storage, DeterministicRandom, 0).unwrap()
    }
}
