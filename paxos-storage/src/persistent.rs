//! A RocksDB-backed [`Storage`], behind the `persistent_storage` feature — the same
//! feature name and dependency trio (`rocksdb`, `serde`, `bincode`) the teacher
//! uses for its own persistent storage engine. (The teacher's fourth dependency for
//! this feature, `zerocopy`, is dropped here: every record this core persists
//! contains a variable-length `Vec<u8>` command payload, so there is no fixed-layout
//! struct for `zerocopy::AsBytes` to apply to — see `DESIGN.md`.)
//!
//! Layout: a single fixed key holds the serialized [`Progress`] record; every other
//! key is the big-endian bytes of a `LogIndex`, holding a serialized [`Accept`].
//! Big-endian keys keep RocksDB's lexicographic key order equal to slot order, so
//! `bounds()` is a pair of cheap first/last-key seeks rather than a full scan.

use paxos_core::{
    ids::LogIndex,
    storage::{Accept, Progress, Storage, StorageError},
};

const PROGRESS_KEY: &[u8] = b"__progress__";

pub struct RocksDbStorage {
    db: rocksdb::DB,
}

impl RocksDbStorage {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StorageError> {
        let db = rocksdb::DB::open_default(path)
            .map_err(|e| StorageError::ReadFailed(e.to_string()))?;
        Ok(Self { db })
    }

    fn key_for(log_index: LogIndex) -> [u8; 8] {
        log_index.to_be_bytes()
    }
}

impl Storage for RocksDbStorage {
    fn load(&self) -> Result<Progress, StorageError> {
        match self
            .db
            .get(PROGRESS_KEY)
            .map_err(|e| StorageError::ReadFailed(e.to_string()))?
        {
            Some(bytes) => bincode::deserialize(&bytes)
                .map_err(|e| StorageError::ReadFailed(e.to_string())),
            None => Ok(Progress::default()),
        }
    }

    fn save(&mut self, progress: Progress) -> Result<(), StorageError> {
        let bytes = bincode::serialize(&progress).map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        self.db
            .put(PROGRESS_KEY, bytes)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))
    }

    fn accept(&mut self, accept: Accept) -> Result<(), StorageError> {
        let key = Self::key_for(accept.id.log_index);
        let bytes = bincode::serialize(&accept).map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        self.db
            .put(key, bytes)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))
    }

    fn accepted(&self, log_index: LogIndex) -> Result<Option<Accept>, StorageError> {
        let key = Self::key_for(log_index);
        match self
            .db
            .get(key)
            .map_err(|e| StorageError::ReadFailed(e.to_string()))?
        {
            Some(bytes) => {
                bincode::deserialize(&bytes).map(Some).map_err(|e| StorageError::ReadFailed(e.to_string()))
            }
            None => Ok(None),
        }
    }

    fn bounds(&self) -> Result<Option<(LogIndex, LogIndex)>, StorageError> {
        let mut iter = self.db.iterator(rocksdb::IteratorMode::Start);
        let min = loop {
            match iter.next() {
                Some(Ok((key, _))) if key.as_ref() == PROGRESS_KEY => continue,
                Some(Ok((key, _))) => break Some(decode_key(&key)),
                Some(Err(e)) => return Err(StorageError::ReadFailed(e.to_string())),
                None => break None,
            }
        };
        let Some(min) = min else { return Ok(None) };

        let mut iter = self.db.iterator(rocksdb::IteratorMode::End);
        let max = loop {
            match iter.next() {
                Some(Ok((key, _))) if key.as_ref() == PROGRESS_KEY => continue,
                Some(Ok((key, _))) => break decode_key(&key),
                Some(Err(e)) => return Err(StorageError::ReadFailed(e.to_string())),
                None => unreachable!("min lookup above already proved the cf is non-empty"),
            }
        };

        Ok(Some((min, max)))
    }
}

fn decode_key(key: &[u8]) -> LogIndex {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(key);
    LogIndex::from_be_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use paxos_core::ballot::BallotNumber;
    use paxos_core::ids::{NodeId, SlotId};

    #[test]
    fn persists_progress_and_accepts_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = SlotId::new(NodeId::new(1), BallotNumber::new(3, NodeId::new(1)), 2);
        {
            let mut storage = RocksDbStorage::open(dir.path()).unwrap();
            storage
                .save(Progress {
                    highest_promised: BallotNumber::new(3, NodeId::new(1)),
                    highest_committed: id,
                })
                .unwrap();
            storage
                .accept(Accept {
                    id,
                    value: vec![5, 6],
                })
                .unwrap();
        }
        let storage = RocksDbStorage::open(dir.path()).unwrap();
        assert_eq!(storage.load().unwrap().highest_committed, id);
        assert_eq!(storage.accepted(2).unwrap().unwrap().value, vec![5, 6]);
        assert_eq!(storage.bounds().unwrap(), Some((2, 2)));
    }
}
