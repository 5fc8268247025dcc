//! Cluster configuration (spec.md §6): the options a host must supply to construct a
//! [`crate::core::PaxosCore`], plus quorum arithmetic.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ids::NodeId;

/// Recognized configuration options (spec.md §6). `node_id` is this node's own id;
/// the abstract spec takes it for granted but a runnable node must be told.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Config {
    pub node_id: NodeId,
    pub leader_timeout_min: i64,
    pub leader_timeout_max: i64,
    pub cluster_size: usize,
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum ConfigError {
    #[error("node_id must be non-zero")]
    ZeroNodeId,
    #[error("leader_timeout_min must be > 0, got {0}")]
    NonPositiveTimeoutMin(i64),
    #[error("leader_timeout_max ({max}) must be > leader_timeout_min ({min})")]
    TimeoutMaxNotGreater { min: i64, max: i64 },
    #[error("cluster_size must be >= 1, got {0}")]
    EmptyCluster(usize),
}

impl Config {
    pub fn new(
        node_id: NodeId,
        leader_timeout_min: i64,
        leader_timeout_max: i64,
        cluster_size: usize,
    ) -> Result<Self, ConfigError> {
        if node_id == NodeId::BOTTOM {
            return Err(ConfigError::ZeroNodeId);
        }
        if leader_timeout_min <= 0 {
            return Err(ConfigError::NonPositiveTimeoutMin(leader_timeout_min));
        }
        if leader_timeout_max <= leader_timeout_min {
            return Err(ConfigError::TimeoutMaxNotGreater {
                min: leader_timeout_min,
                max: leader_timeout_max,
            });
        }
        if cluster_size < 1 {
            return Err(ConfigError::EmptyCluster(cluster_size));
        }
        Ok(Self {
            node_id,
            leader_timeout_min,
            leader_timeout_max,
            cluster_size,
        })
    }

    /// Quorum = `floor(cluster_size/2) + 1`, computed as `votes > cluster_size/2`
    /// (spec.md §6).
    pub fn is_quorum(&self, votes: usize) -> bool {
        votes > self.cluster_size / 2
    }

    /// Heartbeat interval: `leader_timeout_min / 4`, so three heartbeats fit inside
    /// the minimum follower timeout (spec.md §5).
    pub fn heartbeat_interval(&self) -> i64 {
        self.leader_timeout_min / 4
    }

    #[cfg(feature = "toml_config")]
    pub fn from_toml(text: &str) -> Result<Self, ConfigLoadError> {
        #[derive(Deserialize)]
        struct Raw {
            node_id: u64,
            leader_timeout_min: i64,
            leader_timeout_max: i64,
            cluster_size: usize,
        }
        let raw: Raw = toml::from_str(text)?;
        Ok(Config::new(
            NodeId::new(raw.node_id),
            raw.leader_timeout_min,
            raw.leader_timeout_max,
            raw.cluster_size,
        )?)
    }
}

#[cfg(feature = "toml_config")]
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigError),
    #[error("malformed toml: {0}")]
    Toml(#[from] toml::de::Error),
}
