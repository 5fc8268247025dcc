//! Wire message variants exchanged between replicas, plus the two timer ticks the
//! enclosing runtime delivers to the core (`HeartBeat`, `CheckTimeout`).
//!
//! Mirrors the shape of a real OmniPaxos/Paxos wire protocol: messages carry just
//! enough sender-side metadata (`from`, `progress`, `leader_heartbeat`) for the
//! receiver to make a decision without consulting any shared state.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    ids::{LogIndex, NodeId, SlotId},
    storage::{Accept, Progress},
};

/// A command submitted by a client, not yet known to be a member of any slot.
pub type CommandBytes = Vec<u8>;

/// Opaque id a client attaches to a [`Message::CommandValue`] so it can correlate a
/// [`Message::NotLeader`] reply, or a host-level reply, back to its request. The core
/// never interprets the bytes; it only threads them through `clientCommands`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MsgId(pub u64);

/// One wire message of the protocol. Variant names follow spec.md §3 verbatim.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Message {
    /// Phase 1a. Also used, with the sentinel id from [`SlotId::min_prepare`], as the
    /// follower's liveness probe.
    Prepare { id: SlotId },
    /// Phase 1b, positive reply: the responder's promise did not exceed `id.number`.
    PrepareAck {
        id: SlotId,
        from: NodeId,
        progress: Progress,
        highest_accepted_index: LogIndex,
        leader_heartbeat: i64,
        accepted_value: Option<Accept>,
    },
    /// Phase 1b, negative reply: the responder already promised a higher ballot.
    PrepareNack {
        id: SlotId,
        from: NodeId,
        progress: Progress,
        highest_accepted_index: LogIndex,
        leader_heartbeat: i64,
    },
    /// Phase 2a.
    Accept { id: SlotId, value: CommandBytes },
    /// Phase 2b, positive reply.
    AcceptAck {
        id: SlotId,
        from: NodeId,
        progress: Progress,
    },
    /// Phase 2b, negative reply: either a stale ballot or an already-sealed slot.
    AcceptNack {
        id: SlotId,
        from: NodeId,
        progress: Progress,
    },
    /// Leader's fast-forward commit notice plus heartbeat evidence.
    Commit {
        highest_committed: SlotId,
        heartbeat: i64,
    },
    /// A lagging follower's request to catch up from `from_log_index` onward.
    RetransmitRequest {
        from: NodeId,
        to: NodeId,
        from_log_index: LogIndex,
    },
    /// Catch-up bundle: `committed` entries may be delivered immediately in order,
    /// `proposed` entries are journaled but not committed.
    RetransmitResponse {
        from: NodeId,
        to: NodeId,
        committed: Vec<Accept>,
        proposed: Vec<Accept>,
    },
    /// A client's command, addressed to whichever node the client believes is leader.
    CommandValue { msg_id: MsgId, bytes: CommandBytes },
    /// Sent back to a client that addressed a non-leader (or a leader that has since
    /// backed down).
    NotLeader { node_id: NodeId, msg_id: MsgId },
}

/// Identifies who to reply to for a command a client submitted: its address (for
/// addressing an outbound reply) and the `msg_id` it attached (so it can correlate
/// the reply to its request). Stored in `NodeState::client_commands`, matching
/// spec.md §3's `(CommandValue, ClientHandle)` pairing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ClientHandle {
    pub from: NodeId,
    pub msg_id: MsgId,
}

/// An inbound wire message together with the peer that sent it. Mirrors the
/// sender/receiver envelope a real Paxos wire protocol carries around every message
/// (the receiver is implicit: it is always `self`).
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub from: NodeId,
    pub msg: Message,
}

/// The two timer ticks the runtime delivers; never sent over the wire.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Timer {
    HeartBeat,
    CheckTimeout,
}

/// Everything the core can consume in one call to [`crate::core::PaxosCore::apply`].
#[derive(Clone, Debug)]
pub enum Event {
    Message(Envelope),
    Timer(Timer),
}

impl From<Envelope> for Event {
    fn from(e: Envelope) -> Self {
        Event::Message(e)
    }
}

impl From<Timer> for Event {
    fn from(t: Timer) -> Self {
        Event::Timer(t)
    }
}

/// One message the core asks the runtime to deliver, addressed either to a single
/// peer or to the whole cluster.
#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    Unicast { to: NodeId, message: Message },
    Broadcast { message: Message },
}

impl Outbound {
    pub fn to(to: NodeId, message: Message) -> Self {
        Outbound::Unicast { to, message }
    }

    pub fn broadcast(message: Message) -> Self {
        Outbound::Broadcast { message }
    }
}
