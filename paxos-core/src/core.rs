//! The event dispatcher (spec.md §2's "Event dispatcher" component): a single
//! `apply` entry point that routes `(role, event)` to the handler that owns it, and
//! returns the three things spec.md §1 demands — outbound messages, committed
//! deliveries, and (implicitly, via synchronous `Storage` calls made before any
//! message is queued) durable journal writes.

use crate::{
    clock::Random,
    config::Config,
    error::Result,
    ids::{NodeId, SlotId},
    messages::{ClientHandle, CommandBytes, Envelope, Event, Message, Outbound, Timer},
    role::Role,
    state::NodeState,
    storage::{Progress, Storage},
};

#[cfg(feature = "logging")]
use slog::Logger;

/// What happened when we applied one event: messages to send, values now decided,
/// and replies owed to clients. Empty for every protocol-benign event (spec.md §7).
#[derive(Clone, Debug, Default)]
pub struct Effects {
    pub outbound: Vec<Outbound>,
    pub deliveries: Vec<Delivery>,
    pub client_replies: Vec<(ClientHandle, ClientOutcome)>,
}

impl Effects {
    pub fn unicast(&mut self, to: NodeId, message: Message) {
        self.outbound.push(Outbound::to(to, message));
    }

    pub fn broadcast(&mut self, message: Message) {
        self.outbound.push(Outbound::broadcast(message));
    }
}

/// A value now known to be decided at `slot`, handed to the host in log order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Delivery {
    pub slot: SlotId,
    pub value: CommandBytes,
}

/// The outcome reported back to a client that previously submitted a `CommandValue`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClientOutcome {
    /// The command was committed at this node's chosen slot.
    Committed,
    /// This node is not (or is no longer sure it is) the leader.
    NotLeader,
    /// This node was leader when it accepted the command but lost leadership before
    /// a majority accepted it; the outcome is unknown and must be retried.
    NoLongerLeader,
}

/// The per-node Multi-Paxos state machine. Holds no network connection and performs
/// no I/O beyond calls to `S: Storage`; everything else is a pure function of the
/// incoming `Event` and the current `NodeState`/`Role`.
pub struct PaxosCore<S: Storage, R: Random> {
    pub(crate) node_id: NodeId,
    pub(crate) config: Config,
    pub(crate) storage: S,
    pub(crate) rng: R,
    pub(crate) role: Role,
    pub(crate) state: NodeState,
    #[cfg(feature = "logging")]
    pub(crate) logger: Logger,
}

impl<S: Storage, R: Random> PaxosCore<S, R> {
    /// Boots a node: rehydrates `Progress` from the journal and starts as
    /// `Follower` with a freshly randomized election timeout (spec.md §4.11).
    #[cfg(feature = "logging")]
    pub fn new(config: Config, mut storage: S, mut rng: R, logger: Logger, now: i64) -> Result<Self> {
        let progress = storage.load()?;
        let timeout = now + rng.uniform_timeout(config.leader_timeout_min, config.leader_timeout_max);
        Ok(Self {
            node_id: config.node_id,
            config,
            storage,
            rng,
            role: Role::Follower,
            state: NodeState::new(progress, timeout),
            logger,
        })
    }

    #[cfg(not(feature = "logging"))]
    pub fn new(config: Config, mut storage: S, mut rng: R, now: i64) -> Result<Self> {
        let progress = storage.load()?;
        let timeout = now + rng.uniform_timeout(config.leader_timeout_min, config.leader_timeout_max);
        Ok(Self {
            node_id: config.node_id,
            config,
            storage,
            rng,
            role: Role::Follower,
            state: NodeState::new(progress, timeout),
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    /// The deadline the runtime should wake this node up for next, so it can sleep
    /// efficiently instead of polling (spec.md §9 "Timer ownership").
    pub fn next_timeout(&self) -> i64 {
        self.state.timeout
    }

    pub(crate) fn fresh_timeout(&mut self, now: i64) -> i64 {
        now + self
            .rng
            .uniform_timeout(self.config.leader_timeout_min, self.config.leader_timeout_max)
    }

    /// Durably persists `new_progress`, enforcing invariant P2 (spec.md:38): a
    /// node's `Progress` never regresses over its lifetime. Every call site that
    /// advances `progress` routes through here instead of calling `storage.save`
    /// directly, so a regression is always caught before it reaches the journal.
    pub(crate) fn save_progress(&mut self, new_progress: Progress) -> Result<()> {
        if !self.state.progress.is_monotonic_successor(&new_progress) {
            return Err(crate::error::Error::InvariantViolation(
                "progress save would regress highest_promised or highest_committed",
            ));
        }
        self.storage.save(new_progress)?;
        Ok(())
    }

    /// The single entry point: consumes one event, returns the effects it produced.
    pub fn apply(&mut self, event: Event, now: i64) -> Result<Effects> {
        match event {
            Event::Message(Envelope { from, msg }) => self.dispatch_message(from, msg, now),
            Event::Timer(Timer::CheckTimeout) => self.dispatch_check_timeout(now),
            Event::Timer(Timer::HeartBeat) => self.dispatch_heartbeat(now),
        }
    }

    fn dispatch_message(&mut self, from: NodeId, msg: Message, now: i64) -> Result<Effects> {
        match msg {
            Message::Prepare { id } => self.handle_prepare(id),
            Message::Accept { id, value } => self.handle_accept(id, value),
            Message::PrepareAck { .. } | Message::PrepareNack { .. } => {
                self.handle_prepare_response(from, msg, now)
            }
            Message::AcceptAck { id, from: voter, progress } => {
                self.handle_accept_response(id, voter, true, progress, now)
            }
            Message::AcceptNack { id, from: voter, progress } => {
                self.handle_accept_response(id, voter, false, progress, now)
            }
            Message::Commit {
                highest_committed,
                heartbeat,
            } => self.handle_commit(from, highest_committed, heartbeat, now),
            Message::RetransmitRequest { from, to: _, from_log_index } => {
                self.handle_retransmit_request(from, from_log_index)
            }
            Message::RetransmitResponse {
                committed, proposed, ..
            } => self.handle_retransmit_response(committed, proposed),
            Message::CommandValue { msg_id, bytes } => {
                self.handle_command_value(from, msg_id, bytes)
            }
            Message::NotLeader { .. } => Ok(Effects::default()),
        }
    }
}
