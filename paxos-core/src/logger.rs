//! Helpers for building a default [`slog::Logger`], gated behind the `logging`
//! feature exactly as the teacher gates its own `slog`/`slog-term`/`slog-async`
//! dependency trio.

use slog::Drain;

/// A terminal-backed, asynchronously-drained logger suitable for a standalone node
/// binary. Library callers normally construct their own `Logger` and pass it to
/// [`crate::core::PaxosCore::new`]; this is provided for quick starts and examples.
pub fn default_logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(drain, slog::o!("component" => "paxos-core"))
}
