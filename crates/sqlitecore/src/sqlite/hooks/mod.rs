//! Slot-based containers that multiplex many host callbacks onto SQLite's
//! single-seat hook API (trace, progress, commit, rollback, update, WAL).
//!
//! Every registry here lives inside `ConnectionState`'s storage, which stays
//! at a fixed heap address for the life of a connection's worker thread
//! (it is boxed inside an `Arc` one layer up); that is what makes it sound
//! to hand the engine a raw pointer to `self` as hook user-data.

pub(crate) mod collation;
pub(crate) mod function;
pub(crate) mod progress;
pub(crate) mod single_seat;
pub(crate) mod trace;

pub use single_seat::{AuthDecision, RowChange};
pub use trace::{TRACE_CLOSE, TRACE_PROFILE, TRACE_ROW, TRACE_STMT, TraceEvent};
pub use function::{Aggregate, WindowAggregate};

/// All hook state for a single connection.
///
/// `trace` and `progress` multiplex many host registrations behind one
/// engine seat each; the rest replace the previous host callback outright,
/// matching the engine's own single-seat semantics for those hooks.
#[derive(Default)]
pub(crate) struct HookRegistry {
    pub(crate) trace: trace::TraceRegistry,
    pub(crate) progress: progress::ProgressRegistry,
    pub(crate) commit: single_seat::CommitHook,
    pub(crate) rollback: single_seat::RollbackHook,
    pub(crate) update: single_seat::UpdateHook,
    pub(crate) wal: single_seat::WalHook,
    pub(crate) busy: single_seat::BusyHandler,
    pub(crate) authorizer: single_seat::Authorizer,
    pub(crate) autovacuum_pages: single_seat::AutovacuumPagesHook,
    pub(crate) collation_needed: collation::CollationNeededHook,
}
