//! Multiplexes many host trace callbacks onto SQLite's single `sqlite3_trace_v2` seat.

use std::ffi::{CStr, c_void};
use std::os::raw::{c_char, c_int, c_uint};
use std::panic::catch_unwind;
use std::ptr::null_mut;
use std::sync::Arc;

use libsqlite3_sys::{
    SQLITE_TRACE_CLOSE, SQLITE_TRACE_PROFILE, SQLITE_TRACE_ROW, SQLITE_TRACE_STMT, sqlite3,
    sqlite3_stmt,
};
use smallvec::SmallVec;

use crate::sqlite::ffi;

/// Registration ceiling, matched to the progress registry's, for exhaustion testing.
const MAX_SLOTS: usize = 1024;

/// Event-mask bit for [`TraceEvent::Stmt`], for use with [`crate::Connection::trace`].
pub const TRACE_STMT: u32 = SQLITE_TRACE_STMT as u32;
/// Event-mask bit for [`TraceEvent::Profile`].
pub const TRACE_PROFILE: u32 = SQLITE_TRACE_PROFILE as u32;
/// Event-mask bit for [`TraceEvent::Row`].
pub const TRACE_ROW: u32 = SQLITE_TRACE_ROW as u32;
/// Event-mask bit for [`TraceEvent::Close`].
pub const TRACE_CLOSE: u32 = SQLITE_TRACE_CLOSE as u32;

/// What fired on a given trace event.
#[derive(Debug, Clone)]
pub enum TraceEvent {
    /// Statement text about to execute (SQL with bound parameters expanded where possible).
    Stmt(String),
    /// A statement finished; `nanos` is the wall-clock time it took to run.
    Profile { sql: String, nanos: i64 },
    /// A row was produced.
    Row,
    /// The connection is closing.
    Close,
}

struct TraceSlot {
    id: Option<u64>,
    mask: c_uint,
    callback: Arc<dyn Fn(TraceEvent) + Send + Sync>,
}

/// Holds every host trace callback registered on a connection and keeps the
/// single engine trace seat installed with their combined event mask.
///
/// Lives inside `ConnectionState`, which in turn lives behind an `Arc` for the
/// life of the connection's worker thread, so the raw self-pointer handed to
/// `sqlite3_trace_v2` as user data stays valid for as long as the seat is
/// installed.
#[derive(Default)]
pub(crate) struct TraceRegistry {
    slots: SmallVec<[TraceSlot; 4]>,
}

impl TraceRegistry {
    /// Registers (or, if `id` matches an existing slot, replaces) a trace callback
    /// and reinstalls the engine seat with the updated combined mask.
    pub(crate) fn register(
        &mut self,
        db: *mut sqlite3,
        id: Option<u64>,
        mask: c_uint,
        callback: Arc<dyn Fn(TraceEvent) + Send + Sync>,
    ) {
        if let Some(id) = id {
            self.slots.retain(|s| s.id != Some(id));
        }
        if self.slots.len() < MAX_SLOTS {
            self.slots.push(TraceSlot { id, mask, callback });
        }
        self.reinstall(db);
    }

    /// Removes a previously registered slot by id, if present.
    pub(crate) fn unregister(&mut self, db: *mut sqlite3, id: u64) {
        self.slots.retain(|s| s.id != Some(id));
        self.reinstall(db);
    }

    fn combined_mask(&self) -> c_uint {
        self.slots.iter().fold(0, |acc, s| acc | s.mask)
    }

    fn reinstall(&mut self, db: *mut sqlite3) {
        let mask = self.combined_mask();
        if mask == 0 {
            ffi::trace_v2(db, 0, None, null_mut());
        } else {
            ffi::trace_v2(
                db,
                mask,
                Some(trace_trampoline),
                self as *mut TraceRegistry as *mut c_void,
            );
        }
    }

    fn dispatch(&self, kind: c_uint, event: TraceEvent) {
        for slot in &self.slots {
            if slot.mask & kind != 0 {
                (slot.callback)(event.clone());
            }
        }
    }
}

unsafe extern "C" fn trace_trampoline(
    kind: c_uint,
    ctx: *mut c_void,
    p: *mut c_void,
    x: *mut c_void,
) -> c_int {
    // A panicking callback must not unwind across the FFI boundary.
    let _ = catch_unwind(|| {
        // SAFETY: `ctx` is the `TraceRegistry` that installed this trampoline, kept
        // alive by `ConnectionState` for as long as the seat is installed.
        let registry = unsafe { &*(ctx as *const TraceRegistry) };

        let event = match kind {
            SQLITE_TRACE_STMT => {
                // SAFETY: for STMT events `x` is a NUL-terminated expanded SQL string.
                let sql = unsafe { CStr::from_ptr(x as *const c_char) }
                    .to_string_lossy()
                    .into_owned();
                TraceEvent::Stmt(sql)
            }
            SQLITE_TRACE_PROFILE => {
                let stmt = p as *mut sqlite3_stmt;
                // SAFETY: for PROFILE events `x` points to a 64-bit nanosecond count.
                let nanos = unsafe { *(x as *const i64) };
                let sql = unsafe { CStr::from_ptr(ffi::sql(stmt)) }
                    .to_string_lossy()
                    .into_owned();
                TraceEvent::Profile { sql, nanos }
            }
            SQLITE_TRACE_ROW => TraceEvent::Row,
            SQLITE_TRACE_CLOSE => TraceEvent::Close,
            _ => return,
        };

        registry.dispatch(kind, event);
    });
    0
}
