//! Multiplexes many host progress callbacks onto SQLite's single
//! `sqlite3_progress_handler` seat.

use std::ffi::c_void;
use std::os::raw::c_int;
use std::panic::catch_unwind;
use std::ptr::null_mut;
use std::sync::Arc;

use libsqlite3_sys::sqlite3;
use smallvec::SmallVec;

use crate::sqlite::ffi;

const MAX_SLOTS: usize = 1024;

struct ProgressSlot {
    id: Option<u64>,
    nsteps: c_int,
    /// Returns `true` to request that the running statement be interrupted.
    callback: Arc<dyn Fn() -> bool + Send + Sync>,
}

/// Holds every host progress callback registered on a connection and keeps
/// the single engine progress seat installed at `min(nsteps)` across the
/// active entries.
#[derive(Default)]
pub(crate) struct ProgressRegistry {
    slots: SmallVec<[ProgressSlot; 4]>,
}

impl ProgressRegistry {
    pub(crate) fn register(
        &mut self,
        db: *mut sqlite3,
        id: Option<u64>,
        nsteps: c_int,
        callback: Arc<dyn Fn() -> bool + Send + Sync>,
    ) {
        if let Some(id) = id {
            self.slots.retain(|s| s.id != Some(id));
        }
        if self.slots.len() < MAX_SLOTS {
            self.slots.push(ProgressSlot {
                id,
                nsteps: nsteps.max(1),
                callback,
            });
        }
        self.reinstall(db);
    }

    pub(crate) fn unregister(&mut self, db: *mut sqlite3, id: u64) {
        self.slots.retain(|s| s.id != Some(id));
        self.reinstall(db);
    }

    fn min_nsteps(&self) -> Option<c_int> {
        self.slots.iter().map(|s| s.nsteps).min()
    }

    fn reinstall(&mut self, db: *mut sqlite3) {
        match self.min_nsteps() {
            None => ffi::progress_handler(db, 0, None, null_mut()),
            Some(n) => ffi::progress_handler(
                db,
                n,
                Some(progress_trampoline),
                self as *mut ProgressRegistry as *mut c_void,
            ),
        }
    }

    fn dispatch(&self) -> bool {
        self.slots.iter().any(|s| (s.callback)())
    }
}

unsafe extern "C" fn progress_trampoline(ctx: *mut c_void) -> c_int {
    // A panicking callback must not unwind across the FFI boundary; treat it
    // as "do not interrupt" and let the statement keep running.
    let result = catch_unwind(|| {
        // SAFETY: see `TraceRegistry`'s trampoline; same lifetime argument applies.
        let registry = unsafe { &*(ctx as *const ProgressRegistry) };
        registry.dispatch()
    });
    match result {
        Ok(true) => 1,
        Ok(false) | Err(_) => 0,
    }
}
