//! Thin owning wrappers around the engine's single-seat hooks: each one
//! replaces the previous host callback on registration and uninstalls the
//! engine seat when set to `None`, mirroring how `sqlite3_commit_hook` et al.
//! behave natively.

use std::ffi::{CStr, c_void};
use std::os::raw::{c_char, c_int, c_uint};
use std::panic::catch_unwind;
use std::ptr::null_mut;

use libsqlite3_sys::{self, SQLITE_OK, sqlite3};

use crate::sqlite::ffi;

/// The kind of row-level change reported to an update hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    Insert,
    Update,
    Delete,
}

impl RowChange {
    fn from_opcode(op: c_int) -> Option<Self> {
        match op {
            libsqlite3_sys::SQLITE_INSERT => Some(Self::Insert),
            libsqlite3_sys::SQLITE_UPDATE => Some(Self::Update),
            libsqlite3_sys::SQLITE_DELETE => Some(Self::Delete),
            _ => None,
        }
    }
}

macro_rules! single_seat_hook {
    ($name:ident, $cb_trait:ty, $trampoline:ident, $install:path) => {
        #[derive(Default)]
        pub(crate) struct $name {
            callback: Option<Box<$cb_trait>>,
        }

        impl $name {
            pub(crate) fn set(&mut self, db: *mut sqlite3, callback: Option<Box<$cb_trait>>) {
                self.callback = callback;
                if self.callback.is_some() {
                    $install(db, Some($trampoline), self as *mut Self as *mut c_void);
                } else {
                    $install(db, None, null_mut());
                }
            }
        }
    };
}

single_seat_hook!(
    CommitHook,
    dyn FnMut() -> Result<bool, String> + Send,
    commit_trampoline,
    ffi::commit_hook
);

unsafe extern "C" fn commit_trampoline(ctx: *mut c_void) -> c_int {
    // A panicking callback must not unwind across the FFI boundary; treat it
    // the same as a host error, which aborts the commit.
    let result = catch_unwind(|| {
        // SAFETY: `ctx` is the `CommitHook` that installed this trampoline, owned
        // by the same `ConnectionState` that owns the engine handle.
        let hook = unsafe { &mut *(ctx as *mut CommitHook) };
        hook.callback.as_mut().map(|cb| cb())
    });
    match result {
        // A host error aborts the commit, turning it into a rollback, same
        // as an explicit `Ok(true)`.
        Ok(Some(Ok(abort))) => abort as c_int,
        Ok(Some(Err(message))) => {
            tracing::error!(%message, "commit hook callback failed; aborting commit");
            1
        }
        Ok(None) => 0,
        Err(_) => {
            tracing::error!("commit hook callback panicked; aborting commit");
            1
        }
    }
}

single_seat_hook!(
    RollbackHook,
    dyn FnMut() -> Result<(), String> + Send,
    rollback_trampoline,
    ffi::rollback_hook
);

unsafe extern "C" fn rollback_trampoline(ctx: *mut c_void) {
    // The engine does not accept a return value here, so neither a host
    // error nor a panic can abort the rollback already in progress; both are
    // reported as unraisable.
    let result = catch_unwind(|| {
        let hook = unsafe { &mut *(ctx as *mut RollbackHook) };
        hook.callback.as_mut().map(|cb| cb())
    });
    match result {
        Ok(Some(Err(message))) => tracing::error!(%message, "rollback hook callback failed"),
        Ok(_) => {}
        Err(_) => tracing::error!("rollback hook callback panicked"),
    }
}

single_seat_hook!(
    UpdateHook,
    dyn FnMut(RowChange, &str, &str, i64) -> Result<(), String> + Send,
    update_trampoline,
    ffi::update_hook
);

unsafe extern "C" fn update_trampoline(
    ctx: *mut c_void,
    op: c_int,
    db_name: *const c_char,
    table_name: *const c_char,
    rowid: i64,
) {
    let Some(change) = RowChange::from_opcode(op) else {
        return;
    };
    // The engine does not accept a return value from the update hook either;
    // a host error or panic is reported as unraisable.
    let result = catch_unwind(|| {
        let hook = unsafe { &mut *(ctx as *mut UpdateHook) };
        hook.callback.as_mut().map(|cb| {
            // SAFETY: both strings are NUL-terminated UTF-8 schema/table names
            // supplied by the engine for the lifetime of this callback.
            let db_name = unsafe { CStr::from_ptr(db_name) }.to_string_lossy();
            let table_name = unsafe { CStr::from_ptr(table_name) }.to_string_lossy();
            cb(change, &db_name, &table_name, rowid)
        })
    });
    match result {
        Ok(Some(Err(message))) => tracing::error!(%message, "update hook callback failed"),
        Ok(_) => {}
        Err(_) => tracing::error!("update hook callback panicked"),
    }
}

single_seat_hook!(
    WalHook,
    dyn FnMut(&str, c_int) -> Result<c_int, String> + Send,
    wal_trampoline,
    ffi::wal_hook
);

unsafe extern "C" fn wal_trampoline(
    ctx: *mut c_void,
    _db: *mut sqlite3,
    db_name: *const c_char,
    n_pages: c_int,
) -> c_int {
    let result = catch_unwind(|| {
        let hook = unsafe { &mut *(ctx as *mut WalHook) };
        hook.callback.as_mut().map(|cb| {
            // SAFETY: `db_name` is a NUL-terminated schema name valid for this call.
            let db_name = unsafe { CStr::from_ptr(db_name) }.to_string_lossy();
            cb(&db_name, n_pages)
        })
    });
    match result {
        Ok(Some(Ok(code))) => code,
        Ok(Some(Err(message))) => {
            tracing::error!(%message, "WAL hook callback failed; aborting checkpoint");
            libsqlite3_sys::SQLITE_ERROR
        }
        Ok(None) => SQLITE_OK,
        Err(_) => {
            tracing::error!("WAL hook callback panicked; aborting checkpoint");
            libsqlite3_sys::SQLITE_ERROR
        }
    }
}

/// Owning wrapper around `sqlite3_busy_handler`: a custom alternative to the
/// simple millisecond timeout (`sqlite3_busy_timeout`) for deciding whether
/// to keep retrying a locked/busy operation.
#[derive(Default)]
pub(crate) struct BusyHandler {
    callback: Option<Box<dyn FnMut(i32) -> bool + Send>>,
}

impl BusyHandler {
    pub(crate) fn set(
        &mut self,
        db: *mut sqlite3,
        callback: Option<Box<dyn FnMut(i32) -> bool + Send>>,
    ) -> Result<(), crate::error::Error> {
        self.callback = callback;
        let trampoline = self.callback.is_some().then_some(busy_trampoline as _);
        let arg = if self.callback.is_some() {
            self as *mut Self as *mut c_void
        } else {
            null_mut()
        };
        ffi::busy_handler(db, trampoline, arg).map_err(crate::error::Error::from)
    }
}

unsafe extern "C" fn busy_trampoline(ctx: *mut c_void, count: c_int) -> c_int {
    let result = catch_unwind(|| {
        let hook = unsafe { &mut *(ctx as *mut BusyHandler) };
        hook.callback.as_mut().map(|cb| cb(count))
    });
    match result {
        // Non-zero asks the engine to retry; zero gives up and surfaces `SQLITE_BUSY`.
        Ok(Some(true)) => 1,
        Ok(Some(false)) | Ok(None) => 0,
        Err(_) => {
            tracing::error!("busy handler callback panicked; giving up");
            0
        }
    }
}

/// What an authorizer callback decided about the action it was asked to vet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allow,
    Deny,
    Ignore,
}

impl AuthDecision {
    fn to_code(self) -> c_int {
        match self {
            AuthDecision::Allow => libsqlite3_sys::SQLITE_OK,
            AuthDecision::Deny => libsqlite3_sys::SQLITE_DENY,
            AuthDecision::Ignore => libsqlite3_sys::SQLITE_IGNORE,
        }
    }
}

type AuthCallback = dyn FnMut(
        c_int,
        Option<&str>,
        Option<&str>,
        Option<&str>,
        Option<&str>,
    ) -> Result<AuthDecision, String>
    + Send;

/// Owning wrapper around `sqlite3_set_authorizer`. A host error while
/// deciding an action denies it outright, per the specification's "authorizer
/// denies on any host error" rule.
#[derive(Default)]
pub(crate) struct Authorizer {
    callback: Option<Box<AuthCallback>>,
}

impl Authorizer {
    pub(crate) fn set(
        &mut self,
        db: *mut sqlite3,
        callback: Option<Box<AuthCallback>>,
    ) -> Result<(), crate::error::Error> {
        self.callback = callback;
        let trampoline = self.callback.is_some().then_some(authorizer_trampoline as _);
        let arg = if self.callback.is_some() {
            self as *mut Self as *mut c_void
        } else {
            null_mut()
        };
        crate::sqlite::ffi::set_authorizer(db, trampoline, arg).map_err(crate::error::Error::from)
    }
}

unsafe fn opt_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        None
    } else {
        // SAFETY: non-null arguments are NUL-terminated UTF-8 for this call.
        Some(unsafe { CStr::from_ptr(ptr) }.to_str().unwrap_or(""))
    }
}

unsafe extern "C" fn authorizer_trampoline(
    ctx: *mut c_void,
    action: c_int,
    arg1: *const c_char,
    arg2: *const c_char,
    arg3: *const c_char,
    arg4: *const c_char,
) -> c_int {
    let result = catch_unwind(|| {
        let hook = unsafe { &mut *(ctx as *mut Authorizer) };
        hook.callback.as_mut().map(|cb| {
            // SAFETY: all four arguments, when non-null, are valid for this call only.
            let (a1, a2, a3, a4) = unsafe {
                (
                    opt_str(arg1),
                    opt_str(arg2),
                    opt_str(arg3),
                    opt_str(arg4),
                )
            };
            cb(action, a1, a2, a3, a4)
        })
    });
    match result {
        Ok(Some(Ok(decision))) => decision.to_code(),
        Ok(Some(Err(message))) => {
            tracing::error!(%message, "authorizer callback failed; denying action");
            libsqlite3_sys::SQLITE_DENY
        }
        Ok(None) => libsqlite3_sys::SQLITE_OK,
        Err(_) => {
            tracing::error!("authorizer callback panicked; denying action");
            libsqlite3_sys::SQLITE_DENY
        }
    }
}

/// Owning wrapper around `sqlite3_autovacuum_pages`: asked, after each commit
/// on an auto-vacuum-enabled database, how many of the free pages at the end
/// of the file to actually truncate away.
#[derive(Default)]
pub(crate) struct AutovacuumPagesHook {
    callback: Option<Box<dyn FnMut(&str, u32, u32, u32) -> u32 + Send>>,
}

impl AutovacuumPagesHook {
    pub(crate) fn set(
        &mut self,
        db: *mut sqlite3,
        callback: Option<Box<dyn FnMut(&str, u32, u32, u32) -> u32 + Send>>,
    ) -> Result<(), crate::error::Error> {
        self.callback = callback;
        let trampoline = self
            .callback
            .is_some()
            .then_some(autovacuum_trampoline as _);
        let arg = if self.callback.is_some() {
            self as *mut Self as *mut c_void
        } else {
            null_mut()
        };
        crate::sqlite::ffi::autovacuum_pages(db, trampoline, arg, None)
            .map_err(crate::error::Error::from)
    }
}

unsafe extern "C" fn autovacuum_trampoline(
    ctx: *mut c_void,
    schema: *const c_char,
    page_count: c_uint,
    free_pages: c_uint,
    page_size: c_uint,
) -> c_uint {
    let result = catch_unwind(|| {
        let hook = unsafe { &mut *(ctx as *mut AutovacuumPagesHook) };
        hook.callback.as_mut().map(|cb| {
            // SAFETY: `schema` is a NUL-terminated schema name valid for this call.
            let schema = unsafe { CStr::from_ptr(schema) }.to_string_lossy();
            cb(&schema, page_count, free_pages, page_size)
        })
    });
    match result {
        Ok(Some(n)) => n,
        Ok(None) => 0,
        Err(_) => {
            tracing::error!("autovacuum pages callback panicked; truncating nothing");
            0
        }
    }
}
