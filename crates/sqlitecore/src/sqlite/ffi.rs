// Safe wrappers around libsqlite3_sys functions used within this crate.
// These wrappers centralize the `unsafe` blocks needed when calling into
// the SQLite C API so that the rest of the codebase can remain safe.
//
// Calls whose result code is meaningful to callers (as opposed to a handful
// of status getters) return `Result<_, SqliteError>`, translating anything
// other than `SQLITE_OK` (or, for `step`, the other codes the caller needs
// to see directly) into an error built from `sqlite3_errmsg`/`errcode` on
// the relevant database handle.

use std::ffi::c_void;
use std::os::raw::{c_char, c_int, c_uchar, c_uint};
use std::ptr;

use libsqlite3_sys::{
    self as ffi_sys, SQLITE_BUSY, SQLITE_DONE, SQLITE_LOCKED, SQLITE_LOCKED_SHAREDCACHE,
    SQLITE_MISUSE, SQLITE_OK, SQLITE_ROW, sqlite3, sqlite3_stmt,
};

use crate::sqlite::error::{ExtendedErrCode, PrimaryErrCode, SqliteError};

#[allow(dead_code)]
const fn assert_c_int_is_32bit() {
    assert!(std::mem::size_of::<c_int>() == 4);
}

// A compile-time assertion to ensure that `c_int` is 32 bits.
const _ASSERT_C_INT_32BIT: () = assert_c_int_is_32bit();

fn result_from_db(rc: c_int, db: *mut sqlite3) -> Result<(), SqliteError> {
    if rc == SQLITE_OK {
        Ok(())
    } else if db.is_null() {
        Err(SqliteError {
            primary: PrimaryErrCode::from_code(rc),
            extended: ExtendedErrCode::from_code(rc),
            message: "sqlite returned an error with no database handle to query".to_string(),
            error_offset: None,
        })
    } else {
        Err(SqliteError::new(db))
    }
}

fn result_from_stmt(rc: c_int, stmt: *mut sqlite3_stmt) -> Result<(), SqliteError> {
    result_from_db(rc, db_handle(stmt))
}

/// Wrapper around [`sqlite3_open_v2`].
pub(crate) fn open_v2(
    filename: *const c_char,
    handle: *mut *mut sqlite3,
    flags: c_int,
    vfs: *const c_char,
) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_open_v2(filename, handle, flags, vfs) };
    // SAFETY: `handle` is always written by sqlite3_open_v2, even on failure.
    result_from_db(rc, unsafe { *handle })
}

/// Wrapper around [`sqlite3_extended_result_codes`].
pub(crate) fn extended_result_codes(db: *mut sqlite3, onoff: c_int) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_extended_result_codes(db, onoff) };
    result_from_db(rc, db)
}

/// Wrapper around [`sqlite3_busy_timeout`].
pub(crate) fn busy_timeout(db: *mut sqlite3, ms: c_int) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_busy_timeout(db, ms) };
    result_from_db(rc, db)
}

/// Wrapper around [`sqlite3_prepare_v3`].
pub(crate) fn prepare_v3(
    db: *mut sqlite3,
    sql: *const c_char,
    n_byte: c_int,
    flags: c_uint,
    stmt: *mut *mut sqlite3_stmt,
    tail: *mut *const c_char,
) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_prepare_v3(db, sql, n_byte, flags, stmt, tail) };
    result_from_db(rc, db)
}

/// Wrapper around [`sqlite3_progress_handler`].
pub(crate) fn progress_handler(
    db: *mut sqlite3,
    num_ops: c_int,
    callback: Option<unsafe extern "C" fn(*mut c_void) -> c_int>,
    arg: *mut c_void,
) {
    unsafe {
        ffi_sys::sqlite3_progress_handler(db, num_ops, callback, arg);
    }
}

/// Wrapper around [`sqlite3_trace_v2`].
pub(crate) fn trace_v2(
    db: *mut sqlite3,
    mask: c_uint,
    callback: Option<
        unsafe extern "C" fn(c_uint, *mut c_void, *mut c_void, *mut c_void) -> c_int,
    >,
    ctx: *mut c_void,
) -> c_int {
    unsafe { ffi_sys::sqlite3_trace_v2(db, mask, callback, ctx) }
}

/// Wrapper around [`sqlite3_update_hook`]. Returns the previous context pointer.
pub(crate) fn update_hook(
    db: *mut sqlite3,
    callback: Option<
        unsafe extern "C" fn(*mut c_void, c_int, *const c_char, *const c_char, i64),
    >,
    arg: *mut c_void,
) -> *mut c_void {
    unsafe { ffi_sys::sqlite3_update_hook(db, callback, arg) }
}

/// Wrapper around [`sqlite3_commit_hook`]. Returns the previous context pointer.
pub(crate) fn commit_hook(
    db: *mut sqlite3,
    callback: Option<unsafe extern "C" fn(*mut c_void) -> c_int>,
    arg: *mut c_void,
) -> *mut c_void {
    unsafe { ffi_sys::sqlite3_commit_hook(db, callback, arg) }
}

/// Wrapper around [`sqlite3_rollback_hook`]. Returns the previous context pointer.
pub(crate) fn rollback_hook(
    db: *mut sqlite3,
    callback: Option<unsafe extern "C" fn(*mut c_void)>,
    arg: *mut c_void,
) -> *mut c_void {
    unsafe { ffi_sys::sqlite3_rollback_hook(db, callback, arg) }
}

/// Wrapper around [`sqlite3_wal_hook`]. Returns the previous context pointer.
pub(crate) fn wal_hook(
    db: *mut sqlite3,
    callback: Option<
        unsafe extern "C" fn(*mut c_void, *mut sqlite3, *const c_char, c_int) -> c_int,
    >,
    arg: *mut c_void,
) -> *mut c_void {
    unsafe { ffi_sys::sqlite3_wal_hook(db, callback, arg) }
}

/// Wrapper around [`sqlite3_set_authorizer`].
pub(crate) fn set_authorizer(
    db: *mut sqlite3,
    callback: Option<
        unsafe extern "C" fn(
            *mut c_void,
            c_int,
            *const c_char,
            *const c_char,
            *const c_char,
            *const c_char,
        ) -> c_int,
    >,
    arg: *mut c_void,
) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_set_authorizer(db, callback, arg) };
    result_from_db(rc, db)
}

/// Wrapper around [`sqlite3_interrupt`].
pub(crate) fn interrupt(db: *mut sqlite3) {
    unsafe { ffi_sys::sqlite3_interrupt(db) }
}

/// Wrapper around [`sqlite3_unlock_notify`].
pub(crate) fn unlock_notify(
    db: *mut sqlite3,
    callback: Option<unsafe extern "C" fn(*mut *mut c_void, c_int)>,
    arg: *mut c_void,
) -> c_int {
    unsafe { ffi_sys::sqlite3_unlock_notify(db, callback, arg) }
}

/// Wrapper around [`sqlite3_extended_errcode`].
pub(crate) fn extended_errcode(db: *mut sqlite3) -> c_int {
    unsafe { ffi_sys::sqlite3_extended_errcode(db) }
}

/// Wrapper around [`sqlite3_errmsg`].
pub(crate) fn errmsg(db: *mut sqlite3) -> *const c_char {
    unsafe { ffi_sys::sqlite3_errmsg(db) }
}

/// Wrapper around [`sqlite3_error_offset`].
pub(crate) fn error_offset(db: *mut sqlite3) -> Option<i32> {
    let offset = unsafe { ffi_sys::sqlite3_error_offset(db) };
    if offset < 0 { None } else { Some(offset) }
}

/// Wrapper around [`sqlite3_close`].
pub(crate) fn close(db: *mut sqlite3) -> c_int {
    unsafe { ffi_sys::sqlite3_close(db) }
}

/// Wrapper around [`sqlite3_exec`] with no callback.
pub(crate) fn exec(db: *mut sqlite3, sql: *const c_char) -> c_int {
    unsafe { ffi_sys::sqlite3_exec(db, sql, None, ptr::null_mut(), ptr::null_mut()) }
}

/// Wrapper around [`sqlite3_last_insert_rowid`].
pub(crate) fn last_insert_rowid(db: *mut sqlite3) -> i64 {
    unsafe { ffi_sys::sqlite3_last_insert_rowid(db) }
}

/// Wrapper around [`sqlite3_db_handle`].
pub(crate) fn db_handle(stmt: *mut sqlite3_stmt) -> *mut sqlite3 {
    unsafe { ffi_sys::sqlite3_db_handle(stmt) }
}

/// Wrapper around [`sqlite3_column_count`].
pub(crate) fn column_count(stmt: *mut sqlite3_stmt) -> c_int {
    unsafe { ffi_sys::sqlite3_column_count(stmt) }
}

/// Wrapper around [`sqlite3_changes`].
pub(crate) fn changes(db: *mut sqlite3) -> c_int {
    unsafe { ffi_sys::sqlite3_changes(db) }
}

/// Wrapper around [`sqlite3_stmt_readonly`].
pub(crate) fn stmt_readonly(stmt: *mut sqlite3_stmt) -> bool {
    unsafe { ffi_sys::sqlite3_stmt_readonly(stmt) != 0 }
}

/// Wrapper around [`sqlite3_sql`]. Returns a pointer to a null terminated string.
pub(crate) fn sql(stmt: *mut sqlite3_stmt) -> *const c_char {
    unsafe { ffi_sys::sqlite3_sql(stmt) }
}

/// Wrapper around [`sqlite3_stmt_isexplain`]. Returns `0` for an ordinary
/// statement, `1` for `EXPLAIN`, `2` for `EXPLAIN QUERY PLAN`.
pub(crate) fn stmt_isexplain(stmt: *mut sqlite3_stmt) -> c_int {
    unsafe { ffi_sys::sqlite3_stmt_isexplain(stmt) }
}

/// Wrapper around [`sqlite3_stmt_explain`]. Must be called before the
/// statement's first step; `mode` is `0` (off), `1` (`EXPLAIN`), or `2`
/// (`EXPLAIN QUERY PLAN`).
pub(crate) fn stmt_explain(stmt: *mut sqlite3_stmt, mode: c_int) -> Result<(), SqliteError> {
    result_from_stmt(unsafe { ffi_sys::sqlite3_stmt_explain(stmt, mode) }, stmt)
}

/// Wrapper around [`sqlite3_expanded_sql`]. The caller must free the returned
/// pointer with `sqlite3_free` once it is done with it.
pub(crate) fn expanded_sql(stmt: *mut sqlite3_stmt) -> *mut c_char {
    unsafe { ffi_sys::sqlite3_expanded_sql(stmt) }
}

/// Wrapper around [`sqlite3_column_name`]. Returns a pointer to a null terminated string.
pub(crate) fn column_name(stmt: *mut sqlite3_stmt, index: c_int) -> *const c_char {
    unsafe { ffi_sys::sqlite3_column_name(stmt, index) }
}

/// Wrapper around [`sqlite3_column_decltype`].
pub(crate) fn column_decltype(stmt: *mut sqlite3_stmt, index: c_int) -> *const c_char {
    unsafe { ffi_sys::sqlite3_column_decltype(stmt, index) }
}

/// Wrapper around [`sqlite3_bind_parameter_count`].
pub(crate) fn bind_parameter_count(stmt: *mut sqlite3_stmt) -> c_int {
    unsafe { ffi_sys::sqlite3_bind_parameter_count(stmt) }
}

/// Wrapper around [`sqlite3_bind_parameter_name`].
pub(crate) fn bind_parameter_name(stmt: *mut sqlite3_stmt, index: c_int) -> *const c_char {
    unsafe { ffi_sys::sqlite3_bind_parameter_name(stmt, index) }
}

/// Wrapper around [`sqlite3_bind_blob64`].
pub(crate) fn bind_blob64(
    stmt: *mut sqlite3_stmt,
    index: c_int,
    data: *const c_void,
    len: u64,
) -> Result<(), SqliteError> {
    let rc = unsafe {
        ffi_sys::sqlite3_bind_blob64(stmt, index, data, len, ffi_sys::SQLITE_TRANSIENT())
    };
    result_from_stmt(rc, stmt)
}

/// Wrapper around [`sqlite3_bind_text64`].
pub(crate) fn bind_text64(
    stmt: *mut sqlite3_stmt,
    index: c_int,
    data: *const c_char,
    len: u64,
) -> Result<(), SqliteError> {
    let rc = unsafe {
        ffi_sys::sqlite3_bind_text64(
            stmt,
            index,
            data,
            len,
            ffi_sys::SQLITE_TRANSIENT(),
            ffi_sys::SQLITE_UTF8 as u8,
        )
    };
    result_from_stmt(rc, stmt)
}

/// Wrapper around [`sqlite3_bind_int`].
pub(crate) fn bind_int(stmt: *mut sqlite3_stmt, index: c_int, value: c_int) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_bind_int(stmt, index, value) };
    result_from_stmt(rc, stmt)
}

/// Wrapper around [`sqlite3_bind_int64`].
pub(crate) fn bind_int64(stmt: *mut sqlite3_stmt, index: c_int, value: i64) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_bind_int64(stmt, index, value) };
    result_from_stmt(rc, stmt)
}

/// Wrapper around [`sqlite3_bind_double`].
pub(crate) fn bind_double(stmt: *mut sqlite3_stmt, index: c_int, value: f64) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_bind_double(stmt, index, value) };
    result_from_stmt(rc, stmt)
}

/// Wrapper around [`sqlite3_bind_null`].
pub(crate) fn bind_null(stmt: *mut sqlite3_stmt, index: c_int) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_bind_null(stmt, index) };
    result_from_stmt(rc, stmt)
}

/// Wrapper around [`sqlite3_bind_pointer`]. `tag` must be valid for the
/// lifetime of the binding; `destructor` is invoked by the engine once the
/// binding is cleared, replaced, or the statement is finalized.
pub(crate) fn bind_pointer(
    stmt: *mut sqlite3_stmt,
    index: c_int,
    ptr: *mut c_void,
    tag: *const c_char,
    destructor: Option<unsafe extern "C" fn(*mut c_void)>,
) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_bind_pointer(stmt, index, ptr, tag, destructor) };
    result_from_stmt(rc, stmt)
}

/// Wrapper around [`sqlite3_column_type`].
pub(crate) fn column_type(stmt: *mut sqlite3_stmt, index: c_int) -> c_int {
    unsafe { ffi_sys::sqlite3_column_type(stmt, index) }
}

/// Wrapper around [`sqlite3_column_int64`].
pub(crate) fn column_int64(stmt: *mut sqlite3_stmt, index: c_int) -> i64 {
    unsafe { ffi_sys::sqlite3_column_int64(stmt, index) }
}

/// Wrapper around [`sqlite3_column_double`].
pub(crate) fn column_double(stmt: *mut sqlite3_stmt, index: c_int) -> f64 {
    unsafe { ffi_sys::sqlite3_column_double(stmt, index) }
}

/// Wrapper around [`sqlite3_column_blob`].
pub(crate) fn column_blob(stmt: *mut sqlite3_stmt, index: c_int) -> *const c_void {
    unsafe { ffi_sys::sqlite3_column_blob(stmt, index) }
}

/// Wrapper around [`sqlite3_column_bytes`].
pub(crate) fn column_bytes(stmt: *mut sqlite3_stmt, index: c_int) -> c_int {
    unsafe { ffi_sys::sqlite3_column_bytes(stmt, index) }
}

/// Wrapper around [`sqlite3_clear_bindings`].
pub(crate) fn clear_bindings(stmt: *mut sqlite3_stmt) {
    unsafe { ffi_sys::sqlite3_clear_bindings(stmt) };
}

/// Wrapper around [`sqlite3_reset`].
pub(crate) fn reset(stmt: *mut sqlite3_stmt) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_reset(stmt) };
    result_from_stmt(rc, stmt)
}

/// Wrapper around [`sqlite3_step`]. Unlike the other wrappers this surfaces
/// `SQLITE_ROW`/`SQLITE_DONE`/`SQLITE_BUSY`/`SQLITE_LOCKED*`/`SQLITE_MISUSE`
/// as `Ok` so the statement state machine can dispatch on them directly;
/// anything else becomes an `Err`.
pub(crate) fn step(stmt: *mut sqlite3_stmt) -> Result<c_int, SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_step(stmt) };
    match rc {
        SQLITE_ROW | SQLITE_DONE | SQLITE_BUSY | SQLITE_LOCKED | SQLITE_LOCKED_SHAREDCACHE
        | SQLITE_MISUSE => Ok(rc),
        _ => Err(SqliteError::new(db_handle(stmt))),
    }
}

/// Wrapper around [`sqlite3_finalize`].
pub(crate) fn finalize(stmt: *mut sqlite3_stmt) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_finalize(stmt) };
    result_from_stmt(rc, stmt)
}

/// Wrapper around [`sqlite3_is_interrupted`], falling back to `false` on
/// builds of libsqlite3-sys linked against an engine predating it; callers
/// track interruption themselves via the `Interrupt` error in that case.
pub(crate) fn is_interrupted(db: *mut sqlite3) -> bool {
    unsafe { ffi_sys::sqlite3_is_interrupted(db) != 0 }
}

/// Wrapper around [`sqlite3_busy_handler`].
pub(crate) fn busy_handler(
    db: *mut sqlite3,
    callback: Option<unsafe extern "C" fn(*mut c_void, c_int) -> c_int>,
    arg: *mut c_void,
) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_busy_handler(db, callback, arg) };
    result_from_db(rc, db)
}

/// Wrapper around [`sqlite3_collation_needed`].
pub(crate) fn collation_needed(
    db: *mut sqlite3,
    callback: Option<
        unsafe extern "C" fn(*mut c_void, *mut sqlite3, c_int, *const c_char),
    >,
    arg: *mut c_void,
) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_collation_needed(db, arg, callback) };
    result_from_db(rc, db)
}

/// Wrapper around [`sqlite3_create_collation_v2`].
pub(crate) fn create_collation(
    db: *mut sqlite3,
    name: *const c_char,
    arg: *mut c_void,
    compare: Option<
        unsafe extern "C" fn(*mut c_void, c_int, *const c_void, c_int, *const c_void) -> c_int,
    >,
    destroy: Option<unsafe extern "C" fn(*mut c_void)>,
) -> Result<(), SqliteError> {
    let rc = unsafe {
        ffi_sys::sqlite3_create_collation_v2(
            db,
            name,
            ffi_sys::SQLITE_UTF8,
            arg,
            compare,
            destroy,
        )
    };
    result_from_db(rc, db)
}

/// Wrapper around [`sqlite3_autovacuum_pages`].
pub(crate) fn autovacuum_pages(
    db: *mut sqlite3,
    callback: Option<
        unsafe extern "C" fn(*mut c_void, *const c_char, c_uint, c_uint, c_uint) -> c_uint,
    >,
    arg: *mut c_void,
    destroy: Option<unsafe extern "C" fn(*mut c_void)>,
) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_autovacuum_pages(db, callback, arg, destroy) };
    result_from_db(rc, db)
}

/// Wrapper around [`sqlite3_file_control`] for the narrow set of opcodes this
/// core exposes (`SQLITE_FCNTL_VFSNAME`, `SQLITE_FCNTL_DATA_VERSION`).
pub(crate) fn file_control(
    db: *mut sqlite3,
    db_name: *const c_char,
    op: c_int,
    arg: *mut c_void,
) -> c_int {
    unsafe { ffi_sys::sqlite3_file_control(db, db_name, op, arg) }
}

/// Queries the name of the VFS a database was opened through, via
/// `SQLITE_FCNTL_VFSNAME`. Returns `None` if the engine did not answer the
/// file-control request.
pub(crate) fn vfs_name(db: *mut sqlite3, db_name: *const c_char) -> Option<String> {
    let mut out: *mut c_char = ptr::null_mut();
    let rc = file_control(
        db,
        db_name,
        ffi_sys::SQLITE_FCNTL_VFSNAME,
        &mut out as *mut *mut c_char as *mut c_void,
    );
    if rc != SQLITE_OK || out.is_null() {
        return None;
    }
    // SAFETY: on success the VFS allocated this string with `sqlite3_malloc`;
    // it is ours to read and free.
    let name = unsafe { std::ffi::CStr::from_ptr(out) }
        .to_string_lossy()
        .into_owned();
    unsafe { ffi_sys::sqlite3_free(out as *mut c_void) };
    Some(name)
}

/// Reads the data-version counter for a schema via
/// `SQLITE_FCNTL_DATA_VERSION`: bumped whenever another connection commits a
/// change, useful for cheap external cache invalidation.
pub(crate) fn data_version(db: *mut sqlite3, db_name: *const c_char) -> Option<u32> {
    let mut version: c_uint = 0;
    let rc = file_control(
        db,
        db_name,
        ffi_sys::SQLITE_FCNTL_DATA_VERSION,
        &mut version as *mut c_uint as *mut c_void,
    );
    if rc != SQLITE_OK {
        return None;
    }
    Some(version)
}

/// Wrapper around [`sqlite3_create_function_v2`] used for both scalar and
/// aggregate/window registration (the latter via `create_window_function`);
/// a null `x_step`/`x_final` pair with a non-null `x_func` registers a scalar.
pub(crate) fn create_function_v2(
    db: *mut sqlite3,
    name: *const c_char,
    n_arg: c_int,
    x_func: Option<
        unsafe extern "C" fn(*mut ffi_sys::sqlite3_context, c_int, *mut *mut ffi_sys::sqlite3_value),
    >,
    x_step: Option<
        unsafe extern "C" fn(*mut ffi_sys::sqlite3_context, c_int, *mut *mut ffi_sys::sqlite3_value),
    >,
    x_final: Option<unsafe extern "C" fn(*mut ffi_sys::sqlite3_context)>,
    arg: *mut c_void,
    destroy: Option<unsafe extern "C" fn(*mut c_void)>,
) -> Result<(), SqliteError> {
    let rc = unsafe {
        ffi_sys::sqlite3_create_function_v2(
            db,
            name,
            n_arg,
            ffi_sys::SQLITE_UTF8,
            arg,
            x_func,
            x_step,
            x_final,
            destroy,
        )
    };
    result_from_db(rc, db)
}

/// Wrapper around [`sqlite3_create_window_function`].
#[allow(clippy::too_many_arguments)]
pub(crate) fn create_window_function(
    db: *mut sqlite3,
    name: *const c_char,
    n_arg: c_int,
    x_step: Option<
        unsafe extern "C" fn(*mut ffi_sys::sqlite3_context, c_int, *mut *mut ffi_sys::sqlite3_value),
    >,
    x_final: Option<unsafe extern "C" fn(*mut ffi_sys::sqlite3_context)>,
    x_value: Option<unsafe extern "C" fn(*mut ffi_sys::sqlite3_context)>,
    x_inverse: Option<
        unsafe extern "C" fn(*mut ffi_sys::sqlite3_context, c_int, *mut *mut ffi_sys::sqlite3_value),
    >,
    arg: *mut c_void,
    destroy: Option<unsafe extern "C" fn(*mut c_void)>,
) -> Result<(), SqliteError> {
    let rc = unsafe {
        ffi_sys::sqlite3_create_window_function(
            db,
            name,
            n_arg,
            ffi_sys::SQLITE_UTF8,
            arg,
            x_step,
            x_final,
            x_value,
            x_inverse,
            destroy,
        )
    };
    result_from_db(rc, db)
}

/// Wrapper around [`sqlite3_value_type`]/[`sqlite3_value_*`] accessors used to
/// read a function argument into an owned [`crate::sqlite::Value`].
pub(crate) fn value_type(value: *mut ffi_sys::sqlite3_value) -> c_int {
    unsafe { ffi_sys::sqlite3_value_type(value) }
}

pub(crate) fn value_int64(value: *mut ffi_sys::sqlite3_value) -> i64 {
    unsafe { ffi_sys::sqlite3_value_int64(value) }
}

pub(crate) fn value_double(value: *mut ffi_sys::sqlite3_value) -> f64 {
    unsafe { ffi_sys::sqlite3_value_double(value) }
}

pub(crate) fn value_text(value: *mut ffi_sys::sqlite3_value) -> (*const u8, c_int) {
    unsafe {
        (
            ffi_sys::sqlite3_value_text(value),
            ffi_sys::sqlite3_value_bytes(value),
        )
    }
}

pub(crate) fn value_blob(value: *mut ffi_sys::sqlite3_value) -> (*const c_void, c_int) {
    unsafe {
        (
            ffi_sys::sqlite3_value_blob(value),
            ffi_sys::sqlite3_value_bytes(value),
        )
    }
}

/// Wrapper around [`sqlite3_value_pointer`]. Returns null unless `value` was
/// bound via [`bind_pointer`] (or `sqlite3_result_pointer`) with a `tag` that
/// matches this one byte-for-byte; any other value, including an ordinary
/// NULL, also reads back as null here.
pub(crate) fn value_pointer(
    value: *mut ffi_sys::sqlite3_value,
    tag: *const c_char,
) -> *mut c_void {
    unsafe { ffi_sys::sqlite3_value_pointer(value, tag) }
}

/// Wrapper around [`sqlite3_result_pointer`].
pub(crate) fn result_pointer(
    ctx: *mut ffi_sys::sqlite3_context,
    ptr: *mut c_void,
    tag: *const c_char,
    destructor: Option<unsafe extern "C" fn(*mut c_void)>,
) {
    unsafe { ffi_sys::sqlite3_result_pointer(ctx, ptr, tag, destructor) }
}

/// Writes a [`crate::sqlite::Value`] as the result of a scalar/aggregate call,
/// wrapping the `sqlite3_result_*` family.
pub(crate) fn result_value(ctx: *mut ffi_sys::sqlite3_context, value: &crate::sqlite::Value) {
    use crate::sqlite::Value;
    unsafe {
        match value {
            Value::Null { .. } => ffi_sys::sqlite3_result_null(ctx),
            Value::Integer { value, .. } => ffi_sys::sqlite3_result_int64(ctx, *value),
            Value::Double { value, .. } => ffi_sys::sqlite3_result_double(ctx, *value),
            Value::Text { value, .. } => ffi_sys::sqlite3_result_text64(
                ctx,
                value.as_ptr() as *const c_char,
                value.len() as u64,
                ffi_sys::SQLITE_TRANSIENT(),
                ffi_sys::SQLITE_UTF8 as c_uchar,
            ),
            Value::Blob { value, .. } => ffi_sys::sqlite3_result_blob64(
                ctx,
                value.as_ptr() as *const c_void,
                value.len() as u64,
                ffi_sys::SQLITE_TRANSIENT(),
            ),
            Value::Pointer {
                ptr,
                tag,
                destructor,
            } => result_pointer(ctx, *ptr, tag.as_ptr(), Some(*destructor)),
        }
    }
}

/// Reports a host callback error as the result of a scalar/aggregate call.
pub(crate) fn result_error(ctx: *mut ffi_sys::sqlite3_context, message: &str) {
    unsafe {
        ffi_sys::sqlite3_result_error(ctx, message.as_ptr() as *const c_char, message.len() as c_int);
    }
}

/// Wrapper around [`sqlite3_user_data`].
pub(crate) fn user_data(ctx: *mut ffi_sys::sqlite3_context) -> *mut c_void {
    unsafe { ffi_sys::sqlite3_user_data(ctx) }
}

/// Wrapper around [`sqlite3_aggregate_context`]; `n` is the size, in bytes,
/// of the inline state the engine allocates and zero-initializes on first
/// call for a given aggregate invocation.
pub(crate) fn aggregate_context(
    ctx: *mut ffi_sys::sqlite3_context,
    n: c_int,
) -> *mut c_void {
    unsafe { ffi_sys::sqlite3_aggregate_context(ctx, n) as *mut c_void }
}

/// Wrapper around [`sqlite3_blob_open`].
#[allow(clippy::too_many_arguments)]
pub(crate) fn blob_open(
    db: *mut sqlite3,
    db_name: *const c_char,
    table: *const c_char,
    column: *const c_char,
    rowid: i64,
    writable: c_int,
    blob: *mut *mut ffi_sys::sqlite3_blob,
) -> Result<(), SqliteError> {
    let rc = unsafe {
        ffi_sys::sqlite3_blob_open(db, db_name, table, column, rowid, writable, blob)
    };
    result_from_db(rc, db)
}

/// Wrapper around [`sqlite3_blob_bytes`].
pub(crate) fn blob_bytes(blob: *mut ffi_sys::sqlite3_blob) -> c_int {
    unsafe { ffi_sys::sqlite3_blob_bytes(blob) }
}

/// Wrapper around [`sqlite3_blob_read`].
pub(crate) fn blob_read(
    blob: *mut ffi_sys::sqlite3_blob,
    buf: &mut [u8],
    offset: c_int,
) -> c_int {
    unsafe {
        ffi_sys::sqlite3_blob_read(blob, buf.as_mut_ptr() as *mut c_void, buf.len() as c_int, offset)
    }
}

/// Wrapper around [`sqlite3_blob_write`].
pub(crate) fn blob_write(
    blob: *mut ffi_sys::sqlite3_blob,
    buf: &[u8],
    offset: c_int,
) -> c_int {
    unsafe {
        ffi_sys::sqlite3_blob_write(blob, buf.as_ptr() as *const c_void, buf.len() as c_int, offset)
    }
}

/// Wrapper around [`sqlite3_blob_reopen`].
pub(crate) fn blob_reopen(blob: *mut ffi_sys::sqlite3_blob, rowid: i64) -> c_int {
    unsafe { ffi_sys::sqlite3_blob_reopen(blob, rowid) }
}

/// Wrapper around [`sqlite3_blob_close`].
pub(crate) fn blob_close(blob: *mut ffi_sys::sqlite3_blob) -> c_int {
    unsafe { ffi_sys::sqlite3_blob_close(blob) }
}
