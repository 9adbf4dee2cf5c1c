//! Scalar, aggregate, and window function registration.
//!
//! This subsystem is net-new relative to the upstream driver this core
//! descends from (which never exposes user-defined functions or collations)
//! and is built in the same FFI-wrapper idiom as the rest of `sqlite::hooks`:
//! a boxed Rust closure is handed to the engine as `void*` user data, with a
//! matching destructor trampoline freeing it when the function is replaced,
//! removed, or the connection closes.

use std::ffi::{CString, c_void};
use std::mem::size_of;
use std::os::raw::c_int;
use std::panic::catch_unwind;

use libsqlite3_sys::{
    SQLITE_BLOB, SQLITE_FLOAT, SQLITE_INTEGER, SQLITE_NULL, SQLITE_TEXT, sqlite3, sqlite3_context,
    sqlite3_value,
};

use crate::error::Error;
use crate::sqlite::Value;
use crate::sqlite::ffi;

fn read_value(v: *mut sqlite3_value) -> Value {
    match ffi::value_type(v) {
        SQLITE_NULL => Value::Null { type_info: None },
        SQLITE_INTEGER => Value::Integer {
            value: ffi::value_int64(v),
            type_info: None,
        },
        SQLITE_FLOAT => Value::Double {
            value: ffi::value_double(v),
            type_info: None,
        },
        SQLITE_TEXT => {
            let (ptr, len) = ffi::value_text(v);
            // SAFETY: `ptr` is valid for `len` bytes for the duration of this call.
            let bytes = unsafe { std::slice::from_raw_parts(ptr, len.max(0) as usize) };
            Value::Text {
                value: String::from_utf8_lossy(bytes).into_owned(),
                type_info: None,
            }
        }
        SQLITE_BLOB => {
            let (ptr, len) = ffi::value_blob(v);
            // SAFETY: same as above, for an arbitrary byte buffer.
            let bytes =
                unsafe { std::slice::from_raw_parts(ptr as *const u8, len.max(0) as usize) };
            Value::Blob {
                value: bytes.to_vec(),
                type_info: None,
            }
        }
        _ => Value::Null { type_info: None },
    }
}

fn collect_args(argc: c_int, argv: *mut *mut sqlite3_value) -> Vec<Value> {
    (0..argc as isize)
        .map(|i| {
            // SAFETY: the engine guarantees `argv[0..argc]` are valid for the call.
            let v = unsafe { *argv.offset(i) };
            read_value(v)
        })
        .collect()
}

fn c_name(name: &str) -> Result<CString, Error> {
    CString::new(name).map_err(|_| Error::Protocol("function name contains a NUL byte".into()))
}

unsafe extern "C" fn destroy_trampoline<T>(ptr: *mut c_void) {
    // SAFETY: `ptr` is the `Box<T>` leaked by the matching registration call.
    drop(unsafe { Box::from_raw(ptr as *mut T) });
}

/// Registers a scalar SQL function. `n_arg` of `-1` accepts any argument count.
pub(crate) fn register_scalar<F>(
    db: *mut sqlite3,
    name: &str,
    n_arg: i32,
    func: F,
) -> Result<(), Error>
where
    F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
{
    unsafe extern "C" fn call<F>(
        ctx: *mut sqlite3_context,
        argc: c_int,
        argv: *mut *mut sqlite3_value,
    ) where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync,
    {
        let result = catch_unwind(|| {
            // SAFETY: `user_data` is the `F` boxed by `register_scalar`, kept alive by
            // the engine for as long as the function is registered.
            let f = unsafe { &*(ffi::user_data(ctx) as *const F) };
            let args = collect_args(argc, argv);
            f(&args)
        });
        match result {
            Ok(Ok(v)) => ffi::result_value(ctx, &v),
            Ok(Err(e)) => ffi::result_error(ctx, &e),
            Err(_) => ffi::result_error(ctx, "scalar function panicked"),
        }
    }

    let cname = c_name(name)?;
    let boxed = Box::into_raw(Box::new(func));
    ffi::create_function_v2(
        db,
        cname.as_ptr(),
        n_arg,
        Some(call::<F>),
        None,
        None,
        boxed as *mut c_void,
        Some(destroy_trampoline::<F>),
    )
    .map_err(Error::from)
}

/// Per-row state for a `GROUP BY`/aggregate invocation.
///
/// `finalize` consumes `self`, matching the engine's guarantee that `xFinal`
/// runs at most once per aggregate invocation and is solely responsible for
/// releasing any state accumulated in `step`.
pub trait Aggregate: Send {
    fn step(&mut self, args: &[Value]) -> Result<(), String>;
    fn finalize(self: Box<Self>) -> Result<Value, String>;
}

/// Extends [`Aggregate`] with the `xValue`/`xInverse` callbacks SQLite's
/// window-function machinery needs to support a sliding frame.
pub trait WindowAggregate: Aggregate {
    fn value(&self) -> Result<Value, String>;
    fn inverse(&mut self, args: &[Value]) -> Result<(), String>;
}

/// Reads (and lazily initializes) the pointer-sized aggregate-context slot
/// the engine allocates per invocation, matching the `{uninit, ok, error}`
/// state machine from the specification: a null slot is "uninit", a non-null
/// one holds a live `Box<A>` constructed on first `step`.
unsafe fn aggregate_slot<A>(ctx: *mut sqlite3_context) -> *mut *mut A {
    ffi::aggregate_context(ctx, size_of::<*mut c_void>() as c_int) as *mut *mut A
}

unsafe fn aggregate_get_or_init<A, F>(ctx: *mut sqlite3_context, factory: &F) -> Option<&mut A>
where
    A: Send,
    F: Fn() -> A,
{
    // SAFETY: `ctx` is a live call context, valid for the duration of the trampoline.
    let slot = unsafe { aggregate_slot::<A>(ctx) };
    if slot.is_null() {
        // Allocation failure; SQLite has already recorded an OOM error for this call.
        return None;
    }
    // SAFETY: `slot` points at engine-owned, zero-initialized storage big enough
    // for one pointer, exclusively ours between `step`/`value`/`inverse` calls.
    let state = unsafe { &mut *slot };
    if state.is_null() {
        *state = Box::into_raw(Box::new(factory()));
    }
    // SAFETY: `*state` was just established to be non-null and owned by us.
    Some(unsafe { &mut **state })
}

/// Registers an aggregate SQL function from a per-invocation state factory.
pub(crate) fn register_aggregate<A, F>(
    db: *mut sqlite3,
    name: &str,
    n_arg: i32,
    factory: F,
) -> Result<(), Error>
where
    A: Aggregate + 'static,
    F: Fn() -> A + Send + Sync + 'static,
{
    unsafe extern "C" fn step<A, F>(ctx: *mut sqlite3_context, argc: c_int, argv: *mut *mut sqlite3_value)
    where
        A: Aggregate + 'static,
        F: Fn() -> A + Send + Sync,
    {
        let result = catch_unwind(|| {
            // SAFETY: see `register_scalar::call`.
            let factory = unsafe { &*(ffi::user_data(ctx) as *const F) };
            let agg = unsafe { aggregate_get_or_init(ctx, factory) };
            let args = collect_args(argc, argv);
            agg.map(|agg| agg.step(&args))
        });
        match result {
            Ok(Some(Err(e))) => ffi::result_error(ctx, &e),
            Ok(_) => {}
            Err(_) => ffi::result_error(ctx, "aggregate step panicked"),
        }
    }

    unsafe extern "C" fn finalize<A, F>(ctx: *mut sqlite3_context)
    where
        A: Aggregate + 'static,
        F: Fn() -> A + Send + Sync,
    {
        // SAFETY: see `register_scalar::call`.
        let slot = unsafe { aggregate_slot::<A>(ctx) };
        // SAFETY: `slot` is valid per `aggregate_get_or_init`'s contract.
        let state = if slot.is_null() {
            None
        } else {
            Some(unsafe { *slot })
        };
        let result = catch_unwind(|| {
            let agg = match state {
                Some(ptr) if !ptr.is_null() => unsafe { Box::from_raw(ptr) },
                // No row was ever stepped (e.g. an aggregate over an empty group);
                // the engine still calls xFinal once, so build fresh state to finalize.
                _ => {
                    let factory = unsafe { &*(ffi::user_data(ctx) as *const F) };
                    Box::new(factory())
                }
            };
            agg.finalize()
        });
        match result {
            Ok(Ok(v)) => ffi::result_value(ctx, &v),
            Ok(Err(e)) => ffi::result_error(ctx, &e),
            Err(_) => ffi::result_error(ctx, "aggregate finalize panicked"),
        }
    }

    let cname = c_name(name)?;
    let boxed = Box::into_raw(Box::new(factory));
    ffi::create_function_v2(
        db,
        cname.as_ptr(),
        n_arg,
        None,
        Some(step::<A, F>),
        Some(finalize::<A, F>),
        boxed as *mut c_void,
        Some(destroy_trampoline::<F>),
    )
    .map_err(Error::from)
}

/// Registers a window SQL function (usable as a plain aggregate too).
pub(crate) fn register_window<A, F>(
    db: *mut sqlite3,
    name: &str,
    n_arg: i32,
    factory: F,
) -> Result<(), Error>
where
    A: WindowAggregate + 'static,
    F: Fn() -> A + Send + Sync + 'static,
{
    unsafe extern "C" fn step<A, F>(ctx: *mut sqlite3_context, argc: c_int, argv: *mut *mut sqlite3_value)
    where
        A: WindowAggregate + 'static,
        F: Fn() -> A + Send + Sync,
    {
        let result = catch_unwind(|| {
            let factory = unsafe { &*(ffi::user_data(ctx) as *const F) };
            let agg = unsafe { aggregate_get_or_init(ctx, factory) };
            let args = collect_args(argc, argv);
            agg.map(|agg| agg.step(&args))
        });
        match result {
            Ok(Some(Err(e))) => ffi::result_error(ctx, &e),
            Ok(_) => {}
            Err(_) => ffi::result_error(ctx, "window step panicked"),
        }
    }

    unsafe extern "C" fn inverse<A, F>(ctx: *mut sqlite3_context, argc: c_int, argv: *mut *mut sqlite3_value)
    where
        A: WindowAggregate + 'static,
        F: Fn() -> A + Send + Sync,
    {
        let result = catch_unwind(|| {
            let factory = unsafe { &*(ffi::user_data(ctx) as *const F) };
            let agg = unsafe { aggregate_get_or_init(ctx, factory) };
            let args = collect_args(argc, argv);
            agg.map(|agg| agg.inverse(&args))
        });
        match result {
            Ok(Some(Err(e))) => ffi::result_error(ctx, &e),
            Ok(_) => {}
            Err(_) => ffi::result_error(ctx, "window inverse panicked"),
        }
    }

    unsafe extern "C" fn value<A, F>(ctx: *mut sqlite3_context)
    where
        A: WindowAggregate + 'static,
        F: Fn() -> A + Send + Sync,
    {
        let result = catch_unwind(|| {
            let factory = unsafe { &*(ffi::user_data(ctx) as *const F) };
            unsafe { aggregate_get_or_init(ctx, factory) }.map(|agg| agg.value())
        });
        match result {
            Ok(Some(Ok(v))) => ffi::result_value(ctx, &v),
            Ok(Some(Err(e))) => ffi::result_error(ctx, &e),
            Ok(None) => {}
            Err(_) => ffi::result_error(ctx, "window value panicked"),
        }
    }

    unsafe extern "C" fn finalize<A, F>(ctx: *mut sqlite3_context)
    where
        A: WindowAggregate + 'static,
        F: Fn() -> A + Send + Sync,
    {
        let slot = unsafe { aggregate_slot::<A>(ctx) };
        let state = if slot.is_null() {
            None
        } else {
            Some(unsafe { *slot })
        };
        let result = catch_unwind(|| {
            let agg = match state {
                Some(ptr) if !ptr.is_null() => unsafe { Box::from_raw(ptr) },
                _ => {
                    let factory = unsafe { &*(ffi::user_data(ctx) as *const F) };
                    Box::new(factory())
                }
            };
            agg.finalize()
        });
        match result {
            Ok(Ok(v)) => ffi::result_value(ctx, &v),
            Ok(Err(e)) => ffi::result_error(ctx, &e),
            Err(_) => ffi::result_error(ctx, "window finalize panicked"),
        }
    }

    let cname = c_name(name)?;
    let boxed = Box::into_raw(Box::new(factory));
    ffi::create_window_function(
        db,
        cname.as_ptr(),
        n_arg,
        Some(step::<A, F>),
        Some(finalize::<A, F>),
        Some(value::<A, F>),
        Some(inverse::<A, F>),
        boxed as *mut c_void,
        Some(destroy_trampoline::<F>),
    )
    .map_err(Error::from)
}
