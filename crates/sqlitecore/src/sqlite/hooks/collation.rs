//! Collation registration (`sqlite3_create_collation_v2`) and the
//! `sqlite3_collation_needed` seat that lets a connection register a
//! collation lazily, the first time a query actually needs it.

use std::cmp::Ordering;
use std::ffi::{CStr, CString, c_void};
use std::os::raw::{c_char, c_int};
use std::panic::catch_unwind;

use libsqlite3_sys::sqlite3;

use crate::error::Error;
use crate::sqlite::ffi;

fn bytes_of<'a>(ptr: *const c_void, len: c_int) -> &'a [u8] {
    if ptr.is_null() || len <= 0 {
        &[]
    } else {
        // SAFETY: the engine guarantees `ptr` is valid for `len` bytes for the
        // duration of the comparison callback.
        unsafe { std::slice::from_raw_parts(ptr as *const u8, len as usize) }
    }
}

unsafe extern "C" fn compare_trampoline<F>(
    arg: *mut c_void,
    len_a: c_int,
    a: *const c_void,
    len_b: c_int,
    b: *const c_void,
) -> c_int
where
    F: Fn(&[u8], &[u8]) -> Ordering + Send + Sync,
{
    // A panicking comparator must not unwind across the FFI boundary; the
    // engine requires some total order regardless, so a panic reports equal.
    let result = catch_unwind(|| {
        // SAFETY: `arg` is the `F` boxed by `register_collation`, kept alive by the
        // engine for as long as the collation is registered.
        let f = unsafe { &*(arg as *const F) };
        f(bytes_of(a, len_a), bytes_of(b, len_b))
    });
    match result {
        Ok(Ordering::Less) => -1,
        Ok(Ordering::Equal) => 0,
        Ok(Ordering::Greater) => 1,
        Err(_) => {
            tracing::error!("collation comparator panicked; treating as equal");
            0
        }
    }
}

unsafe extern "C" fn destroy_trampoline<F>(ptr: *mut c_void) {
    // SAFETY: `ptr` is the `Box<F>` leaked by `register_collation`.
    drop(unsafe { Box::from_raw(ptr as *mut F) });
}

/// Registers a named collating sequence backed by a Rust byte-comparator.
pub(crate) fn register_collation<F>(db: *mut sqlite3, name: &str, compare: F) -> Result<(), Error>
where
    F: Fn(&[u8], &[u8]) -> Ordering + Send + Sync + 'static,
{
    let cname = CString::new(name)
        .map_err(|_| Error::Protocol("collation name contains a NUL byte".into()))?;
    let boxed = Box::into_raw(Box::new(compare));
    ffi::create_collation(
        db,
        cname.as_ptr(),
        boxed as *mut c_void,
        Some(compare_trampoline::<F>),
        Some(destroy_trampoline::<F>),
    )
    .map_err(Error::from)
}

/// Owning wrapper around the single `sqlite3_collation_needed` seat: invoked
/// with the name of a collation the engine could not resolve while preparing
/// a statement, giving the host a chance to register it just-in-time via
/// [`register_collation`].
#[derive(Default)]
pub(crate) struct CollationNeededHook {
    callback: Option<Box<dyn Fn(*mut sqlite3, &str) + Send>>,
}

impl CollationNeededHook {
    pub(crate) fn set(
        &mut self,
        db: *mut sqlite3,
        callback: Option<Box<dyn Fn(*mut sqlite3, &str) + Send>>,
    ) -> Result<(), Error> {
        self.callback = callback;
        let arg = if self.callback.is_some() {
            self as *mut Self as *mut c_void
        } else {
            std::ptr::null_mut()
        };
        let trampoline = self.callback.is_some().then_some(needed_trampoline as _);
        ffi::collation_needed(db, trampoline, arg).map_err(Error::from)
    }
}

unsafe extern "C" fn needed_trampoline(
    ctx: *mut c_void,
    db: *mut sqlite3,
    _encoding: c_int,
    name: *const c_char,
) {
    let result = catch_unwind(|| {
        // SAFETY: `ctx` is the `CollationNeededHook` that installed this trampoline.
        let hook = unsafe { &*(ctx as *const CollationNeededHook) };
        if let Some(cb) = hook.callback.as_ref() {
            // SAFETY: `name` is a NUL-terminated collation name valid for this call.
            let name = unsafe { CStr::from_ptr(name) }.to_string_lossy();
            cb(db, &name);
        }
    });
    if result.is_err() {
        tracing::error!("collation-needed callback panicked");
    }
}
