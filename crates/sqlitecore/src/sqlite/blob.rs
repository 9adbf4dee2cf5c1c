//! Incremental BLOB I/O over a single column/row, independent of the
//! statement cache and VM.
//!
//! Grounded on [`crate::sqlite::statement::handle::StatementHandle`] and
//! [`crate::sqlite::connection::handle::ConnectionHandle`] for the
//! `NonNull`-wrapper-plus-`Drop` idiom; routed through
//! [`crate::sqlite::connection::worker::ConnectionWorker::call`] like every
//! other engine-touching operation, since a blob handle is a dependent of the
//! connection exactly like a cursor.

use std::ffi::CString;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::raw::c_int;
use std::ptr::{self, NonNull};

use libsqlite3_sys::sqlite3_blob;

use crate::error::Error;
use crate::sqlite::Connection;
use crate::sqlite::error::SqliteError;
use crate::sqlite::ffi;
use crate::Result;

/// Owned handle to an open `sqlite3_blob*`.
#[derive(Debug)]
struct BlobHandle(NonNull<sqlite3_blob>);

// A blob handle is safe to send between threads as long as access is
// serialized, which the connection's worker thread already guarantees.
unsafe impl Send for BlobHandle {}

/// A single open BLOB column/row, borrowed from its owning [`Connection`]
/// for its lifetime (it is a dependent in the same sense a cursor is).
pub struct Blob<'c> {
    conn: &'c mut Connection,
    handle: BlobHandle,
    len: i64,
    pos: i64,
    closed: bool,
}

impl<'c> Blob<'c> {
    pub(crate) async fn open(
        conn: &'c mut Connection,
        db_name: &str,
        table: &str,
        column: &str,
        rowid: i64,
        writable: bool,
    ) -> Result<Blob<'c>> {
        let db_name = CString::new(db_name)
            .map_err(|e| Error::Protocol(format!("invalid db name: {e}")))?;
        let table =
            CString::new(table).map_err(|e| Error::Protocol(format!("invalid table name: {e}")))?;
        let column = CString::new(column)
            .map_err(|e| Error::Protocol(format!("invalid column name: {e}")))?;

        let (handle, len) = conn
            .worker
            .call(move |state| -> Result<(BlobHandle, i64)> {
                let db = state.handle.as_ptr();
                let mut blob: *mut sqlite3_blob = ptr::null_mut();
                ffi::blob_open(
                    db,
                    db_name.as_ptr(),
                    table.as_ptr(),
                    column.as_ptr(),
                    rowid,
                    writable as c_int,
                    &mut blob,
                )
                .map_err(Error::from)?;

                // SAFETY: `blob_open` succeeded, so `blob` is non-null per the
                // engine's own contract.
                let handle = unsafe { NonNull::new_unchecked(blob) };
                let len = ffi::blob_bytes(blob) as i64;
                Ok((BlobHandle(handle), len))
            })
            .await??;

        Ok(Blob {
            conn,
            handle,
            len,
            pos: 0,
            closed: false,
        })
    }

    /// Length of the BLOB in bytes, fixed for the life of this handle (use
    /// [`Blob::reopen`] to point at a different row).
    pub fn length(&self) -> i64 {
        self.len
    }

    /// Current read/write offset.
    pub fn tell(&self) -> i64 {
        self.pos
    }

    /// Point this handle at a different row of the same table/column,
    /// resetting the offset to zero and refreshing the cached length.
    pub async fn reopen(&mut self, rowid: i64) -> Result<()> {
        let handle = BlobHandle(self.handle.0);
        let len = self
            .conn
            .worker
            .call(move |state| -> Result<i64> {
                let ptr = handle.0.as_ptr();
                let rc = ffi::blob_reopen(ptr, rowid);
                if rc != libsqlite3_sys::SQLITE_OK {
                    return Err(SqliteError::new(state.handle.as_ptr()).into());
                }
                Ok(ffi::blob_bytes(ptr) as i64)
            })
            .await??;
        self.len = len;
        self.pos = 0;
        Ok(())
    }

    /// Read up to `buf.len()` bytes starting at the current offset,
    /// validating bounds before making the engine call, and advancing the
    /// offset by exactly the number of bytes read.
    pub async fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        let available = (self.len - self.pos).max(0) as usize;
        let to_read = buf.len().min(available);
        if to_read == 0 {
            return Ok(0);
        }

        let handle = BlobHandle(self.handle.0);
        let offset = self.pos as c_int;
        let bytes = self
            .conn
            .worker
            .call(move |state| -> Result<Vec<u8>> {
                let mut tmp = vec![0u8; to_read];
                let rc = ffi::blob_read(handle.0.as_ptr(), &mut tmp, offset);
                if rc != libsqlite3_sys::SQLITE_OK {
                    return Err(SqliteError::new(state.handle.as_ptr()).into());
                }
                Ok(tmp)
            })
            .await??;

        buf[..bytes.len()].copy_from_slice(&bytes);
        self.pos += bytes.len() as i64;
        Ok(bytes.len())
    }

    /// Write `data` at the current offset. Per SQLite's contract, a BLOB
    /// handle never extends the underlying value: writing past the end
    /// returns a range error rather than growing the row.
    pub async fn write_at(&mut self, data: &[u8]) -> Result<()> {
        if self.pos + data.len() as i64 > self.len {
            return Err(Error::Protocol(
                "write would extend past the end of the blob".into(),
            ));
        }
        if data.is_empty() {
            return Ok(());
        }

        let handle = BlobHandle(self.handle.0);
        let offset = self.pos as c_int;
        let data = data.to_vec();
        let written = data.len();
        self.conn
            .worker
            .call(move |state| -> Result<()> {
                let rc = ffi::blob_write(handle.0.as_ptr(), &data, offset);
                if rc != libsqlite3_sys::SQLITE_OK {
                    return Err(SqliteError::new(state.handle.as_ptr()).into());
                }
                Ok(())
            })
            .await??;

        self.pos += written as i64;
        Ok(())
    }

    /// Close the handle. `force` suppresses any close-time error, logging it
    /// as unraisable instead of returning it (the same contract as
    /// `Connection`/`Cursor` closure).
    pub async fn close(mut self, force: bool) -> Result<()> {
        self.closed = true;
        let handle = BlobHandle(self.handle.0);
        let result = self
            .conn
            .worker
            .call(move |_state| {
                let rc = ffi::blob_close(handle.0.as_ptr());
                if rc == libsqlite3_sys::SQLITE_OK {
                    Ok(())
                } else {
                    Err(rc)
                }
            })
            .await;

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(rc)) if force => {
                tracing::error!(code = rc, "blob close failed, forcing closed anyway");
                Ok(())
            }
            Ok(Err(rc)) => Err(Error::Protocol(format!(
                "blob close failed with engine code {rc}"
            ))),
            Err(e) if force => {
                tracing::error!(error = %e, "blob close failed, forcing closed anyway");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl Read for Blob<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        futures_executor::block_on(self.read_into(buf))
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

impl Write for Blob<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // `write_at` already rejects a write that would extend past the end
        // of the blob; mirror that here instead of silently truncating, so
        // the sync and async paths agree on the same bounds invariant.
        futures_executor::block_on(self.write_at(buf))
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for Blob<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.len + offset,
            SeekFrom::Current(offset) => self.pos + offset,
        };
        if !(0..=self.len).contains(&new_pos) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek outside the bounds of the blob",
            ));
        }
        self.pos = new_pos;
        Ok(self.pos as u64)
    }
}

impl Drop for Blob<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let handle = BlobHandle(self.handle.0);
        // Best-effort: dropping must never panic. If the worker is already
        // gone the handle leaks with the connection's own teardown.
        let _ = futures_executor::block_on(self.conn.worker.call(move |_state| {
            ffi::blob_close(handle.0.as_ptr());
        }));
    }
}
