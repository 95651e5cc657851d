//! Windows named pipe
//!
//! Duplex, byte-mode pipe with a single instance. Under Wine the RPC client
//! (a game or launcher) connects here exactly as it would to a native Discord
//! client.
//!
//! The handle is opened for overlapped I/O. Every read and write is issued
//! asynchronously and then waited on together with a manual-reset abort
//! event:
//!
//! ```text
//!   ReadFile/WriteFile ──▶ ERROR_IO_PENDING ──▶ WaitForMultipleObjects
//!                                                 │              │
//!                                            I/O event      abort event
//!                                                 │              │
//!                                                 │        CancelIoEx(this op)
//!                                                 ▼              ▼
//!                                         GetOverlappedResult(wait = TRUE)
//! ```
//!
//! `cancel_io` only signals the abort event. It stays signalled, so a read
//! issued after the cancel fails just like one already in flight.

use std::ffi::CString;
use std::io;
use std::mem;
use std::ptr;

use tracing::{debug, info, warn};
use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_BROKEN_PIPE, ERROR_IO_PENDING, ERROR_PIPE_CONNECTED, FALSE,
    HANDLE, INVALID_HANDLE_VALUE, TRUE, WAIT_OBJECT_0,
};
use windows_sys::Win32::Storage::FileSystem::{
    ReadFile, WriteFile, FILE_FLAG_OVERLAPPED, PIPE_ACCESS_DUPLEX,
};
use windows_sys::Win32::System::Pipes::{
    ConnectNamedPipe, CreateNamedPipeA, PIPE_READMODE_BYTE, PIPE_TYPE_BYTE, PIPE_WAIT,
};
use windows_sys::Win32::System::Threading::{
    CreateEventW, SetEvent, WaitForMultipleObjects, INFINITE,
};
use windows_sys::Win32::System::IO::{CancelIoEx, GetOverlappedResult, OVERLAPPED};

use super::{PendingPipe, PipeEndpoint, PipeServer};
use crate::latch::CloseLatch;

/// Owned kernel handle, closed at most once
#[derive(Debug)]
struct OwnedHandle {
    raw: HANDLE,
    kind: &'static str,
    closed: CloseLatch,
}

// SAFETY: pipe and event HANDLEs are process-wide kernel object references;
// Win32 allows them to be used and closed from any thread.
unsafe impl Send for OwnedHandle {}
// SAFETY: concurrent ReadFile/WriteFile/SetEvent on one handle is permitted,
// and CloseHandle is serialised by the latch.
unsafe impl Sync for OwnedHandle {}

impl OwnedHandle {
    fn new(raw: HANDLE, kind: &'static str) -> Self {
        Self {
            raw,
            kind,
            closed: CloseLatch::new(),
        }
    }

    /// Unnamed manual-reset event, initially unsignalled
    fn event(kind: &'static str) -> io::Result<Self> {
        // SAFETY: null attributes and name select an anonymous event.
        let raw = unsafe { CreateEventW(ptr::null(), TRUE, FALSE, ptr::null()) };
        if raw.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(Self::new(raw, kind))
    }

    fn close(&self) {
        if !self.closed.trip() {
            return;
        }
        // SAFETY: the handle came from CreateNamedPipeA or CreateEventW and the
        // latch guarantees this is its only CloseHandle.
        if unsafe { CloseHandle(self.raw) } == 0 {
            warn!(kind = self.kind, error = %io::Error::last_os_error(), "Failed to close handle");
        } else {
            debug!(kind = self.kind, "Closed handle");
        }
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Zeroed OVERLAPPED that signals `event` on completion
fn overlapped(event: &OwnedHandle) -> OVERLAPPED {
    // SAFETY: OVERLAPPED is plain data and all-zero is its initial state.
    let mut overlapped: OVERLAPPED = unsafe { mem::zeroed() };
    overlapped.hEvent = event.raw;
    overlapped
}

/// Creates [`PendingNamedPipe`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct NamedPipeServer;

impl PipeServer for NamedPipeServer {
    type Pending = PendingNamedPipe;

    fn create(&self, name: &str, buffer_size: usize) -> io::Result<PendingNamedPipe> {
        let c_name =
            CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let buffer_size = u32::try_from(buffer_size)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // SAFETY: c_name outlives the call; a null security descriptor selects
        // the defaults.
        let raw = unsafe {
            CreateNamedPipeA(
                c_name.as_ptr().cast(),
                PIPE_ACCESS_DUPLEX | FILE_FLAG_OVERLAPPED,
                PIPE_TYPE_BYTE | PIPE_READMODE_BYTE | PIPE_WAIT,
                1,
                buffer_size,
                buffer_size,
                0,
                ptr::null(),
            )
        };
        if raw == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error());
        }
        let handle = OwnedHandle::new(raw, "pipe");

        debug!(pipe = %name, buffer_size, "Named pipe created");
        Ok(PendingNamedPipe {
            handle,
            read_event: OwnedHandle::event("read event")?,
            write_event: OwnedHandle::event("write event")?,
            abort: OwnedHandle::event("abort event")?,
        })
    }
}

/// Named pipe waiting for its single client
#[derive(Debug)]
pub struct PendingNamedPipe {
    handle: OwnedHandle,
    read_event: OwnedHandle,
    write_event: OwnedHandle,
    abort: OwnedHandle,
}

impl PendingPipe for PendingNamedPipe {
    type Endpoint = NamedPipe;

    fn accept(self) -> io::Result<NamedPipe> {
        let mut pending = overlapped(&self.read_event);
        // SAFETY: the handle is open and `pending` lives until the wait below
        // has completed the request.
        let ok = unsafe { ConnectNamedPipe(self.handle.raw, &mut pending) } != 0;
        if !ok {
            // SAFETY: reads the calling thread's last-error value.
            match unsafe { GetLastError() } {
                // A client that connected between create and connect is still a client
                ERROR_PIPE_CONNECTED => {}
                ERROR_IO_PENDING => {
                    let mut ignored = 0u32;
                    // SAFETY: `pending` belongs to the request issued above.
                    let connected = unsafe {
                        GetOverlappedResult(self.handle.raw, &pending, &mut ignored, TRUE)
                    } != 0;
                    if !connected {
                        return Err(io::Error::last_os_error());
                    }
                }
                code => return Err(io::Error::from_raw_os_error(code as i32)),
            }
        }

        info!("Pipe client connected");
        Ok(NamedPipe {
            handle: self.handle,
            read_event: self.read_event,
            write_event: self.write_event,
            abort: self.abort,
        })
    }
}

/// Connected named pipe
///
/// One reader and one writer at a time, each with its own completion event.
#[derive(Debug)]
pub struct NamedPipe {
    handle: OwnedHandle,
    read_event: OwnedHandle,
    write_event: OwnedHandle,
    abort: OwnedHandle,
}

impl NamedPipe {
    /// Finish a request that ReadFile/WriteFile started with `pending`
    ///
    /// Returns once the kernel no longer refers to `pending` or its buffer.
    fn complete(&self, pending: &OVERLAPPED) -> io::Result<usize> {
        let events = [pending.hEvent, self.abort.raw];
        // SAFETY: both handles are open events owned by this pipe.
        let woke = unsafe { WaitForMultipleObjects(2, events.as_ptr(), FALSE, INFINITE) };
        if woke != WAIT_OBJECT_0 {
            // Aborted (or the wait failed): stop this request only
            // SAFETY: `pending` identifies a request issued on this handle.
            if unsafe { CancelIoEx(self.handle.raw, pending) } == 0 {
                debug!(error = %io::Error::last_os_error(), "Request finished before cancellation");
            }
        }

        let mut transferred = 0u32;
        // SAFETY: waiting on the request's own OVERLAPPED until it completes.
        let ok = unsafe { GetOverlappedResult(self.handle.raw, pending, &mut transferred, TRUE) }
            != 0;
        if ok {
            Ok(transferred as usize)
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// Common tail of ReadFile/WriteFile
    fn finish(&self, started: bool, pending: &OVERLAPPED) -> io::Result<usize> {
        if !started {
            // SAFETY: reads the calling thread's last-error value.
            let code = unsafe { GetLastError() };
            if code != ERROR_IO_PENDING {
                return Err(io::Error::from_raw_os_error(code as i32));
            }
        }
        self.complete(pending)
    }
}

impl PipeEndpoint for NamedPipe {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
        let mut pending = overlapped(&self.read_event);
        // SAFETY: buf and `pending` stay valid until `finish` has waited the
        // request out.
        let started = unsafe {
            ReadFile(
                self.handle.raw,
                buf.as_mut_ptr(),
                len,
                ptr::null_mut(),
                &mut pending,
            )
        } != 0;

        match self.finish(started, &pending) {
            // Client hung up
            Err(e) if e.raw_os_error() == Some(ERROR_BROKEN_PIPE as i32) => Ok(0),
            result => result,
        }
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
        let mut pending = overlapped(&self.write_event);
        // SAFETY: buf and `pending` stay valid until `finish` has waited the
        // request out.
        let started = unsafe {
            WriteFile(
                self.handle.raw,
                buf.as_ptr(),
                len,
                ptr::null_mut(),
                &mut pending,
            )
        } != 0;

        self.finish(started, &pending)
    }

    fn cancel_io(&self) {
        // SAFETY: the abort event lives as long as the pipe.
        if unsafe { SetEvent(self.abort.raw) } == 0 {
            warn!(error = %io::Error::last_os_error(), "Failed to signal pipe abort");
        } else {
            debug!("Pipe I/O aborted");
        }
    }

    fn close(&self) {
        self.handle.close();
    }
}
