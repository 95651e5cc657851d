//! Pipe Endpoint
//!
//! The local, single-client side of a session: the byte pipe an RPC client
//! connects to. Under Wine this is a Windows named pipe; a native Linux build
//! substitutes a one-shot Unix socket so the whole bridge can run and be
//! tested without Wine.
//!
//! # Lifecycle
//!
//! ```text
//!   PipeServer::create(name, CHUNK_SIZE)
//!            │
//!            ▼
//!      PendingPipe  ── accept(self) ──▶  PipeEndpoint
//!   (listening, no client)              (exactly one client)
//! ```
//!
//! `accept` consumes the pending pipe, so a second client can never be
//! admitted.

use std::io;

#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub use unix::{PendingUnixPipe, UnixPipe, UnixPipeServer};
#[cfg(windows)]
pub use windows::{NamedPipe, NamedPipeServer, PendingNamedPipe};

/// Well-known pipe name the RPC client looks for
#[cfg(windows)]
pub const DEFAULT_PIPE_NAME: &str = r"\\.\pipe\discord-ipc-0";

/// Socket path standing in for the named pipe on a native build
#[cfg(unix)]
pub const DEFAULT_PIPE_NAME: &str = "/tmp/winerpc-discord-ipc-0";

/// Pipe server for the current platform
#[cfg(windows)]
pub type NativePipeServer = NamedPipeServer;

/// Pipe server for the current platform
#[cfg(unix)]
pub type NativePipeServer = UnixPipeServer;

/// A connected, duplex, byte-oriented pipe
///
/// Methods take `&self` so one direction can block in `read` while the other
/// writes, and either can cancel the pipe during teardown.
pub trait PipeEndpoint: Send + Sync {
    /// Read up to `buf.len()` bytes; `Ok(0)` means the client disconnected
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write up to `buf.len()` bytes, returning how many were accepted
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Abort any read or write blocked on this pipe
    ///
    /// Sticky: a read that starts after the cancel fails or returns `Ok(0)`
    /// instead of blocking.
    fn cancel_io(&self);

    /// Release the pipe; later calls are no-ops
    fn close(&self);
}

/// Factory for pending pipes
pub trait PipeServer {
    /// Pipe waiting for its client
    type Pending: PendingPipe;

    /// Create the pipe endpoint, with `buffer_size` in each direction
    ///
    /// # Errors
    ///
    /// Fails if the name is invalid or already taken.
    fn create(&self, name: &str, buffer_size: usize) -> io::Result<Self::Pending>;
}

/// A created pipe that has not yet accepted its client
pub trait PendingPipe {
    /// Connected endpoint produced by [`accept`](Self::accept)
    type Endpoint: PipeEndpoint;

    /// Block until exactly one client connects
    fn accept(self) -> io::Result<Self::Endpoint>;
}

#[cfg(all(test, unix))]
pub(crate) mod mock;
