//! Unix-socket stand-in for the named pipe
//!
//! Listens on a filesystem path, admits exactly one client, then removes the
//! path so no second client can find it.

use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use super::{PendingPipe, PipeEndpoint, PipeServer};
use crate::latch::CloseLatch;

/// Creates [`PendingUnixPipe`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixPipeServer;

impl PipeServer for UnixPipeServer {
    type Pending = PendingUnixPipe;

    fn create(&self, name: &str, buffer_size: usize) -> io::Result<PendingUnixPipe> {
        let path = PathBuf::from(name);

        // A socket file left by a previous run would make bind fail
        if path.exists() {
            warn!(path = ?path, "Removing stale pipe socket");
            std::fs::remove_file(&path)?;
        }

        let listener = UnixListener::bind(&path)?;
        // Kernel socket buffers stay at their defaults; the relay never
        // moves more than buffer_size per call anyway
        trace!(path = ?path, buffer_size, "Pipe socket bound");

        Ok(PendingUnixPipe { listener, path })
    }
}

/// Bound pipe socket waiting for its single client
///
/// Dropping it removes the socket file.
#[derive(Debug)]
pub struct PendingUnixPipe {
    listener: UnixListener,
    path: PathBuf,
}

impl PendingUnixPipe {
    /// Filesystem path clients connect to
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PendingPipe for PendingUnixPipe {
    type Endpoint = UnixPipe;

    fn accept(self) -> io::Result<UnixPipe> {
        let (stream, _addr) = self.listener.accept()?;
        info!(path = ?self.path, "Pipe client connected");
        Ok(UnixPipe::from_stream(stream))
    }
}

impl Drop for PendingUnixPipe {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                debug!(path = ?self.path, error = %e, "Failed to remove pipe socket");
            }
        }
    }
}

/// Connected pipe client over a Unix stream
#[derive(Debug)]
pub struct UnixPipe {
    stream: UnixStream,
    closed: CloseLatch,
}

impl UnixPipe {
    /// Wrap an already connected stream
    pub fn from_stream(stream: UnixStream) -> Self {
        Self {
            stream,
            closed: CloseLatch::new(),
        }
    }
}

impl PipeEndpoint for UnixPipe {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.stream).read(buf)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        (&self.stream).write(buf)
    }

    fn cancel_io(&self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Read) {
            debug!(error = %e, "Pipe read shutdown failed");
        }
    }

    fn close(&self) {
        if !self.closed.trip() {
            return;
        }
        // The descriptor itself is released when the stream drops
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!(error = %e, "Pipe shutdown failed");
        }
        debug!("Closed pipe");
    }
}
