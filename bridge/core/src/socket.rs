//! Socket Endpoint
//!
//! A Unix-domain stream socket driven entirely through a [`Kernel`]. This is
//! the Linux half of a session: discovery connects it, the relay reads and
//! writes it, and teardown shuts it down and closes it.
//!
//! Shutdown and close are each guarded by a [`CloseLatch`], so both are safe
//! to request from either relay direction and from the owner's drop.

use std::fmt;

use tracing::{debug, warn};

use crate::latch::CloseLatch;
use crate::syscall::{abi, Errno, Fd, Kernel, SockAddrUnix, SysResult, SyscallGateway};

/// Connected (or connectable) Unix-domain stream socket
pub struct SocketEndpoint<'k, G: SyscallGateway> {
    kernel: &'k Kernel<G>,
    fd: Fd,
    shut_down: CloseLatch,
    closed: CloseLatch,
}

impl<'k, G: SyscallGateway> SocketEndpoint<'k, G> {
    /// Create an unconnected `AF_UNIX` / `SOCK_STREAM` socket
    pub fn open_stream(kernel: &'k Kernel<G>) -> SysResult<Self> {
        let fd = kernel.socket(abi::AF_UNIX, abi::SOCK_STREAM, 0)?;
        debug!(%fd, "Created Unix socket");
        Ok(Self {
            kernel,
            fd,
            shut_down: CloseLatch::new(),
            closed: CloseLatch::new(),
        })
    }

    /// Descriptor number
    pub fn fd(&self) -> Fd {
        self.fd
    }

    /// Connect to the socket at `path`
    ///
    /// Paths that do not fit a `sockaddr_un` fail with `ENAMETOOLONG` without
    /// reaching the kernel.
    pub fn connect(&self, path: &str) -> SysResult<()> {
        self.ensure_open()?;
        let addr = SockAddrUnix::new(path)?;
        self.kernel.connect(self.fd, &addr)
    }

    /// Read up to `buf.len()` bytes; 0 means the peer closed
    pub fn read(&self, buf: &mut [u8]) -> SysResult<usize> {
        loop {
            self.ensure_open()?;
            match self.kernel.read(self.fd, buf) {
                Err(Errno::EINTR) => continue,
                other => return other,
            }
        }
    }

    /// Write up to `buf.len()` bytes, returning how many were accepted
    pub fn write(&self, buf: &[u8]) -> SysResult<usize> {
        loop {
            self.ensure_open()?;
            match self.kernel.write(self.fd, buf) {
                Err(Errno::EINTR) => continue,
                other => return other,
            }
        }
    }

    /// Shut down both directions, waking any thread blocked in [`read`]
    ///
    /// Only the first call reaches the kernel.
    ///
    /// [`read`]: Self::read
    pub fn interrupt(&self) {
        if self.closed.is_tripped() || !self.shut_down.trip() {
            return;
        }
        if let Err(errno) = self.kernel.shutdown(self.fd, abi::SHUT_RDWR) {
            // ENOTCONN is expected when the peer already went away
            debug!(fd = %self.fd, %errno, "Socket shutdown failed");
        }
    }

    /// Close the descriptor
    ///
    /// Returns `true` if this call performed the close.
    pub fn close(&self) -> bool {
        if !self.closed.trip() {
            return false;
        }
        match self.kernel.close(self.fd) {
            Ok(()) => debug!(fd = %self.fd, "Closed Unix socket"),
            Err(errno) => warn!(fd = %self.fd, %errno, "Failed to close Unix socket"),
        }
        true
    }

    /// Whether [`close`](Self::close) has run
    pub fn is_closed(&self) -> bool {
        self.closed.is_tripped()
    }

    fn ensure_open(&self) -> SysResult<()> {
        if self.closed.is_tripped() {
            Err(Errno::EBADF)
        } else {
            Ok(())
        }
    }
}

impl<G: SyscallGateway> Drop for SocketEndpoint<'_, G> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<G: SyscallGateway> fmt::Debug for SocketEndpoint<'_, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketEndpoint")
            .field("fd", &self.fd)
            .field("shut_down", &self.shut_down.is_tripped())
            .field("closed", &self.closed.is_tripped())
            .finish()
    }
}
