//! Linux Kernel ABI Constants
//!
//! Numbers and layouts the bridge hands to the Linux kernel. They are spelled
//! out here rather than taken from the C library because the pipe side of the
//! bridge may be a Windows executable, where no Linux headers exist.

use std::borrow::Cow;
use std::fmt;

use super::Errno;

/// Address family for Unix-domain sockets
pub const AF_UNIX: i32 = 1;

/// Connection-oriented byte stream socket type
pub const SOCK_STREAM: i32 = 1;

/// `shutdown` mode: stop receiving
pub const SHUT_RD: i32 = 0;
/// `shutdown` mode: stop sending
pub const SHUT_WR: i32 = 1;
/// `shutdown` mode: stop both directions
pub const SHUT_RDWR: i32 = 2;

/// `open` flag: read only
pub const O_RDONLY: i32 = 0;
/// `open` flag: write only
pub const O_WRONLY: i32 = 1;
/// `open` flag: read and write
pub const O_RDWR: i32 = 2;

/// Size of the `sun_path` field of `sockaddr_un`
pub const UNIX_PATH_MAX: usize = 108;

/// Largest magnitude the kernel uses for a negated errno return
pub const MAX_ERRNO: isize = 4095;

/// i386 syscall numbers, used through `int 0x80`
pub mod i386 {
    /// `read(fd, buf, count)`
    pub const READ: usize = 3;
    /// `write(fd, buf, count)`
    pub const WRITE: usize = 4;
    /// `open(path, flags, mode)`
    pub const OPEN: usize = 5;
    /// `close(fd)`
    pub const CLOSE: usize = 6;
    /// `socketcall(call, args)`: multiplexer for every socket operation
    pub const SOCKETCALL: usize = 102;

    /// Sub-call numbers passed as the first `socketcall` argument
    pub mod socketcall {
        /// `socket(domain, type, protocol)`
        pub const SOCKET: usize = 1;
        /// `connect(fd, addr, addrlen)`
        pub const CONNECT: usize = 3;
        /// `shutdown(fd, how)`
        pub const SHUTDOWN: usize = 13;
    }
}

/// x86_64 syscall numbers, used through the `syscall` instruction
pub mod x86_64 {
    /// `read(fd, buf, count)`
    pub const READ: usize = 0;
    /// `write(fd, buf, count)`
    pub const WRITE: usize = 1;
    /// `open(path, flags, mode)`
    pub const OPEN: usize = 2;
    /// `close(fd)`
    pub const CLOSE: usize = 3;
    /// `socket(domain, type, protocol)`
    pub const SOCKET: usize = 41;
    /// `connect(fd, addr, addrlen)`
    pub const CONNECT: usize = 42;
    /// `shutdown(fd, how)`
    pub const SHUTDOWN: usize = 48;
}

/// Unix-domain socket address (`struct sockaddr_un`)
///
/// A 2-byte family tag followed by a 108-byte path field. The whole structure
/// is zeroed before the path is copied in, so nothing but the path and its
/// NUL padding ever reaches the kernel.
#[repr(C)]
#[derive(Clone, PartialEq, Eq)]
pub struct SockAddrUnix {
    family: u16,
    path: [u8; UNIX_PATH_MAX],
}

impl SockAddrUnix {
    /// Length passed as `addrlen` to `connect`
    pub const LEN: usize = std::mem::size_of::<Self>();

    /// Build an address for a filesystem socket path
    ///
    /// # Errors
    ///
    /// Returns `ENAMETOOLONG` if the path does not fit the path field with a
    /// trailing NUL, and `EINVAL` if it is empty or contains a NUL byte.
    pub fn new(path: &str) -> Result<Self, Errno> {
        let bytes = path.as_bytes();
        if bytes.is_empty() || bytes.contains(&0) {
            return Err(Errno::EINVAL);
        }
        if bytes.len() >= UNIX_PATH_MAX {
            return Err(Errno::ENAMETOOLONG);
        }

        let mut addr = Self {
            family: AF_UNIX as u16,
            path: [0; UNIX_PATH_MAX],
        };
        addr.path[..bytes.len()].copy_from_slice(bytes);
        Ok(addr)
    }

    /// Address family tag
    pub fn family(&self) -> u16 {
        self.family
    }

    /// Path bytes up to the first NUL
    pub fn path_bytes(&self) -> &[u8] {
        let end = self
            .path
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(UNIX_PATH_MAX);
        &self.path[..end]
    }

    /// Path as text (lossy for non-UTF-8 bytes)
    pub fn path(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.path_bytes())
    }
}

impl fmt::Debug for SockAddrUnix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SockAddrUnix")
            .field("family", &self.family)
            .field("path", &self.path())
            .finish()
    }
}
