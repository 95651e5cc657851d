//! Syscall Gateway
//!
//! The only path the bridge has to the Linux side of the machine. When the
//! bridge runs as a Windows program under Wine there is no socket library that
//! can reach a Unix-domain socket, so every socket operation is issued as a
//! raw Linux syscall.
//!
//! # Layers
//!
//! ```text
//!  SocketEndpoint / discovery
//!            │  typed calls, Result<_, Errno>
//!            ▼
//!        Kernel<G>          traces each call at TRACE level
//!            │  Request (tagged variant)
//!            ▼
//!   G: SyscallGateway       returns the raw kernel convention:
//!            │              value >= 0 on success, -errno on failure
//!            ▼
//!   int 0x80 / syscall / libc
//! ```
//!
//! Gateways never report errors through a side channel such as a thread-local
//! errno; the sign of the returned value is the whole story. [`Kernel`] turns
//! that convention into `Result` in exactly one place.

pub mod abi;
pub mod native;

#[cfg(test)]
pub(crate) mod fake;

use std::ffi::CStr;
use std::fmt;

use tracing::trace;

pub use abi::SockAddrUnix;
pub use native::NativeGateway;
#[cfg(target_os = "linux")]
pub use native::LibcGateway;

/// Tracing target for per-syscall events
pub const SYSCALL_TARGET: &str = "winerpc::syscall";

/// Result of a typed syscall
pub type SysResult<T> = Result<T, Errno>;

/// Linux file descriptor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fd(i32);

impl Fd {
    /// Wrap a raw descriptor number
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Raw descriptor number
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Linux error number
///
/// Values are Linux numbers whatever the host OS is, which is why they are
/// not taken from the host C library.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Errno(i32);

macro_rules! errno_table {
    ($($name:ident = $value:literal, $desc:literal;)*) => {
        impl Errno {
            $(
                #[doc = $desc]
                pub const $name: Self = Self($value);
            )*

            /// Symbolic name, if this is a well-known errno
            #[must_use]
            pub fn name(self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some(stringify!($name)),)*
                    _ => None,
                }
            }

            /// Human-readable description, if this is a well-known errno
            #[must_use]
            pub fn description(self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some($desc),)*
                    _ => None,
                }
            }
        }
    };
}

errno_table! {
    EPERM = 1, "Operation not permitted";
    ENOENT = 2, "No such file or directory";
    EINTR = 4, "Interrupted system call";
    EIO = 5, "Input/output error";
    EBADF = 9, "Bad file descriptor";
    EAGAIN = 11, "Resource temporarily unavailable";
    EACCES = 13, "Permission denied";
    EFAULT = 14, "Bad address";
    ENOTDIR = 20, "Not a directory";
    EINVAL = 22, "Invalid argument";
    EMFILE = 24, "Too many open files";
    EPIPE = 32, "Broken pipe";
    ENAMETOOLONG = 36, "File name too long";
    ENOSYS = 38, "Function not implemented";
    ENOTSOCK = 88, "Socket operation on non-socket";
    EPROTOTYPE = 91, "Protocol wrong type for socket";
    EAFNOSUPPORT = 97, "Address family not supported by protocol";
    EADDRINUSE = 98, "Address already in use";
    ECONNABORTED = 103, "Software caused connection abort";
    ECONNRESET = 104, "Connection reset by peer";
    EISCONN = 106, "Transport endpoint is already connected";
    ENOTCONN = 107, "Transport endpoint is not connected";
    ECONNREFUSED = 111, "Connection refused";
}

impl Errno {
    /// Wrap a positive errno value
    #[must_use]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Positive errno value
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Decode a raw kernel return value
    ///
    /// Values in `-4095..=-1` are negated errnos, everything else is a
    /// successful result.
    pub fn from_return(ret: isize) -> SysResult<usize> {
        if (-abi::MAX_ERRNO..0).contains(&ret) {
            Err(Self(-ret as i32))
        } else {
            Ok(ret as usize)
        }
    }

    /// Negated form, as a gateway returns it
    #[must_use]
    pub const fn to_return(self) -> isize {
        -(self.0 as isize)
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name(), self.description()) {
            (Some(name), Some(desc)) => write!(f, "{desc} ({name})"),
            _ => write!(f, "errno {}", self.0),
        }
    }
}

impl std::error::Error for Errno {}

/// One syscall, with its arguments
///
/// Buffers and addresses are borrowed for the duration of the call, so a
/// gateway can hand their addresses to the kernel without any lifetime
/// bookkeeping of its own.
#[derive(Debug)]
pub enum Request<'a> {
    /// Read up to `buf.len()` bytes
    Read {
        /// Descriptor to read from
        fd: Fd,
        /// Destination buffer
        buf: &'a mut [u8],
    },
    /// Write up to `buf.len()` bytes
    Write {
        /// Descriptor to write to
        fd: Fd,
        /// Source buffer
        buf: &'a [u8],
    },
    /// Open a filesystem path
    Open {
        /// NUL-terminated path
        path: &'a CStr,
        /// `O_*` flags
        flags: i32,
        /// Creation mode
        mode: u32,
    },
    /// Close a descriptor
    Close {
        /// Descriptor to close
        fd: Fd,
    },
    /// Create a socket
    Socket {
        /// Address family
        domain: i32,
        /// Socket type
        kind: i32,
        /// Protocol number
        protocol: i32,
    },
    /// Connect a socket to a Unix-domain address
    Connect {
        /// Socket descriptor
        fd: Fd,
        /// Peer address
        addr: &'a SockAddrUnix,
    },
    /// Shut down part of a full-duplex connection
    Shutdown {
        /// Socket descriptor
        fd: Fd,
        /// `SHUT_*` mode
        how: i32,
    },
}

impl Request<'_> {
    /// Operation name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
            Self::Open { .. } => "open",
            Self::Close { .. } => "close",
            Self::Socket { .. } => "socket",
            Self::Connect { .. } => "connect",
            Self::Shutdown { .. } => "shutdown",
        }
    }
}

impl fmt::Display for Request<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { fd, buf } => write!(f, "read({fd}, {:p}, {})", buf.as_ptr(), buf.len()),
            Self::Write { fd, buf } => {
                write!(f, "write({fd}, {:p}, {})", buf.as_ptr(), buf.len())
            }
            Self::Open { path, flags, mode } => {
                write!(f, "open({path:?}, {flags:#o}, {mode:#o})")
            }
            Self::Close { fd } => write!(f, "close({fd})"),
            Self::Socket {
                domain,
                kind,
                protocol,
            } => write!(f, "socket({domain}, {kind}, {protocol})"),
            Self::Connect { fd, addr } => {
                write!(f, "connect({fd}, {:?}, {})", addr.path(), SockAddrUnix::LEN)
            }
            Self::Shutdown { fd, how } => write!(f, "shutdown({fd}, {how})"),
        }
    }
}

/// Something that can execute a [`Request`] against a Linux kernel
pub trait SyscallGateway: Send + Sync {
    /// Execute one request
    ///
    /// Returns the raw kernel result: non-negative on success, negated errno
    /// on failure.
    fn dispatch(&self, request: Request<'_>) -> isize;
}

impl<G: SyscallGateway + ?Sized> SyscallGateway for &G {
    fn dispatch(&self, request: Request<'_>) -> isize {
        (**self).dispatch(request)
    }
}

/// Typed front end over a [`SyscallGateway`]
#[derive(Debug, Clone, Default)]
pub struct Kernel<G> {
    gateway: G,
}

impl Kernel<NativeGateway> {
    /// Kernel backed by the gateway for the current target
    #[must_use]
    pub fn native() -> Self {
        Self::new(NativeGateway::default())
    }
}

impl<G: SyscallGateway> Kernel<G> {
    /// Wrap a gateway
    pub const fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Underlying gateway
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    fn invoke(&self, request: Request<'_>) -> SysResult<usize> {
        let op = request.name();
        trace!(target: SYSCALL_TARGET, call = %request, "syscall");
        let ret = self.gateway.dispatch(request);
        trace!(target: SYSCALL_TARGET, op, ret, "syscall returned");
        Errno::from_return(ret)
    }

    /// `read(fd, buf, buf.len())`
    pub fn read(&self, fd: Fd, buf: &mut [u8]) -> SysResult<usize> {
        self.invoke(Request::Read { fd, buf })
    }

    /// `write(fd, buf, buf.len())`
    pub fn write(&self, fd: Fd, buf: &[u8]) -> SysResult<usize> {
        self.invoke(Request::Write { fd, buf })
    }

    /// `open(path, flags, mode)`
    pub fn open(&self, path: &CStr, flags: i32, mode: u32) -> SysResult<Fd> {
        self.invoke(Request::Open { path, flags, mode })
            .and_then(to_fd)
    }

    /// `close(fd)`
    pub fn close(&self, fd: Fd) -> SysResult<()> {
        self.invoke(Request::Close { fd }).map(drop)
    }

    /// `socket(domain, kind, protocol)`
    pub fn socket(&self, domain: i32, kind: i32, protocol: i32) -> SysResult<Fd> {
        self.invoke(Request::Socket {
            domain,
            kind,
            protocol,
        })
        .and_then(to_fd)
    }

    /// `connect(fd, addr, sizeof(addr))`
    pub fn connect(&self, fd: Fd, addr: &SockAddrUnix) -> SysResult<()> {
        self.invoke(Request::Connect { fd, addr }).map(drop)
    }

    /// `shutdown(fd, how)`
    pub fn shutdown(&self, fd: Fd, how: i32) -> SysResult<()> {
        self.invoke(Request::Shutdown { fd, how }).map(drop)
    }
}

fn to_fd(raw: usize) -> SysResult<Fd> {
    i32::try_from(raw).map(Fd::from_raw).map_err(|_| Errno::EBADF)
}
