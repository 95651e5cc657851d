//! Native Gateways
//!
//! Gateways that reach the Linux kernel from the current target:
//!
//! | Target                         | Gateway              | Mechanism                  |
//! |--------------------------------|----------------------|----------------------------|
//! | x86 (Linux, or Windows on Wine)| [`Int80Gateway`]     | `int 0x80`, i386 numbers   |
//! | x86_64 (Linux, or Wine)        | [`SyscallInsnGateway`]| `syscall`, x86_64 numbers |
//! | other Linux architectures      | [`LibcGateway`]      | C library entry points     |
//!
//! The i386 ABI reaches every socket operation through the `socketcall`
//! multiplexer: the logical arguments are packed into a small array and its
//! address is passed as the second register argument. The x86_64 ABI has one
//! syscall per socket operation, so no packing is needed there.
//!
//! All pointer and length marshalling happens in this module; callers only
//! ever see [`Request`] values going in and raw kernel results coming out.

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
use std::arch::asm;

#[cfg(target_os = "linux")]
use super::Errno;
use super::{abi, Request, SockAddrUnix, SyscallGateway};

#[cfg(not(any(
    target_os = "linux",
    all(windows, any(target_arch = "x86", target_arch = "x86_64"))
)))]
compile_error!(
    "winerpc talks to a Linux kernel: build for Linux, or for x86/x86_64 Windows running under Wine"
);

/// Gateway used by [`Kernel::native`](super::Kernel::native) on this target
#[cfg(all(target_arch = "x86", any(target_os = "linux", windows)))]
pub type NativeGateway = Int80Gateway;

/// Gateway used by [`Kernel::native`](super::Kernel::native) on this target
#[cfg(all(target_arch = "x86_64", any(target_os = "linux", windows)))]
pub type NativeGateway = SyscallInsnGateway;

/// Gateway used by [`Kernel::native`](super::Kernel::native) on this target
#[cfg(all(
    target_os = "linux",
    not(any(target_arch = "x86", target_arch = "x86_64"))
))]
pub type NativeGateway = LibcGateway;

/// Register-level form of a request: syscall number and three arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Marshalled {
    nr: usize,
    args: [usize; 3],
}

/// Marshal a request for the i386 ABI
///
/// Socket operations go through `socketcall`; their logical arguments are
/// written to `packed`, whose address becomes the second register argument.
/// `packed` must outlive the syscall.
#[cfg(any(target_arch = "x86", test))]
fn marshal_i386(request: Request<'_>, packed: &mut [usize; 3]) -> Marshalled {
    use abi::i386::{self, socketcall};

    let mut multiplexed = |call: usize, args: [usize; 3]| {
        *packed = args;
        Marshalled {
            nr: i386::SOCKETCALL,
            args: [call, packed.as_ptr() as usize, 0],
        }
    };

    match request {
        Request::Read { fd, buf } => Marshalled {
            nr: i386::READ,
            args: [fd.raw() as usize, buf.as_mut_ptr() as usize, buf.len()],
        },
        Request::Write { fd, buf } => Marshalled {
            nr: i386::WRITE,
            args: [fd.raw() as usize, buf.as_ptr() as usize, buf.len()],
        },
        Request::Open { path, flags, mode } => Marshalled {
            nr: i386::OPEN,
            args: [path.as_ptr() as usize, flags as usize, mode as usize],
        },
        Request::Close { fd } => Marshalled {
            nr: i386::CLOSE,
            args: [fd.raw() as usize, 0, 0],
        },
        Request::Socket {
            domain,
            kind,
            protocol,
        } => multiplexed(
            socketcall::SOCKET,
            [domain as usize, kind as usize, protocol as usize],
        ),
        Request::Connect { fd, addr } => multiplexed(
            socketcall::CONNECT,
            [
                fd.raw() as usize,
                std::ptr::from_ref(addr) as usize,
                SockAddrUnix::LEN,
            ],
        ),
        Request::Shutdown { fd, how } => multiplexed(
            socketcall::SHUTDOWN,
            [fd.raw() as usize, how as usize, 0],
        ),
    }
}

/// Marshal a request for the x86_64 ABI
#[cfg(any(target_arch = "x86_64", test))]
fn marshal_x86_64(request: Request<'_>) -> Marshalled {
    use abi::x86_64;

    let (nr, args) = match request {
        Request::Read { fd, buf } => (
            x86_64::READ,
            [fd.raw() as usize, buf.as_mut_ptr() as usize, buf.len()],
        ),
        Request::Write { fd, buf } => (
            x86_64::WRITE,
            [fd.raw() as usize, buf.as_ptr() as usize, buf.len()],
        ),
        Request::Open { path, flags, mode } => (
            x86_64::OPEN,
            [path.as_ptr() as usize, flags as usize, mode as usize],
        ),
        Request::Close { fd } => (x86_64::CLOSE, [fd.raw() as usize, 0, 0]),
        Request::Socket {
            domain,
            kind,
            protocol,
        } => (
            x86_64::SOCKET,
            [domain as usize, kind as usize, protocol as usize],
        ),
        Request::Connect { fd, addr } => (
            x86_64::CONNECT,
            [
                fd.raw() as usize,
                std::ptr::from_ref(addr) as usize,
                SockAddrUnix::LEN,
            ],
        ),
        Request::Shutdown { fd, how } => (x86_64::SHUTDOWN, [fd.raw() as usize, how as usize, 0]),
    };
    Marshalled { nr, args }
}

/// i386 gateway: `int 0x80`
///
/// Works from a 32-bit Linux process and from 32-bit Windows code running
/// under Wine, where the instruction traps straight into the Linux kernel.
#[cfg(target_arch = "x86")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Int80Gateway;

#[cfg(target_arch = "x86")]
impl SyscallGateway for Int80Gateway {
    fn dispatch(&self, request: Request<'_>) -> isize {
        let mut packed = [0usize; 3];
        let call = marshal_i386(request, &mut packed);
        // SAFETY: every pointer in `call.args` comes from a borrow held by the
        // request (or from `packed`, which lives until the end of this
        // function), and the lengths are the lengths of those borrows.
        unsafe { int80(call.nr, call.args) }
    }
}

#[cfg(target_arch = "x86")]
unsafe fn int80(nr: usize, args: [usize; 3]) -> isize {
    let ret: isize;
    unsafe {
        asm!(
            "int 0x80",
            inlateout("eax") nr as isize => ret,
            in("ebx") args[0],
            in("ecx") args[1],
            in("edx") args[2],
            options(nostack),
        );
    }
    ret
}

/// x86_64 gateway: the `syscall` instruction
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SyscallInsnGateway;

#[cfg(target_arch = "x86_64")]
impl SyscallGateway for SyscallInsnGateway {
    fn dispatch(&self, request: Request<'_>) -> isize {
        let call = marshal_x86_64(request);
        // SAFETY: every pointer in `call.args` comes from a borrow held by the
        // request for the duration of this call, and the lengths are the
        // lengths of those borrows.
        unsafe { syscall3(call.nr, call.args) }
    }
}

#[cfg(target_arch = "x86_64")]
unsafe fn syscall3(nr: usize, args: [usize; 3]) -> isize {
    let ret: isize;
    unsafe {
        asm!(
            "syscall",
            inlateout("rax") nr as isize => ret,
            in("rdi") args[0],
            in("rsi") args[1],
            in("rdx") args[2],
            lateout("rcx") _,
            lateout("r11") _,
            options(nostack),
        );
    }
    ret
}

/// Gateway through the host C library
///
/// Only meaningful when the host itself is Linux. Failures are converted to
/// the negated-errno convention right after the call.
#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LibcGateway;

#[cfg(target_os = "linux")]
impl SyscallGateway for LibcGateway {
    fn dispatch(&self, request: Request<'_>) -> isize {
        // SAFETY: pointers come from borrows held by the request and the
        // lengths passed are the lengths of those borrows.
        let ret = unsafe {
            match request {
                Request::Read { fd, buf } => libc::read(fd.raw(), buf.as_mut_ptr().cast(), buf.len()),
                Request::Write { fd, buf } => libc::write(fd.raw(), buf.as_ptr().cast(), buf.len()),
                Request::Open { path, flags, mode } => {
                    libc::open(path.as_ptr(), flags, mode as libc::c_uint) as isize
                }
                Request::Close { fd } => libc::close(fd.raw()) as isize,
                Request::Socket {
                    domain,
                    kind,
                    protocol,
                } => libc::socket(domain, kind, protocol) as isize,
                Request::Connect { fd, addr } => libc::connect(
                    fd.raw(),
                    std::ptr::from_ref(addr).cast(),
                    SockAddrUnix::LEN as libc::socklen_t,
                ) as isize,
                Request::Shutdown { fd, how } => libc::shutdown(fd.raw(), how) as isize,
            }
        };

        if ret < 0 {
            let errno = std::io::Error::last_os_error()
                .raw_os_error()
                .unwrap_or(Errno::EIO.raw());
            Errno::new(errno).to_return()
        } else {
            ret
        }
    }
}
