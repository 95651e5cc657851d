//! In-memory gateway for unit tests
//!
//! Emulates exactly one Unix-domain peer: connects succeed only for the
//! configured path, reads are served from a queue of inbound chunks and block
//! until data arrives, the peer closes, or the socket is shut down. Every call
//! is recorded so tests can assert on ordering and counts.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::{Errno, Request, SyscallGateway};

/// Scripted outcome of one `write` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteStep {
    /// Accept at most this many bytes
    Accept(usize),
    /// Fail with this errno
    Fail(Errno),
}

#[derive(Debug)]
pub(crate) struct FakeState {
    pub socket_error: Option<Errno>,
    pub listening: Option<String>,
    pub connect_error: Errno,
    pub connects: Vec<String>,
    pub closes: Vec<i32>,
    pub shutdowns: Vec<i32>,
    pub inbound: VecDeque<Vec<u8>>,
    pub peer_closed: bool,
    pub read_error: Option<Errno>,
    pub write_script: VecDeque<WriteStep>,
    pub write_requests: Vec<usize>,
    pub written: Vec<u8>,
    pub shut_down: bool,
    next_fd: i32,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            socket_error: None,
            listening: None,
            connect_error: Errno::ENOENT,
            connects: Vec::new(),
            closes: Vec::new(),
            shutdowns: Vec::new(),
            inbound: VecDeque::new(),
            peer_closed: false,
            read_error: None,
            write_script: VecDeque::new(),
            write_requests: Vec::new(),
            written: Vec::new(),
            shut_down: false,
            next_fd: 2,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeGateway {
    state: Mutex<FakeState>,
    changed: Condvar,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway whose only live peer listens at `path`
    pub fn listening_at(path: &str) -> Self {
        let gateway = Self::new();
        gateway.state().listening = Some(path.to_string());
        gateway
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock()
    }

    /// Queue bytes the peer sends to us
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.state().inbound.push_back(bytes.to_vec());
        self.changed.notify_all();
    }

    /// Peer closes its end: pending and future reads return 0
    pub fn close_peer(&self) {
        self.state().peer_closed = true;
        self.changed.notify_all();
    }

    /// Block until at least `len` bytes have been written, or time out
    pub fn wait_for_written(&self, len: usize, timeout: Duration) -> Vec<u8> {
        let mut state = self.state();
        while state.written.len() < len {
            if self.changed.wait_for(&mut state, timeout).timed_out() {
                break;
            }
        }
        state.written.clone()
    }
}

impl SyscallGateway for FakeGateway {
    fn dispatch(&self, request: Request<'_>) -> isize {
        let mut state = self.state.lock();
        match request {
            Request::Socket { .. } => match state.socket_error {
                Some(errno) => errno.to_return(),
                None => {
                    state.next_fd += 1;
                    state.next_fd as isize
                }
            },
            Request::Connect { addr, .. } => {
                let path = addr.path().into_owned();
                let live = state.listening.as_deref() == Some(path.as_str());
                state.connects.push(path);
                if live {
                    0
                } else {
                    state.connect_error.to_return()
                }
            }
            Request::Read { buf, .. } => loop {
                if let Some(errno) = state.read_error.take() {
                    return errno.to_return();
                }
                if let Some(mut chunk) = state.inbound.pop_front() {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        state.inbound.push_front(chunk.split_off(n));
                    }
                    return n as isize;
                }
                if state.peer_closed || state.shut_down {
                    return 0;
                }
                self.changed.wait(&mut state);
            },
            Request::Write { buf, .. } => {
                state.write_requests.push(buf.len());
                if state.shut_down {
                    return Errno::EPIPE.to_return();
                }
                let accepted = match state.write_script.pop_front() {
                    Some(WriteStep::Fail(errno)) => return errno.to_return(),
                    Some(WriteStep::Accept(n)) => n.min(buf.len()),
                    None => buf.len(),
                };
                state.written.extend_from_slice(&buf[..accepted]);
                self.changed.notify_all();
                accepted as isize
            }
            Request::Shutdown { fd, .. } => {
                state.shutdowns.push(fd.raw());
                state.shut_down = true;
                self.changed.notify_all();
                0
            }
            Request::Close { fd } => {
                state.closes.push(fd.raw());
                0
            }
            Request::Open { .. } => Errno::ENOSYS.to_return(),
        }
    }
}
