//! Test pipes built on socket pairs, plus a pipe with Win32 cancel rules

use std::io;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};

use super::{PendingPipe, PipeEndpoint, PipeServer};
use crate::pipe::unix::UnixPipe;

/// [`UnixPipe`] that counts cancellations and closes
#[derive(Debug)]
pub(crate) struct CountingPipe {
    inner: UnixPipe,
    pub cancels: AtomicUsize,
    pub closes: AtomicUsize,
}

impl CountingPipe {
    /// Pipe plus the client end of its socket pair
    pub fn pair() -> (Self, UnixStream) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        let pipe = Self {
            inner: UnixPipe::from_stream(ours),
            cancels: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        };
        (pipe, theirs)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl PipeEndpoint for CountingPipe {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn cancel_io(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.inner.cancel_io();
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close();
    }
}

/// Server that hands out a borrowed [`CountingPipe`], or a scripted error
#[derive(Debug)]
pub(crate) struct MockServer<'a> {
    pipe: &'a CountingPipe,
    pub create_error: Option<io::ErrorKind>,
    pub accept_error: Option<io::ErrorKind>,
    pub created: Mutex<Vec<(String, usize)>>,
}

impl<'a> MockServer<'a> {
    pub fn new(pipe: &'a CountingPipe) -> Self {
        Self {
            pipe,
            create_error: None,
            accept_error: None,
            created: Mutex::new(Vec::new()),
        }
    }
}

pub(crate) struct MockPending<'a> {
    pipe: &'a CountingPipe,
    accept_error: Option<io::ErrorKind>,
}

impl<'a> PipeServer for MockServer<'a> {
    type Pending = MockPending<'a>;

    fn create(&self, name: &str, buffer_size: usize) -> io::Result<MockPending<'a>> {
        self.created.lock().push((name.to_string(), buffer_size));
        match self.create_error {
            Some(kind) => Err(kind.into()),
            None => Ok(MockPending {
                pipe: self.pipe,
                accept_error: self.accept_error,
            }),
        }
    }
}

impl<'a> PendingPipe for MockPending<'a> {
    type Endpoint = PipeRef<'a>;

    fn accept(self) -> io::Result<PipeRef<'a>> {
        match self.accept_error {
            Some(kind) => Err(kind.into()),
            None => Ok(PipeRef(self.pipe)),
        }
    }
}

/// Borrowed pipe, so tests can inspect counters after the session ends
pub(crate) struct PipeRef<'a>(pub &'a CountingPipe);

impl PipeEndpoint for PipeRef<'_> {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn cancel_io(&self) {
        self.0.cancel_io();
    }

    fn close(&self) {
        self.0.close();
    }
}

/// Pipe that cancels the way the Windows endpoint does
///
/// `cancel_io` raises a sticky abort flag, like signalling a manual-reset
/// event. Each read is parked after it has been entered, which is the window
/// between the relay's state check and `ReadFile`, until the test calls
/// [`release_reads`](Self::release_reads).
#[derive(Debug, Default)]
pub(crate) struct AbortablePipe {
    state: Mutex<AbortState>,
    changed: Condvar,
}

#[derive(Debug, Default)]
struct AbortState {
    aborted: bool,
    released: bool,
    reads_entered: usize,
    cancels: usize,
    written: Vec<u8>,
}

impl AbortablePipe {
    /// Block until some read has entered the pipe
    pub fn wait_for_reader(&self) {
        let mut state = self.state.lock();
        while state.reads_entered == 0 {
            self.changed.wait(&mut state);
        }
    }

    /// Let parked reads continue into the "system call"
    pub fn release_reads(&self) {
        self.state.lock().released = true;
        self.changed.notify_all();
    }

    /// Block until the abort flag is raised
    pub fn wait_for_abort(&self) {
        let mut state = self.state.lock();
        while !state.aborted {
            self.changed.wait(&mut state);
        }
    }

    pub fn cancels(&self) -> usize {
        self.state.lock().cancels
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }
}

impl PipeEndpoint for AbortablePipe {
    fn read(&self, _buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        state.reads_entered += 1;
        self.changed.notify_all();
        while !state.released {
            self.changed.wait(&mut state);
        }
        // The read proper: blocks until aborted, fails once it is
        while !state.aborted {
            self.changed.wait(&mut state);
        }
        Err(io::ErrorKind::ConnectionAborted.into())
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.state.lock().written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn cancel_io(&self) {
        let mut state = self.state.lock();
        state.aborted = true;
        state.cancels += 1;
        self.changed.notify_all();
    }

    fn close(&self) {}
}
