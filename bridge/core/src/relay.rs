//! Relay Engine
//!
//! Copies bytes both ways between a connected [`PipeEndpoint`] and a connected
//! [`SocketEndpoint`] until either side goes away.
//!
//! # Threads
//!
//! ```text
//!            caller thread                    "socket->pipe" thread
//!   ┌──────────────────────────────┐   ┌──────────────────────────────┐
//!   │ pipe.read ──▶ socket.write   │   │ socket.read ──▶ pipe.write   │
//!   └──────────────┬───────────────┘   └──────────────┬───────────────┘
//!                  │ EOF / error                      │ EOF / error
//!                  └────────────┬─────────────────────┘
//!                               ▼
//!                  Active ──▶ Closing ──▶ Closed
//!                  (first one in cancels pipe I/O and shuts the socket)
//! ```
//!
//! The relay never closes either endpoint; it only interrupts them so the
//! other direction wakes up. Closing is the owner's job once both threads
//! have been joined.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::pipe::PipeEndpoint;
use crate::socket::SocketEndpoint;
use crate::syscall::{Errno, SyscallGateway};

/// Largest number of bytes moved by a single read or write
pub const CHUNK_SIZE: usize = 2048;

/// Which way bytes flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// RPC client to Discord
    PipeToSocket,
    /// Discord to RPC client
    SocketToPipe,
}

impl Direction {
    /// Party that writes into this direction
    pub fn source(self) -> &'static str {
        match self {
            Self::PipeToSocket => "RPC client",
            Self::SocketToPipe => "Discord client",
        }
    }

    /// Party that reads from this direction
    pub fn sink(self) -> &'static str {
        match self {
            Self::PipeToSocket => "Discord client",
            Self::SocketToPipe => "RPC client",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PipeToSocket => "pipe->socket",
            Self::SocketToPipe => "socket->pipe",
        })
    }
}

/// Lifecycle of one relay session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Both directions are copying
    Active = 0,
    /// One direction stopped; the other is being interrupted
    Closing = 1,
    /// Both directions have exited
    Closed = 2,
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(SessionState::Active as u8))
    }

    fn get(&self) -> SessionState {
        match self.0.load(Ordering::Acquire) {
            0 => SessionState::Active,
            1 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }

    /// Move `Active -> Closing`; true for the caller that made the move
    fn begin_closing(&self) -> bool {
        self.0
            .compare_exchange(
                SessionState::Active as u8,
                SessionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn finish(&self) {
        self.0.store(SessionState::Closed as u8, Ordering::Release);
    }
}

/// Failure of one endpoint operation
#[derive(Debug, Error)]
pub enum EndpointError {
    /// Pipe read or write failed
    #[error("pipe: {0}")]
    Pipe(#[source] io::Error),

    /// Socket read or write failed
    #[error("socket: {0}")]
    Socket(#[source] Errno),

    /// Sink accepted none of a non-empty chunk
    #[error("write accepted zero bytes")]
    WriteZero,
}

/// Half of a copy step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading from the source
    Read,
    /// Writing to the sink
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
        })
    }
}

/// I/O failure that ended a relay direction
#[derive(Debug, Error)]
#[error("{direction} {stage} failed: {source}")]
pub struct RelayError {
    /// Direction that failed
    pub direction: Direction,
    /// Whether the read or the write failed
    pub stage: Stage,
    /// Underlying endpoint error
    #[source]
    pub source: EndpointError,
}

/// How a direction ended
#[derive(Debug)]
pub enum DirectionOutcome {
    /// Its source reached end-of-stream
    PeerClosed,
    /// The other direction tore the session down first
    Interrupted,
    /// An I/O error while the session was still active
    Failed(RelayError),
}

/// Byte and chunk counters for one direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionStats {
    /// Bytes forwarded
    pub bytes: u64,
    /// Chunks read from the source and fully written to the sink
    pub chunks: u64,
}

/// Result of one direction
#[derive(Debug)]
pub struct DirectionReport {
    /// Which direction
    pub direction: Direction,
    /// How it ended
    pub outcome: DirectionOutcome,
    /// What it moved
    pub stats: DirectionStats,
}

/// Result of a whole relay session
#[derive(Debug)]
pub struct SessionReport {
    /// RPC client to Discord
    pub pipe_to_socket: DirectionReport,
    /// Discord to RPC client
    pub socket_to_pipe: DirectionReport,
}

impl SessionReport {
    /// True unless some direction failed with an I/O error
    pub fn is_success(&self) -> bool {
        self.errors().next().is_none()
    }

    /// Errors of the failed directions
    pub fn errors(&self) -> impl Iterator<Item = &RelayError> {
        [&self.pipe_to_socket, &self.socket_to_pipe]
            .into_iter()
            .filter_map(|report| match &report.outcome {
                DirectionOutcome::Failed(err) => Some(err),
                _ => None,
            })
    }
}

/// One relay session over borrowed endpoints
pub struct Relay<'s, 'k, P, G>
where
    P: PipeEndpoint,
    G: SyscallGateway,
{
    pipe: &'s P,
    socket: &'s SocketEndpoint<'k, G>,
    chunk_size: usize,
    state: StateCell,
}

impl<'s, 'k, P, G> Relay<'s, 'k, P, G>
where
    P: PipeEndpoint,
    G: SyscallGateway,
{
    /// Relay between `pipe` and `socket` in [`CHUNK_SIZE`] chunks
    pub fn new(pipe: &'s P, socket: &'s SocketEndpoint<'k, G>) -> Self {
        Self {
            pipe,
            socket,
            chunk_size: CHUNK_SIZE,
            state: StateCell::new(),
        }
    }

    /// Use a different chunk size (at least 1)
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Run both directions until the session closes
    ///
    /// Pipe-to-socket runs on the calling thread, socket-to-pipe on a scoped
    /// worker thread.
    ///
    /// # Errors
    ///
    /// Fails only if the worker thread cannot be spawned. Relay I/O errors are
    /// reported in the returned [`SessionReport`].
    pub fn run(&self) -> io::Result<SessionReport> {
        let report = thread::scope(|s| {
            let worker = thread::Builder::new()
                .name(Direction::SocketToPipe.to_string())
                .spawn_scoped(s, || {
                    self.pump(
                        Direction::SocketToPipe,
                        |buf| self.socket.read(buf).map_err(EndpointError::Socket),
                        |buf| self.pipe.write(buf).map_err(EndpointError::Pipe),
                    )
                })?;

            let pipe_to_socket = self.pump(
                Direction::PipeToSocket,
                |buf| self.pipe.read(buf).map_err(EndpointError::Pipe),
                |buf| self.socket.write(buf).map_err(EndpointError::Socket),
            );

            let socket_to_pipe = match worker.join() {
                Ok(report) => report,
                Err(panic) => std::panic::resume_unwind(panic),
            };

            Ok::<_, io::Error>(SessionReport {
                pipe_to_socket,
                socket_to_pipe,
            })
        })?;

        self.state.finish();
        debug!(
            to_socket = report.pipe_to_socket.stats.bytes,
            to_pipe = report.socket_to_pipe.stats.bytes,
            "Relay session closed"
        );
        Ok(report)
    }

    fn pump<R, W>(&self, direction: Direction, read: R, write: W) -> DirectionReport
    where
        R: Fn(&mut [u8]) -> Result<usize, EndpointError>,
        W: Fn(&[u8]) -> Result<usize, EndpointError>,
    {
        let mut buf = vec![0u8; self.chunk_size];
        let mut stats = DirectionStats::default();

        let outcome = loop {
            if self.state.get() != SessionState::Active {
                break DirectionOutcome::Interrupted;
            }

            let n = match read(&mut buf) {
                Ok(0) => break self.end_of_stream(direction),
                Ok(n) => n,
                Err(source) => break self.failure(direction, Stage::Read, source),
            };

            if let Err(source) = write_all(&write, &buf[..n]) {
                break self.failure(direction, Stage::Write, source);
            }

            stats.bytes += n as u64;
            stats.chunks += 1;
            info!(
                %direction,
                bytes = n,
                "{n} bytes written from {} to {}",
                direction.source(),
                direction.sink()
            );
        };

        self.begin_closing(direction);
        DirectionReport {
            direction,
            outcome,
            stats,
        }
    }

    fn end_of_stream(&self, direction: Direction) -> DirectionOutcome {
        if self.state.get() == SessionState::Active {
            warn!(%direction, "Connection closed by {}", direction.source());
            DirectionOutcome::PeerClosed
        } else {
            DirectionOutcome::Interrupted
        }
    }

    fn failure(&self, direction: Direction, stage: Stage, source: EndpointError) -> DirectionOutcome {
        if self.state.get() != SessionState::Active {
            debug!(%direction, %stage, error = %source, "I/O ended by teardown");
            return DirectionOutcome::Interrupted;
        }
        let err = RelayError {
            direction,
            stage,
            source,
        };
        error!(%direction, error = %err, "Relay I/O failed");
        DirectionOutcome::Failed(err)
    }

    fn begin_closing(&self, direction: Direction) {
        if self.state.begin_closing() {
            debug!(%direction, "Interrupting the other direction");
            self.pipe.cancel_io();
            self.socket.interrupt();
        }
    }
}

impl<P, G> fmt::Debug for Relay<'_, '_, P, G>
where
    P: PipeEndpoint,
    G: SyscallGateway,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("socket", self.socket)
            .field("chunk_size", &self.chunk_size)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

/// Write the whole chunk, one follow-up write per remaining fragment
fn write_all<W>(write: &W, mut chunk: &[u8]) -> Result<(), EndpointError>
where
    W: Fn(&[u8]) -> Result<usize, EndpointError>,
{
    while !chunk.is_empty() {
        match write(chunk)? {
            0 => return Err(EndpointError::WriteZero),
            n => chunk = &chunk[n.min(chunk.len())..],
        }
    }
    Ok(())
}
