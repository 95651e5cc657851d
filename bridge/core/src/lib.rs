//! WineRPC Core - Named Pipe to Unix Socket Relay
//!
//! Games running under Wine talk to Discord's Rich Presence over the Windows
//! named pipe `\\.\pipe\discord-ipc-0`. The native Linux Discord client only
//! listens on a Unix-domain socket, which Wine does not expose. This crate
//! sits between the two and moves bytes both ways without looking at them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐          ┌──────────────────────────────┐
//! │   Windows side (under Wine)  │          │          Linux side          │
//! │                              │          │                              │
//! │  ┌────────────┐              │          │              ┌────────────┐  │
//! │  │ RPC client │              │          │              │  Discord   │  │
//! │  │   (game)   │              │          │              │   client   │  │
//! │  └─────┬──────┘              │          │              └─────▲──────┘  │
//! │        │ named pipe          │          │    discord-ipc-<n> │         │
//! └────────┼─────────────────────┘          └────────────────────┼─────────┘
//!          │                                                     │
//! ┌────────▼─────────────────────────────────────────────────────┴─────────┐
//! │                              WINERPC CORE                              │
//! │  ┌───────────┐   ┌──────────────────────────┐   ┌──────────────────┐   │
//! │  │   pipe    │◀─▶│          relay           │◀─▶│      socket      │   │
//! │  │ endpoint  │   │ pipe->socket  socket->pipe│   │    endpoint      │   │
//! │  └───────────┘   └──────────────────────────┘   └────────┬─────────┘   │
//! │                                                          │ raw syscalls│
//! │  session: create pipe, accept, discovery, relay, close   ▼             │
//! │                                              ┌──────────────────────┐  │
//! │                                              │ syscall::Kernel<G>   │  │
//! │                                              └──────────────────────┘  │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`run_session`]: One complete session, pipe creation to teardown
//! - [`BridgeConfig`]: Pipe name, chunk size, and discovery settings
//! - [`Kernel`]: Typed syscalls over a [`SyscallGateway`]
//! - [`SocketEndpoint`]: The Unix socket, driven through a [`Kernel`]
//! - [`PipeEndpoint`]: The single-client pipe (named pipe or Unix stand-in)
//! - [`Relay`]: The two copy loops and the session state machine
//!
//! # Module Overview
//!
//! - [`syscall`]: Raw Linux syscalls (`int 0x80`, `syscall`, or libc)
//! - [`discovery`]: Locating the Discord IPC socket
//! - [`relay`]: Bidirectional byte copying
//! - [`pipe`]: Platform pipe endpoints
//! - [`session`]: Session bootstrap and teardown
//! - [`config`]: Configuration and log levels

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod discovery;
pub mod error;
pub mod latch;
pub mod pipe;
pub mod relay;
pub mod session;
pub mod socket;
pub mod syscall;

pub use config::{BridgeConfig, ConfigError, LogLevel};
pub use discovery::{
    connect_first, discover_and_connect, Connected, DiscoveryConfig, DiscoveryError, PathTemplate,
};
pub use error::BridgeError;
pub use latch::CloseLatch;
pub use pipe::{NativePipeServer, PendingPipe, PipeEndpoint, PipeServer, DEFAULT_PIPE_NAME};
pub use relay::{
    Direction, DirectionOutcome, DirectionReport, DirectionStats, EndpointError, Relay,
    RelayError, SessionReport, SessionState, Stage, CHUNK_SIZE,
};
pub use session::run_session;
pub use socket::SocketEndpoint;
pub use syscall::{Errno, Fd, Kernel, NativeGateway, SyscallGateway};
