//! Session Bootstrap
//!
//! One session, start to finish:
//!
//! ```text
//! create pipe ─▶ accept one client ─▶ discover socket ─▶ relay ─┐
//!                                                                │
//!                       close pipe ◀── close socket ◀────────────┘
//! ```
//!
//! Endpoints are released in reverse order of acquisition on every path out,
//! and each is closed exactly once.

use tracing::info;

use crate::config::BridgeConfig;
use crate::discovery::{discover_and_connect, Connected};
use crate::error::BridgeError;
use crate::pipe::{PendingPipe, PipeEndpoint, PipeServer};
use crate::relay::{Relay, SessionReport};
use crate::syscall::{Kernel, SyscallGateway};

/// Serve one RPC client through `server` and relay it to Discord
///
/// # Errors
///
/// Fails if the configuration is invalid, the pipe cannot be created or
/// accepted, discovery finds no Discord client, or the relay thread cannot
/// be spawned. Relay I/O errors are returned inside the [`SessionReport`].
pub fn run_session<S, G>(
    server: &S,
    kernel: &Kernel<G>,
    config: &BridgeConfig,
) -> Result<SessionReport, BridgeError>
where
    S: PipeServer,
    G: SyscallGateway,
{
    config.validate()?;

    info!(pipe = %config.pipe_name, "Creating named pipe");
    let pending = server
        .create(&config.pipe_name, config.chunk_size)
        .map_err(|source| BridgeError::PipeCreate {
            name: config.pipe_name.clone(),
            source,
        })?;

    info!("Awaiting connection");
    let pipe = pending.accept().map_err(BridgeError::PipeAccept)?;

    let result = connect_and_relay(&pipe, kernel, config);
    pipe.close();
    result
}

fn connect_and_relay<P, G>(
    pipe: &P,
    kernel: &Kernel<G>,
    config: &BridgeConfig,
) -> Result<SessionReport, BridgeError>
where
    P: PipeEndpoint,
    G: SyscallGateway,
{
    let Connected { socket, .. } = discover_and_connect(kernel, &config.discovery)?;

    let report = Relay::new(pipe, &socket)
        .with_chunk_size(config.chunk_size)
        .run()
        .map_err(BridgeError::SpawnRelay);

    socket.close();
    report
}
