//! Session-level errors
//!
//! Anything that stops a session before the relay starts. Relay I/O failures
//! are not here: they end up in the [`SessionReport`](crate::SessionReport).

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::discovery::DiscoveryError;

/// Why a session could not run
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration rejected before any endpoint was created
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The pipe could not be created
    #[error("failed to create pipe {name}: {source}")]
    PipeCreate {
        /// Pipe name that was requested
        name: String,
        /// OS error
        #[source]
        source: io::Error,
    },

    /// Waiting for the pipe client failed
    #[error("failed to accept pipe client: {0}")]
    PipeAccept(#[source] io::Error),

    /// No Discord client socket was reachable
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The second relay thread could not be started
    #[error("failed to spawn relay thread: {0}")]
    SpawnRelay(#[source] io::Error),
}
