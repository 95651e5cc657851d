//! Endpoint Discovery
//!
//! Finds the Discord client's IPC socket. Discord listens on
//! `discord-ipc-<n>` (n = 0..=9) in a runtime directory whose location
//! depends on how it was installed, so the bridge walks a fixed list of
//! candidates and keeps the first one that accepts a connection.
//!
//! # Candidate order
//!
//! ```text
//! base = --socket-dir | $XDG_RUNTIME_DIR | $TMPDIR | $TMP | $TEMP | /tmp
//!
//! for template in [ <base>/
//!                 , <base>/app/com.discordapp.Discord/
//!                 , <base>/snap.discord-canary/
//!                 , <base>/snap.discord/ ]:
//!     for n in 0..=9:
//!         connect(template + "discord-ipc-" + n)
//! ```
//!
//! Paths are always built with `/`, since they name Linux files even when the
//! bridge itself is a Windows program.

use std::borrow::Cow;
use std::ffi::OsString;
use std::fmt;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::socket::SocketEndpoint;
use crate::syscall::{Errno, Kernel, SyscallGateway};

/// Environment variables consulted for the base directory, in order
pub const BASE_DIR_VARS: [&str; 4] = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"];

/// Base directory when none of [`BASE_DIR_VARS`] is set
pub const FALLBACK_BASE_DIR: &str = "/tmp";

/// File name stem of the Discord IPC socket
pub const SOCKET_NAME: &str = "discord-ipc";

/// Highest socket suffix tried in each directory
pub const MAX_SUFFIX: u8 = 9;

/// One directory layout below the base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    subdir: Cow<'static, str>,
}

impl PathTemplate {
    /// Template for a compile-time subdirectory (`""` for the base itself)
    pub const fn fixed(subdir: &'static str) -> Self {
        Self {
            subdir: Cow::Borrowed(subdir),
        }
    }

    /// Template for a runtime subdirectory
    pub fn new(subdir: impl Into<String>) -> Self {
        Self {
            subdir: Cow::Owned(subdir.into()),
        }
    }

    /// Subdirectory relative to the base
    pub fn subdir(&self) -> &str {
        &self.subdir
    }

    /// Candidate path for `base` and `suffix`
    pub fn render(&self, base: &str, suffix: u8) -> String {
        let base = base.trim_end_matches('/');
        let subdir = self.subdir.trim_matches('/');
        if subdir.is_empty() {
            format!("{base}/{SOCKET_NAME}-{suffix}")
        } else {
            format!("{base}/{subdir}/{SOCKET_NAME}-{suffix}")
        }
    }
}

/// Directory layouts Discord is known to use, in priority order
pub const DEFAULT_TEMPLATES: [PathTemplate; 4] = [
    // Native package
    PathTemplate::fixed(""),
    // Flatpak
    PathTemplate::fixed("app/com.discordapp.Discord"),
    // Snap, canary channel
    PathTemplate::fixed("snap.discord-canary"),
    // Snap
    PathTemplate::fixed("snap.discord"),
];

/// Where discovery looks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Explicit base directory; skips the environment when set
    pub base_dir: Option<String>,
    /// Environment variables tried in order; the first one set wins
    pub base_dir_vars: Vec<String>,
    /// Base directory when no variable is set
    pub fallback_base_dir: String,
    /// Directory layouts, tried in order
    pub templates: Vec<PathTemplate>,
    /// Suffixes `0..=max_suffix` are tried per layout
    pub max_suffix: u8,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            base_dir_vars: BASE_DIR_VARS.iter().map(ToString::to_string).collect(),
            fallback_base_dir: FALLBACK_BASE_DIR.to_string(),
            templates: DEFAULT_TEMPLATES.to_vec(),
            max_suffix: MAX_SUFFIX,
        }
    }
}

impl DiscoveryConfig {
    /// Use `dir` as the base directory instead of the environment
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<String>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Base directory from the override, the process environment, or the
    /// fallback
    pub fn resolve_base_dir(&self) -> String {
        self.resolve_base_dir_with(|name| std::env::var_os(name))
    }

    /// Like [`resolve_base_dir`](Self::resolve_base_dir), reading variables
    /// through `lookup`
    ///
    /// A variable that is set but empty still counts as set. One that is
    /// not valid UTF-8 cannot name a socket path and is skipped with a
    /// warning.
    pub fn resolve_base_dir_with<F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<OsString>,
    {
        if let Some(dir) = &self.base_dir {
            return dir.clone();
        }
        self.base_dir_vars
            .iter()
            .find_map(|name| {
                match lookup(name)?.into_string() {
                    Ok(value) => {
                        debug!(var = %name, value = %value, "Base directory from environment");
                        Some(value)
                    }
                    Err(raw) => {
                        warn!(var = %name, value = ?raw, "Ignoring non-UTF-8 base directory");
                        None
                    }
                }
            })
            .unwrap_or_else(|| self.fallback_base_dir.clone())
    }

    /// Every candidate path below `base`, in connection order
    pub fn candidates<'a>(&'a self, base: &'a str) -> impl Iterator<Item = String> + 'a {
        self.templates.iter().flat_map(move |template| {
            (0..=self.max_suffix).map(move |suffix| template.render(base, suffix))
        })
    }
}

/// A socket connected to the Discord client
pub struct Connected<'k, G: SyscallGateway> {
    /// The connected socket
    pub socket: SocketEndpoint<'k, G>,
    /// Path it connected to
    pub path: String,
    /// Connect attempts made, including the successful one
    pub attempts: usize,
}

impl<G: SyscallGateway> fmt::Debug for Connected<'_, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connected")
            .field("socket", &self.socket)
            .field("path", &self.path)
            .field("attempts", &self.attempts)
            .finish()
    }
}

/// Why discovery found no Discord client
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The socket itself could not be created
    #[error("failed to create Unix socket: {0}")]
    SocketCreate(#[source] Errno),

    /// Every candidate path refused the connection
    #[error("could not connect to a Discord client after {attempts} attempts (last error: {last})")]
    Exhausted {
        /// Connect attempts made
        attempts: usize,
        /// Error from the final attempt
        last: Errno,
    },
}

/// Resolve the base directory and connect to the first live candidate
///
/// # Errors
///
/// See [`connect_first`].
pub fn discover_and_connect<'k, G: SyscallGateway>(
    kernel: &'k Kernel<G>,
    config: &DiscoveryConfig,
) -> Result<Connected<'k, G>, DiscoveryError> {
    let base = config.resolve_base_dir();
    debug!(base = %base, "Searching for Discord IPC socket");
    connect_first(kernel, config.candidates(&base))
}

/// Create one socket and try `candidates` in order until one connects
///
/// # Errors
///
/// [`DiscoveryError::SocketCreate`] if no socket could be created, before any
/// connect; [`DiscoveryError::Exhausted`] once every candidate failed. In the
/// latter case the socket has been closed.
pub fn connect_first<'k, G, I>(
    kernel: &'k Kernel<G>,
    candidates: I,
) -> Result<Connected<'k, G>, DiscoveryError>
where
    G: SyscallGateway,
    I: IntoIterator<Item = String>,
{
    let socket = SocketEndpoint::open_stream(kernel).map_err(|errno| {
        error!(%errno, "Failed to create Unix socket");
        DiscoveryError::SocketCreate(errno)
    })?;

    let mut attempts = 0;
    let mut last = Errno::ENOENT;
    for path in candidates {
        attempts += 1;
        info!(path = %path, attempt = attempts, "Attempting to connect to socket at {path}");
        match socket.connect(&path) {
            Ok(()) => {
                info!(path = %path, attempts, "Connected to Discord client");
                return Ok(Connected {
                    socket,
                    path,
                    attempts,
                });
            }
            Err(errno) => {
                warn!(path = %path, %errno, "Failed to connect to socket");
                last = errno;
            }
        }
    }

    error!(attempts, last = %last, "Could not connect to a Discord client");
    Err(DiscoveryError::Exhausted { attempts, last })
}
