//! Command-line interface

use clap::Parser;
use winerpc_core::{BridgeConfig, LogLevel};

/// License notice printed by `--license`
pub const LICENSE_NOTICE: &str = "\
winerpc-bridge: relays Discord Rich Presence from Wine to the native client

This program is free software: you can redistribute it and/or modify it under
the terms of the GNU General Public License as published by the Free Software
Foundation, either version 3 of the License, or (at your option) any later
version.

This program is distributed in the hope that it will be useful, but WITHOUT ANY
WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A
PARTICULAR PURPOSE. See the GNU General Public License for more details.

You should have received a copy of the GNU General Public License along with
this program. If not, see <https://www.gnu.org/licenses/>.
";

/// WineRPC bridge - relays a Wine named pipe to the Discord IPC socket
#[derive(Parser, Debug)]
#[command(name = "winerpc-bridge")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log level (none, error, warning, info, debug, trace)
    ///
    /// When unset the bridge is silent unless RUST_LOG is set.
    #[arg(short = 'l', long, env = "WINERPC_LOG_LEVEL", value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Pipe name clients connect to
    #[arg(long, env = "WINERPC_PIPE", value_name = "NAME")]
    pub pipe: Option<String>,

    /// Look for the Discord socket below this directory only
    #[arg(long, env = "WINERPC_SOCKET_DIR", value_name = "DIR")]
    pub socket_dir: Option<String>,

    /// Print the license notice and exit
    #[arg(long)]
    pub license: bool,
}

impl Args {
    /// Session configuration for these arguments
    pub fn to_config(&self) -> BridgeConfig {
        let mut config = BridgeConfig::default();
        if let Some(pipe) = &self.pipe {
            config = config.with_pipe_name(pipe.as_str());
        }
        if let Some(dir) = &self.socket_dir {
            config = config.with_socket_dir(dir.as_str());
        }
        config
    }
}
