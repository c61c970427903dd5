//! # Configuration
//!
//! Command-line surface, parsed with `clap`'s derive API the way the
//! rest of the workspace pulls in its crates for a concern rather than
//! hand-rolling one.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use ferrokv_common::{DEFAULT_HOST, DEFAULT_MAX_CLIENTS, DEFAULT_PORT};

#[derive(Debug, Parser)]
#[command(name = "ferrokv-server", about = "An in-memory key-value server")]
pub struct Cli {
    /// Address to bind the listener to.
    #[arg(short = 'H', long = "host", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to bind the listener to.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Maximum number of connections served concurrently.
    #[arg(short, long = "max-clients", default_value_t = DEFAULT_MAX_CLIENTS)]
    pub max_clients: usize,

    /// Serve connections on OS threads instead of the cooperative task pool.
    #[arg(short = 't', long = "use-threads")]
    pub use_threads: bool,

    /// Enable debug-level logging.
    #[arg(short, long)]
    pub debug: bool,

    /// Enable error-level-and-above logging only (overridden by --debug).
    #[arg(short, long)]
    pub errors: bool,

    /// Mirror logs to this file in addition to stderr.
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,
}

/// Fully resolved server configuration, derived from `Cli`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub max_clients: usize,
    pub use_threads: bool,
}

impl Cli {
    pub fn into_server_config(self) -> Result<ServerConfig, std::net::AddrParseError> {
        let ip: IpAddr = self.host.parse()?;
        Ok(ServerConfig {
            addr: SocketAddr::new(ip, self.port),
            max_clients: self.max_clients,
            use_threads: self.use_threads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_published_flag_table() {
        let cli = Cli::parse_from(["ferrokv-server"]);
        assert_eq!(cli.host, DEFAULT_HOST);
        assert_eq!(cli.port, DEFAULT_PORT);
        assert_eq!(cli.max_clients, DEFAULT_MAX_CLIENTS);
        assert!(!cli.use_threads);
        assert!(!cli.debug);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "ferrokv-server",
            "--host",
            "0.0.0.0",
            "--port",
            "9999",
            "--max-clients",
            "4",
            "--use-threads",
            "--debug",
        ]);
        let config = cli.into_server_config().unwrap();
        assert_eq!(config.addr.to_string(), "0.0.0.0:9999");
        assert_eq!(config.max_clients, 4);
        assert!(config.use_threads);
    }
}
