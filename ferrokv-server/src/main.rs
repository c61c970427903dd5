//! # ferrokv-server binary
//!
//! Parses CLI flags, installs logging, prints the startup banner, and
//! hands off to whichever listener mode was requested.

use std::sync::Arc;

use clap::Parser;
use parking_lot::Mutex;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use ferrokv_engine::Store;
use ferrokv_server::{server, Cli, Metrics};

const BANNER: &str = r#"
 __              _          _
/ _| ___ _ __ _ __ ___ | | ____ __
| |_ / _ \ '__| '__/ _ \| |/ /\ \ / /
|  _|  __/ |  | | | (_) |   <  \ V /
|_|  \___|_|  |_|  \___/|_|\_\  \_/
"#;

fn install_logging(cli: &Cli) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let default_level = if cli.debug {
        "debug"
    } else if cli.errors {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match &cli.log_file {
        Some(path) => {
            let file = match std::fs::OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => file,
                Err(err) => {
                    eprintln!("failed to open log file {}: {err}", path.display());
                    std::process::exit(1);
                }
            };
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(non_blocking.and(std::io::stderr))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = install_logging(&cli);
    println!("{BANNER}");

    let config = cli
        .into_server_config()
        .map_err(|err| anyhow::anyhow!("invalid --host: {err}"))?;

    let store = Arc::new(Mutex::new(Store::new()));
    let metrics = Arc::new(Metrics::new());

    let result = if config.use_threads {
        server::run_threaded(config, store, metrics)
    } else {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(server::run_cooperative(config, store, metrics))
    };

    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::error!(%err, "server exited with an error");
            std::process::exit(1);
        }
    }
}
