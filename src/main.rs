use std::process::ExitCode;

use threadsquid::config::{Config, DEFAULT_SOCKET_TIMEOUT};
use threadsquid::server::ProxyServer;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match Config::from_args(std::env::args()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    let server = ProxyServer::new(DEFAULT_SOCKET_TIMEOUT);
    if let Err(err) = server.run(config.port) {
        eprintln!("{err}");
        tracing::error!(error = %err, "fatal startup error");
        return ExitCode::from(err.exit_code() as u8);
    }

    ExitCode::SUCCESS
}
