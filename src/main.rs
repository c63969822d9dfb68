//! line-relay - Entry point
//!
//! Loads configuration, binds the listener, and runs the accept loop.

use log::{error, info};

use line_relay::config::RelayConfig;
use line_relay::error::RelayError;
use line_relay::server::Server;

async fn startup() -> Result<Server, RelayError> {
    let config = RelayConfig::load()?;

    info!("port      = {}", config.port);
    info!("delimiter = {:?}", config.delimiter);
    info!("timeout   = {}s", config.write_timeout_secs);

    Server::bind(config).await
}

#[tokio::main]
async fn main() {
    // env_logger picks up the RUST_LOG environment variable
    env_logger::init();

    let server = match startup().await {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    server.run().await;
}
