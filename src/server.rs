//! Listener and accept loop
//!
//! Binds the TCP listener and spawns one relay task per accepted
//! connection. Accept failures are logged and the loop continues; only the
//! initial bind is fatal.

use log::{debug, error, info};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::registry::{ConnectionHandle, ConnectionId, ConnectionRegistry};
use crate::relay::{SharedRegistry, run_connection};

pub struct Server {
    listener: TcpListener,
    registry: SharedRegistry<OwnedWriteHalf>,
    config: Arc<RelayConfig>,
    next_id: AtomicU64,
}

impl Server {
    /// Bind the listen socket. A bind failure is fatal to the process; the
    /// caller logs it and exits.
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RelayError::Bind(addr.clone(), e))?;

        info!("Relay bound to {}", addr);

        Ok(Self {
            listener,
            registry: Arc::new(Mutex::new(ConnectionRegistry::new())),
            config: Arc::new(config),
            next_id: AtomicU64::new(0),
        })
    }

    /// The bound address; tests bind port 0 and read the real port here
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Number of currently registered connections
    pub async fn connection_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Accept connections forever, spawning a read loop per client
    pub async fn run(&self) {
        info!(
            "Starting relay (delimiter {:?}, write timeout {}s)",
            self.config.delimiter, self.config.write_timeout_secs
        );

        loop {
            debug!("Waiting for connection");
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
                    info!("{} connected as {}", addr, id);

                    let (read_half, write_half) = stream.into_split();
                    let handle = ConnectionHandle::new(id, addr.to_string(), write_half);
                    let registry = Arc::clone(&self.registry);
                    let config = Arc::clone(&self.config);

                    // One task per connection so the accept loop never blocks
                    tokio::spawn(async move {
                        run_connection(BufReader::new(read_half), handle, registry, config).await;
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}
