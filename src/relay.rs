//! Broadcast relay
//!
//! Each connection runs `run_connection` in its own task: register, read
//! delimited messages, fan each one out to every registered connection, and
//! deregister on the first read failure. Broadcast is invoked concurrently
//! from as many read loops as there are clients; the registry lock covers
//! only structural operations, and every network write happens outside it
//! against a snapshot of recipients.

use log::{debug, info, warn};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::config::RelayConfig;
use crate::registry::{ConnectionHandle, ConnectionId, ConnectionRegistry};

/// The registry as shared by the accept loop and every read loop
pub type SharedRegistry<W> = Arc<Mutex<ConnectionRegistry<W>>>;

/// Write `message` and report how many bytes went out. Unlike `write_all`,
/// a writer that stops accepting bytes yields a short count rather than an
/// error, so the caller can compare the count against the message length.
async fn write_counted<W>(writer: &mut W, message: &[u8]) -> io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while written < message.len() {
        let n = writer.write(&message[written..]).await?;
        if n == 0 {
            break;
        }
        written += n;
    }
    writer.flush().await?;
    Ok(written)
}

/// Relay one message to every registered connection, the sender included.
///
/// Best-effort, at-most-once per recipient: a write error, a deadline miss,
/// or a short write marks that recipient for removal but never interrupts
/// delivery to the rest. Removals are applied after the delivery loop.
pub async fn broadcast<W>(registry: &SharedRegistry<W>, message: &[u8], write_timeout: Duration)
where
    W: AsyncWrite + Unpin,
{
    let recipients = registry.lock().await.snapshot();
    debug!(
        "Broadcasting {} bytes to {} connections",
        message.len(),
        recipients.len()
    );

    let mut failed: Vec<ConnectionId> = Vec::new();
    for recipient in &recipients {
        let mut writer = recipient.writer.lock().await;

        // Deadline is armed per write attempt, not per message
        match timeout(write_timeout, write_counted(&mut *writer, message)).await {
            Ok(Ok(n)) if n == message.len() => {}
            Ok(Ok(n)) => {
                warn!(
                    "Short write to {} ({}): {} of {} bytes",
                    recipient.id,
                    recipient.addr,
                    n,
                    message.len()
                );
                failed.push(recipient.id);
            }
            Ok(Err(e)) => {
                warn!("Write to {} ({}) failed: {}", recipient.id, recipient.addr, e);
                failed.push(recipient.id);
            }
            Err(_) => {
                warn!(
                    "Write to {} ({}) timed out after {:?}",
                    recipient.id, recipient.addr, write_timeout
                );
                failed.push(recipient.id);
            }
        }
    }

    if !failed.is_empty() {
        let mut registry = registry.lock().await;
        for id in failed {
            registry.remove(id);
        }
    }
}

/// Drive one connection from registration to deregistration.
///
/// Reads one delimited message at a time and broadcasts it. EOF, a read
/// error, and a stream that ends without a trailing delimiter all end the
/// loop the same way: the connection is deregistered and never revisited.
pub async fn run_connection<R, W>(
    mut reader: R,
    handle: ConnectionHandle<W>,
    registry: SharedRegistry<W>,
    config: Arc<RelayConfig>,
) where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let id = handle.id;
    let addr = handle.addr.clone();

    registry.lock().await.add(handle);

    let delimiter = config.delimiter_byte();
    let write_timeout = config.write_timeout();
    let mut message = Vec::new();

    loop {
        message.clear();
        match reader.read_until(delimiter, &mut message).await {
            Ok(0) => {
                info!("Connection closed by {} ({})", id, addr);
                break;
            }
            Ok(_) => {
                if message.last() != Some(&delimiter) {
                    // Stream ended mid-message; an unterminated tail is
                    // never relayed
                    info!("Connection {} ({}) ended without delimiter", id, addr);
                    break;
                }
                broadcast(&registry, &message, write_timeout).await;
            }
            Err(e) => {
                warn!("Read from {} ({}) failed: {}", id, addr, e);
                break;
            }
        }
    }

    // A failed broadcast write may have evicted this connection already;
    // the registry treats that as a benign no-op
    registry.lock().await.remove(id);
    info!("Client {} ({}) disconnected", id, addr);
}
