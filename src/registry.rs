//! Connection registry
//!
//! Single source of truth for which connections are currently eligible to
//! receive broadcasts. The registry itself is not thread-safe; callers wrap
//! it in `Arc<Mutex<..>>` and hold the lock only for the structural
//! operations here, never across network writes.

use log::debug;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Stable identity of one connection, allocated at accept time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Shared handle to one registered connection.
///
/// The registry and every in-flight broadcast hold clones of this handle;
/// the write half lives behind its own mutex so concurrent broadcasts
/// serialize per recipient without holding the registry lock.
pub struct ConnectionHandle<W> {
    pub id: ConnectionId,
    /// Peer address, for diagnostics only
    pub addr: String,
    pub writer: Arc<Mutex<W>>,
}

impl<W> ConnectionHandle<W> {
    pub fn new(id: ConnectionId, addr: String, writer: W) -> Self {
        Self {
            id,
            addr,
            writer: Arc::new(Mutex::new(writer)),
        }
    }
}

impl<W> Clone for ConnectionHandle<W> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            addr: self.addr.clone(),
            writer: Arc::clone(&self.writer),
        }
    }
}

/// Registry of live connections.
///
/// Removal is swap-with-last, so iteration order is not insertion order and
/// broadcast order is unspecified.
pub struct ConnectionRegistry<W> {
    connections: Vec<ConnectionHandle<W>>,
}

impl<W> ConnectionRegistry<W> {
    pub fn new() -> Self {
        Self {
            connections: Vec::new(),
        }
    }

    /// Register a connection. The caller guarantees each connection is
    /// added exactly once; no duplicate check is performed.
    pub fn add(&mut self, handle: ConnectionHandle<W>) {
        debug!("ADD {} ({})", handle.id, handle.addr);
        self.connections.push(handle);
    }

    /// Deregister by identity. Returns false when the id is not present,
    /// which is a legitimate race: the owning read loop and a failed
    /// broadcast write may both try to remove the same connection.
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        match self.connections.iter().position(|c| c.id == id) {
            Some(pos) => {
                let handle = self.connections.swap_remove(pos);
                debug!("REM {} ({})", handle.id, handle.addr);
                true
            }
            None => {
                debug!("REM {}: already removed", id);
                false
            }
        }
    }

    /// The recipients at this moment, for one broadcast. Cloned out so the
    /// registry lock can be released before any network write starts.
    pub fn snapshot(&self) -> Vec<ConnectionHandle<W>> {
        self.connections.to_vec()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl<W> Default for ConnectionRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}
