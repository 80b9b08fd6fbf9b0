//! UdpTransport - best-effort datagram link to one peer
//!
//! Sends are fire-and-forget. A background task receives datagrams, decodes
//! them and keeps the newest message per kind in a [`LatestTable`].

use bytes::Bytes;
use contracts::{Message, MessageKind, NodeConfig};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::codec::{self, MAX_DATAGRAM_SIZE};
use crate::error::TransportError;
use crate::table::LatestTable;

/// Pause after a failed socket read
const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Name used in logs
    pub name: String,
    /// Local receive address
    pub bind_addr: SocketAddr,
    /// Where outgoing datagrams go
    pub destination: SocketAddr,
    /// Receive buffer size and send size cap
    pub max_datagram_size: usize,
}

impl TransportConfig {
    /// Create config; the destination defaults to the bind address
    pub fn new(bind_addr: SocketAddr, destination: Option<SocketAddr>) -> Self {
        Self {
            name: "transport".to_string(),
            bind_addr,
            destination: destination.unwrap_or(bind_addr),
            max_datagram_size: MAX_DATAGRAM_SIZE,
        }
    }

    /// Derive from a node entry of the blueprint
    pub fn from_node(node: &NodeConfig) -> Self {
        Self::new(node.bind_socket_addr(), Some(node.peer_socket_addr()))
            .with_name(&node.name)
            .with_max_datagram_size(node.max_datagram_size)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size;
        self
    }
}

/// Running receive task
struct ReceiveWorker {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// UDP transport with a latest-value receive buffer
pub struct UdpTransport {
    config: TransportConfig,
    destination: Mutex<SocketAddr>,
    table: Arc<LatestTable>,
    socket: Mutex<Option<Arc<UdpSocket>>>,
    running: AtomicBool,
    worker: tokio::sync::Mutex<Option<ReceiveWorker>>,
}

impl UdpTransport {
    /// Create a stopped transport
    pub fn new(config: TransportConfig) -> Self {
        Self {
            destination: Mutex::new(config.destination),
            config,
            table: Arc::new(LatestTable::new()),
            socket: Mutex::new(None),
            running: AtomicBool::new(false),
            worker: tokio::sync::Mutex::new(None),
        }
    }

    /// Get transport name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    fn socket_slot(&self) -> MutexGuard<'_, Option<Arc<UdpSocket>>> {
        self.socket.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn destination_slot(&self) -> MutexGuard<'_, SocketAddr> {
        self.destination.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Bind the socket and spawn the receive task
    ///
    /// Idempotent: returns the bound address if already running.
    #[instrument(name = "transport_start", skip(self), fields(node = %self.config.name))]
    pub async fn start(&self) -> Result<SocketAddr, TransportError> {
        let mut worker = self.worker.lock().await;
        if let Some(running) = worker.as_ref() {
            return Ok(running.local_addr);
        }

        let bind_addr = self.config.bind_addr;
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| TransportError::bind(bind_addr, e))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| TransportError::bind(bind_addr, e))?;
        let socket = Arc::new(socket);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(receive_loop(
            Arc::clone(&socket),
            Arc::clone(&self.table),
            shutdown_rx,
            self.config.name.clone(),
            self.config.max_datagram_size,
        ));

        *self.socket_slot() = Some(socket);
        self.running.store(true, Ordering::SeqCst);
        *worker = Some(ReceiveWorker {
            shutdown_tx,
            handle,
            local_addr,
        });

        info!(
            node = %self.config.name,
            local = %local_addr,
            destination = %self.destination(),
            "Transport started"
        );
        Ok(local_addr)
    }

    /// Stop the receive task and release the socket
    ///
    /// Returns after the task has exited. No-op when stopped.
    #[instrument(name = "transport_stop", skip(self), fields(node = %self.config.name))]
    pub async fn stop(&self) {
        let mut worker = self.worker.lock().await;
        let Some(ReceiveWorker {
            shutdown_tx,
            handle,
            ..
        }) = worker.take()
        else {
            return;
        };

        self.running.store(false, Ordering::SeqCst);
        self.socket_slot().take();

        // Receiver gone means the task already exited
        let _ = shutdown_tx.send(());
        if let Err(e) = handle.await {
            error!(node = %self.config.name, error = ?e, "Receive task panicked");
        }

        info!(node = %self.config.name, "Transport stopped");
    }

    /// Whether the receive task is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Bound local address (None while stopped)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket_slot()
            .as_ref()
            .and_then(|socket| socket.local_addr().ok())
    }

    pub fn destination(&self) -> SocketAddr {
        *self.destination_slot()
    }

    /// Redirect outgoing datagrams
    pub fn set_destination(&self, destination: SocketAddr) {
        let previous = std::mem::replace(&mut *self.destination_slot(), destination);
        if previous != destination {
            info!(
                node = %self.config.name,
                from = %previous,
                to = %destination,
                "Destination changed"
            );
        }
    }

    /// Encode and send a message without blocking
    ///
    /// Failures are logged and counted, never raised. Returns whether the
    /// datagram was handed to the socket.
    pub fn send(&self, message: &Message) -> bool {
        let message_kind = message.kind();
        let kind = kind_label(message_kind.as_ref());

        let Some(socket) = self.socket_slot().clone() else {
            debug!(node = %self.config.name, kind, "Transport not running, message dropped");
            return false;
        };

        let payload = match self.prepare_payload(message, kind) {
            Some(payload) => payload,
            None => {
                observability::record_datagram_sent(kind, false);
                return false;
            }
        };

        let destination = self.destination();
        match socket.try_send_to(&payload, destination) {
            Ok(sent) => {
                trace!(node = %self.config.name, kind, to = %destination, bytes = sent, "Sent");
                observability::record_datagram_sent(kind, true);
                true
            }
            Err(e) => {
                // Best-effort link: drop and carry on
                warn!(
                    node = %self.config.name,
                    kind,
                    to = %destination,
                    error = %e,
                    "UDP send failed"
                );
                observability::record_datagram_sent(kind, false);
                false
            }
        }
    }

    fn prepare_payload(&self, message: &Message, kind: &str) -> Option<Bytes> {
        let payload = match codec::encode(message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(node = %self.config.name, kind, error = %e, "Encode failed, message dropped");
                return None;
            }
        };

        if payload.len() > self.config.max_datagram_size {
            warn!(
                node = %self.config.name,
                kind,
                size = payload.len(),
                max = self.config.max_datagram_size,
                "Message too large, dropped"
            );
            return None;
        }

        Some(payload)
    }

    /// Clear buffered messages and the last receipt time
    ///
    /// The receive task keeps running.
    pub fn reset(&self) {
        self.table.clear();
        debug!(node = %self.config.name, "Receive buffer cleared");
    }

    /// Take the latest buffered message of a kind
    pub fn take(&self, kind: &MessageKind) -> Option<Message> {
        self.table.take(kind)
    }

    /// Time of the last received datagram (`None` = never)
    pub fn last_receipt_time(&self) -> Option<Instant> {
        self.table.last_receipt()
    }

    /// Number of kinds with a buffered message
    pub fn buffered_kinds(&self) -> usize {
        self.table.len()
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.handle.abort();
        }
    }
}

fn kind_label(kind: Option<&MessageKind>) -> &str {
    match kind {
        Some(kind) if kind.is_recognized() => kind.as_str(),
        Some(_) => "other",
        None => "unknown",
    }
}

/// Receive task body
#[instrument(
    name = "transport_receive_loop",
    skip(socket, table, shutdown_rx, name, max_datagram_size),
    fields(node = %name)
)]
async fn receive_loop(
    socket: Arc<UdpSocket>,
    table: Arc<LatestTable>,
    mut shutdown_rx: oneshot::Receiver<()>,
    name: String,
    max_datagram_size: usize,
) {
    debug!(node = %name, "Receive loop started");
    let mut buf = vec![0u8; max_datagram_size];

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_rx => break,

            result = socket.recv_from(&mut buf) => match result {
                Ok((len, from)) => handle_datagram(&table, &buf[..len], from, &name),
                Err(e) => {
                    warn!(node = %name, error = %e, "UDP receive failed, retrying");
                    tokio::select! {
                        biased;
                        _ = &mut shutdown_rx => break,
                        _ = tokio::time::sleep(RECEIVE_RETRY_DELAY) => {}
                    }
                }
            },
        }
    }

    debug!(node = %name, "Receive loop stopped");
}

fn handle_datagram(table: &LatestTable, payload: &[u8], from: SocketAddr, name: &str) {
    let message = match codec::decode(payload) {
        Ok(message) => message,
        Err(e) => {
            warn!(node = %name, from = %from, bytes = payload.len(), error = %e, "Datagram dropped");
            observability::record_decode_failure(e.reason());
            return;
        }
    };

    let Some(kind) = message.kind() else {
        debug!(node = %name, from = %from, "Message without data/event type dropped");
        return;
    };

    trace!(node = %name, kind = %kind, from = %from, bytes = payload.len(), "Received");
    observability::record_datagram_received(kind_label(Some(&kind)));
    table.store(kind, message, Instant::now());
}
