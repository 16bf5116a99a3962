//! Persistent connection to a server's command-line interface.
//!
//! One TCP socket, one background read loop. The read loop tokenizes and
//! decodes every line the server pushes and fans it out to the registered
//! listeners; foreground callers write commands through
//! [`LmsConnection::send`] and correlate replies with
//! [`LmsConnection::cmd_response`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::correlator;
use crate::traits::{LineListener, StatusListener};

/// Resolved network location of a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host the command socket connects to.
    pub host: String,
    /// Command-line interface port.
    pub port: u16,
    /// Web interface port, used for cover art URLs.
    pub http_port: u16,
}

/// A connection to one server, with its background read loop.
///
/// Cheap to clone: clones share the socket, the listeners, and the read
/// loop. Created unconnected; [`connect`](Self::connect) opens the socket
/// and spawns the read loop. The stored write half doubles as the liveness
/// flag: [`is_connected`](Self::is_connected) is true exactly while it is
/// held, and both disconnect paths (local close, read-loop death) clear it.
#[derive(Clone)]
pub struct LmsConnection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    /// Endpoint of the last successful connect. Retained after disconnect
    /// so URL construction keeps working.
    endpoint: RwLock<Option<Endpoint>>,
    /// Write half of the live socket; the single source of truth for
    /// connection liveness.
    writer: Mutex<Option<OwnedWriteHalf>>,
    status_listeners: RwLock<Vec<Arc<dyn StatusListener>>>,
    line_listeners: RwLock<Vec<Arc<dyn LineListener>>>,
    /// Token of the currently running read loop.
    cancel: RwLock<CancellationToken>,
}

impl LmsConnection {
    /// Creates an unconnected connection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                endpoint: RwLock::new(None),
                writer: Mutex::new(None),
                status_listeners: RwLock::new(Vec::new()),
                line_listeners: RwLock::new(Vec::new()),
                cancel: RwLock::new(CancellationToken::new()),
            }),
        }
    }

    /// The endpoint of the last successful [`connect`](Self::connect).
    #[must_use]
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.inner.endpoint.read().clone()
    }

    /// Opens the TCP socket and starts the read loop.
    ///
    /// An already-open connection is shut down first.
    pub async fn connect(&self, endpoint: Endpoint) -> std::io::Result<()> {
        // Tear down any previous session before installing the new socket;
        // an old read loop observes its cancelled token and leaves the
        // fresh connection alone.
        self.inner.cancel.read().cancel();
        if self.inner.writer.lock().await.take().is_some() {
            log::debug!("reconnecting, dropping previous socket");
        }

        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;
        log::debug!("connected to {}:{}", endpoint.host, endpoint.port);

        let (read_half, write_half) = stream.into_split();
        let token = CancellationToken::new();
        *self.inner.cancel.write() = token.clone();
        *self.inner.endpoint.write() = Some(endpoint);
        *self.inner.writer.lock().await = Some(write_half);

        tokio::spawn(read_loop(self.clone(), read_half, token));
        Ok(())
    }

    /// Closes the connection. Safe to call when already disconnected.
    pub async fn disconnect(&self) {
        // Clear the reference before closing, so a racing reader observes
        // either the old live socket or no socket, never a half-closed one
        // it still considers live.
        let writer = self.inner.writer.lock().await.take();
        self.inner.cancel.read().cancel();
        if writer.is_some() {
            log::debug!("disconnecting from server");
        }
        drop(writer);
    }

    /// True while the socket is open.
    pub async fn is_connected(&self) -> bool {
        self.inner.writer.lock().await.is_some()
    }

    /// Writes one command line, best effort.
    ///
    /// A missing connection or a failed write is logged and swallowed:
    /// commands are fire-and-forget on this protocol, and delivery
    /// problems surface through [`is_connected`](Self::is_connected).
    pub async fn send(&self, command: &str) {
        let mut guard = self.inner.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            log::warn!("socket not connected, ignoring command");
            return;
        };

        let mut line = command.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        match writer.write_all(line.as_bytes()).await {
            Ok(()) => log::debug!("sent {:?}", command),
            Err(e) => log::warn!("failed to send command: {}", e),
        }
    }

    /// Sends a command and waits up to `timeout` for the correlated reply.
    ///
    /// `None` when no reply arrived in time. An expected reply can
    /// legitimately never come (the player may be gone), so a timeout is
    /// an absent result, not an error.
    pub async fn cmd_response(&self, command: &str, timeout: Duration) -> Option<Vec<String>> {
        correlator::await_response(self, command, timeout).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Listener registry
    // ─────────────────────────────────────────────────────────────────────

    /// Registers a status listener. Dispatch order is registration order.
    pub fn add_status_listener(&self, listener: Arc<dyn StatusListener>) {
        self.inner.status_listeners.write().push(listener);
    }

    /// Removes a previously registered status listener, by identity.
    pub fn remove_status_listener(&self, listener: &Arc<dyn StatusListener>) {
        self.inner
            .status_listeners
            .write()
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Registers a line listener. Dispatch order is registration order.
    pub fn add_line_listener(&self, listener: Arc<dyn LineListener>) {
        self.inner.line_listeners.write().push(listener);
    }

    /// Removes a previously registered line listener, by identity.
    pub fn remove_line_listener(&self, listener: &Arc<dyn LineListener>) {
        self.inner
            .line_listeners
            .write()
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Tokenizes, decodes, classifies, and fans out one received line.
    ///
    /// Dispatch iterates a snapshot of each listener collection, so
    /// listeners may be added or removed concurrently (or from inside a
    /// notification) without corrupting the pass. A panicking listener is
    /// logged and does not stop dispatch to the remaining ones.
    fn dispatch_line(&self, line: &str) {
        let raw: Vec<&str> = line.split(' ').collect();

        let mut tokens = Vec::with_capacity(raw.len());
        for part in &raw {
            match codec::decode(part) {
                Ok(decoded) => tokens.push(decoded),
                Err(e) => {
                    log::warn!("dropping undecodable line {:?}: {}", line, e);
                    return;
                }
            }
        }

        // A line whose second raw token is `status` is a push update; the
        // key:value tokens from there on form the status fields. The first
        // token stays out: it is the player id, and decoded MACs are full
        // of colons.
        let is_status = raw.get(1) == Some(&"status");
        if is_status {
            let status = codec::fields_from_tokens(&tokens[1..]);
            let player_id = &tokens[0];
            let snapshot = self.inner.status_listeners.read().clone();
            for listener in snapshot {
                if catch_unwind(AssertUnwindSafe(|| listener.notify_status(player_id, &status)))
                    .is_err()
                {
                    log::error!("status listener panicked, continuing dispatch");
                }
            }
        }

        let snapshot = self.inner.line_listeners.read().clone();
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener.notify_line(&tokens))).is_err() {
                log::error!("line listener panicked, continuing dispatch");
            }
        }
    }
}

impl Default for LmsConnection {
    fn default() -> Self {
        Self::new()
    }
}

/// Background read loop.
///
/// Drains lines from the socket until cancellation, end of stream, or an
/// I/O error, dispatching each one, then clears the connection's liveness
/// flag.
async fn read_loop(conn: LmsConnection, read_half: OwnedReadHalf, cancel: CancellationToken) {
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            next = lines.next_line() => match next {
                Ok(Some(line)) => line,
                Ok(None) => {
                    log::debug!("server closed the connection");
                    break;
                }
                Err(e) => {
                    // Reads racing a local disconnect fail expectedly;
                    // only an error on a live socket is worth a warning.
                    if conn.is_connected().await {
                        log::warn!("read failed, connection probably lost: {}", e);
                    }
                    break;
                }
            },
        };
        log::trace!("got {:?} from server", line);
        conn.dispatch_line(&line);
    }

    // When the loop ends on its own (EOF, read error) the liveness flag is
    // still set; a local disconnect or reconnect already cleared it and
    // may have installed a fresh socket this loop must not touch.
    let mut writer = conn.inner.writer.lock().await;
    if !cancel.is_cancelled() {
        *writer = None;
    }
}
