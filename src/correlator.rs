//! Synchronous command/response correlation over the push stream.
//!
//! The wire protocol has no sequence numbers: a reply is recognized by
//! echoing the command it answers. A transient line listener watches the
//! stream for a line whose leading tokens equal the command's own tokens
//! and hands it to the waiting caller through a single-use channel.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::connection::LmsConnection;
use crate::traits::LineListener;

/// One in-flight command waiting for its echo.
///
/// Registered before the command is sent, so a fast reply can never race
/// the registration. Fires at most once.
struct ResponseWaiter {
    /// The command's own tokens; a reply must start with exactly these, in
    /// the same positions.
    prefix: Vec<String>,
    tx: Mutex<Option<oneshot::Sender<Vec<String>>>>,
}

impl ResponseWaiter {
    fn matches(&self, tokens: &[String]) -> bool {
        tokens.len() >= self.prefix.len()
            && self.prefix.iter().zip(tokens).all(|(want, got)| want == got)
    }
}

impl LineListener for ResponseWaiter {
    fn notify_line(&self, tokens: &[String]) {
        if !self.matches(tokens) {
            return;
        }
        // Two commands with identical prefixes pending at once both match
        // here; that over-match is inherent to the wire format.
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(tokens.to_vec());
        }
    }
}

/// Sends `command` and waits up to `timeout` for a line answering it.
///
/// The transient listener is deregistered on both outcomes.
pub(crate) async fn await_response(
    conn: &LmsConnection,
    command: &str,
    timeout: Duration,
) -> Option<Vec<String>> {
    let (tx, rx) = oneshot::channel();
    let waiter: Arc<dyn LineListener> = Arc::new(ResponseWaiter {
        prefix: command.split(' ').map(str::to_string).collect(),
        tx: Mutex::new(Some(tx)),
    });

    conn.add_line_listener(Arc::clone(&waiter));
    conn.send(command).await;

    let result = match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(tokens)) => Some(tokens),
        // The sender cannot drop while the waiter is registered; treated
        // like a timeout regardless.
        Ok(Err(_)) => None,
        Err(_) => {
            tracing::info!(command, "timed out waiting for response");
            None
        }
    };

    conn.remove_line_listener(&waiter);
    result
}
