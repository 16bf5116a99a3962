//! Trait abstractions for the engine's collaborator surface.
//!
//! Listeners are the push side: the connection's read loop fans every
//! decoded line out to them. [`LmsControl`] is the pull side: the command
//! surface a presentation layer drives. Implementers register listeners as
//! typed `Arc<dyn ...>` handles rather than arbitrary callables.

use std::time::Duration;

use async_trait::async_trait;

use crate::codec::FieldMap;

/// Observer for server-initiated status lines.
pub trait StatusListener: Send + Sync {
    /// Called from the read-loop task for every status line.
    ///
    /// `player_id` is the line's first token (the player the update is
    /// about). Must return quickly: a slow listener stalls the connection.
    fn notify_status(&self, player_id: &str, status: &FieldMap);
}

/// Observer for every decoded line, status or not.
pub trait LineListener: Send + Sync {
    /// Called from the read-loop task with the line's decoded tokens.
    ///
    /// Same threading caveat as [`StatusListener::notify_status`].
    fn notify_line(&self, tokens: &[String]);
}

/// Command surface of a connected server.
///
/// Implemented by [`LmsServer`](crate::server::LmsServer); presentation
/// layers depend on this trait rather than the concrete type.
#[async_trait]
pub trait LmsControl: Send + Sync {
    /// Sends a raw command line, best effort.
    async fn send_command(&self, command: &str);

    /// Sends a command and waits up to `timeout` for the correlated reply.
    async fn command_response(&self, command: &str, timeout: Duration) -> Option<Vec<String>>;

    /// Enumerates the players known to the server.
    async fn players(&self) -> Vec<FieldMap>;

    /// Finds the first player whose address is one of `local_ips`.
    async fn local_player(&self, local_ips: &[String]) -> Option<FieldMap>;

    /// Builds the cover art URL for a track, without touching the network.
    fn cover_url(&self, artwork_track_id: &str) -> Option<String>;

    /// Whether the underlying connection is currently live.
    async fn is_connected(&self) -> bool;
}

/// Status listener that logs every notification.
///
/// Useful as a default observer during bring-up and as a template for real
/// implementations.
pub struct LoggingStatusListener;

impl StatusListener for LoggingStatusListener {
    fn notify_status(&self, player_id: &str, status: &FieldMap) {
        tracing::debug!(player_id, ?status, "status_update");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Test listener that counts notifications.
    struct CountingListener {
        status_count: AtomicUsize,
        line_count: AtomicUsize,
    }

    impl CountingListener {
        fn new() -> Self {
            Self {
                status_count: AtomicUsize::new(0),
                line_count: AtomicUsize::new(0),
            }
        }
    }

    impl StatusListener for CountingListener {
        fn notify_status(&self, _player_id: &str, _status: &FieldMap) {
            self.status_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl LineListener for CountingListener {
        fn notify_line(&self, _tokens: &[String]) {
            self.line_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn counting_listener_tracks_notifications() {
        let listener = Arc::new(CountingListener::new());

        listener.notify_status("aa:bb", &FieldMap::new());
        listener.notify_status("aa:bb", &FieldMap::new());
        listener.notify_line(&["players".to_string()]);

        assert_eq!(listener.status_count.load(Ordering::SeqCst), 2);
        assert_eq!(listener.line_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn logging_listener_does_not_panic() {
        let mut status = FieldMap::new();
        status.insert("volume".to_string(), "80".to_string());
        LoggingStatusListener.notify_status("00:11:22:33:44:55", &status);
    }
}
