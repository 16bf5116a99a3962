//! Server facade: resolution, connection, and structured queries.
//!
//! Ties discovery and the connection together: pick (or be given) a
//! server, open the command connection, and turn raw correlated replies
//! into structured results like the player list.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{self, FieldMap};
use crate::connection::{Endpoint, LmsConnection};
use crate::discovery::{self, DiscoveryError};
use crate::protocol_constants::{CLI_PORT, COMMAND_TIMEOUT, HTTP_PORT};
use crate::traits::LmsControl;

/// Connection configuration.
///
/// All fields default to the stock server setup; leaving `host` unset
/// makes [`LmsServer::connect`] resolve one via discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmsConfig {
    /// Server host. `None` resolves via discovery at connect time.
    pub host: Option<String>,
    /// Command-line interface port.
    pub port: u16,
    /// Web interface port (cover art). A discovered server's reported
    /// port takes precedence.
    pub http_port: u16,
    /// When resolving via discovery, prefer the server this machine's own
    /// player is connected to over the first one found.
    pub find_my_server: bool,
}

impl Default for LmsConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: CLI_PORT,
            http_port: HTTP_PORT,
            find_my_server: false,
        }
    }
}

/// Errors from [`LmsServer::connect`].
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Neither configuration nor discovery produced a server to talk to.
    /// Terminal for this attempt; retry after the network changes.
    #[error("no server found to connect to")]
    NoServerFound,

    /// The TCP connection to the resolved endpoint failed.
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        /// Host the attempt targeted.
        host: String,
        /// Port the attempt targeted.
        port: u16,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// Discovery failed outright (socket setup, no usable interfaces).
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Convenient Result alias for facade operations.
pub type ConnectResult<T> = Result<T, ConnectError>;

/// Client facade for one server.
///
/// Owns the connection, resolves a host when none is configured, and
/// turns raw correlated replies into structured results.
pub struct LmsServer {
    config: LmsConfig,
    connection: LmsConnection,
}

impl LmsServer {
    /// Creates a facade from configuration. No I/O happens until
    /// [`connect`](Self::connect).
    #[must_use]
    pub fn new(config: LmsConfig) -> Self {
        Self {
            config,
            connection: LmsConnection::new(),
        }
    }

    /// The underlying connection, for listener registration.
    #[must_use]
    pub fn connection(&self) -> &LmsConnection {
        &self.connection
    }

    /// Resolves a server (configured host, or discovery) and connects.
    pub async fn connect(&self) -> ConnectResult<()> {
        let endpoint = self.resolve_endpoint().await?;
        tracing::debug!(host = %endpoint.host, port = endpoint.port, "using server");
        self.connection
            .connect(endpoint.clone())
            .await
            .map_err(|source| ConnectError::Connect {
                host: endpoint.host,
                port: endpoint.port,
                source,
            })
    }

    async fn resolve_endpoint(&self) -> ConnectResult<Endpoint> {
        if let Some(host) = &self.config.host {
            return Ok(Endpoint {
                host: host.clone(),
                port: self.config.port,
                http_port: self.config.http_port,
            });
        }

        let descriptor = if self.config.find_my_server {
            match Box::pin(discovery::discover_mine()).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::info!("could not look for our own server: {}", e);
                    None
                }
            }
        } else {
            discovery::discover_all().await?.into_iter().next()
        };

        let descriptor = descriptor.ok_or(ConnectError::NoServerFound)?;
        Ok(Endpoint {
            host: descriptor.host,
            port: self.config.port,
            http_port: descriptor.http_port.unwrap_or(self.config.http_port),
        })
    }

    /// Closes the connection. Safe when already disconnected.
    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    /// True while the connection is live.
    pub async fn is_connected(&self) -> bool {
        self.connection.is_connected().await
    }

    /// Sends a raw command line, best effort.
    pub async fn send(&self, command: &str) {
        self.connection.send(command).await;
    }

    /// Sends a command and waits up to `timeout` for its correlated reply.
    pub async fn cmd_response(&self, command: &str, timeout: Duration) -> Option<Vec<String>> {
        self.connection.cmd_response(command, timeout).await
    }

    /// Enumerates players one by one until the server reports exhaustion.
    ///
    /// Every `players {index} 1` reply describing a real entry carries a
    /// `playerindex` field; the first reply without one (or a timeout)
    /// ends the poll. An empty server yields an empty list.
    pub async fn players(&self) -> Vec<FieldMap> {
        let mut found = Vec::new();
        for index in 0.. {
            let command = format!("players {} 1", index);
            let reply = self.cmd_response(&command, COMMAND_TIMEOUT).await;
            let fields = codec::fields_from_tokens(reply.as_deref().unwrap_or_default());
            if !fields.contains_key("playerindex") {
                break;
            }
            found.push(fields);
        }
        found
    }

    /// Finds the first player whose reported address is one of
    /// `local_ips`.
    ///
    /// The `ip` field comes as `address:port`; only the address part is
    /// compared. Players without an `ip` field are skipped.
    pub async fn local_player(&self, local_ips: &[String]) -> Option<FieldMap> {
        tracing::debug!(?local_ips, "looking for a local player");
        for player in self.players().await {
            let Some(ip_field) = player.get("ip") else {
                continue;
            };
            let host = ip_field
                .split_once(':')
                .map_or(ip_field.as_str(), |(host, _)| host);
            if local_ips.iter().any(|ip| ip == host) {
                return Some(player);
            }
        }
        None
    }

    /// Builds the cover art URL for a track. No network call.
    ///
    /// `None` until an endpoint has been resolved by a connect.
    #[must_use]
    pub fn cover_url(&self, artwork_track_id: &str) -> Option<String> {
        self.connection.endpoint().map(|endpoint| {
            format!(
                "http://{}:{}/music/{}/cover.jpg",
                endpoint.host, endpoint.http_port, artwork_track_id
            )
        })
    }
}

#[async_trait]
impl LmsControl for LmsServer {
    async fn send_command(&self, command: &str) {
        self.send(command).await;
    }

    async fn command_response(&self, command: &str, timeout: Duration) -> Option<Vec<String>> {
        self.cmd_response(command, timeout).await
    }

    async fn players(&self) -> Vec<FieldMap> {
        LmsServer::players(self).await
    }

    async fn local_player(&self, local_ips: &[String]) -> Option<FieldMap> {
        LmsServer::local_player(self, local_ips).await
    }

    fn cover_url(&self, artwork_track_id: &str) -> Option<String> {
        LmsServer::cover_url(self, artwork_track_id)
    }

    async fn is_connected(&self) -> bool {
        LmsServer::is_connected(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Accepts one connection and answers each command line from a fixed
    /// table (echoing `fallback` for anything else).
    async fn scripted_server(
        listener: TcpListener,
        replies: Vec<(&'static str, &'static str)>,
        fallback: &'static str,
    ) {
        let (sock, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = sock.into_split();
        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let reply = replies
                .iter()
                .find(|(command, _)| *command == line)
                .map_or(fallback, |(_, reply)| *reply);
            write_half
                .write_all(format!("{}\n", reply).as_bytes())
                .await
                .unwrap();
        }
    }

    async fn connected_server(
        replies: Vec<(&'static str, &'static str)>,
        fallback: &'static str,
    ) -> (LmsServer, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(scripted_server(listener, replies, fallback));

        let server = LmsServer::new(LmsConfig {
            host: Some("127.0.0.1".to_string()),
            port: addr.port(),
            ..LmsConfig::default()
        });
        server.connect().await.unwrap();
        (server, handle)
    }

    #[tokio::test]
    async fn players_polls_until_exhaustion() {
        let (server, handle) = connected_server(
            vec![
                (
                    "players 0 1",
                    "players 0 1 count%3A2 playerindex%3A0 name%3AKitchen ip%3A192.168.1.50%3A33231",
                ),
                (
                    "players 1 1",
                    "players 1 1 count%3A2 playerindex%3A1 name%3AOffice ip%3A10.0.0.7%3A18690",
                ),
                ("players 2 1", "players 2 1 count%3A2"),
            ],
            "players 9 9",
        )
        .await;

        let players = server.players().await;
        assert_eq!(players.len(), 2);
        assert_eq!(players[0]["name"], "Kitchen");
        assert_eq!(players[0]["playerindex"], "0");
        assert_eq!(players[1]["name"], "Office");
        assert_eq!(players[1]["ip"], "10.0.0.7:18690");

        server.disconnect().await;
        handle.abort();
    }

    #[tokio::test]
    async fn empty_player_list_is_not_an_error() {
        let (server, handle) =
            connected_server(vec![("players 0 1", "players 0 1 count%3A0")], "players").await;

        assert!(server.players().await.is_empty());

        server.disconnect().await;
        handle.abort();
    }

    #[tokio::test]
    async fn local_player_matches_on_address_part() {
        let (server, handle) = connected_server(
            vec![
                (
                    "players 0 1",
                    "players 0 1 playerindex%3A0 name%3ANoAddress model%3Asqueezelite",
                ),
                (
                    "players 1 1",
                    "players 1 1 playerindex%3A1 name%3AOffice ip%3A10.0.0.7%3A18690",
                ),
                ("players 2 1", "players 2 1 count%3A2"),
            ],
            "players 9 9",
        )
        .await;

        let local_ips = vec!["10.0.0.7".to_string()];
        let player = server.local_player(&local_ips).await.unwrap();
        assert_eq!(player["name"], "Office");

        let nobody = server.local_player(&["172.16.0.9".to_string()]).await;
        assert_eq!(nobody, None);

        server.disconnect().await;
        handle.abort();
    }

    #[tokio::test]
    async fn cover_url_uses_resolved_endpoint() {
        let (server, handle) = connected_server(Vec::new(), "players").await;

        assert_eq!(
            server.cover_url("17"),
            Some("http://127.0.0.1:9000/music/17/cover.jpg".to_string())
        );

        // The URL survives disconnecting.
        server.disconnect().await;
        assert_eq!(
            server.cover_url("deadbeef"),
            Some("http://127.0.0.1:9000/music/deadbeef/cover.jpg".to_string())
        );
        handle.abort();
    }

    #[tokio::test]
    async fn cover_url_requires_a_resolved_endpoint() {
        let server = LmsServer::new(LmsConfig::default());
        assert_eq!(server.cover_url("17"), None);
    }

    #[tokio::test]
    async fn connect_failure_reports_the_endpoint() {
        // Grab a port nobody is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let server = LmsServer::new(LmsConfig {
            host: Some("127.0.0.1".to_string()),
            port: addr.port(),
            ..LmsConfig::default()
        });
        match server.connect().await {
            Err(ConnectError::Connect { host, port, .. }) => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, addr.port());
            }
            other => panic!("expected Connect error, got {:?}", other.err()),
        }
        assert!(!server.is_connected().await);
    }
}
