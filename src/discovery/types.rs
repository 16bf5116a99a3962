//! Shared types for server discovery.

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Failed to set up the UDP socket for an interface.
    #[error("failed to bind UDP socket: {0}")]
    SocketBind(#[source] std::io::Error),

    /// Failed to send the discovery probe.
    #[allow(dead_code)]
    #[error("failed to send discovery probe: {0}")]
    ProbeSend(#[source] std::io::Error),

    /// No usable network interfaces found.
    #[error("no usable network interfaces found")]
    NoInterfaces,

    /// Reply datagram does not start with the `E` marker.
    #[error("discovery reply starts with {0:#04x}, not 'E'")]
    BadMarker(u8),

    /// A TLV record runs past the end of the datagram.
    #[error("truncated TLV record: need {needed} bytes, {remaining} remain")]
    TruncatedRecord {
        /// Bytes the record header plus declared value require.
        needed: usize,
        /// Bytes actually left in the datagram.
        remaining: usize,
    },

    /// A TLV tag outside the fixed tag table.
    ///
    /// Surfacing these instead of skipping them makes protocol drift
    /// visible in the logs the moment a server starts sending it.
    #[error("unknown discovery tag {0:?}")]
    UnknownTag(String),

    /// A TLV value that is not valid UTF-8.
    #[error("discovery value for tag {0:?} is not valid UTF-8")]
    NonUtf8Value(String),

    /// A `JSON` (web port) value that does not parse as a port number.
    #[error("bad http port in discovery reply: {0:?}")]
    BadHttpPort(String),
}

/// Convenient Result alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// A media server that answered a discovery probe.
///
/// Ephemeral: produced by one discovery call and handed straight to the
/// facade; nothing is cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerDescriptor {
    /// Server name as configured by its admin.
    pub name: Option<String>,
    /// Host to reach the server at. Falls back to the address the reply
    /// came from when the server does not report one.
    pub host: String,
    /// Port of the server's web interface (cover art, JSON API).
    pub http_port: Option<u16>,
    /// Server version string.
    pub version: Option<String>,
    /// Server UUID.
    pub uuid: Option<String>,
}
