//! Centralized error exports.
//!
//! Each module defines its own error type with `thiserror`; this module
//! re-exports them and provides [`ErrorCode`], mapping every variant to a
//! stable machine-readable code for collaborators that surface errors
//! across an API boundary.

pub use crate::codec::{CodecError, CodecResult};
pub use crate::discovery::{DiscoveryError, DiscoveryResult};
pub use crate::server::{ConnectError, ConnectResult};

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

impl ErrorCode for CodecError {
    fn code(&self) -> &'static str {
        match self {
            Self::MalformedEscape { .. } => "malformed_escape",
        }
    }
}

impl ErrorCode for DiscoveryError {
    fn code(&self) -> &'static str {
        match self {
            Self::SocketBind(_) => "socket_bind_failed",
            Self::ProbeSend(_) => "probe_send_failed",
            Self::NoInterfaces => "no_network_interfaces",
            Self::BadMarker(_) => "bad_reply_marker",
            Self::TruncatedRecord { .. } => "truncated_tlv_record",
            Self::UnknownTag(_) => "unknown_discovery_tag",
            Self::NonUtf8Value(_) => "non_utf8_discovery_value",
            Self::BadHttpPort(_) => "bad_http_port",
        }
    }
}

impl ErrorCode for ConnectError {
    fn code(&self) -> &'static str {
        match self {
            Self::NoServerFound => "no_server_found",
            Self::Connect { .. } => "connect_failed",
            Self::Discovery(e) => e.code(),
        }
    }
}
