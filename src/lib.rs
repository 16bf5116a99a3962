//! slimwire-core - client engine for the Logitech Media Server control
//! protocol.
//!
//! LMS exposes a line-oriented command/response/push protocol on TCP port
//! 9090 and answers UDP broadcast probes on port 3483. This crate
//! implements the client side of both: server discovery, the persistent
//! connection with its background read loop, listener fan-out for push
//! updates, and the correlation machinery that gives callers synchronous
//! command semantics over the asynchronous stream.
//!
//! # Architecture
//!
//! - [`codec`]: percent-escape codec and field-map extraction
//! - [`discovery`]: UDP broadcast probing and TLV reply parsing
//! - [`connection`]: the TCP connection and its read loop
//! - [`server`]: facade tying resolution, connection, and queries together
//! - [`traits`]: listener and command-surface abstractions
//! - [`error`]: centralized error exports
//!
//! Command/response matching over the push stream lives in the private
//! `correlator` module behind [`LmsConnection::cmd_response`].
//!
//! Presentation layers (an MPRIS bridge, a command-line frontend) consume
//! the engine through [`StatusListener`]/[`LineListener`] registrations
//! and the [`LmsControl`] command surface; they live outside this crate.

#![warn(clippy::all)]

pub mod codec;
pub mod connection;
mod correlator;
pub mod discovery;
pub mod error;
pub mod net;
pub mod protocol_constants;
pub mod server;
pub mod traits;

// Re-export commonly used types at the crate root
pub use codec::{decode, encode, fields_from_tokens, CodecError, CodecResult, FieldMap};
pub use connection::{Endpoint, LmsConnection};
pub use discovery::{
    discover_all, discover_mine, discover_on_interface, DiscoveryError, DiscoveryResult,
    ServerDescriptor,
};
pub use error::ErrorCode;
pub use server::{ConnectError, ConnectResult, LmsConfig, LmsServer};
pub use traits::{LineListener, LmsControl, LoggingStatusListener, StatusListener};
