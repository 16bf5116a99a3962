//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by the LMS wire protocols (the CLI on TCP, the
//! discovery exchange on UDP) and changing them would break
//! interoperability with real servers.

use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Command-line interface (TCP)
// ─────────────────────────────────────────────────────────────────────────────

/// Default port of the server's command-line interface.
pub const CLI_PORT: u16 = 9090;

/// Default port of the server's web interface, used for cover art URLs.
pub const HTTP_PORT: u16 = 9000;

/// Default time to wait for the reply to a correlated command.
///
/// The push stream gives no guarantee a reply ever arrives (the player the
/// command addressed may be gone), so every wait is bounded.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

// ─────────────────────────────────────────────────────────────────────────────
// Discovery (UDP)
// ─────────────────────────────────────────────────────────────────────────────

/// UDP port servers listen on for discovery probes.
pub const DISCOVERY_PORT: u16 = 3483;

/// Fixed discovery probe payload.
///
/// Lowercase `e` marks a discovery request; each four-byte tag followed by
/// a NUL asks the server to include that field in its reply.
pub const DISCOVERY_PROBE: &[u8] = b"eIPAD\0NAME\0JSON\0VERS\0";

/// Marker byte of a valid discovery reply.
pub const DISCOVERY_REPLY_MARKER: u8 = b'E';

/// Per-interface receive window: discovery ends after this much silence.
pub const DISCOVERY_RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound on a discovery reply datagram.
pub const MAX_DISCOVERY_DATAGRAM: usize = 1024;
