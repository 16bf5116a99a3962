//! Server discovery over UDP broadcast.
//!
//! Servers answer a fixed probe on UDP port 3483 with a TLV-encoded
//! description of themselves. Discovery probes every usable interface,
//! merges the replies keyed by server address, and can additionally pick
//! out the server this machine's own player is connected to.
//!
//! # Discovery pipeline
//!
//! 1. Enumerate local non-loopback IPv4 addresses
//! 2. Probe each interface concurrently ([`discover_on_interface`])
//! 3. Merge replies keyed by sender address (last reply per server wins)
//! 4. Optionally probe each candidate for a player of ours ([`discover_mine`])

pub mod types;
mod udp;

pub use types::{DiscoveryError, DiscoveryResult, ServerDescriptor};
pub use udp::discover_on_interface;

use std::collections::HashMap;
use std::net::Ipv4Addr;

use futures::future::join_all;

use crate::net;
use crate::protocol_constants::HTTP_PORT;
use crate::server::{LmsConfig, LmsServer};

/// Discovers every reachable server on the local network.
///
/// Probes all non-loopback IPv4 interfaces concurrently and merges the
/// results; two replies from the same address leave exactly one entry. The
/// list is sorted by host for stable ordering. A broken interface is
/// logged and contributes nothing; no interfaces at all is an error.
pub async fn discover_all() -> DiscoveryResult<Vec<ServerDescriptor>> {
    let sources = net::local_ipv4_addrs();
    if sources.is_empty() {
        return Err(DiscoveryError::NoInterfaces);
    }

    let results = join_all(sources.iter().copied().map(discover_on_interface)).await;

    let mut merged: HashMap<Ipv4Addr, ServerDescriptor> = HashMap::new();
    for (source, result) in sources.iter().zip(results) {
        match result {
            Ok(found) => merged.extend(found),
            // One broken interface must not hide servers seen from others.
            Err(e) => log::warn!("discovery failed on {}: {}", source, e),
        }
    }

    let mut servers: Vec<ServerDescriptor> = merged.into_values().collect();
    servers.sort_by(|a, b| a.host.cmp(&b.host));
    log::debug!("discovered {} server(s)", servers.len());
    Ok(servers)
}

/// Finds the server this machine's own player is connected to.
///
/// Connects to each discovered server in turn and asks it for a player
/// whose address matches one of ours; the transient connection is closed
/// again either way. `Ok(None)` when no server matches or none were
/// discovered: a machine without a registered player is an expected
/// situation, not a failure.
pub async fn discover_mine() -> DiscoveryResult<Option<ServerDescriptor>> {
    let servers = discover_all().await?;
    if servers.is_empty() {
        log::warn!("could not discover any media servers");
        return Ok(None);
    }

    let local_ips = net::local_ip_strings();
    for server in servers {
        let config = LmsConfig {
            host: Some(server.host.clone()),
            http_port: server.http_port.unwrap_or(HTTP_PORT),
            ..LmsConfig::default()
        };
        let lms = LmsServer::new(config);
        if let Err(e) = lms.connect().await {
            log::info!("could not check {}: {}", server.host, e);
            continue;
        }
        let player = lms.local_player(&local_ips).await;
        lms.disconnect().await;
        if player.is_some() {
            return Ok(Some(server));
        }
    }

    Ok(None)
}
