//! UDP probe and reply handling for server discovery.
//!
//! One socket per interface, used for send AND receive since servers reply
//! unicast back to the probing socket/port. Replies are a one-byte marker
//! followed by TLV records: four-byte tag, one binary length byte, value.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::protocol_constants::{
    DISCOVERY_PORT, DISCOVERY_PROBE, DISCOVERY_RECV_TIMEOUT, DISCOVERY_REPLY_MARKER,
    MAX_DISCOVERY_DATAGRAM,
};

use super::types::{DiscoveryError, DiscoveryResult, ServerDescriptor};

/// Creates a broadcast-capable UDP socket bound to one interface address.
fn create_socket(source: Ipv4Addr) -> DiscoveryResult<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(DiscoveryError::SocketBind)?;

    socket
        .set_broadcast(true)
        .map_err(DiscoveryError::SocketBind)?;

    // Non-blocking before handing the fd to tokio.
    socket
        .set_nonblocking(true)
        .map_err(DiscoveryError::SocketBind)?;

    let bind_addr = SocketAddr::new(IpAddr::V4(source), 0);
    socket
        .bind(&bind_addr.into())
        .map_err(DiscoveryError::SocketBind)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(DiscoveryError::SocketBind)
}

/// Parses one discovery reply datagram.
///
/// Consumes exactly the declared length per record and stops when no bytes
/// remain; anything else is malformed. Returns `Ok(None)` for a reply that
/// carries no usable fields (the server answered but reported nothing).
pub(crate) fn parse_reply(
    data: &[u8],
    sender: Ipv4Addr,
) -> DiscoveryResult<Option<ServerDescriptor>> {
    match data.first() {
        Some(&DISCOVERY_REPLY_MARKER) => {}
        first => return Err(DiscoveryError::BadMarker(first.copied().unwrap_or(0))),
    }

    let mut name = None;
    let mut host = None;
    let mut http_port = None;
    let mut version = None;
    let mut uuid = None;

    let mut rest = &data[1..];
    while !rest.is_empty() {
        if rest.len() < 5 {
            return Err(DiscoveryError::TruncatedRecord {
                needed: 5,
                remaining: rest.len(),
            });
        }
        let (tag, after_tag) = rest.split_at(4);
        let len = after_tag[0] as usize;
        if after_tag.len() < 1 + len {
            return Err(DiscoveryError::TruncatedRecord {
                needed: 5 + len,
                remaining: rest.len(),
            });
        }
        let value = &after_tag[1..1 + len];

        let slot = match tag {
            b"NAME" => &mut name,
            b"IPAD" => &mut host,
            b"JSON" => &mut http_port,
            b"VERS" => &mut version,
            b"UUID" => &mut uuid,
            _ => {
                return Err(DiscoveryError::UnknownTag(
                    String::from_utf8_lossy(tag).into_owned(),
                ))
            }
        };
        // Servers send a zero-length value for fields they have no data
        // for; the field stays unset.
        if !value.is_empty() {
            let text = str::from_utf8(value).map_err(|_| {
                DiscoveryError::NonUtf8Value(String::from_utf8_lossy(tag).into_owned())
            })?;
            *slot = Some(text.to_string());
        }

        rest = &after_tag[1 + len..];
    }

    if name.is_none() && host.is_none() && http_port.is_none() && version.is_none() && uuid.is_none()
    {
        return Ok(None);
    }

    let http_port = match http_port {
        Some(raw) => Some(
            raw.parse::<u16>()
                .map_err(|_| DiscoveryError::BadHttpPort(raw))?,
        ),
        None => None,
    };

    Ok(Some(ServerDescriptor {
        name,
        // Servers only report a host when their admin pinned one; the
        // reply's source address is authoritative otherwise.
        host: host.unwrap_or_else(|| sender.to_string()),
        http_port,
        version,
        uuid,
    }))
}

/// Drains replies from the socket until the window passes with none.
///
/// Keyed by the replying server's address; multiple replies from one
/// address keep the last. A malformed datagram is logged and dropped
/// without ending the window.
async fn collect_replies(
    socket: &UdpSocket,
    window: Duration,
) -> HashMap<Ipv4Addr, ServerDescriptor> {
    let mut servers = HashMap::new();
    let mut buf = [0u8; MAX_DISCOVERY_DATAGRAM];

    loop {
        let (len, peer) = match timeout(window, socket.recv_from(&mut buf)).await {
            // Quiet for the whole window: discovery is over, not a failure.
            Err(_) => break,
            Ok(Err(e)) => {
                log::warn!("discovery receive failed: {}", e);
                break;
            }
            Ok(Ok(received)) => received,
        };

        let IpAddr::V4(peer_ip) = peer.ip() else {
            continue;
        };
        match parse_reply(&buf[..len], peer_ip) {
            Ok(Some(server)) => {
                log::debug!("discovery reply from {}: {:?}", peer_ip, server);
                servers.insert(peer_ip, server);
            }
            Ok(None) => log::debug!("empty discovery reply from {}", peer_ip),
            Err(e) => log::warn!("dropping malformed discovery reply from {}: {}", peer_ip, e),
        }
    }

    servers
}

/// Probes one interface and collects replies until the window closes.
///
/// An interface that cannot broadcast yields an empty result rather than
/// an error.
pub async fn discover_on_interface(
    source: Ipv4Addr,
) -> DiscoveryResult<HashMap<Ipv4Addr, ServerDescriptor>> {
    let socket = create_socket(source)?;
    let target = SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), DISCOVERY_PORT);

    log::debug!("sending discovery probe from {}", source);
    if let Err(e) = socket.send_to(DISCOVERY_PROBE, target).await {
        log::debug!("interface {} does not support broadcast: {}", source, e);
        return Ok(HashMap::new());
    }

    Ok(collect_replies(&socket, DISCOVERY_RECV_TIMEOUT).await)
}
