//! Socket plumbing for mDNS: opening and configuring UDP sockets bound
//! to the well-known multicast group and port. Out of scope for the
//! wire codec itself (S:1): this module is an opaque datagram transport
//! that yields `(bytes, source-address)` tuples and accepts `(bytes,
//! destination-address)` tuples, so the codec and `sd` modules remain
//! transport-agnostic and unit-testable without a live socket.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::sd::{MDNS_GROUP_V4, MDNS_GROUP_V6, MDNS_PORT};

/// A narrow transport abstraction: `send` and `recv` over datagrams.
/// Socket setup (multicast join, address reuse, TTL/hop-limit, interface
/// selection) lives behind this trait so the codec and DNS-SD
/// operations never see a raw socket.
pub trait Transport {
    /// Sends `bytes` to `dest`.
    async fn send(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<usize>;

    /// Receives one datagram into `buf`, returning the number of bytes
    /// written and the sender's address.
    async fn recv(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

/// A UDP transport bound to the mDNS multicast group on `MDNS_PORT`,
/// joined to the group on the given interface. Two constructors build
/// the IPv4 and IPv6 variants; both round-trip through [`socket2`] for
/// the multicast-join and TTL/hop-limit options `tokio::net::UdpSocket`
/// does not expose directly.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Binds an IPv4 socket to `0.0.0.0:5353` with `SO_REUSEADDR` set,
    /// joins the [`MDNS_GROUP_V4`] multicast group on `interface`, and
    /// sets the outbound multicast TTL to 1 (RFC 6762 S:11).
    pub fn bind_v4(interface: Ipv4Addr) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        let bind_addr: SocketAddr = (Ipv4Addr::UNSPECIFIED, MDNS_PORT).into();
        socket.bind(&SockAddr::from(bind_addr))?;
        socket.join_multicast_v4(&MDNS_GROUP_V4, &interface)?;
        socket.set_multicast_ttl_v4(1)?;
        socket.set_nonblocking(true)?;
        debug!(%interface, "joined mDNS IPv4 multicast group");
        Ok(Self {
            socket: UdpSocket::from_std(socket.into())?,
        })
    }

    /// Binds an IPv6 socket to `[::]:5353` with `SO_REUSEADDR` set,
    /// joins the [`MDNS_GROUP_V6`] multicast group on interface index
    /// `scope_id`, and sets the outbound hop limit to 1.
    pub fn bind_v6(scope_id: u32) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        let bind_addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, MDNS_PORT).into();
        socket.bind(&SockAddr::from(bind_addr))?;
        socket.join_multicast_v6(&Ipv6Addr::from(MDNS_GROUP_V6), scope_id)?;
        socket.set_multicast_hops_v6(1)?;
        socket.set_nonblocking(true)?;
        debug!(scope_id, "joined mDNS IPv6 multicast group");
        Ok(Self {
            socket: UdpSocket::from_std(socket.into())?,
        })
    }

    /// Binds an ephemeral IPv4 port for one-shot queries that do not
    /// need to receive unsolicited multicast traffic on 5353 (e.g. a
    /// short-lived CLI query tool).
    pub fn bind_ephemeral_v4() -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        let bind_addr: SocketAddr = (Ipv4Addr::UNSPECIFIED, 0).into();
        socket.bind(&SockAddr::from(bind_addr))?;
        socket.set_multicast_ttl_v4(1)?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket: UdpSocket::from_std(socket.into())?,
        })
    }

    /// The multicast destination address for sends on this transport's
    /// address family.
    pub fn multicast_addr(family: IpAddr) -> SocketAddr {
        match family {
            IpAddr::V4(_) => (MDNS_GROUP_V4, MDNS_PORT).into(),
            IpAddr::V6(_) => (Ipv6Addr::from(MDNS_GROUP_V6), MDNS_PORT).into(),
        }
    }
}

impl Transport for UdpTransport {
    async fn send(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<usize> {
        let n = self.socket.send_to(bytes, dest).await?;
        if n != bytes.len() {
            warn!(sent = n, total = bytes.len(), "short mDNS send");
        }
        Ok(n)
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }
}
