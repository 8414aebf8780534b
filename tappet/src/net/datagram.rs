/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c)2026 tappet contributors
 */

//! Non-blocking UDP transport for sealed tunnel datagrams. The listener
//! binds and accepts traffic from whichever source address shows up first;
//! the connector `connect()`s at the OS level, which both filters incoming
//! traffic to the configured peer and means that source will always equal
//! `peer_addr`. Every send still names its destination explicitly via
//! `send_to` rather than the connected-socket `send`, so the same tunnel
//! loop code works unchanged for the listener, whose `peer_addr` does
//! change as the far side roams.

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use tappet_crypto::MIN_CIPHERTEXT_LEN;

/// Reserved nonce bytes precede every sealed payload on the wire.
const NONCE_LEN: usize = 24;

/// Smallest possible tunnel datagram: a full nonce plus the smallest
/// possible sealed ciphertext.
pub const MIN_DATAGRAM_LEN: usize = NONCE_LEN + MIN_CIPHERTEXT_LEN;

pub enum RecvOutcome {
    /// `buf[0..len]` holds a datagram worth handing to the tunnel loop.
    Packet { from: SocketAddr, len: usize },
    /// A runt datagram arrived and was discarded before touching the AEAD.
    Undersized { from: SocketAddr, len: usize },
}

pub struct Datagram {
    socket: UdpSocket,
}

impl Datagram {
    /// Binds to `local` for listener role. Accepts datagrams from any
    /// source; the tunnel loop is responsible for learning and pinning the
    /// peer address from the first authenticated datagram it receives.
    pub fn bind(local: SocketAddr) -> io::Result<Self> {
        let socket = new_socket(&local)?;
        socket.bind(&local.into())?;
        Self::finish(socket)
    }

    /// Connects to `peer` for connector role. The kernel then both filters
    /// inbound traffic to `peer` and fixes the destination for every send,
    /// which also means a connector never roams at the transport layer.
    pub fn connect(local: SocketAddr, peer: SocketAddr) -> io::Result<Self> {
        let socket = new_socket(&local)?;
        socket.bind(&local.into())?;
        socket.connect(&peer.into())?;
        Self::finish(socket)
    }

    fn finish(socket: Socket) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        set_dont_fragment(&socket)?;
        let std_socket: std::net::UdpSocket = socket.into();
        Ok(Self {
            socket: UdpSocket::from_std(std_socket)?,
        })
    }

    /// Waits for the socket to become readable, then drains exactly one
    /// datagram into `buf`. A zero-length datagram is a legitimate `Ok(0)`
    /// from the kernel, distinct from `WouldBlock` — it is reported back as
    /// `Undersized` rather than silently ignored.
    pub async fn recv(&self, buf: &mut [u8]) -> io::Result<RecvOutcome> {
        loop {
            self.socket.readable().await?;
            match self.socket.try_recv_from(buf) {
                Ok((len, from)) => {
                    if len < MIN_DATAGRAM_LEN {
                        return Ok(RecvOutcome::Undersized { from, len });
                    }
                    return Ok(RecvOutcome::Packet { from, len });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn send_to(&self, buf: &[u8], to: SocketAddr) -> io::Result<()> {
        self.socket.send_to(buf, to).await?;
        Ok(())
    }
}

fn new_socket(local: &SocketAddr) -> io::Result<Socket> {
    let domain = if local.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
}

/// Sets the don't-fragment bit so oversized tunnel datagrams fail loudly
/// with `EMSGSIZE` instead of silently fragmenting at the IP layer — the
/// keepalive/MTU-advertiser component relies on this to discover the real
/// path MTU rather than one inflated by fragmentation.
#[cfg(target_os = "linux")]
fn set_dont_fragment(socket: &Socket) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    let value: libc::c_int = libc::IP_PMTUDISC_DO;
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_IP,
            libc::IP_MTU_DISCOVER,
            &value as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn set_dont_fragment(_socket: &Socket) -> io::Result<()> {
    Ok(())
}
