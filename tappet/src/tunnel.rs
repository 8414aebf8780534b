/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c)2026 tappet contributors
 */

//! The central event loop: owns all per-tunnel mutable state and is the
//! only place that mutates `peer_addr`, both nonces, and the three size
//! counters. Everything else in this crate is a stateless collaborator
//! this module drives.
//!
//! [`TunnelState`] is deliberately free of any socket or tap handle — the
//! nonce/replay/classification logic it implements is exercised directly
//! in this module's tests, and separately wired to real I/O by [`run`].

use std::net::SocketAddr;
use std::time::Duration;

use tappet_crypto::{nonce, Key, Nonce, PacketCipher, BUFFER_SIZE, PLAINTEXT_ZERO_PREFIX};

use crate::error::Error;
use crate::keepalive;
use crate::net::{Datagram, RecvOutcome, Veth, MIN_DATAGRAM_LEN};

/// Length of the nonce header prepended to every wire datagram.
pub const NONCE_LEN: usize = 24;

/// Largest wire datagram this tunnel will ever assemble: a nonce header
/// plus one full ciphertext buffer.
pub const WIRE_BUFFER_SIZE: usize = NONCE_LEN + BUFFER_SIZE;

/// Idle period with no readiness before a keepalive is emitted.
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Plaintext payloads at or above this length (after the zero prefix is
/// stripped) are treated as Ethernet frames rather than control traffic.
const MIN_FRAME_LEN: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Connector,
    Listener,
}

impl Role {
    fn side_tag(self) -> u8 {
        match self {
            Role::Connector => nonce::SIDE_TAG_CONNECTOR,
            Role::Listener => nonce::SIDE_TAG_LISTENER,
        }
    }
}

/// What to do with an inbound wire datagram once [`TunnelState::on_datagram`]
/// has classified it.
#[derive(Debug, PartialEq, Eq)]
pub enum DatagramOutcome {
    /// Authentication failure, replay, undersized datagram, or recognized
    /// control traffic (keepalive). State has already been updated as
    /// needed; there is nothing further for the caller to do.
    Dropped,
    /// An Ethernet frame was recovered; `buf[PLAINTEXT_ZERO_PREFIX..plaintext_len]`
    /// holds it and should be written to the tap device.
    Forward { plaintext_len: usize },
}

/// All mutable state for one tunnel. Created once at startup and driven by
/// [`run`] for the life of the process.
pub struct TunnelState {
    cipher: PacketCipher,
    our_nonce: Nonce,
    their_nonce: Nonce,
    peer_addr: Option<SocketAddr>,
    pub biggest_tried: u16,
    pub biggest_sent: u16,
    pub biggest_rcvd: u16,
}

impl TunnelState {
    pub fn new(role: Role, shared_key: &Key, nonce_prefix: u32, peer_addr: Option<SocketAddr>) -> Self {
        Self {
            cipher: PacketCipher::new(shared_key),
            our_nonce: Nonce::initial(nonce_prefix, role.side_tag()),
            their_nonce: Nonce::from_bytes([0u8; 24]),
            peer_addr,
            biggest_tried: 0,
            biggest_sent: 0,
            biggest_rcvd: 0,
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Processes one inbound wire datagram: `buf[0..len]` is `nonce(24) ||
    /// ciphertext` on entry. `buf` is sized to the largest datagram this
    /// tunnel can ever send or receive (`WIRE_BUFFER_SIZE` = nonce +
    /// `BUFFER_SIZE`-worth of ciphertext) so a maximum-size frame the peer
    /// emits is never truncated on the way in. Replayed, unauthenticated,
    /// or undersized datagrams are dropped without touching `their_nonce`,
    /// `peer_addr`, or `biggest_rcvd` — only a datagram that both carries a
    /// fresh nonce and passes authentication is allowed to move any of
    /// that state.
    pub fn on_datagram(&mut self, from: SocketAddr, buf: &mut [u8; WIRE_BUFFER_SIZE], len: usize) -> DatagramOutcome {
        if len < MIN_DATAGRAM_LEN {
            tracing::trace!(%from, len, "dropping undersized datagram");
            return DatagramOutcome::Dropped;
        }

        let nonce_bytes: [u8; NONCE_LEN] = buf[0..NONCE_LEN].try_into().expect("sliced exactly NONCE_LEN bytes");
        let candidate = Nonce::from_bytes(nonce_bytes);
        if !nonce::accept(&self.their_nonce, &candidate) {
            tracing::debug!(%from, "dropping replayed or stale nonce");
            return DatagramOutcome::Dropped;
        }

        let ciphertext_len = len - NONCE_LEN;
        buf.copy_within(NONCE_LEN..len, 0);

        // The crypto facade's buffers are fixed at `BUFFER_SIZE`; a wire
        // datagram's ciphertext never exceeds that, so this window always
        // covers it.
        let cipher_buf: &mut [u8; BUFFER_SIZE] = (&mut buf[0..BUFFER_SIZE])
            .try_into()
            .expect("WIRE_BUFFER_SIZE is NONCE_LEN bytes larger than BUFFER_SIZE");

        let plaintext_len = match self.cipher.open(&candidate, cipher_buf, ciphertext_len) {
            Ok(n) => n,
            Err(_) => {
                tracing::debug!(%from, "dropping datagram that failed authentication");
                return DatagramOutcome::Dropped;
            }
        };

        // Only now, with authentication proven, do we trust this datagram
        // enough to move any state — including crediting `from` as the
        // peer's address.
        if self.peer_addr != Some(from) {
            tracing::info!(%from, previous = ?self.peer_addr, "peer address updated");
        }
        self.their_nonce = candidate;
        self.peer_addr = Some(from);
        if len as u16 > self.biggest_rcvd {
            self.biggest_rcvd = len as u16;
        }

        let payload = &buf[PLAINTEXT_ZERO_PREFIX..plaintext_len];
        match payload.len() {
            3 if payload[0] == keepalive::OPCODE_KEEPALIVE => {
                let reported = u16::from_be_bytes([payload[1], payload[2]]);
                if reported > self.biggest_sent {
                    self.biggest_sent = reported;
                }
                tracing::trace!(reported, "received keepalive / MTU advertisement");
                DatagramOutcome::Dropped
            }
            n if n < MIN_FRAME_LEN => {
                tracing::trace!(n, "dropping unrecognized short control payload");
                DatagramOutcome::Dropped
            }
            _ => DatagramOutcome::Forward { plaintext_len },
        }
    }

    /// Seals a tap-sourced frame already written at `buf[PLAINTEXT_ZERO_PREFIX..]`
    /// (with `frame_len` bytes of payload) and advances `our_nonce`.
    /// Returns the nonce used and the resulting ciphertext length.
    pub fn encrypt_frame(&mut self, buf: &mut [u8; BUFFER_SIZE], frame_len: usize) -> Result<(Nonce, usize), Error> {
        buf[0..PLAINTEXT_ZERO_PREFIX].fill(0);
        self.our_nonce.advance()?;
        let ciphertext_len = self.cipher.seal(&self.our_nonce, buf, PLAINTEXT_ZERO_PREFIX + frame_len)?;
        self.note_tried(ciphertext_len);
        Ok((self.our_nonce, ciphertext_len))
    }

    /// Builds a sealed keepalive advertising `biggest_rcvd` and advances
    /// `our_nonce`.
    pub fn build_keepalive(&mut self) -> Result<(Nonce, Box<[u8; BUFFER_SIZE]>, usize), Error> {
        let (sealed, ciphertext_len) = keepalive::build(&self.cipher, &mut self.our_nonce, self.biggest_rcvd)?;
        self.note_tried(ciphertext_len);
        Ok((self.our_nonce, sealed, ciphertext_len))
    }

    fn note_tried(&mut self, ciphertext_len: usize) {
        let wire_len = (NONCE_LEN + ciphertext_len) as u16;
        if wire_len > self.biggest_tried {
            self.biggest_tried = wire_len;
        }
    }
}

/// Concatenates `nonce || ciphertext` into `wire`, returning the total
/// length. The only place in this crate that assembles a full wire
/// datagram, since both the tap-encrypt path and the keepalive path need it.
pub fn assemble_wire(nonce: &Nonce, ciphertext: &[u8], wire: &mut [u8; WIRE_BUFFER_SIZE]) -> usize {
    wire[0..NONCE_LEN].copy_from_slice(nonce.as_bytes());
    wire[NONCE_LEN..NONCE_LEN + ciphertext.len()].copy_from_slice(ciphertext);
    NONCE_LEN + ciphertext.len()
}

async fn send_keepalive(datagram: &Datagram, state: &mut TunnelState) -> Result<(), Error> {
    let peer = state
        .peer_addr()
        .expect("callers only invoke this once peer_addr is known");
    let (nonce, sealed, ciphertext_len) = state.build_keepalive()?;
    let mut wire = [0u8; WIRE_BUFFER_SIZE];
    let wire_len = assemble_wire(&nonce, &sealed[..ciphertext_len], &mut wire);
    datagram
        .send_to(&wire[..wire_len], peer)
        .await
        .map_err(|source| Error::Io { what: "datagram", source })
}

/// Drives one tunnel for the life of the process. The single readiness
/// wait is the `tokio::select!` below: the datagram socket is always
/// watched, the tap endpoint only once `peer_addr` is known (the listener
/// must not forward frames into a void before it has learned its peer),
/// and a 10-second idle deadline triggers a keepalive.
pub async fn run(role: Role, veth: Veth, datagram: Datagram, mut state: TunnelState) -> Result<(), Error> {
    if role == Role::Connector {
        send_keepalive(&datagram, &mut state).await?;
    }

    let mut recv_buf = Box::new([0u8; WIRE_BUFFER_SIZE]);
    let mut tap_buf = Box::new([0u8; BUFFER_SIZE]);

    loop {
        tokio::select! {
            _ = tokio::time::sleep(IDLE_TIMEOUT) => {
                if state.peer_addr().is_some() {
                    send_keepalive(&datagram, &mut state).await?;
                }
            }

            outcome = datagram.recv(&mut recv_buf[..]) => {
                let outcome = outcome.map_err(|source| Error::Io { what: "datagram", source })?;
                if let RecvOutcome::Packet { from, len } = outcome {
                    if let DatagramOutcome::Forward { plaintext_len } = state.on_datagram(from, &mut recv_buf, len) {
                        veth.write_frame(&recv_buf[PLAINTEXT_ZERO_PREFIX..plaintext_len])
                            .await
                            .map_err(|source| Error::Io { what: "tap", source })?;
                    }
                }
            }

            frame_len = veth.read_frame(&mut tap_buf[PLAINTEXT_ZERO_PREFIX..]), if state.peer_addr().is_some() => {
                let frame_len = frame_len.map_err(|source| Error::Io { what: "tap", source })?;
                let peer = state.peer_addr().expect("guarded by the branch condition above");
                let (nonce, ciphertext_len) = state.encrypt_frame(&mut tap_buf, frame_len)?;
                let mut wire = [0u8; WIRE_BUFFER_SIZE];
                let wire_len = assemble_wire(&nonce, &tap_buf[..ciphertext_len], &mut wire);
                datagram
                    .send_to(&wire[..wire_len], peer)
                    .await
                    .map_err(|source| Error::Io { what: "datagram", source })?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn shared_key() -> Key {
        Key::from_bytes([0x42; 32])
    }

    fn seal_frame(state: &mut TunnelState, payload: &[u8]) -> (Nonce, [u8; WIRE_BUFFER_SIZE], usize) {
        let mut buf = Box::new([0u8; BUFFER_SIZE]);
        buf[PLAINTEXT_ZERO_PREFIX..PLAINTEXT_ZERO_PREFIX + payload.len()].copy_from_slice(payload);
        let (nonce, ciphertext_len) = state.encrypt_frame(&mut buf, payload.len()).unwrap();
        let mut wire = [0u8; WIRE_BUFFER_SIZE];
        let wire_len = assemble_wire(&nonce, &buf[..ciphertext_len], &mut wire);
        (nonce, wire, wire_len)
    }

    fn deliver(state: &mut TunnelState, from: SocketAddr, wire: &[u8], wire_len: usize) -> DatagramOutcome {
        let mut buf = Box::new([0u8; WIRE_BUFFER_SIZE]);
        buf[..wire_len].copy_from_slice(&wire[..wire_len]);
        state.on_datagram(from, &mut buf, wire_len)
    }

    #[test]
    fn handshake_registers_the_connector_as_peer() {
        let key = shared_key();
        let mut connector = TunnelState::new(Role::Connector, &key, 1, Some(addr(9000)));
        let mut listener = TunnelState::new(Role::Listener, &key, 1, None);
        assert_eq!(listener.peer_addr(), None);

        let (_, sealed, ciphertext_len) = connector.build_keepalive().unwrap();
        let mut wire = [0u8; WIRE_BUFFER_SIZE];
        let wire_len = assemble_wire(&connector.our_nonce, &sealed[..ciphertext_len], &mut wire);

        let outcome = deliver(&mut listener, addr(12345), &wire, wire_len);
        assert_eq!(outcome, DatagramOutcome::Dropped);
        assert_eq!(listener.peer_addr(), Some(addr(12345)));
        assert_eq!(listener.biggest_rcvd, wire_len as u16);
    }

    #[test]
    fn replayed_datagram_is_dropped_and_nonce_advances_once() {
        let key = shared_key();
        let mut connector = TunnelState::new(Role::Connector, &key, 1, Some(addr(9000)));
        let mut listener = TunnelState::new(Role::Listener, &key, 1, None);

        let payload = vec![0xABu8; 70];
        let (_, wire, wire_len) = seal_frame(&mut connector, &payload);

        let first = deliver(&mut listener, addr(9000), &wire, wire_len);
        assert!(matches!(first, DatagramOutcome::Forward { .. }));
        let nonce_after_first = listener.their_nonce;

        let second = deliver(&mut listener, addr(9000), &wire, wire_len);
        assert_eq!(second, DatagramOutcome::Dropped);
        assert_eq!(listener.their_nonce, nonce_after_first);
    }

    #[test]
    fn peer_address_updates_only_on_successful_authentication() {
        let key = shared_key();
        let mut connector = TunnelState::new(Role::Connector, &key, 1, Some(addr(9000)));
        let mut listener = TunnelState::new(Role::Listener, &key, 1, None);

        let payload = vec![0x11u8; 70];
        let (_, wire, wire_len) = seal_frame(&mut connector, &payload);
        deliver(&mut listener, addr(9000), &wire, wire_len);
        assert_eq!(listener.peer_addr(), Some(addr(9000)));

        let payload2 = vec![0x22u8; 70];
        let (_, wire2, wire_len2) = seal_frame(&mut connector, &payload2);
        deliver(&mut listener, addr(9111), &wire2, wire_len2);
        assert_eq!(listener.peer_addr(), Some(addr(9111)));
    }

    #[test]
    fn oversized_frame_updates_biggest_rcvd_and_propagates_via_keepalive() {
        let key = shared_key();
        let mut connector = TunnelState::new(Role::Connector, &key, 1, Some(addr(9000)));
        let mut listener = TunnelState::new(Role::Listener, &key, 1, None);

        let big_payload = vec![0x77u8; 1400];
        let (_, wire, wire_len) = seal_frame(&mut connector, &big_payload);
        let outcome = deliver(&mut listener, addr(9000), &wire, wire_len);
        assert!(matches!(outcome, DatagramOutcome::Forward { .. }));
        assert_eq!(listener.biggest_rcvd, wire_len as u16);

        let (_, sealed, ciphertext_len) = listener.build_keepalive().unwrap();
        let mut ka_wire = [0u8; WIRE_BUFFER_SIZE];
        let ka_len = assemble_wire(&listener.our_nonce, &sealed[..ciphertext_len], &mut ka_wire);

        let ka_outcome = deliver(&mut connector, addr(9000), &ka_wire, ka_len);
        assert_eq!(ka_outcome, DatagramOutcome::Dropped);
        assert_eq!(connector.biggest_sent, wire_len as u16);
    }

    #[test]
    fn a_maximum_size_frame_is_not_truncated_on_receipt() {
        let key = shared_key();
        let mut connector = TunnelState::new(Role::Connector, &key, 1, Some(addr(9000)));
        let mut listener = TunnelState::new(Role::Listener, &key, 1, None);

        // The largest frame `encrypt_frame` can seal fills its BUFFER_SIZE
        // plaintext buffer exactly, producing a WIRE_BUFFER_SIZE-long wire
        // datagram — the receive path must have room for all of it.
        let max_payload = vec![0x55u8; BUFFER_SIZE - PLAINTEXT_ZERO_PREFIX];
        let (_, wire, wire_len) = seal_frame(&mut connector, &max_payload);
        assert_eq!(wire_len, WIRE_BUFFER_SIZE);

        let outcome = deliver(&mut listener, addr(9000), &wire, wire_len);
        match outcome {
            DatagramOutcome::Forward { plaintext_len } => {
                assert_eq!(plaintext_len, PLAINTEXT_ZERO_PREFIX + max_payload.len());
            }
            DatagramOutcome::Dropped => panic!("max-size frame was dropped instead of forwarded"),
        }
    }

    #[test]
    fn a_restarted_connector_issues_nonces_strictly_newer_than_its_last_run() {
        let key = shared_key();
        let mut run1 = TunnelState::new(Role::Connector, &key, 5, Some(addr(9000)));
        let payload = vec![0x33u8; 70];
        let (nonce1, _, _) = seal_frame(&mut run1, &payload);

        // A restart re-reads the (already-incremented) nonce-prefix file,
        // so the second run starts with a strictly greater prefix.
        let mut run2 = TunnelState::new(Role::Connector, &key, 6, Some(addr(9000)));
        let (nonce2, _, _) = seal_frame(&mut run2, &payload);

        assert!(nonce2 > nonce1);
    }

    #[test]
    fn unauthenticated_garbage_leaves_all_state_untouched() {
        let key = shared_key();
        let mut listener = TunnelState::new(Role::Listener, &key, 1, None);

        let mut garbage = [0u8; WIRE_BUFFER_SIZE];
        for (i, b) in garbage.iter_mut().enumerate().take(100) {
            *b = (i * 7) as u8;
        }

        let outcome = deliver(&mut listener, addr(31337), &garbage, 100);
        assert_eq!(outcome, DatagramOutcome::Dropped);
        assert_eq!(listener.peer_addr(), None);
        assert_eq!(listener.biggest_rcvd, 0);
    }
}
