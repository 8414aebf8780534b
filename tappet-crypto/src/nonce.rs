/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c)2026 tappet contributors
 */

//! 24-byte nonce construction, advancement, and freshness comparison.
//!
//! Layout: byte 0 is a side tag, bytes 1..5 are the 32-bit persisted prefix
//! (big-endian), bytes 5..24 are a 19-byte big-endian counter starting at
//! zero (byte 5 is most significant, byte 23 least). The counter's byte
//! order has to agree with `accept`'s whole-nonce big-endian comparison —
//! a little-endian counter would make byte 5 the first point of comparison
//! even though it changes only once per 256 increments, so a carry out of
//! byte 5 into byte 6 would compare as "older" than the value it replaced.

use crate::Error;

/// Side tag used by the connecting side. The listener uses the other value.
/// Disjoint tags are what let both directions share a nonce prefix without
/// ever colliding, even if an operator reuses a prefix file by mistake.
pub const SIDE_TAG_CONNECTOR: u8 = 0x00;
pub const SIDE_TAG_LISTENER: u8 = 0x01;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Nonce(pub [u8; 24]);

impl Nonce {
    /// Builds the first nonce a side will use: side tag, then the prefix
    /// read from the nonce-prefix file, then a zeroed 19-byte counter.
    pub fn initial(prefix: u32, side_tag: u8) -> Self {
        let mut b = [0u8; 24];
        b[0] = side_tag;
        b[1..5].copy_from_slice(&prefix.to_be_bytes());
        Self(b)
    }

    /// Increments the 19-byte big-endian counter in place, carrying from
    /// the least-significant byte (23) toward the most-significant (5).
    /// Returns `Error::NonceOverflow` if the counter has reached its maximum
    /// value — the tunnel must not reuse a nonce, so this is a fatal
    /// condition for the caller, not a recoverable one.
    pub fn advance(&mut self) -> Result<(), Error> {
        for i in (5..24).rev() {
            if self.0[i] == 0xff {
                self.0[i] = 0;
            } else {
                self.0[i] += 1;
                return Ok(());
            }
        }
        Err(Error::NonceOverflow)
    }

    /// Returns the raw 24 bytes, as sent on the wire.
    pub fn as_bytes(&self) -> &[u8; 24] {
        &self.0
    }

    pub fn from_bytes(b: [u8; 24]) -> Self {
        Self(b)
    }
}

/// True iff `candidate` is strictly newer than `last_accepted` under
/// big-endian comparison of the full 24 bytes (the side tag participates
/// in the comparison, but since both sides use a fixed, distinct tag for
/// the lifetime of a tunnel this never changes the outcome within one
/// direction's nonce stream).
pub fn accept(last_accepted: &Nonce, candidate: &Nonce) -> bool {
    candidate.0 > last_accepted.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_places_tag_and_prefix() {
        let n = Nonce::initial(0x0102_0304, SIDE_TAG_CONNECTOR);
        assert_eq!(n.0[0], SIDE_TAG_CONNECTOR);
        assert_eq!(&n.0[1..5], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&n.0[5..], &[0u8; 19]);
    }

    #[test]
    fn advance_increments_big_endian_counter() {
        let mut n = Nonce::initial(1, SIDE_TAG_CONNECTOR);
        n.advance().unwrap();
        assert_eq!(n.0[23], 1);
        n.0[23] = 0xff;
        n.advance().unwrap();
        assert_eq!(n.0[23], 0);
        assert_eq!(n.0[22], 1);
    }

    #[test]
    fn accept_holds_across_a_counter_byte_carry() {
        // Byte 23 is the counter's least-significant byte; carrying out of
        // it into byte 22 must still compare as strictly newer under the
        // whole-nonce big-endian ordering `accept` uses.
        let mut n = Nonce::initial(1, SIDE_TAG_CONNECTOR);
        for _ in 0..300 {
            let prev = n;
            n.advance().unwrap();
            assert!(accept(&prev, &n), "nonce did not advance past a 256-step carry");
        }
    }

    #[test]
    fn advance_overflow_is_fatal() {
        let mut n = Nonce(*b"\x00\x00\x00\x00\x00\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff");
        assert!(matches!(n.advance(), Err(Error::NonceOverflow)));
    }

    #[test]
    fn accept_requires_strict_increase() {
        let base = Nonce::initial(1, SIDE_TAG_CONNECTOR);
        let mut next = base;
        next.advance().unwrap();
        assert!(accept(&base, &next));
        assert!(!accept(&next, &base));
        assert!(!accept(&base, &base));
    }

    #[test]
    fn side_tags_keep_directions_disjoint_even_with_shared_prefix() {
        let connector_first = Nonce::initial(42, SIDE_TAG_CONNECTOR);
        let listener_first = Nonce::initial(42, SIDE_TAG_LISTENER);
        assert_ne!(connector_first.0, listener_first.0);
        assert!(listener_first.0 > connector_first.0);
    }
}
