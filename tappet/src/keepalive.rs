/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c)2026 tappet contributors
 */

//! Construction of the 3-byte keepalive/MTU-advertisement control payload.
//! Sending is otherwise ordinary sealed-datagram traffic, so this module
//! only builds the plaintext and hands off to the shared seal/send path.

use tappet_crypto::{Error, Nonce, PacketCipher, BUFFER_SIZE, PLAINTEXT_ZERO_PREFIX};

/// Reserved first byte of every control payload; anything shorter than a
/// frame and starting with this byte is a keepalive, never tap traffic.
pub const OPCODE_KEEPALIVE: u8 = 0xFE;

/// Fills `buf` with a sealed keepalive payload advertising `size` as the
/// largest inbound datagram we have successfully decrypted so far, and
/// advances `nonce` as a side effect of sealing it. Returns the sealed
/// buffer and its length; callers prepend the (now-advanced) nonce bytes
/// themselves when writing the wire datagram.
pub fn build(
    cipher: &PacketCipher,
    nonce: &mut Nonce,
    size: u16,
) -> Result<(Box<[u8; BUFFER_SIZE]>, usize), Error> {
    let mut buf = Box::new([0u8; BUFFER_SIZE]);
    let payload_len = PLAINTEXT_ZERO_PREFIX + 3;
    buf[PLAINTEXT_ZERO_PREFIX] = OPCODE_KEEPALIVE;
    buf[PLAINTEXT_ZERO_PREFIX + 1] = (size >> 8) as u8;
    buf[PLAINTEXT_ZERO_PREFIX + 2] = (size & 0xFF) as u8;

    nonce.advance()?;
    let len = cipher.seal(nonce, &mut buf, payload_len)?;
    Ok((buf, len))
}
