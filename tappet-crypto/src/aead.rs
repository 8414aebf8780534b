/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c)2026 tappet contributors
 */

//! The encrypt/decrypt facade proper: fixed 2048-byte buffers in, fixed
//! 2048-byte buffers out, zero-prefix convention preserved on both sides so
//! every caller in this codebase reasons about plaintext and ciphertext the
//! same way regardless of which direction it's moving.

use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{Key as ChaChaKey, Tag, XChaCha20Poly1305, XNonce};

use crate::nonce::Nonce;
use crate::{Error, Key};

/// Upper bound on any single datagram or tap frame this tunnel moves,
/// shared by every buffer in the datapath so nothing here ever allocates.
pub const BUFFER_SIZE: usize = 2048;

/// Leading zero padding carried by every plaintext buffer: a 32-byte
/// reserved prefix ahead of the real payload, left over from the
/// construction this protocol's framing is modeled on.
pub const PLAINTEXT_ZERO_PREFIX: usize = 32;

/// Leading zero padding carried by every ciphertext buffer this facade
/// produces or expects.
pub const CIPHERTEXT_ZERO_PREFIX: usize = 16;

/// Poly1305 authentication tag size, appended by the underlying AEAD.
const TAG_SIZE: usize = 16;

/// Smallest a sealed ciphertext (post-nonce, pre-frame) can ever be: the
/// 16-byte zero prefix plus the 16-byte tag on an empty payload. Datagram
/// I/O uses this to drop undersized wire traffic before it ever reaches
/// the AEAD call.
pub const MIN_CIPHERTEXT_LEN: usize = CIPHERTEXT_ZERO_PREFIX + TAG_SIZE;

/// A precomputed shared-secret cipher bound to one tunnel. Stateless beyond
/// the key itself — nonce bookkeeping lives in the caller, not here, since
/// the caller is the only place that knows which direction a nonce belongs
/// to.
pub struct PacketCipher {
    inner: XChaCha20Poly1305,
}

impl PacketCipher {
    pub fn new(shared_key: &Key) -> Self {
        Self {
            inner: XChaCha20Poly1305::new(ChaChaKey::from_slice(&shared_key.0)),
        }
    }

    /// Encrypts `buf[0..plaintext_len]` in place — no heap allocation, so the
    /// datapath stays allocation-free after startup. `buf[0..32]` must
    /// already be zeroed by the caller (the zero-prefix convention); the
    /// real payload is `buf[32..plaintext_len]`. On success,
    /// `buf[0..plaintext_len]` holds the ciphertext: 16 zero bytes followed
    /// by the sealed payload and its detached tag, the same total length as
    /// the plaintext that went in.
    pub fn seal(
        &self,
        nonce: &Nonce,
        buf: &mut [u8; BUFFER_SIZE],
        plaintext_len: usize,
    ) -> Result<usize, Error> {
        if plaintext_len < PLAINTEXT_ZERO_PREFIX {
            return Err(Error::BufferTooSmall {
                need: PLAINTEXT_ZERO_PREFIX,
                have: plaintext_len,
            });
        }
        debug_assert!(buf[0..PLAINTEXT_ZERO_PREFIX].iter().all(|&b| b == 0));

        let payload_len = plaintext_len - PLAINTEXT_ZERO_PREFIX;
        let xnonce = XNonce::from_slice(nonce.as_bytes());
        let tag = self
            .inner
            .encrypt_in_place_detached(xnonce, b"", &mut buf[PLAINTEXT_ZERO_PREFIX..plaintext_len])
            .map_err(|_| Error::BufferTooSmall { need: 0, have: 0 })?;

        // Slide the now-sealed bytes down from the plaintext's 32-byte zero
        // prefix to the ciphertext's 16-byte one, then append the tag.
        buf.copy_within(PLAINTEXT_ZERO_PREFIX..plaintext_len, CIPHERTEXT_ZERO_PREFIX);
        let tag_start = CIPHERTEXT_ZERO_PREFIX + payload_len;
        buf[tag_start..tag_start + TAG_SIZE].copy_from_slice(&tag);
        buf[0..CIPHERTEXT_ZERO_PREFIX].fill(0);

        Ok(tag_start + TAG_SIZE)
    }

    /// Decrypts `buf[0..ciphertext_len]` in place — no heap allocation. On
    /// success, returns the plaintext length written to `buf`; `buf[0..32]`
    /// is zeroed (the reconstructed zero prefix) and `buf[32..len]` holds
    /// the payload. Returns `Error::AuthenticationFailed` on any tamper or
    /// truncation — callers must treat that, and only that, variant as a
    /// recoverable dropped packet rather than a fatal condition.
    pub fn open(
        &self,
        nonce: &Nonce,
        buf: &mut [u8; BUFFER_SIZE],
        ciphertext_len: usize,
    ) -> Result<usize, Error> {
        let min_len = CIPHERTEXT_ZERO_PREFIX + TAG_SIZE;
        if ciphertext_len < min_len {
            return Err(Error::AuthenticationFailed);
        }

        let payload_len = ciphertext_len - min_len;
        let tag_start = CIPHERTEXT_ZERO_PREFIX + payload_len;
        let tag = *Tag::from_slice(&buf[tag_start..tag_start + TAG_SIZE]);

        let xnonce = XNonce::from_slice(nonce.as_bytes());
        self.inner
            .decrypt_in_place_detached(xnonce, b"", &mut buf[CIPHERTEXT_ZERO_PREFIX..tag_start], &tag)
            .map_err(|_| Error::AuthenticationFailed)?;

        // Slide the now-decrypted payload up to the plaintext's 32-byte
        // zero prefix, then zero that prefix.
        buf.copy_within(CIPHERTEXT_ZERO_PREFIX..tag_start, PLAINTEXT_ZERO_PREFIX);
        buf[0..PLAINTEXT_ZERO_PREFIX].fill(0);

        Ok(PLAINTEXT_ZERO_PREFIX + payload_len)
    }
}
