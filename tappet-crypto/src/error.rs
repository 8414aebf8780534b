/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c)2026 tappet contributors
 */

/// Errors from the crypto facade.
///
/// `AuthenticationFailed` is the one recoverable member — callers treat it
/// as a dropped packet, never as a reason to mutate tunnel state. Every
/// other variant is an internal/configuration failure the tunnel loop must
/// treat as fatal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("buffer too small: need at least {need} bytes, have {have}")]
    BufferTooSmall { need: usize, have: usize },

    #[error("nonce counter exhausted its 19-byte range")]
    NonceOverflow,
}
