/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c)2026 tappet contributors
 */

//! Precomputed-shared-secret authenticated encryption and nonce bookkeeping
//! for a single point-to-point tunnel.
//!
//! This crate has no notion of sockets, frames, or tunnels — it is the
//! crypto facade and nonce manager, kept separate from the service that
//! drives them.

mod aead;
mod error;
pub mod nonce;

pub use aead::{PacketCipher, BUFFER_SIZE, CIPHERTEXT_ZERO_PREFIX, MIN_CIPHERTEXT_LEN, PLAINTEXT_ZERO_PREFIX};
pub use error::Error;

use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

/// A 32-byte key, either a long-term identity key or the symmetric secret
/// derived from one. Zeroized on drop since it is always sensitive.
#[derive(Clone)]
pub struct Key(pub [u8; 32]);

impl Drop for Key {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Key {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }
}

/// Runs X25519 Diffie-Hellman between our secret and their public key, then
/// whitens the raw ECDH output through HKDF-SHA256 into a uniform symmetric
/// key. Raw X25519 output is not safe to feed directly into an AEAD cipher —
/// it must be passed through a KDF first.
pub fn precompute(our_secret: &Key, their_public: &Key) -> Key {
    let secret = StaticSecret::from(our_secret.0);
    let public = PublicKey::from(their_public.0);
    let shared = secret.diffie_hellman(&public);

    let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut okm = [0u8; 32];
    hk.expand(b"tappet-v1-shared-key", &mut okm)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    Key(okm)
}

/// Derives the public key half of a static secret, for tooling/tests that
/// only have the secret half on hand.
pub fn public_from_secret(secret: &Key) -> [u8; 32] {
    PublicKey::from(&StaticSecret::from(secret.0)).to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precompute_is_symmetric() {
        let a_sk = Key([1u8; 32]);
        let b_sk = Key([2u8; 32]);
        let a_pk = Key(public_from_secret(&a_sk));
        let b_pk = Key(public_from_secret(&b_sk));

        let shared_a = precompute(&a_sk, &b_pk);
        let shared_b = precompute(&b_sk, &a_pk);
        assert_eq!(shared_a.0, shared_b.0);
    }

    #[test]
    fn precompute_differs_per_peer() {
        let a_sk = Key([1u8; 32]);
        let b_pk = Key(public_from_secret(&Key([2u8; 32])));
        let c_pk = Key(public_from_secret(&Key([3u8; 32])));
        assert_ne!(precompute(&a_sk, &b_pk).0, precompute(&a_sk, &c_pk).0);
    }
}
