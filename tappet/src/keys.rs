/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c)2026 tappet contributors
 */

//! Key-file parsing: two lines of 64 hex characters for a keypair file, one
//! line for a public-key-only file.

use std::fs;
use std::path::Path;

use tappet_crypto::Key;

use crate::error::Error;

pub struct Keypair {
    pub secret: Key,
    pub public: Key,
}

fn decode_line(line: &str) -> Option<[u8; 32]> {
    if line.len() != 64 {
        return None;
    }
    hex::decode(line).ok()?.try_into().ok()
}

fn read_lines(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|source| Error::KeyFileOpen {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads our secret key (first line) and public key (second line) from a
/// keypair file.
pub fn read_keypair(path: &Path) -> Result<Keypair, Error> {
    let contents = read_lines(path)?;
    let mut lines = contents.lines();

    let secret = lines
        .next()
        .and_then(decode_line)
        .ok_or_else(|| Error::KeyFileFormat {
            path: path.to_path_buf(),
        })?;
    let public = lines
        .next()
        .and_then(decode_line)
        .ok_or_else(|| Error::KeyFileFormat {
            path: path.to_path_buf(),
        })?;

    Ok(Keypair {
        secret: Key::from_bytes(secret),
        public: Key::from_bytes(public),
    })
}

/// Reads the peer's public key (first and only line) from a pubkey file.
pub fn read_pubkey(path: &Path) -> Result<Key, Error> {
    let contents = read_lines(path)?;
    let public = contents
        .lines()
        .next()
        .and_then(decode_line)
        .ok_or_else(|| Error::KeyFileFormat {
            path: path.to_path_buf(),
        })?;
    Ok(Key::from_bytes(public))
}
