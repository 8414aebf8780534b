/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c)2026 tappet contributors
 */

//! Nonce-prefix file persistence: a 4-byte big-endian counter, incremented
//! and fsynced before the new value is handed to the caller. Zero is
//! reserved as "uninitialized" and is never returned.
//!
//! The increment-before-use discipline matters: a crash after this
//! function returns but before its result is used would reuse a nonce
//! prefix, which is catastrophic for the nonce-uniqueness guarantee the
//! whole tunnel depends on. A crash inside this function (before the
//! fsync completes) only ever skips a prefix value, which is harmless.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Error;

pub fn next_prefix(path: &Path) -> Result<u32, Error> {
    let to_err = |source: std::io::Error| Error::NonceFile {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .map_err(to_err)?;

    let mut raw = [0u8; 4];
    let n = file.read(&mut raw).map_err(to_err)?;
    let current = if n == 4 { u32::from_be_bytes(raw) } else { 0 };

    // 0 is reserved; wrapping past u32::MAX skips back to 1, not 0.
    let next = match current.checked_add(1) {
        Some(0) | None => 1,
        Some(n) => n,
    };

    file.seek(SeekFrom::Start(0)).map_err(to_err)?;
    file.write_all(&next.to_be_bytes()).map_err(to_err)?;
    file.set_len(4).map_err(to_err)?;
    file.sync_all().map_err(to_err)?;

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one_for_a_fresh_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonce");
        assert_eq!(next_prefix(&path).unwrap(), 1);
    }

    #[test]
    fn increments_on_each_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonce");
        assert_eq!(next_prefix(&path).unwrap(), 1);
        assert_eq!(next_prefix(&path).unwrap(), 2);
        assert_eq!(next_prefix(&path).unwrap(), 3);
    }

    #[test]
    fn restart_always_yields_a_strictly_greater_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonce");
        let run1 = next_prefix(&path).unwrap();
        // Simulate process restart: reopen and call again.
        let run2 = next_prefix(&path).unwrap();
        assert!(run2 > run1);
    }

    #[test]
    fn never_returns_zero_even_across_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonce");
        std::fs::write(&path, u32::MAX.to_be_bytes()).unwrap();
        assert_eq!(next_prefix(&path).unwrap(), 1);
    }
}
