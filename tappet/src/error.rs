/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c)2026 tappet contributors
 */

use std::path::PathBuf;

/// Every fatal condition this daemon can hit, split between startup
/// (configuration) failures and datapath failures — both terminate the
/// process, but keeping them as distinct variants makes the failure visible
/// in logs and in `main`'s match arms.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("tappet must not be run as root")]
    RunningAsRoot,

    #[error("couldn't open key file {path}: {source}")]
    KeyFileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key file {path} is not in the expected two-line, 64-hex-character format")]
    KeyFileFormat { path: PathBuf },

    #[error("couldn't parse '{0}' as an IPv4 or IPv6 address")]
    AddressFormat(String),

    #[error("couldn't parse '{0}' as a port number in 1..65534")]
    PortFormat(String),

    #[error("couldn't read or persist nonce prefix file {path}: {source}")]
    NonceFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't attach to tap device {name}: {source}")]
    TapAttach {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't create or bind/connect UDP socket: {0}")]
    Socket(#[source] std::io::Error),

    #[error("fatal I/O error on the {what} endpoint: {source}")]
    Io {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Crypto(#[from] tappet_crypto::Error),
}
