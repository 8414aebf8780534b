/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c)2026 tappet contributors
 */

//! Command-line surface: `tappet [-l] <tap-name> <our-privkey-path>
//! <address> <port> <their-pubkey-path> <nonce-file-path>`.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "tappet", version, about = "Point-to-point Layer-2 VPN over authenticated UDP")]
pub struct Cli {
    /// Run as the listening side (bind and wait). Absent: run as the
    /// connecting side (the address/port below is the peer to dial).
    #[arg(short = 'l', long = "listen")]
    pub listen: bool,

    /// Name of a pre-created Linux TAP interface to attach to.
    pub tap_name: String,

    /// Path to our own keypair file (secret key, then public key).
    pub our_keypair_path: PathBuf,

    /// Literal IPv4 or IPv6 address: ours to bind to as listener, the
    /// peer's to dial as connector.
    pub address: String,

    /// Port number, 1..65534.
    pub port: String,

    /// Path to the peer's public-key-only file.
    pub their_pubkey_path: PathBuf,

    /// Path to the nonce-prefix persistence file.
    pub nonce_file_path: PathBuf,
}
