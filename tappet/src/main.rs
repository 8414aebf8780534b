/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c)2026 tappet contributors
 */

mod addr;
mod cli;
mod error;
mod exitcode;
mod keepalive;
mod keys;
mod net;
mod noncefile;
mod tunnel;

use clap::Parser;

use cli::Cli;
use error::Error;
use net::{Datagram, Veth};
use tunnel::{Role, TunnelState};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { exitcode::ERR_USAGE } else { exitcode::OK });
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let code = match run(cli) {
        Ok(()) => exitcode::OK,
        Err(err) => {
            let code = exit_code_for(&err);
            let err = anyhow::Error::from(err);
            tracing::error!("{err:#}");
            code
        }
    };
    std::process::exit(code);
}

#[tokio::main(flavor = "current_thread")]
async fn run(cli: Cli) -> Result<(), Error> {
    if unsafe { libc::geteuid() } == 0 {
        return Err(Error::RunningAsRoot);
    }

    let keypair = keys::read_keypair(&cli.our_keypair_path)?;
    let their_public = keys::read_pubkey(&cli.their_pubkey_path)?;
    let configured_addr = addr::parse(&cli.address, &cli.port)?;
    let nonce_prefix = noncefile::next_prefix(&cli.nonce_file_path)?;

    let shared_key = tappet_crypto::precompute(&keypair.secret, &their_public);

    let veth = Veth::attach(&cli.tap_name).map_err(|source| Error::TapAttach {
        name: cli.tap_name.clone(),
        source,
    })?;

    let role = if cli.listen { Role::Listener } else { Role::Connector };

    let (datagram, initial_peer) = if cli.listen {
        (Datagram::bind(configured_addr).map_err(Error::Socket)?, None)
    } else {
        let local = unspecified_like(configured_addr);
        (
            Datagram::connect(local, configured_addr).map_err(Error::Socket)?,
            Some(configured_addr),
        )
    };

    tracing::info!(?role, tap = %cli.tap_name, peer = %configured_addr, "tappet starting");

    let state = TunnelState::new(role, &shared_key, nonce_prefix, initial_peer);
    tunnel::run(role, veth, datagram, state).await
}

fn unspecified_like(peer: std::net::SocketAddr) -> std::net::SocketAddr {
    use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
    match peer {
        SocketAddr::V4(_) => SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0),
        SocketAddr::V6(_) => SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0),
    }
}

fn exit_code_for(err: &Error) -> i32 {
    match err {
        Error::RunningAsRoot => exitcode::ERR_NOPERM,
        Error::KeyFileOpen { .. }
        | Error::KeyFileFormat { .. }
        | Error::AddressFormat(_)
        | Error::PortFormat(_)
        | Error::NonceFile { .. }
        | Error::TapAttach { .. }
        | Error::Socket(_) => exitcode::ERR_CONFIG,
        Error::Io { .. } | Error::Crypto(_) => exitcode::ERR_IOERR,
    }
}
