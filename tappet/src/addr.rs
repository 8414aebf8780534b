/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c)2026 tappet contributors
 */

//! Literal IPv4/IPv6 address + port parsing. No DNS resolution is ever
//! attempted — an unparseable address is a configuration error, not a
//! lookup to retry.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::error::Error;

pub fn parse(address: &str, port: &str) -> Result<SocketAddr, Error> {
    let ip = IpAddr::from_str(address).map_err(|_| Error::AddressFormat(address.to_string()))?;

    let port: u32 = port
        .parse()
        .map_err(|_| Error::PortFormat(port.to_string()))?;
    if port == 0 || port >= 0xFFFF {
        return Err(Error::PortFormat(port.to_string()));
    }

    Ok(SocketAddr::new(ip, port as u16))
}
