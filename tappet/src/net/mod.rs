/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c)2026 tappet contributors
 */

pub mod datagram;
pub mod veth;

pub use datagram::{Datagram, RecvOutcome, MIN_DATAGRAM_LEN};
pub use veth::Veth;
