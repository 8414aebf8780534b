/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c)2026 tappet contributors
 */

//! Process exit codes, following the sysexits(3) convention.

pub const OK: i32 = 0;
pub const ERR_USAGE: i32 = 64;
pub const ERR_NOPERM: i32 = 77;
pub const ERR_IOERR: i32 = 74;
pub const ERR_CONFIG: i32 = 78;
