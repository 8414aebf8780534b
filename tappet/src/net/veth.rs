/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c)2026 tappet contributors
 */

//! Attachment to a pre-created Linux TAP interface. This daemon never
//! creates or configures the interface itself — it only opens
//! `/dev/net/tun` and asks the kernel to hand back the fd for an existing
//! device via the standard `TUNSETIFF` dance, wrapped in a thin `unsafe`
//! shim at the FFI boundary only.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use tokio::io::unix::AsyncFd;

const IFNAMSIZ: usize = 16;
const IFF_TAP: libc::c_short = 0x0002;
const IFF_NO_PI: libc::c_short = 0x1000;
const TUNSETIFF: libc::c_ulong = 0x4004_54ca;

#[repr(C)]
struct IfReq {
    name: [libc::c_char; IFNAMSIZ],
    flags: libc::c_short,
    _pad: [u8; 22],
}

/// A non-blocking handle to an attached TAP device.
pub struct Veth {
    fd: AsyncFd<OwnedFd>,
}

impl Veth {
    pub fn attach(name: &str) -> io::Result<Self> {
        if name.len() >= IFNAMSIZ {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "interface name too long"));
        }

        let dev_path = CString::new("/dev/net/tun").expect("no interior NUL");
        let raw = unsafe { libc::open(dev_path.as_ptr(), libc::O_RDWR) };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let mut ifr: IfReq = unsafe { std::mem::zeroed() };
        for (dst, src) in ifr.name.iter_mut().zip(name.as_bytes()) {
            *dst = *src as libc::c_char;
        }
        ifr.flags = IFF_TAP | IFF_NO_PI;

        let rc = unsafe { libc::ioctl(fd.as_raw_fd(), TUNSETIFF as _, &mut ifr) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        set_nonblocking(fd.as_raw_fd())?;
        Ok(Self { fd: AsyncFd::new(fd)? })
    }

    /// Reads one frame into `buf`, returning the frame length. Frames
    /// larger than `buf` are truncated by the kernel read and the excess
    /// is lost — callers size `buf` generously enough that this never
    /// matters for real Ethernet frames.
    pub async fn read_frame(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.fd.readable().await?;
            let result = guard.try_io(|inner| {
                let n = unsafe { libc::read(inner.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
                if n < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(n as usize)
                }
            });
            match result {
                Ok(outcome) => return outcome,
                Err(_would_block) => continue,
            }
        }
    }

    pub async fn write_frame(&self, frame: &[u8]) -> io::Result<()> {
        loop {
            let mut guard = self.fd.writable().await?;
            let result = guard.try_io(|inner| {
                let n = unsafe { libc::write(inner.as_raw_fd(), frame.as_ptr().cast(), frame.len()) };
                if n < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(())
                }
            });
            match result {
                Ok(outcome) => return outcome,
                Err(_would_block) => continue,
            }
        }
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
