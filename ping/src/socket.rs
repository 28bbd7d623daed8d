//! Raw socket transport
//!
//! The engines only talk to a [`Transport`]; [`RawSocket`] is the real
//! implementation over a kernel raw socket. The descriptor is owned by the
//! socket value and closed exactly once, when it is dropped or consumed by
//! [`RawSocket::close`].

use std::io;
use std::mem::MaybeUninit;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use log::debug;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::error::{Error, Result};

/// Outcome of a receive call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// A datagram of `len` bytes arrived from `from`
    Datagram { len: usize, from: Ipv4Addr },
    /// Nothing arrived within the receive timeout
    TimedOut,
}

/// Datagram transport used by the ping and traceroute engines
pub trait Transport {
    /// Bound every following receive to `timeout`
    fn set_receive_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Time-to-live for every following send
    fn set_ttl(&mut self, ttl: u32) -> Result<()>;

    /// Send a whole packet, returning the byte count
    fn send_to(&mut self, packet: &[u8], dest: Ipv4Addr) -> Result<usize>;

    /// Receive one datagram into `buf`
    fn receive_from(&mut self, buf: &mut [u8]) -> Result<Received>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn set_receive_timeout(&mut self, timeout: Duration) -> Result<()> {
        (**self).set_receive_timeout(timeout)
    }

    fn set_ttl(&mut self, ttl: u32) -> Result<()> {
        (**self).set_ttl(ttl)
    }

    fn send_to(&mut self, packet: &[u8], dest: Ipv4Addr) -> Result<usize> {
        (**self).send_to(packet, dest)
    }

    fn receive_from(&mut self, buf: &mut [u8]) -> Result<Received> {
        (**self).receive_from(buf)
    }
}

/// Receive buffer handed to the kernel, reused across receives
///
/// Grows to the largest caller buffer seen and never shrinks.
#[derive(Debug, Default)]
struct RecvScratch {
    bytes: Vec<MaybeUninit<u8>>,
}

impl RecvScratch {
    fn get(&mut self, len: usize) -> &mut [MaybeUninit<u8>] {
        if self.bytes.len() < len {
            self.bytes.resize(len, MaybeUninit::uninit());
        }
        &mut self.bytes[..len]
    }

    /// Copy the first `len` received bytes into `dst`
    ///
    /// `len` must not exceed what the last receive initialised.
    fn copy_to(&self, dst: &mut [u8], len: usize) {
        for (dst, src) in dst.iter_mut().zip(&self.bytes[..len]) {
            // SAFETY: recv_from initialised the first `len` bytes
            *dst = unsafe { src.assume_init_read() };
        }
    }
}

/// Raw socket bound to an address family and protocol
#[derive(Debug)]
pub struct RawSocket {
    socket: Socket,
    scratch: RecvScratch,
}

impl RawSocket {
    /// Open a raw socket
    ///
    /// Needs elevated privilege; failure is reported as
    /// [`Error::SocketCreate`] and is fatal to the caller's run.
    pub fn open(domain: Domain, protocol: Protocol) -> Result<Self> {
        let socket = Socket::new(domain, Type::RAW, Some(protocol)).map_err(Error::SocketCreate)?;
        debug!("opened raw socket (domain {:?}, protocol {:?})", domain, protocol);
        Ok(Self {
            socket,
            scratch: RecvScratch::default(),
        })
    }

    /// Raw ICMPv4 socket with a receive timeout already applied
    pub fn icmpv4(timeout: Duration) -> Result<Self> {
        let mut socket = Self::open(Domain::IPV4, Protocol::ICMPV4)?;
        socket.set_receive_timeout(timeout)?;
        Ok(socket)
    }

    /// Release the socket now instead of at end of scope
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        debug!("closing raw socket");
    }
}

impl Transport for RawSocket {
    fn set_receive_timeout(&mut self, timeout: Duration) -> Result<()> {
        // A zero duration would mean "block forever" to the kernel
        let timeout = timeout.max(Duration::from_millis(1));
        self.socket
            .set_read_timeout(Some(timeout))
            .map_err(|source| Error::SetOption {
                option: "receive timeout",
                source,
            })
    }

    fn set_ttl(&mut self, ttl: u32) -> Result<()> {
        self.socket.set_ttl(ttl).map_err(|source| Error::SetOption {
            option: "TTL",
            source,
        })
    }

    fn send_to(&mut self, packet: &[u8], dest: Ipv4Addr) -> Result<usize> {
        let addr = SockAddr::from(SocketAddrV4::new(dest, 0));
        let sent = self
            .socket
            .send_to(packet, &addr)
            .map_err(|source| Error::Send { dest, source })?;

        if sent == 0 {
            return Err(Error::ShortSend { dest, sent });
        }
        Ok(sent)
    }

    fn receive_from(&mut self, buf: &mut [u8]) -> Result<Received> {
        let raw = self.scratch.get(buf.len());

        let (len, from) = match self.socket.recv_from(raw) {
            Ok(received) => received,
            Err(e) if is_timeout(&e) => return Ok(Received::TimedOut),
            Err(e) => return Err(Error::Receive(e)),
        };
        self.scratch.copy_to(buf, len);

        let from = match from.as_socket() {
            Some(SocketAddr::V4(addr)) => *addr.ip(),
            _ => Ipv4Addr::UNSPECIFIED,
        };
        Ok(Received::Datagram { len, from })
    }
}

/// SO_RCVTIMEO expiry shows up as WouldBlock or TimedOut depending on
/// platform; an interrupting signal (Ctrl-C) ends the wait the same way.
fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
