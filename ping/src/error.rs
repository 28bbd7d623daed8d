//! Diagnostic engine error types

use std::io;
use std::net::Ipv4Addr;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Raw socket could not be created (usually missing privilege)
    #[error("raw socket creation error: {0}")]
    SocketCreate(#[source] io::Error),
    /// A socket option (timeout, TTL) was rejected
    #[error("failed to set {option}: {source}")]
    SetOption {
        option: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("error sending ICMP packet to {dest}: {source}")]
    Send {
        dest: Ipv4Addr,
        #[source]
        source: io::Error,
    },
    /// Kernel accepted the call but reported nothing sent
    #[error("error sending ICMP packet to {dest}: {sent} bytes sent")]
    ShortSend { dest: Ipv4Addr, sent: usize },
    #[error("error receiving ICMP packet: {0}")]
    Receive(#[source] io::Error),
    /// Received datagram too short for the headers it claims to carry
    #[error("malformed packet: {len} bytes, need at least {needed}")]
    Malformed { len: usize, needed: usize },
    #[error("cannot resolve the target {0:?}")]
    Resolve(String),
    #[error("unknown destination unreachable sub-code {0}")]
    UnknownUnreachableCode(u8),
    /// Summary requested over an empty sample set
    #[error("round-trip time wasn't calculated: no replies received")]
    NoRttSamples,
    #[error("output error: {0}")]
    Output(#[from] io::Error),
}
