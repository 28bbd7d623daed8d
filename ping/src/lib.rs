//! ICMP Diagnostic Engine
//!
//! Echo-based reachability testing (ping) and TTL-escalation path discovery
//! (traceroute) over IPv4 raw sockets.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Diagnostic Engine Structure                  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌────────────┐  ┌────────────┐                                │
//! │  │   Pinger   │  │   Tracer   │   engines: loops, timing,      │
//! │  │ seq 1..N   │  │ ttl 1..H   │   correlation, termination     │
//! │  └─────┬──────┘  └─────┬──────┘                                │
//! │        └───────┬───────┘                                        │
//! │  ┌─────────────┴──┐  ┌────────────┐  ┌────────────┐            │
//! │  │   Transport    │  │   Packet   │  │  Checksum  │            │
//! │  │  RawSocket     │  │  encode    │  │  RFC 1071  │            │
//! │  │  ttl, timeout  │  │  decode    │  │            │            │
//! │  └────────────────┘  └────────────┘  └────────────┘            │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use ntool_ping::{resolve, PingConfig, Pinger, RawSocket};
//!
//! let target = resolve("127.0.0.1")?;
//! let config = PingConfig { count: 1, ..PingConfig::default() };
//! let socket = RawSocket::icmpv4(config.timeout)?;
//!
//! let mut pinger = Pinger::new(config, socket);
//! let report = pinger.run(&target, &mut std::io::stdout())?;
//! println!("{}", report.summary()?);
//! # Ok::<(), ntool_ping::Error>(())
//! ```

mod cancel;
mod checksum;
mod error;
mod hexdump;
mod packet;
mod pinger;
mod probe;
mod resolve;
mod socket;
mod traceroute;
mod types;

pub use cancel::CancelToken;
pub use checksum::{calculate_checksum, fill_checksum, verify_checksum};
pub use error::{Error, Result};
pub use hexdump::hexdump;
pub use packet::{
    decode, encode_echo_request, filler_payload, unreach_description, unreach_marker,
    DecodedPacket, IcmpHeader, IcmpPacket, IcmpType, Ipv4Header, ICMP_HEADER_SIZE,
    ICMP_PACKET_SIZE, ICMP_PAYLOAD_SIZE, ICMP_PROTOCOL, IP_HEADER_SIZE,
};
pub use pinger::{PingOutcome, PingReport, Pinger};
pub use resolve::{hostname, resolve};
pub use socket::{RawSocket, Received, Transport};
pub use traceroute::{Hop, TraceOutcome, TraceReport, Tracer};
pub use types::{
    process_identifier, PingConfig, PingStats, ProbeKind, ProbeResult, RttSummary, Target,
    TraceConfig, DEFAULT_MAX_HOPS, DEFAULT_MAX_QUERIES, DEFAULT_PING_COUNT,
};
