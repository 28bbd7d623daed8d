//! ICMP Packet Building and Parsing
//!
//! Echo requests are laid out field by field in network byte order. Raw
//! IPv4 sockets deliver the IP header in front of every ICMP message, so
//! decoding starts by reading the variable header length before locating
//! the ICMP header.

use std::net::Ipv4Addr;

use crate::checksum::fill_checksum;
use crate::error::{Error, Result};

/// ICMP protocol number in IP header
pub const ICMP_PROTOCOL: u8 = 1;

/// Minimum IP header size
pub const IP_HEADER_SIZE: usize = 20;

/// ICMP header size
pub const ICMP_HEADER_SIZE: usize = 8;

/// Default ICMP payload size
pub const ICMP_PAYLOAD_SIZE: usize = 56;

/// Default ICMP packet size (header + payload)
pub const ICMP_PACKET_SIZE: usize = ICMP_HEADER_SIZE + ICMP_PAYLOAD_SIZE;

/// Offset of the checksum inside the ICMP header
const CHECKSUM_OFFSET: usize = 2;

/// ICMP message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IcmpType {
    /// Echo Reply (type 0)
    EchoReply = 0,
    /// Destination Unreachable (type 3)
    DestUnreachable = 3,
    /// Echo Request (type 8) - ping
    EchoRequest = 8,
    /// Time Exceeded (type 11)
    TimeExceeded = 11,
}

impl IcmpType {
    /// Parse from byte value
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::EchoReply),
            3 => Some(Self::DestUnreachable),
            8 => Some(Self::EchoRequest),
            11 => Some(Self::TimeExceeded),
            _ => None,
        }
    }
}

const UNREACH_TABLE: [&str; 16] = [
    "Destination network unreachable",
    "Destination host unreachable",
    "Destination protocol unreachable",
    "Destination port unreachable",
    "Fragmentation required, and DF flag set",
    "Source route failed",
    "Destination network unknown",
    "Destination host unknown",
    "Source host isolated",
    "Network administratively prohibited",
    "Host administratively prohibited",
    "Network unreachable for ToS",
    "Host unreachable for ToS",
    "Communication administratively prohibited",
    "Host Precedence Violation",
    "Precedence cutoff in effect",
];

/// Human-readable description of a destination unreachable sub-code
pub fn unreach_description(code: u8) -> Result<&'static str> {
    UNREACH_TABLE
        .get(code as usize)
        .copied()
        .ok_or(Error::UnknownUnreachableCode(code))
}

/// Short traceroute-style marker for a destination unreachable sub-code
pub const fn unreach_marker(code: u8) -> &'static str {
    match code {
        0 | 6 | 11 => "!N",
        1 | 7 | 12 => "!H",
        2 => "!P",
        3 => "",
        4 => "!F",
        5 => "!S",
        9 | 10 | 13 => "!X",
        14 => "!V",
        15 => "!C",
        _ => "!?",
    }
}

/// ICMP echo header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IcmpHeader {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
}

impl IcmpHeader {
    /// Echo request header with a zeroed checksum
    pub const fn echo_request(identifier: u16, sequence: u16) -> Self {
        Self {
            icmp_type: IcmpType::EchoRequest as u8,
            code: 0,
            checksum: 0,
            identifier,
            sequence,
        }
    }

    /// Known message type, if any
    pub const fn kind(&self) -> Option<IcmpType> {
        IcmpType::from_u8(self.icmp_type)
    }

    /// Write the header fields in network byte order
    fn write(&self, buffer: &mut [u8]) {
        buffer[0] = self.icmp_type;
        buffer[1] = self.code;
        buffer[2..4].copy_from_slice(&self.checksum.to_be_bytes());
        buffer[4..6].copy_from_slice(&self.identifier.to_be_bytes());
        buffer[6..8].copy_from_slice(&self.sequence.to_be_bytes());
    }

    /// Read the header from the start of `data`
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ICMP_HEADER_SIZE {
            return Err(Error::Malformed {
                len: data.len(),
                needed: ICMP_HEADER_SIZE,
            });
        }

        Ok(Self {
            icmp_type: data[0],
            code: data[1],
            checksum: u16::from_be_bytes([data[2], data[3]]),
            identifier: u16::from_be_bytes([data[4], data[5]]),
            sequence: u16::from_be_bytes([data[6], data[7]]),
        })
    }
}

/// Serialized echo request, ready to transmit
///
/// Once built the bytes are not mutated; a new sequence number means a new
/// packet with a freshly computed checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpPacket {
    bytes: Vec<u8>,
}

impl IcmpPacket {
    /// Build an echo request with the default filler payload
    pub fn echo_request(identifier: u16, sequence: u16, payload_size: usize) -> Self {
        encode_echo_request(identifier, sequence, &filler_payload(payload_size))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Header as it sits in the buffer, checksum included
    pub fn header(&self) -> IcmpHeader {
        // The buffer always starts with a full header
        IcmpHeader::parse(&self.bytes).unwrap_or_default()
    }
}

/// Deterministic printable ASCII filler
///
/// Receivers only rely on the payload length, never its content.
pub fn filler_payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| b'!' + (i % 94) as u8).collect()
}

/// Encode an ICMP echo request
///
/// Lays out the header with a zeroed checksum, appends the payload, then
/// stores the checksum computed over the whole buffer.
pub fn encode_echo_request(identifier: u16, sequence: u16, payload: &[u8]) -> IcmpPacket {
    let mut bytes = vec![0u8; ICMP_HEADER_SIZE + payload.len()];

    IcmpHeader::echo_request(identifier, sequence).write(&mut bytes);
    bytes[ICMP_HEADER_SIZE..].copy_from_slice(payload);
    fill_checksum(&mut bytes, CHECKSUM_OFFSET);

    IcmpPacket { bytes }
}

/// Fields of interest from an IPv4 header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    /// Header length in bytes (IHL * 4)
    pub header_len: usize,
    pub ttl: u8,
    pub protocol: u8,
    pub source: Ipv4Addr,
}

impl Ipv4Header {
    /// Parse the fixed part of an IPv4 header and its length field
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < IP_HEADER_SIZE {
            return Err(Error::Malformed {
                len: data.len(),
                needed: IP_HEADER_SIZE,
            });
        }

        let header_len = (data[0] & 0x0F) as usize * 4;
        if header_len < IP_HEADER_SIZE {
            return Err(Error::Malformed {
                len: data.len(),
                needed: IP_HEADER_SIZE,
            });
        }

        Ok(Self {
            header_len,
            ttl: data[8],
            protocol: data[9],
            source: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
        })
    }
}

/// A received IP datagram carrying an ICMP message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedPacket {
    pub ip: Ipv4Header,
    pub icmp: IcmpHeader,
    /// Echo header quoted inside an ICMP error message, if present
    pub quoted: Option<IcmpHeader>,
}

impl DecodedPacket {
    /// Reply TTL from the outer IP header
    pub const fn ttl(&self) -> u8 {
        self.ip.ttl
    }

    /// Identifier this message refers to
    ///
    /// Error messages refer to the quoted request; echo messages to
    /// themselves.
    pub fn echo_identifier(&self) -> Option<u16> {
        match self.icmp.kind() {
            Some(IcmpType::EchoReply) | Some(IcmpType::EchoRequest) => Some(self.icmp.identifier),
            _ => self.quoted.map(|q| q.identifier),
        }
    }
}

/// Decode an IP-prefixed ICMP datagram
///
/// Fails with [`Error::Malformed`] if the buffer ends before the ICMP header
/// the IP header length points at.
pub fn decode(data: &[u8]) -> Result<DecodedPacket> {
    let ip = Ipv4Header::parse(data)?;

    let needed = ip.header_len + ICMP_HEADER_SIZE;
    if data.len() < needed {
        return Err(Error::Malformed {
            len: data.len(),
            needed,
        });
    }

    let icmp = IcmpHeader::parse(&data[ip.header_len..])?;
    let quoted = match icmp.kind() {
        Some(IcmpType::DestUnreachable) | Some(IcmpType::TimeExceeded) => {
            decode_quoted(&data[needed..])
        }
        _ => None,
    };

    Ok(DecodedPacket { ip, icmp, quoted })
}

/// Parse the original IP header + first 8 bytes carried by an error message
fn decode_quoted(data: &[u8]) -> Option<IcmpHeader> {
    let ip = Ipv4Header::parse(data).ok()?;
    if ip.protocol != ICMP_PROTOCOL {
        return None;
    }
    let inner = IcmpHeader::parse(data.get(ip.header_len..)?).ok()?;
    (inner.kind() == Some(IcmpType::EchoRequest)).then_some(inner)
}
