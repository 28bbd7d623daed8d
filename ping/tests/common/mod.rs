//! Common test utilities and a scripted transport

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::time::Duration;

use ntool_ping::{
    calculate_checksum, CancelToken, IcmpHeader, Received, Result, Transport,
    ICMP_HEADER_SIZE, ICMP_PROTOCOL,
};

/// What the scripted network does with the next receive
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum Step {
    /// Echo reply to the last request, from `from`
    Echo { from: Ipv4Addr, ttl: u8 },
    /// Time exceeded quoting the last request
    TimeExceeded { from: Ipv4Addr },
    /// Destination unreachable quoting the last request
    Unreachable { from: Ipv4Addr, code: u8 },
    /// Copy of our own request as a loopback raw socket delivers it
    OwnRequest { from: Ipv4Addr },
    /// Echo reply carrying someone else's identifier
    ForeignReply { from: Ipv4Addr },
    /// Some other ICMP message, nothing quoted
    Other { from: Ipv4Addr, icmp_type: u8, code: u8 },
    /// Too short to hold the ICMP header
    Truncated { from: Ipv4Addr },
    Timeout,
    /// Ctrl-C lands while the receive is blocked: cancel, then time out
    Interrupted(CancelToken),
}

/// In-memory transport that answers from a script
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    pub script: VecDeque<Step>,
    pub sent: Vec<(Vec<u8>, Ipv4Addr)>,
    pub ttls: Vec<u32>,
    pub timeouts: Vec<Duration>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Header of every request sent so far
    pub fn sent_headers(&self) -> Vec<IcmpHeader> {
        self.sent
            .iter()
            .map(|(bytes, _)| IcmpHeader::parse(bytes).expect("sent packet has a header"))
            .collect()
    }

    fn last_request(&self) -> &[u8] {
        &self.sent.last().expect("receive before any send").0
    }
}

/// IPv4 header + ICMP message
pub fn datagram(src: Ipv4Addr, ttl: u8, icmp: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0u8; 20];
    bytes[0] = 0x45;
    bytes[2..4].copy_from_slice(&((20 + icmp.len()) as u16).to_be_bytes());
    bytes[8] = ttl;
    bytes[9] = ICMP_PROTOCOL;
    bytes[12..16].copy_from_slice(&src.octets());
    bytes[16..20].copy_from_slice(&[10, 0, 0, 99]);
    bytes.extend_from_slice(icmp);
    bytes
}

/// ICMP message with header fields and a body, checksum filled in
pub fn icmp_message(icmp_type: u8, code: u8, rest: [u8; 4], body: &[u8]) -> Vec<u8> {
    let mut bytes = vec![icmp_type, code, 0, 0];
    bytes.extend_from_slice(&rest);
    bytes.extend_from_slice(body);
    let checksum = calculate_checksum(&bytes);
    bytes[2..4].copy_from_slice(&checksum.to_be_bytes());
    bytes
}

fn quote(request: &[u8]) -> Vec<u8> {
    datagram(Ipv4Addr::new(10, 0, 0, 99), 1, &request[..ICMP_HEADER_SIZE])
}

impl Transport for ScriptedTransport {
    fn set_receive_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.timeouts.push(timeout);
        Ok(())
    }

    fn set_ttl(&mut self, ttl: u32) -> Result<()> {
        self.ttls.push(ttl);
        Ok(())
    }

    fn send_to(&mut self, packet: &[u8], dest: Ipv4Addr) -> Result<usize> {
        self.sent.push((packet.to_vec(), dest));
        Ok(packet.len())
    }

    fn receive_from(&mut self, buf: &mut [u8]) -> Result<Received> {
        let step = self.script.pop_front().unwrap_or(Step::Timeout);
        let request = self.last_request().to_vec();
        let rest: [u8; 4] = request[4..8].try_into().unwrap();

        let (from, bytes) = match step {
            Step::Timeout => return Ok(Received::TimedOut),
            Step::Interrupted(cancel) => {
                cancel.cancel();
                return Ok(Received::TimedOut);
            }
            Step::Echo { from, ttl } => {
                (from, datagram(from, ttl, &icmp_message(0, 0, rest, &request[8..])))
            }
            Step::TimeExceeded { from } => {
                (from, datagram(from, 250, &icmp_message(11, 0, [0; 4], &quote(&request))))
            }
            Step::Unreachable { from, code } => {
                (from, datagram(from, 250, &icmp_message(3, code, [0; 4], &quote(&request))))
            }
            Step::OwnRequest { from } => (from, datagram(from, 64, &request)),
            Step::ForeignReply { from } => {
                let mut foreign = rest;
                foreign[0] ^= 0xFF;
                (from, datagram(from, 64, &icmp_message(0, 0, foreign, &request[8..])))
            }
            Step::Other { from, icmp_type, code } => {
                (from, datagram(from, 64, &icmp_message(icmp_type, code, rest, &[])))
            }
            Step::Truncated { from } => (from, datagram(from, 64, &[0, 0, 0])),
        };

        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(Received::Datagram {
            len: bytes.len(),
            from,
        })
    }
}
