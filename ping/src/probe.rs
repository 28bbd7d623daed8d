//! One send/receive exchange, shared by both engines

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use log::{debug, log, trace, warn, Level};

use crate::error::Result;
use crate::hexdump::hexdump;
use crate::packet::{decode, DecodedPacket, IcmpPacket, IcmpType};
use crate::socket::{Received, Transport};
use crate::types::{ProbeKind, ProbeResult};

/// Large enough for a maximal IP header, an ICMP error and its quote
pub(crate) const RECV_BUFFER_SIZE: usize = 2048;

/// Does `packet` answer the echo request (`identifier`, `sequence`)?
///
/// Echo requests are never answers: on loopback the raw socket sees our
/// own outgoing request before the reply. Error messages are matched on the
/// request they quote; when nothing usable is quoted they are accepted.
pub(crate) fn correlates(packet: &DecodedPacket, identifier: u16, sequence: u16) -> bool {
    match packet.icmp.kind() {
        Some(IcmpType::EchoRequest) => false,
        Some(IcmpType::EchoReply) => {
            packet.icmp.identifier == identifier && packet.icmp.sequence == sequence
        }
        _ => match packet.quoted {
            Some(quoted) => quoted.identifier == identifier && quoted.sequence == sequence,
            None => true,
        },
    }
}

/// Log level for a datagram that does not answer the current probe
///
/// Raw sockets on loopback hand back every request we send, so our own
/// echo requests are routine. Anything else is unexpected traffic.
pub(crate) fn stray_level(packet: &DecodedPacket) -> Level {
    match packet.icmp.kind() {
        Some(IcmpType::EchoRequest) => Level::Debug,
        _ => Level::Warn,
    }
}

/// Map an accepted reply to its outcome class
pub(crate) fn classify(packet: &DecodedPacket) -> ProbeKind {
    match packet.icmp.kind() {
        Some(IcmpType::EchoReply) => ProbeKind::Echoed,
        Some(IcmpType::DestUnreachable) => ProbeKind::Unreachable {
            code: packet.icmp.code,
        },
        _ => ProbeKind::Other {
            icmp_type: packet.icmp.icmp_type,
            code: packet.icmp.code,
        },
    }
}

/// Send one echo request and wait for its answer
///
/// Stray datagrams (other processes' replies, our looped-back request,
/// malformed data) are logged and skipped while the timeout budget lasts.
/// After a stray the receive timeout is cut to what is left of the budget,
/// then put back to `timeout` before returning.
pub(crate) fn exchange<T: Transport>(
    transport: &mut T,
    buffer: &mut [u8],
    dest: Ipv4Addr,
    packet: &IcmpPacket,
    timeout: Duration,
) -> Result<ProbeResult> {
    let header = packet.header();
    trace!("echo request to {}:\n{}", dest, hexdump(packet.as_bytes()));

    transport.send_to(packet.as_bytes(), dest)?;
    let sent_at = Instant::now();
    debug!(
        "sent echo request id={} seq={} to {}",
        header.identifier, header.sequence, dest
    );

    let mut shortened = false;
    let result = loop {
        let (len, from) = match transport.receive_from(buffer)? {
            Received::TimedOut => {
                debug!("seq={} timed out", header.sequence);
                break ProbeResult::timeout(header.sequence);
            }
            Received::Datagram { len, from } => (len, from),
        };
        let rtt = sent_at.elapsed();
        let datagram = &buffer[..len];
        trace!("{} bytes from {}:\n{}", len, from, hexdump(datagram));

        match decode(datagram) {
            Ok(reply) if correlates(&reply, header.identifier, header.sequence) => {
                break ProbeResult {
                    kind: classify(&reply),
                    sequence: header.sequence,
                    rtt_ms: Some(rtt.as_secs_f64() * 1000.0),
                    responder: Some(responder(from, &reply)),
                    reply_ttl: Some(reply.ttl()),
                    identifier: reply.echo_identifier(),
                };
            }
            Ok(reply) => log!(
                stray_level(&reply),
                "skipping ICMP type {} id={} seq={} from {}",
                reply.icmp.icmp_type,
                reply.icmp.identifier,
                reply.icmp.sequence,
                from
            ),
            Err(e) => warn!("discarding datagram from {}: {}", from, e),
        }

        if rtt >= timeout {
            debug!("seq={} timed out among stray packets", header.sequence);
            break ProbeResult::timeout(header.sequence);
        }
        transport.set_receive_timeout(timeout - rtt)?;
        shortened = true;
    };

    if shortened {
        transport.set_receive_timeout(timeout)?;
    }
    Ok(result)
}

/// Sender address, falling back to the IP header when the socket gave none
fn responder(from: Ipv4Addr, reply: &DecodedPacket) -> Ipv4Addr {
    if from.is_unspecified() {
        reply.ip.source
    } else {
        from
    }
}
