//! Traceroute - TTL-escalation path discovery
//!
//! # States
//! Idle → HopLoop(ttl = 1..max_hops) → Done(reached | exhausted)
//!
//! Each TTL gets up to `max_queries` echo requests. The first timeout ends
//! the TTL and marks the remaining queries with `*`.

use std::io::Write;
use std::net::Ipv4Addr;

use log::{debug, info};

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::packet::{unreach_marker, IcmpPacket};
use crate::probe::{exchange, RECV_BUFFER_SIZE};
use crate::resolve;
use crate::socket::Transport;
use crate::types::{ProbeKind, ProbeResult, Target, TraceConfig};

/// Why the hop loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOutcome {
    /// The destination answered, or a reply came from its address
    Reached,
    /// The first responder of a TTL repeated the previous TTL's responder
    ///
    /// Counted as arrival even when that address is not the destination;
    /// a router that answers for two consecutive TTLs ends the trace.
    Stabilized,
    /// Every TTL up to `max_hops` was probed
    Exhausted,
    /// Interrupted between probes
    Cancelled,
}

impl TraceOutcome {
    pub const fn is_reached(&self) -> bool {
        matches!(self, Self::Reached | Self::Stabilized)
    }
}

/// One printed hop line
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    pub ttl: u8,
    /// First responder at this TTL
    pub responder: Option<Ipv4Addr>,
    pub hostname: Option<String>,
    /// Every query, timeouts included
    pub probes: Vec<ProbeResult>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceReport {
    pub hops: Vec<Hop>,
    pub outcome: TraceOutcome,
}

/// Path discovery engine
#[derive(Debug)]
pub struct Tracer<T: Transport> {
    config: TraceConfig,
    transport: T,
    cancel: CancelToken,
    buffer: Vec<u8>,
}

impl<T: Transport> Tracer<T> {
    pub fn new(config: TraceConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            cancel: CancelToken::new(),
            buffer: vec![0; RECV_BUFFER_SIZE],
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send one probe at whatever TTL the transport currently uses
    pub fn probe(&mut self, dest: Ipv4Addr, sequence: u16) -> Result<ProbeResult> {
        let packet = IcmpPacket::echo_request(
            self.config.identifier,
            sequence,
            self.config.payload_size,
        );
        exchange(
            &mut self.transport,
            &mut self.buffer,
            dest,
            &packet,
            self.config.timeout,
        )
    }

    /// Trace the route to `target`, one line per hop on `out`
    pub fn run<W: Write>(&mut self, target: &Target, out: &mut W) -> Result<TraceReport> {
        let max_hops = self.config.effective_max_hops();
        let max_queries = self.config.effective_max_queries();
        info!("tracing {} ({}), {} hops max", target.name, target.addr, max_hops);
        self.transport.set_receive_timeout(self.config.timeout)?;

        writeln!(
            out,
            "traceroute to {} ({}), {} hops max, {} byte packets",
            target.name,
            target.addr,
            max_hops,
            self.config.packet_size()
        )?;

        let mut hops = Vec::new();
        let mut previous: Option<Ipv4Addr> = None;
        let mut outcome = TraceOutcome::Exhausted;

        for ttl in 1..=max_hops {
            if self.cancel.is_cancelled() {
                outcome = TraceOutcome::Cancelled;
                break;
            }
            self.transport.set_ttl(ttl as u32)?;

            let mut hop = Hop {
                ttl,
                responder: None,
                hostname: None,
                probes: Vec::with_capacity(max_queries as usize),
            };
            let mut line = format!("{:>2} ", ttl);
            let mut reached = false;
            let mut stabilized = false;

            for query in 1..=max_queries {
                if self.cancel.is_cancelled() {
                    break;
                }

                let result = self.probe(target.addr, query)?;
                let (responder, rtt) = match (result.responder, result.rtt_ms) {
                    (Some(responder), Some(rtt)) => (responder, rtt),
                    _ => {
                        for sequence in query..=max_queries {
                            line.push_str(" *");
                            hop.probes.push(ProbeResult::timeout(sequence));
                        }
                        break;
                    }
                };

                if query == 1 {
                    if previous == Some(responder) {
                        debug!("ttl {}: {} answered again, stopping", ttl, responder);
                        stabilized = true;
                        break;
                    }
                    let name = self.display_name(responder);
                    line.push_str(&format!(" {} ({})", name, responder));
                    hop.responder = Some(responder);
                    hop.hostname = Some(name);
                }

                line.push_str(&format!("  {:.3} ms", rtt));
                if let ProbeKind::Unreachable { code } = result.kind {
                    let marker = unreach_marker(code);
                    if !marker.is_empty() {
                        line.push(' ');
                        line.push_str(marker);
                    }
                }

                if responder == target.addr || result.kind == ProbeKind::Echoed {
                    reached = true;
                }
                previous = Some(responder);
                hop.probes.push(result);
            }

            if stabilized {
                outcome = TraceOutcome::Stabilized;
                break;
            }

            writeln!(out, "{}", line)?;
            hops.push(hop);

            if reached {
                outcome = TraceOutcome::Reached;
                break;
            }
            if self.cancel.is_cancelled() {
                outcome = TraceOutcome::Cancelled;
                break;
            }
        }

        debug!("trace finished after {} hops: {:?}", hops.len(), outcome);
        Ok(TraceReport { hops, outcome })
    }

    fn display_name(&self, addr: Ipv4Addr) -> String {
        if self.config.resolve_hostnames {
            if let Some(name) = resolve::hostname(addr) {
                return name;
            }
        }
        addr.to_string()
    }
}
