//! Pinger - echo-based reachability testing
//!
//! # States
//! Idle → Probing(seq = 1..N) → Summarizing → Done
//!
//! Resolution happens before the engine is built; the transport is owned by
//! the engine and released when the engine is dropped, whichever way the
//! run ended.

use std::io::Write;
use std::net::Ipv4Addr;

use log::{debug, error, info};

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::packet::{unreach_description, IcmpPacket};
use crate::probe::{exchange, RECV_BUFFER_SIZE};
use crate::socket::Transport;
use crate::types::{PingConfig, PingStats, ProbeKind, ProbeResult, RttSummary, Target};

/// Why the probing loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingOutcome {
    /// Every requested probe was sent
    Completed,
    /// Destination unreachable ended the run early
    Unreachable { code: u8 },
    /// Interrupted between probes
    Cancelled,
}

/// Everything a finished run produced
#[derive(Debug, Clone, PartialEq)]
pub struct PingReport {
    pub stats: PingStats,
    pub outcome: PingOutcome,
}

impl PingReport {
    pub fn summary(&self) -> Result<RttSummary> {
        self.stats.summary()
    }
}

/// Stateful pinger for sending/receiving ICMP echo requests
#[derive(Debug)]
pub struct Pinger<T: Transport> {
    config: PingConfig,
    transport: T,
    cancel: CancelToken,
    stats: PingStats,
    buffer: Vec<u8>,
}

impl<T: Transport> Pinger<T> {
    /// Create a pinger that owns `transport`
    pub fn new(config: PingConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            cancel: CancelToken::new(),
            stats: PingStats::new(),
            buffer: vec![0; RECV_BUFFER_SIZE],
        }
    }

    /// Poll `cancel` between probes
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Statistics of the current (or last) run
    pub fn stats(&self) -> &PingStats {
        &self.stats
    }

    /// Give the transport back, e.g. to inspect a test double
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// One echo request/reply exchange
    ///
    /// Updates the running statistics; a timeout is a normal outcome.
    pub fn probe(&mut self, dest: Ipv4Addr, sequence: u16) -> Result<ProbeResult> {
        let packet = IcmpPacket::echo_request(
            self.config.identifier,
            sequence,
            self.config.payload_size,
        );

        let result = exchange(
            &mut self.transport,
            &mut self.buffer,
            dest,
            &packet,
            self.config.timeout,
        )?;

        self.stats.record_sent();
        if let (ProbeKind::Echoed, Some(rtt)) = (result.kind, result.rtt_ms) {
            self.stats.record_reply(rtt);
        }
        Ok(result)
    }

    /// Ping `target`, writing one line per probe and the summary to `out`
    ///
    /// Statistics start from zero on every call. Only transport failures
    /// are errors; an empty sample set is reported in the output and left
    /// for the caller to check through [`PingReport::summary`].
    pub fn run<W: Write>(&mut self, target: &Target, out: &mut W) -> Result<PingReport> {
        self.stats.reset();
        self.transport.set_receive_timeout(self.config.timeout)?;

        let count = self.config.effective_count();
        let size = self.config.packet_size();
        info!("pinging {} ({}) {} times", target.name, target.addr, count);

        writeln!(
            out,
            "Pinging {} [{}] with {} bytes of data:",
            target.name, target.addr, size
        )?;

        let mut outcome = PingOutcome::Completed;
        for sequence in 1..=count {
            if self.cancel.is_cancelled() {
                outcome = PingOutcome::Cancelled;
                break;
            }

            let result = self.probe(target.addr, sequence)?;
            let from = result.responder.unwrap_or(target.addr);

            match result.kind {
                ProbeKind::Echoed => writeln!(
                    out,
                    "{} bytes from {}: icmp_seq={} ttl={} rtt={:.3} ms",
                    size,
                    from,
                    sequence,
                    result.reply_ttl.unwrap_or(0),
                    result.rtt_ms.unwrap_or(0.0)
                )?,
                ProbeKind::Unreachable { code } => {
                    let reason = match unreach_description(code) {
                        Ok(reason) => reason.to_string(),
                        Err(e) => {
                            error!("{} from {}", e, from);
                            e.to_string()
                        }
                    };
                    writeln!(out, "From {}: icmp_seq={} {}", from, sequence, reason)?;
                    outcome = PingOutcome::Unreachable { code };
                    break;
                }
                ProbeKind::TimedOut => {
                    if self.cancel.is_cancelled() {
                        outcome = PingOutcome::Cancelled;
                        break;
                    }
                    writeln!(out, "From {}: icmp_seq={} no reply", target.addr, sequence)?;
                }
                ProbeKind::Other { icmp_type, code } => writeln!(
                    out,
                    "Received ICMP packet [type: {} code: {} id: {}]",
                    icmp_type,
                    code,
                    result.identifier.unwrap_or(0)
                )?,
            }

            if !self.cancel.sleep(self.config.interval) {
                outcome = PingOutcome::Cancelled;
                break;
            }
        }

        debug!("probing stopped: {:?}", outcome);
        self.summarize(target, out)?;

        Ok(PingReport {
            stats: self.stats.clone(),
            outcome,
        })
    }

    /// Write the statistics block for the current run
    fn summarize<W: Write>(&self, target: &Target, out: &mut W) -> Result<()> {
        writeln!(out)?;
        writeln!(out, "--- {} ping statistics ---", target.addr)?;
        writeln!(
            out,
            "{} packets transmitted, {} received, {}% packet loss",
            self.stats.transmitted,
            self.stats.received,
            self.stats.loss_percent()
        )?;

        match self.stats.summary() {
            Ok(summary) => writeln!(out, "{}", summary)?,
            Err(e) => {
                error!("no statistics for {}: {}", target.addr, e);
                writeln!(out, "ntool: ping: {}", e)?;
            }
        }
        Ok(())
    }
}
