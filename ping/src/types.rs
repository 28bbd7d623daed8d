//! Core Types for the diagnostic engines

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::packet::ICMP_PAYLOAD_SIZE;

/// Default number of echo requests per ping run
pub const DEFAULT_PING_COUNT: u16 = 4;

/// Default traceroute hop limit
pub const DEFAULT_MAX_HOPS: u8 = 30;

/// Default probes per traceroute hop
pub const DEFAULT_MAX_QUERIES: u16 = 3;

/// Echo identifier for this process
///
/// Constant for the lifetime of a run so replies can be correlated.
pub fn process_identifier() -> u16 {
    (std::process::id() & 0xFFFF) as u16
}

/// A resolved destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Text the user asked for
    pub name: String,
    pub addr: Ipv4Addr,
}

impl Target {
    pub fn new(name: impl Into<String>, addr: Ipv4Addr) -> Self {
        Self {
            name: name.into(),
            addr,
        }
    }
}

/// Ping configuration
#[derive(Debug, Clone, Copy)]
pub struct PingConfig {
    /// Number of echo requests; zero selects the default
    pub count: u16,
    /// Time to wait for each reply
    pub timeout: Duration,
    /// Delay after each probe
    pub interval: Duration,
    /// Payload size (bytes, excluding the ICMP header)
    pub payload_size: usize,
    /// Echo identifier shared by every request of the run
    pub identifier: u16,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_PING_COUNT,
            timeout: Duration::from_secs(2),
            interval: Duration::from_millis(1000),
            payload_size: ICMP_PAYLOAD_SIZE,
            identifier: process_identifier(),
        }
    }
}

impl PingConfig {
    /// Count with the zero-means-default rule applied
    pub const fn effective_count(&self) -> u16 {
        if self.count == 0 {
            DEFAULT_PING_COUNT
        } else {
            self.count
        }
    }

    /// Size of each echo request on the wire (ICMP header + payload)
    pub const fn packet_size(&self) -> usize {
        8 + self.payload_size
    }
}

/// Traceroute configuration
#[derive(Debug, Clone, Copy)]
pub struct TraceConfig {
    /// Highest TTL probed; zero selects the default
    pub max_hops: u8,
    /// Probes per TTL; zero selects the default
    pub max_queries: u16,
    /// Time to wait for each probe
    pub timeout: Duration,
    pub payload_size: usize,
    /// Reverse-resolve hop addresses
    pub resolve_hostnames: bool,
    pub identifier: u16,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            max_queries: DEFAULT_MAX_QUERIES,
            timeout: Duration::from_secs(1),
            payload_size: ICMP_PAYLOAD_SIZE,
            resolve_hostnames: true,
            identifier: process_identifier(),
        }
    }
}

impl TraceConfig {
    pub const fn effective_max_hops(&self) -> u8 {
        if self.max_hops == 0 {
            DEFAULT_MAX_HOPS
        } else {
            self.max_hops
        }
    }

    pub const fn effective_max_queries(&self) -> u16 {
        if self.max_queries == 0 {
            DEFAULT_MAX_QUERIES
        } else {
            self.max_queries
        }
    }

    pub const fn packet_size(&self) -> usize {
        8 + self.payload_size
    }
}

/// Outcome class of one send/receive exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    /// Echo reply from the destination
    Echoed,
    /// Destination unreachable with its sub-code
    Unreachable { code: u8 },
    /// No reply within the timeout
    TimedOut,
    /// Anything else, time exceeded included
    Other { icmp_type: u8, code: u8 },
}

/// Result of a single probe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeResult {
    pub kind: ProbeKind,
    pub sequence: u16,
    /// Round-trip time in milliseconds
    pub rtt_ms: Option<f64>,
    pub responder: Option<Ipv4Addr>,
    /// TTL from the reply's IP header
    pub reply_ttl: Option<u8>,
    /// Identifier carried by the reply
    pub identifier: Option<u16>,
}

impl ProbeResult {
    /// Create timeout result
    pub const fn timeout(sequence: u16) -> Self {
        Self {
            kind: ProbeKind::TimedOut,
            sequence,
            rtt_ms: None,
            responder: None,
            reply_ttl: None,
            identifier: None,
        }
    }
}

/// Statistics from a ping sequence
///
/// Only counts and raw samples are stored; every derived value is computed
/// from the samples when asked for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PingStats {
    /// Total packets sent
    pub transmitted: u32,
    /// Echo replies received
    pub received: u32,
    /// Round-trip times in milliseconds, in arrival order
    pub rtt_samples: Vec<f64>,
}

impl PingStats {
    pub const fn new() -> Self {
        Self {
            transmitted: 0,
            received: 0,
            rtt_samples: Vec::new(),
        }
    }

    /// Record a sent packet
    pub fn record_sent(&mut self) {
        self.transmitted = self.transmitted.saturating_add(1);
    }

    /// Record an echo reply
    pub fn record_reply(&mut self, rtt_ms: f64) {
        self.received = self.received.saturating_add(1);
        self.rtt_samples.push(rtt_ms);
    }

    /// Packet loss percentage, `ceil(100 - received / transmitted * 100)`
    ///
    /// The ratio is taken in floating point before scaling, so a ratio that
    /// is not exact in binary can round the loss up (29 of 100 gives 72).
    /// Nothing transmitted means nothing lost.
    pub fn loss_percent(&self) -> u32 {
        if self.transmitted == 0 {
            return 0;
        }
        let ratio = self.received as f64 / self.transmitted as f64;
        (100.0 - ratio * 100.0).ceil().max(0.0) as u32
    }

    /// Check if any connectivity exists
    pub fn has_connectivity(&self) -> bool {
        self.received > 0
    }

    /// min/avg/max/mdev over the collected samples
    pub fn summary(&self) -> Result<RttSummary> {
        RttSummary::from_samples(&self.rtt_samples)
    }

    /// Reset statistics
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Round-trip time summary in milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RttSummary {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    /// Mean absolute deviation from the mean
    pub mdev: f64,
}

impl RttSummary {
    pub fn from_samples(samples: &[f64]) -> Result<Self> {
        if samples.is_empty() {
            return Err(Error::NoRttSamples);
        }

        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = mean(samples);
        let mdev = samples.iter().map(|s| (s - mean).abs()).sum::<f64>() / samples.len() as f64;

        // Rounding in the mean can push it a hair outside [min, max]
        Ok(Self {
            min,
            mean: mean.clamp(min, max),
            max,
            mdev,
        })
    }
}

impl fmt::Display for RttSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rtt min/avg/max/mdev = {:.3}/{:.3}/{:.3}/{:.3} ms",
            self.min, self.mean, self.max, self.mdev
        )
    }
}

fn mean(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_config() {
        let config = PingConfig::default();
        assert_eq!(config.packet_size(), 64);
        assert_eq!(config.effective_count(), 4);

        let zero = PingConfig { count: 0, ..config };
        assert_eq!(zero.effective_count(), DEFAULT_PING_COUNT);
    }

    #[test]
    fn test_trace_config_defaults() {
        let config = TraceConfig {
            max_hops: 0,
            max_queries: 0,
            ..TraceConfig::default()
        };
        assert_eq!(config.effective_max_hops(), 30);
        assert_eq!(config.effective_max_queries(), 3);
        assert_eq!(config.packet_size(), 64);
    }

    #[test]
    fn test_ping_stats() {
        let mut stats = PingStats::new();

        stats.record_sent();
        stats.record_reply(10.0);
        stats.record_sent();
        stats.record_reply(20.0);
        stats.record_sent();

        assert_eq!(stats.transmitted, 3);
        assert_eq!(stats.received, 2);
        assert_eq!(stats.rtt_samples, vec![10.0, 20.0]);
        assert_eq!(stats.loss_percent(), 34);
        assert!(stats.has_connectivity());

        let summary = stats.summary().unwrap();
        assert_eq!(summary.min, 10.0);
        assert_eq!(summary.mean, 15.0);
        assert_eq!(summary.max, 20.0);
        assert_eq!(summary.mdev, 5.0);

        stats.reset();
        assert_eq!(stats, PingStats::new());
    }

    #[test]
    fn test_loss_percent_edges() {
        let mut stats = PingStats::new();
        assert_eq!(stats.loss_percent(), 0);

        for _ in 0..4 {
            stats.record_sent();
        }
        assert_eq!(stats.loss_percent(), 100);

        for _ in 0..4 {
            stats.record_reply(1.0);
        }
        assert_eq!(stats.loss_percent(), 0);
    }

    #[test]
    fn test_loss_percent_ratio_first() {
        // 0.29 * 100 is 28.999..., so the ceiling lands on 72
        let stats = PingStats {
            transmitted: 100,
            received: 29,
            rtt_samples: Vec::new(),
        };
        assert_eq!(stats.loss_percent(), 72);

        let half = PingStats {
            transmitted: 2,
            received: 1,
            rtt_samples: Vec::new(),
        };
        assert_eq!(half.loss_percent(), 50);
    }

    #[test]
    fn test_summary_empty_is_error() {
        assert!(matches!(PingStats::new().summary(), Err(Error::NoRttSamples)));
    }

    #[test]
    fn test_summary_single_sample() {
        let summary = RttSummary::from_samples(&[0.042]).unwrap();
        assert_eq!(summary.min, summary.mean);
        assert_eq!(summary.mean, summary.max);
        assert_eq!(summary.mdev, 0.0);
    }

    #[test]
    fn test_summary_ordering_holds() {
        let sets: [&[f64]; 4] = [
            &[0.1, 0.1, 0.1],
            &[5.0, 0.3, 12.7, 0.9],
            &[1e-3, 1e3],
            &[0.1 + 0.2, 0.3, 0.30000000000000004],
        ];
        for samples in sets {
            let s = RttSummary::from_samples(samples).unwrap();
            assert!(s.min <= s.mean && s.mean <= s.max, "{:?}", samples);
            assert!(s.mdev >= 0.0);
        }
    }

    #[test]
    fn test_summary_display() {
        let summary = RttSummary::from_samples(&[1.0, 3.0]).unwrap();
        assert_eq!(
            summary.to_string(),
            "rtt min/avg/max/mdev = 1.000/2.000/3.000/1.000 ms"
        );
    }
}
