//! Live traffic and latency sampling: per-interface byte counters from the
//! OS, a TCP connect latency probe, and jitter over recent probes.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use sysinfo::Networks;
use tracing::debug;

/// Default latency probe target, a public resolver that answers TCP on 53.
pub const DEFAULT_PROBE_TARGET: &str = "8.8.8.8:53";

/// Upper bound on one latency probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

// One minute of history at the 1 Hz sampling cadence.
const HISTORY_LIMIT: usize = 60;

#[derive(Debug, Clone, Copy)]
pub struct TrafficSample {
    /// Cumulative bytes received since boot (or counter reset).
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    /// Bytes per second since the previous sample; zero on the first.
    pub rx_rate: f64,
    pub tx_rate: f64,
    pub latency_ms: Option<f64>,
}

/// Rolling view of one interface's byte counters, or of every interface
/// summed when none is named.
pub struct TrafficMonitor {
    networks: Networks,
    interface: Option<String>,
    last: Option<(Instant, u64, u64)>,
    history: Vec<TrafficSample>,
}

impl TrafficMonitor {
    pub fn new(interface: Option<String>) -> Self {
        TrafficMonitor {
            networks: Networks::new_with_refreshed_list(),
            interface,
            last: None,
            history: Vec::new(),
        }
    }

    /// Refreshes the counters and records one sample. The caller supplies
    /// the probed latency so that sampling itself never blocks.
    pub fn sample(&mut self, latency_ms: Option<f64>) -> TrafficSample {
        self.networks.refresh_list();
        let (rx_bytes, tx_bytes) = self.totals();
        let now = Instant::now();

        let (rx_rate, tx_rate) = match self.last {
            Some((at, rx_prev, tx_prev)) => {
                let elapsed = now.duration_since(at).as_secs_f64();
                if elapsed > 0.0 {
                    // A counter reset restarts the rate from the new value.
                    let rx = if rx_bytes >= rx_prev {
                        rx_bytes - rx_prev
                    } else {
                        rx_bytes
                    };
                    let tx = if tx_bytes >= tx_prev {
                        tx_bytes - tx_prev
                    } else {
                        tx_bytes
                    };
                    (rx as f64 / elapsed, tx as f64 / elapsed)
                } else {
                    (0.0, 0.0)
                }
            }
            None => (0.0, 0.0),
        };
        self.last = Some((now, rx_bytes, tx_bytes));

        let sample = TrafficSample {
            rx_bytes,
            tx_bytes,
            rx_rate,
            tx_rate,
            latency_ms,
        };
        if self.history.len() >= HISTORY_LIMIT {
            self.history.remove(0);
        }
        self.history.push(sample);
        sample
    }

    pub fn history(&self) -> &[TrafficSample] {
        &self.history
    }

    fn totals(&self) -> (u64, u64) {
        match &self.interface {
            Some(name) => self
                .networks
                .iter()
                .find(|(candidate, _)| candidate.as_str() == name.as_str())
                .map(|(_, data)| (data.total_received(), data.total_transmitted()))
                .unwrap_or((0, 0)),
            None => self.networks.iter().fold((0, 0), |(rx, tx), (_, data)| {
                (rx + data.total_received(), tx + data.total_transmitted())
            }),
        }
    }
}

/// TCP connect round-trip to `target`, in milliseconds. `None` when the
/// target is unreachable within `timeout` — unreachable is a measurement,
/// not an error.
pub fn probe_latency(target: &str, timeout: Duration) -> Option<f64> {
    let address = target.to_socket_addrs().ok()?.next()?;
    let started = Instant::now();
    match TcpStream::connect_timeout(&address, timeout) {
        Ok(_) => Some(started.elapsed().as_secs_f64() * 1000.0),
        Err(e) => {
            debug!("latency probe to {} failed: {}", target, e);
            None
        }
    }
}

/// Mean absolute difference between consecutive latency samples; zero when
/// fewer than two samples exist.
pub fn jitter(latencies_ms: &[f64]) -> f64 {
    if latencies_ms.len() < 2 {
        return 0.0;
    }
    let total: f64 = latencies_ms
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .sum();
    total / (latencies_ms.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_needs_two_samples() {
        assert_eq!(jitter(&[]), 0.0);
        assert_eq!(jitter(&[12.5]), 0.0);
    }

    #[test]
    fn jitter_is_the_mean_absolute_difference() {
        // |20-10| = 10, |15-20| = 5
        assert!((jitter(&[10.0, 20.0, 15.0]) - 7.5).abs() < f64::EPSILON);
        assert_eq!(jitter(&[5.0, 5.0, 5.0]), 0.0);
    }

    #[test]
    fn probe_of_unroutable_target_returns_none() {
        // reserved TEST-NET-1 address, nothing listens there
        let result = probe_latency("192.0.2.1:9", Duration::from_millis(50));
        assert!(result.is_none());
    }

    #[test]
    fn probe_of_unparseable_target_returns_none() {
        assert!(probe_latency("not an address", Duration::from_millis(50)).is_none());
    }

    #[test]
    fn sample_history_is_bounded() {
        let mut monitor = TrafficMonitor::new(None);
        for _ in 0..65 {
            monitor.sample(None);
        }
        assert_eq!(monitor.history().len(), 60);
    }

    #[test]
    fn unknown_interface_samples_zero_counters() {
        let mut monitor = TrafficMonitor::new(Some("nettrace-does-not-exist0".to_string()));
        let sample = monitor.sample(None);
        assert_eq!(sample.rx_bytes, 0);
        assert_eq!(sample.tx_bytes, 0);
    }
}
