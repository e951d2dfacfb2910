use tracing::debug;

/// Cumulative network counters summed over all interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetSnapshot {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    /// Unix time in seconds.
    pub captured_at: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetRates {
    pub sent_bytes_per_sec: f64,
    pub recv_bytes_per_sec: f64,
}

#[derive(Debug, Clone)]
pub struct RateCalculator {
    last: NetSnapshot,
}

impl RateCalculator {
    pub fn new(initial: NetSnapshot) -> Self {
        Self { last: initial }
    }

    /// Computes bytes/sec since the previous snapshot and stores `current` for the next call.
    pub fn advance(&mut self, current: NetSnapshot) -> NetRates {
        let previous = std::mem::replace(&mut self.last, current);
        let elapsed = current.captured_at - previous.captured_at;
        if !elapsed.is_finite() || elapsed <= 0.0 {
            debug!(elapsed, "нулевой или отрицательный интервал, скорость сети = 0");
            return NetRates::default();
        }

        if current.bytes_sent < previous.bytes_sent || current.bytes_recv < previous.bytes_recv {
            debug!(
                prev_sent = previous.bytes_sent,
                prev_recv = previous.bytes_recv,
                sent = current.bytes_sent,
                recv = current.bytes_recv,
                "счетчики сети сброшены"
            );
        }

        NetRates {
            sent_bytes_per_sec: current.bytes_sent.saturating_sub(previous.bytes_sent) as f64
                / elapsed,
            recv_bytes_per_sec: current.bytes_recv.saturating_sub(previous.bytes_recv) as f64
                / elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(sent: u64, recv: u64, at: f64) -> NetSnapshot {
        NetSnapshot {
            bytes_sent: sent,
            bytes_recv: recv,
            captured_at: at,
        }
    }

    #[test]
    fn bytes_per_second_from_two_snapshots() {
        let mut calc = RateCalculator::new(snap(1000, 2000, 0.0));
        let rates = calc.advance(snap(2000, 2500, 1.0));

        assert_eq!(rates.sent_bytes_per_sec, 1000.0);
        assert_eq!(rates.recv_bytes_per_sec, 500.0);
        assert_eq!(calc.last, snap(2000, 2500, 1.0));
    }

    #[test]
    fn zero_elapsed_yields_zero_rate_and_replaces_snapshot() {
        let mut calc = RateCalculator::new(snap(1000, 2000, 5.0));
        let rates = calc.advance(snap(5000, 9000, 5.0));

        assert_eq!(rates, NetRates::default());
        assert_eq!(calc.last.bytes_sent, 5000);

        let rates = calc.advance(snap(6000, 9000, 4.0));
        assert_eq!(rates, NetRates::default());
    }

    #[test]
    fn counter_reset_is_clamped_to_zero() {
        let mut calc = RateCalculator::new(snap(10_000, 20_000, 0.0));
        let rates = calc.advance(snap(100, 20_400, 2.0));

        assert_eq!(rates.sent_bytes_per_sec, 0.0);
        assert_eq!(rates.recv_bytes_per_sec, 200.0);
    }
}
