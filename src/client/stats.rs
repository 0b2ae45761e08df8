//! Session statistics.
//!
//! All accumulation is in integer microseconds. Conversion to fractional
//! milliseconds happens only when a summary is displayed.

use crate::runtime::clock::micros_to_millis;

/// Running RTT statistics for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    count: u64,
    lost: u64,
    min: u64,
    max: u64,
    sum: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful probe.
    pub fn record_rtt(&mut self, rtt_us: u64) {
        if self.count == 0 {
            self.min = rtt_us;
            self.max = rtt_us;
        } else {
            self.min = self.min.min(rtt_us);
            self.max = self.max.max(rtt_us);
        }
        self.count += 1;
        self.sum = self.sum.saturating_add(rtt_us);
    }

    /// Record a probe that got no reply.
    pub fn record_loss(&mut self) {
        self.lost += 1;
    }

    /// Successful probes.
    pub fn received(&self) -> u64 {
        self.count
    }

    pub fn lost(&self) -> u64 {
        self.lost
    }

    /// Probes sent, answered or not.
    pub fn transmitted(&self) -> u64 {
        self.count + self.lost
    }

    /// Final figures, or `None` when no probe succeeded.
    pub fn summary(&self) -> Option<Summary> {
        if self.count == 0 {
            return None;
        }

        let transmitted = self.transmitted();
        Some(Summary {
            transmitted,
            received: self.count,
            lost: self.lost,
            loss_percent: 100.0 * self.lost as f64 / transmitted as f64,
            min_us: self.min,
            avg_us: self.sum / self.count,
            max_us: self.max,
        })
    }
}

/// Aggregate result of a session with at least one successful probe.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub transmitted: u64,
    pub received: u64,
    pub lost: u64,
    pub loss_percent: f64,
    pub min_us: u64,
    pub avg_us: u64,
    pub max_us: u64,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} packets transmitted, {} received, {} lost, {:.1}% packet loss",
            self.transmitted, self.received, self.lost, self.loss_percent
        )?;
        write!(
            f,
            "rtt min/avg/max = {:.3}/{:.3}/{:.3} ms",
            micros_to_millis(self.min_us),
            micros_to_millis(self.avg_us),
            micros_to_millis(self.max_us)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_successful_probes() {
        let mut stats = SessionStats::new();
        assert!(stats.summary().is_none());

        stats.record_loss();
        assert_eq!(stats.transmitted(), 1);
        assert!(stats.summary().is_none());
    }

    #[test]
    fn test_min_avg_max() {
        let mut stats = SessionStats::new();
        for rtt in [1500, 700, 2300, 900] {
            stats.record_rtt(rtt);
        }

        let summary = stats.summary().unwrap();
        assert_eq!(summary.min_us, 700);
        assert_eq!(summary.max_us, 2300);
        assert_eq!(summary.avg_us, (1500 + 700 + 2300 + 900) / 4);
        assert!(summary.min_us <= summary.avg_us && summary.avg_us <= summary.max_us);
    }

    #[test]
    fn test_first_sample_sets_min() {
        let mut stats = SessionStats::new();
        stats.record_rtt(5_000_000);
        let summary = stats.summary().unwrap();
        assert_eq!(summary.min_us, 5_000_000);
        assert_eq!(summary.max_us, 5_000_000);
    }

    #[test]
    fn test_loss_rate() {
        let mut stats = SessionStats::new();
        stats.record_rtt(100);
        stats.record_rtt(200);
        stats.record_rtt(300);
        stats.record_loss();

        let summary = stats.summary().unwrap();
        assert_eq!(summary.transmitted, 4);
        assert_eq!(summary.received, 3);
        assert_eq!(summary.lost, 1);
        assert_eq!(summary.loss_percent, 25.0);
    }

    #[test]
    fn test_summary_display() {
        let mut stats = SessionStats::new();
        stats.record_rtt(1234);
        stats.record_rtt(2000);

        let text = stats.summary().unwrap().to_string();
        assert_eq!(
            text,
            "2 packets transmitted, 2 received, 0 lost, 0.0% packet loss\n\
             rtt min/avg/max = 1.234/1.617/2.000 ms"
        );
    }
}
