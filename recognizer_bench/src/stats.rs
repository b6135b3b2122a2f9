use std::fmt;

/// Running latency aggregates for one benchmark run.
#[derive(Debug, Clone)]
pub struct LatencyStats {
    max: i64,
    min: i64,
    sum: i64,
    count: u64,
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self {
            max: i64::MIN,
            min: i64::MAX,
            sum: 0,
            count: 0,
        }
    }
}

impl LatencyStats {
    pub fn record(&mut self, latency_ms: i64) {
        self.max = self.max.max(latency_ms);
        self.min = self.min.min(latency_ms);
        self.sum += latency_ms;
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// `None` until at least one sample was recorded.
    pub fn summary(&self) -> Option<LatencySummary> {
        if self.count == 0 {
            return None;
        }

        Some(LatencySummary {
            min_ms: self.min,
            max_ms: self.max,
            avg_ms: self.sum as f64 / self.count as f64,
            count: self.count,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub min_ms: i64,
    pub max_ms: i64,
    pub avg_ms: f64,
    pub count: u64,
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Max: {}, Min: {}, Avg: {:.2} over {} samples",
            self.max_ms, self.min_ms, self.avg_ms, self.count
        )
    }
}
