use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

/// Upload throughput over a sliding time window.
///
/// Stores the running byte total at each sample, so the rate is the total's
/// growth between the oldest and newest sample still in the window.
pub struct ThroughputMeter {
    window: Duration,
    samples: Mutex<VecDeque<(Instant, u64)>>,
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl ThroughputMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: Mutex::new(VecDeque::new()),
        }
    }

    /// Records `bytes` sent since the previous sample.
    pub fn record(&self, bytes: u64) {
        self.record_at(Instant::now(), bytes);
    }

    fn record_at(&self, now: Instant, bytes: u64) {
        let mut samples = self.samples.lock().unwrap();
        let total = samples.back().map_or(0, |&(_, t)| t).saturating_add(bytes);
        samples.push_back((now, total));

        // Keep one sample older than the window as the rate baseline.
        if let Some(cutoff) = now.checked_sub(self.window) {
            while samples.len() > 2 && samples[1].0 <= cutoff {
                samples.pop_front();
            }
        }
    }

    /// Bytes per second, or 0.0 until two samples span a measurable time.
    pub fn bytes_per_second(&self) -> f64 {
        let samples = self.samples.lock().unwrap();
        let (Some(&(t0, c0)), Some(&(t1, c1))) = (samples.front(), samples.back()) else {
            return 0.0;
        };
        let elapsed = t1.duration_since(t0);
        if elapsed.is_zero() {
            return 0.0;
        }
        (c1 - c0) as f64 / elapsed.as_secs_f64()
    }
}
