//! Counter-to-rate conversion.
//!
//! Keeps the last raw value of every monotonically increasing counter,
//! keyed per domain, and turns each new observation into a per-interval
//! rate. A counter that goes backwards means the domain restarted: the
//! lower value becomes the new baseline and the rate for that step is 0.

use ahash::AHashMap as HashMap;
use std::time::Duration;

/// Process-wide store of counter baselines.
///
/// Owned by the scrape cycle and mutated from the scheduler thread only.
#[derive(Debug, Default)]
pub struct DerivativeEngine {
    last_values: HashMap<String, f64>,
}

impl DerivativeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `(new - old) / interval` for `key` and stores `new` as the
    /// baseline for the next call.
    ///
    /// The first observation of a key returns 0. A decreasing counter
    /// returns 0. Negative results are clamped to 0 unless `allow_negative`
    /// is set.
    pub fn derive(&mut self, key: &str, new: f64, interval: Duration, allow_negative: bool) -> f64 {
        let result = match self.last_values.get(key).copied() {
            Some(old) if new < old => 0.0,
            Some(old) => {
                let seconds = interval.as_secs_f64();
                if seconds > 0.0 {
                    let rate = (new - old) / seconds;
                    if rate < 0.0 && !allow_negative {
                        0.0
                    } else {
                        rate
                    }
                } else {
                    0.0
                }
            }
            None => 0.0,
        };

        self.last_values.insert(key.to_string(), new);
        result
    }

    /// Last recorded raw value for `key`.
    pub fn baseline(&self, key: &str) -> Option<f64> {
        self.last_values.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.last_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_values.is_empty()
    }
}
