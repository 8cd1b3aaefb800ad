/// Weighted running aggregate.
///
/// Each `update(den, num)` folds one sample into the weighted sums and tracks
/// the per-sample ratio `num / den` (integer division) in `min`/`max`. The
/// derived average is `sum_num / sum_den`, so timing gauges pass a weight of
/// one per sample and the throughput gauge passes milliseconds as the weight.
///
/// A gauge that was never updated renders as `-` everywhere.
#[derive(Debug, Clone, Copy)]
pub struct Avg {
    sum_den: u64,
    sum_num: u64,
    min: u64,
    max: u64,
    seen: bool,
}

impl Default for Avg {
    fn default() -> Self {
        Self {
            sum_den: 0,
            sum_num: 0,
            min: u64::MAX,
            max: u64::MIN,
            seen: false,
        }
    }
}

impl Avg {
    /// Fold one sample in. `den` must be non-zero; callers clamp.
    pub fn update(&mut self, den: u64, num: u64) {
        debug_assert!(den != 0, "Avg::update with zero weight");

        self.sum_den = self.sum_den.saturating_add(den);
        self.sum_num = self.sum_num.saturating_add(num);

        let sample = num / den;
        if sample > self.max {
            self.max = sample;
        }
        if sample < self.min {
            self.min = sample;
        }
        self.seen = true;
    }

    #[must_use]
    pub fn seen(&self) -> bool {
        self.seen
    }

    /// Weighted average, rendered: `-` before the first sample, `0` when the
    /// value sum is zero, saturated when only zero weights were folded in.
    #[must_use]
    pub fn value(&self) -> String {
        if !self.seen {
            return "-".to_string();
        }
        if self.sum_num == 0 {
            return "0".to_string();
        }
        if self.sum_den == 0 {
            return u64::MAX.to_string();
        }
        (self.sum_num / self.sum_den).to_string()
    }

    #[must_use]
    pub fn min(&self) -> String {
        if !self.seen {
            return "-".to_string();
        }
        self.min.to_string()
    }

    #[must_use]
    pub fn max(&self) -> String {
        if !self.seen {
            return "-".to_string();
        }
        self.max.to_string()
    }
}
