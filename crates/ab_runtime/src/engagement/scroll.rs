use std::collections::BTreeSet;

/// One scroll observation: offset, document height and viewport height in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollSample {
    pub top: f64,
    pub height: f64,
    pub viewport: f64,
}

/// Scrolled percentage: 100 when content fits the viewport, else the clamped ratio.
pub fn scroll_percent(sample: ScrollSample) -> f64 {
    let scrollable = sample.height - sample.viewport;
    if scrollable <= 0.0 {
        return 100.0;
    }
    (sample.top / scrollable * 100.0).clamp(0.0, 100.0)
}

/// Running maximum depth and the milestones already reported.
#[derive(Debug)]
pub struct ScrollDepth {
    thresholds: Vec<u8>,
    fired: BTreeSet<u8>,
    max_pct: f64,
}

impl ScrollDepth {
    pub fn new(thresholds: &[u8]) -> Self {
        let mut thresholds = thresholds.to_vec();
        thresholds.sort_unstable();
        thresholds.dedup();
        Self {
            thresholds,
            fired: BTreeSet::new(),
            max_pct: 0.0,
        }
    }

    pub fn max_pct(&self) -> f64 {
        self.max_pct
    }

    /// Record a depth; returns every milestone reached for the first time, ascending.
    /// Milestones compare against the unrounded maximum.
    pub fn observe(&mut self, pct: f64) -> Vec<u8> {
        self.max_pct = self.max_pct.max(pct);
        let crossed: Vec<u8> = self
            .thresholds
            .iter()
            .copied()
            .filter(|threshold| f64::from(*threshold) <= self.max_pct && !self.fired.contains(threshold))
            .collect();
        self.fired.extend(crossed.iter().copied());
        crossed
    }
}

/// Holds the latest sample of a scroll burst until it has been quiet long enough.
#[derive(Debug, Default)]
pub struct ScrollDebouncer {
    pending: Option<(ScrollSample, u64)>,
}

impl ScrollDebouncer {
    pub fn push(&mut self, sample: ScrollSample, now_ms: u64) {
        self.pending = Some((sample, now_ms));
    }

    /// Latest sample once `quiet_ms` passed since it arrived.
    pub fn settle(&mut self, now_ms: u64, quiet_ms: u64) -> Option<ScrollSample> {
        let (sample, at) = self.pending?;
        if now_ms.saturating_sub(at) < quiet_ms {
            return None;
        }
        self.pending = None;
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(top: f64) -> ScrollSample {
        ScrollSample {
            top,
            height: 2_000.0,
            viewport: 1_000.0,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
    }

    #[test]
    fn percent_handles_short_pages_and_overscroll() {
        assert_close(scroll_percent(ScrollSample { top: 0.0, height: 500.0, viewport: 800.0 }), 100.0);
        assert_close(scroll_percent(sample(-40.0)), 0.0);
        assert_close(scroll_percent(sample(333.0)), 33.3);
        assert_close(scroll_percent(sample(1_500.0)), 100.0);
    }

    #[test]
    fn oscillation_fires_once_and_jumps_fire_together() {
        let mut depth = ScrollDepth::new(&[75, 25, 50]);
        // 24.5% would round to 25 but has not reached it
        assert!(depth.observe(scroll_percent(sample(245.0))).is_empty());
        assert_close(depth.max_pct(), 24.5);
        assert_eq!(depth.observe(30.0), vec![25]);
        assert!(depth.observe(10.0).is_empty());
        assert!(depth.observe(28.0).is_empty());
        assert_eq!(depth.observe(80.0), vec![50, 75]);
        assert_close(depth.max_pct(), 80.0);
    }

    #[test]
    fn milestone_needs_the_unrounded_maximum() {
        let mut depth = ScrollDepth::new(&[25, 50, 75]);
        assert_eq!(depth.observe(74.9), vec![25, 50]);
        assert!(depth.observe(74.99).is_empty());
        assert_eq!(depth.observe(75.0), vec![75]);
    }

    #[test]
    fn debouncer_keeps_latest_sample_until_quiet() {
        let mut debouncer = ScrollDebouncer::default();
        debouncer.push(sample(100.0), 1_000);
        debouncer.push(sample(400.0), 1_150);
        assert_eq!(debouncer.settle(1_300, 200), None);
        assert_eq!(debouncer.settle(1_350, 200), Some(sample(400.0)));
        assert_eq!(debouncer.settle(2_000, 200), None);
    }
}
