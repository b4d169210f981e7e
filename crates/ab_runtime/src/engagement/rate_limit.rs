use core::time::Duration;

/// Fixed-window limiter for CTA click events.
#[derive(Debug)]
pub struct CtaRateLimiter {
    limit: u32,
    window_ms: u64,
    window_start: Option<u64>,
    count: u32,
}

impl CtaRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
            window_start: None,
            count: 0,
        }
    }

    /// Count an attempt at `now_ms`; false when the window is already full.
    /// A window ends once strictly more than `window_ms` has passed since it opened.
    pub fn allow(&mut self, now_ms: u64) -> bool {
        let expired = self
            .window_start
            .is_none_or(|start| now_ms.saturating_sub(start) > self.window_ms);
        if expired {
            self.window_start = Some(now_ms);
            self.count = 0;
        }
        if self.count >= self.limit {
            return false;
        }
        self.count += 1;
        true
    }
}
