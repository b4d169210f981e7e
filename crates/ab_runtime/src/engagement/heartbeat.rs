use core::time::Duration;

/// Heartbeat schedule that only counts time while the page is visible.
#[derive(Debug)]
pub struct Heartbeat {
    interval_ms: u64,
    last_tick_ms: u64,
    anchor_ms: u64,
    visible: bool,
}

impl Heartbeat {
    pub fn new(interval: Duration, now_ms: u64, visible: bool) -> Self {
        Self {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            last_tick_ms: now_ms,
            anchor_ms: now_ms,
            visible,
        }
    }

    /// Visibility changes restart both the visible-time anchor and the interval.
    pub fn set_visible(&mut self, visible: bool, now_ms: u64) {
        self.visible = visible;
        self.anchor_ms = now_ms;
        self.last_tick_ms = now_ms;
    }

    /// Rounded visible seconds since the previous beat, once an interval has elapsed.
    pub fn due(&mut self, now_ms: u64) -> Option<u64> {
        if !self.visible || now_ms.saturating_sub(self.last_tick_ms) < self.interval_ms {
            return None;
        }
        let visible_ms = now_ms.saturating_sub(self.anchor_ms);
        self.anchor_ms = now_ms;
        self.last_tick_ms = now_ms;
        Some(visible_ms.saturating_add(500) / 1000)
    }
}
