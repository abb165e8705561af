use embassy_time::{Duration, Instant};

use crate::config::DEBOUNCE_DELAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Pressed,
    Released,
}

/// Edge detector for a discrete input. A level change is reported once it
/// has held steady for the debounce delay; chatter inside the delay is
/// ignored.
pub struct Debouncer {
    stable: bool,
    last_raw: bool,
    last_change: Option<Instant>,
    delay: Duration,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_DELAY)
    }
}

impl Debouncer {
    pub const fn new(delay: Duration) -> Self {
        Self { stable: false, last_raw: false, last_change: None, delay }
    }

    /// Feeds one sample (true = pressed).
    pub fn update(&mut self, pressed: bool, now: Instant) -> Option<Edge> {
        if pressed != self.last_raw {
            self.last_raw = pressed;
            self.last_change = Some(now);
            return None;
        }

        let settled = match self.last_change {
            Some(t) => now.saturating_duration_since(t) >= self.delay,
            None => true,
        };
        if !settled || pressed == self.stable {
            return None;
        }

        self.stable = pressed;
        Some(if pressed { Edge::Pressed } else { Edge::Released })
    }

    pub fn is_pressed(&self) -> bool {
        self.stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn press_and_release() {
        let mut button = Debouncer::new(Duration::from_millis(50));
        assert_eq!(button.update(true, t(0)), None);
        assert_eq!(button.update(true, t(30)), None);
        assert_eq!(button.update(true, t(50)), Some(Edge::Pressed));
        assert_eq!(button.update(true, t(60)), None);
        assert!(button.is_pressed());

        assert_eq!(button.update(false, t(100)), None);
        assert_eq!(button.update(false, t(160)), Some(Edge::Released));
    }

    #[test]
    fn chatter_is_ignored() {
        let mut button = Debouncer::new(Duration::from_millis(50));
        for (i, level) in [true, false, true, false, true].into_iter().enumerate() {
            assert_eq!(button.update(level, t(i as u64 * 10)), None);
        }
        assert_eq!(button.update(true, t(80)), None);
        assert_eq!(button.update(true, t(90)), Some(Edge::Pressed));
    }

    #[test]
    fn short_glitch_produces_no_edge() {
        let mut button = Debouncer::new(Duration::from_millis(50));
        button.update(true, t(0));
        button.update(false, t(20));
        for ms in (30..300).step_by(10) {
            assert_eq!(button.update(false, t(ms)), None);
        }
        assert!(!button.is_pressed());
    }
}
