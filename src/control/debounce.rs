//! Button debounce for active-low physical inputs.

use std::time::{Duration, Instant};

/// Quiescent period after a fired edge.
pub const DEBOUNCE_QUIET: Duration = Duration::from_millis(500);

/// Turns raw pin reads into single press events.
///
/// Fires on an active read when armed and outside the quiet period. After firing it
/// disarms; only an inactive read seen after the quiet period re-arms it, so contact
/// bounce and a held button both produce exactly one event per press.
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    last_fired: Option<Instant>,
    armed: bool,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            last_fired: None,
            armed: true,
        }
    }

    pub fn on_edge(&mut self, pin_is_active: bool) -> bool {
        self.on_edge_at(pin_is_active, Instant::now())
    }

    pub fn on_edge_at(&mut self, pin_is_active: bool, now: Instant) -> bool {
        let quiet_elapsed = self
            .last_fired
            .is_none_or(|t| now.saturating_duration_since(t) >= self.quiet);

        if !pin_is_active {
            if quiet_elapsed {
                self.armed = true;
            }
            return false;
        }

        if self.armed && quiet_elapsed {
            self.armed = false;
            self.last_fired = Some(now);
            return true;
        }
        false
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_QUIET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(base: Instant, n: u64) -> Instant {
        base + Duration::from_millis(n)
    }

    #[test]
    fn bouncing_press_fires_once() {
        let t0 = Instant::now();
        let mut d = Debouncer::default();
        let raw = [true, false, true, true, false, true, false, false];
        let fired = raw
            .iter()
            .enumerate()
            .filter(|(i, active)| d.on_edge_at(**active, ms(t0, *i as u64 * 20)))
            .count();
        assert_eq!(fired, 1);
    }

    #[test]
    fn held_button_does_not_repeat() {
        let t0 = Instant::now();
        let mut d = Debouncer::default();
        assert!(d.on_edge_at(true, t0));
        for n in (50..3000).step_by(50) {
            assert!(!d.on_edge_at(true, ms(t0, n)));
        }
    }

    #[test]
    fn second_press_after_release_fires() {
        let t0 = Instant::now();
        let mut d = Debouncer::default();
        assert!(d.on_edge_at(true, t0));
        assert!(!d.on_edge_at(false, ms(t0, 600)));
        assert!(d.on_edge_at(true, ms(t0, 700)));
    }

    #[test]
    fn release_inside_quiet_period_does_not_rearm() {
        let t0 = Instant::now();
        let mut d = Debouncer::default();
        assert!(d.on_edge_at(true, t0));
        assert!(!d.on_edge_at(false, ms(t0, 100)));
        // still held after the bounce
        assert!(!d.on_edge_at(true, ms(t0, 600)));
    }

    #[test]
    fn inactive_input_never_fires() {
        let t0 = Instant::now();
        let mut d = Debouncer::default();
        assert!((0..10).all(|n| !d.on_edge_at(false, ms(t0, n * 100))));
    }
}
