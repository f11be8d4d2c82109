use super::{Animatable, Transition};

/// Result of advancing a tween, indicating whether the value changed
#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceResult<T> {
    /// Value did not change (paused, still in the delay, or same value)
    NoChange,
    /// Value changed to a new value
    Changed(T),
}

impl<T> AdvanceResult<T> {
    /// Returns true if the value changed
    pub fn is_changed(&self) -> bool {
        matches!(self, AdvanceResult::Changed(_))
    }
}

/// One timed interpolation between two values.
///
/// The playhead runs over `delay + duration` milliseconds and is advanced
/// with explicit timestamps, so the same tween replays identically for the
/// same sequence of frame times.
#[derive(Clone, Debug)]
pub struct Tween<T: Animatable> {
    from: T,
    to: T,
    transition: Transition,
    /// Playhead in ms, delay included
    position_ms: f64,
    /// Timestamp of the last advance; `None` while paused
    last_tick_ms: Option<f64>,
    reversed: bool,
    /// Last value handed out, for change detection
    prev_value: Option<T>,
}

impl<T: Animatable> Tween<T> {
    /// A tween that starts playing at `now_ms`.
    pub fn new(from: T, to: T, transition: Transition, now_ms: f64) -> Self {
        Self {
            from,
            to,
            transition,
            position_ms: 0.0,
            last_tick_ms: Some(now_ms),
            reversed: false,
            prev_value: None,
        }
    }

    pub fn total_ms(&self) -> f64 {
        f64::from(self.transition.delay_ms + self.transition.duration_ms)
    }

    /// Advance the playhead to `now_ms` and report the new value.
    pub fn advance(&mut self, now_ms: f64) -> AdvanceResult<T> {
        let Some(last) = self.last_tick_ms else {
            return AdvanceResult::NoChange;
        };
        let dt = (now_ms - last).max(0.0);
        self.last_tick_ms = Some(now_ms);
        self.position_ms = if self.reversed {
            self.position_ms - dt
        } else {
            self.position_ms + dt
        }
        .clamp(0.0, self.total_ms());

        if self.position_ms < f64::from(self.transition.delay_ms) && !self.reversed {
            // Still in the delay period
            return AdvanceResult::NoChange;
        }

        let value = self.value();
        let changed = self.prev_value.as_ref() != Some(&value);
        self.prev_value = Some(value.clone());
        if changed {
            AdvanceResult::Changed(value)
        } else {
            AdvanceResult::NoChange
        }
    }

    /// Value at the current playhead.
    pub fn value(&self) -> T {
        T::lerp(&self.from, &self.to, self.eased())
    }

    fn eased(&self) -> f32 {
        let t = self.linear_progress();
        self.transition.timing.evaluate(t as f32)
    }

    fn linear_progress(&self) -> f64 {
        if self.total_ms() <= 0.0 {
            // Nothing to travel through: sit at whichever end we head for
            return if self.reversed { 0.0 } else { 1.0 };
        }
        let active = self.position_ms - f64::from(self.transition.delay_ms);
        let duration = f64::from(self.transition.duration_ms);
        if duration <= 0.0 {
            if active >= 0.0 && self.position_ms > 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            (active / duration).clamp(0.0, 1.0)
        }
    }

    /// Linear progress through the duration (0.0 to 1.0), delay excluded.
    pub fn progress(&self) -> f32 {
        self.linear_progress() as f32
    }

    /// Whether the playhead reached the end it is travelling towards.
    pub fn is_finished(&self) -> bool {
        if self.reversed {
            self.position_ms <= 0.0
        } else {
            self.position_ms >= self.total_ms()
        }
    }

    pub fn is_paused(&self) -> bool {
        self.last_tick_ms.is_none()
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn pause(&mut self) {
        self.last_tick_ms = None;
    }

    pub fn resume(&mut self, now_ms: f64) {
        if self.last_tick_ms.is_none() {
            self.last_tick_ms = Some(now_ms);
        }
    }

    /// Flip direction, keeping the playhead where it is.
    pub fn reverse(&mut self, now_ms: f64) {
        self.reversed = !self.reversed;
        self.last_tick_ms = Some(now_ms);
    }

    /// Rewind to the start and play forwards.
    pub fn restart(&mut self, now_ms: f64) {
        self.position_ms = 0.0;
        self.reversed = false;
        self.prev_value = None;
        self.last_tick_ms = Some(now_ms);
    }

    pub fn from(&self) -> &T {
        &self.from
    }

    pub fn to(&self) -> &T {
        &self.to
    }

    pub fn transition(&self) -> &Transition {
        &self.transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::TimingFunction;

    fn linear(duration_ms: f32) -> Transition {
        Transition::new(duration_ms, TimingFunction::Linear)
    }

    #[test]
    fn test_tween_interpolates_over_duration() {
        let mut tween = Tween::new(0.0f32, 100.0, linear(100.0), 1000.0);

        assert_eq!(tween.advance(1050.0), AdvanceResult::Changed(50.0));
        assert!(!tween.is_finished());
        assert_eq!(tween.advance(1100.0), AdvanceResult::Changed(100.0));
        assert!(tween.is_finished());
        assert_eq!(tween.advance(1200.0), AdvanceResult::NoChange);
    }

    #[test]
    fn test_delay_holds_the_start_value() {
        let mut tween = Tween::new(0.0f32, 10.0, linear(100.0).delay(200.0), 0.0);

        assert_eq!(tween.advance(150.0), AdvanceResult::NoChange);
        assert_eq!(tween.value(), 0.0);
        assert_eq!(tween.advance(250.0), AdvanceResult::Changed(5.0));
    }

    #[test]
    fn test_pause_freezes_playhead() {
        let mut tween = Tween::new(0.0f32, 100.0, linear(100.0), 0.0);
        tween.advance(25.0);
        tween.pause();
        assert_eq!(tween.advance(80.0), AdvanceResult::NoChange);

        tween.resume(500.0);
        assert_eq!(tween.advance(525.0), AdvanceResult::Changed(50.0));
    }

    #[test]
    fn test_reverse_runs_back_to_start() {
        let mut tween = Tween::new(0.0f32, 100.0, linear(100.0), 0.0);
        tween.advance(60.0);
        tween.reverse(60.0);
        assert_eq!(tween.advance(100.0), AdvanceResult::Changed(20.0));
        tween.advance(200.0);
        assert!(tween.is_finished());
        assert_eq!(tween.value(), 0.0);
    }

    #[test]
    fn test_restart_rewinds() {
        let mut tween = Tween::new(0.0f32, 100.0, linear(100.0), 0.0);
        tween.advance(100.0);
        assert!(tween.is_finished());

        tween.restart(300.0);
        assert!(!tween.is_finished());
        assert_eq!(tween.advance(310.0), AdvanceResult::Changed(10.0));
    }

    #[test]
    fn test_zero_duration_jumps_after_delay() {
        let mut tween = Tween::new(0.0f32, 1.0, linear(0.0).delay(50.0), 0.0);
        assert_eq!(tween.advance(10.0), AdvanceResult::NoChange);
        assert_eq!(tween.advance(60.0), AdvanceResult::Changed(1.0));
        assert!(tween.is_finished());
    }

    #[test]
    fn test_zero_length_reverse_lands_on_start() {
        let mut tween = Tween::new(0.0f32, 1.0, linear(0.0), 0.0);
        assert_eq!(tween.advance(0.0), AdvanceResult::Changed(1.0));

        tween.reverse(16.0);
        assert_eq!(tween.value(), 0.0);
        assert_eq!(tween.advance(32.0), AdvanceResult::Changed(0.0));
        assert!(tween.is_finished());

        tween.reverse(48.0);
        assert_eq!(tween.value(), 1.0);
    }
}
