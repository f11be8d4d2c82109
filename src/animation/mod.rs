mod animatable;
mod animator;
mod driver;
mod timing;
mod tween;
mod visual;

use std::time::Duration;

use serde::Deserialize;

pub use animatable::Animatable;
pub use animator::Animator;
pub use driver::{AnimationHandle, Driver, OwnerToken, animate};
pub use timing::{EaseMode, TimingFunction};
pub use tween::{AdvanceResult, Tween};
pub use visual::{StyleChanges, VisualPatch, VisualState};

use crate::error::ConfigError;

/// Configuration for how a property should animate when it changes
#[derive(Clone, Debug)]
pub struct Transition {
    /// Duration of the animation in milliseconds
    pub duration_ms: f32,
    /// Timing function controlling the animation curve
    pub timing: TimingFunction,
    /// Delay before animation starts in milliseconds
    pub delay_ms: f32,
}

impl Transition {
    /// Create a new transition with the given duration and timing function
    pub fn new(duration_ms: f32, timing: TimingFunction) -> Self {
        Self {
            duration_ms,
            timing,
            delay_ms: 0.0,
        }
    }

    /// A transition that resolves on the next frame.
    pub fn instant() -> Self {
        Self::new(0.0, TimingFunction::Linear)
    }

    /// Set the delay before the animation starts
    pub fn delay(mut self, delay_ms: f32) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Set the duration of the animation
    pub fn duration(mut self, duration_ms: f32) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Set the timing function
    pub fn timing(mut self, timing: TimingFunction) -> Self {
        self.timing = timing;
        self
    }

    pub fn total_ms(&self) -> f32 {
        self.delay_ms + self.duration_ms
    }
}

impl Default for Transition {
    fn default() -> Self {
        Self::new(800.0, TimingFunction::default())
    }
}

/// Declarative description of one entrance (or hover) transition.
///
/// Immutable once handed to a controller; build it with the chained
/// setters or convert a deserialized [`AnimationSpec`].
#[derive(Clone, Debug)]
pub struct AnimationConfig {
    pub duration: Duration,
    pub delay: Duration,
    pub easing: TimingFunction,
    /// Fields of the hidden/initial state, merged over [`VisualState::REST`]
    pub from: VisualPatch,
    /// Fields of the target state, merged over [`VisualState::REST`]
    pub to: VisualPatch,
}

impl AnimationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn easing(mut self, easing: TimingFunction) -> Self {
        self.easing = easing;
        self
    }

    pub fn from(mut self, from: VisualPatch) -> Self {
        self.from = from;
        self
    }

    pub fn to(mut self, to: VisualPatch) -> Self {
        self.to = to;
        self
    }

    pub fn hidden_state(&self) -> VisualState {
        VisualState::REST.merge(&self.from)
    }

    pub fn target_state(&self) -> VisualState {
        VisualState::REST.merge(&self.to)
    }

    pub fn transition(&self) -> Transition {
        Transition::new(millis(self.duration), self.easing.clone()).delay(millis(self.delay))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.from.validate()?;
        self.to.validate()
    }
}

impl Default for AnimationConfig {
    /// Fade up 50px over 0.8s with `power2.out`.
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(800),
            delay: Duration::ZERO,
            easing: TimingFunction::default(),
            from: VisualPatch::new().opacity(0.0).y(50.0),
            to: VisualPatch::new().opacity(1.0).y(0.0),
        }
    }
}

/// Serialized form of [`AnimationConfig`], as section presets store it.
///
/// ```json
/// { "duration": 0.6, "delay": 0.2, "ease": "power3.out",
///   "from": { "opacity": 0, "translateX": -40 } }
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnimationSpec {
    /// Seconds
    pub duration: Option<f32>,
    /// Seconds
    pub delay: Option<f32>,
    #[serde(alias = "easing")]
    pub ease: Option<String>,
    pub from: Option<VisualPatch>,
    pub to: Option<VisualPatch>,
}

impl TryFrom<AnimationSpec> for AnimationConfig {
    type Error = ConfigError;

    fn try_from(spec: AnimationSpec) -> Result<Self, Self::Error> {
        let defaults = AnimationConfig::default();
        let config = AnimationConfig {
            duration: match spec.duration {
                Some(secs) => seconds("duration", secs)?,
                None => defaults.duration,
            },
            delay: match spec.delay {
                Some(secs) => seconds("delay", secs)?,
                None => defaults.delay,
            },
            easing: match spec.ease {
                Some(name) => name.parse()?,
                None => defaults.easing,
            },
            from: spec.from.unwrap_or(defaults.from),
            to: spec.to.unwrap_or(defaults.to),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Whole milliseconds of `duration`, without the rounding of `as_secs_f32`.
pub(crate) fn millis(duration: Duration) -> f32 {
    (duration.as_nanos() as f64 / 1_000_000.0) as f32
}

/// Convert a seconds value from a preset, rejecting what `Duration` cannot hold.
pub(crate) fn seconds(field: &'static str, value: f32) -> Result<Duration, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(Duration::from_secs_f32(value))
    } else {
        Err(ConfigError::InvalidDuration { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_states() {
        let config = AnimationConfig::default();
        assert_eq!(config.hidden_state().opacity, 0.0);
        assert_eq!(config.hidden_state().y, 50.0);
        assert_eq!(config.target_state(), VisualState::REST);

        let transition = config.transition();
        assert_eq!(transition.duration_ms, 800.0);
        assert_eq!(transition.delay_ms, 0.0);
    }

    #[test]
    fn test_spec_conversion_fills_defaults() {
        let spec = AnimationSpec {
            duration: Some(0.5),
            ease: Some("power3.out".into()),
            ..Default::default()
        };
        let config = AnimationConfig::try_from(spec).unwrap();
        assert_eq!(config.duration, Duration::from_millis(500));
        assert_eq!(config.delay, Duration::ZERO);
        assert_eq!(config.from, AnimationConfig::default().from);
    }

    #[test]
    fn test_spec_conversion_rejects_bad_values() {
        let negative = AnimationSpec {
            delay: Some(-1.0),
            ..Default::default()
        };
        assert_eq!(
            AnimationConfig::try_from(negative).unwrap_err(),
            ConfigError::InvalidDuration {
                field: "delay",
                value: -1.0
            }
        );

        let easing = AnimationSpec {
            ease: Some("bouncy".into()),
            ..Default::default()
        };
        assert!(matches!(
            AnimationConfig::try_from(easing),
            Err(ConfigError::UnknownEasing(_))
        ));

        let opacity = AnimationSpec {
            to: Some(VisualPatch::new().opacity(2.0)),
            ..Default::default()
        };
        assert_eq!(
            AnimationConfig::try_from(opacity).unwrap_err(),
            ConfigError::InvalidOpacity(2.0)
        );
    }
}
