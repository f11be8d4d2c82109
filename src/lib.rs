pub mod animation;
pub mod controllers;
pub mod element;
pub mod error;
pub mod host;
pub mod reactive;

#[cfg(feature = "web")]
pub use host::web;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use error::ConfigError;
use host::{Host, ObserverOptions, RootMargin};

pub mod prelude {
    pub use crate::animation::{
        AnimationConfig, AnimationHandle, AnimationSpec, Animator, Driver, TimingFunction,
        Transition, VisualPatch, VisualState, animate,
    };
    pub use crate::controllers::{
        AutoplayConfig, CountUpConfig, HoverConfig, ParallaxConfig, ParallaxTarget, RevealOptions,
        RevealState, VisibilityOptions, create_autoplay, create_count_up, create_hover_animation,
        create_parallax, create_scroll_reveal, create_scroll_reveal_with, create_stagger,
        create_visibility,
    };
    pub use crate::element::{ElementId, ElementRef, create_element_ref};
    pub use crate::error::ConfigError;
    pub use crate::host::{HeadlessHost, Host, Rect, RootMargin, Size};
    pub use crate::reactive::{
        Effect, Mounted, ReadSignal, Signal, batch, create_effect, create_signal, mount,
        on_cleanup,
    };
    pub use crate::{Motion, MotionConfig, ReducedMotion, ensure_initialized};
}

/// How the reduced-motion accessibility preference is resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReducedMotion {
    /// Follow the host's preference
    #[default]
    System,
    /// Always skip animation
    Always,
    /// Always animate
    Never,
}

/// Page-wide defaults shared by every controller.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct MotionConfig {
    /// Visible fraction that triggers a reveal
    pub threshold: f64,
    pub root_margin: RootMargin,
    pub reduced_motion: ReducedMotion,
    /// Delay between consecutive stagger items, in seconds when deserialized
    #[serde(deserialize_with = "deserialize_seconds")]
    pub stagger_increment: Duration,
}

impl MotionConfig {
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn root_margin(mut self, root_margin: RootMargin) -> Self {
        self.root_margin = root_margin;
        self
    }

    pub fn reduced_motion(mut self, reduced_motion: ReducedMotion) -> Self {
        self.reduced_motion = reduced_motion;
        self
    }

    pub fn stagger_increment(mut self, increment: Duration) -> Self {
        self.stagger_increment = increment;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_threshold(self.threshold)
    }

    pub fn observer_options(&self) -> ObserverOptions {
        ObserverOptions {
            threshold: self.threshold,
            root_margin: self.root_margin,
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            root_margin: RootMargin::default(),
            reduced_motion: ReducedMotion::System,
            stagger_increment: Duration::from_millis(100),
        }
    }
}

pub(crate) fn validate_threshold(threshold: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold(threshold))
    }
}

fn deserialize_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f32::deserialize(deserializer)?;
    animation::seconds("staggerIncrement", secs).map_err(serde::de::Error::custom)
}

struct MotionInner {
    host: Rc<dyn Host>,
    config: MotionConfig,
}

/// The context every controller is created with: the host it runs against
/// and the page-wide [`MotionConfig`]. Clones share the same context.
#[derive(Clone)]
pub struct Motion {
    inner: Rc<MotionInner>,
}

impl Motion {
    pub fn new(host: impl Host + 'static) -> Self {
        Self::with_config(host, MotionConfig::default())
    }

    pub fn with_config(host: impl Host + 'static, config: MotionConfig) -> Self {
        Self::from_rc(Rc::new(host), config)
    }

    pub fn from_rc(host: Rc<dyn Host>, config: MotionConfig) -> Self {
        Self {
            inner: Rc::new(MotionInner { host, config }),
        }
    }

    pub fn host(&self) -> &Rc<dyn Host> {
        &self.inner.host
    }

    pub fn config(&self) -> &MotionConfig {
        &self.inner.config
    }

    /// Whether transitions should collapse to their end state right now.
    pub fn reduced_motion(&self) -> bool {
        match self.inner.config.reduced_motion {
            ReducedMotion::System => self.inner.host.prefers_reduced_motion(),
            ReducedMotion::Always => true,
            ReducedMotion::Never => false,
        }
    }

    /// The context installed by [`ensure_initialized`] on this thread.
    pub fn current() -> Option<Motion> {
        CURRENT.with(|current| current.borrow().clone())
    }

    /// Identity of the host, for keying per-element state.
    pub(crate) fn host_key(&self) -> usize {
        Rc::as_ptr(&self.inner.host) as *const () as usize
    }
}

impl std::fmt::Debug for Motion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Motion")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Motion>> = const { RefCell::new(None) };
}

/// Install this thread's [`Motion`] on first call; later calls return the
/// installed context and never run `init`.
pub fn ensure_initialized(init: impl FnOnce() -> Motion) -> Motion {
    if let Some(motion) = Motion::current() {
        return motion;
    }
    let motion = init();
    log::info!(
        "motion initialized (threshold {}, root margin {}, reduced motion {:?})",
        motion.config().threshold,
        motion.config().root_margin,
        motion.config().reduced_motion,
    );
    CURRENT.with(|current| *current.borrow_mut() = Some(motion.clone()));
    motion
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::host::HeadlessHost;

    #[test]
    fn test_ensure_initialized_runs_once() {
        let calls = Rc::new(Cell::new(0));
        let init = || {
            let calls = calls.clone();
            move || {
                calls.set(calls.get() + 1);
                Motion::new(HeadlessHost::default())
            }
        };

        let first = ensure_initialized(init());
        let second = ensure_initialized(init());
        assert_eq!(calls.get(), 1);
        assert_eq!(first.host_key(), second.host_key());
        assert!(Motion::current().is_some());
    }

    #[test]
    fn test_reduced_motion_policy() {
        let host = HeadlessHost::default();
        host.set_reduced_motion(true);

        assert!(Motion::new(host.clone()).reduced_motion());
        let never = MotionConfig::default().reduced_motion(ReducedMotion::Never);
        assert!(!Motion::with_config(host.clone(), never).reduced_motion());
    }

    #[test]
    fn test_motion_config_from_json() {
        let config: MotionConfig = serde_json::from_str(
            r#"{ "threshold": 0.25, "rootMargin": "0px 0px -10% 0px",
                 "reducedMotion": "always", "staggerIncrement": 0.15 }"#,
        )
        .unwrap();
        assert_eq!(config.threshold, 0.25);
        assert_eq!(config.reduced_motion, ReducedMotion::Always);
        assert_eq!(config.stagger_increment, Duration::from_secs_f32(0.15));
        assert!(config.validate().is_ok());

        let defaults: MotionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults, MotionConfig::default());
    }

    #[test]
    fn test_motion_config_rejects_bad_input() {
        assert!(serde_json::from_str::<MotionConfig>(r#"{ "rootMargin": "10em" }"#).is_err());
        assert!(serde_json::from_str::<MotionConfig>(r#"{ "staggerIncrement": -1 }"#).is_err());
        assert_eq!(
            MotionConfig::default().threshold(1.5).validate(),
            Err(ConfigError::InvalidThreshold(1.5))
        );
    }
}
