use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{Dispose, bind_to_scope};
use crate::Motion;
use crate::animation::{Driver, OwnerToken, VisualPatch, VisualState};
use crate::element::{ElementId, ElementRef, create_element_ref};
use crate::error::ConfigError;
use crate::host::{Rect, Subscription};
use crate::reactive::{Effect, ReadSignal, Signal, create_effect, create_signal};

/// Which transform component the scroll offset drives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParallaxTarget {
    /// Vertical offset, as a percentage of the element's height
    #[default]
    YPercent,
    /// Horizontal offset, as a percentage of the element's width
    XPercent,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParallaxConfig {
    /// Offset multiplier; negative moves against the scroll direction
    pub speed: f32,
    pub target: ParallaxTarget,
    /// Static properties applied under the scroll offset
    pub overrides: VisualPatch,
    /// Set `will-change: transform` while attached
    pub hardware_accelerated: bool,
}

impl ParallaxConfig {
    pub fn speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn target(mut self, target: ParallaxTarget) -> Self {
        self.target = target;
        self
    }

    pub fn overrides(mut self, overrides: VisualPatch) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn hardware_accelerated(mut self, enabled: bool) -> Self {
        self.hardware_accelerated = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.speed.is_finite() {
            return Err(ConfigError::InvalidSpeed(self.speed));
        }
        self.overrides.validate()
    }

    /// Visual state at a given scroll progress.
    pub fn state_at(&self, progress: f64) -> VisualState {
        let offset = self.speed * progress.clamp(0.0, 1.0) as f32 * 100.0;
        let state = VisualState::REST.merge(&self.overrides);
        match self.target {
            ParallaxTarget::YPercent => VisualState {
                y_percent: offset,
                ..state
            },
            ParallaxTarget::XPercent => VisualState {
                x_percent: offset,
                ..state
            },
        }
    }
}

impl Default for ParallaxConfig {
    fn default() -> Self {
        Self {
            speed: 0.5,
            target: ParallaxTarget::YPercent,
            overrides: VisualPatch::default(),
            hardware_accelerated: true,
        }
    }
}

/// How far an element has travelled through the viewport: 0.0 when its top
/// edge touches the bottom of the viewport, 1.0 when its bottom edge leaves
/// the top.
pub fn scroll_progress(bounds: Rect, viewport_height: f64) -> f64 {
    let span = viewport_height + bounds.height;
    if span <= 0.0 {
        return 0.0;
    }
    ((viewport_height - bounds.y) / span).clamp(0.0, 1.0)
}

struct ParallaxInner {
    motion: Motion,
    config: ParallaxConfig,
    element: ElementRef,
    progress: Signal<f64>,
    owner: OwnerToken,
    driver: RefCell<Option<Driver>>,
    listener: RefCell<Option<Subscription>>,
    applied: Cell<Option<VisualState>>,
    effect: RefCell<Option<Effect>>,
    disposed: Cell<bool>,
}

impl ParallaxInner {
    fn on_attach(self: &Rc<Self>, element: Option<ElementId>) {
        if self.disposed.get() {
            return;
        }
        self.detach();
        let Some(element) = element else {
            return;
        };

        let reduced = self.motion.reduced_motion();
        *self.driver.borrow_mut() = Some(Driver::for_element(&self.motion, element));
        if self.config.hardware_accelerated && !reduced {
            self.motion.host().set_will_change(element, true);
        }
        self.update();

        if reduced {
            log::debug!("parallax: reduced motion, {element:?} stays static");
            return;
        }
        let weak = Rc::downgrade(self);
        let listener = self.motion.host().on_scroll(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.update();
            }
        }));
        *self.listener.borrow_mut() = Some(listener);
    }

    fn update(&self) {
        let Some(driver) = self.driver.borrow().clone() else {
            return;
        };
        let host = self.motion.host();
        let progress = if self.motion.reduced_motion() {
            0.0
        } else {
            let Some(rendered) = host.bounding_rect(driver.element()) else {
                return;
            };
            // Measure the layout box; our own offset must not feed back
            let bounds = driver.state().layout_rect(rendered);
            scroll_progress(bounds, host.viewport().height)
        };
        self.progress.set(progress);

        let state = self.config.state_at(progress);
        if self.applied.get() != Some(state) {
            log::trace!("parallax {:?} at {progress:.3}", driver.element());
            self.applied.set(Some(state));
            driver.set(self.owner, state);
        }
    }

    fn detach(&self) {
        let listener = self.listener.borrow_mut().take();
        drop(listener);
        self.applied.set(None);
        let driver = self.driver.borrow_mut().take();
        if let Some(driver) = driver {
            if self.config.hardware_accelerated {
                self.motion.host().set_will_change(driver.element(), false);
            }
            driver.release(self.owner);
        }
    }
}

impl Dispose for ParallaxInner {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let effect = self.effect.borrow_mut().take();
        if let Some(effect) = effect {
            effect.dispose();
        }
        self.detach();
    }
}

impl Drop for ParallaxInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Scroll-linked transform offset for decorative layers.
#[derive(Clone)]
pub struct Parallax {
    inner: Rc<ParallaxInner>,
}

impl Parallax {
    pub fn element_ref(&self) -> &ElementRef {
        &self.inner.element
    }

    /// Tracked read of the current scroll progress.
    pub fn progress(&self) -> f64 {
        self.inner.progress.get()
    }

    pub fn progress_signal(&self) -> ReadSignal<f64> {
        self.inner.progress.read_only()
    }

    pub fn config(&self) -> &ParallaxConfig {
        &self.inner.config
    }

    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for Parallax {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parallax")
            .field("progress", &self.inner.progress.get_untracked())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

pub fn create_parallax(motion: &Motion, config: ParallaxConfig) -> Parallax {
    let inner = Rc::new(ParallaxInner {
        motion: motion.clone(),
        config,
        element: create_element_ref(),
        progress: create_signal(0.0),
        owner: OwnerToken::next(),
        driver: RefCell::new(None),
        listener: RefCell::new(None),
        applied: Cell::new(None),
        effect: RefCell::new(None),
        disposed: Cell::new(false),
    });

    let effect = create_effect({
        let weak = Rc::downgrade(&inner);
        move || {
            if let Some(inner) = weak.upgrade() {
                let element = inner.element.get();
                inner.on_attach(element);
            }
        }
    });
    *inner.effect.borrow_mut() = Some(effect);
    bind_to_scope(&inner);

    Parallax { inner }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HeadlessHost, Host, Size};

    #[test]
    fn test_scroll_progress_endpoints() {
        let vh = 800.0;
        assert_eq!(scroll_progress(Rect::new(0.0, 800.0, 100.0, 200.0), vh), 0.0);
        assert_eq!(scroll_progress(Rect::new(0.0, -200.0, 100.0, 200.0), vh), 1.0);
        assert_eq!(scroll_progress(Rect::new(0.0, 300.0, 100.0, 200.0), vh), 0.5);
        assert_eq!(scroll_progress(Rect::new(0.0, 5000.0, 100.0, 200.0), vh), 0.0);
    }

    #[test]
    fn test_state_at_merges_overrides() {
        let config = ParallaxConfig::default()
            .speed(-0.4)
            .target(ParallaxTarget::XPercent)
            .overrides(VisualPatch::new().opacity(0.6).y_percent(10.0));

        let state = config.state_at(0.5);
        assert_eq!(state.x_percent, -20.0);
        assert_eq!(state.y_percent, 10.0);
        assert_eq!(state.opacity, 0.6);
        assert_eq!(config.state_at(0.5), state);
    }

    #[test]
    fn test_follows_scroll_and_cleans_up() {
        let host = HeadlessHost::new(Size::new(1000.0, 800.0));
        let motion = Motion::new(host.clone());
        let parallax = create_parallax(&motion, ParallaxConfig::default());
        let el = host.add_element(Rect::new(0.0, 1100.0, 1000.0, 200.0));
        parallax.element_ref().attach(el);
        assert!(host.will_change(el));
        assert_eq!(parallax.progress(), 0.0);

        host.scroll_to(800.0);
        assert_eq!(parallax.progress(), 0.5);
        assert_eq!(host.style(el).map(|s| s.y_percent), Some(25.0));

        let writes = host.style_writes(el);
        host.scroll_to(800.0);
        assert_eq!(host.style_writes(el), writes);

        parallax.dispose();
        assert!(!host.will_change(el));
        assert_eq!(host.active_subscriptions().total(), 0);
    }

    #[test]
    fn test_own_offset_does_not_shift_progress() {
        let host = HeadlessHost::new(Size::new(1000.0, 800.0));
        let motion = Motion::new(host.clone());
        let parallax = create_parallax(&motion, ParallaxConfig::default().speed(-0.5));
        let el = host.add_element(Rect::new(0.0, 1200.0, 1000.0, 800.0));
        parallax.element_ref().attach(el);

        host.scroll_to(800.0);
        assert_eq!(parallax.progress(), 0.25);
        assert_eq!(host.style(el).map(|s| s.y_percent), Some(-12.5));
        assert_eq!(
            host.bounding_rect(el),
            Some(Rect::new(0.0, 300.0, 1000.0, 800.0))
        );

        let writes = host.style_writes(el);
        for _ in 0..3 {
            host.scroll_to(800.0);
            assert_eq!(parallax.progress(), 0.25);
        }
        assert_eq!(host.style_writes(el), writes);
    }
}
