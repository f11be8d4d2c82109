use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use super::scroll_reveal::RevealState;
use super::visibility::{Visibility, VisibilityOptions, create_visibility};
use super::{Dispose, bind_to_scope};
use crate::Motion;
use crate::animation::{AnimationConfig, Driver, OwnerToken, millis};
use crate::element::{ElementRef, create_element_ref};
use crate::reactive::{Effect, ReadSignal, Signal, batch, create_effect, create_signal};

struct StaggerInner {
    motion: Motion,
    config: AnimationConfig,
    increment: Duration,
    container: ElementRef,
    visibility: Visibility,
    state: Signal<RevealState>,
    owner: OwnerToken,
    drivers: RefCell<Vec<Driver>>,
    start_times: RefCell<Vec<f64>>,
    effect: RefCell<Option<Effect>>,
    disposed: Cell<bool>,
}

impl StaggerInner {
    fn trigger(self: &Rc<Self>) {
        if self.disposed.get() || self.state.get_untracked() != RevealState::Observing {
            return;
        }
        let Some(container) = self.container.get_untracked() else {
            return;
        };
        let host = self.motion.host();
        let children = host.children(container);
        let now = host.now_ms();
        log::debug!(
            "stagger triggered for {container:?} with {} items",
            children.len()
        );

        if children.is_empty() {
            self.state.set(RevealState::Animated);
            return;
        }

        let drivers: Vec<Driver> = children
            .iter()
            .map(|child| Driver::for_element(&self.motion, *child))
            .collect();
        let reduced = self.motion.reduced_motion();
        if !reduced {
            for driver in &drivers {
                driver.set(self.owner, self.config.hidden_state());
            }
        }

        let remaining = Rc::new(Cell::new(drivers.len()));
        let target = self.config.target_state();
        let mut start_times = Vec::with_capacity(drivers.len());
        batch(|| {
            self.state.set(RevealState::Triggered);
            for (index, driver) in drivers.iter().enumerate() {
                let delay_ms = millis(self.item_delay(index));
                start_times.push(now + f64::from(delay_ms));

                let weak = Rc::downgrade(self);
                let remaining = remaining.clone();
                driver.animate_to(
                    self.owner,
                    target,
                    self.config.transition().delay(delay_ms),
                    Some(Box::new(move || {
                        remaining.set(remaining.get() - 1);
                        if remaining.get() == 0
                            && let Some(inner) = weak.upgrade()
                            && !inner.disposed.get()
                        {
                            inner.state.set(RevealState::Animated);
                        }
                    })),
                );
            }
        });
        *self.start_times.borrow_mut() = start_times;
        *self.drivers.borrow_mut() = drivers;
    }

    /// Base delay plus `index` increments, clamped on overflow.
    fn item_delay(&self, index: usize) -> Duration {
        let delay = u32::try_from(index)
            .ok()
            .and_then(|index| self.increment.checked_mul(index))
            .and_then(|offset| self.config.delay.checked_add(offset));
        delay.unwrap_or_else(|| {
            log::warn!("stagger delay of item {index} overflows, clamped");
            Duration::MAX
        })
    }
}

impl Dispose for StaggerInner {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.visibility.dispose();
        let effect = self.effect.borrow_mut().take();
        if let Some(effect) = effect {
            effect.dispose();
        }
        let drivers = std::mem::take(&mut *self.drivers.borrow_mut());
        let host = self.motion.host();
        for driver in drivers {
            driver.release(self.owner);
            host.release_element(driver.element());
        }
    }
}

impl Drop for StaggerInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Animates a container's children in one after another when the container
/// first enters view.
///
/// Children are read once, at trigger time; later additions are not
/// animated.
#[derive(Clone)]
pub struct Stagger {
    inner: Rc<StaggerInner>,
}

impl Stagger {
    /// Attachment point for the container.
    pub fn element_ref(&self) -> &ElementRef {
        &self.inner.container
    }

    pub fn state(&self) -> RevealState {
        self.inner.state.get()
    }

    pub fn state_signal(&self) -> ReadSignal<RevealState> {
        self.inner.state.read_only()
    }

    pub fn is_visible(&self) -> bool {
        self.inner.visibility.is_visible()
    }

    /// Whether every item finished animating.
    pub fn has_animated(&self) -> bool {
        self.state() == RevealState::Animated
    }

    /// Items animated by the trigger; 0 before it.
    pub fn item_count(&self) -> usize {
        self.inner.drivers.borrow().len()
    }

    /// Host time (ms) at which each item's transition starts, in child order.
    pub fn item_start_times(&self) -> Vec<f64> {
        self.inner.start_times.borrow().clone()
    }

    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for Stagger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stagger")
            .field("state", &self.inner.state.get_untracked())
            .field("increment", &self.inner.increment)
            .finish_non_exhaustive()
    }
}

/// Stagger the children of a container by `increment` each.
pub fn create_stagger(motion: &Motion, config: AnimationConfig, increment: Duration) -> Stagger {
    let container = create_element_ref();
    let visibility = create_visibility(
        motion,
        &container,
        VisibilityOptions::from(motion.config()),
    );

    let inner = Rc::new(StaggerInner {
        motion: motion.clone(),
        config,
        increment,
        container,
        visibility,
        state: create_signal(RevealState::Unobserved),
        owner: OwnerToken::next(),
        drivers: RefCell::new(Vec::new()),
        start_times: RefCell::new(Vec::new()),
        effect: RefCell::new(None),
        disposed: Cell::new(false),
    });

    let effect = create_effect({
        let weak = Rc::downgrade(&inner);
        move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let attached = inner.container.get().is_some();
            let visible = inner.visibility.is_visible();
            if inner.state.get_untracked() == RevealState::Unobserved && attached {
                inner.state.set(RevealState::Observing);
            }
            if visible {
                inner.trigger();
            }
        }
    });
    *inner.effect.borrow_mut() = Some(effect);
    bind_to_scope(&inner);

    Stagger { inner }
}

/// Stagger by the page-wide [`MotionConfig::stagger_increment`](crate::MotionConfig).
pub fn create_page_stagger(motion: &Motion, config: AnimationConfig) -> Stagger {
    create_stagger(motion, config, motion.config().stagger_increment)
}
