use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use super::{Dispose, bind_to_scope};
use crate::Motion;
use crate::animation::millis;
use crate::element::{ElementId, ElementRef, create_element_ref};
use crate::error::ConfigError;
use crate::host::{PointerEvent, Subscription};
use crate::reactive::{Effect, ReadSignal, Signal, create_effect, create_signal};

#[derive(Clone, Debug, PartialEq)]
pub struct AutoplayConfig {
    /// Number of slides
    pub len: usize,
    pub interval: Duration,
    /// Hold the countdown while the pointer is over the attached element
    pub pause_on_hover: bool,
}

impl AutoplayConfig {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            ..Self::default()
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn pause_on_hover(mut self, pause_on_hover: bool) -> Self {
        self.pause_on_hover = pause_on_hover;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidInterval);
        }
        Ok(())
    }
}

impl Default for AutoplayConfig {
    fn default() -> Self {
        Self {
            len: 0,
            interval: Duration::from_secs(5),
            pause_on_hover: true,
        }
    }
}

struct AutoplayInner {
    motion: Motion,
    config: AutoplayConfig,
    element: ElementRef,
    index: Signal<usize>,
    paused: Signal<bool>,
    hovered: Cell<bool>,
    timer: RefCell<Option<Subscription>>,
    listener: RefCell<Option<Subscription>>,
    effect: RefCell<Option<Effect>>,
    disposed: Cell<bool>,
}

impl AutoplayInner {
    /// Restart the countdown to the next slide.
    fn schedule(self: &Rc<Self>) {
        let previous = self.timer.borrow_mut().take();
        drop(previous);
        if self.disposed.get()
            || self.config.len == 0
            || self.config.interval.is_zero()
            || self.paused.get_untracked()
            || self.hovered.get()
        {
            return;
        }

        let weak = Rc::downgrade(self);
        let timer = self.motion.host().set_timeout(
            f64::from(millis(self.config.interval)),
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.step(1);
                }
            }),
        );
        *self.timer.borrow_mut() = Some(timer);
    }

    fn step(self: &Rc<Self>, delta: isize) {
        let len = self.config.len as isize;
        if len == 0 {
            return;
        }
        let current = self.index.get_untracked() as isize;
        self.index.set((current + delta).rem_euclid(len) as usize);
        self.schedule();
    }

    fn on_attach(self: &Rc<Self>, element: Option<ElementId>) {
        let previous = self.listener.borrow_mut().take();
        drop(previous);
        self.hovered.set(false);
        let Some(element) = element else {
            return;
        };
        if !self.config.pause_on_hover || self.disposed.get() {
            return;
        }

        let weak = Rc::downgrade(self);
        let listener = self.motion.host().on_pointer(
            element,
            Box::new(move |event| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                inner.hovered.set(event == PointerEvent::Enter);
                inner.schedule();
            }),
        );
        *self.listener.borrow_mut() = Some(listener);
    }
}

impl Dispose for AutoplayInner {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let effect = self.effect.borrow_mut().take();
        if let Some(effect) = effect {
            effect.dispose();
        }
        let timer = self.timer.borrow_mut().take();
        drop(timer);
        let listener = self.listener.borrow_mut().take();
        drop(listener);
    }
}

impl Drop for AutoplayInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Advances a slide index on a timer, wrapping at the end.
#[derive(Clone)]
pub struct Autoplay {
    inner: Rc<AutoplayInner>,
}

impl Autoplay {
    /// Attach the carousel to enable pause-on-hover.
    pub fn element_ref(&self) -> &ElementRef {
        &self.inner.element
    }

    /// Tracked read of the current slide.
    pub fn index(&self) -> usize {
        self.inner.index.get()
    }

    pub fn index_signal(&self) -> ReadSignal<usize> {
        self.inner.index.read_only()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.get()
    }

    pub fn next(&self) {
        self.inner.step(1);
    }

    pub fn prev(&self) {
        self.inner.step(-1);
    }

    /// Jump to a slide; out-of-range indices are ignored.
    pub fn go_to(&self, index: usize) {
        if index >= self.inner.config.len {
            log::debug!("autoplay: slide {index} out of range");
            return;
        }
        self.inner.index.set(index);
        self.inner.schedule();
    }

    pub fn pause(&self) {
        self.inner.paused.set(true);
        self.inner.schedule();
    }

    pub fn resume(&self) {
        self.inner.paused.set(false);
        self.inner.schedule();
    }

    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for Autoplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Autoplay")
            .field("index", &self.inner.index.get_untracked())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

pub fn create_autoplay(motion: &Motion, config: AutoplayConfig) -> Autoplay {
    let inner = Rc::new(AutoplayInner {
        motion: motion.clone(),
        config,
        element: create_element_ref(),
        index: create_signal(0),
        paused: create_signal(motion.reduced_motion()),
        hovered: Cell::new(false),
        timer: RefCell::new(None),
        listener: RefCell::new(None),
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
    inner.schedule();
    bind_to_scope(&inner);

    Autoplay { inner }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HeadlessHost, Rect};

    #[test]
    fn test_advances_and_wraps() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let autoplay = create_autoplay(
            &motion,
            AutoplayConfig::new(3).interval(Duration::from_millis(1000)),
        );

        host.advance(1000.0);
        assert_eq!(autoplay.index(), 1);
        host.advance(2000.0);
        assert_eq!(autoplay.index(), 0);

        autoplay.prev();
        assert_eq!(autoplay.index(), 2);
    }

    #[test]
    fn test_manual_navigation_restarts_countdown() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let autoplay = create_autoplay(
            &motion,
            AutoplayConfig::new(5).interval(Duration::from_millis(1000)),
        );

        host.advance(800.0);
        autoplay.go_to(3);
        host.advance(800.0);
        assert_eq!(autoplay.index(), 3);
        host.advance(200.0);
        assert_eq!(autoplay.index(), 4);

        autoplay.go_to(9);
        assert_eq!(autoplay.index(), 4);
    }

    #[test]
    fn test_hover_pauses() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let autoplay = create_autoplay(
            &motion,
            AutoplayConfig::new(3).interval(Duration::from_millis(1000)),
        );
        let el = host.add_element(Rect::new(0.0, 0.0, 100.0, 100.0));
        autoplay.element_ref().attach(el);

        host.pointer_enter(el);
        host.advance(5000.0);
        assert_eq!(autoplay.index(), 0);

        host.pointer_leave(el);
        host.advance(1000.0);
        assert_eq!(autoplay.index(), 1);
    }

    #[test]
    fn test_empty_or_reduced_never_schedules() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let _empty = create_autoplay(&motion, AutoplayConfig::default());
        assert_eq!(host.active_subscriptions().timers, 0);

        host.set_reduced_motion(true);
        let reduced = create_autoplay(&motion, AutoplayConfig::new(3));
        assert!(reduced.is_paused());
        assert_eq!(host.active_subscriptions().timers, 0);

        reduced.resume();
        assert_eq!(host.active_subscriptions().timers, 1);
    }
}
