use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use super::visibility::{Visibility, VisibilityOptions, create_visibility};
use super::{Dispose, bind_to_scope};
use crate::Motion;
use crate::animation::{Animator, TimingFunction, Transition, millis};
use crate::element::{ElementRef, create_element_ref};
use crate::reactive::{Effect, ReadSignal, Signal, create_effect, create_signal};

/// A number that counts up when its element scrolls into view.
#[derive(Clone, Debug)]
pub struct CountUpConfig {
    pub from: f64,
    pub to: f64,
    pub duration: Duration,
    pub easing: TimingFunction,
    /// Count again from `from` on every entry
    pub replay: bool,
}

impl CountUpConfig {
    pub fn new(to: f64) -> Self {
        Self {
            to,
            ..Self::default()
        }
    }

    pub fn from(mut self, from: f64) -> Self {
        self.from = from;
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn easing(mut self, easing: TimingFunction) -> Self {
        self.easing = easing;
        self
    }

    pub fn replay(mut self, replay: bool) -> Self {
        self.replay = replay;
        self
    }
}

impl Default for CountUpConfig {
    fn default() -> Self {
        Self {
            from: 0.0,
            to: 100.0,
            duration: Duration::from_secs(2),
            easing: TimingFunction::default(),
            replay: false,
        }
    }
}

struct CountUpInner {
    config: CountUpConfig,
    element: ElementRef,
    visibility: Visibility,
    value: Signal<f64>,
    finished: Signal<bool>,
    animator: Animator<f64>,
    effect: RefCell<Option<Effect>>,
    disposed: Cell<bool>,
}

impl CountUpInner {
    fn on_visibility(self: &Rc<Self>, visible: bool) {
        if self.disposed.get() || !visible {
            return;
        }
        self.finished.set(false);
        self.animator.set(self.config.from);

        let weak = Rc::downgrade(self);
        let transition = Transition::new(millis(self.config.duration), self.config.easing.clone());
        self.animator
            .animate_to_then(self.config.to, transition, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.finished.set(true);
                }
            });
    }
}

impl Dispose for CountUpInner {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.visibility.dispose();
        let effect = self.effect.borrow_mut().take();
        if let Some(effect) = effect {
            effect.dispose();
        }
        self.animator.kill();
    }
}

impl Drop for CountUpInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Stat counter driven by scroll visibility.
#[derive(Clone)]
pub struct CountUp {
    inner: Rc<CountUpInner>,
}

impl CountUp {
    pub fn element_ref(&self) -> &ElementRef {
        &self.inner.element
    }

    /// Tracked read of the displayed number.
    pub fn value(&self) -> f64 {
        self.inner.value.get()
    }

    pub fn value_signal(&self) -> ReadSignal<f64> {
        self.inner.value.read_only()
    }

    pub fn is_visible(&self) -> bool {
        self.inner.visibility.is_visible()
    }

    pub fn has_finished(&self) -> bool {
        self.inner.finished.get()
    }

    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for CountUp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountUp")
            .field("value", &self.inner.value.get_untracked())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

pub fn create_count_up(motion: &Motion, config: CountUpConfig) -> CountUp {
    let element = create_element_ref();
    let visibility = create_visibility(
        motion,
        &element,
        VisibilityOptions::from(motion.config()).once(!config.replay),
    );
    let value = create_signal(config.from);
    let animator = Animator::new(motion, config.from, {
        let value = value.clone();
        move |v: &f64| value.set(*v)
    });

    let inner = Rc::new(CountUpInner {
        config,
        element,
        visibility,
        value,
        finished: create_signal(false),
        animator,
        effect: RefCell::new(None),
        disposed: Cell::new(false),
    });

    let effect = create_effect({
        let weak = Rc::downgrade(&inner);
        move || {
            if let Some(inner) = weak.upgrade() {
                let visible = inner.visibility.is_visible();
                inner.on_visibility(visible);
            }
        }
    });
    *inner.effect.borrow_mut() = Some(effect);
    bind_to_scope(&inner);

    CountUp { inner }
}
