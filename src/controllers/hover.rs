use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use super::{Dispose, bind_to_scope};
use crate::Motion;
use crate::animation::{AnimationConfig, Driver, OwnerToken, VisualPatch};
use crate::element::{ElementId, ElementRef, create_element_ref};
use crate::host::{PointerEvent, Subscription};
use crate::reactive::{Effect, ReadSignal, Signal, create_effect, create_signal};

/// Enter and leave transitions of a hover effect.
///
/// Only the `to` patch and the timing of each [`AnimationConfig`] are used:
/// a hover transition always starts from wherever the element currently is.
#[derive(Clone, Debug)]
pub struct HoverConfig {
    pub enter: AnimationConfig,
    pub leave: AnimationConfig,
}

impl HoverConfig {
    pub fn enter(mut self, enter: AnimationConfig) -> Self {
        self.enter = enter;
        self
    }

    pub fn leave(mut self, leave: AnimationConfig) -> Self {
        self.leave = leave;
        self
    }
}

impl Default for HoverConfig {
    /// Lift by 5px and grow 5% on enter; settle back on leave.
    fn default() -> Self {
        let timing = AnimationConfig::new().duration(Duration::from_millis(300));
        Self {
            enter: timing
                .clone()
                .to(VisualPatch::new().scale(1.05).y(-5.0)),
            leave: timing.to(VisualPatch::new().scale(1.0).y(0.0)),
        }
    }
}

struct HoverInner {
    motion: Motion,
    config: HoverConfig,
    element: ElementRef,
    hovered: Signal<bool>,
    owner: OwnerToken,
    driver: RefCell<Option<Driver>>,
    listener: RefCell<Option<Subscription>>,
    effect: RefCell<Option<Effect>>,
    disposed: Cell<bool>,
}

impl HoverInner {
    fn on_attach(self: &Rc<Self>, element: Option<ElementId>) {
        if self.disposed.get() {
            return;
        }
        self.detach();
        let Some(element) = element else {
            return;
        };

        *self.driver.borrow_mut() = Some(Driver::for_element(&self.motion, element));
        let weak = Rc::downgrade(self);
        let listener = self.motion.host().on_pointer(
            element,
            Box::new(move |event| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_pointer(event);
                }
            }),
        );
        *self.listener.borrow_mut() = Some(listener);
    }

    fn on_pointer(&self, event: PointerEvent) {
        let Some(driver) = self.driver.borrow().clone() else {
            return;
        };
        let (hovered, config) = match event {
            PointerEvent::Enter => (true, &self.config.enter),
            PointerEvent::Leave => (false, &self.config.leave),
        };
        self.hovered.set(hovered);

        // Merge over the destination, not the current frame, so a reveal
        // still in flight is not frozen half-way
        let target = driver.target_state().merge(&config.to);
        driver.animate_to(self.owner, target, config.transition(), None);
    }

    fn detach(&self) {
        let listener = self.listener.borrow_mut().take();
        drop(listener);
        let driver = self.driver.borrow_mut().take();
        if let Some(driver) = driver {
            driver.release(self.owner);
        }
    }
}

impl Dispose for HoverInner {
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

impl Drop for HoverInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Pointer-driven enter/leave transition pair.
///
/// Every pointer event supersedes the transition in flight, so rapid
/// toggling always settles on the state of the most recent event.
#[derive(Clone)]
pub struct HoverAnimation {
    inner: Rc<HoverInner>,
}

impl HoverAnimation {
    pub fn element_ref(&self) -> &ElementRef {
        &self.inner.element
    }

    pub fn is_hovered(&self) -> bool {
        self.inner.hovered.get()
    }

    pub fn hovered(&self) -> ReadSignal<bool> {
        self.inner.hovered.read_only()
    }

    pub fn driver(&self) -> Option<Driver> {
        self.inner.driver.borrow().clone()
    }

    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for HoverAnimation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HoverAnimation")
            .field("hovered", &self.inner.hovered.get_untracked())
            .finish_non_exhaustive()
    }
}

pub fn create_hover_animation(motion: &Motion, config: HoverConfig) -> HoverAnimation {
    let inner = Rc::new(HoverInner {
        motion: motion.clone(),
        config,
        element: create_element_ref(),
        hovered: create_signal(false),
        owner: OwnerToken::next(),
        driver: RefCell::new(None),
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
    bind_to_scope(&inner);

    HoverAnimation { inner }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::VisualState;
    use crate::host::{HeadlessHost, Rect};

    #[test]
    fn test_enter_then_leave_settles_at_rest() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let hover = create_hover_animation(&motion, HoverConfig::default());
        let el = host.add_element(Rect::new(0.0, 0.0, 100.0, 100.0));
        hover.element_ref().attach(el);

        host.pointer_enter(el);
        assert!(hover.is_hovered());
        host.run_until_idle();
        let lifted = host.style(el).unwrap();
        assert_eq!(lifted.scale, 1.05);
        assert_eq!(lifted.y, -5.0);

        host.pointer_leave(el);
        host.run_until_idle();
        assert!(!hover.is_hovered());
        assert_eq!(host.style(el), Some(VisualState::REST));
    }

    #[test]
    fn test_pointer_on_other_element_is_ignored() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let hover = create_hover_animation(&motion, HoverConfig::default());
        let el = host.add_element(Rect::new(0.0, 0.0, 100.0, 100.0));
        let other = host.add_element(Rect::new(0.0, 200.0, 100.0, 100.0));
        hover.element_ref().attach(el);

        host.pointer_enter(other);
        assert!(!hover.is_hovered());
        assert!(!hover.driver().unwrap().is_active());
    }
}
