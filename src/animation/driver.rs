//! Per-element animation drivers.
//!
//! Every element gets exactly one [`Driver`] per host, shared by all the
//! controllers that animate it. Because they share one [`Animator`], a new
//! request on an element always supersedes the previous one, whichever
//! controller issued either.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use super::animator::WeakAnimator;
use super::{AnimationConfig, Animator, Transition, VisualState};
use crate::Motion;
use crate::element::{ElementId, ElementRef};

thread_local! {
    static DRIVERS: RefCell<HashMap<(usize, ElementId), WeakAnimator<VisualState>>> =
        RefCell::new(HashMap::new());
    static NEXT_OWNER: Cell<u64> = const { Cell::new(0) };
}

/// Identifies the controller that issued a request, so teardown can cancel
/// its own work without touching a sibling's.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OwnerToken(u64);

impl OwnerToken {
    pub fn next() -> Self {
        NEXT_OWNER.with(|next| {
            let id = next.get() + 1;
            next.set(id);
            Self(id)
        })
    }
}

/// The shared animator of one element, writing styles through the host.
#[derive(Clone, Debug)]
pub struct Driver {
    element: ElementId,
    animator: Animator<VisualState>,
}

impl Driver {
    /// The driver of `element`, created on first use.
    pub fn for_element(motion: &Motion, element: ElementId) -> Self {
        let key = (motion.host_key(), element);
        let existing =
            DRIVERS.with(|drivers| drivers.borrow().get(&key).and_then(WeakAnimator::upgrade));
        if let Some(animator) = existing {
            return Self { element, animator };
        }

        let host = motion.host().clone();
        let mut applied: Option<VisualState> = None;
        let animator = Animator::new(motion, VisualState::REST, move |state: &VisualState| {
            let changes = state.changes_from(applied.as_ref());
            if !changes.is_empty() {
                host.apply_visual(element, state, changes);
            }
            applied = Some(*state);
        });

        DRIVERS.with(|drivers| {
            let mut drivers = drivers.borrow_mut();
            drivers.retain(|_, weak| weak.is_alive());
            drivers.insert(key, animator.downgrade());
        });
        log::trace!("driver created for {element:?}");
        Self { element, animator }
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    /// Visual state most recently produced.
    pub fn state(&self) -> VisualState {
        self.animator.value()
    }

    /// Visual state the element is heading towards.
    pub fn target_state(&self) -> VisualState {
        self.animator.target()
    }

    /// Jump to `state`, superseding any running transition.
    pub fn set(&self, owner: OwnerToken, state: VisualState) {
        self.animator.set_as(Some(owner), state);
    }

    /// Transition to `target`, superseding any running transition.
    pub fn animate_to(
        &self,
        owner: OwnerToken,
        target: VisualState,
        transition: Transition,
        on_complete: Option<Box<dyn FnOnce()>>,
    ) {
        self.animator.start(Some(owner), target, transition, on_complete);
    }

    /// Kill the running transition if `owner` issued it.
    pub fn release(&self, owner: OwnerToken) {
        self.animator.release(owner);
    }

    pub fn is_owned_by(&self, owner: OwnerToken) -> bool {
        self.animator.owner() == Some(owner)
    }

    pub fn is_active(&self) -> bool {
        self.animator.is_active()
    }

    pub fn handle(&self) -> AnimationHandle {
        AnimationHandle {
            driver: self.clone(),
        }
    }

    pub fn animator(&self) -> &Animator<VisualState> {
        &self.animator
    }
}

/// Playback controls for the transition running on one element.
#[derive(Clone, Debug)]
pub struct AnimationHandle {
    driver: Driver,
}

impl AnimationHandle {
    pub fn element(&self) -> ElementId {
        self.driver.element
    }

    pub fn play(&self) {
        self.driver.animator.play();
    }

    pub fn pause(&self) {
        self.driver.animator.pause();
    }

    pub fn reverse(&self) {
        self.driver.animator.reverse();
    }

    pub fn restart(&self) {
        self.driver.animator.restart();
    }

    pub fn kill(&self) {
        self.driver.animator.kill();
    }

    pub fn is_active(&self) -> bool {
        self.driver.animator.is_active()
    }

    pub fn progress(&self) -> f32 {
        self.driver.animator.progress()
    }
}

/// Apply the hidden state of `config` to the element, then transition it to
/// the target state.
///
/// Returns `None` without doing anything when the ref is not attached.
pub fn animate(
    motion: &Motion,
    element: &ElementRef,
    config: &AnimationConfig,
) -> Option<AnimationHandle> {
    let Some(id) = element.get_untracked() else {
        log::debug!("animate: element not attached, skipped");
        return None;
    };
    let driver = Driver::for_element(motion, id);
    let owner = OwnerToken::next();
    if !motion.reduced_motion() {
        driver.set(owner, config.hidden_state());
    }
    driver.animate_to(owner, config.target_state(), config.transition(), None);
    Some(driver.handle())
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::animation::VisualPatch;
    use crate::element::create_element_ref;
    use crate::host::{HeadlessHost, Rect};

    #[test]
    fn test_one_driver_per_element() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let el = host.add_element(Rect::new(0.0, 0.0, 10.0, 10.0));

        let a = Driver::for_element(&motion, el);
        let b = Driver::for_element(&motion, el);
        let dimmed = VisualState::REST.merge(&VisualPatch::new().opacity(0.5));
        a.set(OwnerToken::next(), dimmed);
        assert_eq!(b.state().opacity, 0.5);
    }

    #[test]
    fn test_release_only_cancels_own_work() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let el = host.add_element(Rect::new(0.0, 0.0, 10.0, 10.0));
        let driver = Driver::for_element(&motion, el);
        let (mine, theirs) = (OwnerToken::next(), OwnerToken::next());

        driver.animate_to(theirs, VisualState::REST, Transition::default(), None);
        driver.release(mine);
        assert!(driver.is_active());

        driver.release(theirs);
        assert!(!driver.is_active());
    }

    #[test]
    fn test_animate_unattached_is_noop() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let element = create_element_ref();

        assert!(animate(&motion, &element, &AnimationConfig::default()).is_none());
        assert_eq!(host.active_subscriptions().total(), 0);
    }

    #[test]
    fn test_animate_fades_in_from_hidden() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let el = host.add_element(Rect::new(0.0, 0.0, 10.0, 10.0));
        let element = create_element_ref();
        element.attach(el);

        let handle = animate(&motion, &element, &AnimationConfig::default()).unwrap();
        assert_eq!(host.style(el).map(|s| s.opacity), Some(0.0));
        assert!(handle.is_active());

        host.advance(800.0);
        assert_eq!(host.style(el), Some(VisualState::REST));
        assert!(!handle.is_active());
    }

    #[test]
    fn test_zero_duration_animation_reverses_to_hidden() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let el = host.add_element(Rect::new(0.0, 0.0, 10.0, 10.0));
        let element = create_element_ref();
        element.attach(el);

        let config = AnimationConfig::default().duration(Duration::ZERO);
        let handle = animate(&motion, &element, &config).unwrap();
        assert_eq!(host.style(el), Some(config.target_state()));

        handle.reverse();
        host.run_until_idle();
        assert_eq!(host.style(el), Some(config.hidden_state()));
        assert!(!handle.is_active());
        assert_eq!(host.active_subscriptions().frames, 0);
    }

    #[test]
    fn test_completion_follows_takeover_by_another_owner() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let el = host.add_element(Rect::new(0.0, 0.0, 10.0, 10.0));
        let driver = Driver::for_element(&motion, el);
        let (entrance, hover) = (OwnerToken::next(), OwnerToken::next());
        let done = Rc::new(Cell::new(0));

        let faded = VisualState::REST.merge(&VisualPatch::new().opacity(0.5));
        driver.animate_to(
            entrance,
            VisualState::REST,
            Transition::default(),
            Some(Box::new({
                let done = done.clone();
                move || done.set(done.get() + 1)
            })),
        );
        host.advance(100.0);
        driver.animate_to(hover, faded, Transition::default(), None);
        host.advance(100.0);
        driver.animate_to(hover, VisualState::REST, Transition::default(), None);
        assert_eq!(done.get(), 0);

        host.run_until_idle();
        assert_eq!(done.get(), 1);
    }

    #[test]
    fn test_owner_replacing_own_work_drops_completion() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let el = host.add_element(Rect::new(0.0, 0.0, 10.0, 10.0));
        let driver = Driver::for_element(&motion, el);
        let owner = OwnerToken::next();
        let done = Rc::new(Cell::new(false));

        driver.animate_to(
            owner,
            VisualState::REST,
            Transition::default(),
            Some(Box::new({
                let done = done.clone();
                move || done.set(true)
            })),
        );
        host.advance(100.0);
        driver.set(owner, VisualState::REST);
        host.run_until_idle();
        assert!(!done.get());
    }
}
