use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::visibility::{Visibility, VisibilityOptions, create_visibility};
use super::{Dispose, bind_to_scope};
use crate::Motion;
use crate::animation::{AnimationConfig, Driver, OwnerToken};
use crate::element::{ElementId, ElementRef, create_element_ref};
use crate::reactive::{Effect, ReadSignal, Signal, create_effect, create_signal};

/// Lifecycle of one revealed element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RevealState {
    /// No element attached yet
    #[default]
    Unobserved,
    /// Hidden state applied, waiting to enter view
    Observing,
    /// Entered view, transition running
    Triggered,
    /// Transition finished
    Animated,
}

#[derive(Clone, Debug, Default)]
pub struct RevealOptions {
    /// Hide again on leaving the viewport and animate on every entry
    pub replay: bool,
    /// Overrides the page-wide threshold and root margin
    pub visibility: Option<VisibilityOptions>,
}

impl RevealOptions {
    pub fn replay(mut self, replay: bool) -> Self {
        self.replay = replay;
        self
    }

    pub fn visibility(mut self, visibility: VisibilityOptions) -> Self {
        self.visibility = Some(visibility);
        self
    }
}

struct RevealInner {
    motion: Motion,
    config: AnimationConfig,
    replay: bool,
    element: ElementRef,
    visibility: Visibility,
    state: Signal<RevealState>,
    owner: OwnerToken,
    driver: RefCell<Option<Driver>>,
    effects: RefCell<Vec<Effect>>,
    disposed: Cell<bool>,
}

impl RevealInner {
    fn on_attach(&self, element: Option<ElementId>) {
        if self.disposed.get() {
            return;
        }
        let previous = self.driver.borrow_mut().take();
        if let Some(previous) = previous {
            previous.release(self.owner);
        }

        let Some(element) = element else {
            if self.state.get_untracked() == RevealState::Observing {
                self.state.set(RevealState::Unobserved);
            }
            return;
        };

        let driver = Driver::for_element(&self.motion, element);
        match self.state.get_untracked() {
            RevealState::Unobserved | RevealState::Observing => {
                if self.motion.reduced_motion() {
                    // Never show the hidden state
                    driver.set(self.owner, self.config.target_state());
                } else {
                    driver.set(self.owner, self.config.hidden_state());
                }
                self.state.set(RevealState::Observing);
            }
            RevealState::Triggered | RevealState::Animated => {
                driver.set(self.owner, self.config.target_state());
                self.state.set(RevealState::Animated);
            }
        }
        *self.driver.borrow_mut() = Some(driver);
    }

    fn on_visibility(self: &Rc<Self>, visible: bool) {
        if self.disposed.get() {
            return;
        }
        let Some(driver) = self.driver.borrow().clone() else {
            return;
        };
        let state = self.state.get_untracked();

        if visible {
            if state != RevealState::Observing {
                log::trace!("reveal: entry ignored in {state:?}");
                return;
            }
            log::debug!("reveal triggered for {:?}", driver.element());
            self.state.set(RevealState::Triggered);
            let weak: Weak<Self> = Rc::downgrade(self);
            driver.animate_to(
                self.owner,
                self.config.target_state(),
                self.config.transition(),
                Some(Box::new(move || {
                    if let Some(inner) = weak.upgrade()
                        && !inner.disposed.get()
                        && inner.state.get_untracked() == RevealState::Triggered
                    {
                        inner.state.set(RevealState::Animated);
                    }
                })),
            );
        } else if self.replay && matches!(state, RevealState::Triggered | RevealState::Animated) {
            driver.set(self.owner, self.config.hidden_state());
            self.state.set(RevealState::Observing);
        }
    }
}

impl Dispose for RevealInner {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.visibility.dispose();
        let effects = std::mem::take(&mut *self.effects.borrow_mut());
        for effect in effects {
            effect.dispose();
        }
        let driver = self.driver.borrow_mut().take();
        if let Some(driver) = driver {
            driver.release(self.owner);
        }
    }
}

impl Drop for RevealInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Animates an element in, once, the first time it scrolls into view.
///
/// ```ignore
/// let reveal = create_scroll_reveal(&motion, AnimationConfig::default());
/// reveal.element_ref().attach(card);
/// ```
#[derive(Clone)]
pub struct ScrollReveal {
    inner: Rc<RevealInner>,
}

impl ScrollReveal {
    pub fn element_ref(&self) -> &ElementRef {
        &self.inner.element
    }

    /// Tracked read of the lifecycle state.
    pub fn state(&self) -> RevealState {
        self.inner.state.get()
    }

    pub fn state_signal(&self) -> ReadSignal<RevealState> {
        self.inner.state.read_only()
    }

    /// Whether the element has entered view.
    pub fn is_visible(&self) -> bool {
        self.inner.visibility.is_visible()
    }

    /// Whether the entrance transition has completed.
    pub fn has_animated(&self) -> bool {
        self.state() == RevealState::Animated
    }

    /// The attached element's driver.
    pub fn driver(&self) -> Option<Driver> {
        self.inner.driver.borrow().clone()
    }

    pub fn config(&self) -> &AnimationConfig {
        &self.inner.config
    }

    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for ScrollReveal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollReveal")
            .field("state", &self.inner.state.get_untracked())
            .field("replay", &self.inner.replay)
            .finish_non_exhaustive()
    }
}

/// Reveal an element once, with the page-wide visibility settings.
pub fn create_scroll_reveal(motion: &Motion, config: AnimationConfig) -> ScrollReveal {
    create_scroll_reveal_with(motion, config, RevealOptions::default())
}

pub fn create_scroll_reveal_with(
    motion: &Motion,
    config: AnimationConfig,
    options: RevealOptions,
) -> ScrollReveal {
    let element = create_element_ref();
    let visibility_options = options
        .visibility
        .unwrap_or_else(|| VisibilityOptions::from(motion.config()))
        .once(!options.replay);
    let visibility = create_visibility(motion, &element, visibility_options);

    let inner = Rc::new(RevealInner {
        motion: motion.clone(),
        config,
        replay: options.replay,
        element,
        visibility,
        state: create_signal(RevealState::Unobserved),
        owner: OwnerToken::next(),
        driver: RefCell::new(None),
        effects: RefCell::new(Vec::new()),
        disposed: Cell::new(false),
    });

    let attach = create_effect({
        let weak = Rc::downgrade(&inner);
        move || {
            if let Some(inner) = weak.upgrade() {
                let element = inner.element.get();
                inner.on_attach(element);
            }
        }
    });
    let trigger = create_effect({
        let weak = Rc::downgrade(&inner);
        move || {
            if let Some(inner) = weak.upgrade() {
                let visible = inner.visibility.is_visible();
                inner.on_visibility(visible);
            }
        }
    });
    inner.effects.borrow_mut().extend([attach, trigger]);
    bind_to_scope(&inner);

    ScrollReveal { inner }
}
