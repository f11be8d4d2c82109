use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{Dispose, bind_to_scope};
use crate::element::{ElementId, ElementRef};
use crate::error::ConfigError;
use crate::host::{IntersectionEntry, ObserverOptions, RootMargin, Subscription};
use crate::reactive::{Effect, ReadSignal, Signal, create_effect, create_signal};
use crate::{Motion, MotionConfig, validate_threshold};

/// How an element's visibility is watched.
#[derive(Clone, Debug, PartialEq)]
pub struct VisibilityOptions {
    pub threshold: f64,
    pub root_margin: RootMargin,
    /// Stop watching after the first qualifying entry
    pub once: bool,
}

impl VisibilityOptions {
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn root_margin(mut self, root_margin: RootMargin) -> Self {
        self.root_margin = root_margin;
        self
    }

    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_threshold(self.threshold)
    }

    fn observer_options(&self) -> ObserverOptions {
        ObserverOptions {
            threshold: self.threshold,
            root_margin: self.root_margin,
        }
    }
}

impl Default for VisibilityOptions {
    fn default() -> Self {
        Self::from(&MotionConfig::default())
    }
}

impl From<&MotionConfig> for VisibilityOptions {
    fn from(config: &MotionConfig) -> Self {
        Self {
            threshold: config.threshold,
            root_margin: config.root_margin,
            once: true,
        }
    }
}

struct VisibilityInner {
    motion: Motion,
    element: ElementRef,
    options: VisibilityOptions,
    visible: Signal<bool>,
    watch: RefCell<Option<Subscription>>,
    effect: RefCell<Option<Effect>>,
    disposed: Cell<bool>,
}

impl VisibilityInner {
    fn watch_element(self: &Rc<Self>, element: Option<ElementId>) {
        if self.disposed.get() {
            return;
        }
        let previous = self.watch.borrow_mut().take();
        drop(previous);

        let Some(element) = element else {
            log::debug!("visibility: element not attached, waiting");
            if !self.options.once {
                self.visible.set(false);
            }
            return;
        };
        if self.options.once && self.visible.get_untracked() {
            return;
        }

        let weak = Rc::downgrade(self);
        let watch = self.motion.host().observe_intersection(
            element,
            self.options.observer_options(),
            Box::new(move |entry| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_entry(entry);
                }
            }),
        );
        *self.watch.borrow_mut() = Some(watch);
    }

    fn on_entry(&self, entry: IntersectionEntry) {
        let qualifies = entry.qualifies(self.options.threshold);
        if !self.options.once {
            self.visible.set(qualifies);
            return;
        }
        if qualifies && !self.visible.get_untracked() {
            let watch = self.watch.borrow_mut().take();
            drop(watch);
            log::debug!("{:?} entered view", entry.element);
            self.visible.set(true);
        }
    }
}

impl Dispose for VisibilityInner {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let watch = self.watch.borrow_mut().take();
        drop(watch);
        let effect = self.effect.borrow_mut().take();
        if let Some(effect) = effect {
            effect.dispose();
        }
    }
}

impl Drop for VisibilityInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Reports whether an element has entered the viewport.
///
/// In one-shot mode (the default) the flag latches on the first qualifying
/// intersection and the watch is released right away. An unattached ref is
/// not observed; observation starts on the next attachment.
#[derive(Clone)]
pub struct Visibility {
    inner: Rc<VisibilityInner>,
}

impl Visibility {
    pub fn element_ref(&self) -> &ElementRef {
        &self.inner.element
    }

    /// Tracked read of the visibility flag.
    pub fn is_visible(&self) -> bool {
        self.inner.visible.get()
    }

    pub fn visible(&self) -> ReadSignal<bool> {
        self.inner.visible.read_only()
    }

    /// Whether an intersection watch is currently registered.
    pub fn is_watching(&self) -> bool {
        self.inner.watch.borrow().is_some()
    }

    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Visibility")
            .field("visible", &self.inner.visible.get_untracked())
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

/// Watch `element` for its first entry into view.
pub fn create_visibility(
    motion: &Motion,
    element: &ElementRef,
    options: VisibilityOptions,
) -> Visibility {
    let inner = Rc::new(VisibilityInner {
        motion: motion.clone(),
        element: element.clone(),
        options,
        visible: create_signal(false),
        watch: RefCell::new(None),
        effect: RefCell::new(None),
        disposed: Cell::new(false),
    });

    let weak = Rc::downgrade(&inner);
    let effect = create_effect(move || {
        if let Some(inner) = weak.upgrade() {
            let element = inner.element.get();
            inner.watch_element(element);
        }
    });
    *inner.effect.borrow_mut() = Some(effect);
    bind_to_scope(&inner);

    Visibility { inner }
}
