//! The boundary between controllers and the layout/event engine.
//!
//! Controllers never touch a browser directly. They ask a [`Host`] for
//! geometry, register watches and listeners on it, and write visual state
//! through it. Every registration hands back a [`Subscription`]; dropping
//! that value is the one and only way to release the registration, which
//! is what makes teardown automatic when a controller's scope is disposed.

mod geometry;
mod headless;
#[cfg(feature = "web")]
pub mod web;

use std::fmt;

pub use geometry::{MarginValue, Rect, RootMargin, Size};
pub use headless::{HeadlessHost, SubscriptionCounts};

use crate::animation::{StyleChanges, VisualState};
use crate::element::ElementId;

/// Options for one intersection watch.
#[derive(Clone, Debug, PartialEq)]
pub struct ObserverOptions {
    /// Fraction of the element that must be visible (0.0 to 1.0)
    pub threshold: f64,
    /// Grows (positive) or shrinks (negative) the viewport before testing
    pub root_margin: RootMargin,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            root_margin: RootMargin::default(),
        }
    }
}

/// One intersection report for a watched element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntersectionEntry {
    pub element: ElementId,
    pub is_intersecting: bool,
    /// Visible fraction of the element (0.0 to 1.0)
    pub ratio: f64,
    /// Viewport-relative bounds at the time of the report
    pub bounds: Rect,
}

impl IntersectionEntry {
    /// Whether this entry satisfies a watch with the given threshold.
    pub fn qualifies(&self, threshold: f64) -> bool {
        self.is_intersecting && self.ratio + f64::EPSILON >= threshold
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerEvent {
    Enter,
    Leave,
}

pub type IntersectionCallback = Box<dyn FnMut(IntersectionEntry)>;
pub type ScrollCallback = Box<dyn FnMut()>;
pub type PointerCallback = Box<dyn FnMut(PointerEvent)>;
pub type FrameCallback = Box<dyn FnOnce(f64)>;
pub type TimerCallback = Box<dyn FnOnce()>;

/// The layout/event engine controllers run against.
///
/// Single-threaded: callbacks are dispatched from the host's event loop,
/// never re-entrantly from inside a registration call. A host must allow a
/// [`Subscription`] to be dropped from inside its own callback.
pub trait Host {
    /// Monotonic clock in milliseconds.
    fn now_ms(&self) -> f64;

    fn viewport(&self) -> Size;

    /// Viewport-relative bounds as rendered, applied transforms included;
    /// `None` when the element is not rendered.
    fn bounding_rect(&self, element: ElementId) -> Option<Rect>;

    /// Current children in document order.
    fn children(&self, element: ElementId) -> Vec<ElementId>;

    /// The caller that found `element` through [`children`](Self::children)
    /// is done with it. Hosts that hand out ids lazily may drop their record.
    fn release_element(&self, _element: ElementId) {}

    /// Write the properties named by `changes`.
    fn apply_visual(&self, element: ElementId, state: &VisualState, changes: StyleChanges);

    /// Hint that the element's transform will change continuously.
    fn set_will_change(&self, element: ElementId, enabled: bool);

    fn prefers_reduced_motion(&self) -> bool;

    fn observe_intersection(
        &self,
        element: ElementId,
        options: ObserverOptions,
        callback: IntersectionCallback,
    ) -> Subscription;

    /// Called on every scroll and every viewport resize.
    fn on_scroll(&self, callback: ScrollCallback) -> Subscription;

    fn on_pointer(&self, element: ElementId, callback: PointerCallback) -> Subscription;

    /// Run `callback` once on the next animation frame.
    fn request_frame(&self, callback: FrameCallback) -> Subscription;

    fn set_timeout(&self, delay_ms: f64, callback: TimerCallback) -> Subscription;
}

/// Releases a host registration when dropped.
#[must_use = "dropping a Subscription releases it immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription with nothing to release.
    pub fn empty() -> Self {
        Self { release: None }
    }

    /// Release now instead of at drop.
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("live", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_subscription_releases_once() {
        let count = Rc::new(Cell::new(0));
        let sub = Subscription::new({
            let count = count.clone();
            move || count.set(count.get() + 1)
        });
        sub.release();
        assert_eq!(count.get(), 1);

        {
            let count = count.clone();
            let _sub = Subscription::new(move || count.set(count.get() + 1));
        }
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_entry_qualifies_against_threshold() {
        let entry = IntersectionEntry {
            element: ElementId::from_raw(1),
            is_intersecting: true,
            ratio: 0.1,
            bounds: Rect::new(0.0, 0.0, 10.0, 10.0),
        };
        assert!(entry.qualifies(0.1));
        assert!(!entry.qualifies(0.5));
        assert!(
            !IntersectionEntry {
                is_intersecting: false,
                ..entry
            }
            .qualifies(0.0)
        );
    }
}
