//! Browser host on top of `web-sys`.
//!
//! Elements are registered with [`WebHost::register`] and addressed by
//! [`ElementId`] afterwards. The id is mirrored in a `data-reveal-id`
//! attribute so a node is found again without scanning. Children picked up
//! through [`Host::children`] are registered on the fly and forgotten again
//! on [`Host::release_element`]. Each subscription wraps a JS closure; when its
//! [`Subscription`] is released the closure is retired through a zero-delay
//! timeout instead of being freed on the spot, because the release very
//! often happens from inside that same closure.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{
    Element, Event, HtmlElement, IntersectionObserver, IntersectionObserverEntry,
    IntersectionObserverInit, Window,
};

use super::{
    FrameCallback, Host, IntersectionCallback, IntersectionEntry, ObserverOptions,
    PointerCallback, PointerEvent, Rect, ScrollCallback, Size, Subscription, TimerCallback,
};
use crate::animation::{StyleChanges, VisualState};
use crate::element::ElementId;
use crate::{Motion, MotionConfig, ensure_initialized};

const REDUCED_MOTION_QUERY: &str = "(prefers-reduced-motion: reduce)";
const ID_ATTRIBUTE: &str = "data-reveal-id";

struct WebInner {
    window: Window,
    elements: RefCell<HashMap<ElementId, Element>>,
    /// Registered implicitly by `children`, not by the page
    discovered: RefCell<HashSet<ElementId>>,
    next_id: Cell<u64>,
}

/// [`Host`] backed by the page's `window`.
#[derive(Clone)]
pub struct WebHost {
    inner: Rc<WebInner>,
}

impl WebHost {
    /// `None` outside a browser main thread.
    pub fn new() -> Option<Self> {
        let window = web_sys::window()?;
        Some(Self {
            inner: Rc::new(WebInner {
                window,
                elements: RefCell::new(HashMap::new()),
                discovered: RefCell::new(HashSet::new()),
                next_id: Cell::new(0),
            }),
        })
    }

    /// Id of `element`, registering it on first sight.
    pub fn register(&self, element: &Element) -> ElementId {
        let id = self.lookup(element).unwrap_or_else(|| self.insert(element));
        // Claimed by the page now; `release_element` leaves it alone
        self.inner.discovered.borrow_mut().remove(&id);
        id
    }

    /// Forget an element once it is no longer rendered.
    pub fn unregister(&self, id: ElementId) {
        self.inner.discovered.borrow_mut().remove(&id);
        let element = self.inner.elements.borrow_mut().remove(&id);
        if let Some(element) = element
            && let Err(err) = element.remove_attribute(ID_ATTRIBUTE)
        {
            log::trace!("failed to clear {ID_ATTRIBUTE}: {err:?}");
        }
    }

    /// Number of elements currently registered.
    pub fn registered(&self) -> usize {
        self.inner.elements.borrow().len()
    }

    fn lookup(&self, element: &Element) -> Option<ElementId> {
        let raw = element.get_attribute(ID_ATTRIBUTE)?.parse::<u64>().ok()?;
        let id = ElementId::from_raw(raw);
        // The attribute may come from another host or a cloned node
        let known = self.inner.elements.borrow().get(&id).cloned()?;
        (known == *element).then_some(id)
    }

    fn insert(&self, element: &Element) -> ElementId {
        let id = ElementId::from_raw(self.inner.next_id.get() + 1);
        self.inner.next_id.set(id.raw());
        if let Err(err) = element.set_attribute(ID_ATTRIBUTE, &id.raw().to_string()) {
            log::warn!("failed to tag element: {err:?}");
        }
        self.inner
            .elements
            .borrow_mut()
            .insert(id, element.clone());
        id
    }

    pub fn element(&self, id: ElementId) -> Option<Element> {
        self.inner.elements.borrow().get(&id).cloned()
    }

    fn html_element(&self, id: ElementId) -> Option<HtmlElement> {
        self.element(id)?.dyn_into::<HtmlElement>().ok()
    }

    fn set_style(&self, element: &HtmlElement, property: &str, value: &str) {
        if let Err(err) = element.style().set_property(property, value) {
            log::warn!("failed to set {property}: {err:?}");
        }
    }

    /// Free `closure` after the current JS task finishes.
    fn retire<T: ?Sized + 'static>(window: &Window, closure: Closure<T>) {
        let retired = Closure::once_into_js(move || drop(closure));
        if window
            .set_timeout_with_callback_and_timeout_and_arguments_0(retired.unchecked_ref(), 0)
            .is_err()
        {
            log::warn!("could not schedule closure release");
        }
    }
}

impl std::fmt::Debug for WebHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebHost")
            .field("elements", &self.inner.elements.borrow().len())
            .finish_non_exhaustive()
    }
}

fn to_rect(x: f64, y: f64, width: f64, height: f64) -> Rect {
    Rect::new(x, y, width, height)
}

impl Host for WebHost {
    fn now_ms(&self) -> f64 {
        self.inner
            .window
            .performance()
            .map_or(0.0, |performance| performance.now())
    }

    fn viewport(&self) -> Size {
        let window = &self.inner.window;
        let width = window.inner_width().ok().and_then(|v| v.as_f64());
        let height = window.inner_height().ok().and_then(|v| v.as_f64());
        Size::new(width.unwrap_or(0.0), height.unwrap_or(0.0))
    }

    fn bounding_rect(&self, element: ElementId) -> Option<Rect> {
        let element = self.element(element)?;
        if !element.is_connected() {
            return None;
        }
        let rect = element.get_bounding_client_rect();
        Some(to_rect(rect.x(), rect.y(), rect.width(), rect.height()))
    }

    fn children(&self, element: ElementId) -> Vec<ElementId> {
        let Some(element) = self.element(element) else {
            return Vec::new();
        };
        let children = element.children();
        (0..children.length())
            .filter_map(|index| children.item(index))
            .map(|child| {
                self.lookup(&child).unwrap_or_else(|| {
                    let id = self.insert(&child);
                    self.inner.discovered.borrow_mut().insert(id);
                    id
                })
            })
            .collect()
    }

    fn release_element(&self, element: ElementId) {
        let discovered = self.inner.discovered.borrow_mut().remove(&element);
        if discovered {
            log::trace!("forgetting discovered {element:?}");
            self.unregister(element);
        }
    }

    fn apply_visual(&self, element: ElementId, state: &VisualState, changes: StyleChanges) {
        let Some(element) = self.html_element(element) else {
            return;
        };
        if changes.contains(StyleChanges::OPACITY) {
            self.set_style(&element, "opacity", &state.opacity.to_string());
        }
        if changes.contains(StyleChanges::TRANSFORM) {
            self.set_style(&element, "transform", &state.css_transform());
        }
    }

    fn set_will_change(&self, element: ElementId, enabled: bool) {
        let Some(element) = self.html_element(element) else {
            return;
        };
        if enabled {
            self.set_style(&element, "will-change", "transform");
        } else if let Err(err) = element.style().remove_property("will-change") {
            log::warn!("failed to clear will-change: {err:?}");
        }
    }

    fn prefers_reduced_motion(&self) -> bool {
        matches!(
            self.inner.window.match_media(REDUCED_MOTION_QUERY),
            Ok(Some(query)) if query.matches()
        )
    }

    fn observe_intersection(
        &self,
        element: ElementId,
        options: ObserverOptions,
        mut callback: IntersectionCallback,
    ) -> Subscription {
        let Some(target) = self.element(element) else {
            log::debug!("observe: {element:?} is not registered");
            return Subscription::empty();
        };

        let closure = Closure::<dyn FnMut(js_sys::Array, IntersectionObserver)>::new(
            move |entries: js_sys::Array, _observer: IntersectionObserver| {
                for entry in entries.iter() {
                    let entry: IntersectionObserverEntry = entry.unchecked_into();
                    let bounds = entry.bounding_client_rect();
                    callback(IntersectionEntry {
                        element,
                        is_intersecting: entry.is_intersecting(),
                        ratio: entry.intersection_ratio(),
                        bounds: to_rect(bounds.x(), bounds.y(), bounds.width(), bounds.height()),
                    });
                }
            },
        );

        let init = IntersectionObserverInit::new();
        init.set_threshold(&options.threshold.into());
        init.set_root_margin(&options.root_margin.to_string());
        let observer =
            match IntersectionObserver::new_with_options(closure.as_ref().unchecked_ref(), &init) {
                Ok(observer) => observer,
                Err(err) => {
                    log::warn!("IntersectionObserver unavailable: {err:?}");
                    return Subscription::empty();
                }
            };
        observer.observe(&target);

        let window = self.inner.window.clone();
        Subscription::new(move || {
            observer.disconnect();
            Self::retire(&window, closure);
        })
    }

    fn on_scroll(&self, mut callback: ScrollCallback) -> Subscription {
        let closure = Closure::<dyn FnMut()>::new(move || callback());
        let window = self.inner.window.clone();
        for event in ["scroll", "resize"] {
            if let Err(err) =
                window.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
            {
                log::warn!("failed to listen for {event}: {err:?}");
            }
        }

        Subscription::new(move || {
            for event in ["scroll", "resize"] {
                let _ = window
                    .remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
            }
            Self::retire(&window, closure);
        })
    }

    fn on_pointer(&self, element: ElementId, mut callback: PointerCallback) -> Subscription {
        let Some(target) = self.element(element) else {
            return Subscription::empty();
        };
        let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let kind = if event.type_() == "pointerenter" {
                PointerEvent::Enter
            } else {
                PointerEvent::Leave
            };
            callback(kind);
        });
        for event in ["pointerenter", "pointerleave"] {
            if let Err(err) =
                target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
            {
                log::warn!("failed to listen for {event}: {err:?}");
            }
        }

        let window = self.inner.window.clone();
        Subscription::new(move || {
            for event in ["pointerenter", "pointerleave"] {
                let _ = target
                    .remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
            }
            Self::retire(&window, closure);
        })
    }

    fn request_frame(&self, callback: FrameCallback) -> Subscription {
        let closure = Closure::once(move |now: f64| callback(now));
        let window = self.inner.window.clone();
        let id = match window.request_animation_frame(closure.as_ref().unchecked_ref()) {
            Ok(id) => id,
            Err(err) => {
                log::warn!("requestAnimationFrame failed: {err:?}");
                return Subscription::empty();
            }
        };

        Subscription::new(move || {
            let _ = window.cancel_animation_frame(id);
            Self::retire(&window, closure);
        })
    }

    fn set_timeout(&self, delay_ms: f64, callback: TimerCallback) -> Subscription {
        let closure = Closure::once(move || callback());
        let window = self.inner.window.clone();
        let id = match window.set_timeout_with_callback_and_timeout_and_arguments_0(
            closure.as_ref().unchecked_ref(),
            delay_ms.max(0.0).round() as i32,
        ) {
            Ok(id) => id,
            Err(err) => {
                log::warn!("setTimeout failed: {err:?}");
                return Subscription::empty();
            }
        };

        Subscription::new(move || {
            window.clear_timeout_with_handle(id);
            Self::retire(&window, closure);
        })
    }
}

/// One-time page setup: installs a [`Motion`] over [`WebHost`] for this
/// thread. Later calls return the installed context.
pub fn install(config: MotionConfig) -> Option<Motion> {
    if let Some(motion) = Motion::current() {
        return Some(motion);
    }
    if let Err(err) = config.validate() {
        log::warn!("invalid motion config, using defaults: {err}");
        return install(MotionConfig::default());
    }
    let host = WebHost::new()?;
    Some(ensure_initialized(move || Motion::with_config(host, config)))
}
