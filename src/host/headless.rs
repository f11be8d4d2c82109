//! In-memory host with a manual clock.
//!
//! `HeadlessHost` lays elements out in document coordinates, scrolls a
//! viewport over them and runs frames/timers only when told to, so every
//! controller can be driven deterministically. It also counts live
//! registrations, which is how teardown is verified.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use super::{
    FrameCallback, Host, IntersectionCallback, IntersectionEntry, ObserverOptions,
    PointerCallback, PointerEvent, Rect, ScrollCallback, Size, Subscription, TimerCallback,
};
use crate::animation::{StyleChanges, VisualState};
use crate::element::ElementId;

/// Length of one simulated animation frame.
pub const FRAME_MS: f64 = 16.0;

/// Upper bound on frames [`HeadlessHost::run_until_idle`] will simulate.
const IDLE_FRAME_LIMIT: usize = 100_000;

/// Live registrations held by a host, by kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubscriptionCounts {
    pub observers: usize,
    pub scroll: usize,
    pub pointer: usize,
    pub frames: usize,
    pub timers: usize,
}

impl SubscriptionCounts {
    pub fn total(&self) -> usize {
        self.observers + self.scroll + self.pointer + self.frames + self.timers
    }
}

struct Node {
    /// Document-space bounds
    rect: Rect,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    style: Option<VisualState>,
    style_writes: usize,
    will_change: bool,
}

struct Observer {
    element: ElementId,
    options: ObserverOptions,
    callback: Rc<RefCell<IntersectionCallback>>,
    /// Qualifying state last reported; `None` before the initial report
    last: Option<bool>,
}

struct State {
    now_ms: f64,
    viewport: Size,
    scroll_x: f64,
    scroll_y: f64,
    reduced_motion: bool,
    nodes: BTreeMap<ElementId, Node>,
    next_element: u64,
    next_registration: u64,
    observers: BTreeMap<u64, Observer>,
    scroll_listeners: BTreeMap<u64, Rc<RefCell<ScrollCallback>>>,
    pointer_listeners: BTreeMap<u64, (ElementId, Rc<RefCell<PointerCallback>>)>,
    frames: BTreeMap<u64, FrameCallback>,
    timers: BTreeMap<u64, (f64, TimerCallback)>,
}

impl State {
    fn next_registration(&mut self) -> u64 {
        self.next_registration += 1;
        self.next_registration
    }

    fn layout_rect(&self, element: ElementId) -> Option<Rect> {
        self.nodes
            .get(&element)
            .map(|node| node.rect.offset(-self.scroll_x, -self.scroll_y))
    }

    /// Layout box moved by the element's applied transform, as a browser
    /// reports it.
    fn bounding_rect(&self, element: ElementId) -> Option<Rect> {
        let layout = self.layout_rect(element)?;
        let style = self.nodes.get(&element)?.style;
        Some(style.map_or(layout, |style| style.rendered_rect(layout)))
    }

    fn entry_for(&self, element: ElementId, options: &ObserverOptions) -> IntersectionEntry {
        let Some(bounds) = self.bounding_rect(element) else {
            return IntersectionEntry {
                element,
                is_intersecting: false,
                ratio: 0.0,
                bounds: Rect::default(),
            };
        };
        let root = options.root_margin.apply(self.viewport);
        let overlap = bounds.intersection(&root);
        let area = bounds.area();
        let (is_intersecting, ratio) = match overlap {
            Some(overlap) if area > 0.0 => (overlap.area() > 0.0, overlap.area() / area),
            Some(_) => (true, 1.0),
            None => (false, 0.0),
        };
        IntersectionEntry {
            element,
            is_intersecting,
            ratio,
            bounds,
        }
    }
}

/// Deterministic [`Host`] for tests and non-browser drivers.
#[derive(Clone)]
pub struct HeadlessHost {
    state: Rc<RefCell<State>>,
}

impl HeadlessHost {
    pub fn new(viewport: Size) -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                now_ms: 0.0,
                viewport,
                scroll_x: 0.0,
                scroll_y: 0.0,
                reduced_motion: false,
                nodes: BTreeMap::new(),
                next_element: 0,
                next_registration: 0,
                observers: BTreeMap::new(),
                scroll_listeners: BTreeMap::new(),
                pointer_listeners: BTreeMap::new(),
                frames: BTreeMap::new(),
                timers: BTreeMap::new(),
            })),
        }
    }

    // -- document -----------------------------------------------------------

    /// Add a top-level element at document-space `rect`.
    pub fn add_element(&self, rect: Rect) -> ElementId {
        self.insert_node(None, rect)
    }

    /// Add an element as the last child of `parent`.
    pub fn add_child(&self, parent: ElementId, rect: Rect) -> ElementId {
        self.insert_node(Some(parent), rect)
    }

    fn insert_node(&self, parent: Option<ElementId>, rect: Rect) -> ElementId {
        let mut state = self.state.borrow_mut();
        state.next_element += 1;
        let id = ElementId::from_raw(state.next_element);
        state.nodes.insert(
            id,
            Node {
                rect,
                parent,
                children: Vec::new(),
                style: None,
                style_writes: 0,
                will_change: false,
            },
        );
        if let Some(parent) = parent
            && let Some(parent_node) = state.nodes.get_mut(&parent)
        {
            parent_node.children.push(id);
        }
        id
    }

    /// Move an element; intersection watches are re-evaluated.
    pub fn set_rect(&self, element: ElementId, rect: Rect) {
        if let Some(node) = self.state.borrow_mut().nodes.get_mut(&element) {
            node.rect = rect;
        }
        self.flush_intersections();
    }

    /// Remove an element and its subtree from the document.
    pub fn remove_element(&self, element: ElementId) {
        {
            let mut state = self.state.borrow_mut();
            let parent = state.nodes.get(&element).and_then(|node| node.parent);
            if let Some(parent) = parent
                && let Some(parent_node) = state.nodes.get_mut(&parent)
            {
                parent_node.children.retain(|child| *child != element);
            }
            let mut stack = vec![element];
            while let Some(id) = stack.pop() {
                if let Some(node) = state.nodes.remove(&id) {
                    stack.extend(node.children);
                }
            }
        }
        self.flush_intersections();
    }

    // -- viewport -----------------------------------------------------------

    /// Scroll the viewport to a document-space vertical offset.
    pub fn scroll_to(&self, y: f64) {
        self.state.borrow_mut().scroll_y = y;
        self.dispatch_scroll();
    }

    pub fn scroll_to_xy(&self, x: f64, y: f64) {
        {
            let mut state = self.state.borrow_mut();
            state.scroll_x = x;
            state.scroll_y = y;
        }
        self.dispatch_scroll();
    }

    pub fn resize(&self, viewport: Size) {
        self.state.borrow_mut().viewport = viewport;
        self.dispatch_scroll();
    }

    pub fn scroll_y(&self) -> f64 {
        self.state.borrow().scroll_y
    }

    pub fn set_reduced_motion(&self, reduced: bool) {
        self.state.borrow_mut().reduced_motion = reduced;
    }

    fn dispatch_scroll(&self) {
        let listeners: Vec<_> = self
            .state
            .borrow()
            .scroll_listeners
            .iter()
            .map(|(id, callback)| (*id, callback.clone()))
            .collect();
        for (id, callback) in listeners {
            if self.state.borrow().scroll_listeners.contains_key(&id) {
                (callback.borrow_mut())();
            }
        }
        self.flush_intersections();
    }

    /// Deliver an entry to every watch whose qualifying state changed.
    pub fn flush_intersections(&self) {
        let deliveries: Vec<_> = {
            let mut state = self.state.borrow_mut();
            let entries: Vec<_> = state
                .observers
                .iter()
                .map(|(id, observer)| {
                    let entry = state.entry_for(observer.element, &observer.options);
                    (*id, entry, entry.qualifies(observer.options.threshold))
                })
                .collect();
            entries
                .into_iter()
                .filter_map(|(id, entry, qualifies)| {
                    let observer = state.observers.get_mut(&id)?;
                    if observer.last == Some(qualifies) {
                        return None;
                    }
                    observer.last = Some(qualifies);
                    Some((id, entry, observer.callback.clone()))
                })
                .collect()
        };

        for (id, entry, callback) in deliveries {
            // An earlier callback in this batch may have released this watch
            if self.state.borrow().observers.contains_key(&id) {
                log::trace!("intersection {:?} ratio {:.2}", entry.element, entry.ratio);
                (callback.borrow_mut())(entry);
            }
        }
    }

    // -- pointer ------------------------------------------------------------

    pub fn pointer_enter(&self, element: ElementId) {
        self.dispatch_pointer(element, PointerEvent::Enter);
    }

    pub fn pointer_leave(&self, element: ElementId) {
        self.dispatch_pointer(element, PointerEvent::Leave);
    }

    fn dispatch_pointer(&self, element: ElementId, event: PointerEvent) {
        let listeners: Vec<_> = self
            .state
            .borrow()
            .pointer_listeners
            .iter()
            .filter(|(_, (target, _))| *target == element)
            .map(|(id, (_, callback))| (*id, callback.clone()))
            .collect();
        for (id, callback) in listeners {
            if self.state.borrow().pointer_listeners.contains_key(&id) {
                (callback.borrow_mut())(event);
            }
        }
    }

    // -- clock --------------------------------------------------------------

    /// Run one frame of [`FRAME_MS`].
    pub fn tick(&self) {
        self.step(FRAME_MS);
    }

    /// Advance the clock by `ms`, in frame-sized steps.
    pub fn advance(&self, ms: f64) {
        let target = self.now_ms() + ms;
        while self.now_ms() < target {
            let step = FRAME_MS.min(target - self.now_ms());
            self.step(step);
        }
    }

    /// Run frames and timers until nothing is pending.
    pub fn run_until_idle(&self) {
        for _ in 0..IDLE_FRAME_LIMIT {
            let (has_frames, next_timer) = {
                let state = self.state.borrow();
                let next_timer = state
                    .timers
                    .values()
                    .map(|(due, _)| *due)
                    .fold(None, |min: Option<f64>, due| {
                        Some(min.map_or(due, |m| m.min(due)))
                    });
                (!state.frames.is_empty(), next_timer)
            };
            if has_frames {
                self.tick();
            } else if let Some(due) = next_timer {
                self.advance((due - self.now_ms()).max(0.0).max(f64::EPSILON));
            } else {
                return;
            }
        }
        log::warn!("headless host still busy after {IDLE_FRAME_LIMIT} frames");
    }

    fn step(&self, dt: f64) {
        let now = {
            let mut state = self.state.borrow_mut();
            state.now_ms += dt;
            state.now_ms
        };
        self.fire_timers(now);
        self.fire_frames(now);
        self.flush_intersections();
    }

    fn fire_timers(&self, now: f64) {
        let mut due: Vec<(f64, u64)> = self
            .state
            .borrow()
            .timers
            .iter()
            .filter(|(_, (at, _))| *at <= now)
            .map(|(id, (at, _))| (*at, *id))
            .collect();
        due.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        for (_, id) in due {
            let timer = self.state.borrow_mut().timers.remove(&id);
            if let Some((_, callback)) = timer {
                callback();
            }
        }
    }

    fn fire_frames(&self, now: f64) {
        // Frames requested by these callbacks run on the next step
        let ids: Vec<u64> = self.state.borrow().frames.keys().copied().collect();
        for id in ids {
            let frame = self.state.borrow_mut().frames.remove(&id);
            if let Some(callback) = frame {
                callback(now);
            }
        }
    }

    // -- inspection ---------------------------------------------------------

    /// Viewport-relative bounds with applied transforms left out.
    pub fn layout_rect(&self, element: ElementId) -> Option<Rect> {
        self.state.borrow().layout_rect(element)
    }

    /// Last visual state written to the element.
    pub fn style(&self, element: ElementId) -> Option<VisualState> {
        self.state
            .borrow()
            .nodes
            .get(&element)
            .and_then(|node| node.style)
    }

    /// Number of style writes the element has received.
    pub fn style_writes(&self, element: ElementId) -> usize {
        self.state
            .borrow()
            .nodes
            .get(&element)
            .map_or(0, |node| node.style_writes)
    }

    pub fn will_change(&self, element: ElementId) -> bool {
        self.state
            .borrow()
            .nodes
            .get(&element)
            .is_some_and(|node| node.will_change)
    }

    pub fn active_subscriptions(&self) -> SubscriptionCounts {
        let state = self.state.borrow();
        SubscriptionCounts {
            observers: state.observers.len(),
            scroll: state.scroll_listeners.len(),
            pointer: state.pointer_listeners.len(),
            frames: state.frames.len(),
            timers: state.timers.len(),
        }
    }

    fn weak_state(&self) -> Weak<RefCell<State>> {
        Rc::downgrade(&self.state)
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new(Size::new(1280.0, 800.0))
    }
}

impl std::fmt::Debug for HeadlessHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("HeadlessHost")
            .field("now_ms", &state.now_ms)
            .field("viewport", &state.viewport)
            .field("scroll_y", &state.scroll_y)
            .field("elements", &state.nodes.len())
            .finish_non_exhaustive()
    }
}

/// Build a release closure that removes one registration from `State`.
///
/// The removed value is dropped after the borrow ends: it may own captures
/// whose own teardown reaches back into the host.
fn release<T: 'static>(
    state: Weak<RefCell<State>>,
    id: u64,
    remove: fn(&mut State, u64) -> Option<T>,
) -> Subscription {
    Subscription::new(move || {
        if let Some(state) = state.upgrade() {
            let removed = remove(&mut state.borrow_mut(), id);
            drop(removed);
        }
    })
}

impl Host for HeadlessHost {
    fn now_ms(&self) -> f64 {
        self.state.borrow().now_ms
    }

    fn viewport(&self) -> Size {
        self.state.borrow().viewport
    }

    fn bounding_rect(&self, element: ElementId) -> Option<Rect> {
        self.state.borrow().bounding_rect(element)
    }

    fn children(&self, element: ElementId) -> Vec<ElementId> {
        self.state
            .borrow()
            .nodes
            .get(&element)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    fn apply_visual(&self, element: ElementId, state: &VisualState, changes: StyleChanges) {
        if changes.is_empty() {
            return;
        }
        match self.state.borrow_mut().nodes.get_mut(&element) {
            Some(node) => {
                node.style = Some(*state);
                node.style_writes += 1;
            }
            None => log::trace!("style write to detached {element:?} ignored"),
        }
    }

    fn set_will_change(&self, element: ElementId, enabled: bool) {
        if let Some(node) = self.state.borrow_mut().nodes.get_mut(&element) {
            node.will_change = enabled;
        }
    }

    fn prefers_reduced_motion(&self) -> bool {
        self.state.borrow().reduced_motion
    }

    fn observe_intersection(
        &self,
        element: ElementId,
        options: ObserverOptions,
        callback: IntersectionCallback,
    ) -> Subscription {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_registration();
            state.observers.insert(
                id,
                Observer {
                    element,
                    options,
                    callback: Rc::new(RefCell::new(callback)),
                    last: None,
                },
            );
            id
        };
        release(self.weak_state(), id, |state, id| state.observers.remove(&id))
    }

    fn on_scroll(&self, callback: ScrollCallback) -> Subscription {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_registration();
            state
                .scroll_listeners
                .insert(id, Rc::new(RefCell::new(callback)));
            id
        };
        release(self.weak_state(), id, |state, id| {
            state.scroll_listeners.remove(&id)
        })
    }

    fn on_pointer(&self, element: ElementId, callback: PointerCallback) -> Subscription {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_registration();
            state
                .pointer_listeners
                .insert(id, (element, Rc::new(RefCell::new(callback))));
            id
        };
        release(self.weak_state(), id, |state, id| {
            state.pointer_listeners.remove(&id)
        })
    }

    fn request_frame(&self, callback: FrameCallback) -> Subscription {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_registration();
            state.frames.insert(id, callback);
            id
        };
        release(self.weak_state(), id, |state, id| state.frames.remove(&id))
    }

    fn set_timeout(&self, delay_ms: f64, callback: TimerCallback) -> Subscription {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_registration();
            let due = state.now_ms + delay_ms.max(0.0);
            state.timers.insert(id, (due, callback));
            id
        };
        release(self.weak_state(), id, |state, id| state.timers.remove(&id))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn host() -> HeadlessHost {
        HeadlessHost::new(Size::new(1000.0, 800.0))
    }

    #[test]
    fn test_bounding_rect_follows_scroll() {
        let host = host();
        let el = host.add_element(Rect::new(0.0, 1200.0, 100.0, 100.0));
        host.scroll_to(1000.0);
        assert_eq!(
            host.bounding_rect(el),
            Some(Rect::new(0.0, 200.0, 100.0, 100.0))
        );
    }

    #[test]
    fn test_bounding_rect_includes_applied_transform() {
        let host = host();
        let el = host.add_element(Rect::new(0.0, 1200.0, 100.0, 100.0));
        host.scroll_to(1000.0);

        let lowered = VisualState {
            y: 50.0,
            y_percent: -10.0,
            ..VisualState::REST
        };
        host.apply_visual(el, &lowered, StyleChanges::all());
        assert_eq!(
            host.bounding_rect(el),
            Some(Rect::new(0.0, 240.0, 100.0, 100.0))
        );
        assert_eq!(
            host.layout_rect(el),
            Some(Rect::new(0.0, 200.0, 100.0, 100.0))
        );
    }

    #[test]
    fn test_intersection_reports_on_change_only() {
        let host = host();
        let el = host.add_element(Rect::new(0.0, 2000.0, 100.0, 100.0));
        let reports = Rc::new(RefCell::new(Vec::new()));

        let _watch = host.observe_intersection(
            el,
            ObserverOptions::default(),
            Box::new({
                let reports = reports.clone();
                move |entry| reports.borrow_mut().push(entry.is_intersecting)
            }),
        );
        assert!(reports.borrow().is_empty(), "never delivered synchronously");

        host.flush_intersections();
        host.scroll_to(100.0);
        host.scroll_to(1500.0);
        host.scroll_to(1510.0);
        assert_eq!(*reports.borrow(), vec![false, true]);
    }

    #[test]
    fn test_watch_may_release_itself_from_its_callback() {
        let host = host();
        let el = host.add_element(Rect::new(0.0, 100.0, 100.0, 100.0));
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let hits = Rc::new(Cell::new(0));

        let watch = host.observe_intersection(
            el,
            ObserverOptions::default(),
            Box::new({
                let slot = slot.clone();
                let hits = hits.clone();
                move |_| {
                    hits.set(hits.get() + 1);
                    let taken = slot.borrow_mut().take();
                    drop(taken);
                }
            }),
        );
        *slot.borrow_mut() = Some(watch);

        host.flush_intersections();
        assert_eq!(hits.get(), 1);
        assert_eq!(host.active_subscriptions().observers, 0);
    }

    #[test]
    fn test_frames_and_timers() {
        let host = host();
        let fired = Rc::new(RefCell::new(Vec::new()));

        let _frame = host.request_frame(Box::new({
            let fired = fired.clone();
            move |now| fired.borrow_mut().push(("frame", now))
        }));
        let _timer = host.set_timeout(
            40.0,
            Box::new({
                let fired = fired.clone();
                move || fired.borrow_mut().push(("timer", 40.0))
            }),
        );
        let cancelled = host.request_frame(Box::new(|_| panic!("cancelled frame ran")));
        drop(cancelled);

        host.advance(50.0);
        assert_eq!(*fired.borrow(), vec![("frame", 16.0), ("timer", 40.0)]);
        assert_eq!(host.active_subscriptions().total(), 0);
    }

    #[test]
    fn test_remove_element_drops_subtree() {
        let host = host();
        let parent = host.add_element(Rect::new(0.0, 0.0, 100.0, 100.0));
        let child = host.add_child(parent, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(host.children(parent), vec![child]);

        host.remove_element(parent);
        assert_eq!(host.bounding_rect(child), None);
    }
}
