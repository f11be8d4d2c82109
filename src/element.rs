//! Element handles and attachment points.
//!
//! An [`ElementRef`] is what a controller hands to the section that owns it.
//! The section attaches the host node once it is rendered; controllers react
//! to that through the ref's signal, so a controller created before its
//! element exists simply waits.

use crate::reactive::{Signal, create_signal};

/// Opaque handle to one host node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Reactive attachment point for one element.
#[derive(Clone, Debug)]
pub struct ElementRef {
    signal: Signal<Option<ElementId>>,
}

impl ElementRef {
    /// Bind the rendered node. Re-attaching the same node is a no-op.
    pub fn attach(&self, element: ElementId) {
        self.signal.set(Some(element));
    }

    /// Unbind the node (it is no longer rendered).
    pub fn detach(&self) {
        self.signal.set(None);
    }

    /// Current node; subscribes the running effect.
    pub fn get(&self) -> Option<ElementId> {
        self.signal.get()
    }

    pub fn get_untracked(&self) -> Option<ElementId> {
        self.signal.get_untracked()
    }

    pub fn is_attached(&self) -> bool {
        self.get_untracked().is_some()
    }
}

/// Create an empty attachment point.
pub fn create_element_ref() -> ElementRef {
    ElementRef {
        signal: create_signal(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_ref_attach_detach() {
        let r = create_element_ref();
        assert!(!r.is_attached());

        r.attach(ElementId::from_raw(3));
        assert_eq!(r.get_untracked(), Some(ElementId::from_raw(3)));

        r.detach();
        assert_eq!(r.get(), None);
    }
}
