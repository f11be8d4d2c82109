use std::cell::RefCell;
use std::rc::Rc;

use super::runtime::{SignalId, notify_write, try_with_runtime, with_runtime};

struct SignalInner<T> {
    id: SignalId,
    value: RefCell<T>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        let id = self.id;
        try_with_runtime(|rt| rt.release_signal(id));
    }
}

/// A reactive value.
///
/// Reading a signal with [`get`](Self::get) or [`with`](Self::with) inside an
/// effect subscribes that effect; writing a different value re-runs every
/// subscriber. Clones share the same value.
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Signal<T> {
    pub fn new(value: T) -> Self {
        let id = with_runtime(|rt| rt.allocate_signal());
        Self {
            inner: Rc::new(SignalInner {
                id,
                value: RefCell::new(value),
            }),
        }
    }

    /// A read-only view sharing this signal's value.
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal {
            inner: self.inner.clone(),
        }
    }

    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        track(self.inner.id);
        f(&self.inner.value.borrow())
    }

    pub fn with_untracked<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.inner.value.borrow())
    }
}

impl<T: Clone> Signal<T> {
    pub fn get(&self) -> T {
        track(self.inner.id);
        self.inner.value.borrow().clone()
    }

    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }
}

impl<T: PartialEq> Signal<T> {
    /// Sets the signal's value, only triggering updates if the value actually changed.
    pub fn set(&self, value: T) {
        {
            let mut guard = self.inner.value.borrow_mut();
            if *guard == value {
                return;
            }
            *guard = value;
        }
        notify_write(self.inner.id);
    }
}

impl<T: PartialEq + Clone> Signal<T> {
    /// Updates the signal's value using a closure, only triggering updates if the value changed.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        let changed = {
            let mut guard = self.inner.value.borrow_mut();
            let old_value = guard.clone();
            f(&mut guard);
            *guard != old_value
        };
        if changed {
            notify_write(self.inner.id);
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Signal")
            .field(&*self.inner.value.borrow())
            .finish()
    }
}

/// Read-only handle to a signal.
///
/// Controllers hand these out so the state they derive can only be written
/// by the controller itself.
pub struct ReadSignal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> ReadSignal<T> {
    pub fn get(&self) -> T {
        track(self.inner.id);
        self.inner.value.borrow().clone()
    }

    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }
}

impl<T> ReadSignal<T> {
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        track(self.inner.id);
        f(&self.inner.value.borrow())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReadSignal")
            .field(&*self.inner.value.borrow())
            .finish()
    }
}

fn track(id: SignalId) {
    try_with_runtime(|rt| rt.track_read(id));
}

pub fn create_signal<T>(value: T) -> Signal<T> {
    Signal::new(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_signal_and_get() {
        let signal = create_signal(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn test_update_with_closure() {
        let signal = create_signal(5);
        signal.update(|v| *v += 10);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn test_read_only_follows_writes() {
        let signal = create_signal(7);
        let read = signal.read_only();

        assert_eq!(read.get(), 7);
        signal.set(14);
        assert_eq!(read.get(), 14);
    }

    #[test]
    fn test_clone_shares_underlying_value() {
        let signal1 = create_signal(50);
        let signal2 = signal1.clone();

        signal1.set(75);
        assert_eq!(signal2.get(), 75);
    }

    #[test]
    fn test_with_borrows_value() {
        let signal = create_signal(String::from("hello"));
        assert_eq!(signal.with(|s| s.len()), 5);
        assert_eq!(signal.with_untracked(|s| format!("{s}!")), "hello!");
    }
}
