//! Component scopes: mount/unmount ownership for reactive resources.
//!
//! A scope is the lifetime of one mounted page section. Effects created
//! inside it and cleanup callbacks registered with [`on_cleanup`] belong to
//! the scope, and are torn down together when it is disposed.
//!
//! - Scopes form a tree; child scopes are disposed before their parent
//! - Cleanup callbacks run in reverse registration order
//! - Disposing a scope twice is a no-op
//!
//! # Example
//!
//! ```ignore
//! let section = mount(|| {
//!     let reveal = create_scroll_reveal(&motion, AnimationConfig::default());
//!     reveal.element_ref().attach(hero);
//!     reveal
//! });
//!
//! // Later: releases the intersection watch and any running transition.
//! section.unmount();
//! ```

use std::cell::{Cell, RefCell};

use super::runtime::{EffectId, dispose_effect};

/// Unique identifier for a scope in the scope arena.
pub type ScopeId = usize;

struct Scope {
    effects: Vec<EffectId>,
    cleanups: Vec<Box<dyn FnOnce()>>,
    children: Vec<ScopeId>,
}

impl Scope {
    fn new() -> Self {
        Self {
            effects: Vec::new(),
            cleanups: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// Arena-based storage for scopes.
struct ScopeArena {
    scopes: Vec<Option<Scope>>,
}

impl ScopeArena {
    fn allocate(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = self.scopes.len();
        self.scopes.push(Some(Scope::new()));
        if let Some(parent_id) = parent
            && let Some(parent_scope) = self.get_mut(parent_id)
        {
            parent_scope.children.push(id);
        }
        id
    }

    fn get_mut(&mut self, id: ScopeId) -> Option<&mut Scope> {
        self.scopes.get_mut(id).and_then(|s| s.as_mut())
    }

    fn take(&mut self, id: ScopeId) -> Option<Scope> {
        self.scopes.get_mut(id).and_then(|s| s.take())
    }
}

thread_local! {
    static CURRENT_SCOPE: Cell<Option<ScopeId>> = const { Cell::new(None) };
    static SCOPES: RefCell<ScopeArena> = const { RefCell::new(ScopeArena { scopes: Vec::new() }) };
}

/// Execute a closure within a new child scope of the current one.
///
/// Returns the closure's result and the new scope's id.
pub fn with_scope<T>(f: impl FnOnce() -> T) -> (T, ScopeId) {
    let parent = current_scope();
    let scope_id = SCOPES.with(|scopes| scopes.borrow_mut().allocate(parent));

    let prev = CURRENT_SCOPE.with(|current| current.replace(Some(scope_id)));
    let result = f();
    CURRENT_SCOPE.with(|current| current.set(prev));

    (result, scope_id)
}

/// The scope new resources are currently registered with, if any.
pub fn current_scope() -> Option<ScopeId> {
    CURRENT_SCOPE.with(|current| current.get())
}

/// Dispose a scope: children first, then cleanups (LIFO), then effects.
pub fn dispose_scope(id: ScopeId) {
    let scope = SCOPES
        .try_with(|scopes| scopes.borrow_mut().take(id))
        .ok()
        .flatten();
    let Some(scope) = scope else {
        return;
    };

    for child_id in scope.children {
        dispose_scope(child_id);
    }

    for cleanup in scope.cleanups.into_iter().rev() {
        cleanup();
    }

    for effect_id in scope.effects {
        dispose_effect(effect_id);
    }
    log::trace!("scope {id} disposed");
}

/// Register a cleanup callback to run when the current scope is disposed.
///
/// Returns `false` (and drops `f` without running it) outside any scope.
pub fn on_cleanup(f: impl FnOnce() + 'static) -> bool {
    let Some(scope_id) = current_scope() else {
        return false;
    };
    SCOPES.with(|scopes| match scopes.borrow_mut().get_mut(scope_id) {
        Some(scope) => {
            scope.cleanups.push(Box::new(f));
            true
        }
        None => false,
    })
}

pub(crate) fn register_effect(id: EffectId) {
    if let Some(scope_id) = current_scope() {
        SCOPES.with(|scopes| {
            if let Some(scope) = scopes.borrow_mut().get_mut(scope_id) {
                scope.effects.push(id);
            }
        });
    }
}

pub(crate) fn effect_has_scope(id: EffectId) -> bool {
    SCOPES
        .try_with(|scopes| {
            scopes
                .borrow()
                .scopes
                .iter()
                .flatten()
                .any(|scope| scope.effects.contains(&id))
        })
        .unwrap_or(false)
}

/// A value built inside its own scope; dropping it unmounts the scope.
pub struct Mounted<T> {
    value: T,
    scope: ScopeId,
}

impl<T> Mounted<T> {
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Dispose the scope now.
    pub fn unmount(self) {
        drop(self);
    }
}

impl<T> std::ops::Deref for Mounted<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Drop for Mounted<T> {
    fn drop(&mut self) {
        dispose_scope(self.scope);
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Mounted<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mounted")
            .field("scope", &self.scope)
            .field("value", &self.value)
            .finish()
    }
}

/// Build a component inside a fresh scope.
pub fn mount<T>(f: impl FnOnce() -> T) -> Mounted<T> {
    let (value, scope) = with_scope(f);
    Mounted { value, scope }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::reactive::{create_effect, create_signal};

    #[test]
    fn test_current_scope_outside_scope() {
        assert!(current_scope().is_none());
        assert!(!on_cleanup(|| {}));
    }

    #[test]
    fn test_nested_scopes_dispose_children_first() {
        let order = Rc::new(RefCell::new(Vec::new()));

        let (_, outer_id) = with_scope(|| {
            let outer = order.clone();
            on_cleanup(move || outer.borrow_mut().push("outer"));

            let inner = order.clone();
            with_scope(|| {
                on_cleanup(move || inner.borrow_mut().push("inner"));
            });
        });

        dispose_scope(outer_id);
        assert_eq!(*order.borrow(), vec!["inner", "outer"]);
    }

    #[test]
    fn test_cleanups_run_in_reverse_order() {
        let order = Rc::new(RefCell::new(Vec::new()));

        let (_, id) = with_scope(|| {
            for name in ["first", "second", "third"] {
                let order = order.clone();
                on_cleanup(move || order.borrow_mut().push(name));
            }
        });

        dispose_scope(id);
        assert_eq!(*order.borrow(), vec!["third", "second", "first"]);
    }

    #[test]
    fn test_dispose_twice_is_safe() {
        let (_, id) = with_scope(|| {});
        dispose_scope(id);
        dispose_scope(id);
    }

    #[test]
    fn test_scoped_effect_survives_handle_drop_until_unmount() {
        let signal = create_signal(0);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let mounted = mount(|| {
            let (signal, seen) = (signal.clone(), seen.clone());
            // The Effect value is dropped immediately; the scope keeps it alive.
            let _ = create_effect(move || seen.borrow_mut().push(signal.get()));
        });

        signal.set(1);
        mounted.unmount();
        signal.set(2);
        assert_eq!(*seen.borrow(), vec![0, 1]);
    }
}
