use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

thread_local! {
    static RUNTIME: RefCell<Runtime> = RefCell::new(Runtime::new());
}

pub type SignalId = usize;
pub type EffectId = usize;

type EffectCallback = Rc<RefCell<Box<dyn FnMut()>>>;

struct EffectSlot {
    callback: EffectCallback,
    dependencies: HashSet<SignalId>,
}

/// Dependency graph between signals and effects.
///
/// Effect callbacks are never invoked while the runtime is borrowed, so an
/// effect may freely read and write signals or create further effects.
#[derive(Default)]
pub struct Runtime {
    current_effect: Option<EffectId>,
    pending: Vec<EffectId>,
    effects: HashMap<EffectId, EffectSlot>,
    subscribers: HashMap<SignalId, HashSet<EffectId>>,
    next_signal_id: SignalId,
    next_effect_id: EffectId,
    batch_depth: usize,
    flushing: bool,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_signal(&mut self) -> SignalId {
        let id = self.next_signal_id;
        self.next_signal_id += 1;
        id
    }

    pub fn release_signal(&mut self, signal_id: SignalId) {
        if let Some(subscribers) = self.subscribers.remove(&signal_id) {
            for effect_id in subscribers {
                if let Some(slot) = self.effects.get_mut(&effect_id) {
                    slot.dependencies.remove(&signal_id);
                }
            }
        }
    }

    pub fn allocate_effect(&mut self, callback: Box<dyn FnMut()>) -> EffectId {
        let id = self.next_effect_id;
        self.next_effect_id += 1;
        self.effects.insert(
            id,
            EffectSlot {
                callback: Rc::new(RefCell::new(callback)),
                dependencies: HashSet::new(),
            },
        );
        id
    }

    pub fn track_read(&mut self, signal_id: SignalId) {
        let Some(effect_id) = self.current_effect else {
            return;
        };
        let Some(slot) = self.effects.get_mut(&effect_id) else {
            return;
        };
        slot.dependencies.insert(signal_id);
        self.subscribers
            .entry(signal_id)
            .or_default()
            .insert(effect_id);
    }

    /// Queue every subscriber of `signal_id`. Returns true when the caller
    /// should flush (not batching and no flush already in progress).
    fn queue_subscribers(&mut self, signal_id: SignalId) -> bool {
        if let Some(subscribers) = self.subscribers.get(&signal_id) {
            let mut ids: Vec<_> = subscribers.iter().copied().collect();
            ids.sort_unstable();
            for id in ids {
                if !self.pending.contains(&id) {
                    self.pending.push(id);
                }
            }
        }
        self.batch_depth == 0 && !self.flushing && !self.pending.is_empty()
    }

    /// Detach an effect from its old dependencies and hand out its callback.
    fn prepare_run(&mut self, effect_id: EffectId) -> Option<EffectCallback> {
        let slot = self.effects.get_mut(&effect_id)?;
        let old_deps = std::mem::take(&mut slot.dependencies);
        let callback = slot.callback.clone();
        for signal_id in old_deps {
            if let Some(subscribers) = self.subscribers.get_mut(&signal_id) {
                subscribers.remove(&effect_id);
            }
        }
        Some(callback)
    }

    /// Unregister an effect and hand back its callback for dropping.
    fn take_effect(&mut self, effect_id: EffectId) -> Option<EffectCallback> {
        self.pending.retain(|id| *id != effect_id);
        let slot = self.effects.remove(&effect_id)?;
        for signal_id in slot.dependencies {
            if let Some(subscribers) = self.subscribers.get_mut(&signal_id) {
                subscribers.remove(&effect_id);
            }
        }
        Some(slot.callback)
    }

    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }
}

pub fn with_runtime<F, R>(f: F) -> R
where
    F: FnOnce(&mut Runtime) -> R,
{
    RUNTIME.with(|rt| f(&mut rt.borrow_mut()))
}

/// Access the runtime if it is still alive and not borrowed.
///
/// Used from `Drop` impls, which may run during thread teardown.
pub fn try_with_runtime<F>(f: F)
where
    F: FnOnce(&mut Runtime),
{
    let _ = RUNTIME.try_with(|rt| {
        if let Ok(mut runtime) = rt.try_borrow_mut() {
            f(&mut runtime);
        }
    });
}

pub fn run_effect(effect_id: EffectId) {
    let Some(callback) = with_runtime(|rt| rt.prepare_run(effect_id)) else {
        return;
    };

    let prev_effect = with_runtime(|rt| rt.current_effect.replace(effect_id));
    match callback.try_borrow_mut() {
        Ok(mut f) => f(),
        Err(_) => log::trace!("effect {effect_id} re-entered while running; skipped"),
    }
    with_runtime(|rt| rt.current_effect = prev_effect);
}

/// Dispose an effect.
///
/// The callback is dropped after the runtime borrow is released: its
/// captures may own signals or controllers whose own drop reaches back here.
pub fn dispose_effect(effect_id: EffectId) {
    let mut removed = None;
    try_with_runtime(|rt| removed = rt.take_effect(effect_id));
    drop(removed);
}

pub fn notify_write(signal_id: SignalId) {
    if with_runtime(|rt| rt.queue_subscribers(signal_id)) {
        flush_effects();
    }
}

pub fn flush_effects() {
    with_runtime(|rt| rt.flushing = true);
    while let Some(effect_id) = with_runtime(|rt| {
        if rt.pending.is_empty() {
            None
        } else {
            Some(rt.pending.remove(0))
        }
    }) {
        run_effect(effect_id);
    }
    with_runtime(|rt| rt.flushing = false);
}

/// Run `f` with effect notification deferred until it returns.
pub fn batch<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    with_runtime(|rt| rt.batch_depth += 1);
    let result = f();
    let flush = with_runtime(|rt| {
        rt.batch_depth -= 1;
        rt.batch_depth == 0 && !rt.flushing && !rt.pending.is_empty()
    });
    if flush {
        flush_effects();
    }
    result
}

/// Run `f` without recording signal reads as dependencies.
pub fn untrack<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let prev_effect = with_runtime(|rt| rt.current_effect.take());
    let result = f();
    with_runtime(|rt| rt.current_effect = prev_effect);
    result
}
