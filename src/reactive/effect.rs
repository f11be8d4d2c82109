use super::runtime::{EffectId, dispose_effect, run_effect, with_runtime};
use super::scope::{effect_has_scope, register_effect};

/// A side effect that re-runs when the signals it read last time change.
///
/// Effects created inside a scope belong to that scope and stay alive until
/// it is disposed; otherwise the effect is disposed when this value drops.
pub struct Effect {
    id: EffectId,
}

impl Effect {
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut() + 'static,
    {
        let id = with_runtime(|rt| rt.allocate_effect(Box::new(f)));
        register_effect(id);
        run_effect(id);
        Self { id }
    }

    /// Stop the effect now, whether or not a scope owns it.
    pub fn dispose(self) {
        let id = self.id;
        dispose_effect(id);
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        if !effect_has_scope(self.id) {
            let id = self.id;
            dispose_effect(id);
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect").field("id", &self.id).finish()
    }
}

pub fn create_effect<F>(f: F) -> Effect
where
    F: FnMut() + 'static,
{
    Effect::new(f)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::reactive::{batch, create_signal};

    #[test]
    fn test_effect_reruns_on_change() {
        let signal = create_signal(1);
        let seen = Rc::new(Cell::new(0));

        let effect = create_effect({
            let signal = signal.clone();
            let seen = seen.clone();
            move || seen.set(signal.get())
        });

        assert_eq!(seen.get(), 1);
        signal.set(2);
        assert_eq!(seen.get(), 2);

        drop(effect);
        signal.set(3);
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn test_batch_runs_effect_once() {
        let a = create_signal(0);
        let b = create_signal(0);
        let runs = Rc::new(Cell::new(0));

        let _effect = create_effect({
            let (a, b, runs) = (a.clone(), b.clone(), runs.clone());
            move || {
                a.get();
                b.get();
                runs.set(runs.get() + 1);
            }
        });

        batch(|| {
            a.set(1);
            b.set(1);
        });
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_effect_may_write_signals() {
        let source = create_signal(1);
        let doubled = create_signal(0);

        let _effect = create_effect({
            let (source, doubled) = (source.clone(), doubled.clone());
            move || doubled.set(source.get() * 2)
        });
        source.set(21);
        assert_eq!(doubled.get_untracked(), 42);
    }

    #[test]
    fn test_dependencies_are_recollected() {
        let flag = create_signal(true);
        let a = create_signal(0);
        let b = create_signal(0);
        let runs = Rc::new(Cell::new(0));

        let _effect = create_effect({
            let (flag, a, b, runs) = (flag.clone(), a.clone(), b.clone(), runs.clone());
            move || {
                runs.set(runs.get() + 1);
                if flag.get() { a.get() } else { b.get() };
            }
        });

        flag.set(false);
        let after_switch = runs.get();
        a.set(5);
        assert_eq!(runs.get(), after_switch);
        b.set(5);
        assert_eq!(runs.get(), after_switch + 1);
    }
}
