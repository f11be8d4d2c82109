use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::driver::OwnerToken;
use super::{AdvanceResult, Animatable, Transition, Tween};
use crate::Motion;
use crate::host::Subscription;

type Sink<T> = Box<dyn FnMut(&T)>;
type Completion = Box<dyn FnOnce()>;

/// A completion callback and the owner that registered it.
struct Pending {
    origin: Option<OwnerToken>,
    callback: Completion,
}

struct AnimatorState<T: Animatable> {
    current: T,
    /// The running tween, or the last finished one so it can be replayed
    tween: Option<Tween<T>>,
    active: bool,
    /// Bumped whenever the tween is replaced or killed; stale frames compare
    /// against it and bail out
    generation: u64,
    frame: Option<Subscription>,
    /// Fired, in order, when the running tween finishes forwards
    on_complete: Vec<Pending>,
    owner: Option<OwnerToken>,
}

struct Shared<T: Animatable> {
    motion: Motion,
    state: RefCell<AnimatorState<T>>,
    sink: RefCell<Sink<T>>,
}

/// Drives one value through tweens on the host's frame clock.
///
/// Holds at most one tween at a time. Starting a new one kills whatever was
/// in flight, so a value is never driven by two transitions. The killed
/// tween's completion callback is dropped, except when a different owner
/// takes over: the callback then moves to the new transition and fires when
/// that one settles. Every new value is handed to the sink; the sink is
/// never called while the animator's own state is borrowed, so it may read
/// the animator back.
///
/// An in-flight tween keeps the animator alive through its pending frame,
/// so dropping every handle does not cut a running transition short.
pub struct Animator<T: Animatable> {
    shared: Rc<Shared<T>>,
}

impl<T: Animatable> Clone for Animator<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Animatable> Animator<T> {
    /// Create an animator resting at `initial`. The sink is not called until
    /// the value first changes.
    pub fn new(motion: &Motion, initial: T, sink: impl FnMut(&T) + 'static) -> Self {
        Self {
            shared: Rc::new(Shared {
                motion: motion.clone(),
                state: RefCell::new(AnimatorState {
                    current: initial,
                    tween: None,
                    active: false,
                    generation: 0,
                    frame: None,
                    on_complete: Vec::new(),
                    owner: None,
                }),
                sink: RefCell::new(Box::new(sink)),
            }),
        }
    }

    pub fn value(&self) -> T {
        self.shared.state.borrow().current.clone()
    }

    /// Where the value is heading: the end the current tween runs towards,
    /// or the current value when there is none.
    pub fn target(&self) -> T {
        let state = self.shared.state.borrow();
        match &state.tween {
            Some(tween) if tween.is_reversed() => tween.from().clone(),
            Some(tween) => tween.to().clone(),
            None => state.current.clone(),
        }
    }

    /// Jump to `value` immediately, killing any running tween.
    pub fn set(&self, value: T) {
        self.set_as(None, value);
    }

    pub(crate) fn set_as(&self, owner: Option<OwnerToken>, value: T) {
        let Superseded { frame, carried } = self.supersede(owner);
        {
            let mut state = self.shared.state.borrow_mut();
            state.tween = None;
            state.current = value.clone();
        }
        drop(frame);
        self.shared.emit(&value);
        run_completions(carried);
    }

    /// Tween from the current value to `target`.
    pub fn animate_to(&self, target: T, transition: Transition) {
        self.start(None, target, transition, None);
    }

    /// Like [`animate_to`](Self::animate_to), calling `on_complete` once the
    /// tween reaches `target`. The callback is dropped if the tween is
    /// superseded or killed first.
    pub fn animate_to_then(
        &self,
        target: T,
        transition: Transition,
        on_complete: impl FnOnce() + 'static,
    ) {
        self.start(None, target, transition, Some(Box::new(on_complete)));
    }

    pub(crate) fn start(
        &self,
        owner: Option<OwnerToken>,
        target: T,
        transition: Transition,
        on_complete: Option<Completion>,
    ) {
        let Superseded { frame, mut carried } = self.supersede(owner);
        if let Some(callback) = on_complete {
            carried.push(Pending {
                origin: owner,
                callback,
            });
        }
        let now = self.shared.motion.host().now_ms();

        if self.shared.motion.reduced_motion() || transition.total_ms() <= 0.0 {
            // Keep a finished instant tween so reverse/restart still work
            let mut tween = Tween::new(self.value(), target.clone(), Transition::instant(), now);
            tween.advance(now);
            {
                let mut state = self.shared.state.borrow_mut();
                state.tween = Some(tween);
                state.current = target.clone();
            }
            drop(frame);
            self.shared.emit(&target);
            run_completions(carried);
            return;
        }

        {
            let mut state = self.shared.state.borrow_mut();
            let from = state.current.clone();
            state.tween = Some(Tween::new(from, target, transition, now));
            state.active = true;
            state.on_complete = carried;
        }
        drop(frame);
        Shared::schedule(&self.shared);
    }

    /// Resume a paused tween.
    pub fn play(&self) {
        let now = self.shared.motion.host().now_ms();
        {
            let mut state = self.shared.state.borrow_mut();
            if state.active {
                return;
            }
            let Some(tween) = state.tween.as_mut() else {
                return;
            };
            if tween.is_finished() {
                return;
            }
            tween.resume(now);
            state.active = true;
        }
        Shared::schedule(&self.shared);
    }

    pub fn pause(&self) {
        let frame = {
            let mut state = self.shared.state.borrow_mut();
            if !state.active {
                return;
            }
            if let Some(tween) = state.tween.as_mut() {
                tween.pause();
            }
            state.active = false;
            state.frame.take()
        };
        drop(frame);
    }

    /// Run the current tween back towards its start.
    ///
    /// A tween with no length (reduced motion, zero duration) flips to its
    /// other end at once.
    pub fn reverse(&self) {
        let now = self.shared.motion.host().now_ms();
        let instant = {
            let mut state = self.shared.state.borrow_mut();
            let Some(tween) = state.tween.as_mut() else {
                return;
            };
            tween.reverse(now);
            if tween.total_ms() <= 0.0 {
                let value = tween.value();
                state.current = value.clone();
                state.active = false;
                Some(value)
            } else {
                state.active = true;
                None
            }
        };
        match instant {
            Some(value) => {
                let frame = self.shared.state.borrow_mut().frame.take();
                drop(frame);
                self.shared.emit(&value);
            }
            None => Shared::schedule(&self.shared),
        }
    }

    /// Replay the current tween from its start.
    pub fn restart(&self) {
        let now = self.shared.motion.host().now_ms();
        let from = {
            let mut state = self.shared.state.borrow_mut();
            let Some(tween) = state.tween.as_mut() else {
                return;
            };
            tween.restart(now);
            let from = tween.from().clone();
            state.current = from.clone();
            state.active = true;
            from
        };
        self.shared.emit(&from);
        Shared::schedule(&self.shared);
    }

    /// Stop where it is; pending completion callbacks never fire.
    pub fn kill(&self) {
        let superseded = self.supersede(None);
        self.shared.state.borrow_mut().tween = None;
        drop(superseded);
    }

    /// Kill the running tween only if `owner` started it.
    pub(crate) fn release(&self, owner: OwnerToken) {
        let owned = self.shared.state.borrow().owner == Some(owner);
        if owned {
            self.kill();
        }
    }

    pub(crate) fn owner(&self) -> Option<OwnerToken> {
        self.shared.state.borrow().owner
    }

    pub fn is_active(&self) -> bool {
        self.shared.state.borrow().active
    }

    /// Linear progress of the current tween; 0.0 when none was started.
    pub fn progress(&self) -> f32 {
        self.shared
            .state
            .borrow()
            .tween
            .as_ref()
            .map_or(0.0, Tween::progress)
    }

    pub(crate) fn downgrade(&self) -> WeakAnimator<T> {
        WeakAnimator {
            shared: Rc::downgrade(&self.shared),
        }
    }

    /// Invalidate the in-flight tween and hand back what it held so the
    /// caller can drop it outside the borrow.
    ///
    /// Completions registered by another owner are carried over when `owner`
    /// takes the element; an anonymous request, or the owner replacing its
    /// own work, drops them.
    fn supersede(&self, owner: Option<OwnerToken>) -> Superseded {
        let mut state = self.shared.state.borrow_mut();
        if state.active {
            log::debug!("superseding running tween");
        }
        state.generation += 1;
        state.active = false;
        state.owner = owner;
        let mut carried = std::mem::take(&mut state.on_complete);
        let frame = state.frame.take();
        drop(state);

        let before = carried.len();
        carried.retain(|pending| match (pending.origin, owner) {
            (Some(origin), Some(owner)) => origin != owner,
            _ => false,
        });
        if !carried.is_empty() {
            log::debug!("{} completion(s) handed over", carried.len());
        } else if before > 0 {
            log::trace!("{before} completion(s) dropped");
        }
        Superseded { frame, carried }
    }
}

/// What a superseded tween left behind.
struct Superseded {
    frame: Option<Subscription>,
    carried: Vec<Pending>,
}

fn run_completions(pending: Vec<Pending>) {
    for pending in pending {
        (pending.callback)();
    }
}

impl<T: Animatable> Shared<T> {
    fn emit(&self, value: &T) {
        match self.sink.try_borrow_mut() {
            Ok(mut sink) => sink(value),
            Err(_) => log::trace!("animator sink re-entered; value dropped"),
        }
    }

    fn schedule(this: &Rc<Self>) {
        let generation = this.state.borrow().generation;
        let shared = this.clone();
        let frame = this
            .motion
            .host()
            .request_frame(Box::new(move |now| Shared::on_frame(&shared, generation, now)));
        let previous = this.state.borrow_mut().frame.replace(frame);
        drop(previous);
    }

    fn on_frame(this: &Rc<Self>, generation: u64, now: f64) {
        let (result, finished, on_complete, spent) = {
            let mut state = this.state.borrow_mut();
            if state.generation != generation || !state.active {
                return;
            }
            let spent = state.frame.take();
            let Some(tween) = state.tween.as_mut() else {
                return;
            };
            let result = tween.advance(now);
            let finished = tween.is_finished();
            let forward = !tween.is_reversed();
            if let AdvanceResult::Changed(value) = &result {
                state.current = value.clone();
            }
            let mut on_complete = Vec::new();
            if finished {
                state.active = false;
                if forward {
                    on_complete = std::mem::take(&mut state.on_complete);
                }
            }
            (result, finished, on_complete, spent)
        };
        drop(spent);

        if let AdvanceResult::Changed(value) = &result {
            log::trace!("frame at {now:.1}ms");
            this.emit(value);
        }
        if finished {
            run_completions(on_complete);
        } else {
            Shared::schedule(this);
        }
    }
}

impl<T: Animatable + std::fmt::Debug> std::fmt::Debug for Animator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("Animator")
            .field("current", &state.current)
            .field("active", &state.active)
            .finish_non_exhaustive()
    }
}

/// Non-owning reference to an [`Animator`].
pub(crate) struct WeakAnimator<T: Animatable> {
    shared: Weak<Shared<T>>,
}

impl<T: Animatable> WeakAnimator<T> {
    pub(crate) fn upgrade(&self) -> Option<Animator<T>> {
        self.shared.upgrade().map(|shared| Animator { shared })
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::animation::TimingFunction;
    use crate::host::HeadlessHost;
    use crate::{MotionConfig, ReducedMotion};

    fn recording(motion: &Motion) -> (Animator<f32>, Rc<RefCell<Vec<f32>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let animator = Animator::new(motion, 0.0f32, {
            let seen = seen.clone();
            move |v: &f32| seen.borrow_mut().push(*v)
        });
        (animator, seen)
    }

    fn linear(ms: f32) -> Transition {
        Transition::new(ms, TimingFunction::Linear)
    }

    #[test]
    fn test_animate_to_runs_on_frames_and_completes() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let (animator, seen) = recording(&motion);
        let done = Rc::new(Cell::new(false));

        animator.animate_to_then(100.0, linear(64.0), {
            let done = done.clone();
            move || done.set(true)
        });
        assert!(animator.is_active());

        host.advance(32.0);
        assert_eq!(animator.value(), 50.0);
        assert!(!done.get());

        host.run_until_idle();
        assert!(done.get());
        assert!(!animator.is_active());
        assert_eq!(seen.borrow().last(), Some(&100.0));
        assert_eq!(host.active_subscriptions().frames, 0);
    }

    #[test]
    fn test_new_request_supersedes_and_drops_callback() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let (animator, _) = recording(&motion);
        let first_done = Rc::new(Cell::new(false));

        animator.animate_to_then(100.0, linear(100.0), {
            let first_done = first_done.clone();
            move || first_done.set(true)
        });
        host.advance(48.0);
        animator.animate_to(0.0, linear(100.0));
        host.run_until_idle();

        assert!(!first_done.get());
        assert_eq!(animator.value(), 0.0);
    }

    #[test]
    fn test_reduced_motion_jumps_to_target() {
        let host = HeadlessHost::default();
        let motion = Motion::with_config(
            host.clone(),
            MotionConfig::default().reduced_motion(ReducedMotion::Always),
        );
        let (animator, seen) = recording(&motion);
        let done = Rc::new(Cell::new(false));

        animator.animate_to_then(1.0, linear(500.0).delay(200.0), {
            let done = done.clone();
            move || done.set(true)
        });
        assert!(done.get());
        assert_eq!(*seen.borrow(), vec![1.0]);
        assert_eq!(host.active_subscriptions().frames, 0);
    }

    #[test]
    fn test_reduced_motion_reverse_jumps_back() {
        let host = HeadlessHost::default();
        let motion = Motion::with_config(
            host.clone(),
            MotionConfig::default().reduced_motion(ReducedMotion::Always),
        );
        let (animator, seen) = recording(&motion);

        animator.animate_to(1.0, linear(500.0));
        animator.reverse();
        assert_eq!(animator.value(), 0.0);
        assert_eq!(animator.target(), 0.0);
        assert!(!animator.is_active());
        assert_eq!(*seen.borrow(), vec![1.0, 0.0]);
        assert_eq!(host.active_subscriptions().frames, 0);
    }

    #[test]
    fn test_pause_play_and_kill() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let (animator, _) = recording(&motion);

        animator.animate_to(100.0, linear(160.0));
        host.advance(32.0);
        animator.pause();
        host.advance(500.0);
        assert_eq!(animator.value(), 20.0);

        animator.play();
        host.advance(32.0);
        assert_eq!(animator.value(), 40.0);

        animator.kill();
        host.run_until_idle();
        assert_eq!(animator.value(), 40.0);
        assert!(!animator.is_active());
    }

    #[test]
    fn test_reverse_and_restart_replay_finished_tween() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let (animator, _) = recording(&motion);

        animator.animate_to(10.0, linear(32.0));
        host.run_until_idle();
        assert_eq!(animator.progress(), 1.0);

        animator.reverse();
        host.run_until_idle();
        assert_eq!(animator.value(), 0.0);

        animator.restart();
        host.run_until_idle();
        assert_eq!(animator.value(), 10.0);
    }

    #[test]
    fn test_running_tween_outlives_dropped_handle() {
        let host = HeadlessHost::default();
        let motion = Motion::new(host.clone());
        let (animator, seen) = recording(&motion);

        animator.animate_to(1.0, linear(48.0));
        drop(animator);
        host.run_until_idle();
        assert_eq!(seen.borrow().last(), Some(&1.0));
    }
}
