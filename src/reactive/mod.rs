pub mod effect;
pub mod runtime;
pub mod scope;
pub mod signal;

pub use effect::{Effect, create_effect};
pub use runtime::{batch, untrack};
pub use scope::{
    Mounted, ScopeId, current_scope, dispose_scope, mount, on_cleanup, with_scope,
};
pub use signal::{ReadSignal, Signal, create_signal};

/// Number of live effects on this thread.
///
/// Teardown checks use this to confirm an unmounted section left nothing
/// running.
pub fn live_effect_count() -> usize {
    runtime::with_runtime(|rt| rt.effect_count())
}
