//! Controllers that page sections instantiate for their elements.
//!
//! Each controller hands out an [`ElementRef`](crate::element::ElementRef)
//! to attach and reads its derived state through signals. Created inside a
//! scope (see [`mount`](crate::reactive::mount)), a controller is torn down
//! with that scope; created outside one, it is torn down when its last
//! handle drops. Either way teardown releases every host registration the
//! controller made and kills the transitions it started.

mod autoplay;
mod count_up;
mod hover;
mod parallax;
mod scroll_reveal;
mod stagger;
mod visibility;

use std::rc::Rc;

pub use autoplay::{Autoplay, AutoplayConfig, create_autoplay};
pub use count_up::{CountUp, CountUpConfig, create_count_up};
pub use hover::{HoverAnimation, HoverConfig, create_hover_animation};
pub use parallax::{Parallax, ParallaxConfig, ParallaxTarget, create_parallax, scroll_progress};
pub use scroll_reveal::{
    RevealOptions, RevealState, ScrollReveal, create_scroll_reveal, create_scroll_reveal_with,
};
pub use stagger::{Stagger, create_page_stagger, create_stagger};
pub use visibility::{Visibility, VisibilityOptions, create_visibility};

use crate::reactive::on_cleanup;

/// Idempotent teardown of a controller's resources.
pub(crate) trait Dispose {
    fn dispose(&self);
}

/// Run `inner`'s teardown when the current scope is disposed.
///
/// The scope keeps the controller alive until then. Outside any scope this
/// does nothing and the controller's own `Drop` is responsible.
pub(crate) fn bind_to_scope<T: Dispose + 'static>(inner: &Rc<T>) {
    let inner = inner.clone();
    if !on_cleanup(move || inner.dispose()) {
        log::trace!("controller created outside a scope");
    }
}
