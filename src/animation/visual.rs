use bitflags::bitflags;
use serde::Deserialize;

use super::Animatable;
use crate::error::ConfigError;
use crate::host::Rect;

bitflags! {
    /// Style properties that differ between two visual states
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct StyleChanges: u8 {
        const OPACITY   = 0b01;
        const TRANSFORM = 0b10;
    }
}

/// Everything a controller animates on one element.
///
/// Transforms leave layout alone but do move the rendered box: bounding
/// rects and intersection entries see the transformed element. Use
/// [`layout_rect`](Self::layout_rect) to measure without them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisualState {
    pub opacity: f32,
    /// Horizontal offset in px
    pub x: f32,
    /// Vertical offset in px
    pub y: f32,
    /// Horizontal offset as a percentage of the element's width
    pub x_percent: f32,
    /// Vertical offset as a percentage of the element's height
    pub y_percent: f32,
    /// Uniform scale (1.0 = no scale)
    pub scale: f32,
    /// Rotation in degrees (clockwise)
    pub rotate: f32,
}

impl VisualState {
    /// Fully opaque, untransformed.
    pub const REST: Self = Self {
        opacity: 1.0,
        x: 0.0,
        y: 0.0,
        x_percent: 0.0,
        y_percent: 0.0,
        scale: 1.0,
        rotate: 0.0,
    };

    /// Apply every field the patch sets.
    pub fn merge(mut self, patch: &VisualPatch) -> Self {
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity;
        }
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(x_percent) = patch.x_percent {
            self.x_percent = x_percent;
        }
        if let Some(y_percent) = patch.y_percent {
            self.y_percent = y_percent;
        }
        if let Some(scale) = patch.scale {
            self.scale = scale;
        }
        if let Some(rotate) = patch.rotate {
            self.rotate = rotate;
        }
        self
    }

    pub fn has_transform(&self) -> bool {
        self.x != 0.0
            || self.y != 0.0
            || self.x_percent != 0.0
            || self.y_percent != 0.0
            || self.scale != 1.0
            || self.rotate != 0.0
    }

    /// Which style properties must be rewritten to go from `previous` to `self`.
    pub fn changes_from(&self, previous: Option<&Self>) -> StyleChanges {
        let Some(previous) = previous else {
            return StyleChanges::all();
        };
        let mut changes = StyleChanges::empty();
        if self.opacity != previous.opacity {
            changes |= StyleChanges::OPACITY;
        }
        if self.x != previous.x
            || self.y != previous.y
            || self.x_percent != previous.x_percent
            || self.y_percent != previous.y_percent
            || self.scale != previous.scale
            || self.rotate != previous.rotate
        {
            changes |= StyleChanges::TRANSFORM;
        }
        changes
    }

    /// Where `layout` ends up once this state's transform is applied,
    /// around the default centre origin. Rotation is not accounted for.
    pub fn rendered_rect(&self, layout: Rect) -> Rect {
        let scale = f64::from(self.scale.abs());
        let (dx, dy) = self.translation(layout.width, layout.height);
        let (width, height) = (layout.width * scale, layout.height * scale);
        let cx = layout.x + layout.width / 2.0 + dx;
        let cy = layout.y + layout.height / 2.0 + dy;
        Rect::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    /// Inverse of [`rendered_rect`](Self::rendered_rect): the untransformed
    /// box behind a measured one. A zero scale leaves nothing to recover and
    /// returns `rendered` as is.
    pub fn layout_rect(&self, rendered: Rect) -> Rect {
        let scale = f64::from(self.scale.abs());
        if scale == 0.0 {
            return rendered;
        }
        let (width, height) = (rendered.width / scale, rendered.height / scale);
        let (dx, dy) = self.translation(width, height);
        let cx = rendered.x + rendered.width / 2.0 - dx;
        let cy = rendered.y + rendered.height / 2.0 - dy;
        Rect::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    /// Total translation in px for an element of the given layout size.
    fn translation(&self, width: f64, height: f64) -> (f64, f64) {
        (
            f64::from(self.x) + f64::from(self.x_percent) * width / 100.0,
            f64::from(self.y) + f64::from(self.y_percent) * height / 100.0,
        )
    }

    /// CSS `transform` value; `"none"` for the identity.
    pub fn css_transform(&self) -> String {
        if !self.has_transform() {
            return "none".to_string();
        }
        let mut parts = Vec::with_capacity(4);
        if self.x_percent != 0.0 || self.y_percent != 0.0 {
            parts.push(format!(
                "translate({}%, {}%)",
                self.x_percent, self.y_percent
            ));
        }
        parts.push(format!("translate3d({}px, {}px, 0px)", self.x, self.y));
        if self.rotate != 0.0 {
            parts.push(format!("rotate({}deg)", self.rotate));
        }
        if self.scale != 1.0 {
            parts.push(format!("scale({})", self.scale));
        }
        parts.join(" ")
    }
}

impl Default for VisualState {
    fn default() -> Self {
        Self::REST
    }
}

impl Animatable for VisualState {
    fn lerp(from: &Self, to: &Self, t: f32) -> Self {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Self {
            // Overshooting curves must not push opacity out of range
            opacity: mix(from.opacity, to.opacity).clamp(0.0, 1.0),
            x: mix(from.x, to.x),
            y: mix(from.y, to.y),
            x_percent: mix(from.x_percent, to.x_percent),
            y_percent: mix(from.y_percent, to.y_percent),
            scale: mix(from.scale, to.scale),
            rotate: mix(from.rotate, to.rotate),
        }
    }
}

/// Partial visual state: the fields a preset wants to set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisualPatch {
    pub opacity: Option<f32>,
    #[serde(alias = "translateX")]
    pub x: Option<f32>,
    #[serde(alias = "translateY")]
    pub y: Option<f32>,
    #[serde(alias = "xPercent")]
    pub x_percent: Option<f32>,
    #[serde(alias = "yPercent")]
    pub y_percent: Option<f32>,
    pub scale: Option<f32>,
    #[serde(alias = "rotation")]
    pub rotate: Option<f32>,
}

impl VisualPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    pub fn x(mut self, x: f32) -> Self {
        self.x = Some(x);
        self
    }

    pub fn y(mut self, y: f32) -> Self {
        self.y = Some(y);
        self
    }

    pub fn x_percent(mut self, x_percent: f32) -> Self {
        self.x_percent = Some(x_percent);
        self
    }

    pub fn y_percent(mut self, y_percent: f32) -> Self {
        self.y_percent = Some(y_percent);
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn rotate(mut self, degrees: f32) -> Self {
        self.rotate = Some(degrees);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(opacity) = self.opacity
            && !(0.0..=1.0).contains(&opacity)
        {
            return Err(ConfigError::InvalidOpacity(opacity));
        }
        if let Some(scale) = self.scale
            && !(scale.is_finite() && scale >= 0.0)
        {
            return Err(ConfigError::InvalidScale(scale));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_rect_moves_and_scales_around_centre() {
        let layout = Rect::new(100.0, 200.0, 200.0, 100.0);
        let state =
            VisualState::REST.merge(&VisualPatch::new().y(50.0).x_percent(-10.0).scale(2.0));

        let rendered = state.rendered_rect(layout);
        assert_eq!(rendered, Rect::new(-20.0, 200.0, 400.0, 200.0));
        assert_eq!(state.layout_rect(rendered), layout);

        assert_eq!(VisualState::REST.rendered_rect(layout), layout);
    }

    #[test]
    fn test_merge_only_touches_set_fields() {
        let state = VisualState::REST.merge(&VisualPatch::new().opacity(0.0).y(50.0));
        assert_eq!(state.opacity, 0.0);
        assert_eq!(state.y, 50.0);
        assert_eq!(state.scale, 1.0);
    }

    #[test]
    fn test_lerp_clamps_opacity_on_overshoot() {
        let from = VisualState::REST.merge(&VisualPatch::new().opacity(0.0).y(40.0));
        let mid = VisualState::lerp(&from, &VisualState::REST, 0.5);
        assert_eq!(mid.opacity, 0.5);
        assert_eq!(mid.y, 20.0);

        let over = VisualState::lerp(&from, &VisualState::REST, 1.2);
        assert_eq!(over.opacity, 1.0);
        assert!(over.y < 0.0);
    }

    #[test]
    fn test_changes_from() {
        let rest = VisualState::REST;
        assert_eq!(rest.changes_from(None), StyleChanges::all());
        assert_eq!(rest.changes_from(Some(&rest)), StyleChanges::empty());

        let faded = rest.merge(&VisualPatch::new().opacity(0.5));
        assert_eq!(faded.changes_from(Some(&rest)), StyleChanges::OPACITY);

        let lifted = rest.merge(&VisualPatch::new().y(-5.0).scale(1.05));
        assert_eq!(lifted.changes_from(Some(&rest)), StyleChanges::TRANSFORM);
    }

    #[test]
    fn test_css_transform() {
        assert_eq!(VisualState::REST.css_transform(), "none");
        let state = VisualState::REST.merge(&VisualPatch::new().y(-5.0).scale(1.05));
        assert_eq!(state.css_transform(), "translate3d(0px, -5px, 0px) scale(1.05)");
        let parallax = VisualState::REST.merge(&VisualPatch::new().y_percent(25.0));
        assert_eq!(
            parallax.css_transform(),
            "translate(0%, 25%) translate3d(0px, 0px, 0px)"
        );
    }

    #[test]
    fn test_patch_validation() {
        assert!(VisualPatch::new().opacity(1.5).validate().is_err());
        assert!(VisualPatch::new().scale(-1.0).validate().is_err());
        assert!(VisualPatch::new().opacity(0.0).scale(0.9).validate().is_ok());
    }
}
