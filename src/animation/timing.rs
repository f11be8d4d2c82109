//! Timing functions (easing curves) for transitions.
//!
//! ## Built-in Easing Functions
//!
//! - [`TimingFunction::Linear`] - Constant speed (no easing)
//! - [`TimingFunction::EaseIn`] / [`TimingFunction::EaseOut`] /
//!   [`TimingFunction::EaseInOut`] - Quadratic easing
//! - [`TimingFunction::Power`] - Polynomial curves of degree 2 to 5
//! - [`TimingFunction::Back`], [`TimingFunction::Expo`], [`TimingFunction::Sine`]
//!
//! ## Advanced Options
//!
//! - [`TimingFunction::CubicBezier`] - CSS-style cubic bezier curve
//! - [`TimingFunction::Custom`] - User-defined function
//!
//! ## Names
//!
//! Section presets name their curve with a string. [`TimingFunction`]
//! implements [`FromStr`] for the names page authors already use:
//!
//! ```ignore
//! let ease: TimingFunction = "power2.out".parse()?;
//! let css: TimingFunction = "cubic-bezier(0.4, 0, 0.2, 1)".parse()?;
//! ```

use std::rc::Rc;
use std::str::FromStr;

use crate::error::ConfigError;

/// Which end of the curve is eased.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EaseMode {
    In,
    Out,
    InOut,
}

/// Timing function that controls the animation curve
#[derive(Clone)]
pub enum TimingFunction {
    /// Linear interpolation (constant speed)
    Linear,
    /// Starts slow, ends fast
    EaseIn,
    /// Starts fast, ends slow
    EaseOut,
    /// Starts slow, speeds up, then slows down
    EaseInOut,
    /// `t^(power + 1)` family; `power` is clamped to 1..=4
    Power { power: u8, mode: EaseMode },
    /// Overshoots slightly before settling
    Back(EaseMode),
    /// Exponential
    Expo(EaseMode),
    /// Sinusoidal
    Sine(EaseMode),
    /// CSS cubic-bezier curve (x1, y1, x2, y2)
    CubicBezier(f32, f32, f32, f32),
    /// Custom timing function
    Custom(Rc<dyn Fn(f32) -> f32>),
}

impl TimingFunction {
    /// Evaluate the timing function at time t (0.0 to 1.0)
    /// Returns the interpolation factor (can exceed [0, 1] for overshoot)
    pub fn evaluate(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseIn => ease_in(t),
            Self::EaseOut => ease_out(t),
            Self::EaseInOut => ease_in_out(t),
            Self::Power { power, mode } => {
                let exponent = i32::from((*power).clamp(1, 4)) + 1;
                apply_mode(*mode, t, |t| t.powi(exponent))
            }
            Self::Back(mode) => apply_mode(*mode, t, back_in),
            Self::Expo(mode) => apply_mode(*mode, t, expo_in),
            Self::Sine(mode) => apply_mode(*mode, t, sine_in),
            Self::CubicBezier(x1, y1, x2, y2) => cubic_bezier(t, *x1, *y1, *x2, *y2),
            Self::Custom(f) => f(t),
        }
    }

    /// Create a custom timing function from a closure
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(f32) -> f32 + 'static,
    {
        Self::Custom(Rc::new(f))
    }
}

impl Default for TimingFunction {
    /// `power2.out`: decelerating entrance
    fn default() -> Self {
        Self::Power {
            power: 2,
            mode: EaseMode::Out,
        }
    }
}

impl FromStr for TimingFunction {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let trimmed = name.trim();
        let unknown = || ConfigError::UnknownEasing(trimmed.to_string());

        if let Some(args) = trimmed
            .strip_prefix("cubic-bezier(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let values = args
                .split(',')
                .map(|v| v.trim().parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| unknown())?;
            return match values.as_slice() {
                [x1, y1, x2, y2] if (0.0..=1.0).contains(x1) && (0.0..=1.0).contains(x2) => {
                    Ok(Self::CubicBezier(*x1, *y1, *x2, *y2))
                }
                _ => Err(unknown()),
            };
        }

        match trimmed {
            "linear" | "none" => return Ok(Self::Linear),
            "ease" => return Ok(Self::CubicBezier(0.25, 0.1, 0.25, 1.0)),
            "ease-in" => return Ok(Self::EaseIn),
            "ease-out" => return Ok(Self::EaseOut),
            "ease-in-out" => return Ok(Self::EaseInOut),
            _ => {}
        }

        let (family, mode) = match trimmed.split_once('.') {
            Some((family, mode)) => (family, parse_mode(mode).ok_or_else(unknown)?),
            None => (trimmed, EaseMode::Out),
        };

        let power = |power| Self::Power { power, mode };
        match family {
            "power1" | "quad" => Ok(power(1)),
            "power2" | "cubic" => Ok(power(2)),
            "power3" | "quart" => Ok(power(3)),
            "power4" | "quint" | "strong" => Ok(power(4)),
            "back" => Ok(Self::Back(mode)),
            "expo" => Ok(Self::Expo(mode)),
            "sine" => Ok(Self::Sine(mode)),
            _ => Err(unknown()),
        }
    }
}

impl std::fmt::Debug for TimingFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linear => write!(f, "Linear"),
            Self::EaseIn => write!(f, "EaseIn"),
            Self::EaseOut => write!(f, "EaseOut"),
            Self::EaseInOut => write!(f, "EaseInOut"),
            Self::Power { power, mode } => write!(f, "Power({power}, {mode:?})"),
            Self::Back(mode) => write!(f, "Back({mode:?})"),
            Self::Expo(mode) => write!(f, "Expo({mode:?})"),
            Self::Sine(mode) => write!(f, "Sine({mode:?})"),
            Self::CubicBezier(x1, y1, x2, y2) => {
                write!(f, "CubicBezier({x1}, {y1}, {x2}, {y2})")
            }
            Self::Custom(_) => write!(f, "Custom"),
        }
    }
}

fn parse_mode(mode: &str) -> Option<EaseMode> {
    match mode {
        "in" => Some(EaseMode::In),
        "out" => Some(EaseMode::Out),
        "inOut" | "in-out" | "inout" => Some(EaseMode::InOut),
        _ => None,
    }
}

/// Derive out/in-out variants from an ease-in curve.
fn apply_mode(mode: EaseMode, t: f32, ease_in: impl Fn(f32) -> f32) -> f32 {
    match mode {
        EaseMode::In => ease_in(t),
        EaseMode::Out => 1.0 - ease_in(1.0 - t),
        EaseMode::InOut => {
            if t < 0.5 {
                ease_in(t * 2.0) / 2.0
            } else {
                1.0 - ease_in((1.0 - t) * 2.0) / 2.0
            }
        }
    }
}

// Easing functions

fn ease_in(t: f32) -> f32 {
    t * t
}

fn ease_out(t: f32) -> f32 {
    t * (2.0 - t)
}

fn ease_in_out(t: f32) -> f32 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        -1.0 + (4.0 - 2.0 * t) * t
    }
}

const BACK_OVERSHOOT: f32 = 1.70158;

fn back_in(t: f32) -> f32 {
    t * t * ((BACK_OVERSHOOT + 1.0) * t - BACK_OVERSHOOT)
}

fn expo_in(t: f32) -> f32 {
    if t <= 0.0 {
        0.0
    } else {
        2f32.powf(10.0 * (t - 1.0))
    }
}

fn sine_in(t: f32) -> f32 {
    1.0 - (t * std::f32::consts::FRAC_PI_2).cos()
}

/// Cubic bezier curve evaluation
/// Simplified implementation assuming x1, x2 are in [0, 1]
fn cubic_bezier(t: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    // Newton-Raphson to find the curve parameter whose x equals t
    let mut current_t = t;
    for _ in 0..8 {
        let current_x = cubic_bezier_x(current_t, x1, x2);
        let current_slope = cubic_bezier_slope(current_t, x1, x2);
        if current_slope.abs() < 1e-6 {
            break;
        }
        current_t -= (current_x - t) / current_slope;
    }
    cubic_bezier_y(current_t, y1, y2)
}

fn cubic_bezier_x(t: f32, x1: f32, x2: f32) -> f32 {
    let mt = 1.0 - t;
    3.0 * mt * mt * t * x1 + 3.0 * mt * t * t * x2 + t * t * t
}

fn cubic_bezier_y(t: f32, y1: f32, y2: f32) -> f32 {
    let mt = 1.0 - t;
    3.0 * mt * mt * t * y1 + 3.0 * mt * t * t * y2 + t * t * t
}

fn cubic_bezier_slope(t: f32, x1: f32, x2: f32) -> f32 {
    let mt = 1.0 - t;
    3.0 * mt * mt * x1 + 6.0 * mt * t * (x2 - x1) + 3.0 * t * t * (1.0 - x2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_linear() {
        assert_eq!(TimingFunction::Linear.evaluate(0.0), 0.0);
        assert_eq!(TimingFunction::Linear.evaluate(0.5), 0.5);
        assert_eq!(TimingFunction::Linear.evaluate(1.0), 1.0);
    }

    #[test]
    fn test_ease_in_is_slow_at_start() {
        assert!(TimingFunction::EaseIn.evaluate(0.5) < 0.5);
        assert!(TimingFunction::EaseOut.evaluate(0.5) > 0.5);
    }

    #[test]
    fn test_every_named_curve_hits_endpoints() {
        for name in [
            "linear",
            "ease",
            "ease-in-out",
            "power1.in",
            "power2.out",
            "power3.inOut",
            "power4",
            "back.out",
            "expo.inOut",
            "sine.in",
            "cubic-bezier(0.4, 0, 0.2, 1)",
        ] {
            let curve: TimingFunction = name.parse().unwrap();
            assert!(close(curve.evaluate(0.0), 0.0), "{name} at 0");
            assert!(close(curve.evaluate(1.0), 1.0), "{name} at 1");
        }
    }

    #[test]
    fn test_power_out_decelerates() {
        let curve: TimingFunction = "power2.out".parse().unwrap();
        // 1 - (1 - 0.5)^3
        assert!(close(curve.evaluate(0.5), 0.875));
    }

    #[test]
    fn test_back_out_overshoots() {
        let curve = TimingFunction::Back(EaseMode::Out);
        let peak = (1..100)
            .map(|i| curve.evaluate(i as f32 / 100.0))
            .fold(0.0f32, f32::max);
        assert!(peak > 1.0);
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        assert_eq!(
            "wobble.out".parse::<TimingFunction>().unwrap_err(),
            ConfigError::UnknownEasing("wobble.out".into())
        );
        assert!("power2.sideways".parse::<TimingFunction>().is_err());
        assert!("cubic-bezier(2, 0, 0, 1)".parse::<TimingFunction>().is_err());
        assert!("cubic-bezier(0, 0, 1)".parse::<TimingFunction>().is_err());
    }
}
