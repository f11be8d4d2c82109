use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle; `y` grows downwards.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Overlap of two rects; `None` when they do not touch.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (right >= left && bottom >= top).then(|| Rect::new(left, top, right - left, bottom - top))
    }

    /// Grow each edge outwards by the given amounts (negative shrinks).
    pub fn inflate(&self, top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self::new(
            self.x - left,
            self.y - top,
            (self.width + left + right).max(0.0),
            (self.height + top + bottom).max(0.0),
        )
    }

    /// Shrink uniformly by `amount` on every side.
    pub fn inset(&self, amount: f64) -> Self {
        self.inflate(-amount, -amount, -amount, -amount)
    }
}

/// One side of a root margin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MarginValue {
    Px(f64),
    /// Percentage of the viewport dimension along that side's axis
    Percent(f64),
}

impl MarginValue {
    fn resolve(self, extent: f64) -> f64 {
        match self {
            Self::Px(px) => px,
            Self::Percent(pct) => extent * pct / 100.0,
        }
    }
}

impl fmt::Display for MarginValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Px(px) => write!(f, "{px}px"),
            Self::Percent(pct) => write!(f, "{pct}%"),
        }
    }
}

/// CSS-style margin applied to the viewport before intersection tests.
///
/// Parsed from the usual one-to-four value shorthand. The default,
/// `0px 0px -50px 0px`, triggers slightly before an element fully enters
/// from below.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct RootMargin {
    pub top: MarginValue,
    pub right: MarginValue,
    pub bottom: MarginValue,
    pub left: MarginValue,
}

impl RootMargin {
    pub const ZERO: Self = Self {
        top: MarginValue::Px(0.0),
        right: MarginValue::Px(0.0),
        bottom: MarginValue::Px(0.0),
        left: MarginValue::Px(0.0),
    };

    /// Apply the margin to a viewport-sized root rect.
    pub fn apply(&self, viewport: Size) -> Rect {
        Rect::new(0.0, 0.0, viewport.width, viewport.height).inflate(
            self.top.resolve(viewport.height),
            self.right.resolve(viewport.width),
            self.bottom.resolve(viewport.height),
            self.left.resolve(viewport.width),
        )
    }
}

impl Default for RootMargin {
    fn default() -> Self {
        Self {
            bottom: MarginValue::Px(-50.0),
            ..Self::ZERO
        }
    }
}

impl FromStr for RootMargin {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidRootMargin(s.to_string());
        let values = s
            .split_whitespace()
            .map(|part| parse_margin_value(part).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()?;

        let (top, right, bottom, left) = match values.as_slice() {
            [all] => (*all, *all, *all, *all),
            [vertical, horizontal] => (*vertical, *horizontal, *vertical, *horizontal),
            [top, horizontal, bottom] => (*top, *horizontal, *bottom, *horizontal),
            [top, right, bottom, left] => (*top, *right, *bottom, *left),
            _ => return Err(invalid()),
        };
        Ok(Self {
            top,
            right,
            bottom,
            left,
        })
    }
}

impl TryFrom<String> for RootMargin {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.top, self.right, self.bottom, self.left)
    }
}

fn parse_margin_value(part: &str) -> Option<MarginValue> {
    let value = if let Some(px) = part.strip_suffix("px") {
        MarginValue::Px(px.parse().ok()?)
    } else if let Some(pct) = part.strip_suffix('%') {
        MarginValue::Percent(pct.parse().ok()?)
    } else if part == "0" {
        MarginValue::Px(0.0)
    } else {
        return None;
    };
    match value {
        MarginValue::Px(v) | MarginValue::Percent(v) if v.is_finite() => Some(value),
        _ => None,
    }
}
