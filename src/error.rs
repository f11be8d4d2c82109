use thiserror::Error;

/// Rejected configuration, reported at the boundary where presets enter the
/// crate. Runtime operations never fail: missing elements and redundant
/// triggers are no-ops.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown easing curve `{0}`")]
    UnknownEasing(String),
    #[error("{field} must be a finite, non-negative number of seconds (got {value})")]
    InvalidDuration { field: &'static str, value: f32 },
    #[error("threshold must be within [0, 1] (got {0})")]
    InvalidThreshold(f64),
    #[error("invalid root margin `{0}`")]
    InvalidRootMargin(String),
    #[error("opacity must be within [0, 1] (got {0})")]
    InvalidOpacity(f32),
    #[error("scale must be finite and non-negative (got {0})")]
    InvalidScale(f32),
    #[error("parallax speed must be finite (got {0})")]
    InvalidSpeed(f32),
    #[error("autoplay interval must be positive")]
    InvalidInterval,
}
