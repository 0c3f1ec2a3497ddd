/// Convenience result type used across fixpaint.
pub type PaintResult<T> = Result<T, PaintError>;

/// Error taxonomy for the fallible edges of the engine.
///
/// Raster loops never produce these: degenerate geometry is skipped and dirty-rectangle
/// exhaustion degrades to a full redraw. Errors only come from loading scenes, decoding or
/// encoding images, and parsing configuration.
#[derive(thiserror::Error, Debug)]
pub enum PaintError {
    /// Invalid user-provided data (scene files, buffer dimensions).
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors while converting decoded images into raster buffers.
    #[error("asset error: {0}")]
    Asset(String),

    /// Errors while preparing a render target.
    #[error("render error: {0}")]
    Render(String),

    /// Invalid engine options.
    #[error("config error: {0}")]
    Config(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PaintError {
    /// Build a [`PaintError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PaintError::Asset`] value.
    pub fn asset(msg: impl Into<String>) -> Self {
        Self::Asset(msg.into())
    }

    /// Build a [`PaintError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`PaintError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`PaintError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
