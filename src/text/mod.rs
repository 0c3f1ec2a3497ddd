//! Bitmap text.

/// Glyph sources, the built-in font and the font registry.
pub mod font;
