use crate::foundation::error::{PaintError, PaintResult};

/// Engine-wide tuning knobs.
///
/// Embedded in scene files under `opts`; every field is optional there and falls back to the
/// [`Default`] value. [`EngineOpts::from_env`] layers `FIXPAINT_*` environment overrides on top.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineOpts {
    /// Track damage and redraw only dirty rectangles. When off, every frame is a full redraw.
    pub dirty_rects_enabled: bool,
    /// Maximum number of non-overlapping dirty rectangles before falling back to a full redraw.
    pub dirty_rect_capacity: usize,
    /// Non-dirty area (in pixels) tolerated when merging two rectangles into their union.
    pub max_non_dirty_area: i64,
    /// Outset applied to the bounds of rotated or sheared nodes.
    pub dirty_rect_pad: i32,
    /// Draw the dirty set on top of each frame.
    pub debug_overlay: bool,
    /// Default interpolation mode for new rasterizers.
    pub bilinear: bool,
    /// Default sub-pixel positioning mode for new rasterizers.
    pub fractional_metrics: bool,
    /// Maximum bytes retained by the group back-buffer pool.
    pub surface_pool_bytes: usize,
    /// Maximum retained back buffers per size bucket.
    pub surface_pool_per_bucket: usize,
}

impl Default for EngineOpts {
    fn default() -> Self {
        Self {
            dirty_rects_enabled: true,
            dirty_rect_capacity: 64,
            max_non_dirty_area: 2048,
            dirty_rect_pad: 1,
            debug_overlay: false,
            bilinear: true,
            fractional_metrics: true,
            surface_pool_bytes: 64 * 1024 * 1024,
            surface_pool_per_bucket: 4,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Some(true),
            "0" | "false" | "off" | "no" => Some(false),
            _ => None,
        })
}

impl EngineOpts {
    /// Defaults with `FIXPAINT_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `FIXPAINT_*` environment overrides. Unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_flag("FIXPAINT_DIRTY_RECTS") {
            self.dirty_rects_enabled = v;
        }
        self.dirty_rect_capacity = env_parse::<usize>("FIXPAINT_DIRTY_RECT_CAPACITY")
            .filter(|&n| n > 0)
            .unwrap_or(self.dirty_rect_capacity);
        self.max_non_dirty_area = env_parse::<i64>("FIXPAINT_MAX_NON_DIRTY_AREA")
            .filter(|&n| n >= 0)
            .unwrap_or(self.max_non_dirty_area);
        self.dirty_rect_pad = env_parse::<i32>("FIXPAINT_DIRTY_RECT_PAD")
            .filter(|&n| n >= 0)
            .unwrap_or(self.dirty_rect_pad);
        if let Some(v) = env_flag("FIXPAINT_DEBUG_OVERLAY") {
            self.debug_overlay = v;
        }
        if let Some(v) = env_flag("FIXPAINT_BILINEAR") {
            self.bilinear = v;
        }
        if let Some(v) = env_flag("FIXPAINT_FRACTIONAL_METRICS") {
            self.fractional_metrics = v;
        }
        self.surface_pool_bytes = env_parse::<usize>("FIXPAINT_SURFACE_POOL_BYTES")
            .unwrap_or(self.surface_pool_bytes);
        self.surface_pool_per_bucket = env_parse::<usize>("FIXPAINT_SURFACE_POOL_PER_BUCKET")
            .unwrap_or(self.surface_pool_per_bucket);
        self
    }

    /// Reject option combinations the engine cannot honor.
    pub fn validate(&self) -> PaintResult<()> {
        if self.dirty_rect_capacity == 0 {
            return Err(PaintError::config("dirty_rect_capacity must be > 0"));
        }
        if self.max_non_dirty_area < 0 {
            return Err(PaintError::config("max_non_dirty_area must be >= 0"));
        }
        if self.dirty_rect_pad < 0 {
            return Err(PaintError::config("dirty_rect_pad must be >= 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
