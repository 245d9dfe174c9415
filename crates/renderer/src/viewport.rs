//! Viewport geometry shared by zoom negotiation, the texture cache and the compositor.
//!
//! All grid-dimension state lives in one [`ViewportState`] owned by the
//! compositor, which is responsible for the mutation order
//! resize -> zoom negotiation -> cache invalidation -> full redraw.

use crate::tile::PixelRect;
use serde::{Deserialize, Serialize};

/// A size in window pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelSize {
    pub width: i32,
    pub height: i32,
}

impl PixelSize {
    #[inline]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// True when either axis is zero or negative.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// A size in grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GridSize {
    pub width: i32,
    pub height: i32,
}

impl GridSize {
    #[inline]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Clamp each axis independently into `bounds`.
    #[inline]
    pub fn clamp_to(self, bounds: GridBounds) -> Self {
        Self {
            width: self.width.clamp(bounds.min.width, bounds.max.width),
            height: self.height.clamp(bounds.min.height, bounds.max.height),
        }
    }

    /// Number of cells in the grid.
    #[inline]
    pub fn tile_count(self) -> usize {
        usize::try_from(self.width.max(0)).unwrap_or(0)
            * usize::try_from(self.height.max(0)).unwrap_or(0)
    }
}

/// Hard limits on the grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    pub min: GridSize,
    pub max: GridSize,
}

impl GridBounds {
    #[inline]
    pub const fn new(min: GridSize, max: GridSize) -> Self {
        Self { min, max }
    }

    /// Whether `size` lies within the bounds on both axes.
    #[inline]
    pub const fn contains(self, size: GridSize) -> bool {
        size.width >= self.min.width
            && size.height >= self.min.height
            && size.width <= self.max.width
            && size.height <= self.max.height
    }
}

impl Default for GridBounds {
    fn default() -> Self {
        Self {
            min: GridSize::new(80, 25),
            max: GridSize::new(256, 256),
        }
    }
}

/// Window, glyph and grid dimensions for the current display configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportState {
    /// Window size in pixels.
    pub window: PixelSize,
    /// Native glyph size for the active font mode.
    pub glyph: PixelSize,
    /// Size glyphs are actually displayed at after zooming.
    pub display_glyph: PixelSize,
    /// Current grid dimensions.
    pub grid: GridSize,
    /// Left edge of the grid, centering it in the window.
    pub origin_x: i32,
    /// Top edge of the grid, centering it in the window.
    pub origin_y: i32,
}

impl ViewportState {
    /// Viewport for a not-yet-sized window using the given glyph size.
    pub const fn new(glyph: PixelSize) -> Self {
        Self {
            window: PixelSize::new(0, 0),
            glyph,
            display_glyph: glyph,
            grid: GridSize::new(0, 0),
            origin_x: 0,
            origin_y: 0,
        }
    }

    /// Fit `requested` into the window.
    ///
    /// Picks the largest displayed glyph size that fits the requested grid in
    /// the window without exceeding the native glyph aspect ratio on either
    /// axis, then recomputes the grid from that glyph size (integer truncation
    /// may make it differ slightly from `requested`) and centers it.
    ///
    /// Returns true if the displayed glyph size changed.
    pub fn reshape(&mut self, requested: GridSize, bounds: GridBounds) -> bool {
        let grid_w = requested.width.max(1);
        let grid_h = requested.height.max(1);
        let glyph_w = f64::from(self.glyph.width.max(1));
        let glyph_h = f64::from(self.glyph.height.max(1));

        let mut try_x = f64::from(self.window.width / grid_w);
        let try_y = (try_x / glyph_w * glyph_h).min(f64::from(self.window.height / grid_h));
        try_x = try_x.min(try_y / glyph_h * glyph_w);

        let display = PixelSize::new((try_x as i32).max(1), (try_y as i32).max(1));
        let changed = display != self.display_glyph;
        self.display_glyph = display;

        self.grid = GridSize::new(
            self.window.width / display.width,
            self.window.height / display.height,
        )
        .clamp_to(bounds);
        self.origin_x = (self.window.width - display.width * self.grid.width) / 2;
        self.origin_y = (self.window.height - display.height * self.grid.height) / 2;
        changed
    }

    /// Pixel rectangle covered by the cell at column `x`, row `y`.
    pub fn tile_rect(&self, x: i32, y: i32) -> PixelRect {
        PixelRect::new(
            self.display_glyph.width * x + self.origin_x,
            self.display_glyph.height * y + self.origin_y,
            self.display_glyph.width.max(0).unsigned_abs(),
            self.display_glyph.height.max(0).unsigned_abs(),
        )
    }

    /// Pixel size of the whole grid.
    pub const fn grid_pixels(&self) -> PixelSize {
        PixelSize::new(
            self.display_glyph.width * self.grid.width,
            self.display_glyph.height * self.grid.height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> GridBounds {
        GridBounds::new(GridSize::new(2, 2), GridSize::new(500, 300))
    }

    #[test]
    fn reshape_at_natural_size_keeps_glyphs() {
        let mut viewport = ViewportState::new(PixelSize::new(8, 12));
        viewport.window = PixelSize::new(800, 600);
        let changed = viewport.reshape(GridSize::new(100, 50), bounds());
        assert!(!changed);
        assert_eq!(viewport.display_glyph, PixelSize::new(8, 12));
        assert_eq!(viewport.grid, GridSize::new(100, 50));
        assert_eq!((viewport.origin_x, viewport.origin_y), (0, 0));
    }

    #[test]
    fn reshape_zoomed_in_preserves_aspect_and_centers() {
        let mut viewport = ViewportState::new(PixelSize::new(8, 12));
        viewport.window = PixelSize::new(800, 600);
        // Half the columns: glyphs may double in width, height follows the aspect.
        assert!(viewport.reshape(GridSize::new(50, 25), bounds()));
        assert_eq!(viewport.display_glyph, PixelSize::new(16, 24));
        assert_eq!(viewport.grid, GridSize::new(50, 25));
        assert_eq!((viewport.origin_x, viewport.origin_y), (0, 0));
    }

    #[test]
    fn reshape_letterboxes_when_height_limits() {
        let mut viewport = ViewportState::new(PixelSize::new(8, 12));
        viewport.window = PixelSize::new(810, 300);
        viewport.reshape(GridSize::new(100, 50), bounds());
        // try_x = 8, try_y = min(12, 6) = 6, try_x = min(8, 4) = 4
        assert_eq!(viewport.display_glyph, PixelSize::new(4, 6));
        assert_eq!(viewport.grid, GridSize::new(202, 50));
        assert_eq!(viewport.origin_x, 1);
        assert_eq!(viewport.origin_y, 0);
    }

    #[test]
    fn reshape_never_produces_zero_sized_glyphs() {
        let mut viewport = ViewportState::new(PixelSize::new(8, 12));
        viewport.window = PixelSize::new(10, 10);
        viewport.reshape(GridSize::new(100, 100), bounds());
        assert_eq!(viewport.display_glyph, PixelSize::new(1, 1));
        assert!(bounds().contains(viewport.grid));
    }

    #[test]
    fn tile_rect_applies_origin() {
        let mut viewport = ViewportState::new(PixelSize::new(8, 12));
        viewport.window = PixelSize::new(810, 300);
        viewport.reshape(GridSize::new(100, 50), bounds());
        assert_eq!(viewport.tile_rect(2, 3), PixelRect::new(9, 18, 4, 6));
    }
}
