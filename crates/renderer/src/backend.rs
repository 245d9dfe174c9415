//! Collaborator interfaces.
//!
//! The renderer never rasterizes fonts, owns the simulation grid or talks to a
//! graphics API itself. It consumes three collaborators instead:
//! - a [`GlyphRasterizer`] producing the raw image of a glyph,
//! - a [`GridContentProvider`] describing what each grid cell holds this frame,
//! - a [`BackendSink`] that owns textures and turns primitive arrays into pixels.

use crate::primitive::PrimitiveSlice;
use crate::tile::{GlyphId, GridCell};
use anyhow::Result as AnyResult;
use image::RgbaImage;

/// Opaque handle to a texture living in a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TextureHandle(pub u64);

/// Raw glyph pixels as produced by a rasterizer.
#[derive(Debug, Clone)]
pub struct GlyphImage {
    /// RGBA pixels; the alpha channel is the glyph coverage when `has_alpha`.
    pub pixels: RgbaImage,
    /// Whether the alpha channel carries coverage. When false every pixel is
    /// treated as fully opaque foreground.
    pub has_alpha: bool,
}

impl GlyphImage {
    /// Width of the glyph in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height of the glyph in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Produces glyph images for the active font.
pub trait GlyphRasterizer {
    /// Rasterize a glyph at its native size.
    ///
    /// # Errors
    /// Returns an error if the glyph does not exist in the tileset.
    fn rasterize(&mut self, glyph: GlyphId) -> AnyResult<GlyphImage>;
}

/// Answers "what is at (x, y)" for the grid being displayed.
pub trait GridContentProvider {
    /// Content of the cell at column `x`, row `y`.
    fn cell_at(&self, x: i32, y: i32) -> GridCell;
}

/// Graphics backend receiving textures and draw primitives.
pub trait BackendSink {
    /// Upload an image and return a handle to the new texture.
    ///
    /// # Errors
    /// Returns an error if the backend cannot allocate the texture.
    fn create_texture(&mut self, pixels: &RgbaImage) -> AnyResult<TextureHandle>;

    /// Release a texture previously returned by `create_texture`.
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Draw a contiguous run of tile primitives, in order.
    fn draw_primitives(&mut self, primitives: PrimitiveSlice<'_>);

    /// Present the finished frame.
    ///
    /// # Errors
    /// Returns an error if presentation fails.
    fn present(&mut self) -> AnyResult<()>;
}
