//! Tile identity: glyphs, colors and the per-cell values a grid provider hands out.

use crate::backend::TextureHandle;
use core::cmp::Ordering;
use core::hash::{Hash, Hasher};

/// Index of a glyph in the active tileset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GlyphId(pub u32);

/// Linear RGB color with channels in [0, 1].
///
/// Comparison is exact: two colors are equal only when every channel has the
/// same bit pattern, so `Rgb` can key a cache without any tolerance.
#[derive(Debug, Clone, Copy)]
pub struct Rgb(pub [f32; 3]);

impl Rgb {
    pub const BLACK: Self = Self([0.0; 3]);
    pub const WHITE: Self = Self([1.0; 3]);

    /// Create a color from its three channels.
    #[inline]
    pub const fn new(red: f32, green: f32, blue: f32) -> Self {
        Self([red, green, blue])
    }

    /// Channels quantized to 8 bits, truncating.
    #[inline]
    pub fn to_rgb8(self) -> [u8; 3] {
        self.0.map(|channel| (channel.clamp(0.0, 1.0) * 255.0) as u8)
    }

    /// Extend to RGBA with the given alpha.
    #[inline]
    pub const fn with_alpha(self, alpha: f32) -> [f32; 4] {
        [self.0[0], self.0[1], self.0[2], alpha]
    }

    fn bits(self) -> [u32; 3] {
        self.0.map(f32::to_bits)
    }
}

impl PartialEq for Rgb {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Rgb {}

impl Hash for Rgb {
    fn hash<State: Hasher>(&self, state: &mut State) {
        self.bits().hash(state);
    }
}

impl PartialOrd for Rgb {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rgb {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(left, right)| left.total_cmp(right))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

/// Identity of one colorized glyph texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub glyph: GlyphId,
    pub fg: Rgb,
    pub bg: Rgb,
}

impl TileKey {
    #[inline]
    pub const fn new(glyph: GlyphId, fg: Rgb, bg: Rgb) -> Self {
        Self { glyph, fg, bg }
    }
}

/// A rectangle in window pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    /// X coordinate in pixels.
    pub x: i32,
    /// Y coordinate in pixels.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelRect {
    /// Create a new pixel rectangle.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    #[must_use]
    pub fn right(self) -> i32 {
        self.x
            .saturating_add(i32::try_from(self.width).unwrap_or(i32::MAX))
    }

    /// Exclusive bottom edge.
    #[must_use]
    pub fn bottom(self) -> i32 {
        self.y
            .saturating_add(i32::try_from(self.height).unwrap_or(i32::MAX))
    }
}

/// What a grid coordinate holds for the current frame.
///
/// Produced on demand by a [`GridContentProvider`](crate::backend::GridContentProvider)
/// and never retained across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridCell {
    /// An ordinary glyph, colorized through the texture cache.
    Tile(TileKey),
    /// Text rendered by an external text subsystem, which owns the texture.
    RichText {
        texture: TextureHandle,
        rect: PixelRect,
    },
}
