//! Per-tile draw primitives.
//!
//! A tile is drawn as two triangles (six vertices: upper left, upper right,
//! lower left, lower left, upper right, lower right). Primitives are stored
//! struct-of-arrays so a backend can upload positions, colors and texture
//! coordinates as separate contiguous buffers.

use crate::backend::TextureHandle;
use crate::tile::{PixelRect, Rgb, TileKey};
use bytemuck::{Pod, Zeroable};
use core::ops::Range;

/// Vertices emitted per tile.
pub const VERTICES_PER_TILE: usize = 6;

/// Vertex positions of one tile in window pixels.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct TileQuad(pub [[f32; 2]; VERTICES_PER_TILE]);

impl TileQuad {
    /// Two triangles covering `rect`.
    pub fn from_rect(rect: PixelRect) -> Self {
        let left = rect.x as f32;
        let top = rect.y as f32;
        let right = rect.right() as f32;
        let bottom = rect.bottom() as f32;
        Self([
            [left, top],
            [right, top],
            [left, bottom],
            [left, bottom],
            [right, top],
            [right, bottom],
        ])
    }

    /// Axis-aligned bounds of the quad as (left, top, right, bottom).
    pub fn bounds(&self) -> [f32; 4] {
        self.0.iter().fold(
            [f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY],
            |acc, vertex| {
                [
                    acc[0].min(vertex[0]),
                    acc[1].min(vertex[1]),
                    acc[2].max(vertex[0]),
                    acc[3].max(vertex[1]),
                ]
            },
        )
    }
}

/// Per-vertex RGBA colors of one tile.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct TileColors(pub [[f32; 4]; VERTICES_PER_TILE]);

impl TileColors {
    /// The same color on every vertex (flat shading).
    #[inline]
    pub const fn splat(color: [f32; 4]) -> Self {
        Self([color; VERTICES_PER_TILE])
    }

    /// Color of the first vertex, which is what flat shading reads.
    #[inline]
    pub const fn flat(&self) -> [f32; 4] {
        self.0[0]
    }
}

/// Per-vertex texture coordinates of one tile.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct TileTexCoords(pub [[f32; 2]; VERTICES_PER_TILE]);

impl TileTexCoords {
    /// Map the whole texture onto the quad, origin at the top left.
    pub const FULL: Self = Self([
        [0.0, 0.0],
        [1.0, 0.0],
        [0.0, 1.0],
        [0.0, 1.0],
        [1.0, 0.0],
        [1.0, 1.0],
    ]);
}

/// Everything a backend needs to draw one tile.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TilePrimitive {
    pub quad: TileQuad,
    pub fg: TileColors,
    pub bg: TileColors,
    pub tex_coords: TileTexCoords,
    pub texture: TextureHandle,
}

impl TilePrimitive {
    /// An ordinary glyph tile drawn with a cached, colorized texture.
    ///
    /// The texture already carries both colors, so the foreground tint is
    /// white; the background is still emitted for the background pass.
    pub fn tile(rect: PixelRect, key: TileKey, texture: TextureHandle) -> Self {
        Self {
            quad: TileQuad::from_rect(rect),
            fg: TileColors::splat(Rgb::WHITE.with_alpha(1.0)),
            bg: TileColors::splat(key.bg.with_alpha(1.0)),
            tex_coords: TileTexCoords::FULL,
            texture,
        }
    }

    /// A rich-text fragment: untinted texture, no background so the glyph
    /// backgrounds underneath are left alone.
    pub fn rich_text(rect: PixelRect, texture: TextureHandle) -> Self {
        Self {
            quad: TileQuad::from_rect(rect),
            fg: TileColors::splat([1.0, 1.0, 1.0, 1.0]),
            bg: TileColors::splat([0.0, 0.0, 0.0, 0.0]),
            tex_coords: TileTexCoords::FULL,
            texture,
        }
    }
}

/// Growable struct-of-arrays storage for tile primitives.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveArrays {
    positions: Vec<TileQuad>,
    fg: Vec<TileColors>,
    bg: Vec<TileColors>,
    tex_coords: Vec<TileTexCoords>,
    textures: Vec<TextureHandle>,
}

impl PrimitiveArrays {
    /// Empty storage.
    pub const fn new() -> Self {
        Self {
            positions: Vec::new(),
            fg: Vec::new(),
            bg: Vec::new(),
            tex_coords: Vec::new(),
            textures: Vec::new(),
        }
    }

    /// Storage holding `len` zeroed slots.
    pub fn with_len(len: usize) -> Self {
        let mut arrays = Self::new();
        arrays.resize(len);
        arrays
    }

    /// Number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Append a primitive.
    pub fn push(&mut self, primitive: &TilePrimitive) {
        self.positions.push(primitive.quad);
        self.fg.push(primitive.fg);
        self.bg.push(primitive.bg);
        self.tex_coords.push(primitive.tex_coords);
        self.textures.push(primitive.texture);
    }

    /// Overwrite the slot at `index`. `index` must be in bounds.
    pub fn write(&mut self, index: usize, primitive: &TilePrimitive) {
        self.positions[index] = primitive.quad;
        self.fg[index] = primitive.fg;
        self.bg[index] = primitive.bg;
        self.tex_coords[index] = primitive.tex_coords;
        self.textures[index] = primitive.texture;
    }

    /// Read back the slot at `index`, if any.
    pub fn get(&self, index: usize) -> Option<TilePrimitive> {
        Some(TilePrimitive {
            quad: *self.positions.get(index)?,
            fg: *self.fg.get(index)?,
            bg: *self.bg.get(index)?,
            tex_coords: *self.tex_coords.get(index)?,
            texture: *self.textures.get(index)?,
        })
    }

    /// Grow or shrink to `len` slots; new slots are zeroed.
    pub fn resize(&mut self, len: usize) {
        self.positions.resize(len, TileQuad::default());
        self.fg.resize(len, TileColors::default());
        self.bg.resize(len, TileColors::default());
        self.tex_coords.resize(len, TileTexCoords::default());
        self.textures.resize(len, TextureHandle::default());
    }

    /// Copy the slots in `src` to start at `dest`, each array from itself.
    pub fn copy_within(&mut self, src: Range<usize>, dest: usize) {
        self.positions.copy_within(src.clone(), dest);
        self.fg.copy_within(src.clone(), dest);
        self.bg.copy_within(src.clone(), dest);
        self.tex_coords.copy_within(src.clone(), dest);
        self.textures.copy_within(src, dest);
    }

    /// Drop every slot.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.fg.clear();
        self.bg.clear();
        self.tex_coords.clear();
        self.textures.clear();
    }

    /// Borrow a contiguous run of slots.
    pub fn slice(&self, range: Range<usize>) -> PrimitiveSlice<'_> {
        PrimitiveSlice {
            positions: &self.positions[range.clone()],
            fg: &self.fg[range.clone()],
            bg: &self.bg[range.clone()],
            tex_coords: &self.tex_coords[range.clone()],
            textures: &self.textures[range],
        }
    }

    /// Borrow every slot.
    pub fn as_slice(&self) -> PrimitiveSlice<'_> {
        self.slice(0..self.len())
    }
}

impl FromIterator<TilePrimitive> for PrimitiveArrays {
    fn from_iter<Iter: IntoIterator<Item = TilePrimitive>>(iter: Iter) -> Self {
        let mut arrays = Self::new();
        for primitive in iter {
            arrays.push(&primitive);
        }
        arrays
    }
}

/// A borrowed run of primitives handed to a backend in one draw call.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveSlice<'prims> {
    pub positions: &'prims [TileQuad],
    pub fg: &'prims [TileColors],
    pub bg: &'prims [TileColors],
    pub tex_coords: &'prims [TileTexCoords],
    pub textures: &'prims [TextureHandle],
}

impl PrimitiveSlice<'_> {
    /// Number of tiles in the run.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of vertices in the run.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.len() * VERTICES_PER_TILE
    }

    /// Positions as a flat float buffer, ready for upload.
    pub fn position_floats(&self) -> &[f32] {
        bytemuck::cast_slice(self.positions)
    }

    /// Tile at `index` within the run.
    pub fn get(&self, index: usize) -> Option<TilePrimitive> {
        Some(TilePrimitive {
            quad: *self.positions.get(index)?,
            fg: *self.fg.get(index)?,
            bg: *self.bg.get(index)?,
            tex_coords: *self.tex_coords.get(index)?,
            texture: *self.textures.get(index)?,
        })
    }

    /// Iterate the run in draw order.
    pub fn iter(&self) -> impl Iterator<Item = TilePrimitive> + '_ {
        (0..self.len()).filter_map(|index| self.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::GlyphId;

    fn sample(index: u64) -> TilePrimitive {
        let key = TileKey::new(GlyphId(1), Rgb::WHITE, Rgb::new(0.0, 0.0, index as f32 / 10.0));
        TilePrimitive::tile(PixelRect::new(index as i32, 0, 1, 1), key, TextureHandle(index))
    }

    #[test]
    fn quad_covers_rect() {
        let quad = TileQuad::from_rect(PixelRect::new(8, 12, 8, 12));
        assert_eq!(quad.bounds(), [8.0, 12.0, 16.0, 24.0]);
        assert_eq!(quad.0[5], [16.0, 24.0]);
    }

    #[test]
    fn copy_within_moves_every_array_from_itself() {
        let mut arrays: PrimitiveArrays = (0..4).map(sample).collect();
        arrays.resize(8);
        arrays.copy_within(2..4, 6);
        assert_eq!(arrays.get(6), Some(sample(2)));
        assert_eq!(arrays.get(7), Some(sample(3)));
        // The background of the moved slot must come from the background array.
        let moved = arrays.get(7).unwrap_or_default();
        assert_eq!(moved.bg.flat(), [0.0, 0.0, 0.3, 1.0]);
        assert_eq!(moved.fg.flat(), [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn slice_exposes_flat_buffers() {
        let arrays: PrimitiveArrays = (0..3).map(sample).collect();
        let slice = arrays.slice(1..3);
        assert_eq!(slice.len(), 2);
        assert_eq!(slice.vertex_count(), 12);
        assert_eq!(slice.position_floats().len(), 24);
        assert_eq!(slice.textures, &[TextureHandle(1), TextureHandle(2)]);
        assert_eq!(slice.iter().count(), 2);
    }

    #[test]
    fn rich_text_has_transparent_background() {
        let primitive = TilePrimitive::rich_text(PixelRect::new(0, 0, 4, 4), TextureHandle(9));
        assert_eq!(primitive.bg.flat()[3], 0.0);
        assert_eq!(primitive.fg.flat(), [1.0; 4]);
    }
}
