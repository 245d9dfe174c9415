//! Colorized glyph texture cache.
//!
//! Each distinct (glyph, foreground, background) triple is rasterized,
//! colorized and uploaded once, then reused until the displayed glyph size
//! changes. Textures are owned by the backend; the cache only holds handles
//! and destroys them on [`ColorizedTextureCache::clear`].

use crate::backend::{BackendSink, GlyphImage, GlyphRasterizer, TextureHandle};
use crate::tile::{Rgb, TileKey};
use crate::viewport::PixelSize;
use anyhow::{Result as AnyResult, anyhow};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use log::{debug, trace};
use std::collections::BTreeMap;
use std::mem;

/// A backend texture holding one colorized glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedTexture {
    pub texture: TextureHandle,
    /// Size of the glyph as rasterized.
    pub source_width: u32,
    pub source_height: u32,
    /// Size of the uploaded texture.
    pub width: u32,
    pub height: u32,
}

/// Map from tile identity to its colorized texture.
#[derive(Debug, Default)]
pub struct ColorizedTextureCache {
    entries: BTreeMap<TileKey, CachedTexture>,
    /// Resize target for new textures; `None` uploads glyphs at native size
    /// and leaves scaling to the backend.
    display_size: Option<PixelSize>,
    hits: u64,
    misses: u64,
}

impl ColorizedTextureCache {
    /// Empty cache uploading textures at `display_size` (or native size).
    pub fn new(display_size: Option<PixelSize>) -> Self {
        Self {
            entries: BTreeMap::new(),
            display_size,
            hits: 0,
            misses: 0,
        }
    }

    /// Texture for `key`, creating it on first use.
    ///
    /// # Errors
    /// Returns an error if the glyph cannot be rasterized or the backend
    /// cannot allocate the texture.
    pub fn lookup<R, B>(
        &mut self,
        key: TileKey,
        rasterizer: &mut R,
        sink: &mut B,
    ) -> AnyResult<CachedTexture>
    where
        R: GlyphRasterizer + ?Sized,
        B: BackendSink + ?Sized,
    {
        if let Some(cached) = self.entries.get(&key) {
            self.hits += 1;
            return Ok(*cached);
        }
        self.misses += 1;

        let glyph = rasterizer
            .rasterize(key.glyph)
            .map_err(|err| anyhow!("failed to rasterize glyph {}: {err}", key.glyph.0))?;
        let mut pixels = colorize(&glyph, key.fg, key.bg);
        if let Some(size) = self.display_size
            && !size.is_empty()
            && (size.width.unsigned_abs(), size.height.unsigned_abs()) != pixels.dimensions()
        {
            pixels = imageops::resize(
                &pixels,
                size.width.unsigned_abs(),
                size.height.unsigned_abs(),
                FilterType::Nearest,
            );
        }
        let texture = sink.create_texture(&pixels).map_err(|err| {
            anyhow!(
                "failed to allocate {}x{} texture for glyph {}: {err}",
                pixels.width(),
                pixels.height(),
                key.glyph.0
            )
        })?;
        trace!(
            target: "tile_renderer",
            "Cached glyph {} as texture {} ({} entries)",
            key.glyph.0,
            texture.0,
            self.entries.len() + 1
        );

        let cached = CachedTexture {
            texture,
            source_width: glyph.width(),
            source_height: glyph.height(),
            width: pixels.width(),
            height: pixels.height(),
        };
        self.entries.insert(key, cached);
        Ok(cached)
    }

    /// Destroy every cached texture. Safe to call on an empty cache.
    pub fn clear<B: BackendSink + ?Sized>(&mut self, sink: &mut B) {
        if self.entries.is_empty() {
            return;
        }
        let entries = mem::take(&mut self.entries);
        debug!(
            target: "tile_renderer",
            "Clearing texture cache ({} textures)",
            entries.len()
        );
        for cached in entries.into_values() {
            sink.destroy_texture(cached.texture);
        }
    }

    /// Change the size new textures are uploaded at. Clears the cache when the
    /// size actually changes; returns whether it did.
    pub fn set_display_size<B: BackendSink + ?Sized>(
        &mut self,
        display_size: Option<PixelSize>,
        sink: &mut B,
    ) -> bool {
        if self.display_size == display_size {
            return false;
        }
        self.display_size = display_size;
        self.clear(sink);
        true
    }

    #[inline]
    pub const fn display_size(&self) -> Option<PixelSize> {
        self.display_size
    }

    /// Whether `key` already has a texture.
    #[inline]
    pub fn contains(&self, key: &TileKey) -> bool {
        self.entries.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookups answered from the cache.
    #[inline]
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that had to rasterize.
    #[inline]
    pub const fn misses(&self) -> u64 {
        self.misses
    }
}

/// Blend a glyph's coverage between `fg` and `bg` into an opaque image.
///
/// Colors are quantized to 8 bits before blending, and every source channel
/// modulates the foreground, so colored glyphs keep their tint.
pub fn colorize(glyph: &GlyphImage, fg: Rgb, bg: Rgb) -> RgbaImage {
    let fg = fg.to_rgb8().map(|channel| f32::from(channel) / 255.0);
    let bg = bg.to_rgb8().map(|channel| f32::from(channel) / 255.0);
    let mut out = RgbaImage::new(glyph.width(), glyph.height());
    for (target, source) in out.pixels_mut().zip(glyph.pixels.pixels()) {
        let alpha = if glyph.has_alpha {
            f32::from(source.0[3]) / 255.0
        } else {
            1.0
        };
        let mut blended = [0_u8, 0, 0, 255];
        for channel in 0..3 {
            let src = f32::from(source.0[channel]) / 255.0;
            let value = alpha * (src * fg[channel]) + (1.0 - alpha) * bg[channel];
            blended[channel] = (value * 255.0) as u8;
        }
        *target = Rgba(blended);
    }
    out
}
