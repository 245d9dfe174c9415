//! CPU backend rendering into an in-memory RGBA canvas.
//!
//! Used for headless rendering, screenshots and tests. Each primitive is
//! drawn as a background fill followed by its texture, sampled
//! nearest-neighbour and modulated by the foreground color, both blended over
//! the canvas with straight alpha.

use crate::backend::{BackendSink, TextureHandle};
use crate::primitive::{PrimitiveSlice, TilePrimitive};
use anyhow::{Result as AnyResult, anyhow};
use image::{ImageFormat, Rgba, RgbaImage};
use log::{debug, trace};
use std::collections::BTreeMap;
use std::path::Path;

/// A [`BackendSink`] drawing into an [`RgbaImage`].
#[derive(Debug)]
pub struct OffscreenBackend {
    canvas: RgbaImage,
    textures: BTreeMap<TextureHandle, RgbaImage>,
    next_texture: u64,
    /// Maximum number of live textures; allocation beyond it fails.
    texture_limit: Option<usize>,
    draw_calls: usize,
    tiles_drawn: usize,
    frames_presented: u64,
}

impl OffscreenBackend {
    /// Opaque black canvas of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])),
            textures: BTreeMap::new(),
            next_texture: 0,
            texture_limit: None,
            draw_calls: 0,
            tiles_drawn: 0,
            frames_presented: 0,
        }
    }

    /// Refuse to hold more than `limit` textures at once.
    #[must_use]
    pub fn with_texture_limit(mut self, limit: usize) -> Self {
        self.texture_limit = Some(limit);
        self
    }

    /// Replace the canvas with a fresh one of the given size.
    pub fn resize_canvas(&mut self, width: u32, height: u32) {
        debug!(target: "tile_renderer", "Offscreen canvas resized to {width}x{height}");
        self.canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
    }

    /// Fill the whole canvas with one color.
    pub fn clear(&mut self, color: [u8; 4]) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = Rgba(color);
        }
    }

    /// Canvas pixel at (x, y), if inside the canvas.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        (x < self.canvas.width() && y < self.canvas.height())
            .then(|| self.canvas.get_pixel(x, y).0)
    }

    #[inline]
    pub const fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Pixels of a live texture.
    pub fn texture(&self, texture: TextureHandle) -> Option<&RgbaImage> {
        self.textures.get(&texture)
    }

    /// Textures created and not yet destroyed.
    #[inline]
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// `draw_primitives` calls received so far.
    #[inline]
    pub const fn draw_calls(&self) -> usize {
        self.draw_calls
    }

    /// Primitives drawn so far.
    #[inline]
    pub const fn tiles_drawn(&self) -> usize {
        self.tiles_drawn
    }

    #[inline]
    pub const fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Write the canvas as a PNG.
    ///
    /// # Errors
    /// Returns an error if the file cannot be encoded or written.
    pub fn save_to_file(&self, path: &Path) -> AnyResult<()> {
        self.canvas
            .save_with_format(path, ImageFormat::Png)
            .map_err(|err| anyhow!("failed to save canvas to {}: {err}", path.display()))
    }

    fn draw_one(&mut self, primitive: &TilePrimitive) {
        let [left, top, right, bottom] = primitive.quad.bounds();
        let quad_w = right - left;
        let quad_h = bottom - top;
        if quad_w <= 0.0 || quad_h <= 0.0 {
            return;
        }
        let x_start = left.max(0.0) as u32;
        let y_start = top.max(0.0) as u32;
        let x_end = (right.max(0.0) as u32).min(self.canvas.width());
        let y_end = (bottom.max(0.0) as u32).min(self.canvas.height());

        let coords = &primitive.tex_coords.0;
        let u_min = coords.iter().map(|uv| uv[0]).fold(f32::INFINITY, f32::min);
        let u_max = coords.iter().map(|uv| uv[0]).fold(f32::NEG_INFINITY, f32::max);
        let v_min = coords.iter().map(|uv| uv[1]).fold(f32::INFINITY, f32::min);
        let v_max = coords.iter().map(|uv| uv[1]).fold(f32::NEG_INFINITY, f32::max);

        let bg = primitive.bg.flat();
        let fg = primitive.fg.flat();
        let texture = self.textures.get(&primitive.texture);
        if texture.is_none() {
            trace!(
                target: "tile_renderer",
                "Primitive references missing texture {}",
                primitive.texture.0
            );
        }

        for py in y_start..y_end {
            for px in x_start..x_end {
                let dst = self.canvas.get_pixel_mut(px, py);
                blend_over(dst, bg);
                let Some(texture) = texture else {
                    continue;
                };
                let frac_x = (px as f32 + 0.5 - left) / quad_w;
                let frac_y = (py as f32 + 0.5 - top) / quad_h;
                let tex_u = u_min + (u_max - u_min) * frac_x;
                let tex_v = v_min + (v_max - v_min) * frac_y;
                let tex_x = ((tex_u * texture.width() as f32) as u32)
                    .min(texture.width().saturating_sub(1));
                let tex_y = ((tex_v * texture.height() as f32) as u32)
                    .min(texture.height().saturating_sub(1));
                let texel = texture.get_pixel(tex_x, tex_y).0;
                let color = [
                    f32::from(texel[0]) / 255.0 * fg[0],
                    f32::from(texel[1]) / 255.0 * fg[1],
                    f32::from(texel[2]) / 255.0 * fg[2],
                    f32::from(texel[3]) / 255.0 * fg[3],
                ];
                blend_over(dst, color);
            }
        }
    }
}

/// Straight-alpha "over" blend of `color` onto `dst`; the result is opaque
/// when `dst` is.
fn blend_over(dst: &mut Rgba<u8>, color: [f32; 4]) {
    let alpha = color[3].clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    for channel in 0..3 {
        let below = f32::from(dst.0[channel]) / 255.0;
        let value = color[channel].clamp(0.0, 1.0) * alpha + below * (1.0 - alpha);
        dst.0[channel] = (value * 255.0).round() as u8;
    }
    let below_alpha = f32::from(dst.0[3]) / 255.0;
    dst.0[3] = ((alpha + below_alpha * (1.0 - alpha)) * 255.0).round() as u8;
}

impl BackendSink for OffscreenBackend {
    fn create_texture(&mut self, pixels: &RgbaImage) -> AnyResult<TextureHandle> {
        if let Some(limit) = self.texture_limit
            && self.textures.len() >= limit
        {
            return Err(anyhow!("texture limit of {limit} reached"));
        }
        self.next_texture += 1;
        let texture = TextureHandle(self.next_texture);
        self.textures.insert(texture, pixels.clone());
        Ok(texture)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
    }

    fn draw_primitives(&mut self, primitives: PrimitiveSlice<'_>) {
        self.draw_calls += 1;
        for primitive in primitives.iter() {
            self.draw_one(&primitive);
            self.tiles_drawn += 1;
        }
    }

    fn present(&mut self) -> AnyResult<()> {
        self.frames_presented += 1;
        trace!(
            target: "tile_renderer",
            "Offscreen frame {} presented ({} draw calls so far)",
            self.frames_presented,
            self.draw_calls
        );
        Ok(())
    }
}
