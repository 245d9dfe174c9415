//! Frame compositor.
//!
//! Owns the viewport, zoom negotiation, the colorized texture cache and the
//! redraw strategy, and turns grid updates into backend draw calls:
//!
//! 1. `update_tile` / `update_all` look each cell up in the cache and queue
//!    its primitive;
//! 2. `render` draws the queued tiles, then the rich-text overlay, then
//!    presents. Rich text lives as long as the tiles submitted with it, so
//!    partial redraw never paints retained tiles over it.
//!
//! Dropping the compositor releases every cached texture.
//!
//! Any change of the displayed glyph size (window resize, display mode
//! switch, zoom) runs resize -> zoom negotiation -> cache invalidation ->
//! full redraw, in that order.

use crate::backend::{BackendSink, GlyphRasterizer, GridContentProvider};
use crate::config::{DisplayMode, RedrawMode, RendererConfig};
use crate::partial::PartialRedrawBuffer;
use crate::primitive::{PrimitiveArrays, TilePrimitive};
use crate::texture_cache::ColorizedTextureCache;
use crate::tile::GridCell;
use crate::viewport::{GridSize, PixelSize, ViewportState};
use crate::zoom::{ZoomCommand, ZoomNegotiator, ZoomState};
use anyhow::{Result as AnyResult, anyhow};
use std::collections::VecDeque;
use log::{debug, info};
use tracing::info_span;

/// How submitted tiles reach the backend.
#[derive(Debug, Clone)]
pub enum RedrawStrategy {
    /// Tiles are drawn once, in the frame they were submitted.
    Full(PrimitiveArrays),
    /// Tiles are redrawn for the last `depth` frames.
    Partial(PartialRedrawBuffer),
}

impl RedrawStrategy {
    pub fn from_config(config: &RendererConfig) -> Self {
        match config.redraw {
            RedrawMode::Full => Self::Full(PrimitiveArrays::new()),
            RedrawMode::Partial { depth } => Self::Partial(PartialRedrawBuffer::new(
                config.partial_buffer_capacity,
                depth,
            )),
        }
    }

    /// Queue one tile for drawing.
    pub fn submit(&mut self, primitive: &TilePrimitive) {
        match self {
            Self::Full(batch) => batch.push(primitive),
            Self::Partial(buffer) => buffer.submit_tile(primitive),
        }
    }

    /// Tiles the next `draw` will emit.
    pub fn pending(&self) -> usize {
        match self {
            Self::Full(batch) => batch.len(),
            Self::Partial(buffer) => buffer.live_count(),
        }
    }

    /// Issue the draw calls; returns how many were made.
    pub fn draw<B: BackendSink + ?Sized>(&self, sink: &mut B) -> usize {
        match self {
            Self::Full(batch) if batch.is_empty() => 0,
            Self::Full(batch) => {
                sink.draw_primitives(batch.as_slice());
                1
            }
            Self::Partial(buffer) => buffer.draw(sink),
        }
    }

    /// Finish the frame. Returns the number of tiles dropped from the queue
    /// if the oldest frame's tiles were retired.
    pub fn end_frame(&mut self) -> Option<usize> {
        match self {
            Self::Full(batch) => {
                let drawn = batch.len();
                batch.clear();
                Some(drawn)
            }
            Self::Partial(buffer) => buffer.end_era(),
        }
    }

    /// Drop everything queued.
    pub fn reset(&mut self) {
        match self {
            Self::Full(batch) => batch.clear(),
            Self::Partial(buffer) => buffer.reset(),
        }
    }
}

/// What one `render` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Number of frames rendered so far, this one included.
    pub frame: u64,
    pub draw_calls: usize,
    pub tiles_drawn: usize,
    pub rich_text_drawn: usize,
    /// Tiles that will not be drawn again.
    pub tiles_retired: usize,
    pub cached_textures: usize,
}

/// Drives a [`BackendSink`] from a grid of tiles.
pub struct FrameCompositor<R, B: BackendSink> {
    config: RendererConfig,
    mode: DisplayMode,
    viewport: ViewportState,
    zoom: ZoomNegotiator,
    cache: ColorizedTextureCache,
    strategy: RedrawStrategy,
    /// Rich-text fragments per live frame, oldest first; the last batch
    /// collects the current frame. Drawn after the tiles.
    rich_text: VecDeque<PrimitiveArrays>,
    rasterizer: R,
    sink: B,
    full_redraw: bool,
    frame: u64,
}

impl<R: GlyphRasterizer, B: BackendSink> FrameCompositor<R, B> {
    /// Create a compositor for `mode`. The grid is empty until the first
    /// [`resize`](Self::resize).
    ///
    /// # Errors
    /// Returns an error if `config` fails validation.
    pub fn new(config: RendererConfig, mode: DisplayMode, rasterizer: R, sink: B) -> AnyResult<Self> {
        config
            .validate()
            .map_err(|err| anyhow!("cannot create compositor: {err}"))?;
        let glyph = config.font.glyph_size(mode);
        debug!(
            target: "tile_renderer",
            "Compositor created ({mode:?}, {:?}, glyph {}x{})",
            config.redraw,
            glyph.width,
            glyph.height
        );
        Ok(Self {
            config,
            mode,
            viewport: ViewportState::new(glyph),
            zoom: ZoomNegotiator::new(config.grid, config.zoom_speed, glyph),
            cache: ColorizedTextureCache::new(config.resize_to_display.then_some(glyph)),
            strategy: RedrawStrategy::from_config(&config),
            rich_text: VecDeque::from([PrimitiveArrays::new()]),
            rasterizer,
            sink,
            full_redraw: true,
            frame: 0,
        })
    }

    /// Adapt to a new window size. Returns false if the size is unchanged.
    pub fn resize(&mut self, window: PixelSize) -> bool {
        if window == self.viewport.window && self.viewport.grid.tile_count() > 0 {
            return false;
        }
        info!(
            target: "tile_renderer",
            "New window size: {}x{}",
            window.width,
            window.height
        );
        self.apply_window(window);
        true
    }

    /// Switch between windowed and fullscreen glyph sizes, keeping the window
    /// size. Returns false if already in `mode`.
    pub fn set_display_mode(&mut self, mode: DisplayMode) -> bool {
        if mode == self.mode {
            return false;
        }
        self.mode = mode;
        self.apply_window(self.viewport.window);
        true
    }

    /// Apply a zoom command. Returns true if the grid was reshaped.
    pub fn zoom(&mut self, command: ZoomCommand) -> bool {
        match self.zoom.zoom(command) {
            Some(grid) => {
                self.reshape(grid);
                true
            }
            None => false,
        }
    }

    fn apply_window(&mut self, window: PixelSize) {
        let glyph = self.config.font.glyph_size(self.mode);
        if glyph != self.viewport.glyph {
            info!(
                target: "tile_renderer",
                "Font size: {}x{}",
                glyph.width,
                glyph.height
            );
        }
        self.viewport.window = window;
        self.viewport.glyph = glyph;
        self.zoom.set_glyph_size(glyph);
        let grid = self.zoom.resize(window);
        self.reshape(grid);
    }

    fn reshape(&mut self, requested: GridSize) {
        let glyph_changed = self.viewport.reshape(requested, self.zoom.bounds());
        let display_size = self
            .config
            .resize_to_display
            .then_some(self.viewport.display_glyph);
        self.cache.set_display_size(display_size, &mut self.sink);
        self.cache.clear(&mut self.sink);
        self.strategy.reset();
        self.rich_text.clear();
        self.rich_text.push_back(PrimitiveArrays::new());
        self.full_redraw = true;
        info!(
            target: "tile_renderer",
            "Grid resized to {}x{} (glyphs {}x{}{}, origin {},{})",
            self.viewport.grid.width,
            self.viewport.grid.height,
            self.viewport.display_glyph.width,
            self.viewport.display_glyph.height,
            if glyph_changed { ", changed" } else { "" },
            self.viewport.origin_x,
            self.viewport.origin_y
        );
    }

    /// Queue the cell at column `x`, row `y` for the next frame.
    ///
    /// # Errors
    /// Returns an error if the glyph cannot be rasterized or the backend runs
    /// out of texture space. Callers should treat the latter as fatal.
    pub fn update_tile<P: GridContentProvider + ?Sized>(
        &mut self,
        provider: &P,
        x: i32,
        y: i32,
    ) -> AnyResult<()> {
        match provider.cell_at(x, y) {
            GridCell::Tile(key) => {
                let cached = self
                    .cache
                    .lookup(key, &mut self.rasterizer, &mut self.sink)
                    .map_err(|err| anyhow!("tile ({x}, {y}): {err}"))?;
                let primitive = TilePrimitive::tile(self.viewport.tile_rect(x, y), key, cached.texture);
                self.strategy.submit(&primitive);
            }
            GridCell::RichText { texture, rect } => {
                if let Some(batch) = self.rich_text.back_mut() {
                    batch.push(&TilePrimitive::rich_text(rect, texture));
                }
            }
        }
        Ok(())
    }

    /// Queue every cell of the grid, column by column.
    ///
    /// # Errors
    /// Propagates the first `update_tile` failure.
    pub fn update_all<P: GridContentProvider + ?Sized>(&mut self, provider: &P) -> AnyResult<()> {
        let grid = self.viewport.grid;
        for x in 0..grid.width {
            for y in 0..grid.height {
                self.update_tile(provider, x, y)?;
            }
        }
        self.full_redraw = false;
        Ok(())
    }

    /// Draw the queued tiles, then rich text, and present the frame.
    ///
    /// # Errors
    /// Returns an error if the backend fails to present.
    pub fn render(&mut self) -> AnyResult<FrameStats> {
        let _span = info_span!("tile_renderer.render").entered();
        let tiles_drawn = self.strategy.pending();
        let mut draw_calls = self.strategy.draw(&mut self.sink);
        let mut rich_text_drawn = 0;
        for batch in self.rich_text.iter().filter(|batch| !batch.is_empty()) {
            self.sink.draw_primitives(batch.as_slice());
            rich_text_drawn += batch.len();
            draw_calls += 1;
        }

        let presented = self.sink.present();
        let retired = self.strategy.end_frame();
        if retired.is_some() {
            self.rich_text.pop_front();
        }
        self.rich_text.push_back(PrimitiveArrays::new());
        let tiles_retired = retired.unwrap_or(0);
        self.frame += 1;
        presented.map_err(|err| anyhow!("failed to present frame {}: {err}", self.frame))?;

        Ok(FrameStats {
            frame: self.frame,
            draw_calls,
            tiles_drawn,
            rich_text_drawn,
            tiles_retired,
            cached_textures: self.cache.len(),
        })
    }

    /// Whether the grid changed shape since the last `update_all`, so every
    /// tile must be resubmitted.
    #[inline]
    pub const fn needs_full_redraw(&self) -> bool {
        self.full_redraw
    }

    /// Read and clear the full-redraw flag.
    pub fn take_full_redraw(&mut self) -> bool {
        let full = self.full_redraw;
        self.full_redraw = false;
        full
    }

    #[inline]
    pub const fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    #[inline]
    pub const fn grid(&self) -> GridSize {
        self.viewport.grid
    }

    #[inline]
    pub const fn zoom_state(&self) -> ZoomState {
        self.zoom.state()
    }

    #[inline]
    pub const fn display_mode(&self) -> DisplayMode {
        self.mode
    }

    #[inline]
    pub const fn config(&self) -> &RendererConfig {
        &self.config
    }

    #[inline]
    pub const fn cache(&self) -> &ColorizedTextureCache {
        &self.cache
    }

    #[inline]
    pub const fn strategy(&self) -> &RedrawStrategy {
        &self.strategy
    }

    #[inline]
    pub const fn sink(&self) -> &B {
        &self.sink
    }

    #[inline]
    pub fn sink_mut(&mut self) -> &mut B {
        &mut self.sink
    }

    #[inline]
    pub fn rasterizer_mut(&mut self) -> &mut R {
        &mut self.rasterizer
    }
}

impl<R, B: BackendSink> Drop for FrameCompositor<R, B> {
    fn drop(&mut self) {
        self.cache.clear(&mut self.sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GlyphImage, TextureHandle};
    use crate::primitive::PrimitiveSlice;
    use crate::tile::{GlyphId, PixelRect, Rgb, TileKey};
    use crate::viewport::GridBounds;
    use image::{Rgba, RgbaImage};
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::rc::Rc;

    struct SolidRasterizer;

    impl GlyphRasterizer for SolidRasterizer {
        fn rasterize(&mut self, _glyph: GlyphId) -> AnyResult<GlyphImage> {
            Ok(GlyphImage {
                pixels: RgbaImage::from_pixel(8, 12, Rgba([255, 255, 255, 255])),
                has_alpha: true,
            })
        }
    }

    #[derive(Default)]
    struct LogSink {
        created: u64,
        destroyed: usize,
        /// (first texture, len) of every draw call.
        calls: Vec<(u64, usize)>,
        presents: usize,
        fail_present: bool,
    }

    impl BackendSink for LogSink {
        fn create_texture(&mut self, _pixels: &RgbaImage) -> AnyResult<TextureHandle> {
            self.created += 1;
            Ok(TextureHandle(self.created))
        }

        fn destroy_texture(&mut self, _texture: TextureHandle) {
            self.destroyed += 1;
        }

        fn draw_primitives(&mut self, primitives: PrimitiveSlice<'_>) {
            let first = primitives.textures.first().map_or(0, |texture| texture.0);
            self.calls.push((first, primitives.len()));
        }

        fn present(&mut self) -> AnyResult<()> {
            self.presents += 1;
            if self.fail_present {
                return Err(anyhow!("surface lost"));
            }
            Ok(())
        }
    }

    /// Every cell shows glyph 1, except (0, 0) which holds rich text.
    struct Grid;

    impl GridContentProvider for Grid {
        fn cell_at(&self, x: i32, y: i32) -> GridCell {
            if (x, y) == (0, 0) {
                return GridCell::RichText {
                    texture: TextureHandle(1000),
                    rect: PixelRect::new(0, 0, 16, 12),
                };
            }
            GridCell::Tile(TileKey::new(GlyphId(1), Rgb::WHITE, Rgb::BLACK))
        }
    }

    fn config(redraw: RedrawMode) -> RendererConfig {
        RendererConfig {
            grid: GridBounds::new(GridSize::new(2, 2), GridSize::new(500, 300)),
            redraw,
            ..RendererConfig::default()
        }
    }

    fn compositor(redraw: RedrawMode) -> FrameCompositor<SolidRasterizer, LogSink> {
        let mut compositor =
            FrameCompositor::new(config(redraw), DisplayMode::Windowed, SolidRasterizer, LogSink::default())
                .unwrap();
        compositor.resize(PixelSize::new(80, 60));
        compositor
    }

    #[test]
    fn resize_computes_grid_and_requests_full_redraw() {
        let compositor = compositor(RedrawMode::Full);
        assert_eq!(compositor.grid(), GridSize::new(10, 5));
        assert_eq!(compositor.viewport().display_glyph, PixelSize::new(8, 12));
        assert!(compositor.needs_full_redraw());
    }

    #[test]
    fn unchanged_resize_is_ignored() {
        let mut compositor = compositor(RedrawMode::Full);
        assert!(compositor.take_full_redraw());
        assert!(!compositor.resize(PixelSize::new(80, 60)));
        assert!(!compositor.needs_full_redraw());
    }

    #[test]
    fn rich_text_is_drawn_after_tiles() {
        let mut compositor = compositor(RedrawMode::Full);
        compositor.update_all(&Grid).unwrap();
        let stats = compositor.render().unwrap();
        assert_eq!(stats.tiles_drawn, 49);
        assert_eq!(stats.rich_text_drawn, 1);
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(compositor.sink().calls, vec![(1, 49), (1000, 1)]);
        // One glyph, one texture.
        assert_eq!(stats.cached_textures, 1);
    }

    #[test]
    fn full_strategy_forgets_tiles_after_each_frame() {
        let mut compositor = compositor(RedrawMode::Full);
        compositor.update_tile(&Grid, 3, 3).unwrap();
        assert_eq!(compositor.render().unwrap().tiles_drawn, 1);
        let stats = compositor.render().unwrap();
        assert_eq!(stats.tiles_drawn, 0);
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(compositor.sink().presents, 2);
    }

    #[test]
    fn partial_strategy_keeps_tiles_until_retired() {
        let mut compositor = compositor(RedrawMode::Partial { depth: 2 });
        compositor.update_tile(&Grid, 3, 3).unwrap();
        compositor.update_tile(&Grid, 4, 3).unwrap();
        let frames: Vec<(usize, usize)> = (0..4)
            .map(|_| {
                let stats = compositor.render().unwrap();
                (stats.tiles_drawn, stats.tiles_retired)
            })
            .collect();
        // Submitted in the first era, retired once two newer eras exist.
        assert_eq!(frames, vec![(2, 0), (2, 0), (2, 2), (0, 0)]);
    }

    #[test]
    fn partial_strategy_keeps_rich_text_with_its_tiles() {
        let mut compositor = compositor(RedrawMode::Partial { depth: 2 });
        compositor.update_tile(&Grid, 0, 0).unwrap();
        compositor.update_tile(&Grid, 1, 0).unwrap();
        let frames: Vec<(usize, usize)> = (0..4)
            .map(|_| {
                let stats = compositor.render().unwrap();
                (stats.tiles_drawn, stats.rich_text_drawn)
            })
            .collect();
        assert_eq!(frames, vec![(1, 1), (1, 1), (1, 1), (0, 0)]);
        // The overlay always follows the tiles it sits on.
        assert_eq!(
            compositor.sink().calls,
            vec![(1, 1), (1000, 1), (1, 1), (1000, 1), (1, 1), (1000, 1)]
        );
    }

    #[test]
    fn reshape_drops_queued_rich_text() {
        let mut compositor = compositor(RedrawMode::Partial { depth: 2 });
        compositor.update_tile(&Grid, 0, 0).unwrap();
        compositor.render().unwrap();
        assert!(compositor.zoom(ZoomCommand::ZoomIn));
        let stats = compositor.render().unwrap();
        assert_eq!(stats.rich_text_drawn, 0);
        assert_eq!(stats.draw_calls, 0);
    }

    /// Records live textures in state that outlives the compositor.
    #[derive(Default)]
    struct SharedSink {
        live: Rc<RefCell<BTreeSet<u64>>>,
        next: u64,
    }

    impl BackendSink for SharedSink {
        fn create_texture(&mut self, _pixels: &RgbaImage) -> AnyResult<TextureHandle> {
            self.next += 1;
            self.live.borrow_mut().insert(self.next);
            Ok(TextureHandle(self.next))
        }

        fn destroy_texture(&mut self, texture: TextureHandle) {
            self.live.borrow_mut().remove(&texture.0);
        }

        fn draw_primitives(&mut self, _primitives: PrimitiveSlice<'_>) {}

        fn present(&mut self) -> AnyResult<()> {
            Ok(())
        }
    }

    /// Three distinct glyphs, one per column modulo 3.
    struct Columns;

    impl GridContentProvider for Columns {
        fn cell_at(&self, x: i32, _y: i32) -> GridCell {
            GridCell::Tile(TileKey::new(GlyphId(x.unsigned_abs() % 3), Rgb::WHITE, Rgb::BLACK))
        }
    }

    #[test]
    fn dropping_the_compositor_releases_cached_textures() {
        let sink = SharedSink::default();
        let live = Rc::clone(&sink.live);
        let mut compositor =
            FrameCompositor::new(config(RedrawMode::Full), DisplayMode::Windowed, SolidRasterizer, sink).unwrap();
        compositor.resize(PixelSize::new(80, 60));
        compositor.update_all(&Columns).unwrap();
        compositor.render().unwrap();
        assert_eq!(live.borrow().len(), 3);
        drop(compositor);
        assert!(live.borrow().is_empty());
    }

    #[test]
    fn zoom_reshapes_and_invalidates_cache() {
        let mut compositor = compositor(RedrawMode::Partial { depth: 2 });
        compositor.update_all(&Grid).unwrap();
        assert_eq!(compositor.cache().len(), 1);
        assert!(compositor.zoom(ZoomCommand::ZoomIn));
        assert!(compositor.cache().is_empty());
        assert_eq!(compositor.sink().destroyed, 1);
        assert_eq!(compositor.strategy().pending(), 0);
        assert!(compositor.needs_full_redraw());
        assert_eq!(compositor.zoom_state().zoom_steps, -10);
    }

    #[test]
    fn display_mode_switch_uses_other_font() {
        let mut compositor = compositor(RedrawMode::Full);
        assert!(compositor.set_display_mode(DisplayMode::Fullscreen));
        assert_eq!(compositor.viewport().glyph, PixelSize::new(16, 24));
        assert_eq!(compositor.grid(), GridSize::new(5, 2));
        assert!(!compositor.set_display_mode(DisplayMode::Fullscreen));
    }

    #[test]
    fn present_failure_is_propagated() {
        let mut compositor = compositor(RedrawMode::Full);
        compositor.sink_mut().fail_present = true;
        compositor.update_tile(&Grid, 1, 1).unwrap();
        let message = compositor
            .render()
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(message.contains("surface lost"), "{message}");
        // The batch is still consumed.
        assert_eq!(compositor.strategy().pending(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad = RendererConfig {
            zoom_speed: 0,
            ..RendererConfig::default()
        };
        assert!(FrameCompositor::new(bad, DisplayMode::Windowed, SolidRasterizer, LogSink::default()).is_err());
    }
}
