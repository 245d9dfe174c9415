//! Tile grid renderer: colorized glyph caching, zoom negotiation and partial
//! redraw on top of a pluggable graphics backend.

pub mod backend;
pub mod compositor;
pub mod config;
pub mod display;
pub mod offscreen;
pub mod partial;
pub mod primitive;
pub mod texture_cache;
pub mod tile;
pub mod viewport;
pub mod zoom;

pub use backend::{BackendSink, GlyphImage, GlyphRasterizer, GridContentProvider, TextureHandle};
pub use compositor::{FrameCompositor, FrameStats, RedrawStrategy};
pub use config::{DisplayConfig, DisplayMode, FontConfig, RedrawMode, RendererConfig};
pub use display::{DisplayError, DisplaySurface, NegotiatedDisplay, open_display};
pub use offscreen::OffscreenBackend;
pub use partial::PartialRedrawBuffer;
pub use primitive::{
    PrimitiveArrays, PrimitiveSlice, TileColors, TilePrimitive, TileQuad, TileTexCoords,
    VERTICES_PER_TILE,
};
pub use texture_cache::{CachedTexture, ColorizedTextureCache, colorize};
pub use tile::{GlyphId, GridCell, PixelRect, Rgb, TileKey};
pub use viewport::{GridBounds, GridSize, PixelSize, ViewportState};
pub use zoom::{ZoomCommand, ZoomNegotiator, ZoomState};
