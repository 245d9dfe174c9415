//! Renderer configuration.
//!
//! Loaded from JSON; every field has a default so a partial file (or none at
//! all) yields a usable configuration.

use crate::viewport::{GridBounds, PixelSize};
use anyhow::{Result as AnyResult, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Whether the display runs windowed or fullscreen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Windowed,
    Fullscreen,
}

/// How tiles are buffered between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RedrawMode {
    /// Every submitted tile is drawn once, in the frame it was submitted.
    Full,
    /// Submitted tiles stay in a ring buffer for `depth` further frames, for
    /// backends whose presentation is itself double or triple buffered.
    Partial { depth: usize },
}

impl Default for RedrawMode {
    fn default() -> Self {
        Self::Partial { depth: 2 }
    }
}

/// Native glyph sizes for each display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    pub windowed: PixelSize,
    pub fullscreen: PixelSize,
}

impl FontConfig {
    /// Glyph size used in `mode`.
    #[inline]
    pub const fn glyph_size(&self, mode: DisplayMode) -> PixelSize {
        match mode {
            DisplayMode::Windowed => self.windowed,
            DisplayMode::Fullscreen => self.fullscreen,
        }
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            windowed: PixelSize::new(8, 12),
            fullscreen: PixelSize::new(16, 24),
        }
    }
}

/// Requested display mode and resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub mode: DisplayMode,
    pub windowed: PixelSize,
    /// Zero on either axis means "use the desktop resolution".
    pub fullscreen: PixelSize,
}

impl DisplayConfig {
    /// Resolution requested for `mode`.
    #[inline]
    pub const fn resolution(&self, mode: DisplayMode) -> PixelSize {
        match mode {
            DisplayMode::Windowed => self.windowed,
            DisplayMode::Fullscreen => self.fullscreen,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Windowed,
            windowed: PixelSize::new(800, 600),
            fullscreen: PixelSize::new(0, 0),
        }
    }
}

/// Top-level renderer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Hard grid-size bounds.
    pub grid: GridBounds,
    /// Zoom steps applied per zoom command.
    pub zoom_speed: i32,
    pub redraw: RedrawMode,
    /// Initial ring buffer size, in tiles, for partial redraw.
    pub partial_buffer_capacity: usize,
    pub font: FontConfig,
    pub display: DisplayConfig,
    /// Resize colorized textures to the displayed glyph size. Disable when the
    /// backend scales textures itself.
    pub resize_to_display: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            grid: GridBounds::default(),
            zoom_speed: 10,
            redraw: RedrawMode::default(),
            partial_buffer_capacity: 2048,
            font: FontConfig::default(),
            display: DisplayConfig::default(),
            resize_to_display: true,
        }
    }
}

impl RendererConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or the values are inconsistent.
    pub fn from_json_str(text: &str) -> AnyResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|err| anyhow!("invalid renderer configuration: {err}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or fails to parse or validate.
    pub fn load(path: &Path) -> AnyResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|err| anyhow!("unable to read {}: {err}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Check the invariants the renderer relies on.
    ///
    /// # Errors
    /// Returns an error describing the first inconsistency found.
    pub fn validate(&self) -> AnyResult<()> {
        let GridBounds { min, max } = self.grid;
        if min.width < 1 || min.height < 1 {
            return Err(anyhow!(
                "minimum grid size must be at least 1x1, got {}x{}",
                min.width,
                min.height
            ));
        }
        if min.width > max.width || min.height > max.height {
            return Err(anyhow!(
                "minimum grid size {}x{} exceeds maximum {}x{}",
                min.width,
                min.height,
                max.width,
                max.height
            ));
        }
        for (label, glyph) in [("windowed", self.font.windowed), ("fullscreen", self.font.fullscreen)] {
            if glyph.is_empty() {
                return Err(anyhow!(
                    "{label} glyph size must be positive, got {}x{}",
                    glyph.width,
                    glyph.height
                ));
            }
        }
        if self.zoom_speed < 1 {
            return Err(anyhow!("zoom speed must be positive, got {}", self.zoom_speed));
        }
        if self.partial_buffer_capacity == 0 {
            return Err(anyhow!("partial buffer capacity must be non-zero"));
        }
        if let RedrawMode::Partial { depth: 0 } = self.redraw {
            return Err(anyhow!("partial redraw depth must be non-zero"));
        }
        Ok(())
    }
}
