//! Zoom and grid-size negotiation.
//!
//! Zoom is a single integer knob: a number of grid cells added to (or removed
//! from) the natural grid size along the driving axis, with the other axis
//! following the window's aspect ratio. The legal grid-size window is two-sided
//! and aspect-locked, so the correction that keeps the grid inside it
//! (`forced_steps`) is found by a bounded monotone search.

use crate::viewport::{GridBounds, GridSize, PixelSize};
use log::debug;

/// Zoom commands accepted by [`ZoomNegotiator::zoom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomCommand {
    /// Fewer, larger cells.
    ZoomIn,
    /// More, smaller cells.
    ZoomOut,
    /// Drop the user's zoom and recompute the forced correction.
    ResetSteps,
    /// Recompute the forced correction only.
    ResetGrid,
}

/// Zoom offsets and the unzoomed grid size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomState {
    /// User-chosen offset.
    pub zoom_steps: i32,
    /// System-imposed correction keeping the grid within bounds.
    pub forced_steps: i32,
    /// Columns of native-size glyphs that fill the window.
    pub natural_width: i32,
    /// Rows of native-size glyphs that fill the window.
    pub natural_height: i32,
}

impl Default for ZoomState {
    fn default() -> Self {
        Self {
            zoom_steps: 0,
            forced_steps: 0,
            natural_width: 1,
            natural_height: 1,
        }
    }
}

/// Computes grid sizes from the window, the glyph size and the zoom state.
#[derive(Debug, Clone)]
pub struct ZoomNegotiator {
    state: ZoomState,
    bounds: GridBounds,
    zoom_speed: i32,
    glyph: PixelSize,
}

impl ZoomNegotiator {
    pub fn new(bounds: GridBounds, zoom_speed: i32, glyph: PixelSize) -> Self {
        Self {
            state: ZoomState::default(),
            bounds,
            zoom_speed,
            glyph,
        }
    }

    #[inline]
    pub const fn state(&self) -> ZoomState {
        self.state
    }

    #[inline]
    pub const fn bounds(&self) -> GridBounds {
        self.bounds
    }

    /// Switch to another font's glyph size (e.g. windowed vs. fullscreen).
    pub fn set_glyph_size(&mut self, glyph: PixelSize) {
        self.glyph = glyph;
    }

    /// Recompute the natural grid for a new window size and return the grid
    /// to reshape to.
    pub fn resize(&mut self, window: PixelSize) -> GridSize {
        self.state.natural_width = (window.width / self.glyph.width.max(1)).max(1);
        self.state.natural_height = (window.height / self.glyph.height.max(1)).max(1);
        self.compute_forced_zoom();
        let grid = self.compute_zoom(true);
        debug!(
            target: "tile_renderer",
            "Natural grid {}x{}, forced steps {}, zoomed grid {}x{}",
            self.state.natural_width,
            self.state.natural_height,
            self.state.forced_steps,
            grid.width,
            grid.height
        );
        grid
    }

    /// Grid size for the current zoom, optionally clamped to the bounds.
    ///
    /// The axis whose glyph dimension is larger is derived: with glyphs taller
    /// than wide the width is stepped directly and the height follows
    /// proportionally, and vice versa.
    pub fn compute_zoom(&self, clamp: bool) -> GridSize {
        let steps = self.state.zoom_steps.saturating_add(self.state.forced_steps);
        let natural_w = f64::from(self.state.natural_width);
        let natural_h = f64::from(self.state.natural_height);
        let zoomed = if self.glyph.width < self.glyph.height {
            let width = self.state.natural_width.saturating_add(steps);
            GridSize::new(width, (natural_h * (f64::from(width) / natural_w)) as i32)
        } else {
            let height = self.state.natural_height.saturating_add(steps);
            GridSize::new((natural_w * (f64::from(height) / natural_h)) as i32, height)
        };
        if clamp {
            zoomed.clamp_to(self.bounds)
        } else {
            zoomed
        }
    }

    /// Find the forced correction that brings the unclamped grid within bounds.
    ///
    /// Both axes grow with the driving variable, so stepping up while either
    /// axis is too small and then down while either is too large terminates.
    /// Each walk starts from the closest driving size that still fails, so the
    /// step count stays small however skewed the window's aspect ratio is.
    pub fn compute_forced_zoom(&mut self) {
        let ((natural, min_driving, max_driving), (derived, min_derived, max_derived)) = self.axes();
        // Derived cells per driving cell.
        let ratio = f64::from(derived) / f64::from(natural);
        let base = natural.saturating_add(self.state.zoom_steps);

        self.state.forced_steps = 0;
        let mut zoomed = self.compute_zoom(false);
        if self.below_min(zoomed) {
            // Every driving size below `lowest` leaves an axis under its minimum.
            let lowest = min_driving.max(((f64::from(min_derived) / ratio).floor() as i32).saturating_sub(1));
            self.state.forced_steps = lowest.saturating_sub(base).max(0);
            zoomed = self.compute_zoom(false);
            while self.below_min(zoomed) {
                self.state.forced_steps += 1;
                zoomed = self.compute_zoom(false);
            }
        }
        if self.above_max(zoomed) {
            // Every driving size from `highest` up leaves an axis over its maximum.
            let highest = max_driving.saturating_add(1).min(
                ((f64::from(max_derived.saturating_add(1)) / ratio).ceil() as i32).saturating_add(1),
            );
            self.state.forced_steps = self.state.forced_steps.min(highest.saturating_sub(base));
            zoomed = self.compute_zoom(false);
            while self.above_max(zoomed) {
                self.state.forced_steps -= 1;
                zoomed = self.compute_zoom(false);
            }
        }
    }

    /// `(natural, min, max)` of the driving axis, then of the derived axis.
    const fn axes(&self) -> ((i32, i32, i32), (i32, i32, i32)) {
        let width = (self.state.natural_width, self.bounds.min.width, self.bounds.max.width);
        let height = (self.state.natural_height, self.bounds.min.height, self.bounds.max.height);
        if self.glyph.width < self.glyph.height {
            (width, height)
        } else {
            (height, width)
        }
    }

    const fn below_min(&self, grid: GridSize) -> bool {
        grid.width < self.bounds.min.width || grid.height < self.bounds.min.height
    }

    const fn above_max(&self, grid: GridSize) -> bool {
        grid.width > self.bounds.max.width || grid.height > self.bounds.max.height
    }

    /// Apply a zoom command.
    ///
    /// Returns the grid size to reshape to, or `None` when a zoom in/out would
    /// not change the clamped grid, in which case the step is rolled back.
    pub fn zoom(&mut self, command: ZoomCommand) -> Option<GridSize> {
        let before = self.compute_zoom(true);
        let before_steps = self.state.zoom_steps;
        match command {
            ZoomCommand::ZoomIn => {
                self.state.zoom_steps = self.state.zoom_steps.saturating_sub(self.zoom_speed);
            }
            ZoomCommand::ZoomOut => {
                self.state.zoom_steps = self.state.zoom_steps.saturating_add(self.zoom_speed);
            }
            ZoomCommand::ResetSteps => {
                self.state.zoom_steps = 0;
                self.compute_forced_zoom();
            }
            ZoomCommand::ResetGrid => self.compute_forced_zoom(),
        }
        let after = self.compute_zoom(true);
        let stepping = matches!(command, ZoomCommand::ZoomIn | ZoomCommand::ZoomOut);
        if stepping && after == before {
            self.state.zoom_steps = before_steps;
            return None;
        }
        Some(after)
    }
}
