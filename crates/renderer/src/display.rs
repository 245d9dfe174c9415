//! Display mode negotiation.
//!
//! Opening the display tries the configured mode first. A fullscreen failure
//! is recoverable: the mode falls back to windowed once and the caller keeps
//! going. A windowed failure is returned to the caller.

use crate::config::{DisplayConfig, DisplayMode};
use crate::viewport::PixelSize;
use core::error::Error;
use core::fmt;
use log::{info, warn};

/// Platform window or screen the renderer draws into.
pub trait DisplaySurface {
    /// Create or reconfigure the surface for `mode` at `size`.
    ///
    /// # Errors
    /// Returns an error if the platform refuses the mode or size.
    fn init_video(&mut self, mode: DisplayMode, size: PixelSize) -> Result<(), DisplayError>;

    /// Resolution of the desktop, used for automatic fullscreen sizing.
    fn desktop_size(&self) -> PixelSize;

    /// Size of the drawable area after a successful `init_video`.
    fn window_size(&self) -> PixelSize;
}

/// Display negotiation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayError {
    /// The platform rejected the requested mode and size.
    UnsupportedMode { mode: DisplayMode, size: PixelSize },
    /// The surface could not be created at all.
    InitializationFailed(String),
}

impl fmt::Display for DisplayError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedMode { mode, size } => write!(
                formatter,
                "Unsupported display mode: {mode:?} at {}x{}",
                size.width, size.height
            ),
            Self::InitializationFailed(msg) => write!(formatter, "Initialization failed: {msg}"),
        }
    }
}

impl Error for DisplayError {}

/// Mode and drawable size the display ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedDisplay {
    pub mode: DisplayMode,
    pub window: PixelSize,
}

/// Open `surface` in the mode `config` asks for.
///
/// An automatic (zero) fullscreen resolution is resolved from the desktop
/// size and written back to `config`, as is a fallback to windowed mode.
///
/// # Errors
/// Returns the windowed-mode error when no mode could be opened.
pub fn open_display<S: DisplaySurface + ?Sized>(
    surface: &mut S,
    config: &mut DisplayConfig,
) -> Result<NegotiatedDisplay, DisplayError> {
    if config.fullscreen.is_empty() {
        config.fullscreen = surface.desktop_size();
        info!(
            target: "tile_renderer",
            "Fullscreen resolution set to desktop size {}x{}",
            config.fullscreen.width,
            config.fullscreen.height
        );
    }

    let requested = config.resolution(config.mode);
    match surface.init_video(config.mode, requested) {
        Ok(()) => {}
        Err(err) if config.mode == DisplayMode::Fullscreen => {
            warn!(
                target: "tile_renderer",
                "Display initialization failure, trying windowed mode: {err}"
            );
            config.mode = DisplayMode::Windowed;
            surface.init_video(DisplayMode::Windowed, config.windowed)?;
        }
        Err(err) => return Err(err),
    }

    let window = surface.window_size();
    info!(
        target: "tile_renderer",
        "Display opened {:?} at {}x{}",
        config.mode,
        window.width,
        window.height
    );
    Ok(NegotiatedDisplay {
        mode: config.mode,
        window,
    })
}
