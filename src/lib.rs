//! A paintable mask layer for image annotation.
//!
//! [MaskLayer] turns pointer gestures into smoothed brush or eraser strokes,
//! keeps them in an undoable history and composes them into a raster mask that
//! can be drawn over the annotated image or exported with [MaskLayer::flatten].

mod compositor;
mod config;
mod error;
mod history;
mod layer;
mod path;
mod state;
mod style;

pub use compositor::{CanvasSize, Compositor};
pub use config::MaskConfig;
pub use error::MaskError;
pub use history::{CommittedStroke, HistoryStore};
pub use layer::MaskLayer;
pub use path::{Point, StrokePath};
pub use state::MaskState;
pub use style::{BrushColor, Mode, Style, StyleManager};
