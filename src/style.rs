//! Brush and eraser styles, derived lazily from the brush color and the zoom scale.

use serde::{Deserialize, Serialize};
use tiny_skia::{BlendMode, Color, LineCap, LineJoin, Paint, Stroke};

use crate::config::MaskConfig;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Draw,
    Erase,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrushColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl BrushColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Everything needed to replay a stroke.
///
/// `width` is the on-canvas width, already divided by the scale that was current
/// when the style was derived.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub mode: Mode,
    pub color: BrushColor,
    pub width: f32,
    pub opacity: f32,
}

impl Style {
    pub fn brush(color: BrushColor, width: f32, opacity: f32) -> Self {
        Self {
            mode: Mode::Draw,
            color,
            width,
            opacity,
        }
    }

    pub fn eraser(width: f32) -> Self {
        Self {
            mode: Mode::Erase,
            color: BrushColor::rgb(0, 0, 0),
            width,
            opacity: 1.0,
        }
    }

    /// The paint for this style, optionally forcing a different opacity.
    pub fn paint(&self, opacity_override: Option<f32>) -> Paint<'static> {
        let opacity = opacity_override.unwrap_or(self.opacity).clamp(0.0, 1.0);
        let alpha = (255.0 * opacity) as u8;

        let mut paint = Paint::default();
        paint.anti_alias = true;
        match self.mode {
            Mode::Draw => {
                paint.set_color(Color::from_rgba8(
                    self.color.r,
                    self.color.g,
                    self.color.b,
                    alpha,
                ));
            }
            Mode::Erase => {
                paint.set_color(Color::BLACK);
                paint.blend_mode = BlendMode::Clear;
            }
        }
        paint
    }

    pub fn stroke(&self) -> Stroke {
        Stroke {
            width: self.width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        }
    }
}

/// Caches the brush and eraser styles and re-derives them only after the color
/// or the scale changed.
#[derive(Clone, Debug)]
pub struct StyleManager {
    base_width: f32,
    brush_opacity: f32,
    color: BrushColor,
    scale: f32,
    brush: Style,
    eraser: Style,
    brush_dirty: bool,
    eraser_dirty: bool,
}

impl StyleManager {
    pub fn new(config: &MaskConfig) -> Self {
        let color = BrushColor::rgb(0, 0, 0);
        Self {
            base_width: config.stroke_width,
            brush_opacity: config.brush_opacity,
            color,
            scale: 1.0,
            brush: Style::brush(color, config.stroke_width, config.brush_opacity),
            eraser: Style::eraser(config.stroke_width),
            brush_dirty: true,
            eraser_dirty: true,
        }
    }

    pub fn color(&self) -> BrushColor {
        self.color
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_color(&mut self, color: BrushColor) {
        if self.color != color {
            self.color = color;
            self.invalidate();
        }
    }

    /// Callers validate `scale` beforehand; it must be finite and positive.
    pub fn set_scale(&mut self, scale: f32) {
        if self.scale != scale {
            self.scale = scale;
            self.invalidate();
        }
    }

    fn invalidate(&mut self) {
        self.brush_dirty = true;
        self.eraser_dirty = true;
    }

    #[cfg(test)]
    fn is_dirty(&self) -> bool {
        self.brush_dirty || self.eraser_dirty
    }

    fn effective_width(&self) -> f32 {
        self.base_width / self.scale
    }

    /// Re-derives whichever style is pending.
    pub fn refresh(&mut self) {
        if self.brush_dirty {
            self.brush = Style::brush(self.color, self.effective_width(), self.brush_opacity);
            self.brush_dirty = false;
        }
        if self.eraser_dirty {
            self.eraser = Style::eraser(self.effective_width());
            self.eraser_dirty = false;
        }
    }

    /// The up-to-date style for `mode`.
    pub fn resolve(&mut self, mode: Mode) -> Style {
        self.refresh();
        match mode {
            Mode::Draw => self.brush,
            Mode::Erase => self.eraser,
        }
    }
}
