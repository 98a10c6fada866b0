//! Raster composition of the mask.

use image::{Rgba, RgbaImage};
use tiny_skia::{Color, FilterQuality, Pixmap, PixmapMut, PixmapPaint, PixmapRef, Transform};

use crate::error::MaskError;
use crate::history::CommittedStroke;
use crate::path::StrokePath;
use crate::style::Style;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Owns the two mask buffers.
///
/// `composed` holds the current frame, `snapshot` the last settled frame (no
/// gesture in progress). Comparing both tells whether an eraser gesture changed
/// anything.
#[derive(Clone, Debug)]
pub struct Compositor {
    size: CanvasSize,
    composed: Pixmap,
    snapshot: Pixmap,
}

impl Compositor {
    pub fn new(size: CanvasSize) -> Result<Self, MaskError> {
        let allocate = || {
            Pixmap::new(size.width, size.height).ok_or(MaskError::InvalidSize {
                width: size.width,
                height: size.height,
            })
        };
        Ok(Self {
            size,
            composed: allocate()?,
            snapshot: allocate()?,
        })
    }

    pub fn size(&self) -> CanvasSize {
        self.size
    }

    /// Redraws `composed` from scratch: the visible strokes in commit order, then
    /// the in-progress gesture on top.
    pub fn compose(
        &mut self,
        visible: &[CommittedStroke],
        in_progress: Option<(&StrokePath, &Style)>,
    ) {
        self.composed.fill(Color::TRANSPARENT);
        for stroke in visible {
            draw_stroke(&mut self.composed, &stroke.path, &stroke.style, None);
        }
        if let Some((path, style)) = in_progress {
            draw_stroke(&mut self.composed, path, style, None);
        }
    }

    /// Keeps the current frame as the baseline for the next gesture.
    pub fn settle(&mut self) {
        self.snapshot.data_mut().copy_from_slice(self.composed.data());
    }

    pub fn differs_from_snapshot(&self) -> bool {
        self.composed.data() != self.snapshot.data()
    }

    pub fn composed(&self) -> PixmapRef<'_> {
        self.composed.as_ref()
    }

    /// Draws the composed mask into the host's target through `transform`.
    pub fn blit(&self, target: &mut PixmapMut<'_>, transform: Transform) {
        let paint = PixmapPaint {
            quality: FilterQuality::Nearest,
            ..PixmapPaint::default()
        };
        target.draw_pixmap(0, 0, self.composed.as_ref(), &paint, transform, None);
    }

    /// Replays `visible` fully opaque into a fresh image.
    pub fn flatten(&self, visible: &[CommittedStroke]) -> Result<RgbaImage, MaskError> {
        let mut pixmap =
            Pixmap::new(self.size.width, self.size.height).ok_or(MaskError::InvalidSize {
                width: self.size.width,
                height: self.size.height,
            })?;
        for stroke in visible {
            draw_stroke(&mut pixmap, &stroke.path, &stroke.style, Some(1.0));
        }

        let mut image = RgbaImage::new(self.size.width, self.size.height);
        for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
            let color = src.demultiply();
            *dst = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
        }
        Ok(image)
    }
}

fn draw_stroke(
    pixmap: &mut Pixmap,
    path: &StrokePath,
    style: &Style,
    opacity_override: Option<f32>,
) {
    let Some(geometry) = path.to_geometry() else {
        return;
    };
    pixmap.stroke_path(
        &geometry,
        &style.paint(opacity_override),
        &style.stroke(),
        Transform::identity(),
        None,
    );
}
