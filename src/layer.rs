//! The mask layer: gestures in, composed mask out.

use image::RgbaImage;
use tiny_skia::{PixmapMut, PixmapRef, Transform};

use crate::compositor::{CanvasSize, Compositor};
use crate::config::MaskConfig;
use crate::error::MaskError;
use crate::history::{CommittedStroke, HistoryStore};
use crate::path::StrokePath;
use crate::state::MaskState;
use crate::style::{BrushColor, Mode, Style, StyleManager};

/// A gesture that has started but not ended yet. Its style is fixed at start.
#[derive(Clone, Debug)]
struct ActiveStroke {
    path: StrokePath,
    style: Style,
}

/// A single editable mask over a fixed-size image.
///
/// The canvas size and the brush color have to be initialized once, in any order,
/// before gestures are accepted. Rendering before the size is known draws nothing.
///
/// All coordinates passed to the gesture methods are in mask space; the host
/// applies its own view transform before forwarding pointer events.
#[derive(Debug)]
pub struct MaskLayer {
    config: MaskConfig,
    compositor: Option<Compositor>,
    brush_color_initialized: bool,
    styles: StyleManager,
    mode: Mode,
    history: HistoryStore,
    active: Option<ActiveStroke>,
    restored: bool,
}

impl Default for MaskLayer {
    fn default() -> Self {
        Self::new(MaskConfig::default())
    }
}

impl MaskLayer {
    pub fn new(config: MaskConfig) -> Self {
        let styles = StyleManager::new(&config);
        Self {
            config,
            compositor: None,
            brush_color_initialized: false,
            styles,
            mode: Mode::Draw,
            history: HistoryStore::new(),
            active: None,
            restored: false,
        }
    }

    // ── Setup ───────────────────────────────────────────────────────────────

    pub fn init_size(&mut self, width: u32, height: u32) -> Result<(), MaskError> {
        if self.compositor.is_some() {
            return Err(MaskError::SizeAlreadyInitialized);
        }
        self.compositor = Some(Compositor::new(CanvasSize::new(width, height))?);
        log::debug!("Mask canvas initialized at {width}x{height}");
        Ok(())
    }

    pub fn init_brush_color(&mut self, color: BrushColor) -> Result<(), MaskError> {
        if self.brush_color_initialized {
            return Err(MaskError::BrushColorAlreadyInitialized);
        }
        self.styles.set_color(color);
        self.brush_color_initialized = true;
        Ok(())
    }

    pub fn set_brush_color(&mut self, color: BrushColor) -> Result<(), MaskError> {
        if !self.brush_color_initialized {
            return Err(MaskError::BrushColorNotInitialized);
        }
        self.styles.set_color(color);
        Ok(())
    }

    pub fn size(&self) -> Option<CanvasSize> {
        self.compositor.as_ref().map(Compositor::size)
    }

    pub fn brush_color(&self) -> Option<BrushColor> {
        self.brush_color_initialized.then(|| self.styles.color())
    }

    fn is_ready(&self) -> bool {
        self.compositor.is_some() && self.brush_color_initialized
    }

    // ── Mode & scale ────────────────────────────────────────────────────────

    /// Takes effect at the next gesture start.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Updates the zoom factor of the host view. Only cached styles are affected;
    /// stroke geometry stays in mask space.
    pub fn set_scale(&mut self, scale: f32) -> Result<(), MaskError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(MaskError::InvalidScale(scale));
        }
        self.styles.set_scale(scale);
        Ok(())
    }

    pub fn scale(&self) -> f32 {
        self.styles.scale()
    }

    fn touch_tolerance(&self) -> f32 {
        self.config.touch_slop / self.styles.scale()
    }

    // ── Gestures ────────────────────────────────────────────────────────────

    pub fn is_drawing(&self) -> bool {
        self.active.is_some()
    }

    pub fn gesture_start(&mut self, x: f32, y: f32) {
        if !self.is_ready() {
            log::warn!("Ignoring gesture start before the mask layer is initialized");
            return;
        }
        if self.active.is_some() {
            log::warn!("Gesture started while another one was in progress, dropping the old one");
        }
        self.active = None;
        self.settle();

        let style = self.styles.resolve(self.mode);
        self.active = Some(ActiveStroke {
            path: StrokePath::start(x, y),
            style,
        });
    }

    pub fn gesture_move(&mut self, x: f32, y: f32) {
        let tolerance = self.touch_tolerance();
        if let Some(active) = &mut self.active {
            if active.path.add_point(x, y, tolerance) {
                log::trace!("Accepted point ({x}, {y})");
            }
        }
    }

    /// Finishes the gesture. Returns whether it was committed to the history.
    ///
    /// A brush gesture needs more than its anchor point; an eraser gesture must
    /// actually change pixels of the settled mask.
    pub fn gesture_end(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        let Some(compositor) = self.compositor.as_mut() else {
            return false;
        };

        let visible_change = match active.style.mode {
            Mode::Draw => active.path.has_multiple_points(),
            Mode::Erase => {
                compositor.compose(self.history.visible(), Some((&active.path, &active.style)));
                compositor.differs_from_snapshot()
            }
        };

        if visible_change {
            log::debug!(
                "Committing {:?} stroke with {} point(s)",
                active.style.mode,
                active.path.points().len()
            );
            self.history.commit(CommittedStroke {
                path: active.path,
                style: active.style,
            });
        } else {
            log::debug!("Discarding {:?} gesture without visible change", active.style.mode);
        }

        self.settle();
        visible_change
    }

    /// Drops the in-progress gesture without committing it.
    pub fn gesture_cancel(&mut self) {
        if self.active.take().is_some() {
            log::debug!("Gesture cancelled");
            self.settle();
        }
    }

    // ── History ─────────────────────────────────────────────────────────────

    pub fn undo(&mut self) {
        self.history.undo();
        log::debug!("Undo, {} stroke(s) hidden", self.history.hidden_tail());
        self.resettle_during_gesture();
    }

    pub fn redo(&mut self) {
        self.history.redo();
        log::debug!("Redo, {} stroke(s) hidden", self.history.hidden_tail());
        self.resettle_during_gesture();
    }

    /// A gesture in progress compares against the settled mask, which has to
    /// follow the visible set when it changes under the gesture.
    fn resettle_during_gesture(&mut self) {
        if self.active.is_some() {
            self.settle();
        }
    }

    pub fn undo_available(&self) -> bool {
        self.history.undo_available()
    }

    pub fn redo_available(&self) -> bool {
        self.history.redo_available()
    }

    /// Total number of committed strokes, hidden ones included.
    pub fn committed_count(&self) -> usize {
        self.history.len()
    }

    pub fn visible_count(&self) -> usize {
        self.history.visible_count()
    }

    // ── Rendering ───────────────────────────────────────────────────────────

    /// Recomposes the mask and draws it into `target` through `transform`.
    pub fn render(&mut self, target: &mut PixmapMut<'_>, transform: Transform) {
        let Some(compositor) = self.compositor.as_mut() else {
            return;
        };
        let in_progress = self.active.as_ref().map(|a| (&a.path, &a.style));
        compositor.compose(self.history.visible(), in_progress);
        if in_progress.is_none() {
            compositor.settle();
        }
        compositor.blit(target, transform);
    }

    /// The buffer produced by the latest composition.
    pub fn composed(&self) -> Option<PixmapRef<'_>> {
        self.compositor.as_ref().map(Compositor::composed)
    }

    /// Exports the visible strokes fully opaque, or `None` before the size is known.
    pub fn flatten(&self) -> Option<RgbaImage> {
        let compositor = self.compositor.as_ref()?;
        match compositor.flatten(self.history.visible()) {
            Ok(image) => Some(image),
            Err(err) => {
                log::error!("Failed to flatten mask: {err}");
                None
            }
        }
    }

    fn settle(&mut self) {
        if let Some(compositor) = self.compositor.as_mut() {
            compositor.compose(self.history.visible(), None);
            compositor.settle();
        }
    }

    // ── State capture ───────────────────────────────────────────────────────

    pub fn capture_state(&self) -> MaskState {
        MaskState {
            strokes: self.history.all().to_vec(),
            hidden_tail: self.history.hidden_tail(),
            brush_color: self.brush_color(),
        }
    }

    /// Adds the captured strokes to this layer. Only allowed once.
    pub fn restore_state(&mut self, state: MaskState) -> Result<(), MaskError> {
        if self.restored {
            return Err(MaskError::AlreadyRestored);
        }
        let count = state.strokes.len();
        self.history.restore(state.strokes, state.hidden_tail)?;
        if let Some(color) = state.brush_color {
            self.styles.set_color(color);
            self.brush_color_initialized = true;
        }
        self.restored = true;
        self.settle();
        log::debug!("Restored {count} stroke(s), {} hidden", self.history.hidden_tail());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_skia::Pixmap;

    fn ready_layer() -> MaskLayer {
        let mut layer = MaskLayer::default();
        layer.init_size(100, 100).unwrap();
        layer.init_brush_color(BrushColor::rgb(255, 0, 0)).unwrap();
        layer
    }

    fn render(layer: &mut MaskLayer) -> Vec<u8> {
        let mut target = Pixmap::new(100, 100).unwrap();
        layer.render(&mut target.as_mut(), Transform::identity());
        target.data().to_vec()
    }

    #[test]
    fn double_initialization_is_rejected() {
        let mut layer = ready_layer();
        assert!(matches!(
            layer.init_size(10, 10),
            Err(MaskError::SizeAlreadyInitialized)
        ));
        assert!(matches!(
            layer.init_brush_color(BrushColor::rgb(0, 0, 255)),
            Err(MaskError::BrushColorAlreadyInitialized)
        ));
    }

    #[test]
    fn brush_color_must_be_initialized_before_it_is_changed() {
        let mut layer = MaskLayer::default();
        assert!(matches!(
            layer.set_brush_color(BrushColor::rgb(1, 2, 3)),
            Err(MaskError::BrushColorNotInitialized)
        ));
    }

    #[test]
    fn gestures_before_initialization_are_ignored() {
        let mut layer = MaskLayer::default();
        layer.init_size(50, 50).unwrap();
        layer.gesture_start(5.0, 5.0);
        layer.gesture_move(5.0, 40.0);
        assert!(!layer.is_drawing());
        assert!(!layer.gesture_end());
        assert_eq!(layer.committed_count(), 0);
    }

    #[test]
    fn render_before_size_draws_nothing() {
        let mut layer = MaskLayer::default();
        let mut target = Pixmap::new(10, 10).unwrap();
        layer.render(&mut target.as_mut(), Transform::identity());
        assert!(target.data().iter().all(|&b| b == 0));
        assert!(layer.flatten().is_none());
    }

    #[test]
    fn invalid_scale_is_rejected() {
        let mut layer = ready_layer();
        assert!(layer.set_scale(0.0).is_err());
        assert!(layer.set_scale(f32::NAN).is_err());
        assert!(layer.set_scale(2.0).is_ok());
        assert_eq!(layer.scale(), 2.0);
    }

    #[test]
    fn tolerance_shrinks_when_zoomed_in() {
        let mut layer = ready_layer();
        layer.set_scale(4.0).unwrap();
        layer.gesture_start(10.0, 10.0);
        layer.gesture_move(10.0, 13.0);
        assert!(layer.gesture_end());
    }

    #[test]
    fn in_progress_stroke_keeps_its_starting_mode() {
        let mut layer = ready_layer();
        layer.gesture_start(10.0, 10.0);
        layer.set_mode(Mode::Erase);
        layer.gesture_move(10.0, 40.0);
        assert!(layer.gesture_end());
        assert_eq!(layer.capture_state().strokes[0].style.mode, Mode::Draw);
        assert_eq!(layer.mode(), Mode::Erase);
    }

    #[test]
    fn cancel_discards_the_gesture() {
        let mut layer = ready_layer();
        let empty = render(&mut layer);
        layer.gesture_start(10.0, 10.0);
        layer.gesture_move(10.0, 60.0);
        assert_ne!(render(&mut layer), empty);

        layer.gesture_cancel();
        assert!(!layer.is_drawing());
        assert!(!layer.gesture_end());
        assert_eq!(layer.committed_count(), 0);
        assert_eq!(render(&mut layer), empty);
    }

    #[test]
    fn erasing_a_drawn_stroke_is_committed() {
        let mut layer = ready_layer();
        layer.gesture_start(10.0, 50.0);
        layer.gesture_move(90.0, 50.0);
        assert!(layer.gesture_end());

        layer.set_mode(Mode::Erase);
        layer.gesture_start(50.0, 10.0);
        layer.gesture_move(50.0, 90.0);
        assert!(layer.gesture_end());
        assert_eq!(layer.committed_count(), 2);
    }

    #[test]
    fn erasing_after_undo_compares_against_the_current_state() {
        let mut layer = ready_layer();
        layer.gesture_start(10.0, 50.0);
        layer.gesture_move(90.0, 50.0);
        layer.gesture_end();
        layer.undo();

        layer.set_mode(Mode::Erase);
        layer.gesture_start(50.0, 10.0);
        layer.gesture_move(50.0, 90.0);
        assert!(!layer.gesture_end());
        assert!(layer.redo_available());
    }

    #[test]
    fn undo_during_an_eraser_gesture_does_not_commit_a_no_op() {
        let mut layer = ready_layer();
        layer.gesture_start(10.0, 50.0);
        layer.gesture_move(90.0, 50.0);
        assert!(layer.gesture_end());

        layer.set_mode(Mode::Erase);
        layer.gesture_start(50.0, 10.0);
        layer.gesture_move(50.0, 90.0);
        layer.undo();
        assert!(!layer.gesture_end());

        assert_eq!(layer.committed_count(), 1);
        assert!(layer.redo_available());
        layer.redo();
        assert_eq!(layer.visible_count(), 1);
    }

    #[test]
    fn redo_during_an_eraser_gesture_compares_against_the_redone_mask() {
        let mut layer = ready_layer();
        layer.gesture_start(10.0, 50.0);
        layer.gesture_move(90.0, 50.0);
        layer.gesture_end();
        layer.undo();

        layer.set_mode(Mode::Erase);
        layer.gesture_start(50.0, 10.0);
        layer.gesture_move(50.0, 90.0);
        layer.redo();
        assert!(layer.gesture_end());
        assert_eq!(layer.committed_count(), 2);
    }

    #[test]
    fn scale_change_mid_gesture_keeps_the_starting_width() {
        let mut layer = ready_layer();
        layer.gesture_start(10.0, 10.0);
        layer.set_scale(4.0).unwrap();
        layer.gesture_move(10.0, 40.0);
        assert!(layer.gesture_end());
        assert_eq!(layer.capture_state().strokes[0].style.width, 80.0);

        layer.gesture_start(50.0, 10.0);
        layer.gesture_move(50.0, 40.0);
        assert!(layer.gesture_end());
        assert_eq!(layer.capture_state().strokes[1].style.width, 20.0);
    }

    #[test]
    fn restoring_twice_is_rejected() {
        let mut source = ready_layer();
        source.gesture_start(10.0, 10.0);
        source.gesture_move(10.0, 30.0);
        source.gesture_end();
        let state = source.capture_state();

        let mut layer = MaskLayer::default();
        layer.init_size(100, 100).unwrap();
        layer.restore_state(state.clone()).unwrap();
        assert_eq!(layer.brush_color(), Some(BrushColor::rgb(255, 0, 0)));
        assert!(matches!(
            layer.restore_state(state),
            Err(MaskError::AlreadyRestored)
        ));
    }
}
