//! Undo/redo over committed strokes.

use serde::{Deserialize, Serialize};

use crate::error::MaskError;
use crate::path::StrokePath;
use crate::style::Style;

/// A finished gesture together with the style it was drawn with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommittedStroke {
    pub path: StrokePath,
    pub style: Style,
}

/// Strokes in drawing order plus the length of the undone ("hidden") tail.
///
/// Undo and redo only move the boundary between visible and hidden strokes. The
/// hidden tail is dropped for good once a new stroke gets committed.
#[derive(Clone, Debug, Default)]
pub struct HistoryStore {
    strokes: Vec<CommittedStroke>,
    hidden_tail: usize,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn hidden_tail(&self) -> usize {
        self.hidden_tail
    }

    pub fn visible_count(&self) -> usize {
        self.strokes.len() - self.hidden_tail
    }

    pub fn visible(&self) -> &[CommittedStroke] {
        &self.strokes[..self.visible_count()]
    }

    pub fn all(&self) -> &[CommittedStroke] {
        &self.strokes
    }

    pub fn undo_available(&self) -> bool {
        self.visible_count() > 0
    }

    pub fn redo_available(&self) -> bool {
        self.hidden_tail > 0
    }

    pub fn undo(&mut self) {
        if self.undo_available() {
            self.hidden_tail += 1;
        }
    }

    pub fn redo(&mut self) {
        if self.redo_available() {
            self.hidden_tail -= 1;
        }
    }

    pub fn commit(&mut self, stroke: CommittedStroke) {
        if self.hidden_tail > 0 {
            let visible = self.visible_count();
            log::debug!("Discarding {} undone stroke(s)", self.hidden_tail);
            self.strokes.truncate(visible);
            self.hidden_tail = 0;
        }
        self.strokes.push(stroke);
    }

    /// Appends previously captured strokes and adopts their hidden tail.
    pub fn restore(
        &mut self,
        strokes: Vec<CommittedStroke>,
        hidden_tail: usize,
    ) -> Result<(), MaskError> {
        let total = self.strokes.len() + strokes.len();
        if hidden_tail > total {
            return Err(MaskError::InvalidState {
                hidden_tail,
                strokes: total,
            });
        }
        self.strokes.extend(strokes);
        self.hidden_tail = hidden_tail;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::BrushColor;

    fn stroke(x: f32) -> CommittedStroke {
        let mut path = StrokePath::start(x, 0.0);
        path.add_point(x, 20.0, 1.0);
        CommittedStroke {
            path,
            style: Style::brush(BrushColor::rgb(255, 0, 0), 10.0, 0.8),
        }
    }

    fn store_with(count: usize) -> HistoryStore {
        let mut store = HistoryStore::new();
        for i in 0..count {
            store.commit(stroke(i as f32));
        }
        store
    }

    #[test]
    fn empty_store_offers_nothing() {
        let store = HistoryStore::new();
        assert!(!store.undo_available());
        assert!(!store.redo_available());
        assert!(store.visible().is_empty());
    }

    #[test]
    fn undo_hides_without_deleting() {
        let mut store = store_with(3);
        store.undo();
        store.undo();
        assert_eq!(store.len(), 3);
        assert_eq!(store.visible_count(), 1);
        assert_eq!(store.visible(), &store.all()[..1]);
        assert!(store.redo_available());
    }

    #[test]
    fn undo_and_redo_clamp_at_the_bounds() {
        let mut store = store_with(2);
        for _ in 0..5 {
            store.undo();
        }
        assert_eq!(store.hidden_tail(), 2);
        assert!(!store.undo_available());

        for _ in 0..5 {
            store.redo();
        }
        assert_eq!(store.hidden_tail(), 0);
        assert!(!store.redo_available());
    }

    #[test]
    fn commit_after_undo_truncates_the_hidden_tail() {
        let mut store = store_with(4);
        store.undo();
        store.undo();

        store.commit(stroke(99.0));
        assert_eq!(store.len(), 3);
        assert_eq!(store.hidden_tail(), 0);
        assert!(!store.redo_available());
        assert_eq!(store.all()[2], stroke(99.0));
        assert_eq!(store.all()[1], stroke(1.0));
    }

    #[test]
    fn restore_is_additive_and_validated() {
        let mut store = store_with(1);
        store.restore(vec![stroke(5.0), stroke(6.0)], 1).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.visible_count(), 2);

        let err = HistoryStore::new().restore(vec![stroke(1.0)], 2).unwrap_err();
        assert!(matches!(
            err,
            MaskError::InvalidState {
                hidden_tail: 2,
                strokes: 1
            }
        ));
    }
}
