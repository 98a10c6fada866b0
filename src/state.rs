use serde::{Deserialize, Serialize};

use crate::error::MaskError;
use crate::history::CommittedStroke;
use crate::style::BrushColor;

/// Everything needed to bring a [MaskLayer](crate::MaskLayer) back after the host
/// tore it down: all committed strokes (hidden ones included), the undo position
/// and the brush color.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaskState {
    pub strokes: Vec<CommittedStroke>,
    pub hidden_tail: usize,
    pub brush_color: Option<BrushColor>,
}

impl MaskState {
    pub fn to_json(&self) -> Result<String, MaskError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self, MaskError> {
        Ok(serde_json::from_str(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::StrokePath;
    use crate::style::Style;

    #[test]
    fn survives_a_json_round_trip() {
        let mut path = StrokePath::start(1.0, 1.0);
        path.add_point(1.0, 20.0, 8.0);
        let state = MaskState {
            strokes: vec![
                CommittedStroke {
                    path: path.clone(),
                    style: Style::brush(BrushColor::rgb(0, 128, 255), 40.0, 0.8),
                },
                CommittedStroke {
                    path,
                    style: Style::eraser(40.0),
                },
            ],
            hidden_tail: 1,
            brush_color: Some(BrushColor::rgb(0, 128, 255)),
        };

        let json = state.to_json().unwrap();
        assert_eq!(MaskState::from_json(&json).unwrap(), state);
    }

    #[test]
    fn garbage_is_reported() {
        assert!(matches!(
            MaskState::from_json("{ \"strokes\": 3 }"),
            Err(MaskError::Serialization(_))
        ));
    }
}
