use serde::{Deserialize, Serialize};

/// Tunables of a [MaskLayer](crate::MaskLayer).
///
/// Every length is expressed in screen pixels at scale 1.0; the layer divides
/// them by the current scale so they stay perceptually constant when zooming.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    /// Minimum pointer travel on either axis before a new point is accepted.
    pub touch_slop: f32,
    pub stroke_width: f32,
    /// Opacity of the brush while editing, in `0.0..=1.0`.
    pub brush_opacity: f32,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            touch_slop: 8.0,
            stroke_width: 80.0,
            brush_opacity: 0.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: MaskConfig = serde_json::from_str(r#"{ "stroke_width": 12.0 }"#).unwrap();
        assert_eq!(config.stroke_width, 12.0);
        assert_eq!(config.touch_slop, MaskConfig::default().touch_slop);
        assert_eq!(config.brush_opacity, MaskConfig::default().brush_opacity);
    }
}
