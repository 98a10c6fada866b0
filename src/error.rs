use thiserror::Error;

#[derive(Error, Debug)]
pub enum MaskError {
    #[error("Canvas size was initialized already")]
    SizeAlreadyInitialized,
    #[error("Brush color was initialized already")]
    BrushColorAlreadyInitialized,
    #[error("Brush color was not initialized yet")]
    BrushColorNotInitialized,
    #[error("Mask state was restored already")]
    AlreadyRestored,
    #[error("Invalid canvas size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("Invalid scale factor {0}")]
    InvalidScale(f32),
    #[error("Hidden tail of {hidden_tail} exceeds {strokes} committed strokes")]
    InvalidState { hidden_tail: usize, strokes: usize },
    #[error("Malformed mask state: {0}")]
    Serialization(#[from] serde_json::Error),
}
