use crate::handle::{BitmapId, ContextId, WindowId};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Invalid window ID: {0}")]
    InvalidWindowId(WindowId),

    #[error("Invalid bitmap ID: {0}")]
    InvalidBitmapId(BitmapId),

    #[error("Invalid context ID: {0}")]
    InvalidContextId(ContextId),

    #[error("The root window cannot be destroyed")]
    ReservedWindow,

    #[error("Window {0} already exists")]
    WindowExists(WindowId),

    #[error("Window {0} has no drawing surface")]
    NoSurface(WindowId),

    #[error("Bitmap {0} is already selected into a memory context")]
    BitmapInUse(BitmapId),

    #[error("No z-index is left above or below the siblings of window {0}")]
    ZOrderExhausted(WindowId),

    #[error("Rotation pushed with rotate_at_point is still outstanding")]
    UnbalancedRotation,

    #[error("Foreign memory range {offset}+{len} exceeds buffer of {size} bytes")]
    OutOfBounds { offset: usize, len: usize, size: usize },

    #[error("Surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("Image encoding failed: {0}")]
    Encoding(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal bridge error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, BridgeError>;
