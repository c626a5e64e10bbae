//! The host drawing surface and the value types that flow through it.
//!
//! Everything above this module (windows, bitmaps, drawing contexts) speaks to the host through
//! the immediate-mode [`Surface`](backend::Surface) trait: a canvas-like API with a flat
//! save/restore stack, a current transform, a clip and a bag of [`GraphicsAttributes`]. The
//! retained, nested behaviour the toolkit expects is layered on top in [`crate::context`].

pub mod backend;

/// Rendering backends.
pub mod backends {
    pub mod null;
    /// tiny-skia raster backend
    #[cfg(feature = "backend_skia")]
    pub mod skia;
}

mod color;
mod font;
mod image;
mod path;
mod style;

pub use backend::{RenderBackend, SaveStack, Surface, SurfaceSize};
pub use color::Color;
pub use font::FontSpec;
pub use image::{CompiledImage, RgbaImage};
pub use path::{Path, PathElement, Point, RectF};
pub use style::{
    FillRule, GraphicsAttributes, HostState, LineCap, LineJoin, Matrix, PaintStyle, TextBaseline,
};
