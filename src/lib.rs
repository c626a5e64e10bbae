//! Windows, bitmaps and retained drawing contexts over an immediate-mode 2D surface.
//!
//! A [`Session`] hands out handles for windows (each optionally backed by a drawing surface),
//! bitmaps and drawing contexts. Contexts emulate nested save/restore, per-context clipping
//! and coordinate frames on top of a [`render::Surface`], which only knows a flat save stack.

pub mod bitmap;
pub mod config;
pub mod context;
pub mod cursor;
pub mod draw;
pub mod errors;
pub mod ffi;
pub mod handle;
pub mod render;
pub mod session;
pub mod storage;
pub mod window;

pub use bitmap::{Bitmap, BitmapContent};
pub use config::{CompileMode, ConfigError, SessionConfig, SessionConfigBuilder};
pub use context::{ContextTarget, DrawingContext, Frame};
pub use cursor::{CursorStyle, StockCursor};
pub use errors::{BridgeError, Result};
pub use handle::{BitmapId, ContextId, WindowId};
pub use render::{Color, FillRule, GraphicsAttributes, LineCap, LineJoin, Point, RectF};
pub use session::Session;
pub use storage::{ConfigArea, ConfigStore};
pub use window::{HostContainer, LayoutHost, Window, WindowRequest};
