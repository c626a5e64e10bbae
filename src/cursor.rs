//! Cursor selection and PNG export of bitmaps.

use std::fmt;

use crate::errors::{BridgeError, Result};
use crate::handle::BitmapId;
use crate::render::RgbaImage;
use crate::session::Session;

/// Stock cursors in the order the embedding toolkit indexes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockCursor {
    Default,
    Crosshair,
    Hand,
    Text,
    Wait,
    Help,
    EResize,
    NResize,
    NeResize,
    NwResize,
    SResize,
    SeResize,
    SwResize,
    WResize,
    NsResize,
    EwResize,
    NeswResize,
    NwseResize,
    ColResize,
    RowResize,
    Move,
    VerticalText,
    Cell,
    ContextMenu,
    Alias,
    Progress,
    NoDrop,
    Copy,
    None,
    NotAllowed,
    ZoomIn,
    ZoomOut,
    Grab,
    Grabbing,
}

impl StockCursor {
    pub const ALL: [StockCursor; 34] = [
        StockCursor::Default,
        StockCursor::Crosshair,
        StockCursor::Hand,
        StockCursor::Text,
        StockCursor::Wait,
        StockCursor::Help,
        StockCursor::EResize,
        StockCursor::NResize,
        StockCursor::NeResize,
        StockCursor::NwResize,
        StockCursor::SResize,
        StockCursor::SeResize,
        StockCursor::SwResize,
        StockCursor::WResize,
        StockCursor::NsResize,
        StockCursor::EwResize,
        StockCursor::NeswResize,
        StockCursor::NwseResize,
        StockCursor::ColResize,
        StockCursor::RowResize,
        StockCursor::Move,
        StockCursor::VerticalText,
        StockCursor::Cell,
        StockCursor::ContextMenu,
        StockCursor::Alias,
        StockCursor::Progress,
        StockCursor::NoDrop,
        StockCursor::Copy,
        StockCursor::None,
        StockCursor::NotAllowed,
        StockCursor::ZoomIn,
        StockCursor::ZoomOut,
        StockCursor::Grab,
        StockCursor::Grabbing,
    ];

    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// CSS cursor keyword.
    pub fn name(self) -> &'static str {
        match self {
            StockCursor::Default => "default",
            StockCursor::Crosshair => "crosshair",
            StockCursor::Hand => "hand",
            StockCursor::Text => "text",
            StockCursor::Wait => "wait",
            StockCursor::Help => "help",
            StockCursor::EResize => "e-resize",
            StockCursor::NResize => "n-resize",
            StockCursor::NeResize => "ne-resize",
            StockCursor::NwResize => "nw-resize",
            StockCursor::SResize => "s-resize",
            StockCursor::SeResize => "se-resize",
            StockCursor::SwResize => "sw-resize",
            StockCursor::WResize => "w-resize",
            StockCursor::NsResize => "ns-resize",
            StockCursor::EwResize => "ew-resize",
            StockCursor::NeswResize => "nesw-resize",
            StockCursor::NwseResize => "nwse-resize",
            StockCursor::ColResize => "col-resize",
            StockCursor::RowResize => "row-resize",
            StockCursor::Move => "move",
            StockCursor::VerticalText => "vertical-text",
            StockCursor::Cell => "cell",
            StockCursor::ContextMenu => "context-menu",
            StockCursor::Alias => "alias",
            StockCursor::Progress => "progress",
            StockCursor::NoDrop => "no-drop",
            StockCursor::Copy => "copy",
            StockCursor::None => "none",
            StockCursor::NotAllowed => "not-allowed",
            StockCursor::ZoomIn => "zoom-in",
            StockCursor::ZoomOut => "zoom-out",
            StockCursor::Grab => "grab",
            StockCursor::Grabbing => "grabbing",
        }
    }

    /// Keyword with the vendor prefix WebKit needs for the grab cursors.
    pub fn css(self, webkit: bool) -> String {
        match self {
            StockCursor::Grab | StockCursor::Grabbing if webkit => format!("-webkit-{}", self.name()),
            _ => self.name().to_string(),
        }
    }
}

impl fmt::Display for StockCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CursorStyle {
    Stock(String),
    /// PNG image with its hot spot in image pixels.
    Custom { png: Vec<u8>, hot_x: i32, hot_y: i32 },
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut data, image.width, image.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .map_err(|e| BridgeError::Encoding(e.to_string()))?;
        writer
            .write_image_data(&image.pixels)
            .map_err(|e| BridgeError::Encoding(e.to_string()))?;
    }
    Ok(data)
}

impl Session {
    /// Resolves a cursor: a stock cursor when `index` names one, otherwise `bitmap` as a custom
    /// image with the given hot spot.
    pub fn cursor_style(&mut self, index: i32, bitmap: BitmapId, hot_x: i32, hot_y: i32) -> Result<CursorStyle> {
        if let Some(stock) = StockCursor::from_index(index) {
            return Ok(CursorStyle::Stock(stock.css(self.config.webkit)));
        }
        Ok(CursorStyle::Custom {
            png: self.bitmap_png(bitmap)?,
            hot_x,
            hot_y,
        })
    }

    /// PNG encoding of a bitmap's current content in device pixels.
    pub fn bitmap_png(&mut self, id: BitmapId) -> Result<Vec<u8>> {
        self.drain_compiled();
        let pixels = self.bitmap_pixels(id)?;
        encode_png(&pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompileMode, SessionConfig};
    use crate::render::backends::null::NullBackend;

    fn session(webkit: bool) -> Session {
        let config = SessionConfig::builder()
            .compile_mode(CompileMode::Deferred)
            .webkit(webkit)
            .build()
            .unwrap();
        Session::new(config, Box::new(NullBackend::new()))
    }

    #[test]
    fn table_order_matches_indices() {
        assert_eq!(StockCursor::ALL.len(), 34);
        assert_eq!(StockCursor::from_index(0), Some(StockCursor::Default));
        assert_eq!(StockCursor::from_index(2).map(|c| c.name()), Some("hand"));
        assert_eq!(StockCursor::from_index(33), Some(StockCursor::Grabbing));
        assert_eq!(StockCursor::from_index(34), None);
        assert_eq!(StockCursor::from_index(-1), None);
    }

    #[test]
    fn grab_is_prefixed_on_webkit() {
        let mut s = session(true);
        let bmp = s.create_bitmap(&[0; 4], 0, 1, 1, 1.0).unwrap();
        assert_eq!(s.cursor_style(32, bmp, 0, 0).unwrap(), CursorStyle::Stock("-webkit-grab".into()));
        assert_eq!(s.cursor_style(20, bmp, 0, 0).unwrap(), CursorStyle::Stock("move".into()));
        assert_eq!(session(false).cursor_style(33, bmp, 0, 0).unwrap(), CursorStyle::Stock("grabbing".into()));
    }

    #[test]
    fn custom_cursor_is_png() {
        let mut s = session(false);
        let bmp = s.create_bitmap(&[255, 0, 0, 255], 0, 1, 1, 1.0).unwrap();
        let CursorStyle::Custom { png, hot_x, hot_y } = s.cursor_style(-1, bmp, 3, 4).unwrap() else {
            panic!("expected custom cursor");
        };
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!((hot_x, hot_y), (3, 4));

        let decoder = png::Decoder::new(png.as_slice());
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        assert_eq!((info.width, info.height), (1, 1));
        assert_eq!(&buf[..4], &[255, 0, 0, 255]);
    }
}
