//! Font registry and glyph outlining for the tiny-skia backend.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use tiny_skia::{Path, PathBuilder, Transform};
use ttf_parser::{Face, OutlineBuilder};

use crate::render::backends::null::approximate_advance;
use crate::render::FontSpec;

const GENERIC_FAMILIES: &[&str] = &["serif", "sans-serif", "monospace", "cursive", "fantasy", "system-ui"];

struct PathConverter(PathBuilder);

impl OutlineBuilder for PathConverter {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.0.close();
    }
}

/// Validated font file bytes.
struct FontData {
    bytes: Vec<u8>,
}

impl FontData {
    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.bytes, 0).ok()
    }
}

/// Laid out text: the glyph outlines in user space and the total advance.
pub struct TextRun {
    pub path: Option<Path>,
    pub advance: f64,
}

/// Fonts registered by family name. Clones share the same registry.
#[derive(Clone, Default)]
pub struct FontBook {
    families: Arc<RwLock<HashMap<String, Arc<FontData>>>>,
}

impl FontBook {
    pub fn register(&self, family: &str, bytes: Vec<u8>) -> Result<()> {
        Face::parse(&bytes, 0).map_err(|e| anyhow!("failed to parse font '{}': {}", family, e))?;

        let mut families = self
            .families
            .write()
            .map_err(|_| anyhow!("font registry poisoned"))?;
        families.insert(family.to_lowercase(), Arc::new(FontData { bytes }));
        Ok(())
    }

    /// First registered family named by `spec`. Generic families resolve to any registered font.
    fn resolve(&self, spec: &FontSpec) -> Option<Arc<FontData>> {
        let families = self.families.read().ok()?;
        for name in &spec.families {
            let key = name.to_lowercase();
            if let Some(font) = families.get(&key) {
                return Some(font.clone());
            }
            if GENERIC_FAMILIES.contains(&key.as_str()) {
                if let Some(font) = families.values().next() {
                    return Some(font.clone());
                }
            }
        }
        None
    }

    pub fn measure(&self, text: &str, spec: &FontSpec) -> f64 {
        match self.layout(text, spec, 0.0, 0.0) {
            Some(run) => run.advance,
            None => approximate_advance(text, spec),
        }
    }

    /// Vertical offset from the alphabetic baseline to the `ascent` and `descent` lines.
    pub fn vertical_metrics(&self, spec: &FontSpec) -> (f64, f64) {
        let Some(data) = self.resolve(spec) else {
            return (spec.size_px * 0.8, spec.size_px * 0.2);
        };
        let Some(face) = data.face() else {
            return (spec.size_px * 0.8, spec.size_px * 0.2);
        };
        let scale = spec.size_px / face.units_per_em() as f64;
        (face.ascender() as f64 * scale, -(face.descender() as f64) * scale)
    }

    /// Outlines `text` with its baseline origin at `(x, y)`, or `None` without a usable font.
    pub fn layout(&self, text: &str, spec: &FontSpec, x: f64, y: f64) -> Option<TextRun> {
        let data = self.resolve(spec)?;
        let face = data.face()?;
        let scale = (spec.size_px / face.units_per_em() as f64) as f32;

        let mut builder = PathBuilder::new();
        let mut pen = 0.0f32;
        for ch in text.chars() {
            let Some(glyph) = face.glyph_index(ch) else {
                pen += spec.size_px as f32 * 0.5;
                continue;
            };

            let mut converter = PathConverter(PathBuilder::new());
            if face.outline_glyph(glyph, &mut converter).is_some() {
                let placement = Transform::from_row(scale, 0.0, 0.0, -scale, x as f32 + pen, y as f32);
                if let Some(outline) = converter.0.finish().and_then(|p| p.transform(placement)) {
                    builder.push_path(&outline);
                }
            }

            pen += face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * scale;
        }

        Some(TextRun {
            path: builder.finish(),
            advance: pen as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_font_bytes() {
        let book = FontBook::default();
        assert!(book.register("Broken", vec![0, 1, 2, 3]).is_err());
    }

    #[test]
    fn falls_back_without_fonts() {
        let book = FontBook::default();
        let spec = FontSpec::parse("20px sans-serif");
        assert!(book.layout("hi", &spec, 0.0, 0.0).is_none());
        assert_eq!(book.measure("hi", &spec), 20.0);
        assert_eq!(book.vertical_metrics(&spec), (16.0, 4.0));
    }
}
