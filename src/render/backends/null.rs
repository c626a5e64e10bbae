use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::render::backend::{RenderBackend, SaveStack, Surface, SurfaceSize};
use crate::render::{CompiledImage, FillRule, FontSpec, HostState, Path, PaintStyle, RectF, RgbaImage};

#[derive(Default)]
struct Journal {
    ops: Vec<String>,
    surfaces: usize,
    refuse_surfaces: bool,
}

/// Backend that draws nothing and records every call instead.
///
/// Clones share one journal, so a test can keep a clone after handing the backend to a
/// session and inspect what was issued.
#[derive(Clone, Default)]
pub struct NullBackend {
    journal: Arc<Mutex<Journal>>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded operations, each prefixed with the surface number (`s0: save`).
    pub fn operations(&self) -> Vec<String> {
        self.journal.lock().map(|j| j.ops.clone()).unwrap_or_default()
    }

    pub fn clear_operations(&self) {
        if let Ok(mut j) = self.journal.lock() {
            j.ops.clear();
        }
    }

    /// Makes subsequent `create_surface` calls fail, like a host without off-screen canvases.
    pub fn refuse_surfaces(&self, refuse: bool) {
        if let Ok(mut j) = self.journal.lock() {
            j.refuse_surfaces = refuse;
        }
    }
}

impl RenderBackend for NullBackend {
    fn name(&self) -> &str {
        "NullBackend"
    }

    fn create_surface(&self, size: SurfaceSize) -> Result<Box<dyn Surface>> {
        let mut journal = self
            .journal
            .lock()
            .map_err(|_| anyhow!("null backend journal poisoned"))?;
        if journal.refuse_surfaces {
            return Err(anyhow!("off-screen surfaces are not supported"));
        }

        let number = journal.surfaces;
        journal.surfaces += 1;
        journal
            .ops
            .push(format!("s{}: create {}x{}", number, size.width, size.height));

        Ok(Box::new(NullSurface {
            number,
            size,
            stack: SaveStack::new(),
            journal: self.journal.clone(),
        }))
    }

    fn measure_text(&self, text: &str, font: &str) -> f64 {
        approximate_advance(text, &FontSpec::parse(font))
    }
}

/// Rough advance used when no real font metrics are available.
pub fn approximate_advance(text: &str, font: &FontSpec) -> f64 {
    text.chars().count() as f64 * font.size_px * 0.5
}

pub struct NullSurface {
    number: usize,
    size: SurfaceSize,
    /// Clip is tracked as the list of intersected clip paths.
    stack: SaveStack<Vec<String>>,
    journal: Arc<Mutex<Journal>>,
}

impl NullSurface {
    fn record(&self, op: String) {
        if let Ok(mut j) = self.journal.lock() {
            j.ops.push(format!("s{}: {}", self.number, op));
        }
    }

    fn paint_name(style: &PaintStyle) -> String {
        match style {
            PaintStyle::Color(c) => c.to_css(),
            PaintStyle::Pattern(img) => format!("pattern {}x{}", img.width(), img.height()),
        }
    }
}

impl Surface for NullSurface {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn resize(&mut self, size: SurfaceSize) {
        self.size = size;
        self.stack.reset();
        self.record(format!("resize {}x{}", size.width, size.height));
    }

    fn state(&self) -> &HostState {
        &self.stack.state
    }

    fn state_mut(&mut self) -> &mut HostState {
        &mut self.stack.state
    }

    fn save(&mut self) {
        self.stack.save();
        self.record("save".to_string());
    }

    fn restore(&mut self) {
        if self.stack.restore() {
            self.record("restore".to_string());
        }
    }

    fn save_depth(&self) -> usize {
        self.stack.depth()
    }

    fn clip(&mut self, path: &Path, _rule: FillRule) {
        self.stack.clip.push(path.to_string());
        self.record(format!("clip {}", path));
    }

    fn fill(&mut self, path: &Path, rule: FillRule) {
        let paint = Self::paint_name(&self.stack.state.attributes.fill);
        self.record(format!("fill {:?} {} {}", rule, paint, path));
    }

    fn stroke(&mut self, path: &Path) {
        let attrs = &self.stack.state.attributes;
        let op = format!("stroke w={} {} {}", attrs.line_width, Self::paint_name(&attrs.stroke), path);
        self.record(op);
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        let paint = Self::paint_name(&self.stack.state.attributes.fill);
        self.record(format!("text {:?} {} {} {}", text, x, y, paint));
    }

    fn draw_image(&mut self, image: &CompiledImage, src: RectF, dst: RectF) {
        self.record(format!(
            "image {}x{} src=({},{},{},{}) dst=({},{},{},{})",
            image.width(),
            image.height(),
            src.x,
            src.y,
            src.width,
            src.height,
            dst.x,
            dst.y,
            dst.width,
            dst.height
        ));
    }

    fn read_pixels(&self) -> RgbaImage {
        RgbaImage::new(self.size.width, self.size.height)
    }

    fn snapshot(&self) -> Option<CompiledImage> {
        CompiledImage::from_rgba(&self.read_pixels())
    }
}
