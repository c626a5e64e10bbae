use anyhow::{anyhow, Result};
use log::{trace, warn};
use tiny_skia::{
    BlendMode, FillRule as SkiaFillRule, FilterQuality, IntRect, LineCap as SkiaLineCap,
    LineJoin as SkiaLineJoin, Mask, Paint, PathBuilder, Pattern, Pixmap, PixmapPaint, PixmapRef,
    SpreadMode, Stroke, StrokeDash, Transform,
};

use crate::render::backend::{RenderBackend, SaveStack, Surface, SurfaceSize};
use crate::render::{
    CompiledImage, FillRule, FontSpec, GraphicsAttributes, HostState, LineCap, LineJoin, Matrix,
    PaintStyle, Path, PathElement, RectF, RgbaImage, TextBaseline,
};

mod font;

pub use font::FontBook;

// --- Conversion helpers ---

fn to_skia_transform(m: &Matrix) -> Transform {
    Transform::from_row(
        m.a as f32, m.b as f32, m.c as f32, m.d as f32, m.e as f32, m.f as f32,
    )
}

fn to_skia_fill_rule(rule: FillRule) -> SkiaFillRule {
    match rule {
        FillRule::NonZero => SkiaFillRule::Winding,
        FillRule::EvenOdd => SkiaFillRule::EvenOdd,
    }
}

fn to_skia_line_cap(cap: LineCap) -> SkiaLineCap {
    match cap {
        LineCap::Butt => SkiaLineCap::Butt,
        LineCap::Round => SkiaLineCap::Round,
        LineCap::Square => SkiaLineCap::Square,
    }
}

fn to_skia_line_join(join: LineJoin) -> SkiaLineJoin {
    match join {
        LineJoin::Round => SkiaLineJoin::Round,
        LineJoin::Bevel => SkiaLineJoin::Bevel,
        LineJoin::Miter => SkiaLineJoin::Miter,
    }
}

fn to_skia_path(path: &Path) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathElement::MoveTo(x, y) => pb.move_to(x as f32, y as f32),
            PathElement::LineTo(x, y) => pb.line_to(x as f32, y as f32),
            PathElement::CurveTo(x1, y1, x2, y2, x, y) => {
                pb.cubic_to(x1 as f32, y1 as f32, x2 as f32, y2 as f32, x as f32, y as f32)
            }
            PathElement::ClosePath => pb.close(),
        }
    }
    pb.finish()
}

fn to_skia_paint(style: &PaintStyle) -> Option<Paint<'_>> {
    let mut paint = Paint {
        anti_alias: true,
        ..Paint::default()
    };
    match style {
        PaintStyle::Color(c) => paint.set_color_rgba8(c.r, c.g, c.b, c.a),
        PaintStyle::Pattern(image) => {
            let pixmap = PixmapRef::from_bytes(image.data(), image.width(), image.height())?;
            paint.shader = Pattern::new(
                pixmap,
                SpreadMode::Repeat,
                FilterQuality::Nearest,
                1.0,
                Transform::identity(),
            );
        }
    }
    Some(paint)
}

fn to_skia_stroke(attrs: &GraphicsAttributes) -> Stroke {
    let mut dash: Vec<f32> = attrs.dash.iter().map(|d| *d as f32).collect();
    // Odd dash lists repeat once, as on a canvas.
    if dash.len() % 2 == 1 {
        dash.extend_from_within(..);
    }

    Stroke {
        width: attrs.line_width as f32,
        miter_limit: 10.0,
        line_cap: to_skia_line_cap(attrs.line_cap),
        line_join: to_skia_line_join(attrs.line_join),
        dash: if dash.is_empty() { None } else { StrokeDash::new(dash, 0.0) },
    }
}

/// Raster backend on top of tiny-skia.
#[derive(Clone, Default)]
pub struct SkiaBackend {
    fonts: FontBook,
}

impl SkiaBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `family` available to text drawing and measuring on every surface of this backend.
    pub fn register_font(&self, family: &str, bytes: Vec<u8>) -> Result<()> {
        self.fonts.register(family, bytes)
    }
}

impl RenderBackend for SkiaBackend {
    fn name(&self) -> &str {
        "SkiaBackend"
    }

    fn create_surface(&self, size: SurfaceSize) -> Result<Box<dyn Surface>> {
        Ok(Box::new(SkiaSurface::new(size, self.fonts.clone())?))
    }

    fn measure_text(&self, text: &str, font: &str) -> f64 {
        self.fonts.measure(text, &FontSpec::parse(font))
    }
}

pub struct SkiaSurface {
    size: SurfaceSize,
    /// `None` while the surface has no area.
    pixmap: Option<Pixmap>,
    /// `None` clip means unclipped.
    stack: SaveStack<Option<Mask>>,
    fonts: FontBook,
}

impl SkiaSurface {
    pub fn new(size: SurfaceSize, fonts: FontBook) -> Result<Self> {
        let pixmap = if size.is_empty() {
            None
        } else {
            Some(
                Pixmap::new(size.width, size.height)
                    .ok_or_else(|| anyhow!("cannot allocate {}x{} pixmap", size.width, size.height))?,
            )
        };

        Ok(Self {
            size,
            pixmap,
            stack: SaveStack::new(),
            fonts,
        })
    }
}

impl Surface for SkiaSurface {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn resize(&mut self, size: SurfaceSize) {
        self.size = size;
        self.pixmap = if size.is_empty() {
            None
        } else {
            let pixmap = Pixmap::new(size.width, size.height);
            if pixmap.is_none() {
                warn!("cannot allocate {}x{} pixmap", size.width, size.height);
            }
            pixmap
        };
        self.stack.reset();
    }

    fn state(&self) -> &HostState {
        &self.stack.state
    }

    fn state_mut(&mut self) -> &mut HostState {
        &mut self.stack.state
    }

    fn save(&mut self) {
        self.stack.save();
    }

    fn restore(&mut self) {
        self.stack.restore();
    }

    fn save_depth(&self) -> usize {
        self.stack.depth()
    }

    fn clip(&mut self, path: &Path, rule: FillRule) {
        let transform = to_skia_transform(&self.stack.state.transform);
        let rule = to_skia_fill_rule(rule);
        let Some(sk_path) = to_skia_path(path) else {
            // Clipping to nothing hides everything.
            self.stack.clip = Mask::new(self.size.width.max(1), self.size.height.max(1));
            return;
        };

        match &mut self.stack.clip {
            Some(mask) => mask.intersect_path(&sk_path, rule, false, transform),
            None => {
                if let Some(mut mask) = Mask::new(self.size.width.max(1), self.size.height.max(1)) {
                    mask.fill_path(&sk_path, rule, false, transform);
                    self.stack.clip = Some(mask);
                }
            }
        }
    }

    fn fill(&mut self, path: &Path, rule: FillRule) {
        let Some(pixmap) = self.pixmap.as_mut() else { return };
        let Some(sk_path) = to_skia_path(path) else { return };
        let state = &self.stack.state;
        let Some(paint) = to_skia_paint(&state.attributes.fill) else { return };

        pixmap.fill_path(
            &sk_path,
            &paint,
            to_skia_fill_rule(rule),
            to_skia_transform(&state.transform),
            self.stack.clip.as_ref(),
        );
    }

    fn stroke(&mut self, path: &Path) {
        let Some(pixmap) = self.pixmap.as_mut() else { return };
        let Some(sk_path) = to_skia_path(path) else { return };
        let state = &self.stack.state;
        let Some(paint) = to_skia_paint(&state.attributes.stroke) else { return };

        pixmap.stroke_path(
            &sk_path,
            &paint,
            &to_skia_stroke(&state.attributes),
            to_skia_transform(&state.transform),
            self.stack.clip.as_ref(),
        );
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        let Some(pixmap) = self.pixmap.as_mut() else { return };
        let state = &self.stack.state;
        let spec = FontSpec::parse(&state.attributes.font);

        let (ascent, descent) = self.fonts.vertical_metrics(&spec);
        let baseline = match state.attributes.text_baseline {
            TextBaseline::Alphabetic => y,
            TextBaseline::Top => y + ascent,
            TextBaseline::Middle => y + (ascent - descent) / 2.0,
            TextBaseline::Bottom => y - descent,
        };

        let Some(run) = self.fonts.layout(text, &spec, x, baseline) else {
            trace!("no font for {:?}, text skipped", state.attributes.font);
            return;
        };
        let Some(glyphs) = run.path else { return };
        let Some(paint) = to_skia_paint(&state.attributes.fill) else { return };

        pixmap.fill_path(
            &glyphs,
            &paint,
            SkiaFillRule::Winding,
            to_skia_transform(&state.transform),
            self.stack.clip.as_ref(),
        );
    }

    fn draw_image(&mut self, image: &CompiledImage, src: RectF, dst: RectF) {
        let Some(pixmap) = self.pixmap.as_mut() else { return };
        let Some(source) = PixmapRef::from_bytes(image.data(), image.width(), image.height()) else {
            return;
        };

        // Clamp the source rectangle to the image, shrinking the destination to match.
        let sx0 = src.x.max(0.0);
        let sy0 = src.y.max(0.0);
        let sx1 = (src.x + src.width).min(image.width() as f64);
        let sy1 = (src.y + src.height).min(image.height() as f64);
        if sx1 <= sx0 || sy1 <= sy0 || dst.is_empty() || src.is_empty() {
            return;
        }
        let kx = dst.width / src.width;
        let ky = dst.height / src.height;
        let dx = dst.x + (sx0 - src.x) * kx;
        let dy = dst.y + (sy0 - src.y) * ky;

        let ix = sx0.floor() as i32;
        let iy = sy0.floor() as i32;
        let iw = (sx1.ceil() as i32 - ix).max(1) as u32;
        let ih = (sy1.ceil() as i32 - iy).max(1) as u32;

        let cropped;
        let region = if ix == 0 && iy == 0 && iw == image.width() && ih == image.height() {
            source
        } else {
            let Some(rect) = IntRect::from_xywh(ix, iy, iw, ih) else { return };
            let Some(copy) = source.clone_rect(rect) else { return };
            cropped = copy;
            cropped.as_ref()
        };

        let state = &self.stack.state;
        let placement = state
            .transform
            .pre_concat(&Matrix::translation(dx, dy))
            .pre_concat(&Matrix::scaling(kx, ky));
        let quality = if state.attributes.image_smoothing {
            FilterQuality::Bilinear
        } else {
            FilterQuality::Nearest
        };

        pixmap.draw_pixmap(
            0,
            0,
            region,
            &PixmapPaint {
                opacity: 1.0,
                blend_mode: BlendMode::SourceOver,
                quality,
            },
            to_skia_transform(&placement),
            self.stack.clip.as_ref(),
        );
    }

    fn read_pixels(&self) -> RgbaImage {
        match self.snapshot() {
            Some(image) => image.to_rgba(),
            None => RgbaImage::new(self.size.width, self.size.height),
        }
    }

    fn snapshot(&self) -> Option<CompiledImage> {
        let pixmap = self.pixmap.as_ref()?;
        CompiledImage::from_premultiplied(pixmap.data().to_vec(), pixmap.width(), pixmap.height())
    }
}
