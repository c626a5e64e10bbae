//! Drawing primitives issued against a context's current attributes.
//!
//! Coordinates are logical units of the context's frame. Every call resolves the context and
//! applies its transform and clip if this is the first use.

use std::f64::consts::TAU;

use crate::bitmap::foreign_range;
use crate::errors::{BridgeError, Result};
use crate::handle::{BitmapId, ContextId};
use crate::render::{
    Color, FillRule, LineCap, LineJoin, PaintStyle, Path, Point, RectF, Surface,
};
use crate::session::Session;

/// Extent of the rectangle stroked for a single point.
const POINT_EXTENT: f64 = 1e-6;

fn fill_and_stroke(surface: &mut dyn Surface, path: &Path, rule: FillRule, fill: bool, stroke: bool) {
    if fill {
        surface.fill(path, rule);
    }
    if stroke {
        surface.stroke(path);
    }
}

/// Reads `count` points stored as pairs of little-endian `i32` at `memory[offset..]`.
pub fn read_points(memory: &[u8], offset: usize, count: usize) -> Result<Vec<Point>> {
    let len = count
        .checked_mul(8)
        .ok_or(BridgeError::OutOfBounds { offset, len: usize::MAX, size: memory.len() })?;
    let range = foreign_range(offset, len, memory.len())?;

    Ok(memory[range]
        .chunks_exact(8)
        .map(|pair| {
            let x = i32::from_le_bytes([pair[0], pair[1], pair[2], pair[3]]);
            let y = i32::from_le_bytes([pair[4], pair[5], pair[6], pair[7]]);
            Point::new(x as f64, y as f64)
        })
        .collect())
}

impl Session {
    /// Paint for a bitmap pattern, `None` for zero-sized bitmaps.
    fn pattern(&self, bitmap: BitmapId) -> Result<Option<PaintStyle>> {
        Ok(self.bitmap_image(bitmap)?.map(PaintStyle::Pattern))
    }

    pub fn set_font(&mut self, id: ContextId, font: &str) -> Result<()> {
        self.drawing_slot(id)?.surface.attributes_mut().font = font.to_string();
        Ok(())
    }

    /// Sets the stroke attributes. `dashes` are dash lengths; a list with a negative entry is
    /// ignored, as is a non-positive width.
    #[allow(clippy::too_many_arguments)]
    pub fn set_pen(
        &mut self,
        id: ContextId,
        color: Color,
        width: f64,
        join: LineJoin,
        cap: LineCap,
        dashes: &[i8],
        pattern: Option<BitmapId>,
    ) -> Result<()> {
        self.drain_compiled();
        let stroke = match pattern {
            Some(bitmap) => self.pattern(bitmap)?,
            None => Some(PaintStyle::Color(color)),
        };

        let attrs = self.drawing_slot(id)?.surface.attributes_mut();
        if width > 0.0 && width.is_finite() {
            attrs.line_width = width;
        }
        attrs.line_join = join;
        attrs.line_cap = cap;
        if let Some(stroke) = stroke {
            attrs.stroke = stroke;
        }
        if dashes.iter().all(|d| *d >= 0) {
            attrs.dash = dashes.iter().map(|d| *d as f64).collect();
        }
        Ok(())
    }

    pub fn set_brush(&mut self, id: ContextId, color: Color, pattern: Option<BitmapId>) -> Result<()> {
        self.drain_compiled();
        let fill = match pattern {
            Some(bitmap) => self.pattern(bitmap)?,
            None => Some(PaintStyle::Color(color)),
        };

        if let Some(fill) = fill {
            self.drawing_slot(id)?.surface.attributes_mut().fill = fill;
        }
        Ok(())
    }

    /// Fills `(0, 0, width, height)` with `color`, leaving the brush untouched.
    pub fn clear(&mut self, id: ContextId, width: f64, height: f64, color: Color) -> Result<()> {
        let surface = &mut self.drawing_slot(id)?.surface;
        let saved = std::mem::replace(&mut surface.attributes_mut().fill, PaintStyle::Color(color));
        surface.fill_rect(RectF::new(0.0, 0.0, width, height));
        surface.attributes_mut().fill = saved;
        Ok(())
    }

    pub fn draw_rect(&mut self, id: ContextId, rect: RectF, fill: bool, stroke: bool) -> Result<()> {
        let surface = &mut self.drawing_slot(id)?.surface;
        if fill {
            surface.fill_rect(rect);
        }
        if stroke {
            surface.stroke_rect(rect);
        }
        Ok(())
    }

    pub fn draw_rounded_rect(
        &mut self,
        id: ContextId,
        rect: RectF,
        radius: f64,
        fill: bool,
        stroke: bool,
    ) -> Result<()> {
        let mut path = Path::new();
        path.rounded_rect(rect, radius);

        let surface = &mut self.drawing_slot(id)?.surface;
        fill_and_stroke(surface.as_mut(), &path, FillRule::NonZero, fill, stroke);
        Ok(())
    }

    /// Ellipse inscribed in `rect`.
    pub fn draw_ellipse(&mut self, id: ContextId, rect: RectF, fill: bool, stroke: bool) -> Result<()> {
        let (rx, ry) = (rect.width / 2.0, rect.height / 2.0);
        let mut path = Path::new();
        path.ellipse(rect.x + rx, rect.y + ry, rx, ry, 0.0, TAU, false);

        let surface = &mut self.drawing_slot(id)?.surface;
        fill_and_stroke(surface.as_mut(), &path, FillRule::NonZero, fill, stroke);
        Ok(())
    }

    /// Pie slice centred on `(x, y)`, swept anticlockwise from `start` to `end` (radians).
    #[allow(clippy::too_many_arguments)]
    pub fn draw_arc(
        &mut self,
        id: ContextId,
        x: f64,
        y: f64,
        radius: f64,
        start: f64,
        end: f64,
        fill: bool,
        stroke: bool,
    ) -> Result<()> {
        let mut path = Path::new();
        path.move_to(x, y);
        path.arc(x, y, radius, start, end, true);

        let surface = &mut self.drawing_slot(id)?.surface;
        fill_and_stroke(surface.as_mut(), &path, FillRule::NonZero, fill, stroke);
        Ok(())
    }

    /// Arc of the ellipse inscribed in `rect` between two angles in degrees, counter-clockwise
    /// positive. The filled shape is closed through the centre, the stroke is the bare arc.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_elliptic_arc(
        &mut self,
        id: ContextId,
        rect: RectF,
        start_degrees: f64,
        end_degrees: f64,
        fill: bool,
        stroke: bool,
    ) -> Result<()> {
        let (rx, ry) = (rect.width / 2.0, rect.height / 2.0);
        let (cx, cy) = (rect.x + rx, rect.y + ry);
        let start = (-start_degrees).to_radians();
        let end = (-end_degrees).to_radians();

        let mut arc = Path::new();
        arc.ellipse(cx, cy, rx, ry, start, end, true);

        let surface = &mut self.drawing_slot(id)?.surface;
        if fill {
            let mut pie = arc.clone();
            pie.line_to(cx, cy);
            surface.fill(&pie, FillRule::NonZero);
        }
        if stroke {
            surface.stroke(&arc);
        }
        Ok(())
    }

    pub fn draw_point(&mut self, id: ContextId, x: f64, y: f64) -> Result<()> {
        let surface = &mut self.drawing_slot(id)?.surface;
        surface.stroke_rect(RectF::new(x, y, POINT_EXTENT, POINT_EXTENT));
        Ok(())
    }

    pub fn draw_line(&mut self, id: ContextId, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<()> {
        let path = Path::polyline(&[Point::new(x1, y1), Point::new(x2, y2)]);
        self.drawing_slot(id)?.surface.stroke(&path);
        Ok(())
    }

    /// Strokes an open polyline. Nothing is drawn for an empty point list.
    pub fn draw_lines(&mut self, id: ContextId, points: &[Point]) -> Result<()> {
        let slot = self.drawing_slot(id)?;
        if !points.is_empty() {
            slot.surface.stroke(&Path::polyline(points));
        }
        Ok(())
    }

    pub fn draw_polygon(
        &mut self,
        id: ContextId,
        points: &[Point],
        rule: FillRule,
        fill: bool,
        stroke: bool,
    ) -> Result<()> {
        let slot = self.drawing_slot(id)?;
        if points.is_empty() {
            return Ok(());
        }

        let mut path = Path::polyline(points);
        path.close();
        fill_and_stroke(slot.surface.as_mut(), &path, rule, fill, stroke);
        Ok(())
    }

    /// Draws a bitmap at `(x, y)`, sized by its own scale factor.
    pub fn draw_bitmap(&mut self, id: ContextId, bitmap: BitmapId, x: f64, y: f64) -> Result<()> {
        self.drain_compiled();
        let record = self.bitmap(bitmap)?;
        let (width, height, scale) = (record.width as f64, record.height as f64, record.scale);
        let image = self.bitmap_image(bitmap)?;

        let slot = self.drawing_slot(id)?;
        let Some(image) = image else {
            return Ok(());
        };
        let src = RectF::new(0.0, 0.0, width, height);
        let dst = if scale == 1.0 {
            RectF::new(x, y, width, height)
        } else {
            RectF::new(x, y, width / scale, height / scale)
        };
        slot.surface.draw_image(&image, src, dst);
        Ok(())
    }

    /// Copies `width x height` logical units at `(sx, sy)` of the source context's surface to
    /// `(dx, dy)` in the destination context.
    #[allow(clippy::too_many_arguments)]
    pub fn blit(
        &mut self,
        src: ContextId,
        dst: ContextId,
        sx: f64,
        sy: f64,
        width: f64,
        height: f64,
        dx: f64,
        dy: f64,
    ) -> Result<()> {
        let source = self.drawing_slot(src)?;
        let scale = source.frame.scale;
        let Some(image) = source.surface.snapshot() else {
            return Ok(());
        };

        let from = RectF::new(sx * scale, sy * scale, width * scale, height * scale);
        let to = RectF::new(dx, dy, width, height);
        self.drawing_slot(dst)?.surface.draw_image(&image, from, to);
        Ok(())
    }

    /// Draws `text` with its baseline at `(x, y)` in `color`, leaving the brush untouched.
    pub fn draw_text(&mut self, id: ContextId, text: &str, x: f64, y: f64, color: Color) -> Result<()> {
        let surface = &mut self.drawing_slot(id)?.surface;
        let saved = std::mem::replace(&mut surface.attributes_mut().fill, PaintStyle::Color(color));
        surface.fill_text(text, x, y);
        surface.attributes_mut().fill = saved;
        Ok(())
    }

    /// Width of `text` in `font`, rounded to whole pixels.
    pub fn measure_text(&self, text: &str, font: &str) -> i32 {
        self.backend.measure_text(text, font).round() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompileMode, SessionConfig};
    use crate::render::backends::null::NullBackend;
    use crate::window::WindowRequest;

    fn setup() -> (Session, NullBackend, ContextId) {
        let backend = NullBackend::new();
        let config = SessionConfig::builder()
            .compile_mode(CompileMode::Deferred)
            .build()
            .unwrap();
        let mut s = Session::new(config, Box::new(backend.clone()));
        let w = s.create_window(WindowRequest::Auto, true, true, "win").unwrap();
        s.set_window_rect(w, 0.0, 0.0, 100.0, 100.0).unwrap();
        let ctx = s.create_window_context(w, 0.0, 0.0, 100.0, 100.0, 1.0).unwrap();
        s.draw_point(ctx, 0.0, 0.0).unwrap();
        backend.clear_operations();
        (s, backend, ctx)
    }

    #[test]
    fn read_points_decodes_i32_pairs() {
        let mut memory = vec![0u8; 4];
        for v in [1i32, -2, 30, 40] {
            memory.extend_from_slice(&v.to_le_bytes());
        }
        let points = read_points(&memory, 4, 2).unwrap();
        assert_eq!(points, vec![Point::new(1.0, -2.0), Point::new(30.0, 40.0)]);
        assert!(read_points(&memory, 4, 3).is_err());
        assert!(read_points(&memory, 0, usize::MAX).is_err());
    }

    #[test]
    fn text_and_clear_restore_fill() {
        let (mut s, backend, ctx) = setup();
        s.set_brush(ctx, Color::rgba(0, 0, 255, 255), None).unwrap();
        s.draw_text(ctx, "hi", 1.0, 2.0, Color::rgba(255, 0, 0, 255)).unwrap();
        s.clear(ctx, 10.0, 10.0, Color::WHITE).unwrap();

        let ops = backend.operations();
        assert_eq!(ops[0], "s1: text \"hi\" 1 2 rgba(255,0,0,1)");
        assert!(ops[1].starts_with("s1: fill NonZero rgba(255,255,255,1)"));
        assert_eq!(
            s.context_attributes(ctx).unwrap().fill,
            PaintStyle::Color(Color::rgba(0, 0, 255, 255))
        );
    }

    #[test]
    fn pen_ignores_invalid_width_and_dashes() {
        let (mut s, _backend, ctx) = setup();
        s.set_pen(ctx, Color::BLACK, 4.0, LineJoin::Miter, LineCap::Butt, &[3, 1], None).unwrap();
        s.set_pen(ctx, Color::BLACK, 0.0, LineJoin::Bevel, LineCap::Round, &[-1], None).unwrap();

        let attrs = s.context_attributes(ctx).unwrap();
        assert_eq!(attrs.line_width, 4.0);
        assert_eq!(attrs.dash, vec![3.0, 1.0]);
        assert_eq!(attrs.line_join, LineJoin::Bevel);
        assert_eq!(attrs.line_cap, LineCap::Round);
    }

    #[test]
    fn polygon_uses_requested_rule_and_closes() {
        let (mut s, backend, ctx) = setup();
        let pts = [Point::new(0.0, 0.0), Point::new(4.0, 0.0), Point::new(0.0, 4.0)];
        s.draw_polygon(ctx, &pts, FillRule::EvenOdd, true, false).unwrap();
        s.draw_polygon(ctx, &[], FillRule::EvenOdd, true, true).unwrap();
        s.draw_lines(ctx, &[]).unwrap();

        assert_eq!(backend.operations(), vec!["s1: fill EvenOdd rgba(0,0,0,1) M 0 0 L 4 0 L 0 4 Z"]);
    }

    #[test]
    fn elliptic_arc_fill_closes_through_center() {
        let (mut s, backend, ctx) = setup();
        s.draw_elliptic_arc(ctx, RectF::new(0.0, 0.0, 20.0, 10.0), 0.0, 90.0, true, true)
            .unwrap();
        let ops = backend.operations();
        assert!(ops[0].starts_with("s1: fill NonZero rgba(0,0,0,1) M 20 5 C"));
        assert!(ops[0].ends_with("L 10 5"));
        assert!(ops[1].starts_with("s1: stroke"));
        assert!(!ops[1].ends_with("L 10 5"));
    }

    #[test]
    fn bitmap_is_drawn_at_logical_size() {
        let (mut s, backend, ctx) = setup();
        let pixels = vec![255u8; 4 * 4 * 2];
        let bmp = s.create_bitmap(&pixels, 0, 4, 2, 2.0).unwrap();
        s.draw_bitmap(ctx, bmp, 5.0, 6.0).unwrap();

        assert_eq!(backend.operations(), vec!["s1: image 4x2 src=(0,0,4,2) dst=(5,6,2,1)"]);
    }

    #[test]
    fn blit_scales_source_rect() {
        let (mut s, backend, dst) = setup();
        let w2 = s.create_window(WindowRequest::Auto, true, true, "win").unwrap();
        s.set_window_rect(w2, 0.0, 0.0, 50.0, 50.0).unwrap();
        let src = s.create_window_context(w2, 0.0, 0.0, 25.0, 25.0, 2.0).unwrap();
        backend.clear_operations();

        s.blit(src, dst, 1.0, 2.0, 3.0, 4.0, 10.0, 20.0).unwrap();
        let ops = backend.operations();
        assert_eq!(ops.last().unwrap(), "s1: image 50x50 src=(2,4,6,8) dst=(10,20,3,4)");
    }

    #[test]
    fn pattern_brush_uses_bitmap_content() {
        let (mut s, backend, ctx) = setup();
        let pixels = [10u8, 20, 30, 255];
        let bmp = s.create_bitmap(&pixels, 0, 1, 1, 1.0).unwrap();
        s.set_brush(ctx, Color::BLACK, Some(bmp)).unwrap();
        s.draw_rect(ctx, RectF::new(0.0, 0.0, 2.0, 2.0), true, false).unwrap();

        assert!(backend.operations()[0].starts_with("s1: fill NonZero pattern 1x1"));
    }

    #[test]
    fn measure_rounds() {
        let (s, _backend, _ctx) = setup();
        // 3 glyphs at 7px * 0.5
        assert_eq!(s.measure_text("abc", "7px sans-serif"), 11);
    }

    #[cfg(feature = "backend_skia")]
    mod raster {
        use super::*;
        use crate::render::backends::skia::SkiaBackend;
        use crate::render::SurfaceSize;

        const RED: Color = Color::rgba(255, 0, 0, 255);

        fn session(ratio: f64) -> Session {
            let config = SessionConfig::builder()
                .device_pixel_ratio(ratio)
                .compile_mode(CompileMode::Deferred)
                .build()
                .unwrap();
            Session::new(config, Box::new(SkiaBackend::new()))
        }

        #[test]
        fn filled_rect_lands_on_scaled_device_pixels() {
            let mut s = session(2.0);
            let w = s.create_window(WindowRequest::Auto, true, true, "win").unwrap();
            assert_eq!(w.to_raw(), 1);
            s.set_window_rect(w, 0.0, 0.0, 100.0, 50.0).unwrap();
            assert_eq!(s.window(w).unwrap().pixel_size, SurfaceSize::new(200, 100));

            let ctx = s.create_window_context(w, 0.0, 0.0, 100.0, 50.0, 2.0).unwrap();
            s.set_brush(ctx, RED, None).unwrap();
            s.draw_rect(ctx, RectF::new(10.0, 10.0, 20.0, 20.0), true, false).unwrap();

            let pixels = s.window_pixels(w).unwrap().unwrap();
            assert_eq!(pixels.pixel(20, 20), Some([255, 0, 0, 255]));
            assert_eq!(pixels.pixel(59, 59), Some([255, 0, 0, 255]));
            assert_eq!(pixels.pixel(19, 19), Some([0, 0, 0, 0]));
            assert_eq!(pixels.pixel(60, 60), Some([0, 0, 0, 0]));
        }

        #[test]
        fn memory_context_drawing_is_read_back() {
            let mut s = session(1.0);
            let bmp = s.create_bitmap(&[0; 4 * 4 * 4], 0, 4, 4, 1.0).unwrap();
            let ctx = s.create_memory_context(bmp, 1.0).unwrap();
            s.set_brush(ctx, RED, None).unwrap();
            s.draw_rect(ctx, RectF::new(0.0, 0.0, 2.0, 2.0), true, false).unwrap();
            s.destroy_context(ctx).unwrap();

            let mut out = vec![0; 64];
            s.get_bitmap_data(bmp, &mut out, 0).unwrap();
            assert_eq!(&out[0..4], &[255, 0, 0, 255]);
            assert_eq!(&out[60..64], &[0, 0, 0, 0]);
        }

        #[test]
        fn outer_clip_and_brush_survive_two_inner_contexts() {
            let mut s = session(1.0);
            let w = s.create_window(WindowRequest::Auto, true, true, "win").unwrap();
            s.set_window_rect(w, 0.0, 0.0, 100.0, 100.0).unwrap();

            let outer = s.create_window_context(w, 0.0, 0.0, 100.0, 100.0, 1.0).unwrap();
            s.set_brush(outer, RED, None).unwrap();
            s.clip_rect(outer, RectF::new(10.0, 10.0, 20.0, 20.0)).unwrap();
            s.draw_point(outer, 0.0, 0.0).unwrap();

            let middle = s.create_window_context(w, 0.0, 0.0, 100.0, 100.0, 1.0).unwrap();
            s.set_brush(middle, Color::rgba(0, 255, 0, 255), None).unwrap();
            let inner = s.create_window_context(w, 50.0, 50.0, 50.0, 50.0, 1.0).unwrap();
            s.set_brush(inner, Color::rgba(0, 0, 255, 255), None).unwrap();
            s.clip_rect(inner, RectF::new(0.0, 0.0, 5.0, 5.0)).unwrap();
            s.draw_rect(inner, RectF::new(0.0, 0.0, 10.0, 10.0), true, false).unwrap();
            assert_eq!(s.window_context_depth(w).unwrap(), 3);

            s.destroy_context(inner).unwrap();
            s.destroy_context(middle).unwrap();
            assert_eq!(s.window_context_depth(w).unwrap(), 1);

            s.draw_rect(outer, RectF::new(0.0, 0.0, 100.0, 100.0), true, false).unwrap();
            let pixels = s.window_pixels(w).unwrap().unwrap();
            assert_eq!(pixels.pixel(15, 15), Some([255, 0, 0, 255]));
            assert_eq!(pixels.pixel(29, 29), Some([255, 0, 0, 255]));
            assert_eq!(pixels.pixel(5, 5), Some([0, 0, 0, 0]));
            assert_eq!(pixels.pixel(40, 40), Some([0, 0, 0, 0]));
            assert_ne!(pixels.pixel(52, 52), Some([255, 0, 0, 255]));
            s.destroy_context(outer).unwrap();
        }

        #[test]
        fn worker_compile_never_replaces_selected_bitmap() {
            let config = SessionConfig::builder()
                .compile_mode(CompileMode::Worker)
                .build()
                .unwrap();
            let mut s = Session::new(config, Box::new(SkiaBackend::new()));

            let red: Vec<u8> = [255u8, 0, 0, 255].repeat(16);
            let bmp = s.create_bitmap(&red, 0, 4, 4, 2.0).unwrap();
            let ctx = s.create_memory_context(bmp, 2.0).unwrap();
            s.set_brush(ctx, Color::rgba(0, 0, 255, 255), None).unwrap();
            s.draw_rect(ctx, RectF::new(0.0, 0.0, 1.0, 1.0), true, false).unwrap();

            // The compile scheduled at creation lands after the selection.
            assert_eq!(s.flush_compiles(), 0);
            assert!(s.bitmap(bmp).unwrap().is_active());
            assert!(s.bitmap(bmp).unwrap().compiled().is_none());

            s.destroy_context(ctx).unwrap();
            let mut out = vec![0; 64];
            s.get_bitmap_data(bmp, &mut out, 0).unwrap();
            assert_eq!(&out[0..4], &[0, 0, 255, 255]);
            assert_eq!(&out[20..24], &[0, 0, 255, 255]);
            assert_eq!(&out[60..64], &[255, 0, 0, 255]);

            assert_eq!(s.flush_compiles(), 1);
            assert!(s.bitmap(bmp).unwrap().compiled().is_some());
        }
    }
}
