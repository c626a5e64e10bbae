use std::sync::Arc;

use crate::render::{Color, CompiledImage, Point};

/// 2D affine transform in canvas order: `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation by `radians`, clockwise on a y-down surface.
    pub fn rotation(radians: f64) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// Returns `self * other`: points are mapped by `other` first, then by `self`.
    pub fn pre_concat(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn map_point(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    Round,
    Bevel,
    #[default]
    Miter,
}

impl LineJoin {
    /// Maps the toolkit's join code; unknown codes fall back to round.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => LineJoin::Bevel,
            2 => LineJoin::Miter,
            _ => LineJoin::Round,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl LineCap {
    /// Maps the toolkit's cap code; unknown codes fall back to butt.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => LineCap::Round,
            2 => LineCap::Square,
            _ => LineCap::Butt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextBaseline {
    Top,
    Middle,
    #[default]
    Alphabetic,
    Bottom,
}

/// Source of fill or stroke paint.
#[derive(Debug, Clone)]
pub enum PaintStyle {
    Color(Color),
    /// Repeating pattern built from a compiled bitmap.
    Pattern(Arc<CompiledImage>),
}

impl PaintStyle {
    pub fn as_color(&self) -> Option<Color> {
        match self {
            PaintStyle::Color(c) => Some(*c),
            PaintStyle::Pattern(_) => None,
        }
    }
}

impl PartialEq for PaintStyle {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PaintStyle::Color(a), PaintStyle::Color(b)) => a == b,
            (PaintStyle::Pattern(a), PaintStyle::Pattern(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Default for PaintStyle {
    fn default() -> Self {
        PaintStyle::Color(Color::BLACK)
    }
}

/// The drawing attributes a surface save/restore covers, transform excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsAttributes {
    /// CSS font shorthand, see [`FontSpec`](crate::render::FontSpec).
    pub font: String,
    pub line_width: f64,
    pub line_join: LineJoin,
    pub line_cap: LineCap,
    pub fill: PaintStyle,
    pub stroke: PaintStyle,
    /// Dash lengths in user units; empty means solid.
    pub dash: Vec<f64>,
    pub image_smoothing: bool,
    pub text_baseline: TextBaseline,
}

impl Default for GraphicsAttributes {
    fn default() -> Self {
        Self {
            font: "10px sans-serif".to_string(),
            line_width: 1.0,
            line_join: LineJoin::Miter,
            line_cap: LineCap::Butt,
            fill: PaintStyle::default(),
            stroke: PaintStyle::default(),
            dash: Vec::new(),
            image_smoothing: true,
            text_baseline: TextBaseline::Alphabetic,
        }
    }
}

impl GraphicsAttributes {
    /// Attributes every freshly sized window surface starts from.
    pub fn window_baseline() -> Self {
        Self {
            line_join: LineJoin::Round,
            line_cap: LineCap::Round,
            image_smoothing: false,
            text_baseline: TextBaseline::Alphabetic,
            ..Self::default()
        }
    }
}

/// Everything a single `save()` captures besides the clip.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostState {
    pub transform: Matrix,
    pub attributes: GraphicsAttributes,
}
