//! Path construction for the host surface.
//!
//! Paths are built in user space and handed to a [`Surface`](super::Surface) which maps them
//! through its current transform. The host API has no native arc primitive, so arcs and
//! ellipses are flattened to cubic Bézier segments here.

use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in floating point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectF {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RectF {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathElement {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    /// Cubic Bézier curve (cp1x, cp1y, cp2x, cp2y, x, y)
    CurveTo(f64, f64, f64, f64, f64, f64),
    ClosePath,
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::MoveTo(x, y) => write!(f, "M {} {}", x, y),
            PathElement::LineTo(x, y) => write!(f, "L {} {}", x, y),
            PathElement::CurveTo(cp1x, cp1y, cp2x, cp2y, x, y) => {
                write!(f, "C {} {} {} {} {} {}", cp1x, cp1y, cp2x, cp2y, x, y)
            }
            PathElement::ClosePath => write!(f, "Z"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    elements: Vec<PathElement>,
    current_point: Option<Point>,
    subpath_start: Option<Point>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closed rectangle subpath.
    pub fn from_rect(rect: RectF) -> Self {
        let mut path = Path::new();
        path.rect(rect);
        path
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.elements.push(PathElement::MoveTo(x, y));
        self.current_point = Some(Point::new(x, y));
        self.subpath_start = self.current_point;
    }

    /// Line from the current point; without one this starts a subpath instead.
    pub fn line_to(&mut self, x: f64, y: f64) {
        if self.current_point.is_none() {
            self.move_to(x, y);
            return;
        }
        self.elements.push(PathElement::LineTo(x, y));
        self.current_point = Some(Point::new(x, y));
    }

    pub fn curve_to(&mut self, cp1x: f64, cp1y: f64, cp2x: f64, cp2y: f64, x: f64, y: f64) {
        if self.current_point.is_none() {
            self.move_to(cp1x, cp1y);
        }
        self.elements
            .push(PathElement::CurveTo(cp1x, cp1y, cp2x, cp2y, x, y));
        self.current_point = Some(Point::new(x, y));
    }

    pub fn close(&mut self) {
        if self.current_point.is_none() {
            return;
        }
        self.elements.push(PathElement::ClosePath);
        self.current_point = self.subpath_start;
    }

    pub fn rect(&mut self, rect: RectF) {
        self.move_to(rect.x, rect.y);
        self.line_to(rect.x + rect.width, rect.y);
        self.line_to(rect.x + rect.width, rect.y + rect.height);
        self.line_to(rect.x, rect.y + rect.height);
        self.close();
    }

    /// Appends an elliptical arc with canvas `ellipse()` semantics.
    ///
    /// Angles are in radians, measured clockwise on a y-down surface. The arc is joined to the
    /// current point by a straight line, if there is one.
    #[allow(clippy::too_many_arguments)]
    pub fn ellipse(
        &mut self,
        cx: f64,
        cy: f64,
        rx: f64,
        ry: f64,
        start: f64,
        end: f64,
        anticlockwise: bool,
    ) {
        let sweep = arc_sweep(start, end, anticlockwise);
        let at = |theta: f64| Point::new(cx + rx * theta.cos(), cy + ry * theta.sin());

        let first = at(start);
        if self.current_point.is_some() {
            self.line_to(first.x, first.y);
        } else {
            self.move_to(first.x, first.y);
        }

        if sweep == 0.0 {
            return;
        }

        let segments = (sweep.abs() / FRAC_PI_2).ceil().max(1.0) as usize;
        let delta = sweep / segments as f64;
        let k = 4.0 / 3.0 * (delta / 4.0).tan();

        let mut theta = start;
        for _ in 0..segments {
            let next = theta + delta;
            let (s1, c1) = theta.sin_cos();
            let (s2, c2) = next.sin_cos();
            self.curve_to(
                cx + rx * (c1 - k * s1),
                cy + ry * (s1 + k * c1),
                cx + rx * (c2 + k * s2),
                cy + ry * (s2 - k * c2),
                cx + rx * c2,
                cy + ry * s2,
            );
            theta = next;
        }
    }

    pub fn arc(&mut self, cx: f64, cy: f64, radius: f64, start: f64, end: f64, anticlockwise: bool) {
        self.ellipse(cx, cy, radius, radius, start, end, anticlockwise);
    }

    /// Rectangle with quarter-circle corners of `radius`.
    pub fn rounded_rect(&mut self, rect: RectF, radius: f64) {
        let r = radius.max(0.0);
        let RectF { x, y, width: w, height: h } = rect;

        self.move_to(x + r, y);
        self.line_to(x + w - r, y);
        self.arc(x + w - r, y + r, r, -FRAC_PI_2, 0.0, false);
        self.line_to(x + w, y + h - r);
        self.arc(x + w - r, y + h - r, r, 0.0, FRAC_PI_2, false);
        self.line_to(x + r, y + h);
        self.arc(x + r, y + h - r, r, FRAC_PI_2, PI, false);
        self.line_to(x, y + r);
        self.arc(x + r, y + r, r, PI, PI + FRAC_PI_2, false);
        self.close();
    }

    /// Open polyline through `points`.
    pub fn polyline(points: &[Point]) -> Self {
        let mut path = Path::new();
        if let Some((first, rest)) = points.split_first() {
            path.move_to(first.x, first.y);
            for p in rest {
                path.line_to(p.x, p.y);
            }
        }
        path
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn current_point(&self) -> Option<Point> {
        self.current_point
    }
}

/// Signed sweep the canvas `arc()`/`ellipse()` algorithm traces between two angles.
fn arc_sweep(start: f64, end: f64, anticlockwise: bool) -> f64 {
    if anticlockwise {
        if start - end >= TAU {
            return -TAU;
        }
        -(start - end).rem_euclid(TAU)
    } else {
        if end - start >= TAU {
            return TAU;
        }
        (end - start).rem_euclid(TAU)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, el) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", el)?;
        }
        Ok(())
    }
}
