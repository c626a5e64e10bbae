use crate::render::{
    CompiledImage, FillRule, GraphicsAttributes, HostState, Matrix, Path, RectF, RgbaImage,
};

/// Size of a surface in device pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Device size for a logical size at the given scale factor.
    pub fn scaled(width: f64, height: f64, scale: f64) -> Self {
        let px = |v: f64| (v * scale).round().max(0.0) as u32;
        Self::new(px(width), px(height))
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Immediate-mode 2D drawing target, shaped after the canvas 2D API.
///
/// A surface owns a single flat save/restore stack. `save` captures the [`HostState`] and the
/// current clip; `restore` reinstates both. Restoring with nothing saved is a no-op.
pub trait Surface {
    fn size(&self) -> SurfaceSize;

    /// Reallocates the pixels (cleared to transparent) and resets all host state.
    fn resize(&mut self, size: SurfaceSize);

    fn state(&self) -> &HostState;
    fn state_mut(&mut self) -> &mut HostState;

    fn save(&mut self);
    fn restore(&mut self);
    /// Number of outstanding saves.
    fn save_depth(&self) -> usize;

    /// Intersects the current clip with `path` (mapped through the current transform).
    fn clip(&mut self, path: &Path, rule: FillRule);

    fn fill(&mut self, path: &Path, rule: FillRule);
    fn stroke(&mut self, path: &Path);
    /// Draws `text` with its alphabetic baseline at `(x, y)` using the fill paint.
    fn fill_text(&mut self, text: &str, x: f64, y: f64);
    /// Draws the `src` region of `image` (in image pixels) into `dst` (in user space).
    fn draw_image(&mut self, image: &CompiledImage, src: RectF, dst: RectF);

    /// Straight-alpha copy of the whole surface.
    fn read_pixels(&self) -> RgbaImage;
    /// Premultiplied copy of the whole surface, `None` while the surface is empty.
    fn snapshot(&self) -> Option<CompiledImage>;

    fn attributes(&self) -> &GraphicsAttributes {
        &self.state().attributes
    }

    fn attributes_mut(&mut self) -> &mut GraphicsAttributes {
        &mut self.state_mut().attributes
    }

    fn transform(&self) -> Matrix {
        self.state().transform
    }

    fn set_transform(&mut self, transform: Matrix) {
        self.state_mut().transform = transform;
    }

    fn translate(&mut self, tx: f64, ty: f64) {
        let t = self.transform().pre_concat(&Matrix::translation(tx, ty));
        self.set_transform(t);
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        let t = self.transform().pre_concat(&Matrix::scaling(sx, sy));
        self.set_transform(t);
    }

    fn rotate(&mut self, radians: f64) {
        let t = self.transform().pre_concat(&Matrix::rotation(radians));
        self.set_transform(t);
    }

    fn fill_rect(&mut self, rect: RectF) {
        self.fill(&Path::from_rect(rect), FillRule::NonZero);
    }

    fn stroke_rect(&mut self, rect: RectF) {
        self.stroke(&Path::from_rect(rect));
    }
}

/// Core backend interface. Calls occur on the session's owning thread.
pub trait RenderBackend {
    fn name(&self) -> &str;

    /// Creates a new surface of the given size, cleared to transparent.
    fn create_surface(&self, size: SurfaceSize) -> anyhow::Result<Box<dyn Surface>>;

    /// Advance width of `text` in CSS pixels for the given font shorthand.
    fn measure_text(&self, text: &str, font: &str) -> f64;
}

/// Save/restore bookkeeping shared by the backends. `C` is the backend's clip representation.
#[derive(Debug, Clone, Default)]
pub struct SaveStack<C> {
    pub state: HostState,
    pub clip: C,
    saved: Vec<(HostState, C)>,
}

impl<C: Clone + Default> SaveStack<C> {
    pub fn new() -> Self {
        Self {
            state: HostState::default(),
            clip: C::default(),
            saved: Vec::new(),
        }
    }

    pub fn save(&mut self) {
        self.saved.push((self.state.clone(), self.clip.clone()));
    }

    pub fn restore(&mut self) -> bool {
        match self.saved.pop() {
            Some((state, clip)) => {
                self.state = state;
                self.clip = clip;
                true
            }
            None => false,
        }
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::LineJoin;

    #[test]
    fn scaled_size_rounds() {
        assert_eq!(SurfaceSize::scaled(100.0, 50.0, 2.0), SurfaceSize::new(200, 100));
        assert_eq!(SurfaceSize::scaled(10.0, 0.0, 1.5), SurfaceSize::new(15, 0));
        assert!(SurfaceSize::scaled(10.0, 0.0, 1.5).is_empty());
    }

    #[test]
    fn save_stack_restores_state_and_clip() {
        let mut stack: SaveStack<Option<u8>> = SaveStack::new();
        stack.save();
        stack.state.attributes.line_join = LineJoin::Bevel;
        stack.clip = Some(3);

        assert!(stack.restore());
        assert_eq!(stack.state.attributes.line_join, LineJoin::Miter);
        assert_eq!(stack.clip, None);
        assert!(!stack.restore());
    }
}
