//! Drawing contexts: retained, nestable graphics state over an immediate-mode surface.
//!
//! Several context handles may share one physical surface (all window contexts of a window
//! do). The surface's [`SurfaceSlot`] holds the frame of the innermost open context plus a stack
//! of the frames it shadows. Opening a context on a surface that already has an open one pushes
//! the current frame, closing it pops the frame back together with its attributes and clip.
//!
//! A frame's transform and clip are applied lazily on first use. The host save stack of an
//! initialized frame is laid out as `[.. frame save] [rotation saves]`: the frame save sits
//! below the frame clip, so restoring it drops the clip.

use log::{debug, warn};

use crate::errors::{BridgeError, Result};
use crate::handle::{BitmapId, ContextId, SurfaceId, WindowId};
use crate::render::{
    FillRule, GraphicsAttributes, Matrix, Path, RectF, Surface, SurfaceSize,
};
use crate::session::Session;

/// Geometry and clip of one logical context on a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub scale: f64,
    pub initialized: bool,
    /// Clip set by [`Session::clip_rect`]; `None` is the full frame.
    pub clip: Option<RectF>,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            scale: 1.0,
            initialized: false,
            clip: None,
        }
    }
}

impl Frame {
    fn bounds(&self) -> RectF {
        RectF::new(0.0, 0.0, self.width, self.height)
    }

    fn transform(&self) -> Matrix {
        Matrix::new(self.scale, 0.0, 0.0, self.scale, self.scale * self.x, self.scale * self.y)
    }
}

#[derive(Debug, Clone)]
struct SavedFrame {
    frame: Frame,
    /// Present when the frame was initialized at push time.
    attributes: Option<GraphicsAttributes>,
}

/// A physical surface plus the logical-context bookkeeping layered on it.
pub struct SurfaceSlot {
    pub(crate) surface: Box<dyn Surface>,
    pub(crate) frame: Frame,
    stack: Vec<SavedFrame>,
    /// Open window contexts on this surface.
    depth: usize,
    /// Outstanding `rotate_at_point` calls.
    rotations: usize,
    /// Windows, bitmaps and contexts holding on to this surface.
    pub(crate) refs: usize,
}

impl SurfaceSlot {
    pub(crate) fn new(surface: Box<dyn Surface>) -> Self {
        Self {
            surface,
            frame: Frame::default(),
            stack: Vec::new(),
            depth: 0,
            rotations: 0,
            refs: 1,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn stacked_frames(&self) -> usize {
        self.stack.len()
    }

    /// Forgets all nesting after the surface was resized and lost its host state.
    pub(crate) fn reset_frames(&mut self) {
        self.stack.clear();
        self.depth = 0;
        self.rotations = 0;
        self.frame.initialized = false;
    }

    /// Applies the frame transform and clip on first use.
    pub(crate) fn ensure_initialized(&mut self) {
        if self.frame.initialized {
            return;
        }

        self.surface.set_transform(self.frame.transform());
        self.surface.save();
        self.apply_clip();
        self.surface.attributes_mut().dash.clear();
        self.frame.initialized = true;
    }

    /// Clips to the frame bounds intersected with the frame's own clip.
    fn apply_clip(&mut self) {
        self.surface
            .clip(&Path::from_rect(self.frame.bounds()), FillRule::NonZero);
        if let Some(clip) = self.frame.clip {
            self.surface.clip(&Path::from_rect(clip), FillRule::NonZero);
        }
    }

    /// Returns to the frame save point keeping the current attributes, then saves again.
    fn rearm_save(&mut self) -> GraphicsAttributes {
        let attributes = self.surface.attributes().clone();
        self.surface.restore();
        self.surface.save();
        *self.surface.attributes_mut() = attributes.clone();
        attributes
    }

    fn push_frame(&mut self) -> Result<()> {
        if self.rotations > 0 {
            return Err(BridgeError::UnbalancedRotation);
        }

        let attributes = if self.frame.initialized {
            Some(self.rearm_save())
        } else {
            None
        };
        self.stack.push(SavedFrame {
            frame: self.frame.clone(),
            attributes,
        });
        Ok(())
    }

    fn pop_frame(&mut self) {
        let Some(saved) = self.stack.pop() else {
            return;
        };
        self.frame = saved.frame;

        if self.frame.initialized {
            self.surface.restore();
            self.surface.save();
            if let Some(attributes) = saved.attributes {
                *self.surface.attributes_mut() = attributes;
            }
            self.apply_clip();
        }
    }

    /// Replaces the frame clip, keeping the current attributes.
    pub(crate) fn reset_clip(&mut self, clip: Option<RectF>) -> Result<()> {
        if self.rotations > 0 {
            return Err(BridgeError::UnbalancedRotation);
        }
        self.ensure_initialized();
        self.rearm_save();
        self.frame.clip = clip;
        self.apply_clip();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextTarget {
    Window(WindowId),
    Memory(BitmapId),
}

pub struct DrawingContext {
    pub target: ContextTarget,
    pub(crate) surface: SurfaceId,
}

impl Session {
    pub fn create_window_context(
        &mut self,
        window: WindowId,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        scale: f64,
    ) -> Result<ContextId> {
        let surface = self
            .window(window)?
            .surface
            .ok_or(BridgeError::NoSurface(window))?;

        let slot = self.slot_mut(surface)?;
        if slot.depth > 0 {
            slot.push_frame()?;
        }
        slot.frame = Frame {
            x,
            y,
            width,
            height,
            scale,
            initialized: false,
            clip: None,
        };
        slot.depth += 1;
        slot.refs += 1;

        let id = self.contexts.insert(DrawingContext {
            target: ContextTarget::Window(window),
            surface,
        });
        debug!("created context {} on window {}", id, window);
        Ok(id)
    }

    pub fn destroy_window_context(&mut self, id: ContextId) -> Result<()> {
        let context = self.context(id)?;
        if !matches!(context.target, ContextTarget::Window(_)) {
            return Err(BridgeError::InvalidContextId(id));
        }
        let surface = context.surface;

        let slot = self.slot_mut(surface)?;
        if slot.rotations > 0 {
            return Err(BridgeError::UnbalancedRotation);
        }
        if slot.frame.initialized {
            slot.surface.restore();
            slot.frame.initialized = false;
        }
        if slot.depth > 1 {
            slot.pop_frame();
        }
        slot.depth = slot.depth.saturating_sub(1);

        self.contexts.remove(id);
        self.release_surface(surface);
        debug!("destroyed context {}", id);
        Ok(())
    }

    /// Runs `f` with a fresh window context, destroying it afterwards whatever `f` returns.
    pub fn with_window_context<T>(
        &mut self,
        window: WindowId,
        frame: RectF,
        scale: f64,
        f: impl FnOnce(&mut Session, ContextId) -> Result<T>,
    ) -> Result<T> {
        let id = self.create_window_context(window, frame.x, frame.y, frame.width, frame.height, scale)?;
        let result = f(self, id);

        if self.context(id).is_err() {
            warn!("context {} was destroyed inside its scope", id);
            result?;
            return Err(BridgeError::InvalidContextId(id));
        }

        let closed = self.destroy_window_context(id);
        if closed.is_err() {
            // Unmatched rotation: unwind it so the context can be closed.
            if let Ok(slot) = self.slot_mut_for(id) {
                while slot.rotations > 0 {
                    slot.rotations -= 1;
                    slot.surface.restore();
                }
            }
            self.destroy_window_context(id)?;
        }

        let value = result?;
        closed?;
        Ok(value)
    }

    /// Selects a bitmap for off-screen drawing.
    ///
    /// The bitmap's content is painted onto a new surface, which becomes the bitmap's canonical
    /// content until the next [`get_bitmap_data`](Session::get_bitmap_data).
    pub fn create_memory_context(&mut self, bitmap_id: BitmapId, scale: f64) -> Result<ContextId> {
        self.drain_compiled();

        let bitmap = self.bitmap(bitmap_id)?;
        if bitmap.selected_by.is_some() {
            return Err(BridgeError::BitmapInUse(bitmap_id));
        }
        let (width, height) = (bitmap.width, bitmap.height);
        let image = self.bitmap_image(bitmap_id)?;

        let surface = self.allocate_surface(SurfaceSize::new(width, height))?;
        let slot = self.slot_mut(surface)?;
        *slot.surface.attributes_mut() = GraphicsAttributes::window_baseline();
        slot.frame = Frame {
            x: 0.0,
            y: 0.0,
            width: width as f64 / scale,
            height: height as f64 / scale,
            scale,
            initialized: false,
            clip: None,
        };
        slot.ensure_initialized();

        if let Some(image) = image {
            let bitmap_scale = self.bitmap(bitmap_id)?.scale;
            let dst = RectF::new(0.0, 0.0, width as f64 / bitmap_scale, height as f64 / bitmap_scale);
            let src = RectF::new(0.0, 0.0, width as f64, height as f64);
            self.slot_mut(surface)?.surface.draw_image(&image, src, dst);
        }

        let id = self.contexts.insert(DrawingContext {
            target: ContextTarget::Memory(bitmap_id),
            surface,
        });
        // The context's reference; the bitmap takes the second.
        self.slot_mut(surface)?.refs += 1;
        self.activate_bitmap(bitmap_id, surface, id)?;

        debug!("created memory context {} for bitmap {}", id, bitmap_id);
        Ok(id)
    }

    pub fn destroy_memory_context(&mut self, id: ContextId) -> Result<()> {
        let context = self.context(id)?;
        let surface = context.surface;
        let ContextTarget::Memory(bitmap) = context.target else {
            return Err(BridgeError::InvalidContextId(id));
        };
        if self.slot(surface)?.rotations > 0 {
            return Err(BridgeError::UnbalancedRotation);
        }

        if let Some(bitmap) = self.bitmaps.get_mut(bitmap) {
            if bitmap.selected_by == Some(id) {
                bitmap.selected_by = None;
            }
        }
        self.contexts.remove(id);
        self.release_surface(surface);
        debug!("destroyed memory context {}", id);
        Ok(())
    }

    /// Destroys a context of either kind.
    pub fn destroy_context(&mut self, id: ContextId) -> Result<()> {
        match self.context(id)?.target {
            ContextTarget::Window(_) => self.destroy_window_context(id),
            ContextTarget::Memory(_) => self.destroy_memory_context(id),
        }
    }

    pub fn context(&self, id: ContextId) -> Result<&DrawingContext> {
        self.contexts.get(id).ok_or(BridgeError::InvalidContextId(id))
    }

    /// Current frame of the surface behind `id`.
    pub fn context_frame(&self, id: ContextId) -> Result<&Frame> {
        let surface = self.context(id)?.surface;
        Ok(&self.slot(surface)?.frame)
    }

    /// Current attributes of the surface behind `id`.
    pub fn context_attributes(&self, id: ContextId) -> Result<&GraphicsAttributes> {
        let surface = self.context(id)?.surface;
        Ok(self.slot(surface)?.surface.attributes())
    }

    /// Open window contexts on the window's surface.
    pub fn window_context_depth(&self, window: WindowId) -> Result<usize> {
        let surface = self
            .window(window)?
            .surface
            .ok_or(BridgeError::NoSurface(window))?;
        Ok(self.slot(surface)?.depth)
    }

    pub(crate) fn slot_mut_for(&mut self, id: ContextId) -> Result<&mut SurfaceSlot> {
        let surface = self.context(id)?.surface;
        self.slot_mut(surface)
    }

    /// Resolves a context for drawing, applying its transform and clip on first use.
    pub(crate) fn drawing_slot(&mut self, id: ContextId) -> Result<&mut SurfaceSlot> {
        let slot = self.slot_mut_for(id)?;
        slot.ensure_initialized();
        Ok(slot)
    }

    /// Restricts drawing to `rect`, replacing any earlier clip rectangle.
    pub fn clip_rect(&mut self, id: ContextId, rect: RectF) -> Result<()> {
        self.slot_mut_for(id)?.reset_clip(Some(rect))
    }

    /// Clears the clip rectangle back to the full frame.
    pub fn destroy_clip(&mut self, id: ContextId) -> Result<()> {
        self.slot_mut_for(id)?.reset_clip(None)
    }

    /// Rotates subsequent drawing by `degrees` (clockwise-positive) around `(x, y)`, which
    /// becomes the new origin. Must be matched by [`clear_rotation`](Session::clear_rotation).
    pub fn rotate_at_point(&mut self, id: ContextId, x: f64, y: f64, degrees: f64) -> Result<()> {
        let slot = self.drawing_slot(id)?;
        slot.surface.save();
        slot.surface.translate(x, y);
        slot.surface.rotate((-degrees).to_radians());
        slot.rotations += 1;
        Ok(())
    }

    pub fn clear_rotation(&mut self, id: ContextId) -> Result<()> {
        let slot = self.slot_mut_for(id)?;
        if slot.rotations == 0 {
            warn!("clear_rotation on context {} without rotation", id);
            return Err(BridgeError::UnbalancedRotation);
        }
        slot.rotations -= 1;
        slot.surface.restore();
        Ok(())
    }
}
