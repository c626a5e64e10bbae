//! Bitmaps: pixel buffers copied in from foreign memory, with an optional compiled form.
//!
//! A bitmap is either *static* (owned pixels plus, once a compile lands, a compiled image) or
//! *active* (its content lives on the surface of the memory context it was selected into).
//! Every content change bumps the bitmap's revision; compile results for an older revision
//! are discarded.

use std::ops::Range;
use std::sync::Arc;

use log::{debug, trace};

use crate::errors::{BridgeError, Result};
use crate::handle::{BitmapId, ContextId, SurfaceId};
use crate::render::{CompiledImage, RgbaImage};
use crate::session::Session;

pub mod compiler;

use compiler::{CompileJob, CompileOutcome};

pub enum BitmapContent {
    Static {
        pixels: Arc<RgbaImage>,
        compiled: Option<Arc<CompiledImage>>,
    },
    Active {
        surface: SurfaceId,
    },
}

pub struct Bitmap {
    /// Width in device pixels
    pub width: u32,
    /// Height in device pixels
    pub height: u32,
    pub scale: f64,
    /// Content revision, bumped on every content change.
    pub revision: u64,
    pub content: BitmapContent,
    /// Memory context the bitmap is currently selected into.
    pub selected_by: Option<ContextId>,
}

impl Bitmap {
    pub fn is_active(&self) -> bool {
        matches!(self.content, BitmapContent::Active { .. })
    }

    pub fn compiled(&self) -> Option<&Arc<CompiledImage>> {
        match &self.content {
            BitmapContent::Static { compiled, .. } => compiled.as_ref(),
            BitmapContent::Active { .. } => None,
        }
    }

    fn static_pixels(&self) -> Option<Arc<RgbaImage>> {
        match &self.content {
            BitmapContent::Static { pixels, .. } => Some(pixels.clone()),
            BitmapContent::Active { .. } => None,
        }
    }

    fn live_surface(&self) -> Option<SurfaceId> {
        match self.content {
            BitmapContent::Active { surface } => Some(surface),
            BitmapContent::Static { .. } => None,
        }
    }

    /// Installs a compile result if it was made from the current content.
    fn install(&mut self, outcome: CompileOutcome) -> bool {
        if outcome.revision != self.revision {
            return false;
        }
        match (&mut self.content, outcome.image) {
            (BitmapContent::Static { compiled, .. }, Some(image)) => {
                *compiled = Some(Arc::new(image));
                true
            }
            _ => false,
        }
    }
}

/// Byte range `offset..offset + len` of a foreign buffer of `size` bytes.
pub(crate) fn foreign_range(offset: usize, len: usize, size: usize) -> Result<Range<usize>> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(offset..end),
        _ => Err(BridgeError::OutOfBounds { offset, len, size }),
    }
}

impl Session {
    /// Copies `4 * width * height` bytes of straight RGBA from `memory[offset..]` into a new
    /// bitmap and schedules its compile.
    pub fn create_bitmap(
        &mut self,
        memory: &[u8],
        offset: usize,
        width: u32,
        height: u32,
        scale: f64,
    ) -> Result<BitmapId> {
        let pixels = copy_pixels(memory, offset, width, height)?;
        let id = self.bitmaps.insert(Bitmap {
            width,
            height,
            scale,
            revision: 0,
            content: BitmapContent::Static {
                pixels: pixels.clone(),
                compiled: None,
            },
            selected_by: None,
        });

        self.compiler.schedule(CompileJob {
            bitmap: id,
            revision: 0,
            pixels,
        });
        debug!("created bitmap {} ({}x{} @{})", id, width, height, scale);
        Ok(id)
    }

    /// Replaces a bitmap's content and size. An active bitmap becomes static again.
    pub fn set_bitmap_data(
        &mut self,
        id: BitmapId,
        memory: &[u8],
        offset: usize,
        width: u32,
        height: u32,
        scale: f64,
    ) -> Result<()> {
        let pixels = copy_pixels(memory, offset, width, height)?;
        let bitmap = self.bitmap_mut(id)?;
        let released = bitmap.live_surface();

        bitmap.width = width;
        bitmap.height = height;
        bitmap.scale = scale;
        bitmap.revision += 1;
        bitmap.content = BitmapContent::Static {
            pixels: pixels.clone(),
            compiled: None,
        };
        let revision = bitmap.revision;

        if let Some(surface) = released {
            self.release_surface(surface);
        }
        self.compiler.schedule(CompileJob {
            bitmap: id,
            revision,
            pixels,
        });
        Ok(())
    }

    /// Writes the bitmap's current pixels to `memory[offset..]`.
    ///
    /// An active bitmap is read back from its surface and becomes static with that content.
    pub fn get_bitmap_data(&mut self, id: BitmapId, memory: &mut [u8], offset: usize) -> Result<()> {
        self.drain_compiled();

        let bitmap = self.bitmap(id)?;
        let range = foreign_range(
            offset,
            RgbaImage::byte_len(bitmap.width, bitmap.height),
            memory.len(),
        )?;

        let pixels = match (bitmap.live_surface(), bitmap.static_pixels()) {
            (Some(surface), _) => {
                let pixels = Arc::new(self.slot(surface)?.surface.read_pixels());
                self.deactivate_bitmap(id, pixels.clone())?;
                pixels
            }
            (None, Some(pixels)) => pixels,
            (None, None) => return Err(BridgeError::Internal),
        };

        memory[range].copy_from_slice(&pixels.pixels);
        Ok(())
    }

    pub fn destroy_bitmap(&mut self, id: BitmapId) -> Result<()> {
        let bitmap = self.bitmaps.remove(id).ok_or(BridgeError::InvalidBitmapId(id))?;
        if let Some(surface) = bitmap.live_surface() {
            self.release_surface(surface);
        }
        debug!("destroyed bitmap {}", id);
        Ok(())
    }

    pub fn bitmap(&self, id: BitmapId) -> Result<&Bitmap> {
        self.bitmaps.get(id).ok_or(BridgeError::InvalidBitmapId(id))
    }

    fn bitmap_mut(&mut self, id: BitmapId) -> Result<&mut Bitmap> {
        self.bitmaps.get_mut(id).ok_or(BridgeError::InvalidBitmapId(id))
    }

    /// Current straight-alpha pixels, read back from the surface for active bitmaps.
    pub(crate) fn bitmap_pixels(&self, id: BitmapId) -> Result<Arc<RgbaImage>> {
        let bitmap = self.bitmap(id)?;
        match (bitmap.live_surface(), bitmap.static_pixels()) {
            (Some(surface), _) => Ok(Arc::new(self.slot(surface)?.surface.read_pixels())),
            (None, Some(pixels)) => Ok(pixels),
            (None, None) => Err(BridgeError::Internal),
        }
    }

    /// Drawable form of a bitmap's content: the compiled image when present, a snapshot of the
    /// live surface for active bitmaps, otherwise a one-off conversion of the static pixels.
    /// `None` for zero-sized bitmaps.
    pub(crate) fn bitmap_image(&self, id: BitmapId) -> Result<Option<Arc<CompiledImage>>> {
        let bitmap = self.bitmap(id)?;
        Ok(match &bitmap.content {
            BitmapContent::Static {
                compiled: Some(compiled),
                ..
            } => Some(compiled.clone()),
            BitmapContent::Static { pixels, .. } => CompiledImage::from_rgba(pixels).map(Arc::new),
            BitmapContent::Active { surface } => self.slot(*surface)?.surface.snapshot().map(Arc::new),
        })
    }

    /// Binds a bitmap to the surface of the memory context `context`.
    pub(crate) fn activate_bitmap(&mut self, id: BitmapId, surface: SurfaceId, context: ContextId) -> Result<()> {
        let bitmap = self.bitmap_mut(id)?;
        let previous = bitmap.live_surface();
        bitmap.content = BitmapContent::Active { surface };
        bitmap.revision += 1;
        bitmap.selected_by = Some(context);

        if let Some(previous) = previous {
            self.release_surface(previous);
        }
        Ok(())
    }

    fn deactivate_bitmap(&mut self, id: BitmapId, pixels: Arc<RgbaImage>) -> Result<()> {
        let bitmap = self.bitmap_mut(id)?;
        let Some(surface) = bitmap.live_surface() else {
            return Ok(());
        };
        bitmap.content = BitmapContent::Static {
            pixels: pixels.clone(),
            compiled: None,
        };
        bitmap.revision += 1;
        let revision = bitmap.revision;

        self.release_surface(surface);
        self.compiler.schedule(CompileJob {
            bitmap: id,
            revision,
            pixels,
        });
        Ok(())
    }

    fn apply_compiled(&mut self, outcome: CompileOutcome) -> bool {
        let id = outcome.bitmap;
        let revision = outcome.revision;
        let installed = match self.bitmaps.get_mut(id) {
            Some(bitmap) => bitmap.install(outcome),
            None => false,
        };
        if !installed {
            trace!("discarded compile of bitmap {} (revision {})", id, revision);
        }
        installed
    }

    /// Applies finished compiles without waiting. Returns how many were installed.
    pub fn drain_compiled(&mut self) -> usize {
        let mut installed = 0;
        while let Some(outcome) = self.compiler.try_next() {
            if self.apply_compiled(outcome) {
                installed += 1;
            }
        }
        installed
    }

    /// Runs compiles queued in [`CompileMode::Deferred`](crate::CompileMode::Deferred).
    pub fn run_deferred_compiles(&mut self) -> usize {
        self.compiler.run_deferred()
    }

    /// Waits for every outstanding compile and applies the results.
    pub fn flush_compiles(&mut self) -> usize {
        let mut installed = 0;
        for outcome in self.compiler.flush() {
            if self.apply_compiled(outcome) {
                installed += 1;
            }
        }
        installed
    }

    pub fn pending_compiles(&self) -> usize {
        self.compiler.pending()
    }
}

fn copy_pixels(memory: &[u8], offset: usize, width: u32, height: u32) -> Result<Arc<RgbaImage>> {
    let range = foreign_range(offset, RgbaImage::byte_len(width, height), memory.len())?;
    let pixels = RgbaImage::from_raw(memory[range].to_vec(), width, height).ok_or(BridgeError::Internal)?;
    Ok(Arc::new(pixels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompileMode, SessionConfig};
    use crate::render::backends::null::NullBackend;

    fn session() -> Session {
        let config = SessionConfig::builder()
            .compile_mode(CompileMode::Deferred)
            .build()
            .unwrap();
        Session::new(config, Box::new(NullBackend::new()))
    }

    const RED: [u8; 4] = [0xFF, 0x00, 0x00, 0xFF];

    #[test]
    fn red_pixel_round_trips() {
        let mut s = session();
        let mut memory = vec![0u8; 16];
        memory[4..8].copy_from_slice(&RED);

        let id = s.create_bitmap(&memory, 4, 1, 1, 1.0).unwrap();
        s.get_bitmap_data(id, &mut memory, 12).unwrap();
        assert_eq!(&memory[12..16], &RED);
    }

    #[test]
    fn out_of_range_memory_is_rejected() {
        let mut s = session();
        let memory = vec![0u8; 7];
        assert!(matches!(
            s.create_bitmap(&memory, 4, 1, 1, 1.0),
            Err(BridgeError::OutOfBounds { offset: 4, len: 4, size: 7 })
        ));

        let id = s.create_bitmap(&RED, 0, 1, 1, 1.0).unwrap();
        let mut small = [0u8; 3];
        assert!(s.get_bitmap_data(id, &mut small, 0).is_err());
        assert!(s.get_bitmap_data(id, &mut small, usize::MAX).is_err());
    }

    #[test]
    fn compile_installs_for_current_revision() {
        let mut s = session();
        let id = s.create_bitmap(&RED, 0, 1, 1, 1.0).unwrap();
        assert!(s.bitmap(id).unwrap().compiled().is_none());

        s.run_deferred_compiles();
        assert_eq!(s.drain_compiled(), 1);
        assert!(s.bitmap(id).unwrap().compiled().is_some());
    }

    #[test]
    fn compile_for_destroyed_bitmap_is_dropped() {
        let mut s = session();
        let id = s.create_bitmap(&RED, 0, 1, 1, 1.0).unwrap();
        s.destroy_bitmap(id).unwrap();
        assert_eq!(s.flush_compiles(), 0);
        assert!(matches!(s.bitmap(id), Err(BridgeError::InvalidBitmapId(_))));
    }

    #[test]
    fn compile_after_selection_never_overwrites_live_surface() {
        let mut s = session();
        let id = s.create_bitmap(&RED, 0, 1, 1, 1.0).unwrap();
        let ctx = s.create_memory_context(id, 1.0).unwrap();
        assert!(s.bitmap(id).unwrap().is_active());

        // The compile scheduled at creation finishes only now.
        assert_eq!(s.flush_compiles(), 0);
        assert!(s.bitmap(id).unwrap().is_active());
        assert!(s.bitmap(id).unwrap().compiled().is_none());
        s.destroy_memory_context(ctx).unwrap();
    }

    #[test]
    fn set_bitmap_data_supersedes_pending_compile() {
        let mut s = session();
        let id = s.create_bitmap(&RED, 0, 1, 1, 1.0).unwrap();
        let blue = [0u8, 0, 255, 255, 0, 0, 255, 255];
        s.set_bitmap_data(id, &blue, 0, 2, 1, 2.0).unwrap();

        // Only the second compile matches the bitmap's revision.
        assert_eq!(s.flush_compiles(), 1);
        let bitmap = s.bitmap(id).unwrap();
        assert_eq!((bitmap.width, bitmap.height, bitmap.scale), (2, 1, 2.0));
        assert_eq!(bitmap.compiled().map(|c| c.width()), Some(2));
    }

    #[test]
    fn foreign_range_checks_overflow() {
        assert_eq!(foreign_range(2, 4, 6).unwrap(), 2..6);
        assert!(foreign_range(3, 4, 6).is_err());
        assert!(foreign_range(usize::MAX, 1, 6).is_err());
    }
}
