use log::{debug, warn};

use crate::bitmap::compiler::BitmapCompiler;
use crate::bitmap::Bitmap;
use crate::config::SessionConfig;
use crate::context::{DrawingContext, SurfaceSlot};
use crate::errors::{BridgeError, Result};
use crate::handle::{BitmapId, ContextId, Registry, SurfaceId, WindowId};
use crate::render::{GraphicsAttributes, RenderBackend, SurfaceSize};
use crate::storage::ConfigStore;
use crate::window::{AssignedLayout, LayoutHost, Window};

/// Owns every window, bitmap, drawing context and surface of one embedding toolkit instance.
///
/// All operations run synchronously on the caller's thread. The only background work is bitmap
/// compilation, whose results are applied when bitmaps are next read (or on
/// [`drain_compiled`](Session::drain_compiled)).
pub struct Session {
    pub(crate) config: SessionConfig,
    /// Display scale factor, fixed for the session's lifetime
    pub(crate) scale_factor: f64,
    pub(crate) backend: Box<dyn RenderBackend>,
    pub(crate) layout: Box<dyn LayoutHost>,
    pub(crate) windows: Registry<WindowId, Window>,
    pub(crate) bitmaps: Registry<BitmapId, Bitmap>,
    pub(crate) contexts: Registry<ContextId, DrawingContext>,
    pub(crate) surfaces: Registry<SurfaceId, SurfaceSlot>,
    pub(crate) compiler: BitmapCompiler,
    pub(crate) config_store: ConfigStore,
}

impl Session {
    /// Creates a session with the root window (id 0) already in place.
    pub fn new(config: SessionConfig, backend: Box<dyn RenderBackend>) -> Self {
        let mut session = Self {
            scale_factor: config.display_scale_factor(),
            compiler: BitmapCompiler::new(config.compile_mode, config.worker_threads),
            config,
            backend,
            layout: Box::new(AssignedLayout),
            windows: Registry::new(),
            bitmaps: Registry::new(),
            contexts: Registry::new(),
            surfaces: Registry::new(),
            config_store: ConfigStore::default(),
        };

        let surface = session.allocate_surface(SurfaceSize::default()).ok();
        let root = Session::root_window(&session.config.root_class, surface);
        if session.windows.insert_at(WindowId::ROOT, root).is_err() {
            warn!("root window slot already taken");
        }

        debug!(
            "session started on {} (scale factor {})",
            session.backend.name(),
            session.scale_factor
        );
        session
    }

    /// Replaces the layout host used to read back effective z-indices.
    pub fn with_layout(mut self, layout: Box<dyn LayoutHost>) -> Self {
        self.layout = layout;
        self
    }

    /// Replaces the in-memory config store.
    pub fn with_config_store(mut self, store: ConfigStore) -> Self {
        self.config_store = store;
        self
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config_store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn backend(&self) -> &dyn RenderBackend {
        self.backend.as_ref()
    }

    /// Creates a surface holding a single reference.
    pub(crate) fn allocate_surface(&mut self, size: SurfaceSize) -> Result<SurfaceId> {
        let mut surface = self.backend.create_surface(size).map_err(|e| {
            warn!("{}: cannot create {}x{} surface: {}", self.backend.name(), size.width, size.height, e);
            BridgeError::SurfaceUnavailable(e.to_string())
        })?;
        *surface.attributes_mut() = GraphicsAttributes::window_baseline();

        Ok(self.surfaces.insert(SurfaceSlot::new(surface)))
    }

    /// Drops one reference, freeing the surface with the last one.
    pub(crate) fn release_surface(&mut self, id: SurfaceId) {
        let Some(slot) = self.surfaces.get_mut(id) else {
            return;
        };
        slot.refs = slot.refs.saturating_sub(1);
        if slot.refs == 0 {
            self.surfaces.remove(id);
        }
    }

    pub(crate) fn slot(&self, id: SurfaceId) -> Result<&SurfaceSlot> {
        self.surfaces.get(id).ok_or(BridgeError::Internal)
    }

    pub(crate) fn slot_mut(&mut self, id: SurfaceId) -> Result<&mut SurfaceSlot> {
        self.surfaces.get_mut(id).ok_or(BridgeError::Internal)
    }

    /// Number of live physical surfaces.
    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::null::NullBackend;
    use crate::window::WindowRequest;

    #[test]
    fn root_window_exists_from_the_start() {
        let s = Session::new(SessionConfig::default(), Box::new(NullBackend::new()));
        let root = s.window(WindowId::ROOT).unwrap();
        assert_eq!(root.container.class_list, SessionConfig::default().root_class);
        assert!(root.has_surface());
        assert_eq!(s.surface_count(), 1);
    }

    #[test]
    fn root_without_host_surface_still_exists() {
        let backend = NullBackend::new();
        backend.refuse_surfaces(true);
        let mut s = Session::new(SessionConfig::default(), Box::new(backend));
        assert!(!s.window(WindowId::ROOT).unwrap().has_surface());
        assert!(matches!(
            s.create_window(WindowRequest::Auto, true, true, "w"),
            Err(BridgeError::SurfaceUnavailable(_))
        ));
    }

    #[test]
    fn surfaces_are_freed_with_their_last_holder() {
        let mut s = Session::new(SessionConfig::default(), Box::new(NullBackend::new()));
        let w = s.create_window(WindowRequest::Auto, true, true, "w").unwrap();
        let ctx = s.create_window_context(w, 0.0, 0.0, 1.0, 1.0, 1.0).unwrap();
        assert_eq!(s.surface_count(), 2);

        s.destroy_window(w).unwrap();
        assert_eq!(s.surface_count(), 2);
        s.destroy_window_context(ctx).unwrap();
        assert_eq!(s.surface_count(), 1);
    }
}
