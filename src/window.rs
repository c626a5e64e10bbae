//! Window lifecycle, geometry, visibility and stacking.

use log::debug;

use crate::errors::{BridgeError, Result};
use crate::handle::{SurfaceId, WindowId};
use crate::render::{GraphicsAttributes, RectF, RgbaImage, SurfaceSize};
use crate::session::Session;

/// Host-side element a window is presented in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostContainer {
    pub class_list: String,
    pub visible: bool,
    /// Position relative to the window container, header offset included.
    pub rect: RectF,
    /// Last z-index assigned through the bridge.
    pub z_index: Option<i32>,
}

pub struct Window {
    pub container: HostContainer,
    pub(crate) surface: Option<SurfaceId>,
    /// Surface size in device pixels.
    pub pixel_size: SurfaceSize,
    snapshot: Option<RgbaImage>,
}

impl Window {
    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }
}

/// Host layout engine. Raising and lowering read stacking order back through it, so a host that
/// restyles containers on its own is taken into account.
pub trait LayoutHost {
    /// Effective (computed) `z-index` of a window's container, as a CSS value string.
    fn computed_z_index(&self, window: WindowId, container: &HostContainer) -> String;
}

/// Layout that reports exactly what the bridge assigned, `auto` otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssignedLayout;

impl LayoutHost for AssignedLayout {
    fn computed_z_index(&self, _window: WindowId, container: &HostContainer) -> String {
        match container.z_index {
            Some(z) => z.to_string(),
            None => "auto".to_string(),
        }
    }
}

/// Leading-integer parse in the manner of JavaScript's `parseInt(value, 10)`.
fn parse_leading_int(value: &str) -> Option<i32> {
    let s = value.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude: i64 = digits[..end].parse().unwrap_or(i64::MAX);
    let v = if negative { -magnitude } else { magnitude };
    Some(v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}

/// Requested id for [`Session::create_window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowRequest {
    Auto,
    Explicit(WindowId),
}

impl Session {
    pub(crate) fn root_window(class_list: &str, surface: Option<SurfaceId>) -> Window {
        Window {
            container: HostContainer {
                class_list: class_list.to_string(),
                visible: true,
                ..HostContainer::default()
            },
            surface,
            pixel_size: SurfaceSize::default(),
            snapshot: None,
        }
    }

    pub fn create_window(
        &mut self,
        request: WindowRequest,
        needs_surface: bool,
        visible: bool,
        class_list: &str,
    ) -> Result<WindowId> {
        if let WindowRequest::Explicit(id) = request {
            if id.is_root() {
                return Ok(WindowId::ROOT);
            }
            if self.windows.contains(id) {
                return Err(BridgeError::WindowExists(id));
            }
        }

        let surface = if needs_surface {
            Some(self.allocate_surface(SurfaceSize::default())?)
        } else {
            None
        };

        let window = Window {
            container: HostContainer {
                class_list: class_list.to_string(),
                visible,
                ..HostContainer::default()
            },
            surface,
            pixel_size: SurfaceSize::default(),
            snapshot: None,
        };

        let id = match request {
            WindowRequest::Auto => self.windows.insert(window),
            WindowRequest::Explicit(id) => match self.windows.insert_at(id, window) {
                Ok(()) => id,
                Err(_) => {
                    // A vacated slot with a newer generation.
                    if let Some(surface) = surface {
                        self.release_surface(surface);
                    }
                    return Err(BridgeError::WindowExists(id));
                }
            },
        };

        debug!("created window {} (surface: {})", id, needs_surface);
        Ok(id)
    }

    pub fn destroy_window(&mut self, id: WindowId) -> Result<()> {
        if id.is_root() {
            return Err(BridgeError::ReservedWindow);
        }
        let window = self.windows.remove(id).ok_or(BridgeError::InvalidWindowId(id))?;
        if let Some(surface) = window.surface {
            self.release_surface(surface);
        }

        debug!("destroyed window {}", id);
        Ok(())
    }

    pub fn window(&self, id: WindowId) -> Result<&Window> {
        self.windows.get(id).ok_or(BridgeError::InvalidWindowId(id))
    }

    fn window_mut(&mut self, id: WindowId) -> Result<&mut Window> {
        self.windows.get_mut(id).ok_or(BridgeError::InvalidWindowId(id))
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.windows.keys()
    }

    pub fn set_window_visibility(&mut self, id: WindowId, visible: bool) -> Result<()> {
        self.window_mut(id)?.container.visible = visible;
        Ok(())
    }

    /// Positions the window and resizes its surface to the logical size times the display scale.
    ///
    /// Resizing clears the surface and resets its attributes and frame stack; contexts still
    /// open on the window lose their nesting.
    pub fn set_window_rect(&mut self, id: WindowId, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
        let header = self.config.header_height;
        let scale = self.scale_factor;

        let window = self.window_mut(id)?;
        window.container.rect = RectF::new(x, y + header, width, height);

        let Some(surface_id) = window.surface else {
            return Ok(());
        };

        let size = SurfaceSize::scaled(width, height, scale);
        window.pixel_size = size;
        window.snapshot = if size.is_empty() {
            None
        } else {
            Some(RgbaImage::new(size.width, size.height))
        };

        let slot = self.slot_mut(surface_id)?;
        slot.surface.resize(size);
        *slot.surface.attributes_mut() = GraphicsAttributes::window_baseline();
        slot.reset_frames();
        Ok(())
    }

    pub fn set_window_z_index(&mut self, id: WindowId, z: i32) -> Result<()> {
        self.window_mut(id)?.container.z_index = Some(z);
        Ok(())
    }

    /// Places the window above every other window's effective z-index.
    ///
    /// Fails with [`BridgeError::ZOrderExhausted`] when a sibling already sits at `i32::MAX`.
    pub fn raise_window(&mut self, id: WindowId) -> Result<i32> {
        let z = self
            .other_z_indices(id)?
            .fold(0, i32::max)
            .checked_add(1)
            .ok_or(BridgeError::ZOrderExhausted(id))?;
        self.set_window_z_index(id, z)?;
        Ok(z)
    }

    /// Places the window below every other window's effective z-index.
    pub fn lower_window(&mut self, id: WindowId) -> Result<i32> {
        let z = self
            .other_z_indices(id)?
            .fold(0, i32::min)
            .checked_sub(1)
            .ok_or(BridgeError::ZOrderExhausted(id))?;
        self.set_window_z_index(id, z)?;
        Ok(z)
    }

    fn other_z_indices(&self, id: WindowId) -> Result<impl Iterator<Item = i32> + '_> {
        self.window(id)?;
        Ok(self
            .windows
            .iter()
            .filter(move |(other, _)| *other != id)
            .filter_map(move |(other, w)| parse_leading_int(&self.layout.computed_z_index(other, &w.container))))
    }

    /// Refreshes and returns the cached copy of the window's surface pixels.
    ///
    /// `None` while the window has no surface area.
    pub fn window_pixels(&mut self, id: WindowId) -> Result<Option<&RgbaImage>> {
        let window = self.window(id)?;
        let Some(surface_id) = window.surface else {
            return Err(BridgeError::NoSurface(id));
        };
        if window.pixel_size.is_empty() {
            return Ok(None);
        }

        let pixels = self.slot(surface_id)?.surface.read_pixels();
        let window = self.window_mut(id)?;
        window.snapshot = Some(pixels);
        Ok(window.snapshot.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::render::backends::null::NullBackend;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    fn session(ratio: f64) -> Session {
        let config = SessionConfig::builder()
            .device_pixel_ratio(ratio)
            .header_height(30.0)
            .build()
            .unwrap();
        Session::new(config, Box::new(NullBackend::new()))
    }

    #[test]
    fn parse_leading_int_follows_parse_int() {
        assert_eq!(parse_leading_int("12"), Some(12));
        assert_eq!(parse_leading_int(" -3px"), Some(-3));
        assert_eq!(parse_leading_int("auto"), None);
        assert_eq!(parse_leading_int(""), None);
        assert_eq!(parse_leading_int("-"), None);
    }

    #[test]
    fn first_window_is_one_and_surface_scales() {
        let mut s = session(2.0);
        let id = s.create_window(WindowRequest::Auto, true, true, "win").unwrap();
        assert_eq!(id.to_raw(), 1);

        s.set_window_rect(id, 0.0, 0.0, 100.0, 50.0).unwrap();
        let w = s.window(id).unwrap();
        assert_eq!(w.pixel_size, SurfaceSize::new(200, 100));
        assert_eq!(w.container.rect, RectF::new(0.0, 30.0, 100.0, 50.0));
        assert_eq!(s.window_pixels(id).unwrap().map(|p| p.pixels.len()), Some(200 * 100 * 4));
    }

    #[test]
    fn zero_size_drops_snapshot() {
        let mut s = session(1.0);
        let id = s.create_window(WindowRequest::Auto, true, true, "win").unwrap();
        s.set_window_rect(id, 0.0, 0.0, 0.0, 10.0).unwrap();
        assert!(s.window_pixels(id).unwrap().is_none());
    }

    #[test]
    fn explicit_ids() {
        let mut s = session(1.0);
        assert_eq!(
            s.create_window(WindowRequest::Explicit(WindowId::ROOT), true, true, "x").unwrap(),
            WindowId::ROOT
        );

        let five = WindowId::from_raw(5);
        assert_eq!(s.create_window(WindowRequest::Explicit(five), false, true, "x").unwrap(), five);
        assert!(matches!(
            s.create_window(WindowRequest::Explicit(five), false, true, "x"),
            Err(BridgeError::WindowExists(_))
        ));
    }

    #[test]
    fn root_window_cannot_be_destroyed() {
        let mut s = session(1.0);
        assert!(matches!(s.destroy_window(WindowId::ROOT), Err(BridgeError::ReservedWindow)));

        let id = s.create_window(WindowRequest::Auto, false, false, "w").unwrap();
        s.destroy_window(id).unwrap();
        assert!(matches!(s.window(id), Err(BridgeError::InvalidWindowId(_))));
        assert!(matches!(s.destroy_window(id), Err(BridgeError::InvalidWindowId(_))));
    }

    #[test]
    fn raise_and_lower_use_effective_z_index() {
        let mut s = session(1.0);
        let a = s.create_window(WindowRequest::Auto, false, true, "w").unwrap();
        let b = s.create_window(WindowRequest::Auto, false, true, "w").unwrap();
        let c = s.create_window(WindowRequest::Auto, false, true, "w").unwrap();
        s.set_window_z_index(a, 5).unwrap();
        s.set_window_z_index(b, -2).unwrap();

        assert_eq!(s.raise_window(c).unwrap(), 6);
        assert_eq!(s.lower_window(a).unwrap(), -3);
        assert_eq!(s.window(a).unwrap().container.z_index, Some(-3));
    }

    #[test]
    fn raise_without_numeric_neighbours_starts_at_zero() {
        let mut s = session(1.0);
        let a = s.create_window(WindowRequest::Auto, false, true, "w").unwrap();
        assert_eq!(s.raise_window(a).unwrap(), 1);
        assert_eq!(s.lower_window(a).unwrap(), -1);
    }

    #[test]
    fn raise_next_to_extreme_sibling_fails_and_keeps_z_index() {
        let mut s = session(1.0);
        let a = s.create_window(WindowRequest::Auto, false, true, "w").unwrap();
        let b = s.create_window(WindowRequest::Auto, false, true, "w").unwrap();
        s.set_window_z_index(a, i32::MAX).unwrap();
        s.set_window_z_index(b, 3).unwrap();

        assert!(matches!(s.raise_window(b), Err(BridgeError::ZOrderExhausted(id)) if id == b));
        assert_eq!(s.window(b).unwrap().container.z_index, Some(3));

        s.set_window_z_index(a, i32::MIN).unwrap();
        assert!(matches!(s.lower_window(b), Err(BridgeError::ZOrderExhausted(_))));
        assert_eq!(s.raise_window(b).unwrap(), 1);
    }

    struct OverridingLayout(Rc<RefCell<HashMap<WindowId, String>>>);

    impl LayoutHost for OverridingLayout {
        fn computed_z_index(&self, window: WindowId, container: &HostContainer) -> String {
            self.0
                .borrow()
                .get(&window)
                .cloned()
                .unwrap_or_else(|| AssignedLayout.computed_z_index(window, container))
        }
    }

    #[test]
    fn host_restyling_is_observed() {
        let overrides = Rc::new(RefCell::new(HashMap::new()));
        let mut s = session(1.0).with_layout(Box::new(OverridingLayout(overrides.clone())));
        let a = s.create_window(WindowRequest::Auto, false, true, "w").unwrap();
        let b = s.create_window(WindowRequest::Auto, false, true, "w").unwrap();
        s.set_window_z_index(a, 1).unwrap();
        overrides.borrow_mut().insert(a, "40".to_string());

        assert_eq!(s.raise_window(b).unwrap(), 41);
    }
}
