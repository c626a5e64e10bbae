//! C ABI over an opaque [`CanvasBridge`] pointer.
//!
//! Handles cross as `u64`; failures are logged at `error` and reported as `u64::MAX`, `-1` or
//! `false`. Foreign memory is passed as a base pointer plus length, with offsets into it.
//!
//! # Safety
//!
//! Every function taking a `*mut CanvasBridge` expects a pointer obtained from
//! [`canvas_bridge_new`] and not yet passed to [`canvas_bridge_free`], used from one thread at
//! a time. Buffers must be valid for the given lengths and strings must be NUL-terminated.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::slice;

use log::error;

use crate::config::SessionConfig;
use crate::draw::read_points;
use crate::errors::Result;
use crate::handle::{BitmapId, ContextId, WindowId};
use crate::render::{Color, FillRule, LineCap, LineJoin, RectF, RenderBackend};
use crate::session::Session;
use crate::storage::ConfigStore;
use crate::window::WindowRequest;

/// Returned for failed handle-producing calls.
pub const INVALID_HANDLE: u64 = u64::MAX;
/// Pattern argument meaning "no bitmap".
pub const NO_BITMAP: u64 = u64::MAX;

pub struct CanvasBridge {
    session: Session,
    #[cfg(feature = "backend_skia")]
    fonts: crate::render::backends::skia::SkiaBackend,
}

unsafe fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

unsafe fn bytes<'a>(ptr: *const u8, len: usize) -> &'a [u8] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        slice::from_raw_parts(ptr, len)
    }
}

unsafe fn bytes_mut<'a>(ptr: *mut u8, len: usize) -> &'a mut [u8] {
    if ptr.is_null() || len == 0 {
        &mut []
    } else {
        slice::from_raw_parts_mut(ptr, len)
    }
}

/// Runs `f` on the session, logging and mapping failures to `fallback`.
unsafe fn call<T>(
    bridge: *mut CanvasBridge,
    what: &str,
    fallback: T,
    f: impl FnOnce(&mut Session) -> Result<T>,
) -> T {
    let Some(bridge) = bridge.as_mut() else {
        error!("{}: null bridge", what);
        return fallback;
    };
    match f(&mut bridge.session) {
        Ok(v) => v,
        Err(e) => {
            error!("{}: {}", what, e);
            fallback
        }
    }
}

/// Copies `data` to `out` when it fits. Returns the full length either way, `-1` for no data.
fn copy_out(data: Option<&[u8]>, out: &mut [u8]) -> i64 {
    let Some(data) = data else {
        return -1;
    };
    if data.len() <= out.len() {
        out[..data.len()].copy_from_slice(data);
    }
    data.len() as i64
}

fn pattern_arg(raw: u64) -> Option<BitmapId> {
    (raw != NO_BITMAP).then(|| BitmapId::from_raw(raw))
}

#[no_mangle]
pub extern "C" fn canvas_bridge_init_logging() {
    let _ = env_logger::try_init();
}

/// Creates a bridge from a JSON [`SessionConfig`], or the defaults when `config_json` is null.
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_new(config_json: *const c_char) -> *mut CanvasBridge {
    let config = match str_arg(config_json) {
        None => SessionConfig::default(),
        Some(json) => match SessionConfig::from_json(json) {
            Ok(config) => config,
            Err(e) => {
                error!("canvas_bridge_new: {}", e);
                return std::ptr::null_mut();
            }
        },
    };

    #[cfg(feature = "backend_skia")]
    let bridge = {
        let fonts = crate::render::backends::skia::SkiaBackend::new();
        let backend: Box<dyn RenderBackend> = Box::new(fonts.clone());
        CanvasBridge {
            session: Session::new(config, backend),
            fonts,
        }
    };
    #[cfg(not(feature = "backend_skia"))]
    let bridge = {
        let backend: Box<dyn RenderBackend> = Box::new(crate::render::backends::null::NullBackend::new());
        CanvasBridge {
            session: Session::new(config, backend),
        }
    };

    Box::into_raw(Box::new(bridge))
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_free(bridge: *mut CanvasBridge) {
    if !bridge.is_null() {
        drop(Box::from_raw(bridge));
    }
}

#[cfg(feature = "backend_skia")]
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_register_font(
    bridge: *mut CanvasBridge,
    family: *const c_char,
    data: *const u8,
    len: usize,
) -> bool {
    let (Some(bridge), Some(family)) = (bridge.as_ref(), str_arg(family)) else {
        return false;
    };
    match bridge.fonts.register_font(family, bytes(data, len).to_vec()) {
        Ok(()) => true,
        Err(e) => {
            error!("canvas_bridge_register_font: {}", e);
            false
        }
    }
}

/// Opens a persistent config store at `path`, replacing the in-memory one.
#[cfg(feature = "sqlite_config_store")]
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_config_open(bridge: *mut CanvasBridge, path: *const c_char) -> bool {
    let Some(path) = str_arg(path) else {
        return false;
    };
    call(bridge, "canvas_bridge_config_open", false, |s| {
        s.config_store = ConfigStore::open(path)?;
        Ok(true)
    })
}

/* Windows */

/// `id < 0` allocates the next free window id.
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_create_window(
    bridge: *mut CanvasBridge,
    id: i64,
    needs_surface: bool,
    visible: bool,
    class_list: *const c_char,
) -> u64 {
    let request = match u64::try_from(id) {
        Ok(raw) => WindowRequest::Explicit(WindowId::from_raw(raw)),
        Err(_) => WindowRequest::Auto,
    };
    let class_list = str_arg(class_list).unwrap_or_default();
    call(bridge, "canvas_bridge_create_window", INVALID_HANDLE, |s| {
        s.create_window(request, needs_surface, visible, class_list).map(WindowId::to_raw)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_destroy_window(bridge: *mut CanvasBridge, id: u64) -> bool {
    call(bridge, "canvas_bridge_destroy_window", false, |s| {
        s.destroy_window(WindowId::from_raw(id)).map(|_| true)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_set_window_visibility(bridge: *mut CanvasBridge, id: u64, visible: bool) -> bool {
    call(bridge, "canvas_bridge_set_window_visibility", false, |s| {
        s.set_window_visibility(WindowId::from_raw(id), visible).map(|_| true)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_set_window_rect(
    bridge: *mut CanvasBridge,
    id: u64,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
) -> bool {
    call(bridge, "canvas_bridge_set_window_rect", false, |s| {
        s.set_window_rect(WindowId::from_raw(id), x, y, width, height).map(|_| true)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_raise_window(bridge: *mut CanvasBridge, id: u64) -> i32 {
    call(bridge, "canvas_bridge_raise_window", -1, |s| s.raise_window(WindowId::from_raw(id)))
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_lower_window(bridge: *mut CanvasBridge, id: u64) -> i32 {
    call(bridge, "canvas_bridge_lower_window", -1, |s| s.lower_window(WindowId::from_raw(id)))
}

/// Copies a window's device pixels (straight RGBA) to `out`. Returns the byte length needed.
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_window_pixels(bridge: *mut CanvasBridge, id: u64, out: *mut u8, cap: usize) -> i64 {
    let out = bytes_mut(out, cap);
    call(bridge, "canvas_bridge_window_pixels", -1, |s| {
        let pixels = s.window_pixels(WindowId::from_raw(id))?;
        Ok(copy_out(pixels.map(|p| p.pixels.as_slice()), out))
    })
}

/* Bitmaps */

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_create_bitmap(
    bridge: *mut CanvasBridge,
    memory: *const u8,
    memory_len: usize,
    offset: usize,
    width: u32,
    height: u32,
    scale: f64,
) -> u64 {
    let memory = bytes(memory, memory_len);
    call(bridge, "canvas_bridge_create_bitmap", INVALID_HANDLE, |s| {
        s.create_bitmap(memory, offset, width, height, scale).map(BitmapId::to_raw)
    })
}

#[allow(clippy::too_many_arguments)]
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_set_bitmap_data(
    bridge: *mut CanvasBridge,
    id: u64,
    memory: *const u8,
    memory_len: usize,
    offset: usize,
    width: u32,
    height: u32,
    scale: f64,
) -> bool {
    let memory = bytes(memory, memory_len);
    call(bridge, "canvas_bridge_set_bitmap_data", false, |s| {
        s.set_bitmap_data(BitmapId::from_raw(id), memory, offset, width, height, scale)
            .map(|_| true)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_get_bitmap_data(
    bridge: *mut CanvasBridge,
    id: u64,
    memory: *mut u8,
    memory_len: usize,
    offset: usize,
) -> bool {
    let memory = bytes_mut(memory, memory_len);
    call(bridge, "canvas_bridge_get_bitmap_data", false, |s| {
        s.get_bitmap_data(BitmapId::from_raw(id), memory, offset).map(|_| true)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_destroy_bitmap(bridge: *mut CanvasBridge, id: u64) -> bool {
    call(bridge, "canvas_bridge_destroy_bitmap", false, |s| {
        s.destroy_bitmap(BitmapId::from_raw(id)).map(|_| true)
    })
}

/// PNG encoding of a bitmap. Returns the byte length needed, `-1` on failure.
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_bitmap_png(bridge: *mut CanvasBridge, id: u64, out: *mut u8, cap: usize) -> i64 {
    let out = bytes_mut(out, cap);
    call(bridge, "canvas_bridge_bitmap_png", -1, |s| {
        let png = s.bitmap_png(BitmapId::from_raw(id))?;
        Ok(copy_out(Some(png.as_slice()), out))
    })
}

/// Waits for outstanding bitmap compiles. Returns how many were installed.
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_flush_compiles(bridge: *mut CanvasBridge) -> i64 {
    call(bridge, "canvas_bridge_flush_compiles", -1, |s| {
        s.run_deferred_compiles();
        Ok(s.flush_compiles() as i64)
    })
}

/* Contexts */

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_create_window_context(
    bridge: *mut CanvasBridge,
    window: u64,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    scale: f64,
) -> u64 {
    call(bridge, "canvas_bridge_create_window_context", INVALID_HANDLE, |s| {
        s.create_window_context(WindowId::from_raw(window), x, y, width, height, scale)
            .map(ContextId::to_raw)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_create_memory_context(bridge: *mut CanvasBridge, bitmap: u64, scale: f64) -> u64 {
    call(bridge, "canvas_bridge_create_memory_context", INVALID_HANDLE, |s| {
        s.create_memory_context(BitmapId::from_raw(bitmap), scale).map(ContextId::to_raw)
    })
}

/// Destroys a window or memory context.
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_destroy_context(bridge: *mut CanvasBridge, id: u64) -> bool {
    call(bridge, "canvas_bridge_destroy_context", false, |s| {
        s.destroy_context(ContextId::from_raw(id)).map(|_| true)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_clip_rect(
    bridge: *mut CanvasBridge,
    ctx: u64,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
) -> bool {
    call(bridge, "canvas_bridge_clip_rect", false, |s| {
        s.clip_rect(ContextId::from_raw(ctx), RectF::new(x, y, width, height)).map(|_| true)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_destroy_clip(bridge: *mut CanvasBridge, ctx: u64) -> bool {
    call(bridge, "canvas_bridge_destroy_clip", false, |s| {
        s.destroy_clip(ContextId::from_raw(ctx)).map(|_| true)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_rotate_at_point(bridge: *mut CanvasBridge, ctx: u64, x: f64, y: f64, degrees: f64) -> bool {
    call(bridge, "canvas_bridge_rotate_at_point", false, |s| {
        s.rotate_at_point(ContextId::from_raw(ctx), x, y, degrees).map(|_| true)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_clear_rotation(bridge: *mut CanvasBridge, ctx: u64) -> bool {
    call(bridge, "canvas_bridge_clear_rotation", false, |s| {
        s.clear_rotation(ContextId::from_raw(ctx)).map(|_| true)
    })
}

/* Attributes */

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_set_font(bridge: *mut CanvasBridge, ctx: u64, font: *const c_char) -> bool {
    let Some(font) = str_arg(font) else {
        return false;
    };
    call(bridge, "canvas_bridge_set_font", false, |s| {
        s.set_font(ContextId::from_raw(ctx), font).map(|_| true)
    })
}

/// `join` and `cap` use the toolkit's codes, unknown ones select the defaults; `dashes` holds
/// `dash_count` signed lengths.
#[allow(clippy::too_many_arguments)]
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_set_pen(
    bridge: *mut CanvasBridge,
    ctx: u64,
    color: u32,
    width: f64,
    join: i32,
    cap: i32,
    dashes: *const i8,
    dash_count: usize,
    pattern: u64,
) -> bool {
    let dashes: &[i8] = if dashes.is_null() || dash_count == 0 {
        &[]
    } else {
        slice::from_raw_parts(dashes, dash_count)
    };
    call(bridge, "canvas_bridge_set_pen", false, |s| {
        s.set_pen(
            ContextId::from_raw(ctx),
            Color::from_packed(color),
            width,
            LineJoin::from_code(join),
            LineCap::from_code(cap),
            dashes,
            pattern_arg(pattern),
        )
        .map(|_| true)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_set_brush(bridge: *mut CanvasBridge, ctx: u64, color: u32, pattern: u64) -> bool {
    call(bridge, "canvas_bridge_set_brush", false, |s| {
        s.set_brush(ContextId::from_raw(ctx), Color::from_packed(color), pattern_arg(pattern))
            .map(|_| true)
    })
}

/* Drawing */

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_clear(bridge: *mut CanvasBridge, ctx: u64, width: f64, height: f64, color: u32) -> bool {
    call(bridge, "canvas_bridge_clear", false, |s| {
        s.clear(ContextId::from_raw(ctx), width, height, Color::from_packed(color)).map(|_| true)
    })
}

#[allow(clippy::too_many_arguments)]
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_draw_rect(
    bridge: *mut CanvasBridge,
    ctx: u64,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    fill: bool,
    stroke: bool,
) -> bool {
    call(bridge, "canvas_bridge_draw_rect", false, |s| {
        s.draw_rect(ContextId::from_raw(ctx), RectF::new(x, y, width, height), fill, stroke)
            .map(|_| true)
    })
}

#[allow(clippy::too_many_arguments)]
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_draw_rounded_rect(
    bridge: *mut CanvasBridge,
    ctx: u64,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    radius: f64,
    fill: bool,
    stroke: bool,
) -> bool {
    call(bridge, "canvas_bridge_draw_rounded_rect", false, |s| {
        s.draw_rounded_rect(ContextId::from_raw(ctx), RectF::new(x, y, width, height), radius, fill, stroke)
            .map(|_| true)
    })
}

#[allow(clippy::too_many_arguments)]
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_draw_ellipse(
    bridge: *mut CanvasBridge,
    ctx: u64,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    fill: bool,
    stroke: bool,
) -> bool {
    call(bridge, "canvas_bridge_draw_ellipse", false, |s| {
        s.draw_ellipse(ContextId::from_raw(ctx), RectF::new(x, y, width, height), fill, stroke)
            .map(|_| true)
    })
}

#[allow(clippy::too_many_arguments)]
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_draw_arc(
    bridge: *mut CanvasBridge,
    ctx: u64,
    x: f64,
    y: f64,
    radius: f64,
    start: f64,
    end: f64,
    fill: bool,
    stroke: bool,
) -> bool {
    call(bridge, "canvas_bridge_draw_arc", false, |s| {
        s.draw_arc(ContextId::from_raw(ctx), x, y, radius, start, end, fill, stroke)
            .map(|_| true)
    })
}

#[allow(clippy::too_many_arguments)]
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_draw_elliptic_arc(
    bridge: *mut CanvasBridge,
    ctx: u64,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    start_degrees: f64,
    end_degrees: f64,
    fill: bool,
    stroke: bool,
) -> bool {
    call(bridge, "canvas_bridge_draw_elliptic_arc", false, |s| {
        let rect = RectF::new(x, y, width, height);
        s.draw_elliptic_arc(ContextId::from_raw(ctx), rect, start_degrees, end_degrees, fill, stroke)
            .map(|_| true)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_draw_point(bridge: *mut CanvasBridge, ctx: u64, x: f64, y: f64) -> bool {
    call(bridge, "canvas_bridge_draw_point", false, |s| {
        s.draw_point(ContextId::from_raw(ctx), x, y).map(|_| true)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_draw_line(
    bridge: *mut CanvasBridge,
    ctx: u64,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
) -> bool {
    call(bridge, "canvas_bridge_draw_line", false, |s| {
        s.draw_line(ContextId::from_raw(ctx), x1, y1, x2, y2).map(|_| true)
    })
}

/// `count` points stored as little-endian `i32` pairs at `memory + offset`.
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_draw_lines(
    bridge: *mut CanvasBridge,
    ctx: u64,
    memory: *const u8,
    memory_len: usize,
    offset: usize,
    count: usize,
) -> bool {
    let memory = bytes(memory, memory_len);
    call(bridge, "canvas_bridge_draw_lines", false, |s| {
        let points = read_points(memory, offset, count)?;
        s.draw_lines(ContextId::from_raw(ctx), &points).map(|_| true)
    })
}

/// As [`canvas_bridge_draw_lines`]; `odd_even` selects the even-odd fill rule.
#[allow(clippy::too_many_arguments)]
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_draw_polygon(
    bridge: *mut CanvasBridge,
    ctx: u64,
    memory: *const u8,
    memory_len: usize,
    offset: usize,
    count: usize,
    odd_even: bool,
    fill: bool,
    stroke: bool,
) -> bool {
    let memory = bytes(memory, memory_len);
    let rule = if odd_even { FillRule::EvenOdd } else { FillRule::NonZero };
    call(bridge, "canvas_bridge_draw_polygon", false, |s| {
        let points = read_points(memory, offset, count)?;
        s.draw_polygon(ContextId::from_raw(ctx), &points, rule, fill, stroke).map(|_| true)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_draw_bitmap(bridge: *mut CanvasBridge, ctx: u64, bitmap: u64, x: f64, y: f64) -> bool {
    call(bridge, "canvas_bridge_draw_bitmap", false, |s| {
        s.draw_bitmap(ContextId::from_raw(ctx), BitmapId::from_raw(bitmap), x, y).map(|_| true)
    })
}

#[allow(clippy::too_many_arguments)]
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_blit(
    bridge: *mut CanvasBridge,
    src: u64,
    dst: u64,
    sx: f64,
    sy: f64,
    width: f64,
    height: f64,
    dx: f64,
    dy: f64,
) -> bool {
    call(bridge, "canvas_bridge_blit", false, |s| {
        s.blit(ContextId::from_raw(src), ContextId::from_raw(dst), sx, sy, width, height, dx, dy)
            .map(|_| true)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_draw_text(
    bridge: *mut CanvasBridge,
    ctx: u64,
    text: *const c_char,
    x: f64,
    y: f64,
    color: u32,
) -> bool {
    let Some(text) = str_arg(text) else {
        return false;
    };
    call(bridge, "canvas_bridge_draw_text", false, |s| {
        s.draw_text(ContextId::from_raw(ctx), text, x, y, Color::from_packed(color)).map(|_| true)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_measure_text(bridge: *mut CanvasBridge, text: *const c_char, font: *const c_char) -> i32 {
    let (Some(text), Some(font)) = (str_arg(text), str_arg(font)) else {
        return -1;
    };
    call(bridge, "canvas_bridge_measure_text", -1, |s| Ok(s.measure_text(text, font)))
}

/* Cursor */

/// Writes the CSS cursor value for a stock cursor index (NUL-terminated when it fits).
/// Returns the length without the terminator, `-1` for indices outside the stock table.
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_stock_cursor(bridge: *mut CanvasBridge, index: i32, out: *mut u8, cap: usize) -> i64 {
    let out = bytes_mut(out, cap);
    call(bridge, "canvas_bridge_stock_cursor", -1, |s| {
        let webkit = s.config().webkit;
        let Some(stock) = crate::cursor::StockCursor::from_index(index) else {
            return Ok(-1);
        };
        let mut css = stock.css(webkit).into_bytes();
        let len = css.len() as i64;
        css.push(0);
        copy_out(Some(css.as_slice()), out);
        Ok(len)
    })
}

/* Config store */

unsafe fn config<T>(
    bridge: *mut CanvasBridge,
    fallback: T,
    f: impl FnOnce(&ConfigStore) -> T,
) -> T {
    match bridge.as_ref() {
        Some(bridge) => f(bridge.session.config_store()),
        None => fallback,
    }
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_config_has_entry(bridge: *mut CanvasBridge, key: *const c_char) -> bool {
    let Some(key) = str_arg(key) else { return false };
    config(bridge, false, |c| c.has_entry(key))
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_config_has_group(bridge: *mut CanvasBridge, prefix: *const c_char) -> bool {
    let Some(prefix) = str_arg(prefix) else { return false };
    config(bridge, false, |c| c.has_group(prefix))
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_config_entry_count(bridge: *mut CanvasBridge, prefix: *const c_char, recurse: bool) -> i64 {
    let Some(prefix) = str_arg(prefix) else { return 0 };
    config(bridge, 0, |c| c.entry_count(prefix, recurse) as i64)
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_config_group_count(bridge: *mut CanvasBridge, prefix: *const c_char, recurse: bool) -> i64 {
    let Some(prefix) = str_arg(prefix) else { return 0 };
    config(bridge, 0, |c| c.group_count(prefix, recurse) as i64)
}

/// Writes the `index`-th entry key directly below `prefix`. Returns the key length, `-1` when
/// there is none.
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_config_entry_at(
    bridge: *mut CanvasBridge,
    prefix: *const c_char,
    index: usize,
    out: *mut u8,
    cap: usize,
) -> i64 {
    let Some(prefix) = str_arg(prefix) else { return -1 };
    let out = bytes_mut(out, cap);
    config(bridge, -1, |c| {
        let key = c.entry_at(prefix, index);
        copy_out(key.as_deref().map(str::as_bytes), out)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_config_group_at(
    bridge: *mut CanvasBridge,
    prefix: *const c_char,
    index: usize,
    out: *mut u8,
    cap: usize,
) -> i64 {
    let Some(prefix) = str_arg(prefix) else { return -1 };
    let out = bytes_mut(out, cap);
    config(bridge, -1, |c| {
        let group = c.group_at(prefix, index);
        copy_out(group.as_deref().map(str::as_bytes), out)
    })
}

/// Writes the value stored at `key`. Returns its length, `-1` when absent.
#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_config_get_entry(
    bridge: *mut CanvasBridge,
    key: *const c_char,
    out: *mut u8,
    cap: usize,
) -> i64 {
    let Some(key) = str_arg(key) else { return -1 };
    let out = bytes_mut(out, cap);
    config(bridge, -1, |c| {
        let value = c.get_entry(key);
        copy_out(value.as_deref().map(str::as_bytes), out)
    })
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_config_set_entry(bridge: *mut CanvasBridge, key: *const c_char, value: *const c_char) -> bool {
    let (Some(key), Some(value)) = (str_arg(key), str_arg(value)) else {
        return false;
    };
    config(bridge, false, |c| c.set_entry(key, value))
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_config_remove_entry(bridge: *mut CanvasBridge, key: *const c_char) -> bool {
    let Some(key) = str_arg(key) else { return false };
    config(bridge, false, |c| c.remove_entry(key))
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_config_remove_group(bridge: *mut CanvasBridge, prefix: *const c_char) -> bool {
    let Some(prefix) = str_arg(prefix) else { return false };
    config(bridge, false, |c| c.remove_group(prefix))
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_config_clear(bridge: *mut CanvasBridge) {
    config(bridge, (), |c| c.clear())
}

#[no_mangle]
pub unsafe extern "C" fn canvas_bridge_config_rename_group(bridge: *mut CanvasBridge, old: *const c_char, new: *const c_char) -> bool {
    let (Some(old), Some(new)) = (str_arg(old), str_arg(new)) else {
        return false;
    };
    config(bridge, false, |c| c.rename_group(old, new))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompileMode;
    use crate::render::backends::null::NullBackend;
    use std::ffi::CString;
    use std::ptr;

    /// Bridge over a recording backend, for checking what the entry points issue.
    fn recording_bridge() -> (*mut CanvasBridge, NullBackend) {
        let backend = NullBackend::new();
        let config = SessionConfig::builder()
            .compile_mode(CompileMode::Deferred)
            .build()
            .unwrap();
        let bridge = CanvasBridge {
            session: Session::new(config, Box::new(backend.clone())),
            #[cfg(feature = "backend_skia")]
            fonts: crate::render::backends::skia::SkiaBackend::new(),
        };
        (Box::into_raw(Box::new(bridge)), backend)
    }

    /// Opens an initialized context on a new 100x100 window and empties the journal.
    unsafe fn drawing_context(b: *mut CanvasBridge, backend: &NullBackend) -> u64 {
        let w = canvas_bridge_create_window(b, -1, true, true, ptr::null());
        assert!(canvas_bridge_set_window_rect(b, w, 0.0, 0.0, 100.0, 100.0));
        let ctx = canvas_bridge_create_window_context(b, w, 0.0, 0.0, 100.0, 100.0, 1.0);
        assert_ne!(ctx, INVALID_HANDLE);
        assert!(canvas_bridge_draw_point(b, ctx, 0.0, 0.0));
        backend.clear_operations();
        ctx
    }

    fn point_memory(offset: usize, points: &[(i32, i32)]) -> Vec<u8> {
        let mut memory = vec![0xAA; offset];
        for (x, y) in points {
            memory.extend_from_slice(&x.to_le_bytes());
            memory.extend_from_slice(&y.to_le_bytes());
        }
        memory
    }

    unsafe fn attributes(b: *mut CanvasBridge, ctx: u64) -> crate::render::GraphicsAttributes {
        (*b).session
            .context_attributes(ContextId::from_raw(ctx))
            .unwrap()
            .clone()
    }

    #[test]
    fn pen_codes_and_dashes_cross_the_abi() {
        let (b, backend) = recording_bridge();
        unsafe {
            let ctx = drawing_context(b, &backend);
            let dashes = [4i8, 2];
            assert!(canvas_bridge_set_pen(b, ctx, 0xFF0000FF, 3.0, 1, 2, dashes.as_ptr(), dashes.len(), NO_BITMAP));
            let attrs = attributes(b, ctx);
            assert_eq!(attrs.line_join, LineJoin::Bevel);
            assert_eq!(attrs.line_cap, LineCap::Square);
            assert_eq!(attrs.dash, vec![4.0, 2.0]);

            assert!(canvas_bridge_draw_line(b, ctx, 1.0, 2.0, 3.0, 4.0));
            assert_eq!(backend.operations(), vec!["s1: stroke w=3 rgba(255,0,0,1) M 1 2 L 3 4"]);

            // Unknown and negative codes fall back to the defaults; a negative dash is ignored.
            let bad = [-1i8];
            assert!(canvas_bridge_set_pen(b, ctx, 0xFF0000FF, -2.0, -1, 9, bad.as_ptr(), bad.len(), NO_BITMAP));
            let attrs = attributes(b, ctx);
            assert_eq!(attrs.line_join, LineJoin::Round);
            assert_eq!(attrs.line_cap, LineCap::Butt);
            assert_eq!(attrs.line_width, 3.0);
            assert_eq!(attrs.dash, vec![4.0, 2.0]);

            assert!(canvas_bridge_set_pen(b, ctx, 0xFF0000FF, 1.0, i32::MIN, -3, ptr::null(), 5, NO_BITMAP));
            let attrs = attributes(b, ctx);
            assert_eq!(attrs.line_join, LineJoin::Round);
            assert!(attrs.dash.is_empty());

            assert!(!canvas_bridge_set_pen(b, INVALID_HANDLE, 0, 1.0, 0, 0, ptr::null(), 0, NO_BITMAP));
            canvas_bridge_free(b);
        }
    }

    #[test]
    fn point_buffers_are_read_at_offset() {
        let (b, backend) = recording_bridge();
        unsafe {
            let ctx = drawing_context(b, &backend);
            let memory = point_memory(4, &[(0, 0), (4, 0), (0, 4)]);

            assert!(canvas_bridge_draw_polygon(b, ctx, memory.as_ptr(), memory.len(), 4, 3, true, true, false));
            assert!(canvas_bridge_draw_lines(b, ctx, memory.as_ptr(), memory.len(), 4, 2));
            assert_eq!(
                backend.operations(),
                vec![
                    "s1: fill EvenOdd rgba(0,0,0,1) M 0 0 L 4 0 L 0 4 Z",
                    "s1: stroke w=1 rgba(0,0,0,1) M 0 0 L 4 0",
                ]
            );
            backend.clear_operations();

            // Reading past the buffer or through a null pointer draws nothing.
            assert!(!canvas_bridge_draw_lines(b, ctx, memory.as_ptr(), memory.len(), 4, 4));
            assert!(!canvas_bridge_draw_polygon(b, ctx, memory.as_ptr(), memory.len(), 8, 3, false, true, true));
            assert!(!canvas_bridge_draw_lines(b, ctx, ptr::null(), 64, 0, 2));
            assert!(!canvas_bridge_draw_polygon(b, ctx, ptr::null(), 0, 0, 1, false, true, false));
            assert!(canvas_bridge_draw_lines(b, ctx, ptr::null(), 0, 0, 0));
            assert!(backend.operations().is_empty());
            canvas_bridge_free(b);
        }
    }

    #[test]
    fn elliptic_arc_fills_the_pie_and_strokes_the_arc() {
        let (b, backend) = recording_bridge();
        unsafe {
            let ctx = drawing_context(b, &backend);
            assert!(canvas_bridge_draw_elliptic_arc(b, ctx, 0.0, 0.0, 20.0, 10.0, 0.0, 90.0, true, true));
            let ops = backend.operations();
            assert_eq!(ops.len(), 2);
            assert!(ops[0].starts_with("s1: fill NonZero rgba(0,0,0,1) M 20 5 C"));
            assert!(ops[0].ends_with("L 10 5"));
            assert!(ops[1].starts_with("s1: stroke w=1"));
            assert!(!ops[1].ends_with("L 10 5"));

            assert!(!canvas_bridge_draw_elliptic_arc(b, 12345, 0.0, 0.0, 1.0, 1.0, 0.0, 90.0, true, true));
            canvas_bridge_free(b);
        }
    }

    #[test]
    fn bitmap_data_in_and_out() {
        let (b, backend) = recording_bridge();
        unsafe {
            let ctx = drawing_context(b, &backend);
            let red = [255u8, 0, 0, 255, 255, 0, 0, 255];
            let bmp = canvas_bridge_create_bitmap(b, red.as_ptr(), red.len(), 0, 2, 1, 1.0);
            assert_ne!(bmp, INVALID_HANDLE);

            let mut memory = [0u8; 12];
            memory[8..].copy_from_slice(&[0, 0, 255, 255]);
            assert!(canvas_bridge_set_bitmap_data(b, bmp, memory.as_ptr(), memory.len(), 8, 1, 1, 1.0));
            assert!(!canvas_bridge_set_bitmap_data(b, bmp, memory.as_ptr(), memory.len(), 9, 1, 1, 1.0));
            assert!(!canvas_bridge_set_bitmap_data(b, bmp, ptr::null(), 0, 0, 1, 1, 1.0));

            let mut out = [0u8; 8];
            assert!(canvas_bridge_get_bitmap_data(b, bmp, out.as_mut_ptr(), out.len(), 4));
            assert_eq!(&out[4..], &[0, 0, 255, 255]);
            assert!(!canvas_bridge_get_bitmap_data(b, bmp, ptr::null_mut(), 0, 0));

            assert_eq!(canvas_bridge_flush_compiles(b), 1);
            assert!(canvas_bridge_draw_bitmap(b, ctx, bmp, 5.0, 6.0));
            assert_eq!(backend.operations(), vec!["s1: image 1x1 src=(0,0,1,1) dst=(5,6,1,1)"]);

            let mut png = vec![0u8; 256];
            let len = canvas_bridge_bitmap_png(b, bmp, png.as_mut_ptr(), png.len());
            assert!(len > 8 && (len as usize) <= png.len());
            assert_eq!(&png[1..4], b"PNG");
            assert_eq!(canvas_bridge_bitmap_png(b, bmp, ptr::null_mut(), 0), len);
            canvas_bridge_free(b);
        }
    }

    fn bridge() -> *mut CanvasBridge {
        let json = CString::new(r#"{"compile_mode": "deferred"}"#).unwrap();
        let bridge = unsafe { canvas_bridge_new(json.as_ptr()) };
        assert!(!bridge.is_null());
        bridge
    }

    #[test]
    fn invalid_config_yields_null() {
        let json = CString::new(r#"{"device_pixel_ratio": 0}"#).unwrap();
        assert!(unsafe { canvas_bridge_new(json.as_ptr()) }.is_null());
    }

    #[test]
    fn window_and_bitmap_round_trip() {
        let b = bridge();
        let class = CString::new("win").unwrap();
        unsafe {
            let w = canvas_bridge_create_window(b, -1, true, true, class.as_ptr());
            assert_eq!(w, 1);
            assert!(canvas_bridge_set_window_rect(b, w, 0.0, 0.0, 10.0, 10.0));

            let memory = [1u8, 2, 3, 255];
            let bmp = canvas_bridge_create_bitmap(b, memory.as_ptr(), memory.len(), 0, 1, 1, 1.0);
            assert_ne!(bmp, INVALID_HANDLE);

            let mut out = [0u8; 8];
            assert!(canvas_bridge_get_bitmap_data(b, bmp, out.as_mut_ptr(), out.len(), 4));
            assert_eq!(&out[4..], &memory);
            assert!(!canvas_bridge_get_bitmap_data(b, bmp, out.as_mut_ptr(), out.len(), 6));

            assert!(canvas_bridge_destroy_bitmap(b, bmp));
            assert!(!canvas_bridge_destroy_bitmap(b, bmp));
            assert!(!canvas_bridge_destroy_window(b, 0));
            canvas_bridge_free(b);
        }
    }

    #[test]
    fn null_bridge_is_rejected() {
        unsafe {
            assert_eq!(canvas_bridge_raise_window(std::ptr::null_mut(), 1), -1);
            assert!(!canvas_bridge_draw_point(std::ptr::null_mut(), 1, 0.0, 0.0));
        }
    }

    #[test]
    fn config_entries_through_abi() {
        let b = bridge();
        let (ab, ac, a) = (
            CString::new("a/b").unwrap(),
            CString::new("a/c").unwrap(),
            CString::new("a/").unwrap(),
        );
        let one = CString::new("1").unwrap();
        unsafe {
            assert!(canvas_bridge_config_set_entry(b, ab.as_ptr(), one.as_ptr()));
            assert!(canvas_bridge_config_set_entry(b, ac.as_ptr(), one.as_ptr()));
            assert_eq!(canvas_bridge_config_group_count(b, a.as_ptr(), false), 0);
            assert_eq!(canvas_bridge_config_entry_count(b, a.as_ptr(), false), 2);

            let mut out = [0u8; 1];
            assert_eq!(canvas_bridge_config_get_entry(b, ab.as_ptr(), out.as_mut_ptr(), 1), 1);
            assert_eq!(out[0], b'1');
            let mut key = [0u8; 8];
            assert_eq!(canvas_bridge_config_entry_at(b, a.as_ptr(), 1, key.as_mut_ptr(), 8), 3);
            assert_eq!(&key[..3], b"a/c");
            canvas_bridge_free(b);
        }
    }

    #[test]
    fn stock_cursor_is_nul_terminated() {
        let b = bridge();
        let mut out = [0xffu8; 16];
        unsafe {
            assert_eq!(canvas_bridge_stock_cursor(b, 1, out.as_mut_ptr(), out.len()), 9);
            assert_eq!(&out[..10], b"crosshair\0");
            assert_eq!(canvas_bridge_stock_cursor(b, 99, out.as_mut_ptr(), out.len()), -1);
            canvas_bridge_free(b);
        }
    }
}
