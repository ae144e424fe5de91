//! canvas-proxy — native handles for a host canvas surface.
//!
//! The Rust API lives in the modules re-exported below: a [`Host`] binds a
//! [`ForeignCallBridge`], hands out [`Surface`]s, and each surface lazily
//! owns one [`RenderingContext2d`].
//!
//! This file contains ONLY `extern "C"` entry points for C callers. Each one:
//! 1. Wraps its body in `catch_unwind`
//! 2. Validates inputs at the boundary
//! 3. Delegates to the handle API through the global `HostState`
//! 4. Returns a status code
//!
//! Status codes: `0` ok, `-1` error (see `cnv_get_last_error`), `-2` panic.
//! Handle-returning calls return `0` on error, float-returning calls `NaN`,
//! pointer-returning calls null.

// All public functions in this file are `extern "C"` entry points called
// across the C ABI boundary. Raw-pointer arguments are part of that contract
// and are null-checked inside each function before use.
#![allow(clippy::not_unsafe_ptr_arg_deref)]

mod bridge;
mod cache;
mod config;
mod context2d;
#[cfg(target_arch = "wasm32")]
mod dom;
mod error;
mod headless;
mod host;
mod state;
mod surface;
mod types;
mod window;

use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub use bridge::{AllocationLedger, Arg, CallArgs, ForeignCallBridge, ForeignString, OwnedArg};
pub use config::{HostConfig, WindowMetrics};
pub use context2d::RenderingContext2d;
#[cfg(target_arch = "wasm32")]
pub use dom::DomBridge;
pub use error::{BridgeError, CanvasError, Result};
pub use headless::{HeadlessDocument, JournalEntry};
pub use host::Host;
pub use surface::Surface;
pub use types::{
    ContextKind, ForeignOp, HostCapabilities, LineCap, LineJoin, NumericProperty, StyleProperty,
    SurfaceId, DEFAULT_HEIGHT, DEFAULT_WIDTH,
};
pub use window::HostWindow;

use state::{destroy_state, init_state, set_last_error, state_read, state_write};

// ============================================================================
// Safety wrappers: every entry point uses one of these
// ============================================================================

/// Wrap an entry point body. Returns the code on success, -1 on error, -2 on panic.
fn ffi_wrap(f: impl FnOnce() -> Result<i32>) -> i32 {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(code)) => code,
        Ok(Err(err)) => {
            set_last_error(err.to_string());
            -1
        }
        Err(_) => {
            set_last_error("internal panic".to_string());
            -2
        }
    }
}

/// Wrap an entry point that returns a u32 handle. Returns 0 on error.
fn ffi_wrap_handle(f: impl FnOnce() -> Result<u32>) -> u32 {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(handle)) => handle,
        Ok(Err(err)) => {
            set_last_error(err.to_string());
            0
        }
        Err(_) => {
            set_last_error("internal panic".to_string());
            0
        }
    }
}

/// Wrap an entry point that returns a number. Returns NaN on error.
fn ffi_wrap_f64(f: impl FnOnce() -> Result<f64>) -> f64 {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            set_last_error(err.to_string());
            f64::NAN
        }
        Err(_) => {
            set_last_error("internal panic".to_string());
            f64::NAN
        }
    }
}

/// Wrap an entry point that returns a borrowed C string. Returns null on error.
fn ffi_wrap_ptr(f: impl FnOnce() -> Result<*const c_char>) -> *const c_char {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(ptr)) => ptr,
        Ok(Err(err)) => {
            set_last_error(err.to_string());
            std::ptr::null()
        }
        Err(_) => {
            set_last_error("internal panic".to_string());
            std::ptr::null()
        }
    }
}

/// Borrow `len` bytes at `ptr` as UTF-8. Null or zero length reads as "".
fn read_str<'a>(ptr: *const u8, len: u32) -> Result<&'a str> {
    if ptr.is_null() || len == 0 {
        return Ok("");
    }
    let slice = unsafe { std::slice::from_raw_parts(ptr, len as usize) };
    std::str::from_utf8(slice).map_err(|_| CanvasError::InvalidUtf8)
}

fn style_property(prop: u8) -> Result<StyleProperty> {
    StyleProperty::from_u8(prop).ok_or(CanvasError::UnknownProperty(prop))
}

/// Run `f` against the context of surface `handle`.
fn with_context(
    handle: u32,
    f: impl FnOnce(&mut RenderingContext2d) -> Result<()>,
) -> i32 {
    ffi_wrap(|| {
        let mut state = state_write()?;
        f(state.context_mut(handle)?)?;
        Ok(0)
    })
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Bind to the browser document. Only available on wasm32.
#[no_mangle]
pub extern "C" fn cnv_init() -> i32 {
    ffi_wrap(|| {
        #[cfg(target_arch = "wasm32")]
        {
            let host = Host::dom(HostConfig::default())?;
            init_state(host, None)?;
            Ok(0)
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            Err(CanvasError::NoHost)
        }
    })
}

/// Headless init: binds an in-memory `HeadlessDocument`.
/// `config` is JSON (see `HostConfig`); null or empty means defaults.
#[no_mangle]
pub extern "C" fn cnv_init_headless(config: *const u8, config_len: u32) -> i32 {
    ffi_wrap(|| {
        let config = HostConfig::from_json(read_str(config, config_len)?)?;
        let (host, doc) = Host::headless(config)?;
        init_state(host, Some(doc))?;
        Ok(0)
    })
}

/// Release every surface proxy. Foreign surfaces stay in the host document.
#[no_mangle]
pub extern "C" fn cnv_shutdown() -> i32 {
    ffi_wrap(|| {
        if let Some(mut state) = destroy_state()? {
            let count = state.surfaces.len();
            for (_, surface) in state.surfaces.drain() {
                surface.destroy();
            }
            log::debug!("shutdown: released {count} surface proxies");
        }
        Ok(0)
    })
}

/// 1 if a host is bound, 0 if not, -1 on error.
#[no_mangle]
pub extern "C" fn cnv_is_initialized() -> i32 {
    ffi_wrap(|| Ok(i32::from(state::is_state_initialized()?)))
}

#[no_mangle]
pub extern "C" fn cnv_get_capabilities() -> u32 {
    catch_unwind(AssertUnwindSafe(|| -> u32 {
        match state_read() {
            Ok(state) => state.host.capabilities().bits(),
            Err(_) => 0,
        }
    }))
    .unwrap_or_default()
}

// ============================================================================
// Surfaces
// ============================================================================

/// Find or create the surface named by `id` and return a new handle to it.
#[no_mangle]
pub extern "C" fn cnv_create_canvas(id: *const u8, id_len: u32) -> u32 {
    ffi_wrap_handle(|| {
        let identity = read_str(id, id_len)?;
        state_write()?.create_surface(identity)
    })
}

/// Release the proxy, its context and its cached strings. The handle is dead
/// afterwards; using it again fails with "Invalid handle".
#[no_mangle]
pub extern "C" fn cnv_destroy_canvas(handle: u32) -> i32 {
    ffi_wrap(|| {
        state_write()?.destroy_surface(handle)?;
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn cnv_get_width(handle: u32) -> i32 {
    ffi_wrap(|| state_read()?.surface(handle)?.width())
}

#[no_mangle]
pub extern "C" fn cnv_get_height(handle: u32) -> i32 {
    ffi_wrap(|| state_read()?.surface(handle)?.height())
}

#[no_mangle]
pub extern "C" fn cnv_set_width(handle: u32, width: i32) -> i32 {
    ffi_wrap(|| {
        state_read()?.surface(handle)?.set_width(width)?;
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn cnv_set_height(handle: u32, height: i32) -> i32 {
    ffi_wrap(|| {
        state_read()?.surface(handle)?.set_height(height)?;
        Ok(0)
    })
}

/// Returns the context handle (equal to `handle`), or 0 when `kind` is not
/// supported and no context exists yet. The unsupported case does not set
/// an error.
#[no_mangle]
pub extern "C" fn cnv_get_context(handle: u32, kind: *const u8, kind_len: u32) -> u32 {
    ffi_wrap_handle(|| {
        let kind = read_str(kind, kind_len)?;
        let mut state = state_write()?;
        let found = state.surface_mut(handle)?.get_context(kind)?.is_some();
        state.debug_log(&format!("get_context: handle={handle}, kind={kind:?}, found={found}"));
        Ok(if found { handle } else { 0 })
    })
}

// ============================================================================
// Context: rectangles and text
// ============================================================================

#[no_mangle]
pub extern "C" fn cnv_ctx_clear_rect(handle: u32, x: f64, y: f64, w: f64, h: f64) -> i32 {
    with_context(handle, |c| c.clear_rect(x, y, w, h))
}

#[no_mangle]
pub extern "C" fn cnv_ctx_fill_rect(handle: u32, x: f64, y: f64, w: f64, h: f64) -> i32 {
    with_context(handle, |c| c.fill_rect(x, y, w, h))
}

#[no_mangle]
pub extern "C" fn cnv_ctx_stroke_rect(handle: u32, x: f64, y: f64, w: f64, h: f64) -> i32 {
    with_context(handle, |c| c.stroke_rect(x, y, w, h))
}

/// A negative `max_width` omits the argument.
#[no_mangle]
pub extern "C" fn cnv_ctx_fill_text(
    handle: u32,
    text: *const u8,
    text_len: u32,
    x: f64,
    y: f64,
    max_width: f64,
) -> i32 {
    with_context(handle, |c| {
        c.fill_text(read_str(text, text_len)?, x, y, Some(max_width))
    })
}

/// A negative `max_width` omits the argument.
#[no_mangle]
pub extern "C" fn cnv_ctx_stroke_text(
    handle: u32,
    text: *const u8,
    text_len: u32,
    x: f64,
    y: f64,
    max_width: f64,
) -> i32 {
    with_context(handle, |c| {
        c.stroke_text(read_str(text, text_len)?, x, y, Some(max_width))
    })
}

// ============================================================================
// Context: paths
// ============================================================================

#[no_mangle]
pub extern "C" fn cnv_ctx_begin_path(handle: u32) -> i32 {
    with_context(handle, |c| c.begin_path())
}

#[no_mangle]
pub extern "C" fn cnv_ctx_close_path(handle: u32) -> i32 {
    with_context(handle, |c| c.close_path())
}

#[no_mangle]
pub extern "C" fn cnv_ctx_move_to(handle: u32, x: f64, y: f64) -> i32 {
    with_context(handle, |c| c.move_to(x, y))
}

#[no_mangle]
pub extern "C" fn cnv_ctx_line_to(handle: u32, x: f64, y: f64) -> i32 {
    with_context(handle, |c| c.line_to(x, y))
}

#[no_mangle]
pub extern "C" fn cnv_ctx_bezier_curve_to(
    handle: u32,
    cp1x: f64,
    cp1y: f64,
    cp2x: f64,
    cp2y: f64,
    x: f64,
    y: f64,
) -> i32 {
    with_context(handle, |c| c.bezier_curve_to(cp1x, cp1y, cp2x, cp2y, x, y))
}

#[no_mangle]
pub extern "C" fn cnv_ctx_quadratic_curve_to(handle: u32, cpx: f64, cpy: f64, x: f64, y: f64) -> i32 {
    with_context(handle, |c| c.quadratic_curve_to(cpx, cpy, x, y))
}

#[no_mangle]
pub extern "C" fn cnv_ctx_arc(
    handle: u32,
    x: f64,
    y: f64,
    radius: f64,
    start_angle: f64,
    end_angle: f64,
) -> i32 {
    with_context(handle, |c| c.arc(x, y, radius, start_angle, end_angle))
}

#[no_mangle]
pub extern "C" fn cnv_ctx_arc_to(handle: u32, x1: f64, y1: f64, x2: f64, y2: f64, radius: f64) -> i32 {
    with_context(handle, |c| c.arc_to(x1, y1, x2, y2, radius))
}

#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn cnv_ctx_ellipse(
    handle: u32,
    x: f64,
    y: f64,
    radius_x: f64,
    radius_y: f64,
    rotation: f64,
    start_angle: f64,
    end_angle: f64,
) -> i32 {
    with_context(handle, |c| {
        c.ellipse(x, y, radius_x, radius_y, rotation, start_angle, end_angle)
    })
}

#[no_mangle]
pub extern "C" fn cnv_ctx_rect(handle: u32, x: f64, y: f64, w: f64, h: f64) -> i32 {
    with_context(handle, |c| c.rect(x, y, w, h))
}

#[no_mangle]
pub extern "C" fn cnv_ctx_fill(handle: u32) -> i32 {
    with_context(handle, |c| c.fill())
}

#[no_mangle]
pub extern "C" fn cnv_ctx_stroke(handle: u32) -> i32 {
    with_context(handle, |c| c.stroke())
}

#[no_mangle]
pub extern "C" fn cnv_ctx_clip(handle: u32) -> i32 {
    with_context(handle, |c| c.clip())
}

/// 1 if inside, 0 if not, -1 on error.
#[no_mangle]
pub extern "C" fn cnv_ctx_is_point_in_path(handle: u32, x: f64, y: f64) -> i32 {
    ffi_wrap(|| Ok(i32::from(state_read()?.context(handle)?.is_point_in_path(x, y)?)))
}

/// 1 if on the stroke, 0 if not, -1 on error.
#[no_mangle]
pub extern "C" fn cnv_ctx_is_point_in_stroke(handle: u32, x: f64, y: f64) -> i32 {
    ffi_wrap(|| Ok(i32::from(state_read()?.context(handle)?.is_point_in_stroke(x, y)?)))
}

// ============================================================================
// Context: transforms and the state stack
// ============================================================================

#[no_mangle]
pub extern "C" fn cnv_ctx_rotate(handle: u32, angle: f64) -> i32 {
    with_context(handle, |c| c.rotate(angle))
}

#[no_mangle]
pub extern "C" fn cnv_ctx_scale(handle: u32, x: f64, y: f64) -> i32 {
    with_context(handle, |c| c.scale(x, y))
}

#[no_mangle]
pub extern "C" fn cnv_ctx_translate(handle: u32, x: f64, y: f64) -> i32 {
    with_context(handle, |c| c.translate(x, y))
}

#[no_mangle]
pub extern "C" fn cnv_ctx_transform(handle: u32, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> i32 {
    with_context(handle, |ctx| ctx.transform(a, b, c, d, e, f))
}

#[no_mangle]
pub extern "C" fn cnv_ctx_set_transform(
    handle: u32,
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
) -> i32 {
    with_context(handle, |ctx| ctx.set_transform(a, b, c, d, e, f))
}

#[no_mangle]
pub extern "C" fn cnv_ctx_reset_transform(handle: u32) -> i32 {
    with_context(handle, |c| c.reset_transform())
}

#[no_mangle]
pub extern "C" fn cnv_ctx_save(handle: u32) -> i32 {
    with_context(handle, |c| c.save())
}

#[no_mangle]
pub extern "C" fn cnv_ctx_restore(handle: u32) -> i32 {
    with_context(handle, |c| c.restore())
}

// ============================================================================
// Context: properties
// ============================================================================

/// Read a style property (`prop` is a `StyleProperty` discriminant).
///
/// The returned string is owned by the library. It stays valid until the
/// next `cnv_ctx_get_style` for the same property on this context, or until
/// the surface is destroyed. Callers must not free it.
#[no_mangle]
pub extern "C" fn cnv_ctx_get_style(handle: u32, prop: u8) -> *const c_char {
    ffi_wrap_ptr(|| {
        let prop = style_property(prop)?;
        let mut state = state_write()?;
        let value = state.context_mut(handle)?.style(prop)?;
        Ok(value.as_ptr())
    })
}

/// Write a style property. The value is passed to the host unvalidated.
#[no_mangle]
pub extern "C" fn cnv_ctx_set_style(handle: u32, prop: u8, value: *const u8, value_len: u32) -> i32 {
    ffi_wrap(|| {
        let prop = style_property(prop)?;
        let value = read_str(value, value_len)?;
        state_read()?.context(handle)?.set_style(prop, value)?;
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn cnv_ctx_get_line_width(handle: u32) -> f64 {
    ffi_wrap_f64(|| state_read()?.context(handle)?.line_width())
}

#[no_mangle]
pub extern "C" fn cnv_ctx_set_line_width(handle: u32, value: f64) -> i32 {
    with_context(handle, |c| c.set_line_width(value))
}

#[no_mangle]
pub extern "C" fn cnv_ctx_get_global_alpha(handle: u32) -> f64 {
    ffi_wrap_f64(|| state_read()?.context(handle)?.global_alpha())
}

#[no_mangle]
pub extern "C" fn cnv_ctx_set_global_alpha(handle: u32, value: f64) -> i32 {
    with_context(handle, |c| c.set_global_alpha(value))
}

/// `lineCap` as an index (butt=0, round=1, square=2), or -1 when the host
/// reports a token outside that set or the call fails.
#[no_mangle]
pub extern "C" fn cnv_ctx_get_line_cap_kind(handle: u32) -> i32 {
    ffi_wrap(|| {
        let mut state = state_write()?;
        let kind = state.context_mut(handle)?.line_cap_kind()?;
        Ok(kind.map_or(-1, |k| k as i32))
    })
}

/// `lineJoin` as an index (round=0, bevel=1, miter=2), or -1 when the host
/// reports a token outside that set or the call fails.
#[no_mangle]
pub extern "C" fn cnv_ctx_get_line_join_kind(handle: u32) -> i32 {
    ffi_wrap(|| {
        let mut state = state_write()?;
        let kind = state.context_mut(handle)?.line_join_kind()?;
        Ok(kind.map_or(-1, |k| k as i32))
    })
}

/// The surface handle that owns context `handle`.
#[no_mangle]
pub extern "C" fn cnv_ctx_get_canvas(handle: u32) -> u32 {
    ffi_wrap_handle(|| {
        state_read()?.context(handle)?;
        Ok(handle)
    })
}

// ============================================================================
// Window
// ============================================================================

#[no_mangle]
pub extern "C" fn cnv_window_inner_width() -> i32 {
    ffi_wrap(|| state_read()?.host.window().inner_width())
}

#[no_mangle]
pub extern "C" fn cnv_window_inner_height() -> i32 {
    ffi_wrap(|| state_read()?.host.window().inner_height())
}

#[no_mangle]
pub extern "C" fn cnv_window_outer_width() -> i32 {
    ffi_wrap(|| state_read()?.host.window().outer_width())
}

#[no_mangle]
pub extern "C" fn cnv_window_outer_height() -> i32 {
    ffi_wrap(|| state_read()?.host.window().outer_height())
}

#[no_mangle]
pub extern "C" fn cnv_window_blur() -> i32 {
    ffi_wrap(|| {
        state_read()?.host.window().blur()?;
        Ok(0)
    })
}

// ============================================================================
// Diagnostics
// ============================================================================

/// The last error message, or null. Owned by the library; valid until the
/// next failing call or `cnv_clear_error`.
#[no_mangle]
pub extern "C" fn cnv_get_last_error() -> *const c_char {
    catch_unwind(state::last_error_ptr).unwrap_or(std::ptr::null())
}

#[no_mangle]
pub extern "C" fn cnv_clear_error() {
    let _ = catch_unwind(state::clear_last_error);
}

#[no_mangle]
pub extern "C" fn cnv_set_debug(enabled: u8) -> i32 {
    ffi_wrap(|| {
        state_write()?.debug_mode = enabled != 0;
        Ok(0)
    })
}

#[no_mangle]
pub extern "C" fn cnv_get_surface_count() -> u32 {
    catch_unwind(AssertUnwindSafe(|| -> u32 {
        match state_read() {
            Ok(state) => state.surfaces.len() as u32,
            Err(_) => 0,
        }
    }))
    .unwrap_or_default()
}

fn journal_json() -> Result<String> {
    let state = state_read()?;
    let doc = state
        .document
        .as_ref()
        .ok_or(CanvasError::NoJournal)?;
    Ok(doc.journal_json()?)
}

fn abi_len(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| CanvasError::LengthOverflow(len))
}

/// Byte length of the headless call journal as JSON.
#[no_mangle]
pub extern "C" fn cnv_get_journal_len() -> i32 {
    ffi_wrap(|| abi_len(journal_json()?.len()))
}

/// Copy the headless call journal as JSON into `buffer`. Returns the number
/// of bytes copied and NUL-terminates when there is room.
#[no_mangle]
pub extern "C" fn cnv_get_journal(buffer: *mut u8, buffer_len: u32) -> i32 {
    ffi_wrap(|| {
        let json = journal_json()?;
        let bytes = json.as_bytes();
        let copy_len = bytes.len().min(buffer_len as usize);

        if !buffer.is_null() && copy_len > 0 {
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), buffer, copy_len);
            }
        }
        if !buffer.is_null() && (buffer_len as usize) > copy_len {
            unsafe {
                *buffer.add(copy_len) = 0;
            }
        }
        abi_len(copy_len)
    })
}

/// Drop everything journaled so far.
#[no_mangle]
pub extern "C" fn cnv_clear_journal() -> i32 {
    ffi_wrap(|| {
        if let Some(doc) = state_read()?.document.as_ref() {
            doc.clear_journal();
        }
        Ok(0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::ffi::CStr;

    fn init() {
        let _ = cnv_shutdown();
        assert_eq!(cnv_init_headless(std::ptr::null(), 0), 0);
        cnv_clear_error();
    }

    fn create(id: &str) -> u32 {
        cnv_create_canvas(id.as_ptr(), id.len() as u32)
    }

    fn context(handle: u32, kind: &str) -> u32 {
        cnv_get_context(handle, kind.as_ptr(), kind.len() as u32)
    }

    fn last_error() -> Option<String> {
        let ptr = cnv_get_last_error();
        if ptr.is_null() {
            return None;
        }
        Some(unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string())
    }

    fn get_style(handle: u32, prop: StyleProperty) -> String {
        let ptr = cnv_ctx_get_style(handle, prop as u8);
        assert!(!ptr.is_null(), "get_style failed: {:?}", last_error());
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string()
    }

    fn set_style(handle: u32, prop: StyleProperty, value: &str) -> i32 {
        cnv_ctx_set_style(handle, prop as u8, value.as_ptr(), value.len() as u32)
    }

    fn journal() -> serde_json::Value {
        let len = cnv_get_journal_len();
        assert!(len >= 0);
        let mut buf = vec![0u8; len as usize + 1];
        let copied = cnv_get_journal(buf.as_mut_ptr(), buf.len() as u32);
        assert_eq!(copied, len);
        serde_json::from_slice(&buf[..copied as usize]).unwrap()
    }

    #[test]
    #[serial]
    fn test_surface_scenario() {
        init();
        let s1 = create("s1");
        assert_ne!(s1, 0);
        assert_eq!(cnv_get_width(s1), 300);
        assert_eq!(cnv_get_height(s1), 150);
        assert_eq!(cnv_set_width(s1, 500), 0);
        assert_eq!(cnv_get_width(s1), 500);
        assert_eq!(cnv_destroy_canvas(s1), 0);
        assert_eq!(cnv_get_surface_count(), 0);
        cnv_shutdown();
    }

    #[test]
    #[serial]
    fn test_use_after_destroy_is_reported() {
        init();
        let s = create("s");
        assert_eq!(cnv_destroy_canvas(s), 0);
        assert_eq!(cnv_destroy_canvas(s), -1);
        assert!(last_error().unwrap().contains("Invalid handle"));
        assert_eq!(cnv_get_width(s), -1);

        cnv_clear_error();
        assert!(last_error().is_none());
        cnv_shutdown();
    }

    #[test]
    #[serial]
    fn test_same_identity_two_handles() {
        init();
        let a = create("shared");
        let b = create("shared");
        assert_ne!(a, b);
        cnv_set_height(a, 77);
        assert_eq!(cnv_get_height(b), 77);
        assert_eq!(cnv_get_surface_count(), 2);
        cnv_shutdown();
    }

    #[test]
    #[serial]
    fn test_context_singleton_and_unsupported_kind() {
        init();
        let s = create("s");
        assert_eq!(context(s, "webgl"), 0);
        assert!(last_error().is_none());
        assert_eq!(cnv_ctx_fill(s), -1);
        assert!(last_error().unwrap().contains("no rendering context"));

        assert_eq!(context(s, "2d"), s);
        assert_eq!(context(s, "3d"), s);
        assert_eq!(cnv_ctx_get_canvas(s), s);
        cnv_shutdown();
    }

    #[test]
    #[serial]
    fn test_style_round_trip_through_abi() {
        init();
        let s = create("s");
        context(s, "2d");
        assert_eq!(get_style(s, StyleProperty::FillStyle), "#000000");
        assert_eq!(set_style(s, StyleProperty::FillStyle, "#ABC"), 0);
        assert_eq!(get_style(s, StyleProperty::FillStyle), "#aabbcc");

        assert_eq!(set_style(s, StyleProperty::LineCap, "round"), 0);
        assert_eq!(get_style(s, StyleProperty::LineCap), "round");
        assert_eq!(cnv_ctx_get_line_cap_kind(s), 1);
        assert_eq!(cnv_ctx_get_line_join_kind(s), 2);

        assert!(cnv_ctx_get_style(s, 99).is_null());
        assert!(last_error().unwrap().contains("Invalid style property"));
        cnv_shutdown();
    }

    #[test]
    #[serial]
    fn test_numeric_properties() {
        init();
        let s = create("s");
        context(s, "2d");
        assert_eq!(cnv_ctx_get_line_width(s), 1.0);
        assert_eq!(cnv_ctx_set_line_width(s, 4.5), 0);
        assert_eq!(cnv_ctx_get_line_width(s), 4.5);
        assert_eq!(cnv_ctx_set_global_alpha(s, 0.25), 0);
        assert_eq!(cnv_ctx_get_global_alpha(s), 0.25);
        assert!(cnv_ctx_get_global_alpha(0).is_nan());
        cnv_shutdown();
    }

    #[test]
    #[serial]
    fn test_text_max_width_sentinel() {
        init();
        let s = create("s");
        context(s, "2d");
        assert_eq!(cnv_clear_journal(), 0);
        let text = "hello";
        assert_eq!(cnv_ctx_fill_text(s, text.as_ptr(), 5, 1.0, 2.0, -1.0), 0);
        assert_eq!(cnv_ctx_stroke_text(s, text.as_ptr(), 5, 1.0, 2.0, 40.0), 0);

        let entries = journal();
        let entries = entries.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["op"], "FillText");
        assert_eq!(entries[0]["args"].as_array().unwrap().len(), 4);
        assert_eq!(entries[1]["args"].as_array().unwrap().len(), 5);
        cnv_shutdown();
    }

    #[test]
    #[serial]
    fn test_path_and_point_query() {
        init();
        let s = create("s");
        context(s, "2d");
        assert_eq!(cnv_ctx_begin_path(s), 0);
        assert_eq!(cnv_ctx_rect(s, 0.0, 0.0, 10.0, 10.0), 0);
        assert_eq!(cnv_ctx_is_point_in_path(s, 5.0, 5.0), 1);
        assert_eq!(cnv_ctx_is_point_in_path(s, 15.0, 5.0), 0);
        assert_eq!(cnv_ctx_is_point_in_stroke(s, 0.0, 0.0), 0);
        assert_eq!(cnv_ctx_save(s), 0);
        assert_eq!(cnv_ctx_translate(s, 3.0, 4.0), 0);
        assert_eq!(cnv_ctx_restore(s), 0);
        cnv_shutdown();
    }

    #[test]
    #[serial]
    fn test_window_queries() {
        let cfg = r#"{"window": {"inner_width": 1024, "inner_height": 768}}"#;
        let _ = cnv_shutdown();
        assert_eq!(cnv_init_headless(cfg.as_ptr(), cfg.len() as u32), 0);
        assert_eq!(cnv_window_inner_width(), 1024);
        assert_eq!(cnv_window_inner_height(), 768);
        assert_eq!(cnv_window_outer_width(), 1280);
        assert_eq!(cnv_window_outer_height(), 800);
        assert_eq!(cnv_window_blur(), 0);
        cnv_shutdown();
    }

    #[test]
    #[serial]
    fn test_init_errors() {
        let _ = cnv_shutdown();
        assert_eq!(cnv_get_width(1), -1);
        assert!(last_error().unwrap().contains("not initialized"));

        let bad = "{oops";
        assert_eq!(cnv_init_headless(bad.as_ptr(), bad.len() as u32), -1);
        assert!(last_error().unwrap().contains("invalid configuration"));

        #[cfg(not(target_arch = "wasm32"))]
        {
            assert_eq!(cnv_init(), -1);
            assert!(last_error().unwrap().contains("no DOM host"));
        }

        init();
        assert_eq!(cnv_init_headless(std::ptr::null(), 0), -1);
        assert!(last_error().unwrap().contains("already initialized"));
        assert_ne!(cnv_get_capabilities(), 0);
        assert_eq!(cnv_is_initialized(), 1);
        cnv_shutdown();
        assert_eq!(cnv_get_capabilities(), 0);
        assert_eq!(cnv_is_initialized(), 0);
    }

    #[test]
    #[serial]
    fn test_invalid_utf8_rejected() {
        init();
        let bytes = [0xffu8, 0xfe];
        assert_eq!(cnv_create_canvas(bytes.as_ptr(), 2), 0);
        assert!(last_error().unwrap().contains("Invalid UTF-8"));
        assert_eq!(cnv_create_canvas(std::ptr::null(), 0), 0);
        assert!(last_error().unwrap().contains("must not be empty"));
        cnv_shutdown();
    }

    #[test]
    #[serial]
    fn test_shutdown_releases_cached_strings() {
        init();
        let s = create("s");
        context(s, "2d");
        get_style(s, StyleProperty::Font);
        let ledger = state_read().unwrap().document.as_ref().unwrap().ledger();
        assert_eq!(ledger.live(), 1);
        cnv_shutdown();
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    #[serial]
    fn test_journal_needs_headless_host() {
        let _ = cnv_shutdown();
        let bridge: std::rc::Rc<dyn ForeignCallBridge> =
            std::rc::Rc::new(crate::bridge::MockBridge::new());
        let host = Host::new(bridge, HostConfig::default()).unwrap();
        init_state(host, None).unwrap();

        assert_eq!(cnv_get_journal_len(), -1);
        assert_eq!(last_error().as_deref(), Some("host keeps no call journal"));
        assert_eq!(cnv_clear_journal(), 0);
        cnv_shutdown();
    }

    #[test]
    #[serial]
    fn test_journal_len_is_bounded_by_capacity() {
        let _ = cnv_shutdown();
        let config = r#"{"journal_capacity": 4}"#;
        assert_eq!(cnv_init_headless(config.as_ptr(), config.len() as u32), 0);
        let s = create("cap");
        for _ in 0..50 {
            assert_eq!(cnv_get_width(s), 300);
        }
        let entries = journal();
        assert_eq!(entries.as_array().unwrap().len(), 4);
        assert_eq!(entries[3]["op"], "GetWidth");
        cnv_shutdown();
    }

    #[test]
    fn test_abi_len_rejects_overflow() {
        assert_eq!(abi_len(12).unwrap(), 12);
        let too_big = i32::MAX as usize + 1;
        assert!(matches!(
            abi_len(too_big),
            Err(CanvasError::LengthOverflow(n)) if n == too_big
        ));
    }

    #[test]
    #[serial]
    fn test_set_debug() {
        init();
        assert_eq!(cnv_set_debug(1), 0);
        assert!(state_read().unwrap().debug_mode);
        let s = create("dbg");
        assert_ne!(s, 0);
        cnv_shutdown();
    }
}
