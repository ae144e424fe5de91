//! HostState and global state accessor for the C ABI.
//!
//! The Rust API passes a [`Host`] around explicitly. C callers have nowhere
//! to keep one, so a single global `HostState` is managed via `cnv_init()` /
//! `cnv_shutdown()` and surfaces are addressed by u32 handles.

use std::collections::HashMap;
use std::ffi::CString;
use std::ops::{Deref, DerefMut};
use std::os::raw::c_char;
use std::rc::Rc;
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
#[cfg(not(test))]
use std::thread::ThreadId;

use crate::context2d::RenderingContext2d;
use crate::error::{CanvasError, Result};
use crate::headless::HeadlessDocument;
use crate::host::Host;
use crate::surface::Surface;

pub struct HostState {
    pub host: Host,
    /// Set when the host is a `HeadlessDocument`, for journal access.
    pub document: Option<Rc<HeadlessDocument>>,
    pub surfaces: HashMap<u32, Surface>,
    pub next_handle: u32,
    pub debug_mode: bool,
}

// SAFETY: the C ABI is single-threaded. The lock exists for aliasing safety
// at the boundary, and `ensure_thread_affinity` rejects calls from any thread
// other than the one that ran `cnv_init`, so the `Rc`s inside are never
// touched from two threads.
unsafe impl Send for HostState {}
unsafe impl Sync for HostState {}

impl HostState {
    pub fn new(host: Host, document: Option<Rc<HeadlessDocument>>) -> Self {
        let debug_mode = host.config().debug;
        Self {
            host,
            document,
            surfaces: HashMap::new(),
            next_handle: 1, // Handle(0) is permanently invalid
            debug_mode,
        }
    }

    /// Bind a new proxy and give it the next handle. Handles are never recycled.
    pub fn create_surface(&mut self, identity: &str) -> Result<u32> {
        let surface = self.host.create_surface(identity)?;
        let handle = self.next_handle;
        self.next_handle += 1;
        self.surfaces.insert(handle, surface);
        self.debug_log(&format!("create_surface: id={identity:?}, handle={handle}"));
        Ok(handle)
    }

    pub fn destroy_surface(&mut self, handle: u32) -> Result<()> {
        self.validate_handle(handle)?;
        if let Some(surface) = self.surfaces.remove(&handle) {
            surface.destroy();
        }
        self.debug_log(&format!("destroy_surface: handle={handle}"));
        Ok(())
    }

    /// Validate that a handle refers to a live surface proxy.
    pub fn validate_handle(&self, handle: u32) -> Result<()> {
        if handle == 0 || !self.surfaces.contains_key(&handle) {
            return Err(CanvasError::InvalidHandle(handle));
        }
        Ok(())
    }

    pub fn surface(&self, handle: u32) -> Result<&Surface> {
        self.surfaces
            .get(&handle)
            .ok_or(CanvasError::InvalidHandle(handle))
    }

    pub fn surface_mut(&mut self, handle: u32) -> Result<&mut Surface> {
        self.surfaces
            .get_mut(&handle)
            .ok_or(CanvasError::InvalidHandle(handle))
    }

    /// The context of surface `handle`; it must already have been created.
    pub fn context(&self, handle: u32) -> Result<&RenderingContext2d> {
        self.surface(handle)?
            .context()
            .ok_or(CanvasError::NoContext(handle))
    }

    pub fn context_mut(&mut self, handle: u32) -> Result<&mut RenderingContext2d> {
        self.surface_mut(handle)?
            .context_mut()
            .ok_or(CanvasError::NoContext(handle))
    }

    pub fn debug_log(&self, msg: &str) {
        if self.debug_mode {
            log::debug!("[canvas-proxy] {msg}");
        }
    }
}

// ============================================================================
// Global State
// ============================================================================

static STATE: OnceLock<RwLock<Option<HostState>>> = OnceLock::new();
static LAST_ERROR: OnceLock<RwLock<Option<CString>>> = OnceLock::new();
#[cfg(not(test))]
static OWNER_THREAD: OnceLock<RwLock<Option<ThreadId>>> = OnceLock::new();

fn state_lock() -> &'static RwLock<Option<HostState>> {
    STATE.get_or_init(|| RwLock::new(None))
}

fn last_error_lock() -> &'static RwLock<Option<CString>> {
    LAST_ERROR.get_or_init(|| RwLock::new(None))
}

#[cfg(not(test))]
fn owner_thread_lock() -> &'static RwLock<Option<ThreadId>> {
    OWNER_THREAD.get_or_init(|| RwLock::new(None))
}

fn lock_poisoned(name: &str, detail: impl std::fmt::Display) -> CanvasError {
    CanvasError::LockPoisoned(format!("{name}: {detail}"))
}

fn ensure_thread_affinity() -> Result<()> {
    #[cfg(test)]
    {
        Ok(())
    }

    #[cfg(not(test))]
    {
        let current = std::thread::current().id();
        let owner = owner_thread_lock()
            .read()
            .map_err(|e| lock_poisoned("owner_thread", e))?;
        match *owner {
            Some(owner_id) if owner_id != current => Err(CanvasError::NonOwnerThread),
            _ => Ok(()),
        }
    }
}

#[cfg(not(test))]
fn bind_owner_thread_current() -> Result<()> {
    let current = std::thread::current().id();
    let mut owner = owner_thread_lock()
        .write()
        .map_err(|e| lock_poisoned("owner_thread", e))?;
    if let Some(owner_id) = *owner {
        if owner_id != current {
            return Err(CanvasError::NonOwnerThread);
        }
    }
    *owner = Some(current);
    Ok(())
}

#[cfg(test)]
fn bind_owner_thread_current() -> Result<()> {
    Ok(())
}

#[cfg(not(test))]
fn clear_owner_thread() -> Result<()> {
    let mut owner = owner_thread_lock()
        .write()
        .map_err(|e| lock_poisoned("owner_thread", e))?;
    *owner = None;
    Ok(())
}

#[cfg(test)]
fn clear_owner_thread() -> Result<()> {
    Ok(())
}

pub struct StateReadGuard<'a> {
    guard: RwLockReadGuard<'a, Option<HostState>>,
}

impl Deref for StateReadGuard<'_> {
    type Target = HostState;

    fn deref(&self) -> &Self::Target {
        self.guard
            .as_ref()
            .expect("StateReadGuard is only constructed for initialized state")
    }
}

pub struct StateWriteGuard<'a> {
    guard: RwLockWriteGuard<'a, Option<HostState>>,
}

impl Deref for StateWriteGuard<'_> {
    type Target = HostState;

    fn deref(&self) -> &Self::Target {
        self.guard
            .as_ref()
            .expect("StateWriteGuard is only constructed for initialized state")
    }
}

impl DerefMut for StateWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard
            .as_mut()
            .expect("StateWriteGuard is only constructed for initialized state")
    }
}

/// Acquire a read lock for the global state.
pub fn state_read() -> Result<StateReadGuard<'static>> {
    ensure_thread_affinity()?;
    let guard = state_lock().read().map_err(|e| lock_poisoned("state", e))?;
    if guard.is_none() {
        return Err(CanvasError::NotInitialized);
    }
    Ok(StateReadGuard { guard })
}

/// Acquire a write lock for the global state.
pub fn state_write() -> Result<StateWriteGuard<'static>> {
    ensure_thread_affinity()?;
    let guard = state_lock().write().map_err(|e| lock_poisoned("state", e))?;
    if guard.is_none() {
        return Err(CanvasError::NotInitialized);
    }
    Ok(StateWriteGuard { guard })
}

/// Install the global state for `host`.
pub fn init_state(host: Host, document: Option<Rc<HeadlessDocument>>) -> Result<()> {
    ensure_thread_affinity()?;
    bind_owner_thread_current()?;

    let mut guard = state_lock().write().map_err(|e| lock_poisoned("state", e))?;
    if guard.is_some() {
        return Err(CanvasError::AlreadyInitialized);
    }
    *guard = Some(HostState::new(host, document));
    Ok(())
}

pub fn is_state_initialized() -> Result<bool> {
    ensure_thread_affinity()?;
    let guard = state_lock().read().map_err(|e| lock_poisoned("state", e))?;
    Ok(guard.is_some())
}

/// Take the global state down and hand it back for teardown.
pub fn destroy_state() -> Result<Option<HostState>> {
    ensure_thread_affinity()?;
    let mut guard = state_lock().write().map_err(|e| lock_poisoned("state", e))?;
    let state = guard.take();
    drop(guard);
    clear_owner_thread()?;
    Ok(state)
}

/// Store an error message (best-effort). Survives a failed `cnv_init`.
pub fn set_last_error(msg: String) {
    if ensure_thread_affinity().is_err() {
        return;
    }
    // Interior NULs would truncate the message on the C side anyway.
    let msg = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    if let Ok(mut guard) = last_error_lock().write() {
        *guard = Some(msg);
    }
}

pub fn clear_last_error() {
    if ensure_thread_affinity().is_err() {
        return;
    }
    if let Ok(mut guard) = last_error_lock().write() {
        *guard = None;
    }
}

/// Pointer to the stored message, valid until the next set or clear.
pub fn last_error_ptr() -> *const c_char {
    if ensure_thread_affinity().is_err() {
        return std::ptr::null();
    }
    match last_error_lock().read() {
        Ok(guard) => guard.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
        Err(_) => std::ptr::null(),
    }
}
