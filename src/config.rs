//! Host configuration.
//!
//! Passed as JSON to `cnv_init_headless()`; an empty document yields the
//! defaults. The DOM host only reads `debug` from it.

use serde::Deserialize;

use crate::error::{CanvasError, Result};
use crate::types::{DEFAULT_HEIGHT, DEFAULT_WIDTH};

pub const DEFAULT_JOURNAL_CAPACITY: usize = 4096;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Width given to surfaces the host creates, and restored on invalid writes.
    pub default_width: i32,
    pub default_height: i32,
    /// Normalize style strings the way a browser host does.
    pub normalize_styles: bool,
    /// Record every call the headless host receives.
    pub journal: bool,
    /// Most journal entries kept; the oldest is dropped past this.
    pub journal_capacity: usize,
    pub debug: bool,
    pub window: WindowMetrics,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            default_width: DEFAULT_WIDTH,
            default_height: DEFAULT_HEIGHT,
            normalize_styles: true,
            journal: true,
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
            debug: false,
            window: WindowMetrics::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WindowMetrics {
    pub inner_width: i32,
    pub inner_height: i32,
    pub outer_width: i32,
    pub outer_height: i32,
}

impl Default for WindowMetrics {
    fn default() -> Self {
        Self {
            inner_width: 1280,
            inner_height: 720,
            outer_width: 1280,
            outer_height: 800,
        }
    }
}

impl HostConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_width <= 0 || self.default_height <= 0 {
            return Err(CanvasError::InvalidConfig(format!(
                "default surface size must be positive, got {}x{}",
                self.default_width, self.default_height
            )));
        }
        if self.journal && self.journal_capacity == 0 {
            return Err(CanvasError::InvalidConfig(
                "journal_capacity must be at least 1 when the journal is on".to_string(),
            ));
        }
        let w = &self.window;
        if w.inner_width < 0 || w.inner_height < 0 || w.outer_width < 0 || w.outer_height < 0 {
            return Err(CanvasError::InvalidConfig(
                "window metrics must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
