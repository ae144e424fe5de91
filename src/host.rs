//! Host — the process-scoped binding to one foreign host.
//!
//! Created once at startup and passed to whatever needs surfaces or the
//! window. Dropping it drops the bridge once the last surface is gone.

use std::rc::Rc;

use log::debug;

use crate::bridge::ForeignCallBridge;
use crate::config::HostConfig;
use crate::error::Result;
use crate::headless::HeadlessDocument;
use crate::surface::Surface;
use crate::types::HostCapabilities;
use crate::window::HostWindow;

pub struct Host {
    bridge: Rc<dyn ForeignCallBridge>,
    config: HostConfig,
}

impl Host {
    pub fn new(bridge: Rc<dyn ForeignCallBridge>, config: HostConfig) -> Result<Self> {
        config.validate()?;
        debug!("host bound (capabilities: {:?})", bridge.capabilities());
        Ok(Self { bridge, config })
    }

    /// An in-memory host. The document is returned too, for inspection.
    pub fn headless(config: HostConfig) -> Result<(Self, Rc<HeadlessDocument>)> {
        config.validate()?;
        let doc = Rc::new(HeadlessDocument::new(config.clone()));
        let host = Self::new(doc.clone(), config)?;
        Ok((host, doc))
    }

    /// The browser document this module is running in.
    #[cfg(target_arch = "wasm32")]
    pub fn dom(config: HostConfig) -> Result<Self> {
        let bridge = crate::dom::DomBridge::new()?;
        Self::new(Rc::new(bridge), config)
    }

    /// Find or create the surface named `identity` and bind a proxy to it.
    pub fn create_surface(&self, identity: &str) -> Result<Surface> {
        Surface::create(Rc::clone(&self.bridge), identity)
    }

    pub fn window(&self) -> HostWindow {
        HostWindow::new(Rc::clone(&self.bridge))
    }

    pub fn capabilities(&self) -> HostCapabilities {
        self.bridge.capabilities()
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn bridge(&self) -> &Rc<dyn ForeignCallBridge> {
        &self.bridge
    }
}
