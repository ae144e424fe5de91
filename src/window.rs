//! HostWindow — read-only window metrics and `blur`.
//!
//! Obtained from [`crate::Host::window`]; there is no global window object.
//! Like surface dimensions, every metric is re-queried on each read.

use std::rc::Rc;

use crate::bridge::ForeignCallBridge;
use crate::error::Result;
use crate::types::ForeignOp;

pub struct HostWindow {
    bridge: Rc<dyn ForeignCallBridge>,
}

impl HostWindow {
    pub(crate) fn new(bridge: Rc<dyn ForeignCallBridge>) -> Self {
        Self { bridge }
    }

    fn metric(&self, op: ForeignOp) -> Result<i32> {
        Ok(self.bridge.call_int(op, &[])?)
    }

    pub fn inner_width(&self) -> Result<i32> {
        self.metric(ForeignOp::InnerWidth)
    }

    pub fn inner_height(&self) -> Result<i32> {
        self.metric(ForeignOp::InnerHeight)
    }

    pub fn outer_width(&self) -> Result<i32> {
        self.metric(ForeignOp::OuterWidth)
    }

    pub fn outer_height(&self) -> Result<i32> {
        self.metric(ForeignOp::OuterHeight)
    }

    /// Remove keyboard focus from the host window.
    pub fn blur(&self) -> Result<()> {
        self.bridge.call_void(ForeignOp::Blur, &[])?;
        Ok(())
    }
}
