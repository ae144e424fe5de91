//! Surface Module — the local proxy for one foreign drawing surface.
//!
//! Responsibilities:
//! - Find-or-create the foreign surface by identity
//! - Pass-through width/height (never cached; the host may resize at any time)
//! - Lazily create the single 2-D context and keep it for the surface's life
//!
//! Destroying a `Surface` releases the proxy, its context and every cached
//! style string. The foreign surface itself stays in the host document, so a
//! later `create` with the same identity re-attaches to it.

use std::rc::Rc;

use log::{debug, warn};

use crate::bridge::{Arg, ForeignCallBridge};
use crate::context2d::RenderingContext2d;
use crate::error::{CanvasError, Result};
use crate::types::{ContextKind, ForeignOp, SurfaceId};

pub struct Surface {
    id: SurfaceId,
    bridge: Rc<dyn ForeignCallBridge>,
    context: Option<RenderingContext2d>,
}

impl Surface {
    /// Bind a proxy to the foreign surface named `identity`, creating the
    /// surface on the host if it does not exist yet.
    pub fn create(bridge: Rc<dyn ForeignCallBridge>, identity: &str) -> Result<Self> {
        if identity.is_empty() {
            return Err(CanvasError::EmptyIdentity);
        }
        bridge.call_void(ForeignOp::EnsureSurface, &[Arg::Str(identity)])?;
        debug!("surface `{identity}` attached");
        Ok(Self {
            id: SurfaceId::new(identity),
            bridge,
            context: None,
        })
    }

    pub fn id(&self) -> &SurfaceId {
        &self.id
    }

    fn query_int(&self, op: ForeignOp) -> Result<i32> {
        Ok(self.bridge.call_int(op, &[Arg::Str(self.id.as_str())])?)
    }

    fn update_int(&self, op: ForeignOp, value: i32) -> Result<()> {
        self.bridge
            .call_void(op, &[Arg::Str(self.id.as_str()), Arg::Int(value)])?;
        Ok(())
    }

    pub fn width(&self) -> Result<i32> {
        self.query_int(ForeignOp::GetWidth)
    }

    pub fn height(&self) -> Result<i32> {
        self.query_int(ForeignOp::GetHeight)
    }

    /// A negative value asks the host for its default width.
    pub fn set_width(&self, value: i32) -> Result<()> {
        self.update_int(ForeignOp::SetWidth, value)
    }

    /// A negative value asks the host for its default height.
    pub fn set_height(&self, value: i32) -> Result<()> {
        self.update_int(ForeignOp::SetHeight, value)
    }

    /// The surface's drawing context, created on first request.
    ///
    /// Returns `Ok(None)` when no context exists yet and `kind` is not a
    /// supported family. Once a context exists it is returned for every
    /// `kind`, so a surface never holds more than one.
    pub fn get_context(&mut self, kind: &str) -> Result<Option<&mut RenderingContext2d>> {
        if self.context.is_none() {
            let Some(family) = ContextKind::from_tag(kind) else {
                warn!("surface `{}`: unsupported context kind `{kind}`", self.id);
                return Ok(None);
            };
            self.bridge.call_void(
                ForeignOp::AcquireContext,
                &[Arg::Str(self.id.as_str()), Arg::Str(family.tag())],
            )?;
            debug!("surface `{}`: {} context created", self.id, family.tag());
            self.context = Some(RenderingContext2d::new(
                self.id.clone(),
                family,
                Rc::clone(&self.bridge),
            ));
        }
        Ok(self.context.as_mut())
    }

    pub fn context(&self) -> Option<&RenderingContext2d> {
        self.context.as_ref()
    }

    pub fn context_mut(&mut self) -> Option<&mut RenderingContext2d> {
        self.context.as_mut()
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    /// Release the proxy, its context and the context's cached strings.
    /// Consuming `self` makes a second destroy unrepresentable.
    pub fn destroy(self) {
        debug!(
            "surface `{}` released (context: {})",
            self.id,
            self.context.is_some()
        );
    }
}
