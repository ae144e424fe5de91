//! DomBridge — the browser host, reached through `web-sys`.
//!
//! Surfaces are `<canvas>` elements looked up by DOM id and appended to
//! `<body>` when missing. Every call re-resolves the element and its 2-D
//! context, so nothing on this side can go stale when page script moves or
//! resizes a canvas between calls.

use std::rc::Rc;

use js_sys::Reflect;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, Window};

use crate::bridge::{AllocationLedger, Arg, CallArgs, ForeignCallBridge, ForeignString};
use crate::error::BridgeError;
use crate::types::{ContextKind, ForeignOp, HostCapabilities, DEFAULT_HEIGHT, DEFAULT_WIDTH};

fn js_err(op: ForeignOp) -> impl Fn(JsValue) -> BridgeError {
    move |e| BridgeError::Host(format!("{op}: {}", e.as_string().unwrap_or_else(|| format!("{e:?}"))))
}

pub struct DomBridge {
    window: Window,
    document: Document,
    ledger: Rc<AllocationLedger>,
}

impl DomBridge {
    pub fn new() -> Result<Self, BridgeError> {
        let window = web_sys::window().ok_or_else(|| BridgeError::Host("no window".to_string()))?;
        let document = window
            .document()
            .ok_or_else(|| BridgeError::Host("no document".to_string()))?;
        Ok(Self {
            window,
            document,
            ledger: AllocationLedger::new(),
        })
    }

    fn canvas(&self, args: &CallArgs<'_, '_>) -> Result<HtmlCanvasElement, BridgeError> {
        let id = args.identity()?;
        self.document
            .get_element_by_id(id)
            .and_then(|el| el.dyn_into::<HtmlCanvasElement>().ok())
            .ok_or_else(|| BridgeError::UnknownSurface(id.to_string()))
    }

    fn ensure_canvas(&self, op: ForeignOp, id: &str) -> Result<(), BridgeError> {
        if let Some(el) = self.document.get_element_by_id(id) {
            if el.is::<HtmlCanvasElement>() {
                return Ok(());
            }
            return Err(BridgeError::Rejected {
                op,
                reason: format!("element `{id}` is not a canvas"),
            });
        }
        log::debug!("dom: creating canvas `{id}`");
        let el = self.document.create_element("canvas").map_err(js_err(op))?;
        el.set_id(id);
        let body = self
            .document
            .body()
            .ok_or_else(|| BridgeError::Host("document has no body".to_string()))?;
        body.append_child(&el).map_err(js_err(op))?;
        Ok(())
    }

    fn context(&self, op: ForeignOp, args: &CallArgs<'_, '_>) -> Result<CanvasRenderingContext2d, BridgeError> {
        let canvas = self.canvas(args)?;
        canvas
            .get_context(ContextKind::TwoD.tag())
            .map_err(js_err(op))?
            .and_then(|obj| obj.dyn_into::<CanvasRenderingContext2d>().ok())
            .ok_or_else(|| BridgeError::Rejected {
                op,
                reason: "canvas has no 2d context".to_string(),
            })
    }

    fn window_metric(&self, op: ForeignOp) -> Result<i32, BridgeError> {
        let value = match op {
            ForeignOp::InnerWidth => self.window.inner_width(),
            ForeignOp::InnerHeight => self.window.inner_height(),
            ForeignOp::OuterWidth => self.window.outer_width(),
            ForeignOp::OuterHeight => self.window.outer_height(),
            _ => return Err(unsupported(op)),
        }
        .map_err(js_err(op))?;
        value
            .as_f64()
            .map(|v| v as i32)
            .ok_or_else(|| BridgeError::Host(format!("{op}: not a number")))
    }
}

fn unsupported(op: ForeignOp) -> BridgeError {
    BridgeError::Rejected {
        op,
        reason: "not available for this return type".to_string(),
    }
}

impl ForeignCallBridge for DomBridge {
    fn call_void(&self, op: ForeignOp, args: &[Arg<'_>]) -> Result<(), BridgeError> {
        let a = CallArgs::new(op, args);
        log::trace!("dom: {op} {args:?}");
        let err = js_err(op);
        match op {
            ForeignOp::EnsureSurface => return self.ensure_canvas(op, a.identity()?),
            ForeignOp::AcquireContext => {
                let tag = a.str_at(1)?;
                if ContextKind::from_tag(tag).is_none() {
                    return Err(BridgeError::Rejected {
                        op,
                        reason: format!("unsupported context kind `{tag}`"),
                    });
                }
                self.context(op, &a)?;
            }
            ForeignOp::SetWidth => {
                let v = a.int_at(1)?;
                let v = if v < 0 { DEFAULT_WIDTH } else { v };
                self.canvas(&a)?.set_width(v as u32);
            }
            ForeignOp::SetHeight => {
                let v = a.int_at(1)?;
                let v = if v < 0 { DEFAULT_HEIGHT } else { v };
                self.canvas(&a)?.set_height(v as u32);
            }
            ForeignOp::Blur => self.window.blur().map_err(&err)?,
            ForeignOp::FillText | ForeignOp::StrokeText => {
                let ctx = self.context(op, &a)?;
                let text = a.str_at(1)?;
                let [x, y] = a.f64s::<2>(2)?;
                let fill = op == ForeignOp::FillText;
                match (a.len() > 4, fill) {
                    (true, true) => ctx.fill_text_with_max_width(text, x, y, a.f64_at(4)?),
                    (true, false) => ctx.stroke_text_with_max_width(text, x, y, a.f64_at(4)?),
                    (false, true) => ctx.fill_text(text, x, y),
                    (false, false) => ctx.stroke_text(text, x, y),
                }
                .map_err(&err)?;
            }
            ForeignOp::SetStyle(prop) => {
                let ctx = self.context(op, &a)?;
                let value = a.str_at(1)?;
                Reflect::set(&ctx, &JsValue::from_str(prop.host_name()), &JsValue::from_str(value))
                    .map_err(&err)?;
            }
            ForeignOp::SetNumber(prop) => {
                let ctx = self.context(op, &a)?;
                let value = a.f64_at(1)?;
                Reflect::set(&ctx, &JsValue::from_str(prop.host_name()), &JsValue::from_f64(value))
                    .map_err(&err)?;
            }
            _ => {
                let ctx = self.context(op, &a)?;
                match op {
                    ForeignOp::ClearRect => {
                        let [x, y, w, h] = a.f64s::<4>(1)?;
                        ctx.clear_rect(x, y, w, h);
                    }
                    ForeignOp::FillRect => {
                        let [x, y, w, h] = a.f64s::<4>(1)?;
                        ctx.fill_rect(x, y, w, h);
                    }
                    ForeignOp::StrokeRect => {
                        let [x, y, w, h] = a.f64s::<4>(1)?;
                        ctx.stroke_rect(x, y, w, h);
                    }
                    ForeignOp::BeginPath => ctx.begin_path(),
                    ForeignOp::ClosePath => ctx.close_path(),
                    ForeignOp::MoveTo => {
                        let [x, y] = a.f64s::<2>(1)?;
                        ctx.move_to(x, y);
                    }
                    ForeignOp::LineTo => {
                        let [x, y] = a.f64s::<2>(1)?;
                        ctx.line_to(x, y);
                    }
                    ForeignOp::BezierCurveTo => {
                        let [c1x, c1y, c2x, c2y, x, y] = a.f64s::<6>(1)?;
                        ctx.bezier_curve_to(c1x, c1y, c2x, c2y, x, y);
                    }
                    ForeignOp::QuadraticCurveTo => {
                        let [cx, cy, x, y] = a.f64s::<4>(1)?;
                        ctx.quadratic_curve_to(cx, cy, x, y);
                    }
                    ForeignOp::Arc => {
                        let [x, y, r, s, e] = a.f64s::<5>(1)?;
                        ctx.arc(x, y, r, s, e).map_err(&err)?;
                    }
                    ForeignOp::ArcTo => {
                        let [x1, y1, x2, y2, r] = a.f64s::<5>(1)?;
                        ctx.arc_to(x1, y1, x2, y2, r).map_err(&err)?;
                    }
                    ForeignOp::Ellipse => {
                        let [x, y, rx, ry, rot, s, e] = a.f64s::<7>(1)?;
                        ctx.ellipse(x, y, rx, ry, rot, s, e).map_err(&err)?;
                    }
                    ForeignOp::Rect => {
                        let [x, y, w, h] = a.f64s::<4>(1)?;
                        ctx.rect(x, y, w, h);
                    }
                    ForeignOp::Fill => ctx.fill(),
                    ForeignOp::Stroke => ctx.stroke(),
                    ForeignOp::Clip => ctx.clip(),
                    ForeignOp::Rotate => ctx.rotate(a.f64_at(1)?).map_err(&err)?,
                    ForeignOp::Scale => {
                        let [x, y] = a.f64s::<2>(1)?;
                        ctx.scale(x, y).map_err(&err)?;
                    }
                    ForeignOp::Translate => {
                        let [x, y] = a.f64s::<2>(1)?;
                        ctx.translate(x, y).map_err(&err)?;
                    }
                    ForeignOp::Transform => {
                        let [ma, mb, mc, md, me, mf] = a.f64s::<6>(1)?;
                        ctx.transform(ma, mb, mc, md, me, mf).map_err(&err)?;
                    }
                    ForeignOp::SetTransform => {
                        let [ma, mb, mc, md, me, mf] = a.f64s::<6>(1)?;
                        ctx.set_transform(ma, mb, mc, md, me, mf).map_err(&err)?;
                    }
                    ForeignOp::ResetTransform => ctx.reset_transform().map_err(&err)?,
                    ForeignOp::Save => ctx.save(),
                    ForeignOp::Restore => ctx.restore(),
                    _ => return Err(unsupported(op)),
                }
            }
        }
        Ok(())
    }

    fn call_int(&self, op: ForeignOp, args: &[Arg<'_>]) -> Result<i32, BridgeError> {
        let a = CallArgs::new(op, args);
        log::trace!("dom: {op} {args:?}");
        match op {
            ForeignOp::GetWidth => Ok(self.canvas(&a)?.width() as i32),
            ForeignOp::GetHeight => Ok(self.canvas(&a)?.height() as i32),
            ForeignOp::IsPointInPath => {
                let [x, y] = a.f64s::<2>(1)?;
                Ok(i32::from(self.context(op, &a)?.is_point_in_path_with_f64(x, y)))
            }
            ForeignOp::IsPointInStroke => {
                let [x, y] = a.f64s::<2>(1)?;
                Ok(i32::from(self.context(op, &a)?.is_point_in_stroke_with_x_and_y(x, y)))
            }
            ForeignOp::InnerWidth
            | ForeignOp::InnerHeight
            | ForeignOp::OuterWidth
            | ForeignOp::OuterHeight => self.window_metric(op),
            _ => Err(unsupported(op)),
        }
    }

    fn call_double(&self, op: ForeignOp, args: &[Arg<'_>]) -> Result<f64, BridgeError> {
        let a = CallArgs::new(op, args);
        log::trace!("dom: {op} {args:?}");
        let ForeignOp::GetNumber(prop) = op else {
            return Err(unsupported(op));
        };
        let ctx = self.context(op, &a)?;
        Reflect::get(&ctx, &JsValue::from_str(prop.host_name()))
            .map_err(js_err(op))?
            .as_f64()
            .ok_or_else(|| BridgeError::Host(format!("{op}: not a number")))
    }

    fn call_allocating_string(
        &self,
        op: ForeignOp,
        args: &[Arg<'_>],
    ) -> Result<ForeignString, BridgeError> {
        let a = CallArgs::new(op, args);
        log::trace!("dom: {op} {args:?}");
        let ForeignOp::GetStyle(prop) = op else {
            return Err(unsupported(op));
        };
        let ctx = self.context(op, &a)?;
        // Gradients and patterns are objects; only their string form is reported.
        let value = Reflect::get(&ctx, &JsValue::from_str(prop.host_name())).map_err(js_err(op))?;
        let text = value
            .as_string()
            .unwrap_or_else(|| String::from(js_sys::Object::from(value).to_string()));
        ForeignString::tracked(&text, &self.ledger)
    }

    fn capabilities(&self) -> HostCapabilities {
        HostCapabilities::CONTEXT_2D
            | HostCapabilities::WINDOW_METRICS
            | HostCapabilities::STYLE_NORMALIZATION
    }

    #[cfg(test)]
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
