//! RenderingContext2d — the 2-D drawing handle owned by a surface.
//!
//! Drawing, path, transform and state-stack calls are forwarded one-to-one.
//! Numeric properties always re-query the host. String properties are read
//! through the style cache: each read releases the previous value for that
//! property, fetches a new one, and lends it out until the next read of the
//! same property or the owning surface's teardown. Writes go straight to the
//! host and leave the cache alone.

use std::rc::Rc;

use crate::bridge::{Arg, ForeignCallBridge, ForeignString};
use crate::cache::StyleCache;
use crate::error::Result;
use crate::types::{ContextKind, ForeignOp, LineCap, LineJoin, NumericProperty, StyleProperty, SurfaceId};

pub struct RenderingContext2d {
    owner: SurfaceId,
    kind: ContextKind,
    bridge: Rc<dyn ForeignCallBridge>,
    styles: StyleCache,
}

impl RenderingContext2d {
    /// Only `Surface::get_context` builds these, after the host has agreed.
    pub(crate) fn new(owner: SurfaceId, kind: ContextKind, bridge: Rc<dyn ForeignCallBridge>) -> Self {
        Self {
            owner,
            kind,
            bridge,
            styles: StyleCache::new(),
        }
    }

    /// Identity of the surface this context draws on.
    pub fn canvas(&self) -> &SurfaceId {
        &self.owner
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    fn forward(&self, op: ForeignOp, numbers: &[f64]) -> Result<()> {
        let mut args = Vec::with_capacity(numbers.len() + 1);
        args.push(Arg::Str(self.owner.as_str()));
        args.extend(numbers.iter().map(|&n| Arg::Double(n)));
        self.bridge.call_void(op, &args)?;
        Ok(())
    }

    fn query_flag(&self, op: ForeignOp, x: f64, y: f64) -> Result<bool> {
        let args = [Arg::Str(self.owner.as_str()), Arg::Double(x), Arg::Double(y)];
        Ok(self.bridge.call_int(op, &args)? != 0)
    }

    // ------------------------------------------------------------------
    // Rectangles
    // ------------------------------------------------------------------

    pub fn clear_rect(&self, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
        self.forward(ForeignOp::ClearRect, &[x, y, width, height])
    }

    pub fn fill_rect(&self, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
        self.forward(ForeignOp::FillRect, &[x, y, width, height])
    }

    pub fn stroke_rect(&self, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
        self.forward(ForeignOp::StrokeRect, &[x, y, width, height])
    }

    // ------------------------------------------------------------------
    // Text
    // ------------------------------------------------------------------

    /// `max_width` of `None`, or a negative value, omits the argument.
    pub fn fill_text(&self, text: &str, x: f64, y: f64, max_width: Option<f64>) -> Result<()> {
        self.draw_text(ForeignOp::FillText, text, x, y, max_width)
    }

    /// `max_width` of `None`, or a negative value, omits the argument.
    pub fn stroke_text(&self, text: &str, x: f64, y: f64, max_width: Option<f64>) -> Result<()> {
        self.draw_text(ForeignOp::StrokeText, text, x, y, max_width)
    }

    fn draw_text(
        &self,
        op: ForeignOp,
        text: &str,
        x: f64,
        y: f64,
        max_width: Option<f64>,
    ) -> Result<()> {
        let id = Arg::Str(self.owner.as_str());
        // The host call has a different arity with and without maxWidth.
        match max_width.filter(|w| *w >= 0.0) {
            Some(w) => self.bridge.call_void(
                op,
                &[id, Arg::Str(text), Arg::Double(x), Arg::Double(y), Arg::Double(w)],
            )?,
            None => self
                .bridge
                .call_void(op, &[id, Arg::Str(text), Arg::Double(x), Arg::Double(y)])?,
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Paths
    // ------------------------------------------------------------------

    pub fn begin_path(&self) -> Result<()> {
        self.forward(ForeignOp::BeginPath, &[])
    }

    pub fn close_path(&self) -> Result<()> {
        self.forward(ForeignOp::ClosePath, &[])
    }

    pub fn move_to(&self, x: f64, y: f64) -> Result<()> {
        self.forward(ForeignOp::MoveTo, &[x, y])
    }

    pub fn line_to(&self, x: f64, y: f64) -> Result<()> {
        self.forward(ForeignOp::LineTo, &[x, y])
    }

    pub fn bezier_curve_to(
        &self,
        cp1x: f64,
        cp1y: f64,
        cp2x: f64,
        cp2y: f64,
        x: f64,
        y: f64,
    ) -> Result<()> {
        self.forward(ForeignOp::BezierCurveTo, &[cp1x, cp1y, cp2x, cp2y, x, y])
    }

    pub fn quadratic_curve_to(&self, cpx: f64, cpy: f64, x: f64, y: f64) -> Result<()> {
        self.forward(ForeignOp::QuadraticCurveTo, &[cpx, cpy, x, y])
    }

    pub fn arc(&self, x: f64, y: f64, radius: f64, start_angle: f64, end_angle: f64) -> Result<()> {
        self.forward(ForeignOp::Arc, &[x, y, radius, start_angle, end_angle])
    }

    pub fn arc_to(&self, x1: f64, y1: f64, x2: f64, y2: f64, radius: f64) -> Result<()> {
        self.forward(ForeignOp::ArcTo, &[x1, y1, x2, y2, radius])
    }

    #[allow(clippy::too_many_arguments)]
    pub fn ellipse(
        &self,
        x: f64,
        y: f64,
        radius_x: f64,
        radius_y: f64,
        rotation: f64,
        start_angle: f64,
        end_angle: f64,
    ) -> Result<()> {
        self.forward(
            ForeignOp::Ellipse,
            &[x, y, radius_x, radius_y, rotation, start_angle, end_angle],
        )
    }

    pub fn rect(&self, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
        self.forward(ForeignOp::Rect, &[x, y, width, height])
    }

    pub fn fill(&self) -> Result<()> {
        self.forward(ForeignOp::Fill, &[])
    }

    pub fn stroke(&self) -> Result<()> {
        self.forward(ForeignOp::Stroke, &[])
    }

    pub fn clip(&self) -> Result<()> {
        self.forward(ForeignOp::Clip, &[])
    }

    pub fn is_point_in_path(&self, x: f64, y: f64) -> Result<bool> {
        self.query_flag(ForeignOp::IsPointInPath, x, y)
    }

    pub fn is_point_in_stroke(&self, x: f64, y: f64) -> Result<bool> {
        self.query_flag(ForeignOp::IsPointInStroke, x, y)
    }

    // ------------------------------------------------------------------
    // Transforms and the state stack
    // ------------------------------------------------------------------

    pub fn rotate(&self, angle: f64) -> Result<()> {
        self.forward(ForeignOp::Rotate, &[angle])
    }

    pub fn scale(&self, x: f64, y: f64) -> Result<()> {
        self.forward(ForeignOp::Scale, &[x, y])
    }

    pub fn translate(&self, x: f64, y: f64) -> Result<()> {
        self.forward(ForeignOp::Translate, &[x, y])
    }

    pub fn transform(&self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<()> {
        self.forward(ForeignOp::Transform, &[a, b, c, d, e, f])
    }

    pub fn set_transform(&self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<()> {
        self.forward(ForeignOp::SetTransform, &[a, b, c, d, e, f])
    }

    pub fn reset_transform(&self) -> Result<()> {
        self.forward(ForeignOp::ResetTransform, &[])
    }

    pub fn save(&self) -> Result<()> {
        self.forward(ForeignOp::Save, &[])
    }

    pub fn restore(&self) -> Result<()> {
        self.forward(ForeignOp::Restore, &[])
    }

    // ------------------------------------------------------------------
    // Numeric properties (never cached)
    // ------------------------------------------------------------------

    pub fn number(&self, prop: NumericProperty) -> Result<f64> {
        let args = [Arg::Str(self.owner.as_str())];
        Ok(self.bridge.call_double(ForeignOp::GetNumber(prop), &args)?)
    }

    pub fn set_number(&self, prop: NumericProperty, value: f64) -> Result<()> {
        let args = [Arg::Str(self.owner.as_str()), Arg::Double(value)];
        self.bridge.call_void(ForeignOp::SetNumber(prop), &args)?;
        Ok(())
    }

    pub fn line_width(&self) -> Result<f64> {
        self.number(NumericProperty::LineWidth)
    }

    pub fn set_line_width(&self, value: f64) -> Result<()> {
        self.set_number(NumericProperty::LineWidth, value)
    }

    pub fn global_alpha(&self) -> Result<f64> {
        self.number(NumericProperty::GlobalAlpha)
    }

    pub fn set_global_alpha(&self, value: f64) -> Result<()> {
        self.set_number(NumericProperty::GlobalAlpha, value)
    }

    // ------------------------------------------------------------------
    // String properties (cached until the next read)
    // ------------------------------------------------------------------

    /// Fetch `prop` from the host into the cache and lend it out.
    pub fn style(&mut self, prop: StyleProperty) -> Result<&ForeignString> {
        let bridge = &self.bridge;
        let args = [Arg::Str(self.owner.as_str())];
        let value = self
            .styles
            .refresh(prop, || bridge.call_allocating_string(ForeignOp::GetStyle(prop), &args))?;
        Ok(value)
    }

    /// Write `prop` on the host. The value is passed through uninterpreted;
    /// the host decides whether to accept or normalize it.
    pub fn set_style(&self, prop: StyleProperty, value: &str) -> Result<()> {
        let args = [Arg::Str(self.owner.as_str()), Arg::Str(value)];
        self.bridge.call_void(ForeignOp::SetStyle(prop), &args)?;
        Ok(())
    }

    /// The value last fetched for `prop`, with no round trip.
    pub fn cached_style(&self, prop: StyleProperty) -> Option<&ForeignString> {
        self.styles.peek(prop)
    }

    /// Number of style properties currently holding a fetched value.
    pub fn cached_style_count(&self) -> usize {
        self.styles.live()
    }

    pub fn font(&mut self) -> Result<&str> {
        Ok(self.style(StyleProperty::Font)?.as_str())
    }

    pub fn set_font(&self, value: &str) -> Result<()> {
        self.set_style(StyleProperty::Font, value)
    }

    pub fn text_align(&mut self) -> Result<&str> {
        Ok(self.style(StyleProperty::TextAlign)?.as_str())
    }

    pub fn set_text_align(&self, value: &str) -> Result<()> {
        self.set_style(StyleProperty::TextAlign, value)
    }

    pub fn fill_style(&mut self) -> Result<&str> {
        Ok(self.style(StyleProperty::FillStyle)?.as_str())
    }

    pub fn set_fill_style(&self, value: &str) -> Result<()> {
        self.set_style(StyleProperty::FillStyle, value)
    }

    pub fn stroke_style(&mut self) -> Result<&str> {
        Ok(self.style(StyleProperty::StrokeStyle)?.as_str())
    }

    pub fn set_stroke_style(&self, value: &str) -> Result<()> {
        self.set_style(StyleProperty::StrokeStyle, value)
    }

    pub fn line_cap(&mut self) -> Result<&str> {
        Ok(self.style(StyleProperty::LineCap)?.as_str())
    }

    /// Accepts any token; `butt`, `round` and `square` are the ones a host honours.
    pub fn set_line_cap(&self, value: &str) -> Result<()> {
        self.set_style(StyleProperty::LineCap, value)
    }

    /// `line_cap` read through the integer presentation.
    pub fn line_cap_kind(&mut self) -> Result<Option<LineCap>> {
        Ok(LineCap::from_token(self.line_cap()?))
    }

    pub fn line_join(&mut self) -> Result<&str> {
        Ok(self.style(StyleProperty::LineJoin)?.as_str())
    }

    /// Accepts any token; `round`, `bevel` and `miter` are the ones a host honours.
    pub fn set_line_join(&self, value: &str) -> Result<()> {
        self.set_style(StyleProperty::LineJoin, value)
    }

    pub fn line_join_kind(&mut self) -> Result<Option<LineJoin>> {
        Ok(LineJoin::from_token(self.line_join()?))
    }

    pub fn global_composite_operation(&mut self) -> Result<&str> {
        Ok(self.style(StyleProperty::GlobalCompositeOperation)?.as_str())
    }

    pub fn set_global_composite_operation(&self, value: &str) -> Result<()> {
        self.set_style(StyleProperty::GlobalCompositeOperation, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{MockBridge, OwnedArg};
    use crate::error::CanvasError;
    use crate::headless::HeadlessDocument;

    fn headless_ctx() -> (Rc<HeadlessDocument>, RenderingContext2d) {
        let doc = Rc::new(HeadlessDocument::default());
        doc.call_void(ForeignOp::EnsureSurface, &[Arg::Str("s1")]).unwrap();
        doc.call_void(ForeignOp::AcquireContext, &[Arg::Str("s1"), Arg::Str("2d")])
            .unwrap();
        let bridge: Rc<dyn ForeignCallBridge> = doc.clone();
        let ctx = RenderingContext2d::new(SurfaceId::new("s1"), ContextKind::TwoD, bridge);
        (doc, ctx)
    }

    fn mock_ctx() -> (Rc<MockBridge>, RenderingContext2d) {
        let mock = Rc::new(MockBridge::new());
        let bridge: Rc<dyn ForeignCallBridge> = mock.clone();
        let ctx = RenderingContext2d::new(SurfaceId::new("m"), ContextKind::TwoD, bridge);
        (mock, ctx)
    }

    #[test]
    fn test_forwarding_is_one_to_one() {
        let (mock, ctx) = mock_ctx();
        ctx.fill_rect(1.0, 2.0, 3.0, 4.0).unwrap();
        ctx.begin_path().unwrap();
        ctx.arc(5.0, 5.0, 2.0, 0.0, 1.5).unwrap();
        ctx.save().unwrap();
        ctx.restore().unwrap();
        assert_eq!(
            mock.ops(),
            vec![
                ForeignOp::FillRect,
                ForeignOp::BeginPath,
                ForeignOp::Arc,
                ForeignOp::Save,
                ForeignOp::Restore
            ]
        );
        let (_, args) = mock.calls.borrow()[0].clone();
        assert_eq!(
            args,
            vec![
                OwnedArg::Str("m".to_string()),
                OwnedArg::Double(1.0),
                OwnedArg::Double(2.0),
                OwnedArg::Double(3.0),
                OwnedArg::Double(4.0)
            ]
        );
    }

    #[test]
    fn test_text_without_max_width_uses_short_form() {
        let (mock, ctx) = mock_ctx();
        ctx.fill_text("hi", 1.0, 2.0, None).unwrap();
        assert_eq!(mock.last_call().unwrap().1.len(), 4);

        ctx.stroke_text("hi", 1.0, 2.0, Some(-1.0)).unwrap();
        let (op, args) = mock.last_call().unwrap();
        assert_eq!(op, ForeignOp::StrokeText);
        assert_eq!(args.len(), 4);

        ctx.fill_text("hi", 1.0, 2.0, Some(80.0)).unwrap();
        let (_, args) = mock.last_call().unwrap();
        assert_eq!(args.len(), 5);
        assert_eq!(args[4], OwnedArg::Double(80.0));
    }

    #[test]
    fn test_zero_max_width_is_passed() {
        let (mock, ctx) = mock_ctx();
        ctx.fill_text("hi", 0.0, 0.0, Some(0.0)).unwrap();
        assert_eq!(mock.last_call().unwrap().1.len(), 5);
    }

    #[test]
    fn test_point_queries_map_int_to_bool() {
        let (mock, ctx) = mock_ctx();
        mock.int_result.set(1);
        assert!(ctx.is_point_in_path(1.0, 1.0).unwrap());
        mock.int_result.set(0);
        assert!(!ctx.is_point_in_stroke(1.0, 1.0).unwrap());
    }

    #[test]
    fn test_numeric_reads_are_never_cached() {
        let (mock, ctx) = mock_ctx();
        mock.double_result.set(2.0);
        assert_eq!(ctx.line_width().unwrap(), 2.0);
        mock.double_result.set(7.0);
        assert_eq!(ctx.line_width().unwrap(), 7.0);
        assert_eq!(mock.ops().len(), 2);
    }

    #[test]
    fn test_get_set_get_refetches() {
        let (doc, mut ctx) = headless_ctx();
        assert_eq!(ctx.fill_style().unwrap(), "#000000");
        ctx.set_fill_style("#00FF00").unwrap();
        assert_eq!(ctx.cached_style(StyleProperty::FillStyle).unwrap(), "#000000");
        assert_eq!(ctx.fill_style().unwrap(), "#00ff00");

        let gets = doc
            .journal()
            .iter()
            .filter(|e| e.op == ForeignOp::GetStyle(StyleProperty::FillStyle))
            .count();
        assert_eq!(gets, 2);
    }

    #[test]
    fn test_host_side_style_change_is_seen() {
        let (doc, mut ctx) = headless_ctx();
        let ledger = doc.ledger();
        assert_eq!(ctx.font().unwrap(), "10px sans-serif");

        doc.host_set_style("s1", StyleProperty::Font, "bold 12px serif")
            .unwrap();
        assert_eq!(ctx.cached_style(StyleProperty::Font).unwrap(), "10px sans-serif");
        assert_eq!(ctx.font().unwrap(), "bold 12px serif");
        assert_eq!(ledger.live(), 1);
    }

    #[test]
    fn test_line_cap_round_trip() {
        let (_doc, mut ctx) = headless_ctx();
        ctx.set_line_cap("round").unwrap();
        assert_eq!(ctx.line_cap().unwrap(), "round");
        assert_eq!(ctx.line_cap_kind().unwrap(), Some(LineCap::Round));
        assert_eq!(LineCap::Round as u8, 1);
    }

    #[test]
    fn test_line_join_kind_unknown_token() {
        let (mock, mut ctx) = mock_ctx();
        *mock.string_result.borrow_mut() = "wobbly".to_string();
        assert_eq!(ctx.line_join_kind().unwrap(), None);
    }

    #[test]
    fn test_repeated_reads_do_not_leak() {
        let (doc, mut ctx) = headless_ctx();
        let ledger = doc.ledger();
        for _ in 0..50 {
            ctx.font().unwrap();
        }
        assert_eq!(ledger.live(), 1);
        assert_eq!(ledger.total_allocated(), 50);

        for prop in StyleProperty::ALL {
            ctx.style(prop).unwrap();
        }
        assert_eq!(ledger.live(), StyleProperty::COUNT);
        assert_eq!(ctx.cached_style_count(), StyleProperty::COUNT);

        drop(ctx);
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn test_set_passes_unknown_tokens_through() {
        let (mock, ctx) = mock_ctx();
        ctx.set_line_join("wobbly").unwrap();
        let (op, args) = mock.last_call().unwrap();
        assert_eq!(op, ForeignOp::SetStyle(StyleProperty::LineJoin));
        assert_eq!(args[1], OwnedArg::Str("wobbly".to_string()));
    }

    #[test]
    fn test_foreign_failure_propagates() {
        let (mock, mut ctx) = mock_ctx();
        mock.fail_on.set(Some(ForeignOp::GetStyle(StyleProperty::Font)));
        assert!(matches!(ctx.font(), Err(CanvasError::Foreign(_))));
        assert!(ctx.cached_style(StyleProperty::Font).is_none());

        mock.fail_on.set(Some(ForeignOp::Stroke));
        assert!(ctx.stroke().is_err());
        // Exactly one attempt, no retry.
        let strokes = mock.ops().iter().filter(|op| **op == ForeignOp::Stroke).count();
        assert_eq!(strokes, 1);
    }

    #[test]
    fn test_canvas_back_reference() {
        let (_doc, ctx) = headless_ctx();
        assert_eq!(ctx.canvas().as_str(), "s1");
        assert_eq!(ctx.kind(), ContextKind::TwoD);
    }
}
