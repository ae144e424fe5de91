//! HeadlessDocument — an in-memory host for tests, CI, and native embedding.
//!
//! Plays the part of the browser document: surfaces are found or created by
//! identity, each surface may hold one 2-D drawing state, style writes are
//! normalized the way a browser would, and every call is journaled.
//! Nothing is rasterized.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::bridge::{AllocationLedger, Arg, CallArgs, ForeignCallBridge, ForeignString, OwnedArg};
use crate::config::HostConfig;
use crate::error::BridgeError;
use crate::types::{
    ContextKind, ForeignOp, HostCapabilities, LineCap, LineJoin, NumericProperty, StyleProperty,
};

const TEXT_ALIGN_TOKENS: &[&str] = &["start", "end", "left", "right", "center"];

const COMPOSITE_TOKENS: &[&str] = &[
    "source-over",
    "source-in",
    "source-out",
    "source-atop",
    "destination-over",
    "destination-in",
    "destination-out",
    "destination-atop",
    "lighter",
    "copy",
    "xor",
    "multiply",
    "screen",
    "overlay",
    "darken",
    "lighten",
    "color-dodge",
    "color-burn",
    "hard-light",
    "soft-light",
    "difference",
    "exclusion",
    "hue",
    "saturation",
    "color",
    "luminosity",
];

const NAMED_COLORS: &[(&str, &str)] = &[
    ("black", "#000000"),
    ("white", "#ffffff"),
    ("red", "#ff0000"),
    ("green", "#008000"),
    ("blue", "#0000ff"),
    ("yellow", "#ffff00"),
    ("orange", "#ffa500"),
    ("purple", "#800080"),
    ("gray", "#808080"),
    ("grey", "#808080"),
];

const IDENTITY: [f64; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn default_style(prop: StyleProperty) -> &'static str {
    match prop {
        StyleProperty::Font => "10px sans-serif",
        StyleProperty::TextAlign => "start",
        StyleProperty::FillStyle => "#000000",
        StyleProperty::StrokeStyle => "#000000",
        StyleProperty::LineCap => "butt",
        StyleProperty::LineJoin => "miter",
        StyleProperty::GlobalCompositeOperation => "source-over",
    }
}

// ============================================================================
// Host-side style normalization
// ============================================================================

fn hex_color_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid regex"))
}

fn rgb_color_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^rgb\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*\)$")
            .expect("valid regex")
    })
}

fn font_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(?:normal|italic|oblique|small-caps|bold|bolder|lighter|[1-9]00)\s+)*\d+(?:\.\d+)?(?:px|pt|em|rem|%)(?:/\S+)?\s+\S.*$",
        )
        .expect("valid regex")
    })
}

/// Canonical `#rrggbb` form of a colour, or `None` if the host would ignore it.
fn normalize_color(value: &str) -> Option<String> {
    let value = value.trim();
    let lower = value.to_ascii_lowercase();

    if let Some((_, hex)) = NAMED_COLORS.iter().find(|(name, _)| *name == lower) {
        return Some((*hex).to_string());
    }

    if let Some(caps) = hex_color_re().captures(value) {
        let digits = caps[1].to_ascii_lowercase();
        if digits.len() == 3 {
            let expanded: String = digits.chars().flat_map(|c| [c, c]).collect();
            return Some(format!("#{expanded}"));
        }
        return Some(format!("#{digits}"));
    }

    if let Some(caps) = rgb_color_re().captures(value) {
        let mut rgb = [0u8; 3];
        for (i, slot) in rgb.iter_mut().enumerate() {
            *slot = caps[i + 1].parse::<u8>().ok()?;
        }
        return Some(format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2]));
    }

    None
}

/// What the host would store for `value`, or `None` if it ignores the write.
pub(crate) fn normalize_style(prop: StyleProperty, value: &str) -> Option<String> {
    match prop {
        StyleProperty::Font => {
            let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
            font_re().is_match(&collapsed).then_some(collapsed)
        }
        StyleProperty::TextAlign => TEXT_ALIGN_TOKENS
            .contains(&value)
            .then(|| value.to_string()),
        StyleProperty::FillStyle | StyleProperty::StrokeStyle => normalize_color(value),
        StyleProperty::LineCap => LineCap::from_token(value).map(|c| c.token().to_string()),
        StyleProperty::LineJoin => LineJoin::from_token(value).map(|j| j.token().to_string()),
        StyleProperty::GlobalCompositeOperation => COMPOSITE_TOKENS
            .contains(&value)
            .then(|| value.to_string()),
    }
}

fn accepts_number(prop: NumericProperty, value: f64) -> bool {
    if !value.is_finite() {
        return false;
    }
    match prop {
        NumericProperty::LineWidth => value > 0.0,
        NumericProperty::GlobalAlpha => (0.0..=1.0).contains(&value),
    }
}

// ============================================================================
// Document model
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct DrawState {
    styles: [String; StyleProperty::COUNT],
    line_width: f64,
    global_alpha: f64,
    transform: [f64; 6],
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            styles: StyleProperty::ALL.map(|p| default_style(p).to_string()),
            line_width: 1.0,
            global_alpha: 1.0,
            transform: IDENTITY,
        }
    }
}

#[derive(Debug, Default)]
struct Context2dState {
    current: DrawState,
    stack: Vec<DrawState>,
    /// Rectangle subpaths of the current path, as (x, y, w, h).
    rects: Vec<[f64; 4]>,
    segments: u32,
    paint_calls: u32,
}

impl Context2dState {
    /// `current = current × m` for an affine matrix in (a, b, c, d, e, f) form.
    fn compose(&mut self, m: [f64; 6]) {
        let [a, b, c, d, e, f] = self.current.transform;
        self.current.transform = [
            a * m[0] + c * m[1],
            b * m[0] + d * m[1],
            a * m[2] + c * m[3],
            b * m[2] + d * m[3],
            a * m[4] + c * m[5] + e,
            b * m[4] + d * m[5] + f,
        ];
    }

    fn point_in_rects(&self, x: f64, y: f64) -> bool {
        self.rects.iter().any(|&[rx, ry, rw, rh]| {
            let (x0, x1) = if rw < 0.0 { (rx + rw, rx) } else { (rx, rx + rw) };
            let (y0, y1) = if rh < 0.0 { (ry + rh, ry) } else { (ry, ry + rh) };
            x >= x0 && x <= x1 && y >= y0 && y <= y1
        })
    }
}

#[derive(Debug)]
struct HeadlessSurface {
    width: i32,
    height: i32,
    context: Option<Context2dState>,
}

/// One call as the host received it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalEntry {
    pub op: ForeignOp,
    pub args: Vec<OwnedArg>,
}

enum Reply {
    Unit,
    Int(i32),
    Double(f64),
    Text(String),
}

pub struct HeadlessDocument {
    config: HostConfig,
    surfaces: RefCell<HashMap<String, HeadlessSurface>>,
    journal: RefCell<VecDeque<JournalEntry>>,
    ledger: Rc<AllocationLedger>,
    blur_count: Cell<u32>,
}

impl Default for HeadlessDocument {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}

impl HeadlessDocument {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            surfaces: RefCell::new(HashMap::new()),
            journal: RefCell::new(VecDeque::new()),
            ledger: AllocationLedger::new(),
            blur_count: Cell::new(0),
        }
    }

    /// Allocator family of every string this document hands out.
    pub fn ledger(&self) -> Rc<AllocationLedger> {
        Rc::clone(&self.ledger)
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.borrow().len()
    }

    pub fn has_surface(&self, identity: &str) -> bool {
        self.surfaces.borrow().contains_key(identity)
    }

    pub fn blur_count(&self) -> u32 {
        self.blur_count.get()
    }

    /// Fill/stroke/rect-paint calls the surface's context has received.
    pub fn paint_calls(&self, identity: &str) -> u32 {
        self.surfaces
            .borrow()
            .get(identity)
            .and_then(|s| s.context.as_ref())
            .map_or(0, |c| c.paint_calls)
    }

    pub fn save_depth(&self, identity: &str) -> usize {
        self.surfaces
            .borrow()
            .get(identity)
            .and_then(|s| s.context.as_ref())
            .map_or(0, |c| c.stack.len())
    }

    pub fn transform(&self, identity: &str) -> Option<[f64; 6]> {
        self.surfaces
            .borrow()
            .get(identity)
            .and_then(|s| s.context.as_ref())
            .map(|c| c.current.transform)
    }

    /// Journaled calls, oldest first. Holds at most `journal_capacity` entries.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.borrow().iter().cloned().collect()
    }

    pub fn journal_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&*self.journal.borrow())
    }

    pub fn clear_journal(&self) {
        self.journal.borrow_mut().clear();
    }

    /// Resize a surface from the host side, as a page script would.
    pub fn host_resize(&self, identity: &str, width: i32, height: i32) -> Result<(), BridgeError> {
        let mut surfaces = self.surfaces.borrow_mut();
        let surface = surfaces
            .get_mut(identity)
            .ok_or_else(|| BridgeError::UnknownSurface(identity.to_string()))?;
        surface.width = width;
        surface.height = height;
        Ok(())
    }

    /// Write a style from the host side, bypassing any handle.
    pub fn host_set_style(
        &self,
        identity: &str,
        prop: StyleProperty,
        value: &str,
    ) -> Result<(), BridgeError> {
        let args = [Arg::Str(identity), Arg::Str(value)];
        self.dispatch(ForeignOp::SetStyle(prop), &CallArgs::new(ForeignOp::SetStyle(prop), &args))
            .map(|_| ())
    }

    fn with_surface<T>(
        &self,
        args: &CallArgs<'_, '_>,
        f: impl FnOnce(&mut HeadlessSurface) -> T,
    ) -> Result<T, BridgeError> {
        let identity = args.identity()?;
        let mut surfaces = self.surfaces.borrow_mut();
        let surface = surfaces
            .get_mut(identity)
            .ok_or_else(|| BridgeError::UnknownSurface(identity.to_string()))?;
        Ok(f(surface))
    }

    fn with_context<T>(
        &self,
        op: ForeignOp,
        args: &CallArgs<'_, '_>,
        f: impl FnOnce(&mut Context2dState) -> Result<T, BridgeError>,
    ) -> Result<T, BridgeError> {
        self.with_surface(args, |surface| match surface.context.as_mut() {
            Some(ctx) => f(ctx),
            None => Err(BridgeError::Rejected {
                op,
                reason: "surface has no 2d context".to_string(),
            }),
        })?
    }

    fn dispatch(&self, op: ForeignOp, args: &CallArgs<'_, '_>) -> Result<Reply, BridgeError> {
        let cfg = &self.config;
        let reply = match op {
            ForeignOp::EnsureSurface => {
                let identity = args.identity()?;
                let mut surfaces = self.surfaces.borrow_mut();
                if !surfaces.contains_key(identity) {
                    log::debug!("headless: creating surface `{identity}`");
                    surfaces.insert(
                        identity.to_string(),
                        HeadlessSurface {
                            width: cfg.default_width,
                            height: cfg.default_height,
                            context: None,
                        },
                    );
                }
                Reply::Unit
            }
            ForeignOp::AcquireContext => {
                let tag = args.str_at(1)?;
                if ContextKind::from_tag(tag).is_none() {
                    return Err(BridgeError::Rejected {
                        op,
                        reason: format!("unsupported context kind `{tag}`"),
                    });
                }
                self.with_surface(args, |s| {
                    s.context.get_or_insert_with(Context2dState::default);
                })?;
                Reply::Unit
            }

            ForeignOp::GetWidth => Reply::Int(self.with_surface(args, |s| s.width)?),
            ForeignOp::GetHeight => Reply::Int(self.with_surface(args, |s| s.height)?),
            ForeignOp::SetWidth => {
                let v = args.int_at(1)?;
                self.with_surface(args, |s| {
                    s.width = if v < 0 { cfg.default_width } else { v };
                })?;
                Reply::Unit
            }
            ForeignOp::SetHeight => {
                let v = args.int_at(1)?;
                self.with_surface(args, |s| {
                    s.height = if v < 0 { cfg.default_height } else { v };
                })?;
                Reply::Unit
            }

            ForeignOp::ClearRect | ForeignOp::FillRect | ForeignOp::StrokeRect => {
                args.f64s::<4>(1)?;
                self.with_context(op, args, |c| {
                    c.paint_calls += 1;
                    Ok(())
                })?;
                Reply::Unit
            }
            ForeignOp::FillText | ForeignOp::StrokeText => {
                args.str_at(1)?;
                args.f64s::<2>(2)?;
                if args.len() > 4 {
                    let max_width = args.f64_at(4)?;
                    if max_width < 0.0 {
                        return Err(BridgeError::BadArgument {
                            op,
                            reason: format!("maxWidth must not be negative, got {max_width}"),
                        });
                    }
                }
                self.with_context(op, args, |c| {
                    c.paint_calls += 1;
                    Ok(())
                })?;
                Reply::Unit
            }

            ForeignOp::BeginPath => {
                self.with_context(op, args, |c| {
                    c.rects.clear();
                    c.segments = 0;
                    Ok(())
                })?;
                Reply::Unit
            }
            ForeignOp::ClosePath => {
                self.with_context(op, args, |c| {
                    c.segments += 1;
                    Ok(())
                })?;
                Reply::Unit
            }
            ForeignOp::MoveTo
            | ForeignOp::LineTo
            | ForeignOp::BezierCurveTo
            | ForeignOp::QuadraticCurveTo
            | ForeignOp::Arc
            | ForeignOp::ArcTo
            | ForeignOp::Ellipse => {
                let arity = match op {
                    ForeignOp::MoveTo | ForeignOp::LineTo => 2,
                    ForeignOp::QuadraticCurveTo => 4,
                    ForeignOp::Arc | ForeignOp::ArcTo => 5,
                    ForeignOp::BezierCurveTo => 6,
                    _ => 7,
                };
                for i in 0..arity {
                    args.f64_at(1 + i)?;
                }
                self.with_context(op, args, |c| {
                    c.segments += 1;
                    Ok(())
                })?;
                Reply::Unit
            }
            ForeignOp::Rect => {
                let r = args.f64s::<4>(1)?;
                self.with_context(op, args, |c| {
                    c.rects.push(r);
                    c.segments += 1;
                    Ok(())
                })?;
                Reply::Unit
            }
            ForeignOp::Fill | ForeignOp::Stroke => {
                self.with_context(op, args, |c| {
                    c.paint_calls += 1;
                    Ok(())
                })?;
                Reply::Unit
            }
            ForeignOp::Clip => {
                self.with_context(op, args, |_| Ok(()))?;
                Reply::Unit
            }
            ForeignOp::IsPointInPath => {
                let [x, y] = args.f64s::<2>(1)?;
                let hit = self.with_context(op, args, |c| Ok(c.point_in_rects(x, y)))?;
                Reply::Int(i32::from(hit))
            }
            ForeignOp::IsPointInStroke => {
                args.f64s::<2>(1)?;
                self.with_context(op, args, |_| Ok(()))?;
                Reply::Int(0)
            }

            ForeignOp::Rotate => {
                let angle = args.f64_at(1)?;
                let (sin, cos) = angle.sin_cos();
                self.with_context(op, args, |c| {
                    c.compose([cos, sin, -sin, cos, 0.0, 0.0]);
                    Ok(())
                })?;
                Reply::Unit
            }
            ForeignOp::Scale => {
                let [x, y] = args.f64s::<2>(1)?;
                self.with_context(op, args, |c| {
                    c.compose([x, 0.0, 0.0, y, 0.0, 0.0]);
                    Ok(())
                })?;
                Reply::Unit
            }
            ForeignOp::Translate => {
                let [x, y] = args.f64s::<2>(1)?;
                self.with_context(op, args, |c| {
                    c.compose([1.0, 0.0, 0.0, 1.0, x, y]);
                    Ok(())
                })?;
                Reply::Unit
            }
            ForeignOp::Transform => {
                let m = args.f64s::<6>(1)?;
                self.with_context(op, args, |c| {
                    c.compose(m);
                    Ok(())
                })?;
                Reply::Unit
            }
            ForeignOp::SetTransform => {
                let m = args.f64s::<6>(1)?;
                self.with_context(op, args, |c| {
                    c.current.transform = m;
                    Ok(())
                })?;
                Reply::Unit
            }
            ForeignOp::ResetTransform => {
                self.with_context(op, args, |c| {
                    c.current.transform = IDENTITY;
                    Ok(())
                })?;
                Reply::Unit
            }
            ForeignOp::Save => {
                self.with_context(op, args, |c| {
                    c.stack.push(c.current.clone());
                    Ok(())
                })?;
                Reply::Unit
            }
            ForeignOp::Restore => {
                self.with_context(op, args, |c| {
                    if let Some(saved) = c.stack.pop() {
                        c.current = saved;
                    }
                    Ok(())
                })?;
                Reply::Unit
            }

            ForeignOp::GetStyle(prop) => {
                let value =
                    self.with_context(op, args, |c| Ok(c.current.styles[prop.index()].clone()))?;
                Reply::Text(value)
            }
            ForeignOp::SetStyle(prop) => {
                let value = args.str_at(1)?;
                let stored = if cfg.normalize_styles {
                    normalize_style(prop, value)
                } else {
                    Some(value.to_string())
                };
                self.with_context(op, args, |c| {
                    match stored {
                        Some(v) => c.current.styles[prop.index()] = v,
                        None => log::trace!("headless: ignoring {} = {value:?}", prop.host_name()),
                    }
                    Ok(())
                })?;
                Reply::Unit
            }
            ForeignOp::GetNumber(prop) => {
                let value = self.with_context(op, args, |c| {
                    Ok(match prop {
                        NumericProperty::LineWidth => c.current.line_width,
                        NumericProperty::GlobalAlpha => c.current.global_alpha,
                    })
                })?;
                Reply::Double(value)
            }
            ForeignOp::SetNumber(prop) => {
                let value = args.f64_at(1)?;
                let accept = !cfg.normalize_styles || accepts_number(prop, value);
                self.with_context(op, args, |c| {
                    if accept {
                        match prop {
                            NumericProperty::LineWidth => c.current.line_width = value,
                            NumericProperty::GlobalAlpha => c.current.global_alpha = value,
                        }
                    } else {
                        log::trace!("headless: ignoring {} = {value}", prop.host_name());
                    }
                    Ok(())
                })?;
                Reply::Unit
            }

            ForeignOp::InnerWidth => Reply::Int(cfg.window.inner_width),
            ForeignOp::InnerHeight => Reply::Int(cfg.window.inner_height),
            ForeignOp::OuterWidth => Reply::Int(cfg.window.outer_width),
            ForeignOp::OuterHeight => Reply::Int(cfg.window.outer_height),
            ForeignOp::Blur => {
                self.blur_count.set(self.blur_count.get() + 1);
                Reply::Unit
            }
        };
        Ok(reply)
    }

    fn call(&self, op: ForeignOp, args: &[Arg<'_>]) -> Result<Reply, BridgeError> {
        let call_args = CallArgs::new(op, args);
        let capacity = self.config.journal_capacity;
        if self.config.journal && capacity > 0 {
            let mut journal = self.journal.borrow_mut();
            if journal.len() >= capacity {
                journal.pop_front();
            }
            journal.push_back(JournalEntry {
                op,
                args: call_args.to_owned_args(),
            });
        }
        log::trace!("headless: {op} {args:?}");
        self.dispatch(op, &call_args)
    }
}

fn wrong_reply(op: ForeignOp, expected: &str) -> BridgeError {
    BridgeError::BadArgument {
        op,
        reason: format!("operation does not return {expected}"),
    }
}

impl ForeignCallBridge for HeadlessDocument {
    fn call_void(&self, op: ForeignOp, args: &[Arg<'_>]) -> Result<(), BridgeError> {
        self.call(op, args).map(|_| ())
    }

    fn call_int(&self, op: ForeignOp, args: &[Arg<'_>]) -> Result<i32, BridgeError> {
        match self.call(op, args)? {
            Reply::Int(v) => Ok(v),
            _ => Err(wrong_reply(op, "an int")),
        }
    }

    fn call_double(&self, op: ForeignOp, args: &[Arg<'_>]) -> Result<f64, BridgeError> {
        match self.call(op, args)? {
            Reply::Double(v) => Ok(v),
            Reply::Int(v) => Ok(f64::from(v)),
            _ => Err(wrong_reply(op, "a number")),
        }
    }

    fn call_allocating_string(
        &self,
        op: ForeignOp,
        args: &[Arg<'_>],
    ) -> Result<ForeignString, BridgeError> {
        match self.call(op, args)? {
            Reply::Text(s) => ForeignString::tracked(&s, &self.ledger),
            _ => Err(wrong_reply(op, "a string")),
        }
    }

    fn capabilities(&self) -> HostCapabilities {
        let mut caps = HostCapabilities::CONTEXT_2D | HostCapabilities::WINDOW_METRICS;
        if self.config.journal {
            caps |= HostCapabilities::CALL_JOURNAL;
        }
        if self.config.normalize_styles {
            caps |= HostCapabilities::STYLE_NORMALIZATION;
        }
        caps
    }

    #[cfg(test)]
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_context(id: &str) -> HeadlessDocument {
        let doc = HeadlessDocument::default();
        doc.call_void(ForeignOp::EnsureSurface, &[Arg::Str(id)]).unwrap();
        doc.call_void(ForeignOp::AcquireContext, &[Arg::Str(id), Arg::Str("2d")])
            .unwrap();
        doc
    }

    fn get_style(doc: &HeadlessDocument, id: &str, prop: StyleProperty) -> String {
        doc.call_allocating_string(ForeignOp::GetStyle(prop), &[Arg::Str(id)])
            .unwrap()
            .to_string()
    }

    fn set_style(doc: &HeadlessDocument, id: &str, prop: StyleProperty, v: &str) {
        doc.call_void(ForeignOp::SetStyle(prop), &[Arg::Str(id), Arg::Str(v)])
            .unwrap();
    }

    #[test]
    fn test_ensure_surface_is_find_or_create() {
        let doc = HeadlessDocument::default();
        doc.call_void(ForeignOp::EnsureSurface, &[Arg::Str("a")]).unwrap();
        doc.call_void(ForeignOp::SetWidth, &[Arg::Str("a"), Arg::Int(640)])
            .unwrap();
        doc.call_void(ForeignOp::EnsureSurface, &[Arg::Str("a")]).unwrap();
        assert_eq!(doc.surface_count(), 1);
        assert_eq!(
            doc.call_int(ForeignOp::GetWidth, &[Arg::Str("a")]).unwrap(),
            640
        );
    }

    #[test]
    fn test_default_dimensions() {
        let doc = HeadlessDocument::default();
        doc.call_void(ForeignOp::EnsureSurface, &[Arg::Str("a")]).unwrap();
        assert_eq!(doc.call_int(ForeignOp::GetWidth, &[Arg::Str("a")]).unwrap(), 300);
        assert_eq!(doc.call_int(ForeignOp::GetHeight, &[Arg::Str("a")]).unwrap(), 150);
    }

    #[test]
    fn test_negative_dimension_resets_to_default() {
        let doc = HeadlessDocument::default();
        doc.call_void(ForeignOp::EnsureSurface, &[Arg::Str("a")]).unwrap();
        doc.call_void(ForeignOp::SetHeight, &[Arg::Str("a"), Arg::Int(900)])
            .unwrap();
        doc.call_void(ForeignOp::SetHeight, &[Arg::Str("a"), Arg::Int(-4)])
            .unwrap();
        assert_eq!(doc.call_int(ForeignOp::GetHeight, &[Arg::Str("a")]).unwrap(), 150);
    }

    #[test]
    fn test_unknown_surface_fails() {
        let doc = HeadlessDocument::default();
        let err = doc.call_int(ForeignOp::GetWidth, &[Arg::Str("ghost")]).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownSurface(ref id) if id == "ghost"));
    }

    #[test]
    fn test_acquire_rejects_unknown_kind() {
        let doc = HeadlessDocument::default();
        doc.call_void(ForeignOp::EnsureSurface, &[Arg::Str("a")]).unwrap();
        let err = doc
            .call_void(ForeignOp::AcquireContext, &[Arg::Str("a"), Arg::Str("webgl")])
            .unwrap_err();
        assert!(matches!(err, BridgeError::Rejected { .. }));
    }

    #[test]
    fn test_context_ops_need_context() {
        let doc = HeadlessDocument::default();
        doc.call_void(ForeignOp::EnsureSurface, &[Arg::Str("a")]).unwrap();
        assert!(doc.call_void(ForeignOp::Fill, &[Arg::Str("a")]).is_err());
    }

    #[test]
    fn test_style_defaults() {
        let doc = doc_with_context("a");
        assert_eq!(get_style(&doc, "a", StyleProperty::Font), "10px sans-serif");
        assert_eq!(get_style(&doc, "a", StyleProperty::LineCap), "butt");
        assert_eq!(get_style(&doc, "a", StyleProperty::LineJoin), "miter");
        assert_eq!(
            get_style(&doc, "a", StyleProperty::GlobalCompositeOperation),
            "source-over"
        );
    }

    #[test]
    fn test_color_normalization() {
        let doc = doc_with_context("a");
        set_style(&doc, "a", StyleProperty::FillStyle, "#FF0000");
        assert_eq!(get_style(&doc, "a", StyleProperty::FillStyle), "#ff0000");
        set_style(&doc, "a", StyleProperty::FillStyle, "#0f0");
        assert_eq!(get_style(&doc, "a", StyleProperty::FillStyle), "#00ff00");
        set_style(&doc, "a", StyleProperty::StrokeStyle, "rgb(0, 128, 255)");
        assert_eq!(get_style(&doc, "a", StyleProperty::StrokeStyle), "#0080ff");
        set_style(&doc, "a", StyleProperty::StrokeStyle, "Blue");
        assert_eq!(get_style(&doc, "a", StyleProperty::StrokeStyle), "#0000ff");
    }

    #[test]
    fn test_invalid_tokens_ignored() {
        let doc = doc_with_context("a");
        set_style(&doc, "a", StyleProperty::LineCap, "round");
        set_style(&doc, "a", StyleProperty::LineCap, "pointy");
        assert_eq!(get_style(&doc, "a", StyleProperty::LineCap), "round");

        set_style(&doc, "a", StyleProperty::FillStyle, "not-a-colour");
        assert_eq!(get_style(&doc, "a", StyleProperty::FillStyle), "#000000");

        set_style(&doc, "a", StyleProperty::Font, "huge");
        assert_eq!(get_style(&doc, "a", StyleProperty::Font), "10px sans-serif");
        set_style(&doc, "a", StyleProperty::Font, "bold   12px  serif");
        assert_eq!(get_style(&doc, "a", StyleProperty::Font), "bold 12px serif");
    }

    #[test]
    fn test_verbatim_styles_without_normalization() {
        let doc = HeadlessDocument::new(HostConfig {
            normalize_styles: false,
            ..HostConfig::default()
        });
        doc.call_void(ForeignOp::EnsureSurface, &[Arg::Str("a")]).unwrap();
        doc.call_void(ForeignOp::AcquireContext, &[Arg::Str("a"), Arg::Str("2d")])
            .unwrap();
        set_style(&doc, "a", StyleProperty::LineCap, "pointy");
        assert_eq!(get_style(&doc, "a", StyleProperty::LineCap), "pointy");
        assert!(!doc
            .capabilities()
            .contains(HostCapabilities::STYLE_NORMALIZATION));
    }

    #[test]
    fn test_numeric_properties_validated() {
        let doc = doc_with_context("a");
        let lw = ForeignOp::SetNumber(NumericProperty::LineWidth);
        doc.call_void(lw, &[Arg::Str("a"), Arg::Double(4.5)]).unwrap();
        doc.call_void(lw, &[Arg::Str("a"), Arg::Double(-1.0)]).unwrap();
        doc.call_void(lw, &[Arg::Str("a"), Arg::Double(f64::NAN)]).unwrap();
        let got = doc
            .call_double(ForeignOp::GetNumber(NumericProperty::LineWidth), &[Arg::Str("a")])
            .unwrap();
        assert_eq!(got, 4.5);

        let ga = ForeignOp::SetNumber(NumericProperty::GlobalAlpha);
        doc.call_void(ga, &[Arg::Str("a"), Arg::Double(1.5)]).unwrap();
        let alpha = doc
            .call_double(ForeignOp::GetNumber(NumericProperty::GlobalAlpha), &[Arg::Str("a")])
            .unwrap();
        assert_eq!(alpha, 1.0);
    }

    #[test]
    fn test_save_restore_round_trips_state() {
        let doc = doc_with_context("a");
        set_style(&doc, "a", StyleProperty::FillStyle, "red");
        doc.call_void(ForeignOp::Save, &[Arg::Str("a")]).unwrap();
        set_style(&doc, "a", StyleProperty::FillStyle, "blue");
        doc.call_void(ForeignOp::Translate, &[Arg::Str("a"), Arg::Double(5.0), Arg::Double(6.0)])
            .unwrap();
        assert_eq!(doc.save_depth("a"), 1);

        doc.call_void(ForeignOp::Restore, &[Arg::Str("a")]).unwrap();
        assert_eq!(get_style(&doc, "a", StyleProperty::FillStyle), "#ff0000");
        assert_eq!(doc.transform("a"), Some(IDENTITY));

        // Restore on an empty stack does nothing.
        doc.call_void(ForeignOp::Restore, &[Arg::Str("a")]).unwrap();
        assert_eq!(doc.save_depth("a"), 0);
    }

    #[test]
    fn test_transform_composition() {
        let doc = doc_with_context("a");
        let id = Arg::Str("a");
        doc.call_void(ForeignOp::Translate, &[id, Arg::Double(10.0), Arg::Double(20.0)])
            .unwrap();
        doc.call_void(ForeignOp::Scale, &[id, Arg::Double(2.0), Arg::Double(3.0)])
            .unwrap();
        assert_eq!(doc.transform("a"), Some([2.0, 0.0, 0.0, 3.0, 10.0, 20.0]));

        doc.call_void(ForeignOp::ResetTransform, &[id]).unwrap();
        assert_eq!(doc.transform("a"), Some(IDENTITY));
    }

    #[test]
    fn test_point_in_rect_path() {
        let doc = doc_with_context("a");
        let id = Arg::Str("a");
        doc.call_void(ForeignOp::BeginPath, &[id]).unwrap();
        doc.call_void(
            ForeignOp::Rect,
            &[id, Arg::Double(10.0), Arg::Double(10.0), Arg::Double(20.0), Arg::Double(20.0)],
        )
        .unwrap();
        let inside = doc
            .call_int(ForeignOp::IsPointInPath, &[id, Arg::Double(15.0), Arg::Double(15.0)])
            .unwrap();
        let outside = doc
            .call_int(ForeignOp::IsPointInPath, &[id, Arg::Double(50.0), Arg::Double(15.0)])
            .unwrap();
        assert_eq!((inside, outside), (1, 0));

        doc.call_void(ForeignOp::BeginPath, &[id]).unwrap();
        let cleared = doc
            .call_int(ForeignOp::IsPointInPath, &[id, Arg::Double(15.0), Arg::Double(15.0)])
            .unwrap();
        assert_eq!(cleared, 0);
    }

    #[test]
    fn test_text_rejects_negative_max_width() {
        let doc = doc_with_context("a");
        let id = Arg::Str("a");
        let text = Arg::Str("hi");
        assert!(doc
            .call_void(ForeignOp::FillText, &[id, text, Arg::Double(1.0), Arg::Double(2.0)])
            .is_ok());
        assert!(doc
            .call_void(
                ForeignOp::FillText,
                &[id, text, Arg::Double(1.0), Arg::Double(2.0), Arg::Double(-1.0)]
            )
            .is_err());
        assert_eq!(doc.paint_calls("a"), 1);
    }

    #[test]
    fn test_strings_are_tracked_by_ledger() {
        let doc = doc_with_context("a");
        let ledger = doc.ledger();
        let s = doc
            .call_allocating_string(ForeignOp::GetStyle(StyleProperty::TextAlign), &[Arg::Str("a")])
            .unwrap();
        assert_eq!(ledger.live(), 1);
        drop(s);
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn test_wrong_reply_type() {
        let doc = doc_with_context("a");
        assert!(doc.call_int(ForeignOp::Fill, &[Arg::Str("a")]).is_err());
        assert!(doc
            .call_allocating_string(ForeignOp::GetWidth, &[Arg::Str("a")])
            .is_err());
    }

    #[test]
    fn test_journal_records_calls() {
        let doc = doc_with_context("a");
        doc.clear_journal();
        doc.call_void(
            ForeignOp::FillRect,
            &[Arg::Str("a"), Arg::Double(1.0), Arg::Double(2.0), Arg::Int(3), Arg::Int(4)],
        )
        .unwrap();
        let journal = doc.journal();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].op, ForeignOp::FillRect);
        assert_eq!(journal[0].args[0], OwnedArg::Str("a".to_string()));

        let json = doc.journal_json().unwrap();
        assert_eq!(json, r#"[{"op":"FillRect","args":["a",1.0,2.0,3,4]}]"#);
    }

    #[test]
    fn test_journal_can_be_disabled() {
        let doc = HeadlessDocument::new(HostConfig {
            journal: false,
            ..HostConfig::default()
        });
        doc.call_void(ForeignOp::EnsureSurface, &[Arg::Str("a")]).unwrap();
        assert!(doc.journal().is_empty());
        assert!(!doc.capabilities().contains(HostCapabilities::CALL_JOURNAL));
        assert_eq!(doc.surface_count(), 1);
    }

    #[test]
    fn test_journal_keeps_newest_entries_up_to_capacity() {
        let doc = HeadlessDocument::new(HostConfig {
            journal_capacity: 8,
            ..HostConfig::default()
        });
        doc.call_void(ForeignOp::EnsureSurface, &[Arg::Str("a")]).unwrap();
        for _ in 0..100 {
            doc.call_int(ForeignOp::GetWidth, &[Arg::Str("a")]).unwrap();
        }
        doc.call_void(ForeignOp::SetWidth, &[Arg::Str("a"), Arg::Int(10)])
            .unwrap();

        let journal = doc.journal();
        assert_eq!(journal.len(), 8);
        assert!(journal[..7].iter().all(|e| e.op == ForeignOp::GetWidth));
        assert_eq!(journal[7].op, ForeignOp::SetWidth);
    }

    #[test]
    fn test_window_metrics_and_blur() {
        let doc = HeadlessDocument::default();
        assert_eq!(doc.call_int(ForeignOp::InnerWidth, &[]).unwrap(), 1280);
        assert_eq!(doc.call_int(ForeignOp::OuterHeight, &[]).unwrap(), 800);
        doc.call_void(ForeignOp::Blur, &[]).unwrap();
        assert_eq!(doc.blur_count(), 1);
    }

    #[test]
    fn test_host_resize_visible_to_queries() {
        let doc = HeadlessDocument::default();
        doc.call_void(ForeignOp::EnsureSurface, &[Arg::Str("a")]).unwrap();
        doc.host_resize("a", 10, 20).unwrap();
        assert_eq!(doc.call_int(ForeignOp::GetWidth, &[Arg::Str("a")]).unwrap(), 10);
        assert!(doc.host_resize("b", 1, 1).is_err());
    }
}
