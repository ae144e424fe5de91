//! Shared types, enums, and constants.
//!
//! Everything that crosses the bridge or the C ABI is named here: the
//! foreign operation set, the property ids, and the context families.

use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use serde::Serialize;

/// Host default for a surface created without an explicit width.
pub const DEFAULT_WIDTH: i32 = 300;
/// Host default for a surface created without an explicit height.
pub const DEFAULT_HEIGHT: i32 = 150;

// ============================================================================
// Surface identity
// ============================================================================

/// Opaque label naming a foreign surface. Immutable for the life of a handle
/// and shared (not copied) with the context that belongs to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceId(Rc<str>);

impl SurfaceId {
    pub(crate) fn new(identity: &str) -> Self {
        Self(Rc::from(identity))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Context families
// ============================================================================

/// Drawing-context families a surface can be asked for. Only the 2-D raster
/// family exists; any other tag is rejected by [`ContextKind::from_tag`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    TwoD = 0,
}

impl ContextKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "2d" => Some(Self::TwoD),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::TwoD => "2d",
        }
    }
}

// ============================================================================
// Context properties
// ============================================================================

/// String-valued context properties. Reads of these go through the style cache.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StyleProperty {
    Font = 0,
    TextAlign = 1,
    FillStyle = 2,
    StrokeStyle = 3,
    LineCap = 4,
    LineJoin = 5,
    GlobalCompositeOperation = 6,
}

impl StyleProperty {
    pub const COUNT: usize = 7;

    pub const ALL: [StyleProperty; Self::COUNT] = [
        Self::Font,
        Self::TextAlign,
        Self::FillStyle,
        Self::StrokeStyle,
        Self::LineCap,
        Self::LineJoin,
        Self::GlobalCompositeOperation,
    ];

    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.get(v as usize).copied()
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Property name as the host spells it.
    pub fn host_name(self) -> &'static str {
        match self {
            Self::Font => "font",
            Self::TextAlign => "textAlign",
            Self::FillStyle => "fillStyle",
            Self::StrokeStyle => "strokeStyle",
            Self::LineCap => "lineCap",
            Self::LineJoin => "lineJoin",
            Self::GlobalCompositeOperation => "globalCompositeOperation",
        }
    }
}

/// Numeric context properties. Never cached: every read re-queries the host.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NumericProperty {
    LineWidth = 0,
    GlobalAlpha = 1,
}

impl NumericProperty {
    pub fn host_name(self) -> &'static str {
        match self {
            Self::LineWidth => "lineWidth",
            Self::GlobalAlpha => "globalAlpha",
        }
    }
}

/// Integer presentation of the `lineCap` token.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Butt = 0,
    Round = 1,
    Square = 2,
}

impl LineCap {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "butt" => Some(Self::Butt),
            "round" => Some(Self::Round),
            "square" => Some(Self::Square),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Butt => "butt",
            Self::Round => "round",
            Self::Square => "square",
        }
    }
}

/// Integer presentation of the `lineJoin` token.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Round = 0,
    Bevel = 1,
    Miter = 2,
}

impl LineJoin {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "round" => Some(Self::Round),
            "bevel" => Some(Self::Bevel),
            "miter" => Some(Self::Miter),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Round => "round",
            Self::Bevel => "bevel",
            Self::Miter => "miter",
        }
    }
}

// ============================================================================
// Foreign operations
// ============================================================================

/// Every operation that can be invoked across the bridge.
///
/// Surface and context operations take the surface identity as argument 0;
/// window operations take no identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ForeignOp {
    // Document
    EnsureSurface,
    AcquireContext,

    // Surface
    GetWidth,
    GetHeight,
    SetWidth,
    SetHeight,

    // Context: rectangles and text
    ClearRect,
    FillRect,
    StrokeRect,
    FillText,
    StrokeText,

    // Context: paths
    BeginPath,
    ClosePath,
    MoveTo,
    LineTo,
    BezierCurveTo,
    QuadraticCurveTo,
    Arc,
    ArcTo,
    Ellipse,
    Rect,
    Fill,
    Stroke,
    Clip,
    IsPointInPath,
    IsPointInStroke,

    // Context: transforms and state stack
    Rotate,
    Scale,
    Translate,
    Transform,
    SetTransform,
    ResetTransform,
    Save,
    Restore,

    // Context: properties
    GetStyle(StyleProperty),
    SetStyle(StyleProperty),
    GetNumber(NumericProperty),
    SetNumber(NumericProperty),

    // Window
    InnerWidth,
    InnerHeight,
    OuterWidth,
    OuterHeight,
    Blur,
}

impl fmt::Display for ForeignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetStyle(p) => write!(f, "get {}", p.host_name()),
            Self::SetStyle(p) => write!(f, "set {}", p.host_name()),
            Self::GetNumber(p) => write!(f, "get {}", p.host_name()),
            Self::SetNumber(p) => write!(f, "set {}", p.host_name()),
            other => write!(f, "{other:?}"),
        }
    }
}

// ============================================================================
// Host capabilities (bitflags)
// ============================================================================

bitflags! {
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HostCapabilities: u32 {
        const CONTEXT_2D          = 0b0000_0001;
        const WINDOW_METRICS      = 0b0000_0010;
        const STYLE_NORMALIZATION = 0b0000_0100;
        const CALL_JOURNAL        = 0b0000_1000;
    }
}
