//! ForeignCallBridge trait + the ownership types that cross it.
//!
//! Surfaces, contexts and the window depend on this trait, never on a
//! concrete host. `HeadlessDocument` (headless.rs) and `DomBridge` (dom.rs)
//! implement it; `MockBridge` below is for unit tests.

use std::cell::Cell;
use std::ffi::{CStr, CString};
use std::fmt;
use std::os::raw::c_char;
use std::rc::Rc;

use serde::Serialize;

use crate::error::BridgeError;
use crate::types::{ForeignOp, HostCapabilities};

// ============================================================================
// Arguments
// ============================================================================

/// One positional argument of a foreign call. Strings are passed by reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arg<'a> {
    Int(i32),
    Double(f64),
    Str(&'a str),
}

/// Owned copy of an [`Arg`], for call journals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OwnedArg {
    Int(i32),
    Double(f64),
    Str(String),
}

impl From<&Arg<'_>> for OwnedArg {
    fn from(arg: &Arg<'_>) -> Self {
        match *arg {
            Arg::Int(v) => Self::Int(v),
            Arg::Double(v) => Self::Double(v),
            Arg::Str(s) => Self::Str(s.to_string()),
        }
    }
}

/// Typed positional view over a call's arguments, used by bridge
/// implementations to unmarshal what the handles sent.
pub struct CallArgs<'s, 'a> {
    op: ForeignOp,
    args: &'s [Arg<'a>],
}

impl<'s, 'a> CallArgs<'s, 'a> {
    pub fn new(op: ForeignOp, args: &'s [Arg<'a>]) -> Self {
        Self { op, args }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    fn bad(&self, reason: String) -> BridgeError {
        BridgeError::BadArgument {
            op: self.op,
            reason,
        }
    }

    /// Surface identity, always argument 0 for surface and context ops.
    pub fn identity(&self) -> Result<&'a str, BridgeError> {
        self.str_at(0)
    }

    pub fn str_at(&self, index: usize) -> Result<&'a str, BridgeError> {
        match self.args.get(index) {
            Some(&Arg::Str(s)) => Ok(s),
            Some(other) => Err(self.bad(format!("argument {index} is {other:?}, expected string"))),
            None => Err(self.bad(format!("missing argument {index}"))),
        }
    }

    pub fn int_at(&self, index: usize) -> Result<i32, BridgeError> {
        match self.args.get(index) {
            Some(Arg::Int(v)) => Ok(*v),
            Some(other) => Err(self.bad(format!("argument {index} is {other:?}, expected int"))),
            None => Err(self.bad(format!("missing argument {index}"))),
        }
    }

    /// Ints widen to doubles, as they would on the host.
    pub fn f64_at(&self, index: usize) -> Result<f64, BridgeError> {
        match self.args.get(index) {
            Some(Arg::Double(v)) => Ok(*v),
            Some(Arg::Int(v)) => Ok(f64::from(*v)),
            Some(other) => Err(self.bad(format!("argument {index} is {other:?}, expected number"))),
            None => Err(self.bad(format!("missing argument {index}"))),
        }
    }

    /// `N` consecutive numbers starting at `start`.
    pub fn f64s<const N: usize>(&self, start: usize) -> Result<[f64; N], BridgeError> {
        let mut out = [0.0; N];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.f64_at(start + i)?;
        }
        Ok(out)
    }

    pub fn to_owned_args(&self) -> Vec<OwnedArg> {
        self.args.iter().map(OwnedArg::from).collect()
    }
}

// ============================================================================
// Foreign-allocated strings
// ============================================================================

/// Bookkeeping for one allocator family. Every [`ForeignString`] tagged with
/// a ledger is counted once on creation and released once on drop.
#[derive(Debug, Default)]
pub struct AllocationLedger {
    live: Cell<usize>,
    live_bytes: Cell<usize>,
    total: Cell<usize>,
}

impl AllocationLedger {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Strings handed out and not yet released.
    pub fn live(&self) -> usize {
        self.live.get()
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes.get()
    }

    /// Strings handed out over the ledger's lifetime.
    pub fn total_allocated(&self) -> usize {
        self.total.get()
    }

    fn acquire(&self, bytes: usize) {
        self.live.set(self.live.get() + 1);
        self.live_bytes.set(self.live_bytes.get() + bytes);
        self.total.set(self.total.get() + 1);
    }

    fn release(&self, bytes: usize) {
        self.live.set(self.live.get().saturating_sub(1));
        self.live_bytes.set(self.live_bytes.get().saturating_sub(bytes));
    }
}

/// A NUL-terminated UTF-8 string allocated by the foreign side and owned by
/// the caller. Dropping it releases it through the family that produced it.
pub struct ForeignString {
    bytes: CString,
    ledger: Option<Rc<AllocationLedger>>,
}

impl ForeignString {
    /// A string from the process allocator, with no ledger attached.
    pub fn new(value: &str) -> Result<Self, BridgeError> {
        let bytes = CString::new(value).map_err(|_| BridgeError::InteriorNul)?;
        Ok(Self {
            bytes,
            ledger: None,
        })
    }

    /// A string counted against `ledger` until it is dropped.
    pub fn tracked(value: &str, ledger: &Rc<AllocationLedger>) -> Result<Self, BridgeError> {
        let bytes = CString::new(value).map_err(|_| BridgeError::InteriorNul)?;
        ledger.acquire(bytes.as_bytes_with_nul().len());
        Ok(Self {
            bytes,
            ledger: Some(Rc::clone(ledger)),
        })
    }

    pub fn as_str(&self) -> &str {
        // Only ever built from &str, so this cannot fail.
        self.bytes.to_str().unwrap_or_default()
    }

    pub fn as_c_str(&self) -> &CStr {
        &self.bytes
    }

    pub fn as_ptr(&self) -> *const c_char {
        self.bytes.as_ptr()
    }
}

impl Drop for ForeignString {
    fn drop(&mut self) {
        if let Some(ledger) = self.ledger.take() {
            ledger.release(self.bytes.as_bytes_with_nul().len());
        }
    }
}

impl fmt::Debug for ForeignString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ForeignString").field(&self.as_str()).finish()
    }
}

impl fmt::Display for ForeignString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<str> for ForeignString {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for ForeignString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

// ============================================================================
// ForeignCallBridge trait
// ============================================================================

/// Synchronous, blocking channel to the host surface.
///
/// Implementations take `&self`: one bridge is shared by every handle bound
/// to it, and all access happens on a single thread.
pub trait ForeignCallBridge {
    fn call_void(&self, op: ForeignOp, args: &[Arg<'_>]) -> Result<(), BridgeError>;
    fn call_int(&self, op: ForeignOp, args: &[Arg<'_>]) -> Result<i32, BridgeError>;
    fn call_double(&self, op: ForeignOp, args: &[Arg<'_>]) -> Result<f64, BridgeError>;

    /// The host allocates the result; ownership moves to the caller.
    fn call_allocating_string(
        &self,
        op: ForeignOp,
        args: &[Arg<'_>],
    ) -> Result<ForeignString, BridgeError>;

    fn capabilities(&self) -> HostCapabilities;

    /// Downcast support for test code.
    #[cfg(test)]
    fn as_any(&self) -> &dyn std::any::Any;
}

// ============================================================================
// MockBridge (for Rust unit tests only)
// ============================================================================

#[cfg(test)]
pub struct MockBridge {
    pub calls: std::cell::RefCell<Vec<(ForeignOp, Vec<OwnedArg>)>>,
    pub fail_on: Cell<Option<ForeignOp>>,
    pub int_result: Cell<i32>,
    pub double_result: Cell<f64>,
    pub string_result: std::cell::RefCell<String>,
    pub ledger: Rc<AllocationLedger>,
}

#[cfg(test)]
impl MockBridge {
    pub fn new() -> Self {
        Self {
            calls: std::cell::RefCell::new(Vec::new()),
            fail_on: Cell::new(None),
            int_result: Cell::new(0),
            double_result: Cell::new(0.0),
            string_result: std::cell::RefCell::new(String::new()),
            ledger: AllocationLedger::new(),
        }
    }

    pub fn ops(&self) -> Vec<ForeignOp> {
        self.calls.borrow().iter().map(|(op, _)| *op).collect()
    }

    pub fn last_call(&self) -> Option<(ForeignOp, Vec<OwnedArg>)> {
        self.calls.borrow().last().cloned()
    }

    fn record(&self, op: ForeignOp, args: &[Arg<'_>]) -> Result<(), BridgeError> {
        self.calls
            .borrow_mut()
            .push((op, args.iter().map(OwnedArg::from).collect()));
        if self.fail_on.get() == Some(op) {
            return Err(BridgeError::Host(format!("injected failure on {op}")));
        }
        Ok(())
    }
}

#[cfg(test)]
impl ForeignCallBridge for MockBridge {
    fn call_void(&self, op: ForeignOp, args: &[Arg<'_>]) -> Result<(), BridgeError> {
        self.record(op, args)
    }

    fn call_int(&self, op: ForeignOp, args: &[Arg<'_>]) -> Result<i32, BridgeError> {
        self.record(op, args)?;
        Ok(self.int_result.get())
    }

    fn call_double(&self, op: ForeignOp, args: &[Arg<'_>]) -> Result<f64, BridgeError> {
        self.record(op, args)?;
        Ok(self.double_result.get())
    }

    fn call_allocating_string(
        &self,
        op: ForeignOp,
        args: &[Arg<'_>],
    ) -> Result<ForeignString, BridgeError> {
        self.record(op, args)?;
        ForeignString::tracked(&self.string_result.borrow(), &self.ledger)
    }

    fn capabilities(&self) -> HostCapabilities {
        HostCapabilities::CONTEXT_2D
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
