//! Type definitions shared between ground and space software

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::time::{SpecificTime, TimeInterval};

/// Identifier of a transport handle (Link, Downlink or GemsDevice)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

/// Kind of transport handle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HandleKind {
    /// Uplink/downlink path to a space system
    Link,
    /// Telemetry-only path to a space system
    Downlink,
    /// Ground equipment connection
    GemsDevice,
}

impl HandleKind {
    /// Whether commands or directives may be dispatched through this kind
    pub fn can_command(&self) -> bool {
        !matches!(self, HandleKind::Downlink)
    }
}

/// Back-reference from a catalog entity to the handle that adopted it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandleRef {
    pub id: HandleId,
    pub kind: HandleKind,
    /// Name of the adopted system or device
    pub name: String,
}

impl fmt::Display for HandleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            HandleKind::Link => write!(f, "space.Link('{}')", self.name),
            HandleKind::Downlink => write!(f, "space.Downlink('{}')", self.name),
            HandleKind::GemsDevice => write!(f, "space.GemsDevice('{}')", self.name),
        }
    }
}

/// State of a space link. Only `Up` allows commanding and provides telemetry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LinkState {
    Up,
    Down,
    Establishing,
}

/// Result of running a procedure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProcedureStatus {
    Successful,
    Failed,
}

impl ProcedureStatus {
    /// Numeric code returned to the operator shell
    pub fn code(&self) -> i32 {
        match self {
            ProcedureStatus::Successful => 0,
            ProcedureStatus::Failed => -1,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProcedureStatus::Successful)
    }
}

/// A parameter, argument or restriction bound value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Time(SpecificTime),
    Interval(TimeInterval),
}

impl Value {
    /// Order two values of compatible kinds. Integers and floats compare
    /// numerically; anything else mixed is unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            (Value::Interval(a), Value::Interval(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Loose equality used for enumeration membership (1 matches 1.0)
    pub fn matches(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the variant, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Time(_) => "time",
            Value::Interval(_) => "interval",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => f.write_str(s),
            Value::Time(t) => write!(f, "{}", t),
            Value::Interval(i) => write!(f, "{}", i),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<SpecificTime> for Value {
    fn from(value: SpecificTime) -> Self {
        Value::Time(value)
    }
}

impl From<TimeInterval> for Value {
    fn from(value: TimeInterval) -> Self {
        Value::Interval(value)
    }
}

/// Argument name to current value, as handed to the dispatch boundary
pub type ArgumentMap = BTreeMap<String, Option<Value>>;

/// Flag name to value for the non-default command request flags
pub type FlagMap = BTreeMap<String, Value>;

/// Lock a mutex, recovering the data if a previous holder panicked
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
