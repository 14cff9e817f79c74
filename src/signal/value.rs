//! # Raw channel values and change notifications.
//!
//! Hardware channels carry one of three shapes of data:
//! - integers (enum indices, flags, alarm severities),
//! - floats (analog readbacks, setpoints),
//! - text (commands written by label, e.g. `"Run"`/`"Stop"`).
//!
//! [`Value`] keeps the raw shape; callers pick the view they need with
//! [`Value::as_f64`], [`Value::as_index`] or [`Value::is_truthy`].

use std::fmt;
use std::time::SystemTime;

/// Raw value carried by a signal channel.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Integer value (enum index, flag, status word).
    Int(i64),
    /// Floating point value (analog readback or setpoint).
    Float(f64),
    /// Text value (labels, string commands).
    Text(String),
}

impl Value {
    /// Numeric view of the value.
    ///
    /// Text parses as a float when possible; otherwise `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Enum-index view of the value.
    ///
    /// Floats are accepted only when they carry an exact non-negative integer.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Int(i) => usize::try_from(*i).ok(),
            Value::Float(f) if f.fract() == 0.0 && *f >= 0.0 => Some(*f as usize),
            Value::Float(_) => None,
            Value::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Text view, if the value is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Flag view: non-zero numbers and non-empty text are truthy.
    ///
    /// Fault/status channels report "no alarm" as `0`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// One change notification delivered to a subscriber.
///
/// `old` is the value before the change; on an immediate (`run_immediately`)
/// delivery `old` equals `new`.
#[derive(Clone, Debug)]
pub struct Notification {
    /// Value before the change.
    pub old: Value,
    /// Value after the change.
    pub new: Value,
    /// Wall-clock time the change was produced.
    pub timestamp: SystemTime,
}

impl Notification {
    /// Creates a notification stamped with the current time.
    pub fn now(old: Value, new: Value) -> Self {
        Self {
            old,
            new,
            timestamp: SystemTime::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_view() {
        assert_eq!(Value::Int(2).as_index(), Some(2));
        assert_eq!(Value::Int(-1).as_index(), None);
        assert_eq!(Value::Float(3.0).as_index(), Some(3));
        assert_eq!(Value::Float(3.5).as_index(), None);
        assert_eq!(Value::from("1").as_index(), Some(1));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(3).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(Value::from(true).is_truthy());
        assert!(!Value::from("").is_truthy());
    }

    #[test]
    fn test_numeric_view() {
        assert_eq!(Value::Int(4).as_f64(), Some(4.0));
        assert_eq!(Value::from(" 2.5 ").as_f64(), Some(2.5));
        assert_eq!(Value::from("Run").as_f64(), None);
    }
}
