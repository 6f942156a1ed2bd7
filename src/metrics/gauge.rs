//! Gauge metric
//!
//! A gauge holds no state of its own: every read calls the supplied function.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{Error, Result};

/// Value produced by a gauge read
#[derive(Debug, Clone, PartialEq)]
pub enum GaugeValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl GaugeValue {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GaugeValue::Integer(v) => Some(*v as f64),
            GaugeValue::Float(v) => Some(*v),
            GaugeValue::Text(_) => None,
        }
    }
}

impl fmt::Display for GaugeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GaugeValue::Integer(v) => write!(f, "{}", v),
            GaugeValue::Float(v) => write!(f, "{}", v),
            GaugeValue::Text(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! integer_gauge_value {
    ($($t:ty),*) => {
        $(impl From<$t> for GaugeValue {
            fn from(v: $t) -> Self {
                GaugeValue::Integer(v as i64)
            }
        })*
    };
}

integer_gauge_value!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for GaugeValue {
    fn from(v: u64) -> Self {
        i64::try_from(v)
            .map(GaugeValue::Integer)
            .unwrap_or(GaugeValue::Float(v as f64))
    }
}

impl From<usize> for GaugeValue {
    fn from(v: usize) -> Self {
        GaugeValue::from(v as u64)
    }
}

impl From<f32> for GaugeValue {
    fn from(v: f32) -> Self {
        GaugeValue::Float(v as f64)
    }
}

impl From<f64> for GaugeValue {
    fn from(v: f64) -> Self {
        GaugeValue::Float(v)
    }
}

impl From<bool> for GaugeValue {
    fn from(v: bool) -> Self {
        GaugeValue::Integer(v as i64)
    }
}

impl From<String> for GaugeValue {
    fn from(v: String) -> Self {
        GaugeValue::Text(v)
    }
}

impl From<&str> for GaugeValue {
    fn from(v: &str) -> Self {
        GaugeValue::Text(v.to_string())
    }
}

type GaugeFn = dyn Fn() -> anyhow::Result<GaugeValue> + Send + Sync;

/// Pull-based metric computed fresh on every read
pub struct Gauge {
    read: Box<GaugeFn>,
}

impl Gauge {
    /// Create a gauge from a fallible function
    pub fn new<F>(read: F) -> Self
    where
        F: Fn() -> anyhow::Result<GaugeValue> + Send + Sync + 'static,
    {
        Self {
            read: Box::new(read),
        }
    }

    /// Create a gauge from an infallible function
    pub fn from_fn<F, V>(read: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<GaugeValue>,
    {
        Self::new(move || Ok(read().into()))
    }

    /// Read the current value
    ///
    /// A failing or panicking function yields [`Error::GaugeRead`].
    pub fn value(&self) -> Result<GaugeValue> {
        match catch_unwind(AssertUnwindSafe(|| (self.read)())) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Error::GaugeRead(format!("{:#}", e))),
            Err(panic) => Err(Error::GaugeRead(panic_message(panic.as_ref()))),
        }
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge").finish_non_exhaustive()
    }
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
