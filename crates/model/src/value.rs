//! Scalar values produced by leaf resolution

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::json;
use std::fmt;
use uuid::Uuid;

use crate::grammar::ScalarKind;
use crate::record::ControlRecord;
use crate::table::TableValue;

/// RGBA color; alpha runs from 0.0 (transparent) to 1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

static RGBA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^rgba?\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*(?:,\s*([0-9]*\.?[0-9]+)\s*)?\)$")
        .expect("valid rgba regex")
});

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rrggbb`, `#rrggbbaa`, `rgb(r,g,b)` or `rgba(r,g,b,a)`
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();

        if let Some(hex) = input.strip_prefix('#') {
            let channel = |i: usize| {
                hex.get(i..i + 2)
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
            };
            return match hex.len() {
                6 => Some(Self::rgba(channel(0)?, channel(2)?, channel(4)?, 1.0)),
                8 => Some(Self::rgba(
                    channel(0)?,
                    channel(2)?,
                    channel(4)?,
                    f64::from(channel(6)?) / 255.0,
                )),
                _ => None,
            };
        }

        let caps = RGBA.captures(input)?;
        let channel = |i: usize| caps[i].parse::<u8>().ok();
        let alpha = match caps.get(4) {
            Some(a) => a.as_str().parse::<f64>().ok().filter(|a| (0.0..=1.0).contains(a))?,
            None => 1.0,
        };
        Some(Self::rgba(channel(1)?, channel(2)?, channel(3)?, alpha))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// A resolved leaf value
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    /// Typed absence: the provider had no payload for a non-text field
    Blank(ScalarKind),
    String(String),
    Boolean(bool),
    Number(f64),
    Decimal(Decimal),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Guid(Uuid),
    Color(Color),
    Hyperlink(String),
    Untyped(serde_json::Value),
}

impl ScalarValue {
    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarValue::Blank(kind) => *kind,
            ScalarValue::String(_) => ScalarKind::String,
            ScalarValue::Boolean(_) => ScalarKind::Boolean,
            ScalarValue::Number(_) => ScalarKind::Number,
            ScalarValue::Decimal(_) => ScalarKind::Decimal,
            ScalarValue::DateTime(_) => ScalarKind::DateTime,
            ScalarValue::Date(_) => ScalarKind::Date,
            ScalarValue::Guid(_) => ScalarKind::Guid,
            ScalarValue::Color(_) => ScalarKind::Color,
            ScalarValue::Hyperlink(_) => ScalarKind::Hyperlink,
            ScalarValue::Untyped(_) => ScalarKind::UntypedObject,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, ScalarValue::Blank(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::String(s) | ScalarValue::Hyperlink(s) => Some(s),
            ScalarValue::Untyped(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            ScalarValue::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            ScalarValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            ScalarValue::Date(d) => Some(*d),
            ScalarValue::DateTime(dt) => Some(dt.date_naive()),
            _ => None,
        }
    }

    pub fn as_guid(&self) -> Option<Uuid> {
        match self {
            ScalarValue::Guid(g) => Some(*g),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            ScalarValue::Color(c) => Some(*c),
            _ => None,
        }
    }

    /// JSON handed to `setProperty`.
    ///
    /// Instants go out as epoch milliseconds; dates as midnight UTC.
    pub fn to_wire(&self) -> serde_json::Value {
        match self {
            ScalarValue::Blank(_) => serde_json::Value::Null,
            ScalarValue::String(s) | ScalarValue::Hyperlink(s) => json!(s),
            ScalarValue::Boolean(b) => json!(b),
            ScalarValue::Number(n) => json!(n),
            ScalarValue::Decimal(d) => json!(d.to_string()),
            ScalarValue::DateTime(dt) => json!(dt.timestamp_millis()),
            ScalarValue::Date(d) => match d.and_hms_opt(0, 0, 0) {
                Some(midnight) => json!(midnight.and_utc().timestamp_millis()),
                None => serde_json::Value::Null,
            },
            ScalarValue::Guid(g) => json!(g.to_string()),
            ScalarValue::Color(c) => json!(c.to_string()),
            ScalarValue::Untyped(v) => v.clone(),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Blank(_) => Ok(()),
            ScalarValue::String(s) | ScalarValue::Hyperlink(s) => f.write_str(s),
            ScalarValue::Boolean(b) => write!(f, "{}", b),
            ScalarValue::Number(n) => write!(f, "{}", n),
            ScalarValue::Decimal(d) => write!(f, "{}", d),
            ScalarValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            ScalarValue::Date(d) => write!(f, "{}", d),
            ScalarValue::Guid(g) => write!(f, "{}", g),
            ScalarValue::Color(c) => write!(f, "{}", c),
            ScalarValue::Untyped(serde_json::Value::String(s)) => f.write_str(s),
            ScalarValue::Untyped(v) => write!(f, "{}", v),
        }
    }
}

/// Result of resolving one field of a [`ControlRecord`]
#[derive(Debug, Clone)]
pub enum FieldValue {
    Scalar(ScalarValue),
    Record(ControlRecord),
    Table(TableValue),
}

impl FieldValue {
    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_scalar(self) -> Option<ScalarValue> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<ControlRecord> {
        match self {
            FieldValue::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_table(self) -> Option<TableValue> {
        match self {
            FieldValue::Table(t) => Some(t),
            _ => None,
        }
    }
}
