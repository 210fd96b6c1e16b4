//! Payload coercion into typed scalar values
//!
//! Date payloads are either epoch milliseconds or locale strings. Both forms
//! are tried before giving up, and wall-clock results are anchored in UTC
//! unless the control reports that it works in local time.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use apptest_common::{EngineConfig, Error, Result};

use crate::grammar::ScalarKind;
use crate::value::{Color, ScalarValue};

/// How a control interprets wall-clock date values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoneMode {
    #[default]
    Utc,
    Local,
}

impl ZoneMode {
    /// Read the timezone-mode property payload; anything but "local" is UTC
    pub fn from_payload(payload: &str) -> Self {
        if payload.trim().eq_ignore_ascii_case("local") {
            ZoneMode::Local
        } else {
            ZoneMode::Utc
        }
    }
}

enum ParsedInstant {
    /// The payload carried its own offset
    Exact(DateTime<Utc>),
    /// Wall clock still waiting for a zone
    Wall(NaiveDateTime),
}

/// Converts raw provider payloads to [`ScalarValue`]s
pub struct Coercer<'a> {
    config: &'a EngineConfig,
}

impl<'a> Coercer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Coerce `payload` to `kind`.
    ///
    /// `zone` is consulted only for wall-clock dates of a zone-aware kind, so
    /// callers can defer the extra round trip it may need.
    pub fn coerce<F>(
        &self,
        kind: ScalarKind,
        field: &str,
        payload: Option<&str>,
        zone: F,
    ) -> Result<ScalarValue>
    where
        F: FnOnce() -> ZoneMode,
    {
        let payload = payload.unwrap_or_default();
        // Text kinds keep whitespace; every other kind reads it as blank
        if payload.trim().is_empty() {
            return Ok(match kind {
                ScalarKind::String => ScalarValue::String(payload.to_string()),
                ScalarKind::Hyperlink => ScalarValue::Hyperlink(payload.to_string()),
                _ => ScalarValue::Blank(kind),
            });
        }

        let fail = || Error::Coercion {
            field: field.to_string(),
            expected: kind.to_string(),
            payload: payload.to_string(),
        };
        let text = payload.trim();

        let value = match kind {
            ScalarKind::String => ScalarValue::String(payload.to_string()),
            ScalarKind::Hyperlink => ScalarValue::Hyperlink(payload.to_string()),
            ScalarKind::Number => ScalarValue::Number(text.parse::<f64>().map_err(|_| fail())?),
            ScalarKind::Decimal => ScalarValue::Decimal(
                Decimal::from_str(text)
                    .or_else(|_| Decimal::from_scientific(text))
                    .map_err(|_| fail())?,
            ),
            ScalarKind::Boolean => ScalarValue::Boolean(parse_bool(text).ok_or_else(fail)?),
            ScalarKind::Guid => ScalarValue::Guid(Uuid::parse_str(text).map_err(|_| fail())?),
            ScalarKind::DateTime | ScalarKind::DateTimeNoTimeZone => {
                ScalarValue::DateTime(self.resolve_instant(kind, text, zone).ok_or_else(fail)?)
            }
            ScalarKind::Date => {
                let instant = self.resolve_instant(kind, text, zone).ok_or_else(fail)?;
                ScalarValue::Date(instant.date_naive())
            }
            ScalarKind::Color => match Color::parse(text) {
                Some(color) => ScalarValue::Color(color),
                None => ScalarValue::Untyped(serde_json::Value::String(payload.to_string())),
            },
            ScalarKind::UntypedObject => ScalarValue::Untyped(
                serde_json::from_str(payload)
                    .unwrap_or_else(|_| serde_json::Value::String(payload.to_string())),
            ),
        };
        Ok(value)
    }

    fn resolve_instant<F>(&self, kind: ScalarKind, text: &str, zone: F) -> Option<DateTime<Utc>>
    where
        F: FnOnce() -> ZoneMode,
    {
        let parsed = match text.parse::<i64>() {
            Ok(millis) => ParsedInstant::Wall(DateTime::from_timestamp_millis(millis)?.naive_utc()),
            Err(_) => self.parse_locale(text)?,
        };

        match parsed {
            ParsedInstant::Exact(instant) => Some(instant),
            ParsedInstant::Wall(wall) => {
                let mode = if kind == ScalarKind::DateTimeNoTimeZone {
                    ZoneMode::Utc
                } else {
                    zone()
                };
                Some(self.anchor(wall, mode))
            }
        }
    }

    fn parse_locale(&self, text: &str) -> Option<ParsedInstant> {
        if let Ok(exact) = DateTime::parse_from_rfc3339(text) {
            return Some(ParsedInstant::Exact(exact.with_timezone(&Utc)));
        }

        self.config.date_formats.iter().find_map(|format| {
            NaiveDateTime::parse_from_str(text, format)
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(text, format)
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .map(ParsedInstant::Wall)
        })
    }

    /// Pin a wall-clock time to UTC, reading it as local time when asked
    fn anchor(&self, wall: NaiveDateTime, mode: ZoneMode) -> DateTime<Utc> {
        if mode == ZoneMode::Utc {
            return wall.and_utc();
        }

        let local = match self.config.local_offset_minutes {
            Some(minutes) => FixedOffset::east_opt(minutes * 60)
                .and_then(|offset| offset.from_local_datetime(&wall).single())
                .map(|dt| dt.with_timezone(&Utc)),
            None => Local
                .from_local_datetime(&wall)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        };

        local.unwrap_or_else(|| {
            debug!("No local reading for {}, keeping UTC", wall);
            wall.and_utc()
        })
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
