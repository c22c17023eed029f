//! # Operational Clock
//!
//! Maps an instant to the operational day it belongs to.
//!
//! ## The Cutoff Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cutoff = 06:00 local, offset = UTC-03:00                               │
//! │                                                                         │
//! │  local wall clock      2024-03-10                                       │
//! │  00:00 ─────────────── 05:59 │ 06:00 ────────────────── 23:59           │
//! │  └── belongs to 2024-03-09 ──┘ └──── belongs to 2024-03-10 ───┘         │
//! │                                                                         │
//! │  The cutoff instant itself opens the new day.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Callers always pass the instant explicitly (order time, entry time, or
//! "now" captured by the UI layer); nothing here reads the wall clock.

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
    Timelike, Utc,
};

use crate::error::{CoreResult, ValidationError};
use crate::{DEFAULT_CUTOFF_HOUR, DEFAULT_TZ_OFFSET_MINUTES};

/// Largest accepted offset magnitude, in minutes (exclusive).
const MAX_OFFSET_MINUTES: i32 = 24 * 60;

/// Cutoff hour and local offset used to resolve operational dates.
///
/// ## Example
/// ```rust
/// use caixa_core::clock::OperationalClock;
/// use chrono::{TimeZone, Utc};
///
/// let clock = OperationalClock::new(6, -180).unwrap();
/// // 09:00 UTC = 06:00 local: first minute of the new day
/// let t = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
/// assert_eq!(clock.resolve(t).to_string(), "2024-03-10");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationalClock {
    cutoff_hour: u32,
    offset: FixedOffset,
}

impl OperationalClock {
    /// Creates a clock.
    ///
    /// ## Rules
    /// - `cutoff_hour` in `0..=23` (0 makes operational days match calendar days)
    /// - `tz_offset_minutes` strictly within ±24h
    pub fn new(cutoff_hour: u32, tz_offset_minutes: i32) -> CoreResult<Self> {
        if cutoff_hour > 23 {
            return Err(ValidationError::OutOfRange {
                field: "cutoff_hour".to_string(),
                min: 0,
                max: 23,
            }
            .into());
        }

        let offset = if tz_offset_minutes.abs() < MAX_OFFSET_MINUTES {
            FixedOffset::east_opt(tz_offset_minutes * 60)
        } else {
            None
        }
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "tz_offset_minutes".to_string(),
            min: -(MAX_OFFSET_MINUTES as i64) + 1,
            max: MAX_OFFSET_MINUTES as i64 - 1,
        })?;

        Ok(OperationalClock {
            cutoff_hour,
            offset,
        })
    }

    /// Local hour at which a new operational day starts.
    pub fn cutoff_hour(&self) -> u32 {
        self.cutoff_hour
    }

    /// Local offset from UTC, in minutes.
    pub fn tz_offset_minutes(&self) -> i32 {
        self.offset.local_minus_utc() / 60
    }

    /// Resolves the operational date of `instant`.
    pub fn resolve(&self, instant: DateTime<Utc>) -> NaiveDate {
        let local = instant.with_timezone(&self.offset);
        let calendar = local.date_naive();

        if local.hour() < self.cutoff_hour {
            calendar.pred_opt().unwrap_or(calendar)
        } else {
            calendar
        }
    }

    /// Parses an event timestamp and resolves its operational date.
    ///
    /// RFC 3339 timestamps carry their own offset. Timestamps without an
    /// offset (`2024-03-10T05:59:00`) are read as local wall-clock time.
    pub fn resolve_timestamp(&self, raw: &str) -> CoreResult<NaiveDate> {
        let raw = raw.trim();

        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(self.resolve(parsed.with_timezone(&Utc)));
        }

        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
            .map_err(|e| ValidationError::InvalidFormat {
                field: "timestamp".to_string(),
                reason: format!("'{}': {}", raw, e),
            })?;

        Ok(self.resolve(self.local_to_utc(naive)?))
    }

    /// The half-open UTC interval `[start, end)` covered by `date`.
    ///
    /// `resolve(t) == date` exactly when `start <= t < end`, so order
    /// queries by timestamp range agree with session assignment. Dates at
    /// the edge of the representable range fail instead of wrapping.
    pub fn window(&self, date: NaiveDate) -> CoreResult<(DateTime<Utc>, DateTime<Utc>)> {
        let cutoff = NaiveTime::from_hms_opt(self.cutoff_hour, 0, 0).unwrap_or_default();
        let start = self.local_to_utc(date.and_time(cutoff))?;
        let end = start
            .checked_add_signed(Duration::days(1))
            .ok_or_else(|| out_of_range(date))?;
        Ok((start, end))
    }

    fn local_to_utc(&self, local: NaiveDateTime) -> CoreResult<DateTime<Utc>> {
        let utc = local
            .checked_sub_signed(Duration::seconds(i64::from(self.offset.local_minus_utc())))
            .ok_or_else(|| out_of_range(local))?;
        Ok(Utc.from_utc_datetime(&utc))
    }
}

fn out_of_range(value: impl std::fmt::Display) -> ValidationError {
    ValidationError::InvalidFormat {
        field: "timestamp".to_string(),
        reason: format!("'{}' is outside the supported range", value),
    }
}

impl Default for OperationalClock {
    /// 06:00 cutoff at UTC-03:00.
    fn default() -> Self {
        OperationalClock {
            cutoff_hour: DEFAULT_CUTOFF_HOUR,
            offset: FixedOffset::east_opt(DEFAULT_TZ_OFFSET_MINUTES * 60)
                .unwrap_or_else(|| Utc.fix()),
        }
    }
}

/// Resolves the operational date of `instant` for the given cutoff and
/// offset.
///
/// ## Example
/// ```rust
/// use caixa_core::resolve_operational_date;
/// use chrono::{TimeZone, Utc};
///
/// // 08:59 UTC = 05:59 local (UTC-03:00): still the previous day
/// let t = Utc.with_ymd_and_hms(2024, 3, 10, 8, 59, 0).unwrap();
/// let date = resolve_operational_date(t, 6, -180).unwrap();
/// assert_eq!(date.to_string(), "2024-03-09");
/// ```
pub fn resolve_operational_date(
    instant: DateTime<Utc>,
    cutoff_hour: u32,
    tz_offset_minutes: i32,
) -> CoreResult<NaiveDate> {
    Ok(OperationalClock::new(cutoff_hour, tz_offset_minutes)?.resolve(instant))
}

// =============================================================================
// Unit Tests
// =============================================================================
