//! Time-of-day tariff windows

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One rate window of a charger's time-of-day tariff.
///
/// `start_time`/`end_time` are local times of day. A window whose start is
/// not before its end wraps past midnight (e.g. 22:00 → 06:00).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffWindow {
    #[serde(alias = "startTime")]
    pub start_time: NaiveTime,
    #[serde(alias = "endTime")]
    pub end_time: NaiveTime,
    /// Price per kWh
    #[serde(alias = "unitFare")]
    pub unit_rate: Decimal,
    /// Tax applied on top of the energy cost, in percent
    #[serde(alias = "gstFare")]
    pub tax_rate_percent: Decimal,
}

impl TariffWindow {
    pub fn new(
        start_time: NaiveTime,
        end_time: NaiveTime,
        unit_rate: Decimal,
        tax_rate_percent: Decimal,
    ) -> Self {
        Self {
            start_time,
            end_time,
            unit_rate,
            tax_rate_percent,
        }
    }

    pub fn is_overnight(&self) -> bool {
        self.start_time >= self.end_time
    }

    /// Half-open membership test, `[start, end)`.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.is_overnight() {
            time >= self.start_time || time < self.end_time
        } else {
            time >= self.start_time && time < self.end_time
        }
    }
}

/// Find the window applying at `time`. The first matching window wins;
/// `None` means the instant is not billable.
pub fn resolve(time: NaiveTime, windows: &[TariffWindow]) -> Option<&TariffWindow> {
    windows.iter().find(|w| w.contains(time))
}

/// Converts UTC instants to the local time of day tariffs are written in.
#[derive(Debug, Clone, Copy)]
pub struct TariffClock {
    offset: FixedOffset,
}

impl TariffClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Build from an offset in minutes east of UTC. Out-of-range values fall
    /// back to UTC.
    pub fn from_offset_minutes(minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local_time(&self, at: DateTime<Utc>) -> NaiveTime {
        at.with_timezone(&self.offset).time()
    }

    pub fn resolve<'a>(
        &self,
        at: DateTime<Utc>,
        windows: &'a [TariffWindow],
    ) -> Option<&'a TariffWindow> {
        resolve(self.local_time(at), windows)
    }
}

impl Default for TariffClock {
    fn default() -> Self {
        Self::from_offset_minutes(0)
    }
}

// ── Tests ──────────────────────────────────────────────────────
