//! Meter delta accumulation
//!
//! Turns a seed reading plus the cumulative readings that followed it into
//! consecutive-pair energy deltas. Deltas that are zero or negative (idle
//! periods, meter resets, replays) are kept but flagged non-billable.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::model::MeterSample;

/// Energy register value known at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergySeed {
    pub at: DateTime<Utc>,
    pub energy_wh: Decimal,
}

impl EnergySeed {
    pub fn new(at: DateTime<Utc>, energy_wh: Decimal) -> Self {
        Self { at, energy_wh }
    }

    /// Seed used when nothing precedes the window.
    pub fn zero(at: DateTime<Utc>) -> Self {
        Self {
            at,
            energy_wh: Decimal::ZERO,
        }
    }
}

impl From<&MeterSample> for EnergySeed {
    fn from(sample: &MeterSample) -> Self {
        Self::new(sample.timestamp, sample.energy_wh)
    }
}

/// Energy consumed between two consecutive readings.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyDelta {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub start_wh: Decimal,
    pub end_wh: Decimal,
    pub delta_wh: Decimal,
}

impl EnergyDelta {
    pub fn is_billable(&self) -> bool {
        self.delta_wh > Decimal::ZERO
    }

    /// Billable energy in kWh; zero for non-billable deltas.
    pub fn billable_kwh(&self) -> Decimal {
        if self.is_billable() {
            self.delta_wh / Decimal::ONE_THOUSAND
        } else {
            Decimal::ZERO
        }
    }
}

/// Stateful accumulator: each pushed reading yields the delta against the
/// previous one.
#[derive(Debug, Clone)]
pub struct MeterDeltaAccumulator {
    last: EnergySeed,
}

impl MeterDeltaAccumulator {
    pub fn new(seed: EnergySeed) -> Self {
        Self { last: seed }
    }

    pub fn last(&self) -> EnergySeed {
        self.last
    }

    pub fn push(&mut self, at: DateTime<Utc>, energy_wh: Decimal) -> EnergyDelta {
        let delta = EnergyDelta {
            from: self.last.at,
            to: at,
            start_wh: self.last.energy_wh,
            end_wh: energy_wh,
            delta_wh: energy_wh - self.last.energy_wh,
        };
        self.last = EnergySeed::new(at, energy_wh);
        delta
    }

    /// Deltas for every reading after `seed.at`, in timestamp order.
    /// Readings sharing a timestamp collapse to the last one given.
    pub fn deltas(seed: EnergySeed, readings: &[MeterSample]) -> Vec<EnergyDelta> {
        let mut ordered: Vec<&MeterSample> =
            readings.iter().filter(|r| r.timestamp > seed.at).collect();
        ordered.sort_by_key(|r| r.timestamp);
        let mut collapsed: Vec<&MeterSample> = Vec::with_capacity(ordered.len());
        for reading in ordered {
            match collapsed.last_mut() {
                Some(last) if last.timestamp == reading.timestamp => *last = reading,
                _ => collapsed.push(reading),
            }
        }

        let mut acc = Self::new(seed);
        collapsed
            .into_iter()
            .map(|r| acc.push(r.timestamp, r.energy_wh))
            .collect()
    }
}

// ── Tests ──────────────────────────────────────────────────────
