//! Meter telemetry types

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One physical outlet on a charge point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectorRef {
    pub charge_box_id: String,
    pub connector_id: u32,
}

impl ConnectorRef {
    pub fn new(charge_box_id: impl Into<String>, connector_id: u32) -> Self {
        Self {
            charge_box_id: charge_box_id.into(),
            connector_id,
        }
    }
}

impl std::fmt::Display for ConnectorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.charge_box_id, self.connector_id)
    }
}

/// Cumulative energy register reading of a connector.
///
/// Nominally monotonic, but resets and replays happen; consumers must not
/// assume ordering of values.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterSample {
    pub connector: ConnectorRef,
    pub timestamp: DateTime<Utc>,
    pub energy_wh: Decimal,
}

impl MeterSample {
    pub fn new(connector: ConnectorRef, timestamp: DateTime<Utc>, energy_wh: Decimal) -> Self {
        Self {
            connector,
            timestamp,
            energy_wh,
        }
    }
}

/// Measurands the billing engine tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Measurand {
    Voltage,
    PowerActiveImport,
    EnergyActiveImportRegister,
    SoC,
    PowerOffered,
    Other(String),
}

impl Measurand {
    pub fn from_ocpp_name(name: &str) -> Self {
        match name {
            "Voltage" => Self::Voltage,
            "Power.Active.Import" => Self::PowerActiveImport,
            "Energy.Active.Import.Register" => Self::EnergyActiveImportRegister,
            "SoC" => Self::SoC,
            "Power.Offered" => Self::PowerOffered,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A single sampled value as received, before parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledReading {
    pub measurand: Measurand,
    pub value: String,
    /// Unit as reported (`"Wh"`, `"kWh"`, `"W"`, `"kW"`, ...)
    pub unit: Option<String>,
}

impl SampledReading {
    pub fn new(measurand: Measurand, value: impl Into<String>) -> Self {
        Self {
            measurand,
            value: value.into(),
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// All sampled values reported for one timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterReading {
    pub timestamp: DateTime<Utc>,
    pub values: Vec<SampledReading>,
}

impl MeterReading {
    /// The energy register value in Wh, if present and well-formed.
    pub fn energy_wh(&self) -> Option<Decimal> {
        self.values
            .iter()
            .filter(|v| v.measurand == Measurand::EnergyActiveImportRegister)
            .find_map(|v| parse_scaled(&v.value, v.unit.as_deref()).ok())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TelemetryError {
    #[error("invalid numeric value '{0}'")]
    InvalidValue(String),
}

fn parse_scaled(raw: &str, unit: Option<&str>) -> Result<Decimal, TelemetryError> {
    let value = Decimal::from_str(raw.trim())
        .or_else(|_| Decimal::from_scientific(raw.trim()))
        .map_err(|_| TelemetryError::InvalidValue(raw.to_string()))?;
    match unit {
        Some("kWh") | Some("kW") | Some("kvarh") | Some("kvar") => value
            .checked_mul(Decimal::ONE_THOUSAND)
            .ok_or_else(|| TelemetryError::InvalidValue(raw.to_string())),
        _ => Ok(value),
    }
}

/// Running per-transaction telemetry row.
///
/// Each measurand keeps its last reported value; fields never reported stay
/// at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub transaction_id: i32,
    pub connector: ConnectorRef,
    pub id_tag: String,
    pub timestamp: DateTime<Utc>,
    pub voltage: Decimal,
    pub power_w: Decimal,
    pub energy_wh: Decimal,
    pub soc: Decimal,
    pub offered_power_w: Decimal,
    pub tax_amount: Option<Decimal>,
    pub total_amount: Option<Decimal>,
}

impl TelemetryRecord {
    pub fn new(transaction_id: i32, connector: ConnectorRef, id_tag: impl Into<String>) -> Self {
        Self {
            transaction_id,
            connector,
            id_tag: id_tag.into(),
            timestamp: Utc::now(),
            voltage: Decimal::ZERO,
            power_w: Decimal::ZERO,
            energy_wh: Decimal::ZERO,
            soc: Decimal::ZERO,
            offered_power_w: Decimal::ZERO,
            tax_amount: None,
            total_amount: None,
        }
    }

    /// Fold one sampled value into the record. Malformed values are rejected
    /// without touching the record; unknown measurands are ignored.
    pub fn apply(&mut self, reading: &SampledReading) -> Result<(), TelemetryError> {
        if let Measurand::Other(_) = reading.measurand {
            return Ok(());
        }
        let value = parse_scaled(&reading.value, reading.unit.as_deref())?;
        match reading.measurand {
            Measurand::Voltage => self.voltage = value,
            Measurand::PowerActiveImport => self.power_w = value,
            Measurand::EnergyActiveImportRegister => self.energy_wh = value,
            Measurand::SoC => self.soc = value,
            Measurand::PowerOffered => self.offered_power_w = value,
            Measurand::Other(_) => {}
        }
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record() -> TelemetryRecord {
        TelemetryRecord::new(1, ConnectorRef::new("CP001", 1), "TAG-001")
    }

    #[test]
    fn measurand_names_map_to_variants() {
        assert_eq!(Measurand::from_ocpp_name("Voltage"), Measurand::Voltage);
        assert_eq!(
            Measurand::from_ocpp_name("Energy.Active.Import.Register"),
            Measurand::EnergyActiveImportRegister
        );
        assert_eq!(
            Measurand::from_ocpp_name("Current.Import"),
            Measurand::Other("Current.Import".into())
        );
    }

    #[test]
    fn apply_updates_only_the_reported_field() {
        let mut rec = record();
        rec.apply(&SampledReading::new(Measurand::Voltage, "230.5")).unwrap();
        rec.apply(&SampledReading::new(Measurand::SoC, "42")).unwrap();
        assert_eq!(rec.voltage, dec!(230.5));
        assert_eq!(rec.soc, dec!(42));
        assert_eq!(rec.energy_wh, Decimal::ZERO);
    }

    #[test]
    fn kilo_units_are_normalised() {
        let mut rec = record();
        rec.apply(&SampledReading::new(Measurand::EnergyActiveImportRegister, "1.5").with_unit("kWh"))
            .unwrap();
        rec.apply(&SampledReading::new(Measurand::PowerActiveImport, "7.2").with_unit("kW"))
            .unwrap();
        assert_eq!(rec.energy_wh, dec!(1500));
        assert_eq!(rec.power_w, dec!(7200));
    }

    #[test]
    fn malformed_value_leaves_record_untouched() {
        let mut rec = record();
        rec.apply(&SampledReading::new(Measurand::EnergyActiveImportRegister, "900"))
            .unwrap();
        let err = rec
            .apply(&SampledReading::new(Measurand::EnergyActiveImportRegister, "n/a"))
            .unwrap_err();
        assert_eq!(err, TelemetryError::InvalidValue("n/a".into()));
        assert_eq!(rec.energy_wh, dec!(900));
    }

    #[test]
    fn out_of_range_kilo_value_is_rejected() {
        let huge = "79228162514264337593543950335";
        let mut rec = record();
        rec.apply(&SampledReading::new(Measurand::EnergyActiveImportRegister, "900"))
            .unwrap();
        let err = rec
            .apply(&SampledReading::new(Measurand::EnergyActiveImportRegister, huge).with_unit("kWh"))
            .unwrap_err();
        assert_eq!(err, TelemetryError::InvalidValue(huge.into()));
        assert_eq!(rec.energy_wh, dec!(900));

        let reading = MeterReading {
            timestamp: Utc::now(),
            values: vec![SampledReading::new(Measurand::EnergyActiveImportRegister, huge).with_unit("kWh")],
        };
        assert_eq!(reading.energy_wh(), None);
    }

    #[test]
    fn unknown_measurand_is_ignored() {
        let mut rec = record();
        let reading = SampledReading::new(Measurand::Other("Temperature".into()), "garbage");
        assert!(rec.apply(&reading).is_ok());
    }

    #[test]
    fn reading_energy_lookup() {
        let reading = MeterReading {
            timestamp: Utc::now(),
            values: vec![
                SampledReading::new(Measurand::Voltage, "230"),
                SampledReading::new(Measurand::EnergyActiveImportRegister, "12.25").with_unit("kWh"),
            ],
        };
        assert_eq!(reading.energy_wh(), Some(dec!(12250)));
    }
}
