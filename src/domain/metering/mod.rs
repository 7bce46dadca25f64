//! Metering aggregate
//!
//! Connector references, raw meter readings, the running telemetry record,
//! and the delta accumulator used by the polling billing path.

pub mod accumulator;
pub mod model;
pub mod repository;

pub use accumulator::{EnergyDelta, EnergySeed, MeterDeltaAccumulator};
pub use model::{
    ConnectorRef, Measurand, MeterReading, MeterSample, SampledReading, TelemetryError,
    TelemetryRecord,
};
pub use repository::{MeterReadingRepository, TelemetryRepository};
