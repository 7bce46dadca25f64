//! Charging schedules

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::tariff::TariffClock;

/// A user's request to charge on a connector between two local times.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChargingSchedule {
    #[serde(alias = "chargerId")]
    pub charger_id: String,
    #[serde(alias = "connectorId")]
    pub connector_id: u32,
    #[serde(alias = "idTag")]
    pub id_tag: String,
    /// Local wall-clock start
    #[serde(alias = "startTime")]
    pub start: NaiveDateTime,
    #[serde(alias = "endTime")]
    pub end: NaiveDateTime,
}

impl ChargingSchedule {
    pub fn start_utc(&self, clock: &TariffClock) -> DateTime<Utc> {
        to_utc(self.start, clock)
    }

    pub fn end_utc(&self, clock: &TariffClock) -> DateTime<Utc> {
        to_utc(self.end, clock)
    }
}

fn to_utc(local: NaiveDateTime, clock: &TariffClock) -> DateTime<Utc> {
    (local - Duration::seconds(i64::from(clock.offset().local_minus_utc()))).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn local_times_convert_with_clock_offset() {
        let schedule = ChargingSchedule {
            charger_id: "CP001".into(),
            connector_id: 1,
            id_tag: "TAG".into(),
            start: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(22, 0, 0).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap().and_hms_opt(6, 0, 0).unwrap(),
        };
        let clock = TariffClock::from_offset_minutes(330);
        assert_eq!(
            schedule.start_utc(&clock),
            Utc.with_ymd_and_hms(2024, 5, 1, 16, 30, 0).unwrap()
        );
        assert_eq!(
            schedule.end_utc(&clock),
            Utc.with_ymd_and_hms(2024, 5, 2, 0, 30, 0).unwrap()
        );
    }

    #[test]
    fn deserializes_provider_field_names() {
        let json = r#"{"chargerId":"CP001","connectorId":2,"idTag":"TAG","startTime":"2024-05-01T22:00:00","endTime":"2024-05-02T06:00:00"}"#;
        let schedule: ChargingSchedule = serde_json::from_str(json).unwrap();
        assert_eq!(schedule.connector_id, 2);
        assert_eq!(schedule.end.to_string(), "2024-05-02 06:00:00");
    }
}
