//! Scheduled charging
//!
//! Users book a connector for a local time window. Each tick looks at the
//! booked windows: an upcoming window gets one reminder, a window that has
//! just opened starts a session if the vehicle is plugged in, and a window
//! that has just closed stops the session it started.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use super::session::{SessionCommandFacade, StartOutcome};
use super::stop_reason::{StopReasonStore, SCHEDULER_STOP};
use crate::application::ports::{ConnectorStatus, ReachabilityPort, ScheduleProvider, UserNotifier};
use crate::domain::{ChargingSchedule, ChargingTransaction, DomainResult, RepositoryProvider, TariffClock};

pub const MSG_SCHEDULE_COMPLETED: &str = "Schedule completed successfully.";
pub const MSG_CONNECT_VEHICLE: &str = "Device is online. Please connect the charger to vehicle.";
pub const MSG_JUST_FINISHED: &str = "Device just finished charging. Try again later.";
pub const MSG_CHARGER_OFFLINE: &str = "Device is offline. Please check the charger.";
pub const MSG_STATUS_UNKNOWN: &str = "Device status unknown. Please check the charger.";

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// How late after a boundary a tick may still act on it.
pub const DEFAULT_TOLERANCE_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Phase {
    Reminder,
    Start,
    End,
}

/// What a tick did for one schedule.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleAction {
    Reminded { id_tag: String },
    Started { charger_id: String, outcome: StartOutcome },
    /// The window opened but the connector was not ready
    StartDeferred {
        charger_id: String,
        status: Option<ConnectorStatus>,
    },
    Stopped { transaction_id: i32, delivered: bool },
    NothingToStop { charger_id: String },
}

pub struct ScheduledChargingService {
    repos: Arc<dyn RepositoryProvider>,
    facade: Arc<SessionCommandFacade>,
    reachability: Arc<dyn ReachabilityPort>,
    notifier: Arc<dyn UserNotifier>,
    stop_reasons: Arc<StopReasonStore>,
    clock: TariffClock,
    tolerance: Duration,
    /// Boundaries already acted on, with the window end for eviction
    fired: DashMap<(ChargingSchedule, Phase), DateTime<Utc>>,
}

impl ScheduledChargingService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        facade: Arc<SessionCommandFacade>,
        reachability: Arc<dyn ReachabilityPort>,
        notifier: Arc<dyn UserNotifier>,
        stop_reasons: Arc<StopReasonStore>,
        clock: TariffClock,
    ) -> Self {
        Self {
            repos,
            facade,
            reachability,
            notifier,
            stop_reasons,
            clock,
            tolerance: Duration::seconds(DEFAULT_TOLERANCE_SECS),
            fired: DashMap::new(),
        }
    }

    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Fetch schedules from `provider` and tick. A provider failure skips
    /// this tick.
    pub async fn run_once(&self, provider: &dyn ScheduleProvider, now: DateTime<Utc>) -> Vec<ScheduleAction> {
        match provider.schedules().await {
            Ok(schedules) => self.tick(now, &schedules).await,
            Err(e) => {
                warn!(error = %e, "Schedule fetch failed");
                Vec::new()
            }
        }
    }

    pub async fn tick(&self, now: DateTime<Utc>, schedules: &[ChargingSchedule]) -> Vec<ScheduleAction> {
        let mut actions = Vec::new();

        for schedule in schedules {
            let start = schedule.start_utc(&self.clock);
            let end = schedule.end_utc(&self.clock);
            if end <= start {
                debug!(charger_id = schedule.charger_id.as_str(), "Ignoring empty schedule window");
                continue;
            }

            if now < start && self.first(schedule, Phase::Reminder, end) {
                let message = format!(
                    "You have scheduled from {} to {}",
                    schedule.start.format(DISPLAY_FORMAT),
                    schedule.end.format(DISPLAY_FORMAT)
                );
                self.notifier.notify(&schedule.id_tag, &message).await;
                actions.push(ScheduleAction::Reminded {
                    id_tag: schedule.id_tag.clone(),
                });
            }

            if now >= start && now < start + self.tolerance && now < end && self.first(schedule, Phase::Start, end) {
                actions.push(self.begin(schedule).await);
            }

            if now >= end && now < end + self.tolerance && self.first(schedule, Phase::End, end) {
                actions.push(self.finish(schedule).await);
            }
        }

        let horizon = now - Duration::days(1);
        self.fired.retain(|_, window_end| *window_end > horizon);
        actions
    }

    fn first(&self, schedule: &ChargingSchedule, phase: Phase, window_end: DateTime<Utc>) -> bool {
        match self.fired.entry((schedule.clone(), phase)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(window_end);
                true
            }
        }
    }

    async fn begin(&self, schedule: &ChargingSchedule) -> ScheduleAction {
        let status = self
            .reachability
            .connector_status(&schedule.charger_id, schedule.connector_id)
            .await;

        let message = match status {
            Some(ConnectorStatus::Preparing) => {
                info!(
                    charger_id = schedule.charger_id.as_str(),
                    connector_id = schedule.connector_id,
                    id_tag = schedule.id_tag.as_str(),
                    "Schedule window opened, starting session"
                );
                let outcome = self
                    .facade
                    .start_session(&schedule.charger_id, schedule.connector_id, &schedule.id_tag)
                    .await;
                return ScheduleAction::Started {
                    charger_id: schedule.charger_id.clone(),
                    outcome,
                };
            }
            Some(ConnectorStatus::Available) => MSG_CONNECT_VEHICLE,
            Some(ConnectorStatus::Finishing) => MSG_JUST_FINISHED,
            Some(ConnectorStatus::Unavailable) => MSG_CHARGER_OFFLINE,
            _ => MSG_STATUS_UNKNOWN,
        };

        self.notifier.notify(&schedule.id_tag, message).await;
        ScheduleAction::StartDeferred {
            charger_id: schedule.charger_id.clone(),
            status,
        }
    }

    async fn finish(&self, schedule: &ChargingSchedule) -> ScheduleAction {
        let tx = match self.latest_open(schedule).await {
            Ok(Some(tx)) => tx,
            Ok(None) => {
                debug!(charger_id = schedule.charger_id.as_str(), "Schedule ended with nothing charging");
                return ScheduleAction::NothingToStop {
                    charger_id: schedule.charger_id.clone(),
                };
            }
            Err(e) => {
                error!(charger_id = schedule.charger_id.as_str(), error = %e, "Open transaction lookup failed");
                return ScheduleAction::NothingToStop {
                    charger_id: schedule.charger_id.clone(),
                };
            }
        };

        self.stop_reasons.put(tx.id, SCHEDULER_STOP);
        let delivered = self
            .facade
            .stop_session(&tx.connector.charge_box_id, tx.connector.connector_id, tx.id)
            .await
            .is_ok();
        if delivered {
            self.notifier.notify(&schedule.id_tag, MSG_SCHEDULE_COMPLETED).await;
        } else {
            self.stop_reasons.take(tx.id);
        }
        ScheduleAction::Stopped {
            transaction_id: tx.id,
            delivered,
        }
    }

    async fn latest_open(&self, schedule: &ChargingSchedule) -> DomainResult<Option<ChargingTransaction>> {
        let open = self
            .repos
            .transactions()
            .find_open_by_id_tag(&schedule.id_tag)
            .await?;
        Ok(open
            .into_iter()
            .filter(|tx| tx.connector.charge_box_id == schedule.charger_id)
            .max_by_key(|tx| tx.started_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::CommandStatus;
    use crate::application::services::testing::{FakeReachability, RecordingCommands, RecordingNotifier};
    use crate::domain::ConnectorRef;
    use crate::infrastructure::storage::InMemoryStorage;
    use chrono::{NaiveDate, TimeZone};

    struct Harness {
        service: ScheduledChargingService,
        storage: Arc<InMemoryStorage>,
        commands: Arc<RecordingCommands>,
        notifier: Arc<RecordingNotifier>,
        reasons: Arc<StopReasonStore>,
    }

    fn harness(reachability: FakeReachability) -> Harness {
        let storage = Arc::new(InMemoryStorage::new());
        let commands = Arc::new(RecordingCommands::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let reasons = Arc::new(StopReasonStore::new());
        let reachability = Arc::new(reachability);
        let facade = Arc::new(SessionCommandFacade::new(
            commands.clone(),
            reachability.clone(),
            notifier.clone(),
        ));
        let service = ScheduledChargingService::new(
            storage.clone(),
            facade,
            reachability,
            notifier.clone(),
            reasons.clone(),
            TariffClock::from_offset_minutes(330),
        );
        Harness {
            service,
            storage,
            commands,
            notifier,
            reasons,
        }
    }

    /// 22:00–23:00 IST on 1 May 2024, i.e. 16:30–17:30 UTC.
    fn schedule() -> ChargingSchedule {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        ChargingSchedule {
            charger_id: "CP001".into(),
            connector_id: 1,
            id_tag: "TAG".into(),
            start: day.and_hms_opt(22, 0, 0).unwrap(),
            end: day.and_hms_opt(23, 0, 0).unwrap(),
        }
    }

    fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    fn ready() -> FakeReachability {
        FakeReachability::default().accepted("CP001").online("CP001")
    }

    #[tokio::test]
    async fn upcoming_window_is_reminded_once() {
        let h = harness(ready());
        h.service.tick(utc(15, 0, 0), &[schedule()]).await;
        h.service.tick(utc(15, 0, 1), &[schedule()]).await;

        assert_eq!(
            h.notifier.messages(),
            vec![("TAG".to_string(), "You have scheduled from 2024-05-01 22:00 to 2024-05-01 23:00".to_string())]
        );
    }

    #[tokio::test]
    async fn preparing_connector_starts_at_window_open() {
        let h = harness(ready().with_connector("CP001", 1, ConnectorStatus::Preparing));

        let actions = h.service.tick(utc(16, 30, 1), &[schedule()]).await;
        let again = h.service.tick(utc(16, 30, 2), &[schedule()]).await;

        assert_eq!(
            actions,
            vec![ScheduleAction::Started {
                charger_id: "CP001".into(),
                outcome: StartOutcome::Dispatched(CommandStatus::Accepted),
            }]
        );
        assert!(again.is_empty());
        assert_eq!(h.commands.starts().len(), 1);
    }

    #[tokio::test]
    async fn unready_connector_gets_status_message() {
        let cases = [
            (Some(ConnectorStatus::Available), MSG_CONNECT_VEHICLE),
            (Some(ConnectorStatus::Finishing), MSG_JUST_FINISHED),
            (Some(ConnectorStatus::Unavailable), MSG_CHARGER_OFFLINE),
            (Some(ConnectorStatus::Faulted), MSG_STATUS_UNKNOWN),
            (None, MSG_STATUS_UNKNOWN),
        ];
        for (status, expected) in cases {
            let reach = match status {
                Some(s) => ready().with_connector("CP001", 1, s),
                None => ready(),
            };
            let h = harness(reach);

            let actions = h.service.tick(utc(16, 30, 5), &[schedule()]).await;

            assert_eq!(
                actions,
                vec![ScheduleAction::StartDeferred {
                    charger_id: "CP001".into(),
                    status,
                }]
            );
            assert_eq!(h.notifier.messages(), vec![("TAG".to_string(), expected.to_string())]);
            assert!(h.commands.starts().is_empty());
        }
    }

    #[tokio::test]
    async fn missed_window_open_does_nothing() {
        let h = harness(ready().with_connector("CP001", 1, ConnectorStatus::Preparing));
        let actions = h.service.tick(utc(16, 45, 0), &[schedule()]).await;
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn window_close_stops_latest_open_transaction() {
        let h = harness(ready());
        let conn = ConnectorRef::new("CP001", 1);
        for (id, started) in [(1, utc(16, 31, 0)), (2, utc(16, 40, 0))] {
            h.storage
                .transactions()
                .save(ChargingTransaction::new(id, conn.clone(), "TAG", started))
                .await
                .unwrap();
        }
        h.storage
            .transactions()
            .save(ChargingTransaction::new(3, ConnectorRef::new("CP002", 1), "TAG", utc(16, 50, 0)))
            .await
            .unwrap();

        let actions = h.service.tick(utc(17, 30, 10), &[schedule()]).await;

        assert_eq!(actions, vec![ScheduleAction::Stopped { transaction_id: 2, delivered: true }]);
        assert_eq!(h.commands.stops(), vec![("CP001".to_string(), 2)]);
        assert_eq!(h.reasons.take(2).as_deref(), Some(SCHEDULER_STOP));
        assert_eq!(h.notifier.messages(), vec![("TAG".to_string(), MSG_SCHEDULE_COMPLETED.to_string())]);
    }

    #[tokio::test]
    async fn failed_schedule_stop_drops_reason() {
        let h = harness(ready());
        h.storage
            .transactions()
            .save(ChargingTransaction::new(1, ConnectorRef::new("CP001", 1), "TAG", utc(16, 31, 0)))
            .await
            .unwrap();
        h.commands.fail_stops();

        let actions = h.service.tick(utc(17, 30, 0), &[schedule()]).await;

        assert_eq!(actions, vec![ScheduleAction::Stopped { transaction_id: 1, delivered: false }]);
        assert!(!h.reasons.contains(1));
        assert!(h.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn window_close_without_session() {
        let h = harness(ready());
        let actions = h.service.tick(utc(17, 30, 0), &[schedule()]).await;
        assert_eq!(actions, vec![ScheduleAction::NothingToStop { charger_id: "CP001".into() }]);
    }
}
