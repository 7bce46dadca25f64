//! Application ports (hexagonal architecture boundaries)

pub mod outbound;

pub use outbound::{
    ChargePointCommandPort, CommandStatus, ConnectorStatus, ReachabilityPort, RegistrationStatus,
    ScheduleProvider, TariffProvider, UserNotifier, WalletProvider,
};
