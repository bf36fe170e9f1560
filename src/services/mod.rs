pub mod audit;
pub mod combination;
pub mod results_gateway;
pub mod scheduler;
pub mod settlement;

pub use audit::{AuditLogEntry, AuditTrailService, UnitKind};
pub use combination::{evaluate, status_for_multiplier, ticket_payout, CombinationSettler, TicketDecision};
pub use results_gateway::{normalize, GatewayError, HttpResultsGateway, ResultsGateway};
pub use scheduler::{CycleRun, SettlementScheduler, TriggerResponse};
pub use settlement::{CycleReport, Disposition, SettlementService, SettlerReport};
