pub mod alert;
pub mod clock;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod events;
pub mod health;
pub mod incident;
pub mod registry;
pub mod render;
pub mod scheduler;

pub use alert::{Alert, AlertDispatcher, AlertKind, DeliveryReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dashboard::{
    CategorySnapshot, DashboardAggregator, DashboardSnapshot, TargetSnapshot, TickOutcome,
};
pub use engine::{CycleOutcome, CycleReport, MonitorEngine, MonitorEngineBuilder, Readiness};
pub use error::{IncidentError, MonitorError, RegistryError, RenderError, Result};
pub use events::HealthEvent;
pub use health::{HealthPolicy, HealthRecord, HealthTracker};
pub use incident::{format_duration, CloseReason, Incident, IncidentManager, OpenedIncident};
pub use registry::{validate_target, TargetRegistry};
pub use render::{FileRenderSink, MemoryRenderSink, RenderSink};
pub use scheduler::Scheduler;
