pub mod check;
pub mod status;
pub mod target;

pub use check::{CheckResult, ProbeErrorKind};
pub use status::HealthStatus;
pub use target::{Target, TargetKind};
