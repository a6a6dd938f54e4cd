pub mod app;
pub mod error;
pub mod handle;
pub mod loader;
pub mod settings;
pub mod store;

pub use app::{AppConfig, DashboardConfig, NotifyConfig, RecipientConfig, RuntimeConfig, ServerConfig};
pub use error::ConfigError;
pub use handle::SettingsHandle;
pub use loader::ConfigLoader;
pub use settings::MonitorSettings;
pub use store::{RuntimeState, RuntimeStore};
