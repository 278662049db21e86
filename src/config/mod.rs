pub mod env;
pub mod types;

pub use env::{load_settings, settings_from_lookup};
pub use types::{SageSettings, Settings, WarehouseBackend};
