pub mod state;

pub use state::{ChatSettings, ENV_PREFIX, SettingsError, SettingsStore};
