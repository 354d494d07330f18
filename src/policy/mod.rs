pub mod hot_reload;
pub mod loader;

pub use hot_reload::PolicyWatcher;
pub use loader::{PolicyError, PolicyLoader, DEFAULT_REFDATA_ENV_PREFIX};
