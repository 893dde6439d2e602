pub mod error;
pub mod json_bridge;
pub mod schema;
pub mod settings;
pub mod store;

pub use error::{Result, StoreError};
pub use settings::{CONFIG_FILE, DB_FILE, PID_FILE, default_base_dir, load_config};
pub use store::Store;
