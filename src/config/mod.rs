pub mod settings;

pub use settings::{RetryConfig, Settings, ENV_PREFIX};
