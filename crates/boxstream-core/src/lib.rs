pub mod config;
pub mod error;

pub use config::{expand_tilde, load_config, BoxStreamConfig, LogFormat};
pub use error::{CoreError, CoreResult};
