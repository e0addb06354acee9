#![deny(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod color;
pub mod config;
mod sync;
pub mod telemetry;

pub use color::Colors;
pub use color::init as color_init;
pub use config::CmtConfig;
pub use config::ConfigError;
pub use config::expand_home;
pub use sync::mutex_lock_or_recover;
pub use sync::poison_recovery_count;
