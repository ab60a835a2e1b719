//! Configuration loading with multiple sources.
//!
//! Merges job options from defaults, `qrun.config.json`, `QRUN_*`
//! environment variables and CLI flags.
//! Priority: CLI > Environment > File > Defaults

mod loading;
mod tests;
mod validation;

pub use loading::{CONFIG_FILE, ENV_PREFIX, load};
pub use validation::validate;
