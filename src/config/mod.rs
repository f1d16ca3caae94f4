//! Monitor Configuration Module
//!
//! Per-node configuration loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `NEOGRID_CONFIG` environment variable (path to TOML file)
//! 3. `neogrid.toml` in the current working directory
//! 4. Built-in defaults
//!
//! Configuration is fixed once the pipeline starts; there is no runtime
//! reconfiguration. The loaded value is passed by reference into the
//! components that need it.

mod monitor_config;
pub mod defaults;
pub mod validation;

pub use monitor_config::*;
