//! Configuration for the bridge
//!
//! - **settings**: resolver limits loaded from `config.json` with env overrides
//! - **locations**: filesystem roots captured from the environment

pub mod locations;
pub mod settings;

pub use locations::Locations;
pub use settings::BridgeSettings;
