#![forbid(unsafe_code)]
//! Filament color/material resolution for slicer projects
//!
//! Given a target slicer, [`resolve`] walks that slicer's config blob,
//! autosave backup, temp working files and recent project archives until one
//! of them yields a filament list. The result carries a trace of every source
//! tried.

pub mod archive;
pub mod candidates;
pub mod color;
pub mod config;
pub mod constants;
pub mod filament;
pub mod parse;
pub mod presets;
pub mod resolver;
pub mod slicer;
pub mod trace;

pub use config::{BridgeSettings, Locations};
pub use filament::FilamentRecord;
pub use resolver::{ResolutionResult, ResolutionStatus, Resolver, resolve};
pub use slicer::{Slicer, SlicerReport, detect_all};
pub use trace::{StrategyTrace, TraceStatus};
