//! Resolution engine
//!
//! Runs the strategy cascade for one target slicer and stops at the first
//! strategy that yields filaments. Every attempted strategy and sub-source is
//! recorded in the trace, whether it produced anything or not.

pub mod strategies;

use serde::Serialize;
use serde_json::Value;
use std::cell::OnceCell;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::{BridgeSettings, Locations};
use crate::filament::{FilamentRecord, retain_unique_slots};
use crate::parse::structured::parse_structured;
use crate::parse::text::read_text;
use crate::presets::PresetIndex;
use crate::slicer::Slicer;
use crate::trace::{Attempt, StrategyTrace, Trace, TraceStatus};
use strategies::STRATEGIES;

/// Overall outcome of one resolution call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Ok,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionResult {
    pub status: ResolutionStatus,
    pub count: usize,
    pub filaments: Vec<FilamentRecord>,
    /// Winning strategy, `strategy` or `strategy:sub_source`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub trace: Vec<StrategyTrace>,
}

impl ResolutionResult {
    fn found(filaments: Vec<FilamentRecord>, source: String, trace: Trace) -> Self {
        Self {
            status: ResolutionStatus::Ok,
            count: filaments.len(),
            filaments,
            source: Some(source),
            trace: trace.into_entries(),
        }
    }

    fn empty(trace: Trace) -> Self {
        Self {
            status: ResolutionStatus::Empty,
            count: 0,
            filaments: Vec::new(),
            source: None,
            trace: trace.into_entries(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResolutionStatus::Ok
    }
}

/// Resolves filament lists; holds only immutable inputs, so one instance can
/// serve concurrent callers
#[derive(Debug, Clone)]
pub struct Resolver {
    locations: Locations,
    settings: BridgeSettings,
}

impl Resolver {
    pub fn new(locations: Locations, settings: BridgeSettings) -> Self {
        Self {
            locations,
            settings,
        }
    }

    /// Roots from the environment, settings from the default file
    pub fn from_env() -> Self {
        Self::new(Locations::from_env(), BridgeSettings::load())
    }

    /// Resolve the filament list for `target` (`bambu`, `orca`, ...)
    ///
    /// Never fails: unknown targets and missing data produce an `empty`
    /// result whose trace explains what was tried.
    pub fn resolve(&self, target: &str) -> ResolutionResult {
        let mut trace = Trace::new();
        let Some(slicer) = Slicer::from_id(target) else {
            info!(target = target, "Unknown target slicer");
            let attempt = Attempt::missed(TraceStatus::Absent).with_detail("target", target);
            trace.record("target", &attempt);
            return ResolutionResult::empty(trace);
        };

        let ctx = ResolveContext::new(slicer, &self.locations, &self.settings);
        for strategy in STRATEGIES {
            let attempt = strategy.attempt(&ctx, &mut trace);
            debug!(slicer = %slicer, strategy = strategy.name(), status = ?attempt.status(), "Strategy finished");
            trace.record(strategy.name(), &attempt);

            if let Attempt::Found {
                mut records, via, ..
            } = attempt
            {
                retain_unique_slots(&mut records);
                let source = match via {
                    Some(via) => format!("{}:{via}", strategy.name()),
                    None => strategy.name().to_string(),
                };
                info!(slicer = %slicer, source = %source, count = records.len(), "Resolved filaments");
                return ResolutionResult::found(records, source, trace);
            }
        }

        info!(slicer = %slicer, attempts = trace.len(), "No filament data found");
        ResolutionResult::empty(trace)
    }
}

/// Resolve with roots and settings taken from the environment
pub fn resolve(target: &str) -> ResolutionResult {
    Resolver::from_env().resolve(target)
}

/// Main config blob as seen by one resolution call
#[derive(Debug)]
pub enum MainConfigState {
    Absent { path: Option<PathBuf> },
    Unreadable { path: PathBuf },
    Malformed { path: PathBuf, error: String },
    Loaded { path: PathBuf, value: Value },
}

impl MainConfigState {
    fn load(path: Option<PathBuf>, max_chars: usize) -> Self {
        let Some(path) = path else {
            return MainConfigState::Absent { path: None };
        };
        if !path.exists() {
            return MainConfigState::Absent { path: Some(path) };
        }
        let Some(text) = read_text(&path, max_chars) else {
            debug!(path = %path.display(), "Main config unreadable");
            return MainConfigState::Unreadable { path };
        };
        match parse_structured(&text) {
            Ok(value) => MainConfigState::Loaded { path, value },
            Err(error) => {
                debug!(path = %path.display(), error = %error, "Main config malformed");
                MainConfigState::Malformed { path, error }
            }
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            MainConfigState::Loaded { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Trace outcome for a config that could not be used
    pub fn as_attempt(&self) -> Attempt {
        match self {
            MainConfigState::Absent { path } => {
                let attempt = Attempt::missed(TraceStatus::Absent);
                match path {
                    Some(path) => attempt.with_detail("path", path.display().to_string()),
                    None => attempt,
                }
            }
            MainConfigState::Unreadable { path } => Attempt::missed(TraceStatus::Unreadable)
                .with_detail("path", path.display().to_string()),
            MainConfigState::Malformed { path, error } => Attempt::missed(TraceStatus::Malformed)
                .with_detail("path", path.display().to_string())
                .with_detail("error", error.as_str()),
            MainConfigState::Loaded { path, .. } => Attempt::missed(TraceStatus::Empty)
                .with_detail("path", path.display().to_string()),
        }
    }
}

/// Per-call state shared by the strategies; expensive pieces load on first use
pub struct ResolveContext<'a> {
    pub slicer: Slicer,
    pub locations: &'a Locations,
    pub settings: &'a BridgeSettings,
    main_config: OnceCell<MainConfigState>,
    presets: OnceCell<PresetIndex>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(slicer: Slicer, locations: &'a Locations, settings: &'a BridgeSettings) -> Self {
        Self {
            slicer,
            locations,
            settings,
            main_config: OnceCell::new(),
            presets: OnceCell::new(),
        }
    }

    pub fn main_config(&self) -> &MainConfigState {
        self.main_config.get_or_init(|| {
            MainConfigState::load(
                self.locations.main_config_file(self.slicer),
                self.settings.max_text_chars,
            )
        })
    }

    pub fn presets(&self) -> &PresetIndex {
        self.presets
            .get_or_init(|| PresetIndex::build(self.slicer, self.locations, self.settings))
    }
}
