//! Diagnostic trace and the tagged outcome every strategy returns
//!
//! Control flow only looks at found/missed. The status and detail fields
//! exist so a user can tell *why* nothing was found.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::filament::FilamentRecord;

/// Free-form diagnostic fields, ordered for stable output
pub type Details = BTreeMap<String, Value>;

/// Outcome code of one attempted (sub-)strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    /// Produced records
    Ok,
    /// File, directory, entry or key does not exist
    Absent,
    /// Exists but could not be opened or decoded
    Unreadable,
    /// Parsed with no usable document even after every fallback
    Malformed,
    /// Parsed fine but carried no colors
    Empty,
}

/// One trace entry; never modified after being appended
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyTrace {
    pub name: String,
    pub status: TraceStatus,
    #[serde(flatten)]
    pub details: Details,
}

/// Append-only list of trace entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    entries: Vec<StrategyTrace>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `attempt` under `name`
    pub fn record(&mut self, name: impl Into<String>, attempt: &Attempt) {
        self.entries.push(StrategyTrace {
            name: name.into(),
            status: attempt.status(),
            details: attempt.details().clone(),
        });
    }

    pub fn entries(&self) -> &[StrategyTrace] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<StrategyTrace> {
        self.entries
    }
}

/// Tagged result of one attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Found {
        records: Vec<FilamentRecord>,
        /// Sub-source that produced the records, when the attempt has several
        via: Option<String>,
        details: Details,
    },
    Missed {
        status: TraceStatus,
        details: Details,
    },
}

impl Attempt {
    pub fn missed(status: TraceStatus) -> Self {
        Attempt::Missed {
            status,
            details: Details::new(),
        }
    }

    /// `Found` for a non-empty list, `Missed(Empty)` otherwise
    pub fn from_records(records: Vec<FilamentRecord>) -> Self {
        if records.is_empty() {
            Self::missed(TraceStatus::Empty)
        } else {
            Attempt::Found {
                records,
                via: None,
                details: Details::new(),
            }
        }
    }

    /// Parser outcome: `Err` is malformed, an empty list is empty
    pub fn from_parse(result: Result<Vec<FilamentRecord>, String>) -> Self {
        match result {
            Ok(records) => Self::from_records(records),
            Err(error) => Self::missed(TraceStatus::Malformed).with_detail("error", error),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        let details = match &mut self {
            Attempt::Found { details, .. } | Attempt::Missed { details, .. } => details,
        };
        details.insert(key.to_string(), value.into());
        self
    }

    pub fn via(mut self, source: impl Into<String>) -> Self {
        if let Attempt::Found { via, .. } = &mut self {
            *via = Some(source.into());
        }
        self
    }

    pub fn status(&self) -> TraceStatus {
        match self {
            Attempt::Found { .. } => TraceStatus::Ok,
            Attempt::Missed { status, .. } => *status,
        }
    }

    pub fn details(&self) -> &Details {
        match self {
            Attempt::Found { details, .. } | Attempt::Missed { details, .. } => details,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Attempt::Found { .. })
    }
}
