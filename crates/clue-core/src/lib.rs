//! Evidence micro-analysis engine.
//!
//! A player sweeps an analysis tool over an evidence image; hidden clues are
//! found by getting close enough with the right tool. This crate holds the
//! proximity curve, the tool gate, discrete discovery, the session/persisted
//! reconciliation, feedback shaping and the session's timed state.
//!
//! Zero I/O. Time is injected, persistence sits behind [`EvidenceStore`].

pub mod casefile;
pub mod catalog;
pub mod coalesce;
pub mod config;
pub mod constants;
pub mod discovery;
pub mod error;
pub mod evidence;
pub mod feedback;
pub mod geometry;
pub mod persist;
pub mod reconcile;
pub mod session;
pub mod timer;
pub mod tool;
pub mod wire;

pub use casefile::{CaseFile, EvidenceProgress, LabStatus};
pub use catalog::{Case, Catalog};
pub use coalesce::SampleCoalescer;
pub use config::{AnalysisConfig, CueConfig};
pub use discovery::{DiscoveryEngine, DiscoveryEvent, DiscoveryResult, PointerSample};
pub use error::{CatalogError, ConfigError, SessionError, WireError};
pub use evidence::{Clue, ClueId, EvidenceItem, is_valid_id};
pub use feedback::{FeedbackIntensity, cue_interval, signal};
pub use geometry::{Point, Viewport, max_proximity, proximity};
pub use persist::{EvidenceKey, EvidenceStore, MemoryStore, restore};
pub use reconcile::{SessionDiscoverySet, merge, merge_into, revealed_clues};
pub use session::{AnalysisSession, SampleOutcome, SessionTick};
pub use timer::{BannerState, CueTimer, JitterPulse};
pub use tool::{Tool, ToolGate};
pub use wire::{CURRENT_VERSION, ProgressExport, export_json, import_json};
