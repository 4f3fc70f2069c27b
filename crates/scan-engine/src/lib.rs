#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`ScanEngineError`)
//! - [`config`]: Engine configuration (`ScanEngineConfig`, builder)
//! - [`eligibility`]: Path-based eligibility filter (`is_eligible`)
//! - [`oracle`]: Analysis oracle (`AnalysisOracle` trait, `HttpOracleClient`, response repair)
//! - [`store`]: Result store (`ResultStore` trait, `InMemoryResultStore`)
//! - [`progress`]: Per-entry outcomes and progress policy (`EntryOutcome`, `ProgressTracker`)
//! - [`summary`]: Scan summary computation
//! - [`runner`]: Scan state machine (`ScanRunner`)
//! - [`queue`]: Job queue (`ScanQueue`, `ScanQueueBuilder`, `Pipeline` impl)
//! - [`event`]: Scan lifecycle events (`ScanEvent`)

pub mod config;
pub mod eligibility;
pub mod error;
pub mod event;
pub mod oracle;
pub mod progress;
pub mod queue;
pub mod runner;
pub mod store;
pub mod summary;

// --- Public API Re-exports ---

// Queue (main orchestrator)
pub use queue::{ScanQueue, ScanQueueBuilder, ScanQueueHandle};

// Runner
pub use runner::ScanRunner;

// Configuration
pub use config::{ScanEngineConfig, ScanEngineConfigBuilder};

// Error
pub use error::ScanEngineError;

// Events
pub use event::{ScanEvent, ScanEventKind};

// Eligibility
pub use eligibility::{is_eligible, is_eligible_path};

// Oracle
pub use oracle::{
    AnalysisOracle, Finding, FindingsResult, HttpOracleClient, OracleResponse, parse_findings,
};

// Store
pub use store::{InMemoryResultStore, InvalidationStrategy, ResultStore, ScanResults};

// Progress
pub use progress::{EntryOutcome, ProgressPolicy, ProgressTracker};

// Summary
pub use summary::summarize;
