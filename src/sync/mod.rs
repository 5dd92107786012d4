//! Catalog import pipeline
//!
//! Reads export rows, turns each into a product payload and pushes the
//! payloads to the remote catalog, reporting every record individually.

pub mod payload;
pub mod source;
mod orchestrator;

pub use orchestrator::{
    LinkResult, SyncFailure, SyncMode, SyncOptions, SyncOrchestrator, SyncOutcome, SyncReport,
    SyncResult,
};
pub use payload::{PayloadBuilder, RawRow};
pub use source::{read_rows, SourceError};
