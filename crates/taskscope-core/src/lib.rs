//! taskscope-core - Core library for Taskscope
//!
//! Turns workshop documents into a catalog of recurring work tasks. Shared by
//! the `taskscope` CLI and `taskscope-server`:
//!
//! - **extractor**: Plain text from DOCX, PDF, XLSX/XLS, TXT and HWP files
//! - **upload**: Validated, streamed writes of uploaded documents
//! - **cache**: Response cache for provider calls (memory or SQLite)
//! - **analysis**: Prompting, response decoding and keyword heuristics
//! - **store**: Workshop and file registry
//! - **orchestrator**: Workshop lifecycle and the per-file analysis loop
//! - **auth**: Local access token

pub mod analysis;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod extractor;
pub mod orchestrator;
pub mod store;
pub mod types;
pub mod upload;

// Re-export commonly used types
pub use analysis::AnalysisEngine;
pub use cache::{CacheStats, ResponseCache};
pub use config::TaskscopeConfig;
pub use error::{Error, Result};
pub use orchestrator::{AnalysisEvent, AnalysisOptions, AnalysisSummary, EventSink, WorkshopOrchestrator};
pub use store::{InMemoryWorkshopStore, WorkshopStore};
pub use upload::FileIntake;
