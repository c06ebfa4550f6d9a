//! Background services for taskscope-server.

pub mod reaper;

pub use reaper::ReaperService;
