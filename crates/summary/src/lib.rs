//! Per-document summary cache with foreground and background generation.

mod cache;
mod prompt;
pub mod scheduler;

pub use cache::SummaryCache;
pub use prompt::{fallback_summary, summary_prompt};
pub use scheduler::{BackgroundScheduler, ManualScheduler, TokioScheduler};
