//! Application layer for Siteline.
//!
//! Coordinates the domain types and the storage/transport layers: recording,
//! session lifecycle, batch scheduling and the `Siteline` context that ties
//! them together.

pub mod performance;
pub mod recorder;
pub mod scheduler;
pub mod sender;
pub mod session_manager;
pub mod siteline;

#[cfg(test)]
mod test_support;

pub use performance::{PerformanceAlert, PerformanceMonitor};
pub use recorder::{AnalyticsForwarder, Recorder};
pub use scheduler::{BatchScheduler, FlushOutcome};
pub use sender::OutboundSender;
pub use session_manager::{NO_SESSION, SessionManager};
pub use siteline::{Siteline, SitelineBuilder, SitelineStatus};
