pub mod capability;
pub mod clock;
pub mod config;
pub mod delivery;
pub mod error;
pub mod payload;
pub mod record;
pub mod retry;
pub mod session;
pub mod storage;

// Re-export common types
pub use error::{Result, SitelineError};
pub use record::{PageId, Record, RecordData};
