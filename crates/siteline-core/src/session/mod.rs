//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: Session entity and lifecycle state (`Session`, `SessionState`)

mod model;

pub use model::{Session, SessionState, generate_session_id};
