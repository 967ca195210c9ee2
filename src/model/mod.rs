//! Data models for evsync.
//!
//! This module contains the domain models:
//! - RawEvent (upstream JSON payload, summary or detail)
//! - Event (validated, normalized event)
//! - TrackedRecord (persisted bookkeeping row)

pub mod event;
pub mod record;

pub use event::{keys, Address, Event, RawEvent};
pub use record::{LifecycleStatus, TrackedRecord};
