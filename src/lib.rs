//! evsync - mirror upstream event listings into a local content store.
//!
//! Each run fetches an organization's events, publishes one content item
//! per event, keeps those items current as events change and unpublishes
//! them once the event has ended.
//!
//! # Architecture
//!
//! - [`source`] - Upstream event API client
//! - [`normalize`] - Validation and rendering of raw event payloads
//! - [`storage`] - SQLite state store (tracked records, run lock, audit log)
//! - [`content`] - Content sink and image store
//! - [`sync`] - Reconciliation engine
//! - [`config`] - Settings and run configuration
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod model;
pub mod normalize;
pub mod source;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
