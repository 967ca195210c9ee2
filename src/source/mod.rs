//! Upstream event source.
//!
//! The engine only sees the [`EventSource`] trait; [`HttpEventSource`] is the
//! production implementation.

mod http;

pub use http::HttpEventSource;

use crate::error::Result;
use crate::model::RawEvent;

/// Trait for upstream event APIs.
///
/// Uses `impl Future` returns so implementations can be plain `async fn`s.
pub trait EventSource: Send + Sync {
    /// Fetch the summary list of all upcoming events.
    ///
    /// An unusable body yields an empty list rather than an error; only
    /// transport-level failures are errors.
    fn fetch_all(
        &self,
        api_key: &str,
        org_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<RawEvent>>> + Send;

    /// Fetch the detail payload for one event.
    ///
    /// `event_ref` is the event's registration path. Any failure yields
    /// `None`.
    fn fetch_details(
        &self,
        api_key: &str,
        org_id: &str,
        event_ref: &str,
    ) -> impl std::future::Future<Output = Option<RawEvent>> + Send;
}
