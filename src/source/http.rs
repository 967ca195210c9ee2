//! HTTP event source.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::EventSource;
use crate::error::{Error, Result};
use crate::model::RawEvent;

/// Key holding the event list in the summary response.
const EVENT_LIST_KEY: &str = "evt";

/// Event source backed by the upstream REST API.
#[derive(Debug, Clone)]
pub struct HttpEventSource {
    client: reqwest::Client,
    api_base_url: String,
}

impl HttpEventSource {
    /// Create a source against `api_base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the HTTP client cannot be built.
    pub fn new(api_base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, url: &str, api_key: &str, org_id: &str) -> Result<String> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .header("X-API-Key", api_key)
            .header("X-Org", org_id)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("{url} returned {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read response from {url}: {e}")))
    }
}

impl EventSource for HttpEventSource {
    async fn fetch_all(&self, api_key: &str, org_id: &str) -> Result<Vec<RawEvent>> {
        let url = format!("{}/events", self.api_base_url);
        let body = self.get(&url, api_key, org_id).await?;

        let data: Value = match serde_json::from_str(&body) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Event list is not JSON, treating as empty");
                return Ok(Vec::new());
            }
        };

        let Some(entries) = data.get(EVENT_LIST_KEY).and_then(Value::as_array) else {
            debug!("Event list response has no '{EVENT_LIST_KEY}' array");
            return Ok(Vec::new());
        };

        let total = entries.len();
        let events: Vec<RawEvent> = entries
            .iter()
            .cloned()
            .filter_map(RawEvent::from_value)
            .collect();
        if events.len() < total {
            warn!(dropped = total - events.len(), "Dropped non-object event list entries");
        }

        Ok(events)
    }

    async fn fetch_details(&self, api_key: &str, org_id: &str, event_ref: &str) -> Option<RawEvent> {
        // Registration paths arrive already encoded.
        let url = match reqwest::Url::parse(&format!("{}/event?url={event_ref}", self.api_base_url)) {
            Ok(url) => url,
            Err(e) => {
                warn!(event_ref, error = %e, "Invalid event details URL");
                return None;
            }
        };

        let body = match self.get(url.as_str(), api_key, org_id).await {
            Ok(body) => body,
            Err(e) => {
                warn!(event_ref, error = %e, "Failed to fetch event details");
                return None;
            }
        };

        match serde_json::from_str::<Value>(&body).map(RawEvent::from_value) {
            Ok(Some(details)) => Some(details),
            Ok(None) => {
                warn!(event_ref, "Event details are not a JSON object");
                None
            }
            Err(e) => {
                warn!(event_ref, error = %e, "Event details are not JSON");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> HttpEventSource {
        HttpEventSource::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_all_sends_credentials_and_parses_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .and(header("X-API-Key", "key"))
            .and(header("X-Org", "acme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "evt": [{"eid": "e1"}, "junk", {"eid": "e2"}]
            })))
            .mount(&server)
            .await;

        let events = source(&server).fetch_all("key", "acme").await.unwrap();
        let ids: Vec<_> = events.iter().filter_map(RawEvent::id).collect();
        assert_eq!(ids, vec!["e1", "e2"]);
    }

    #[tokio::test]
    async fn test_fetch_all_unusable_body_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;
        assert!(source(&server).fetch_all("key", "acme").await.unwrap().is_empty());

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"evt": []})))
            .mount(&server)
            .await;
        assert!(source(&server).fetch_all("key", "acme").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_http_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = source(&server).fetch_all("key", "acme").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_fetch_all_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(300))
                    .set_body_json(json!({"evt": []})),
            )
            .mount(&server)
            .await;

        let source = HttpEventSource::new(&server.uri(), Duration::from_millis(50)).unwrap();
        let err = source.fetch_all("key", "acme").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_fetch_details_passes_ref_as_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/event"))
            .and(query_param("url", "2025/3/1/launch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"dtl": "<p>Hi</p>"})))
            .mount(&server)
            .await;

        let details = source(&server)
            .fetch_details("key", "acme", "2025/3/1/launch")
            .await
            .unwrap();
        assert_eq!(details.text("dtl"), Some("<p>Hi</p>".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_details_failures_are_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/event"))
            .and(query_param("url", "missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/event"))
            .and(query_param("url", "null"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;

        let source = source(&server);
        assert!(source.fetch_details("key", "acme", "missing").await.is_none());
        assert!(source.fetch_details("key", "acme", "null").await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_details_sends_encoded_ref_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/event"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"dtl": "<p>Bonsoir</p>"})))
            .mount(&server)
            .await;

        let details = source(&server)
            .fetch_details("key", "acme", "2025/3/1/caf%C3%A9-night")
            .await;
        assert!(details.is_some());

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url.query(), Some("url=2025/3/1/caf%C3%A9-night"));
    }
}
