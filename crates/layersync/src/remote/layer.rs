//! HTTP-polled remote layer
//!
//! Uses synchronous HTTP (ureq) so a pass stays on its own worker thread.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

use crate::cancel::CancellationFlag;
use crate::models::{SyncResult, SyncableResource};

/// Granularity at which backoff sleeps poll the cancellation flag
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Retry policy for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each further attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Status document returned by a layer endpoint
///
/// Both fields are optional; an empty body counts as "no changes".
#[derive(Debug, Default, Deserialize)]
struct LayerStatus {
    #[serde(default)]
    changes: u64,
    #[serde(default)]
    conflicts: u64,
}

/// Outcome of a single request
enum Attempt {
    Done(LayerStatus),
    Conflict,
    Rejected(u16),
    Transient(String),
}

/// A map layer whose state lives on a remote server
pub struct RemoteLayer {
    id: String,
    endpoint: Url,
    retry: RetryPolicy,
    agent: ureq::Agent,
}

impl RemoteLayer {
    pub fn new(id: impl Into<String>, endpoint: Url) -> Self {
        Self::with_timeout(id, endpoint, Duration::from_secs(30))
    }

    /// Create a layer whose individual requests give up after `timeout`
    pub fn with_timeout(id: impl Into<String>, endpoint: Url, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            id: id.into(),
            endpoint,
            retry: RetryPolicy::default(),
            agent: config.into(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request_url(&self, authority: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("authority", authority);
        url
    }

    fn attempt(&self, url: &Url) -> Result<Attempt> {
        match self.agent.get(url.as_str()).call() {
            Ok(mut response) => {
                let body = response
                    .body_mut()
                    .read_to_string()
                    .context("Failed to read layer status")?;
                if body.trim().is_empty() {
                    return Ok(Attempt::Done(LayerStatus::default()));
                }
                let status: LayerStatus =
                    serde_json::from_str(&body).context("Failed to parse layer status")?;
                Ok(Attempt::Done(status))
            }
            Err(ureq::Error::StatusCode(409)) => Ok(Attempt::Conflict),
            Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => {
                Ok(Attempt::Rejected(code))
            }
            Err(e) => Ok(Attempt::Transient(e.to_string())),
        }
    }
}

/// Sleep for `delay`, waking early if the pass is cancelled
///
/// Returns `false` if cancellation interrupted the wait.
fn sleep_unless_cancelled(delay: Duration, cancel: &CancellationFlag) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(CANCEL_POLL.min(deadline - now));
    }
}

impl SyncableResource for RemoteLayer {
    fn id(&self) -> &str {
        &self.id
    }

    fn endpoint(&self) -> Option<&Url> {
        Some(&self.endpoint)
    }

    fn sync(
        &self,
        authority: &str,
        cancel: &CancellationFlag,
        result: &mut SyncResult,
    ) -> Result<()> {
        let url = self.request_url(authority);
        let mut delay = self.retry.base_delay;
        let mut last_error = String::new();

        for attempt in 0..self.retry.max_attempts.max(1) {
            if attempt > 0 {
                log::debug!("Retrying layer {} (attempt {})", self.id, attempt + 1);
                if !sleep_unless_cancelled(delay, cancel) {
                    return Ok(());
                }
                delay *= 2;
            }
            if cancel.is_cancelled() {
                return Ok(());
            }

            match self.attempt(&url)? {
                Attempt::Done(status) => {
                    log::debug!(
                        "Layer {} synced ({} changes, {} conflicts)",
                        self.id,
                        status.changes,
                        status.conflicts
                    );
                    result.record_changes(status.changes);
                    result.record_conflicts(status.conflicts);
                    return Ok(());
                }
                Attempt::Conflict => {
                    log::warn!("Layer {} reported a conflict", self.id);
                    result.record_conflicts(1);
                    return Ok(());
                }
                Attempt::Rejected(code) => {
                    result.record_hard_error(&self.id, format!("HTTP {}", code));
                    return Ok(());
                }
                Attempt::Transient(message) => last_error = message,
            }
        }

        log::warn!("Layer {} gave up after retries: {}", self.id, last_error);
        result.record_soft_error(&self.id, last_error);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serve canned responses, one per connection, and count requests
    fn serve(responses: Vec<(u16, &'static str)>) -> (Url, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        std::thread::spawn(move || {
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);

                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                while reader.read_line(&mut line).unwrap_or(0) > 0 {
                    if line == "\r\n" {
                        break;
                    }
                    line.clear();
                }

                let reply = format!(
                    "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(reply.as_bytes());
            }
        });

        let url = Url::parse(&format!("http://{}/layers/roads", addr)).unwrap();
        (url, hits)
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_records_changes() {
        let (url, hits) = serve(vec![(200, r#"{"changes": 3, "conflicts": 1}"#)]);
        let layer = RemoteLayer::new("roads", url);
        let mut result = SyncResult::new();

        layer.sync("auth", &CancellationFlag::new(), &mut result).unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(result.changes, 3);
        assert_eq!(result.conflicts, 1);
        assert!(!result.has_errors());
    }

    #[test]
    fn test_empty_body_means_no_changes() {
        let (url, _) = serve(vec![(200, "")]);
        let layer = RemoteLayer::new("roads", url);
        let mut result = SyncResult::new();

        layer.sync("auth", &CancellationFlag::new(), &mut result).unwrap();
        assert_eq!(result, SyncResult::new());
    }

    #[test]
    fn test_conflict_status() {
        let (url, _) = serve(vec![(409, "")]);
        let layer = RemoteLayer::new("roads", url);
        let mut result = SyncResult::new();

        layer.sync("auth", &CancellationFlag::new(), &mut result).unwrap();
        assert_eq!(result.conflicts, 1);
        assert!(!result.has_errors());
    }

    #[test]
    fn test_client_error_is_hard_and_not_retried() {
        let (url, hits) = serve(vec![(403, ""), (200, "")]);
        let layer = RemoteLayer::new("roads", url).with_retry(fast_retry());
        let mut result = SyncResult::new();

        layer.sync("auth", &CancellationFlag::new(), &mut result).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(result.hard_errors, 1);
        assert_eq!(result.failures[0].message, "HTTP 403");
    }

    #[test]
    fn test_server_error_is_retried() {
        let (url, hits) = serve(vec![(503, ""), (200, r#"{"changes": 1}"#)]);
        let layer = RemoteLayer::new("roads", url).with_retry(fast_retry());
        let mut result = SyncResult::new();

        layer.sync("auth", &CancellationFlag::new(), &mut result).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(result.changes, 1);
        assert!(!result.has_errors());
    }

    #[test]
    fn test_exhausted_retries_are_soft() {
        let (url, hits) = serve(vec![(500, ""), (502, ""), (503, "")]);
        let layer = RemoteLayer::new("roads", url).with_retry(fast_retry());
        let mut result = SyncResult::new();

        layer.sync("auth", &CancellationFlag::new(), &mut result).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(result.soft_errors, 1);
        assert_eq!(result.hard_errors, 0);
    }

    #[test]
    fn test_cancelled_layer_sends_nothing() {
        let (url, hits) = serve(vec![(200, "")]);
        let layer = RemoteLayer::new("roads", url);
        let cancel = CancellationFlag::new();
        cancel.request_cancel();
        let mut result = SyncResult::new();

        layer.sync("auth", &cancel, &mut result).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(result, SyncResult::new());
    }

    #[test]
    fn test_request_url_carries_authority() {
        let layer = RemoteLayer::new(
            "roads",
            Url::parse("http://example.com/layers/1?v=2").unwrap(),
        );
        assert_eq!(
            layer.endpoint().map(Url::as_str),
            Some("http://example.com/layers/1?v=2")
        );

        let url = layer.request_url("org.layersync.provider");
        assert_eq!(
            url.as_str(),
            "http://example.com/layers/1?v=2&authority=org.layersync.provider"
        );
    }

    #[test]
    fn test_sleep_unless_cancelled() {
        let cancel = CancellationFlag::new();
        assert!(sleep_unless_cancelled(Duration::from_millis(1), &cancel));
        cancel.request_cancel();
        assert!(!sleep_unless_cancelled(Duration::from_secs(10), &cancel));
    }
}
