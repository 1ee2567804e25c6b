//! Usage reporting to the validator.
//!
//! # Responsibilities
//! - Send the final byte count of a metered response to the validator
//!
//! # Design Decisions
//! - Fire-and-forget: the client response never waits on the report
//! - Failures are logged and counted, never surfaced to the client
//! - A `Limit` decision arms a [`PendingReport`] at once, so a request that
//!   never reaches the metered stream still closes its record

use std::time::Duration;

use crate::observability::metrics;
use crate::validator::types::{Grant, UsageReport, ValidatorResult};

/// Sends [`UsageReport`]s to the validator's close endpoint.
#[derive(Clone)]
pub struct UsageReporter {
    client: reqwest::Client,
    endpoint: String,
}

impl UsageReporter {
    /// Build a reporter for `PUT <validator_url><close_path>`.
    pub fn new(validator_url: &str, close_path: &str, timeout: Duration) -> ValidatorResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = format!("{}{}", validator_url.trim_end_matches('/'), close_path);

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one report and wait for the validator to accept it.
    pub async fn send(&self, report: &UsageReport) -> ValidatorResult<()> {
        self.client
            .put(&self.endpoint)
            .json(report)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Arm the report owed for `grant`.
    pub fn arm(&self, grant: &Grant) -> PendingReport {
        PendingReport {
            reporter: self.clone(),
            report: Some(UsageReport::new(grant, 0)),
        }
    }

    /// Dispatch a report in the background.
    ///
    /// Safe to call from `Drop`: without a runtime the report is logged as
    /// lost instead of panicking.
    pub fn report(&self, report: UsageReport) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::error!(
                    id = %report.id,
                    body_size = report.body_size,
                    "No runtime available, usage report dropped"
                );
                metrics::record_usage_report("dropped");
                return;
            }
        };

        let reporter = self.clone();
        handle.spawn(async move {
            match reporter.send(&report).await {
                Ok(()) => {
                    tracing::debug!(id = %report.id, body_size = report.body_size, "Usage reported");
                    metrics::record_usage_report("sent");
                }
                Err(e) => {
                    tracing::error!(
                        id = %report.id,
                        body_size = report.body_size,
                        error = %e,
                        "Failed to report usage"
                    );
                    metrics::record_usage_report("failed");
                }
            }
        });
    }
}

/// A usage report owed to the validator.
///
/// Sent once: by [`PendingReport::settle`], or with `bodySize = 0` when
/// dropped unsettled (gateway failure, client gone before streaming).
pub struct PendingReport {
    reporter: UsageReporter,
    report: Option<UsageReport>,
}

impl PendingReport {
    /// Send the report with the final byte count.
    pub fn settle(mut self, body_size: u64) {
        if let Some(mut report) = self.report.take() {
            report.body_size = body_size;
            self.reporter.report(report);
        }
    }
}

impl Drop for PendingReport {
    fn drop(&mut self) {
        if let Some(report) = self.report.take() {
            tracing::debug!(id = %report.id, "Metered request ended before streaming");
            self.reporter.report(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::{extract::State, routing::put, Json, Router};
    use tokio::net::TcpListener;

    const CLOSE_PATH: &str = "/api/v0.2/interceptor/request/close";

    type Received = Arc<Mutex<Vec<UsageReport>>>;

    async fn start_close_endpoint() -> (String, Received) {
        let received = Received::default();
        let app = Router::new()
            .route(
                CLOSE_PATH,
                put(|State(log): State<Received>, Json(report): Json<UsageReport>| async move {
                    log.lock().unwrap().push(report);
                }),
            )
            .with_state(received.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), received)
    }

    async fn wait_for(received: &Received, count: usize) -> Vec<UsageReport> {
        for _ in 0..100 {
            if received.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        received.lock().unwrap().clone()
    }

    fn grant() -> Grant {
        Grant {
            request_id: "abc".into(),
            secret: "s1".into(),
            max_body_size: 1000,
        }
    }

    #[tokio::test]
    async fn test_settled_report_is_sent_once() {
        let (url, received) = start_close_endpoint().await;
        let reporter = UsageReporter::new(&url, CLOSE_PATH, Duration::from_secs(2)).unwrap();

        reporter.arm(&grant()).settle(420);

        let reports = wait_for(&received, 1).await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id, "abc");
        assert_eq!(reports[0].body_size, 420);
    }

    #[tokio::test]
    async fn test_unsettled_report_is_sent_empty_on_drop() {
        let (url, received) = start_close_endpoint().await;
        let reporter = UsageReporter::new(&url, CLOSE_PATH, Duration::from_secs(2)).unwrap();

        drop(reporter.arm(&grant()));

        let reports = wait_for(&received, 1).await;
        assert_eq!(reports, vec![UsageReport::new(&grant(), 0)]);
    }

    #[test]
    fn test_endpoint_join() {
        let reporter = UsageReporter::new(
            "http://validator:3000/",
            "/api/v0.2/interceptor/request/close",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            reporter.endpoint(),
            "http://validator:3000/api/v0.2/interceptor/request/close"
        );
    }

    #[tokio::test]
    async fn test_unreachable_validator_is_an_error() {
        let reporter = UsageReporter::new(
            "http://127.0.0.1:1",
            "/api/v0.2/interceptor/request/close",
            Duration::from_secs(1),
        )
        .unwrap();
        let report = UsageReport {
            id: "abc".into(),
            body_size: 10,
            secret: "s1".into(),
        };
        assert!(reporter.send(&report).await.is_err());
    }
}
