//! HTTP alert notifier

use crate::message::{IncidentMessage, DEFAULT_USER_NAME};
use crate::NotifyError;
use safety_gate::IncidentReport;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8787/api/alert";

/// Notifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Alert endpoint URL
    pub endpoint: String,
    /// Name reported as `userName`
    pub user_name: String,
    /// Request timeout (default: 5s)
    pub timeout_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_name: DEFAULT_USER_NAME.to_string(),
            timeout_ms: 5_000,
        }
    }
}

/// Result of a best-effort notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotifyOutcome {
    /// Server answered 2xx; `acknowledged` mirrors its `ok` field
    Delivered { acknowledged: bool },
    /// Server unreachable or rejected the request
    Simulated,
}

impl NotifyOutcome {
    pub fn status_text(&self) -> &'static str {
        match self {
            NotifyOutcome::Delivered { acknowledged: true } => "Alert sent ✓",
            NotifyOutcome::Delivered { acknowledged: false } => "Alert sent",
            NotifyOutcome::Simulated => "Server unavailable, simulated alert ✓",
        }
    }
}

/// Posts incident messages to the alert endpoint
#[derive(Debug, Clone)]
pub struct AlertNotifier {
    config: NotifierConfig,
    client: reqwest::Client,
}

impl AlertNotifier {
    pub fn new(config: NotifierConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;

        info!("Alert notifier targeting {}", config.endpoint);
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// POST one message; any non-2xx answer is an error
    pub async fn send(&self, message: &IncidentMessage) -> Result<NotifyOutcome, NotifyError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        // An unreadable body still counts as acknowledged
        let acknowledged = match response.json::<serde_json::Value>().await {
            Ok(body) => body
                .get("ok")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false),
            Err(e) => {
                debug!("Alert response body not JSON: {}", e);
                true
            }
        };

        Ok(NotifyOutcome::Delivered { acknowledged })
    }

    /// Send an engine report, swallowing every failure
    pub async fn notify(&self, report: &IncidentReport) -> NotifyOutcome {
        let message = IncidentMessage::from_report(report, &self.config.user_name);

        match self.send(&message).await {
            Ok(outcome) => {
                info!(
                    incident_id = %message.incident_id,
                    drowsy_events = report.drowsy_events,
                    "Incident notification delivered"
                );
                outcome
            }
            Err(e) => {
                warn!(
                    incident_id = %message.incident_id,
                    "Incident notification failed, treating as simulated: {}",
                    e
                );
                NotifyOutcome::Simulated
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use vehicle_stop::GeoFix;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Mock alert endpoint answering every POST with `response`
    async fn alert_server(response: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/alert"))
            .respond_with(response)
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    fn notifier(server: &MockServer) -> AlertNotifier {
        notifier_at(format!("{}/api/alert", server.uri()))
    }

    fn notifier_at(endpoint: String) -> AlertNotifier {
        AlertNotifier::new(NotifierConfig {
            endpoint,
            timeout_ms: 2_000,
            ..Default::default()
        })
        .unwrap()
    }

    fn report() -> IncidentReport {
        IncidentReport {
            reason: "Repeated drowsiness".to_string(),
            drowsy_events: 6,
            position: Some(GeoFix::new(48.1, 11.5, 0).with_accuracy(15.0)),
        }
    }

    #[test]
    fn test_default_config() {
        let config = NotifierConfig::default();
        assert_eq!(config.endpoint, "http://localhost:8787/api/alert");
        assert_eq!(config.user_name, "Driver");
    }

    #[tokio::test]
    async fn test_delivered() {
        let server =
            alert_server(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
                .await;
        let outcome = notifier(&server).notify(&report()).await;

        assert_eq!(outcome, NotifyOutcome::Delivered { acknowledged: true });

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let json: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(json["userName"], "Driver");
        assert_eq!(json["reason"], "Repeated drowsiness");
        assert_eq!(json["accuracy"], 15.0);
    }

    #[tokio::test]
    async fn test_ok_false_is_unacknowledged() {
        let server =
            alert_server(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": false })))
                .await;
        let outcome = notifier(&server).notify(&report()).await;

        assert_eq!(outcome, NotifyOutcome::Delivered { acknowledged: false });
        assert_eq!(outcome.status_text(), "Alert sent");
    }

    #[tokio::test]
    async fn test_non_json_body_counts_as_acknowledged() {
        let server = alert_server(ResponseTemplate::new(200).set_body_string("accepted")).await;
        let outcome = notifier(&server).notify(&report()).await;

        assert_eq!(outcome, NotifyOutcome::Delivered { acknowledged: true });
    }

    #[tokio::test]
    async fn test_server_error_is_simulated() {
        let server =
            alert_server(ResponseTemplate::new(500).set_body_json(serde_json::json!({ "ok": false })))
                .await;
        let notifier = notifier(&server);
        let message = IncidentMessage::from_report(&report(), "Driver");

        let err = notifier.send(&message).await.unwrap_err();
        assert!(matches!(err, NotifyError::Status(500)));

        let requests = server.received_requests().await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(json["incidentId"], message.incident_id.to_string());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_simulated() {
        // Grab a free port, then close it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let outcome = notifier_at(format!("http://{addr}/api/alert"))
            .notify(&report())
            .await;

        assert_eq!(outcome, NotifyOutcome::Simulated);
        assert_eq!(outcome.status_text(), "Server unavailable, simulated alert ✓");
    }
}
