//! HTTP delivery of queued jobs.

use serde_json::Value;
use std::time::{Duration, Instant};

use crate::config::DeliveryConfig;
use crate::error::{WebhookError, WebhookResult};
use crate::job::DeliveryJob;
use crate::webhook::WebhookType;

/// Result of a successful delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// HTTP status code.
    pub status: u16,
    /// Duration in milliseconds.
    pub duration_ms: u64,
}

/// HTTP client used by workers. Every request is bounded by a fixed timeout.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl DeliveryClient {
    /// Creates a client from delivery settings.
    pub fn new(config: &DeliveryConfig) -> WebhookResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| WebhookError::Config(e.to_string()))?;

        Ok(Self {
            http,
            timeout: config.timeout(),
        })
    }

    /// Returns the per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl DeliveryJob {
    /// Performs one delivery attempt.
    ///
    /// `post` jobs send `data` as a JSON body; other jobs issue a `GET`
    /// without a body. Any response outside 2xx is an error.
    pub async fn execute(&self, client: &DeliveryClient) -> WebhookResult<DeliveryReceipt> {
        let start = Instant::now();

        let request = match self.webhook_type {
            WebhookType::Post => client
                .http
                .post(&self.url)
                .json(self.data.as_ref().unwrap_or(&Value::Null)),
            WebhookType::Get => client.http.get(&self.url),
        };

        let response = request.send().await?;
        let status = response.status();
        let duration_ms = start.elapsed().as_millis() as u64;

        if !status.is_success() {
            return Err(WebhookError::UnexpectedStatus {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        Ok(DeliveryReceipt {
            status: status.as_u16(),
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> DeliveryClient {
        DeliveryClient::new(&DeliveryConfig::default().timeout_ms(500)).unwrap()
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        let data = json!({"user": {}, "name": "afterSave", "sender": {"id": 42}, "event": {}});

        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(body_json(&data))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let job = DeliveryJob::new(
            "Sending webhook “Orders”",
            WebhookType::Post,
            format!("{}/hook", server.uri()),
            Some(data),
        );
        let receipt = job.execute(&client()).await.unwrap();
        assert_eq!(receipt.status, 200);
    }

    #[tokio::test]
    async fn test_get_sends_no_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let job = DeliveryJob::new("Ping", WebhookType::Get, format!("{}/ping", server.uri()), None);
        let receipt = job.execute(&client()).await.unwrap();
        assert_eq!(receipt.status, 204);

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_non_2xx_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let job = DeliveryJob::new("Orders", WebhookType::Post, server.uri(), Some(json!({})));
        let err = job.execute(&client()).await.unwrap_err();
        assert!(matches!(err, WebhookError::UnexpectedStatus { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let job = DeliveryJob::new("Slow", WebhookType::Get, server.uri(), None);
        let err = job.execute(&client()).await.unwrap_err();
        assert!(matches!(err, WebhookError::Timeout));
    }
}
